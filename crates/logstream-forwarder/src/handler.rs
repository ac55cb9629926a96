// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::config::ForwarderConfig;
use crate::credentials::Credential;
use crate::error::ForwarderError;
use crate::event::{classify, ClassifiedEvent, InboundEvent};
use crate::forwarder::Forwarder;
use crate::line_stream::{self, LINE_STREAM_CAPACITY};
use crate::normalizer::open_source;
use crate::objects::ObjectFetcher;
use crate::reporter;
use std::sync::Arc;
use tracing::debug;

/// Per-process state shared by every invocation. Read-only once built.
pub struct LogForwarder {
    config: ForwarderConfig,
    credential: Credential,
    forwarder: Forwarder,
    objects: Arc<dyn ObjectFetcher>,
}

impl LogForwarder {
    pub fn new(
        config: ForwarderConfig,
        credential: Credential,
        objects: Arc<dyn ObjectFetcher>,
    ) -> Result<Self, ForwarderError> {
        let forwarder = Forwarder::new(&config)?;
        Ok(Self {
            config,
            credential,
            forwarder,
            objects,
        })
    }

    /// Handles one invocation. `Ok` carries the line count message, `Err` the
    /// failure to report to the runtime.
    pub async fn handle(&self, event: InboundEvent) -> Result<String, ForwarderError> {
        reporter::report(self.forward(event).await)
    }

    async fn forward(&self, event: InboundEvent) -> Result<u64, ForwarderError> {
        let token = self.credential.token()?;
        let org_id = token.org_id()?;
        let ClassifiedEvent { stream_id, source } =
            classify(event, self.config.logstream_id.as_deref())?;
        let source = open_source(source, self.objects.as_ref()).await?;

        debug!("Forwarding to org {org_id}, log stream {stream_id}");
        let (mut sink, body) = line_stream::channel(LINE_STREAM_CAPACITY);

        // The request is polled first so the body has a reader before lines arrive.
        let send = self.forwarder.send(token, &org_id, &stream_id, body);
        let produce = async move {
            let produced = source.produce(&mut sink).await;
            if let Err(err) = &produced {
                if !matches!(err, ForwarderError::StreamClosed) {
                    debug!("Aborting line stream after {} lines: {err}", sink.lines());
                    sink.abort(err).await;
                }
            }
            (sink.finish(), produced)
        };
        let (sent, (lines, produced)) = tokio::join!(send, produce);

        // An answer from the endpoint is always reported. A transport failure of an
        // aborted body is only the echo of the producer error.
        match (sent, produced) {
            (Err(err), _) if err.is_upstream() => Err(err),
            (_, Err(err)) if !matches!(err, ForwarderError::StreamClosed) => Err(err),
            (Err(err), _) => Err(err),
            (Ok(()), _) => Ok(lines),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::CredentialSource;
    use crate::event::tests::{awslogs_event, s3_event};
    use crate::event::ObjectLocation;
    use crate::identity::BearerCredential;
    use crate::objects::ObjectBody;
    use async_trait::async_trait;
    use mockito::Server;

    const TOKEN: &str = "h.eyJzdWIiOiJYWFhYb3JnMTIzIn0.s";

    struct NoObjects;

    #[async_trait]
    impl ObjectFetcher for NoObjects {
        async fn fetch(
            &self,
            _location: &ObjectLocation,
        ) -> Result<Option<ObjectBody>, ForwarderError> {
            Ok(None)
        }
    }

    fn log_forwarder(url: String, credential: Credential) -> LogForwarder {
        let config = ForwarderConfig {
            api_base_url: url,
            ..ForwarderConfig::new(CredentialSource::Parameter("p".to_string()))
        };
        LogForwarder::new(config, credential, Arc::new(NoObjects)).unwrap()
    }

    #[tokio::test]
    async fn test_unavailable_credential_skips_request() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", mockito::Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let forwarder = log_forwarder(
            server.url(),
            Credential::Unavailable("no value in p".to_string()),
        );
        let err = forwarder.handle(awslogs_event(&["a"])).await.unwrap_err();
        assert!(matches!(err, ForwarderError::CredentialUnavailable(_)));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_empty_object_skips_request() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", mockito::Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let forwarder = log_forwarder(
            server.url(),
            Credential::Resolved(BearerCredential::new(TOKEN)),
        );
        let err = forwarder
            .handle(s3_event("bucket", "AWSLogs/x.gz"))
            .await
            .unwrap_err();
        assert!(matches!(err, ForwarderError::EmptyObjectBody));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_forwards_log_batch() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock(
                "POST",
                "/orgs/org123/logstream/123456789012%3A%2Faws%2Flambda%2Fapp",
            )
            .match_body("one\ntwo\n")
            .with_status(200)
            .create_async()
            .await;

        let forwarder = log_forwarder(
            server.url(),
            Credential::Resolved(BearerCredential::new(TOKEN)),
        );
        let message = forwarder
            .handle(awslogs_event(&["#comment", "one", "two\n"]))
            .await
            .unwrap();
        assert_eq!(message, "sent 2 lines for inspection");
        mock.assert_async().await;
    }
}
