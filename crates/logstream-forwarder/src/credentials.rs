// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::error::ForwarderError;
use crate::identity::BearerCredential;
use async_trait::async_trait;
use aws_config::SdkConfig;
use tracing::{debug, error, warn};

/// Where the access token is stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialSource {
    /// SSM parameter, fetched with decryption.
    Parameter(String),
    /// Secrets Manager secret, read from its string value.
    Secret(String),
}

impl CredentialSource {
    /// Picks the source from the configured names. The parameter store wins when
    /// both are set.
    pub fn from_names(
        parameter: Option<String>,
        secret: Option<String>,
    ) -> Result<Self, ForwarderError> {
        match (parameter, secret) {
            (Some(parameter), secret) => {
                if secret.is_some() {
                    warn!(
                        "both ACCESS_TOKEN_PARAMETER_NAME and ACCESS_TOKEN_SECRET_NAME are set, using the parameter"
                    );
                }
                Ok(Self::Parameter(parameter))
            }
            (None, Some(secret)) => Ok(Self::Secret(secret)),
            (None, None) => Err(ForwarderError::Configuration(
                "missing ACCESS_TOKEN_PARAMETER_NAME or ACCESS_TOKEN_SECRET_NAME env variable"
                    .to_string(),
            )),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Parameter(name) | Self::Secret(name) => name,
        }
    }
}

#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Returns the stored value, or `None` when the store has no value for it.
    async fn fetch(&self, source: &CredentialSource) -> Result<Option<String>, ForwarderError>;
}

/// Reads the access token from SSM Parameter Store or Secrets Manager.
#[derive(Debug, Clone)]
pub struct AwsSecretStore {
    ssm: aws_sdk_ssm::Client,
    secrets: aws_sdk_secretsmanager::Client,
}

impl AwsSecretStore {
    pub fn new(sdk_config: &SdkConfig) -> Self {
        Self {
            ssm: aws_sdk_ssm::Client::new(sdk_config),
            secrets: aws_sdk_secretsmanager::Client::new(sdk_config),
        }
    }
}

#[async_trait]
impl SecretStore for AwsSecretStore {
    async fn fetch(&self, source: &CredentialSource) -> Result<Option<String>, ForwarderError> {
        match source {
            CredentialSource::Parameter(name) => {
                let output = self
                    .ssm
                    .get_parameter()
                    .name(name)
                    .with_decryption(true)
                    .send()
                    .await
                    .map_err(|e| {
                        ForwarderError::CredentialUnavailable(format!(
                            "failed to get parameter {name}: {}",
                            aws_sdk_ssm::error::DisplayErrorContext(&e)
                        ))
                    })?;
                Ok(output
                    .parameter()
                    .and_then(|parameter| parameter.value())
                    .map(str::to_string))
            }
            CredentialSource::Secret(name) => {
                let output = self
                    .secrets
                    .get_secret_value()
                    .secret_id(name)
                    .send()
                    .await
                    .map_err(|e| {
                        ForwarderError::CredentialUnavailable(format!(
                            "failed to get secret {name}: {}",
                            aws_sdk_secretsmanager::error::DisplayErrorContext(&e)
                        ))
                    })?;
                Ok(output.secret_string().map(str::to_string))
            }
        }
    }
}

/// The access token for the lifetime of the process.
///
/// Resolved once before the first invocation is accepted. A failed resolution is
/// kept so that every invocation reports it instead of retrying the store.
#[derive(Debug, Clone)]
pub enum Credential {
    Resolved(BearerCredential),
    Unavailable(String),
}

impl Credential {
    pub async fn resolve(store: &dyn SecretStore, source: &CredentialSource) -> Self {
        debug!("Resolving access token from {}", source.name());
        match store.fetch(source).await {
            Ok(Some(token)) if !token.is_empty() => Self::Resolved(BearerCredential::new(token)),
            Ok(_) => {
                error!("No access token value in {}", source.name());
                Self::Unavailable(format!("no value in {}", source.name()))
            }
            Err(ForwarderError::CredentialUnavailable(reason)) => {
                error!("{reason}");
                Self::Unavailable(reason)
            }
            Err(e) => {
                error!("{e}");
                Self::Unavailable(e.to_string())
            }
        }
    }

    pub fn token(&self) -> Result<&BearerCredential, ForwarderError> {
        match self {
            Self::Resolved(token) => Ok(token),
            Self::Unavailable(reason) => Err(ForwarderError::CredentialUnavailable(reason.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StaticStore {
        value: Option<String>,
        calls: AtomicUsize,
    }

    impl StaticStore {
        fn new(value: Option<&str>) -> Self {
            Self {
                value: value.map(str::to_string),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl SecretStore for StaticStore {
        async fn fetch(
            &self,
            _source: &CredentialSource,
        ) -> Result<Option<String>, ForwarderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.value.clone())
        }
    }

    struct FailingStore;

    #[async_trait]
    impl SecretStore for FailingStore {
        async fn fetch(
            &self,
            source: &CredentialSource,
        ) -> Result<Option<String>, ForwarderError> {
            Err(ForwarderError::CredentialUnavailable(format!(
                "access denied to {}",
                source.name()
            )))
        }
    }

    #[test]
    fn test_source_prefers_parameter() {
        let source =
            CredentialSource::from_names(Some("param".to_string()), Some("secret".to_string()))
                .unwrap();
        assert_eq!(source, CredentialSource::Parameter("param".to_string()));
    }

    #[test]
    fn test_source_falls_back_to_secret() {
        let source = CredentialSource::from_names(None, Some("secret".to_string())).unwrap();
        assert_eq!(source, CredentialSource::Secret("secret".to_string()));
        assert_eq!(source.name(), "secret");
    }

    #[test]
    fn test_source_requires_a_name() {
        let err = CredentialSource::from_names(None, None).unwrap_err();
        assert!(matches!(err, ForwarderError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_resolve_once() {
        let store = StaticStore::new(Some("a.b.c"));
        let credential =
            Credential::resolve(&store, &CredentialSource::Parameter("p".to_string())).await;
        assert_eq!(credential.token().unwrap().as_str(), "a.b.c");
        assert_eq!(credential.token().unwrap().as_str(), "a.b.c");
        assert_eq!(store.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_missing_value_is_unavailable() {
        let store = StaticStore::new(None);
        let credential =
            Credential::resolve(&store, &CredentialSource::Secret("s".to_string())).await;
        assert!(matches!(
            credential.token(),
            Err(ForwarderError::CredentialUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_empty_value_is_unavailable() {
        let store = StaticStore::new(Some(""));
        let credential =
            Credential::resolve(&store, &CredentialSource::Parameter("p".to_string())).await;
        assert!(credential.token().is_err());
    }

    #[tokio::test]
    async fn test_store_error_is_unavailable() {
        let credential =
            Credential::resolve(&FailingStore, &CredentialSource::Secret("s".to_string())).await;
        let err = credential.token().unwrap_err();
        assert_eq!(err.to_string(), "access token unavailable: access denied to s");
    }
}
