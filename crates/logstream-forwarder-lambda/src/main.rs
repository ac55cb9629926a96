// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

use lambda_runtime::{service_fn, LambdaEvent};
use std::sync::Arc;
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

use logstream_forwarder::{
    config::{self, ForwarderConfig},
    credentials::{AwsSecretStore, Credential},
    event::InboundEvent,
    handler::LogForwarder,
    objects::S3ObjectFetcher,
};

#[tokio::main]
pub async fn main() -> Result<(), lambda_runtime::Error> {
    let log_level = config::log_level_from_env();
    let env_filter = format!(
        "h2=off,hyper=off,rustls=off,aws_config=warn,aws_smithy_runtime=warn,{log_level}"
    );

    #[allow(clippy::expect_used)]
    let subscriber = tracing_subscriber::fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_new(env_filter).expect("could not parse log level in configuration"),
        )
        .with_level(true)
        .with_thread_names(false)
        .with_thread_ids(false)
        .with_line_number(false)
        .with_file(false)
        .with_target(true)
        .without_time()
        .finish();

    #[allow(clippy::expect_used)]
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    debug!("Logging subsystem enabled");

    let config = match ForwarderConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("{e}");
            std::process::exit(1);
        }
    };

    let sdk_config = aws_config::from_env().load().await;
    let credential = Credential::resolve(
        &AwsSecretStore::new(&sdk_config),
        &config.credential_source,
    )
    .await;

    let log_forwarder = match LogForwarder::new(
        config,
        credential,
        Arc::new(S3ObjectFetcher::new(&sdk_config)),
    ) {
        Ok(log_forwarder) => Arc::new(log_forwarder),
        Err(e) => {
            error!("Error creating forwarder on startup: {e}");
            std::process::exit(1);
        }
    };

    lambda_runtime::run(service_fn(move |event: LambdaEvent<InboundEvent>| {
        let log_forwarder = Arc::clone(&log_forwarder);
        async move {
            log_forwarder
                .handle(event.payload)
                .await
                .map_err(lambda_runtime::Error::from)
        }
    }))
    .await
}
