// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use reqwest::StatusCode;

/// Errors that can occur while forwarding a batch of log lines
#[derive(Debug, thiserror::Error)]
pub enum ForwarderError {
    #[error("invalid configuration: {0}")]
    Configuration(String),

    #[error("access token unavailable: {0}")]
    CredentialUnavailable(String),

    #[error("invalid access token value: {0}")]
    MalformedCredential(String),

    #[error("unsupported event type")]
    UnsupportedEventType,

    #[error("missing LOGSTREAM_ID env variable")]
    MissingStreamIdentifier,

    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    #[error("no body in S3 object")]
    EmptyObjectBody,

    #[error("failed to read S3 object: {0}")]
    ObjectRead(String),

    #[error("line stream closed by consumer")]
    StreamClosed,

    #[error("failed to build HTTP client: {0}")]
    HttpClient(String),

    #[error("{}", upstream_message(.status, .body))]
    UpstreamDelivery {
        status: Option<StatusCode>,
        body: String,
    },
}

impl ForwarderError {
    /// Whether the ingestion endpoint answered with an error status. Transport
    /// failures carry no status and are not counted.
    pub fn is_upstream(&self) -> bool {
        matches!(self, Self::UpstreamDelivery { status: Some(_), .. })
    }
}

// The raw upstream payload is what the caller gets to see, when there is one.
fn upstream_message(status: &Option<StatusCode>, body: &str) -> String {
    if !body.is_empty() {
        return body.to_string();
    }
    match status {
        Some(status) => format!("upstream delivery failed (status {status})"),
        None => "upstream delivery failed".to_string(),
    }
}
