// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::error::ForwarderError;
use tracing::{error, info};

pub fn success_message(lines: u64) -> String {
    format!("sent {lines} lines for inspection")
}

/// Logs the outcome of one invocation and converts it into the value handed
/// back to the Lambda runtime.
pub fn report(outcome: Result<u64, ForwarderError>) -> Result<String, ForwarderError> {
    match outcome {
        Ok(lines) => {
            let message = success_message(lines);
            info!("{message}");
            Ok(message)
        }
        Err(err) => {
            match &err {
                ForwarderError::UpstreamDelivery {
                    status: Some(status),
                    body,
                } => {
                    error!("{status}: Failed to push to API: {body:?}");
                }
                ForwarderError::UpstreamDelivery { status: None, body } => {
                    error!("Failed to push to API: {body}");
                }
                other => error!("{other}"),
            }
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_success() {
        assert_eq!(report(Ok(2)).unwrap(), "sent 2 lines for inspection");
        assert_eq!(report(Ok(0)).unwrap(), "sent 0 lines for inspection");
    }

    #[test]
    fn test_report_failure_keeps_error() {
        let err = report(Err(ForwarderError::UpstreamDelivery {
            status: Some(reqwest::StatusCode::INTERNAL_SERVER_ERROR),
            body: r#"{"error":"bad"}"#.to_string(),
        }))
        .unwrap_err();
        assert_eq!(err.to_string(), r#"{"error":"bad"}"#);

        let err = report(Err(ForwarderError::UnsupportedEventType)).unwrap_err();
        assert!(matches!(err, ForwarderError::UnsupportedEventType));
    }
}
