// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::credentials::CredentialSource;
use crate::error::ForwarderError;
use std::env;
use std::time::Duration;

pub const DEFAULT_API_BASE_URL: &str = "https://api.impartsecurity.net/v0";
pub const DEFAULT_LOG_LEVEL: &str = "info";

const VALID_LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Configuration for the forwarder, read from the function environment
#[derive(Debug, Clone)]
pub struct ForwarderConfig {
    /// Root of the ingestion API, without a trailing slash
    pub api_base_url: String,
    /// Store holding the access token
    pub credential_source: CredentialSource,
    /// Overrides the log stream id derived from the event
    pub logstream_id: Option<String>,
    /// Log level (e.g., trace, debug, info, warn, error)
    pub log_level: String,
    /// HTTPS proxy URL
    pub https_proxy: Option<String>,
    /// Timeout for the whole ingestion request
    pub request_timeout: Option<Duration>,
}

impl ForwarderConfig {
    pub fn new(credential_source: CredentialSource) -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            credential_source,
            logstream_id: None,
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            https_proxy: None,
            request_timeout: None,
        }
    }

    /// Create configuration from environment variables
    pub fn from_env() -> Result<Self, ForwarderError> {
        let credential_source = CredentialSource::from_names(
            non_empty_var("ACCESS_TOKEN_PARAMETER_NAME"),
            non_empty_var("ACCESS_TOKEN_SECRET_NAME"),
        )?;
        let api_base_url = non_empty_var("API_BASE_URL")
            .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();
        let request_timeout = match non_empty_var("REQUEST_TIMEOUT_SECS") {
            Some(secs) => Some(Duration::from_secs(secs.parse::<u64>().map_err(|_| {
                ForwarderError::Configuration(format!(
                    "REQUEST_TIMEOUT_SECS must be a number of seconds, got '{secs}'"
                ))
            })?)),
            None => None,
        };

        let config = Self {
            api_base_url,
            credential_source,
            logstream_id: non_empty_var("LOGSTREAM_ID"),
            log_level: log_level_from_env(),
            https_proxy: non_empty_var("HTTPS_PROXY"),
            request_timeout,
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ForwarderError> {
        if !(self.api_base_url.starts_with("https://") || self.api_base_url.starts_with("http://"))
        {
            return Err(ForwarderError::Configuration(format!(
                "API_BASE_URL must be an http(s) URL, got '{}'",
                self.api_base_url
            )));
        }

        if self.credential_source.name().trim().is_empty() {
            return Err(ForwarderError::Configuration(
                "access token source name cannot be empty".to_string(),
            ));
        }

        if !VALID_LOG_LEVELS.contains(&self.log_level.as_str()) {
            return Err(ForwarderError::Configuration(format!(
                "Invalid log level '{}'. Must be one of: trace, debug, info, warn, error",
                self.log_level
            )));
        }

        Ok(())
    }
}

/// Log level from `LOG_LEVEL`, lowercased. Read on its own so logging can be set
/// up before the rest of the configuration is validated.
pub fn log_level_from_env() -> String {
    env::var("LOG_LEVEL")
        .map(|val| val.to_lowercase())
        .unwrap_or_else(|_| DEFAULT_LOG_LEVEL.to_string())
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|val| !val.is_empty())
}
