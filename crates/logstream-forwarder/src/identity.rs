// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Organization identity carried inside the bearer token.
//!
//! The token is a compact JWT. Its payload is decoded without verifying the
//! signature: the ingestion API authenticates the token, the forwarder only
//! needs the organization to address the request.

use crate::encoding::decode_base64;
use crate::error::ForwarderError;
use serde::Deserialize;
use std::fmt;

/// Number of leading characters of the `sub` claim that precede the organization id.
pub const SUBJECT_PREFIX_LEN: usize = 4;

#[derive(Clone, PartialEq, Eq)]
pub struct BearerCredential(String);

impl BearerCredential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Extracts the organization id from the token's `sub` claim.
    pub fn org_id(&self) -> Result<OrganizationId, ForwarderError> {
        let mut segments = self.0.split('.');
        let payload = match (segments.next(), segments.next()) {
            (Some(_), Some(payload)) if !payload.is_empty() => payload,
            _ => {
                return Err(ForwarderError::MalformedCredential(
                    "expected a dot-separated token".to_string(),
                ))
            }
        };

        let decoded = decode_base64(payload)
            .map_err(|e| ForwarderError::MalformedCredential(format!("payload: {e}")))?;
        let claims: Claims = serde_json::from_slice(&decoded)
            .map_err(|e| ForwarderError::MalformedCredential(format!("claims: {e}")))?;
        let subject = claims.sub.ok_or_else(|| {
            ForwarderError::MalformedCredential("missing sub claim".to_string())
        })?;

        Ok(OrganizationId(
            subject.chars().skip(SUBJECT_PREFIX_LEN).collect(),
        ))
    }
}

impl fmt::Debug for BearerCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BearerCredential(<redacted>)")
    }
}

#[derive(Deserialize)]
struct Claims {
    sub: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrganizationId(String);

impl OrganizationId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OrganizationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
