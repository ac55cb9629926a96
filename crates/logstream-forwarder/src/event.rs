// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Inbound Lambda events and the log stream they are forwarded to.
//!
//! Two shapes are accepted: a CloudWatch Logs subscription payload
//! (`awslogs.data`, base64 gzip JSON) and an S3 object notification whose first
//! record points at a gzip log object.

use crate::encoding::{decode_base64, decode_object_key, encode_path_segment};
use crate::error::ForwarderError;
use flate2::read::MultiGzDecoder;
use serde::{Deserialize, Deserializer};
use std::fmt;
use std::io::Read;
use tracing::debug;

/// Objects written by AWS services directly under this prefix carry no useful
/// stream prefix.
pub const AWS_LOGS_PREFIX: &str = "AWSLogs/";
const AWS_LOGS_MARKER: &str = "/AWSLogs/";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct InboundEvent {
    #[serde(default)]
    pub awslogs: Option<AwsLogs>,
    #[serde(rename = "Records", default, deserialize_with = "null_as_empty")]
    pub records: Vec<EventRecord>,
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AwsLogs {
    #[serde(default)]
    pub data: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventRecord {
    #[serde(default)]
    pub s3: Option<S3Entity>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct S3Entity {
    #[serde(default)]
    pub bucket: S3Bucket,
    #[serde(default)]
    pub object: S3Object,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct S3Bucket {
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct S3Object {
    #[serde(default)]
    pub key: String,
}

/// Decoded CloudWatch Logs subscription payload
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogBatch {
    #[serde(default)]
    pub owner: String,
    #[serde(default)]
    pub log_group: String,
    #[serde(default)]
    pub log_events: Vec<LogRecord>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LogRecord {
    #[serde(default)]
    pub message: String,
}

impl LogBatch {
    /// Decodes `awslogs.data`: base64, then gzip, then JSON. The whole batch is
    /// held in memory, CloudWatch caps its size.
    pub fn decode(data: &str) -> Result<Self, ForwarderError> {
        let compressed = decode_base64(data)
            .map_err(|e| ForwarderError::InvalidPayload(format!("awslogs data: {e}")))?;
        let mut json = Vec::new();
        MultiGzDecoder::new(compressed.as_slice())
            .read_to_end(&mut json)
            .map_err(|e| ForwarderError::InvalidPayload(format!("awslogs gzip: {e}")))?;
        serde_json::from_slice(&json)
            .map_err(|e| ForwarderError::InvalidPayload(format!("awslogs json: {e}")))
    }
}

/// S3 object holding gzip-compressed log lines
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectLocation {
    pub bucket: String,
    /// Key with the notification's `+` and percent escaping removed
    pub key: String,
}

#[derive(Debug)]
pub enum SourceEvent {
    LogBatch(LogBatch),
    Object(ObjectLocation),
}

/// Percent-encoded log stream id, safe to use as a URL path segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamId(String);

impl StreamId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug)]
pub struct ClassifiedEvent {
    pub stream_id: StreamId,
    pub source: SourceEvent,
}

/// Determines the event shape and the stream it goes to. `stream_override`
/// always wins over the id derived from the event.
pub fn classify(
    event: InboundEvent,
    stream_override: Option<&str>,
) -> Result<ClassifiedEvent, ForwarderError> {
    let stream_override = stream_override.filter(|id| !id.is_empty());

    if let Some(data) = event.awslogs.and_then(|awslogs| awslogs.data) {
        debug!("awslogs event");
        let batch = LogBatch::decode(&data)?;
        let derived = format!("{}:{}", batch.owner, batch.log_group);
        let stream_id = stream_id(stream_override.unwrap_or(&derived))?;
        return Ok(ClassifiedEvent {
            stream_id,
            source: SourceEvent::LogBatch(batch),
        });
    }

    let Some(s3) = event.records.into_iter().next().and_then(|record| record.s3) else {
        return Err(ForwarderError::UnsupportedEventType);
    };

    debug!("S3 bucket: {}", s3.bucket.name);
    let stream_id = match stream_override {
        Some(id) => stream_id(id)?,
        None => stream_id(&object_stream_name(&s3.bucket.name, &s3.object.key))?,
    };
    Ok(ClassifiedEvent {
        stream_id,
        source: SourceEvent::Object(ObjectLocation {
            key: decode_object_key(&s3.object.key),
            bucket: s3.bucket.name,
        }),
    })
}

/// `bucket`, or `bucket/prefix` when the key has a prefix in front of `AWSLogs/`.
fn object_stream_name(bucket: &str, raw_key: &str) -> String {
    if raw_key.starts_with(AWS_LOGS_PREFIX) {
        return bucket.to_string();
    }
    let prefix = raw_key.split(AWS_LOGS_MARKER).next().unwrap_or_default();
    format!("{bucket}/{prefix}")
}

fn stream_id(name: &str) -> Result<StreamId, ForwarderError> {
    let encoded = encode_path_segment(name);
    if encoded.is_empty() {
        return Err(ForwarderError::MissingStreamIdentifier);
    }
    Ok(StreamId(encoded))
}
