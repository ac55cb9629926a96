// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::error::ForwarderError;
use crate::event::ObjectLocation;
use async_trait::async_trait;
use aws_config::SdkConfig;
use bytes::Bytes;
use futures::stream::{self, BoxStream, StreamExt};
use std::io;
use tracing::debug;

/// Raw (still compressed) object content, read incrementally.
pub type ObjectBody = BoxStream<'static, Result<Bytes, io::Error>>;

#[async_trait]
pub trait ObjectFetcher: Send + Sync {
    /// Opens the object for reading. `None` means the object has no body.
    async fn fetch(&self, location: &ObjectLocation) -> Result<Option<ObjectBody>, ForwarderError>;
}

#[derive(Debug, Clone)]
pub struct S3ObjectFetcher {
    client: aws_sdk_s3::Client,
}

impl S3ObjectFetcher {
    pub fn new(sdk_config: &SdkConfig) -> Self {
        Self {
            client: aws_sdk_s3::Client::new(sdk_config),
        }
    }
}

#[async_trait]
impl ObjectFetcher for S3ObjectFetcher {
    async fn fetch(&self, location: &ObjectLocation) -> Result<Option<ObjectBody>, ForwarderError> {
        let output = self
            .client
            .get_object()
            .bucket(&location.bucket)
            .key(&location.key)
            .send()
            .await
            .map_err(|e| {
                ForwarderError::ObjectRead(format!(
                    "s3://{}/{}: {}",
                    location.bucket,
                    location.key,
                    aws_sdk_s3::error::DisplayErrorContext(&e)
                ))
            })?;

        if output.content_length() == Some(0) {
            return Ok(None);
        }
        debug!(
            "Reading s3://{}/{} ({:?} bytes)",
            location.bucket,
            location.key,
            output.content_length()
        );

        let body = stream::unfold(output.body, |mut body| async move {
            body.next()
                .await
                .map(|chunk| (chunk.map_err(io::Error::other), body))
        });
        Ok(Some(body.boxed()))
    }
}
