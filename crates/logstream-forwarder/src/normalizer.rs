// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Turns a classified event into newline-terminated lines on a [`LineSink`].
//!
//! ```text
//!   LogBatch ──────────────────────────────┐
//!                                          v
//!   S3 body ─> gunzip (streaming) ─> split ─> drop `#` lines ─> LineSink
//! ```

use crate::error::ForwarderError;
use crate::event::{LogBatch, ObjectLocation, SourceEvent};
use crate::line_stream::LineSink;
use crate::objects::{ObjectBody, ObjectFetcher};
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use flate2::write::MultiGzDecoder;
use futures::StreamExt;
use std::io::Write;
use tracing::debug;

/// Something that produces log lines into a sink.
#[async_trait]
pub trait LineSource: Send {
    /// Pushes every non-comment line, in source order. The caller ends the stream.
    async fn produce(self: Box<Self>, sink: &mut LineSink) -> Result<(), ForwarderError>;
}

/// Lines whose first character is `#` are never forwarded.
pub fn is_comment(line: &[u8]) -> bool {
    line.first() == Some(&b'#')
}

/// Prepares the line source for a classified event. S3 objects are opened here,
/// before anything is sent.
pub async fn open_source(
    source: SourceEvent,
    objects: &dyn ObjectFetcher,
) -> Result<Box<dyn LineSource>, ForwarderError> {
    match source {
        SourceEvent::LogBatch(batch) => Ok(Box::new(LogBatchSource::new(batch))),
        SourceEvent::Object(location) => {
            let body = objects
                .fetch(&location)
                .await?
                .ok_or(ForwarderError::EmptyObjectBody)?;
            Ok(Box::new(ObjectSource::new(location, body)))
        }
    }
}

/// CloudWatch Logs batch, already decoded in memory.
#[derive(Debug)]
pub struct LogBatchSource {
    batch: LogBatch,
}

impl LogBatchSource {
    pub fn new(batch: LogBatch) -> Self {
        Self { batch }
    }
}

#[async_trait]
impl LineSource for LogBatchSource {
    async fn produce(self: Box<Self>, sink: &mut LineSink) -> Result<(), ForwarderError> {
        for record in &self.batch.log_events {
            if is_comment(record.message.as_bytes()) {
                continue;
            }
            sink.push_line(record.message.as_bytes()).await?;
        }
        Ok(())
    }
}

/// Gzip log object streamed from S3.
pub struct ObjectSource {
    location: ObjectLocation,
    body: ObjectBody,
}

impl ObjectSource {
    pub fn new(location: ObjectLocation, body: ObjectBody) -> Self {
        Self { location, body }
    }
}

#[async_trait]
impl LineSource for ObjectSource {
    async fn produce(self: Box<Self>, sink: &mut LineSink) -> Result<(), ForwarderError> {
        let ObjectSource { location, mut body } = *self;
        let mut inflater = Inflater::default();
        let mut splitter = LineSplitter::default();
        let mut compressed_bytes = 0usize;

        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(|e| {
                ForwarderError::ObjectRead(format!(
                    "s3://{}/{}: {e}",
                    location.bucket, location.key
                ))
            })?;
            compressed_bytes += chunk.len();
            for step in chunk.chunks(INFLATE_STEP) {
                splitter.feed(inflater.inflate(step)?);
                push_lines(&mut splitter, sink).await?;
            }
        }

        if compressed_bytes > 0 {
            splitter.feed(inflater.finish()?);
            push_lines(&mut splitter, sink).await?;
        }
        if let Some(line) = splitter.finish() {
            if !is_comment(&line) {
                sink.push_line(&line).await?;
            }
        }

        debug!(
            "Read {compressed_bytes} compressed bytes from s3://{}/{}",
            location.bucket, location.key
        );
        Ok(())
    }
}

/// Compressed bytes inflated before the resulting lines are pushed. Deflate
/// expands at most about 1032:1, so one step stays well under 1 MiB.
const INFLATE_STEP: usize = 512;

/// Streaming gunzip over any number of concatenated gzip members.
struct Inflater {
    decoder: MultiGzDecoder<Vec<u8>>,
}

impl Default for Inflater {
    fn default() -> Self {
        Self {
            decoder: MultiGzDecoder::new(Vec::new()),
        }
    }
}

impl Inflater {
    /// Decompresses `compressed` and returns the output it produced.
    fn inflate(&mut self, compressed: &[u8]) -> Result<&[u8], ForwarderError> {
        self.decoder.get_mut().clear();
        self.decoder
            .write_all(compressed)
            .map_err(decompress_error)?;
        Ok(self.decoder.get_ref())
    }

    /// Flushes buffered output and checks the final trailer.
    fn finish(&mut self) -> Result<&[u8], ForwarderError> {
        self.decoder.get_mut().clear();
        self.decoder.try_finish().map_err(decompress_error)?;
        Ok(self.decoder.get_ref())
    }
}

fn decompress_error(e: std::io::Error) -> ForwarderError {
    ForwarderError::InvalidPayload(format!("gzip object: {e}"))
}

async fn push_lines(splitter: &mut LineSplitter, sink: &mut LineSink) -> Result<(), ForwarderError> {
    while let Some(line) = splitter.next_line() {
        if !is_comment(&line) {
            sink.push_line(&line).await?;
        }
    }
    Ok(())
}

/// Incremental line splitter over decompressed bytes.
///
/// Lines end at `\n`; a `\r` right before it is dropped. Bytes after the last
/// `\n` stay buffered until more data arrives or [`LineSplitter::finish`].
#[derive(Debug, Default)]
pub struct LineSplitter {
    buffer: BytesMut,
    // Bytes of `buffer` already known to contain no `\n`.
    scanned: usize,
}

impl LineSplitter {
    pub fn feed(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Next complete line, without its terminator.
    pub fn next_line(&mut self) -> Option<Bytes> {
        match self.buffer[self.scanned..].iter().position(|b| *b == b'\n') {
            Some(offset) => {
                let mut line = self.buffer.split_to(self.scanned + offset + 1);
                self.scanned = 0;
                line.truncate(line.len() - 1);
                Some(strip_carriage_return(line))
            }
            None => {
                self.scanned = self.buffer.len();
                None
            }
        }
    }

    /// Trailing bytes without a final `\n`, if any.
    pub fn finish(&mut self) -> Option<Bytes> {
        self.scanned = 0;
        if self.buffer.is_empty() {
            return None;
        }
        Some(strip_carriage_return(self.buffer.split()))
    }
}

fn strip_carriage_return(mut line: BytesMut) -> Bytes {
    if line.last() == Some(&b'\r') {
        line.truncate(line.len() - 1);
    }
    line.freeze()
}
