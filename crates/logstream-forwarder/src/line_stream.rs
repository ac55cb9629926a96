// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Bounded single-producer/single-consumer byte stream between the normalizer
//! and the HTTP request body.
//!
//! The producer waits whenever `capacity` chunks are queued and unread, so a slow
//! upload never makes the forwarder buffer a whole object. Dropping or finishing
//! the [`LineSink`] ends the body.

use crate::error::ForwarderError;
use bytes::{BufMut, Bytes, BytesMut};
use futures::Stream;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;

/// Chunks allowed in flight between producer and HTTP client.
pub const LINE_STREAM_CAPACITY: usize = 64;

type Chunk = Result<Bytes, io::Error>;

pub fn channel(capacity: usize) -> (LineSink, LineBody) {
    let (tx, rx) = mpsc::channel(capacity);
    (LineSink { tx, lines: 0 }, LineBody { rx })
}

#[derive(Debug)]
pub struct LineSink {
    tx: mpsc::Sender<Chunk>,
    lines: u64,
}

impl LineSink {
    /// Pushes one line, adding the trailing `\n` when it is missing.
    ///
    /// Fails with [`ForwarderError::StreamClosed`] once the consumer is gone.
    pub async fn push_line(&mut self, line: &[u8]) -> Result<(), ForwarderError> {
        let chunk = if line.ends_with(b"\n") {
            Bytes::copy_from_slice(line)
        } else {
            let mut chunk = BytesMut::with_capacity(line.len() + 1);
            chunk.extend_from_slice(line);
            chunk.put_u8(b'\n');
            chunk.freeze()
        };
        self.tx
            .send(Ok(chunk))
            .await
            .map_err(|_| ForwarderError::StreamClosed)?;
        self.lines += 1;
        Ok(())
    }

    /// Lines accepted so far.
    pub fn lines(&self) -> u64 {
        self.lines
    }

    /// Fails the body so the request cannot complete as if all lines were sent.
    pub async fn abort(&mut self, reason: &ForwarderError) {
        // Nothing to fail if the consumer already went away.
        let _ = self.tx.send(Err(io::Error::other(reason.to_string()))).await;
    }

    /// Ends the stream and returns the number of lines pushed.
    pub fn finish(self) -> u64 {
        self.lines
    }
}

/// Consumer half, read by the HTTP client as a streamed request body.
#[derive(Debug)]
pub struct LineBody {
    rx: mpsc::Receiver<Chunk>,
}

impl LineBody {
    pub fn into_body(self) -> reqwest::Body {
        reqwest::Body::wrap_stream(self)
    }
}

impl Stream for LineBody {
    type Item = Chunk;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}
