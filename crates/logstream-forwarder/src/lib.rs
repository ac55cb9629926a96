// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! # Log stream forwarder
//!
//! Forwards log lines delivered to a Lambda function to the log stream
//! ingestion API.
//!
//! - [`event`]: event shapes (CloudWatch Logs subscription, S3 notification) and
//!   the log stream they map to
//! - [`normalizer`]: decoding of either shape into newline-terminated lines
//! - [`line_stream`]: bounded byte stream between the normalizer and the request
//! - [`forwarder`]: the streamed ingestion request
//! - [`handler`]: one invocation end to end

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

pub mod config;
pub mod credentials;
pub mod encoding;
pub mod error;
pub mod event;
pub mod forwarder;
pub mod handler;
pub mod http;
pub mod identity;
pub mod line_stream;
pub mod normalizer;
pub mod objects;
pub mod reporter;
