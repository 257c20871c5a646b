// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Defaults and fixed values of the LogDNA ingest pipeline.
//!
//! Every default here can be overridden through [`crate::config::Config`];
//! only the truncation suffix, the user agent and the content type are fixed.

use std::time::Duration;

/// Appended to messages cut at `max_line_length`. Its bytes come on top of
/// the limit.
pub const TRUNCATION_SUFFIX: &str = " (cut off, too long...)";

/// Ingest endpoint used when `LOGDNA_URL` is not set. The scheme is added
/// when the URL is built.
pub const DEFAULT_LOGDNA_URL: &str = "logs.logdna.com/logs/ingest";

/// Value of the `hostname` query parameter identifying this shipping agent.
pub const DEFAULT_INGEST_HOSTNAME: &str = "logdna_logspout";

/// Period of the flush timer.
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_millis(250);

/// Byte threshold of a batch, 2 MiB.
///
/// Only the serialized envelopes count, the JSON framing of the payload does
/// not.
pub const DEFAULT_MAX_BUFFER_SIZE: usize = 2 * 1_024 * 1_024;

/// Longest message kept intact. LogDNA rejects lines above 16KB.
pub const DEFAULT_MAX_LINE_LENGTH: usize = 16_000;

/// How many times one entry may go back through the pipeline after a
/// transport failure.
pub const DEFAULT_MAX_REQUEST_RETRY: u64 = 5;

/// Attempts made by the HTTP transport itself before a request is reported
/// as failed.
pub const DEFAULT_HTTP_CLIENT_RETRY: u64 = 2;

pub const DEFAULT_BACKOFF_INTERVAL: Duration = Duration::from_millis(2);
pub const DEFAULT_JITTER_INTERVAL: Duration = Duration::from_millis(5);

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_TLS_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(90);

/// Capacity of the bounded channels between producers and the consumer.
/// Producers wait once it is reached.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1_000;

pub const CONTENT_TYPE: &str = "application/json; charset=UTF-8";

/// `User-Agent` header value sent with every batch.
pub const USER_AGENT: &str = concat!("logdna-forwarder/", env!("CARGO_PKG_VERSION"));
