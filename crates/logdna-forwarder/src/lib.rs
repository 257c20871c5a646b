// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! # LogDNA Forwarder
//!
//! Buffering and shipping core of a container log forwarder. Raw log records
//! handed over by a host log-streaming framework are normalized into
//! envelopes, enriched with tags, accumulated into size- and time-bounded
//! batches and POSTed to the LogDNA ingest API.
//!
//! ## Pipeline
//!
//! ```text
//!   RawRecord (host)
//!        │  bounded channel
//!        v
//!   ┌──────────────┐
//!   │  Processor   │  (normalize, truncate, resolve tags)
//!   └──────┬───────┘
//!          │  bounded intake channel (backpressure)
//!          v
//!   ┌──────────────┐  <── retry channel (unbounded) ──┐
//!   │  Aggregator  │  (single consumer, owns batch)   │
//!   │   Service    │                                  │
//!   └──────┬───────┘                                  │
//!          │  size threshold or flush timer           │
//!          v                                          │
//!   ┌──────────────┐                           ┌──────┴───────┐
//!   │   Flusher    │ ── transport failure ───> │    Retry     │
//!   └──────┬───────┘                           │   Governor   │
//!          │                                   └──────────────┘
//!          v
//!   LogDNA ingest API
//! ```
//!
//! ## Modules
//!
//! - [`agent`]: wiring of the pipeline and the producer-side normalizer task
//! - [`processor`]: entry normalization
//! - [`tags`]: literal and templated tag resolution
//! - [`aggregator`]: the batch buffer
//! - [`aggregator_service`]: the consumer task and flush scheduling
//! - [`flusher`]: wire serialization and HTTP shipment
//! - [`retry`]: re-submission of transiently failed entries
//! - [`http`]: HTTP client construction and the retrying transport
//! - [`config`]: configuration values and environment loading
//! - [`metrics`]: counters for requests, status codes and failures
//! - [`logger`]: the agent's own log line format

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

pub mod agent;
pub mod aggregator;
pub mod aggregator_service;
pub mod config;
pub mod constants;
pub mod errors;
pub mod flusher;
pub mod http;
pub mod logger;
pub mod message;
pub mod metrics;
pub mod processor;
pub mod retry;
pub mod tags;
