// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! The shipper.
//!
//! Serializes a batch as `{"lines": [...]}` and POSTs it to the ingest
//! endpoint through a [`Transport`]. What happens to a batch that did not
//! make it depends on why:
//!
//! | failure              | outcome                                  |
//! |----------------------|------------------------------------------|
//! | encoding             | logged with the failing indices, dropped |
//! | transport            | reported as worth a retry                |
//! | non-2xx response     | logged with status and body, dropped     |

use std::sync::Arc;
use std::time::Instant;

use reqwest::header::{CONTENT_TYPE, USER_AGENT};
use tracing::{debug, error};

use crate::config::{AuthMode, Config};
use crate::constants;
use crate::errors::ShippingError;
use crate::http::{IntakeResponse, Transport};
use crate::message::{Payload, QueueEntry};
use crate::metrics::Metrics;

/// What became of a batch handed to [`Flusher::flush`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    Delivered,
    /// Transport failure, the batch is worth another try.
    Retry,
    /// Encoding failure or rejection, logged and given up.
    Dropped,
}

#[derive(Clone)]
pub struct Flusher {
    client: reqwest::Client,
    url: String,
    config: Arc<Config>,
    transport: Arc<dyn Transport>,
    metrics: Arc<Metrics>,
}

impl Flusher {
    /// `client` is only used to assemble requests, `transport` sends them.
    #[must_use]
    pub fn new(
        config: Arc<Config>,
        client: reqwest::Client,
        transport: Arc<dyn Transport>,
        metrics: Arc<Metrics>,
    ) -> Self {
        let url = config.endpoint_url();
        Flusher {
            client,
            url,
            config,
            transport,
            metrics,
        }
    }

    /// Ships `batch`. The caller keeps the entries and decides what to do
    /// with them from the outcome.
    pub async fn flush(&self, batch: &[QueueEntry]) -> FlushOutcome {
        if batch.is_empty() {
            return FlushOutcome::Delivered;
        }

        let count = batch.len();
        debug!("LOGS | Flushing {count} lines");

        match self.ship(batch).await {
            Ok(_) => {
                self.metrics.add_shipped(count as u64);
                debug!("LOGS | Successfully flushed {count} lines");
                FlushOutcome::Delivered
            }
            Err(e) if e.is_transient() => {
                error!("LOGS | {e}");
                FlushOutcome::Retry
            }
            Err(e) => {
                error!("LOGS | Dropping {count} lines: {e}");
                FlushOutcome::Dropped
            }
        }
    }

    /// One shipment of `batch`, successful only for a 2xx answer.
    pub async fn ship(&self, batch: &[QueueEntry]) -> Result<IntakeResponse, ShippingError> {
        let body = self.encode(batch)?;
        let request = self.create_request(body)?;

        let time = Instant::now();
        let result = self.transport.send(request).await;
        self.metrics.add_request(time.elapsed());

        let response = match result {
            Ok(response) => response,
            Err(e) => {
                self.metrics.add_transport_error();
                return Err(e.into());
            }
        };

        self.metrics.add_status_code(response.status.as_u16());
        if response.status.is_success() {
            Ok(response)
        } else {
            Err(ShippingError::Rejected {
                status: response.status,
                body: response.body,
            })
        }
    }

    fn encode(&self, batch: &[QueueEntry]) -> Result<Vec<u8>, ShippingError> {
        match serde_json::to_vec(&Payload::from_entries(batch)) {
            Ok(body) => Ok(body),
            Err(e) => {
                self.metrics.add_encode_error();
                let failing: Vec<usize> = batch
                    .iter()
                    .enumerate()
                    .filter(|(_, entry)| serde_json::to_vec(&entry.line).is_err())
                    .map(|(i, _)| i)
                    .collect();
                error!("LOGS | Failed to encode lines at indices {failing:?}: {e}");
                Err(ShippingError::Encode(e.to_string()))
            }
        }
    }

    fn create_request(&self, body: Vec<u8>) -> Result<reqwest::Request, ShippingError> {
        let mut builder = self
            .client
            .post(&self.url)
            .query(&[("hostname", self.config.ingest_hostname.as_str())])
            .header(USER_AGENT, constants::USER_AGENT)
            .header(CONTENT_TYPE, constants::CONTENT_TYPE);

        builder = match self.config.auth_mode {
            AuthMode::Basic => builder.basic_auth(&self.config.api_key, Some("")),
            AuthMode::QueryKey => builder.query(&[("apikey", self.config.api_key.as_str())]),
        };

        builder
            .body(body)
            .build()
            .map_err(|e| ShippingError::Request(e.to_string()))
    }
}
