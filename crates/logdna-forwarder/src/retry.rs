// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! The retry governor.
//!
//! Entries of a batch that failed at the transport level go back to the
//! consumer one by one with their `retry_count` bumped, until they reach the
//! configured ceiling and are dropped. Re-submitted entries are batched again
//! together with whatever traffic arrived in the meantime.

use std::sync::Arc;

use tokio::sync::mpsc::UnboundedSender;
use tracing::{error, warn};

use crate::message::QueueEntry;
use crate::metrics::Metrics;

#[derive(Debug, Clone)]
pub struct RetryGovernor {
    max_request_retry: u64,
    tx: UnboundedSender<QueueEntry>,
    metrics: Arc<Metrics>,
}

/// What [`RetryGovernor::resubmit`] did with a failed batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetryOutcome {
    pub resubmitted: usize,
    pub dropped: usize,
}

impl RetryGovernor {
    #[must_use]
    pub fn new(max_request_retry: u64, tx: UnboundedSender<QueueEntry>, metrics: Arc<Metrics>) -> Self {
        RetryGovernor {
            max_request_retry,
            tx,
            metrics,
        }
    }

    pub fn resubmit(&self, failed: Vec<QueueEntry>) -> RetryOutcome {
        let mut outcome = RetryOutcome::default();

        for mut entry in failed {
            if entry.retry_count >= self.max_request_retry {
                warn!(
                    "LOGS | Dropping line after {} retries: {}",
                    entry.retry_count, entry.line.line
                );
                outcome.dropped += 1;
                continue;
            }

            entry.retry_count += 1;
            if let Err(e) = self.tx.send(entry) {
                // the consumer is gone, nothing will read this entry again
                error!(
                    "LOGS | Retry channel closed, dropping line: {}",
                    e.0.line.line
                );
                outcome.dropped += 1;
                continue;
            }
            outcome.resubmitted += 1;
        }

        self.metrics.add_retried(outcome.resubmitted as u64);
        self.metrics.add_dropped(outcome.dropped as u64);
        outcome
    }
}
