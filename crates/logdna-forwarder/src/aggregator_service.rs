// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! The consumer task and its flush schedule.
//!
//! [`AggregatorService`] exclusively owns the batch buffer. It waits on four
//! things at once:
//!
//! - the bounded intake channel fed through [`AggregatorHandle`]
//! - the retry channel fed by the [`RetryGovernor`]
//! - the flush timer
//! - cancellation
//!
//! A batch is flushed when its size reaches the threshold or when the timer
//! fires, whichever comes first. The timer is re-armed for a full interval
//! after every flush and after every elapse; plain arrivals do not touch it.
//!
//! Cancellation also interrupts a shipment in flight; its batch goes back to
//! the buffer. On cancellation, or once every intake handle is dropped, the
//! service drains what is already queued, flushes one last time within
//! `request_timeout` and stops. Entries that would still need a retry at that
//! point, or that the last flush could not ship in time, are dropped.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{sleep, timeout, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::aggregator::Aggregator;
use crate::config::Config;
use crate::flusher::{FlushOutcome, Flusher};
use crate::message::QueueEntry;
use crate::metrics::Metrics;
use crate::retry::RetryGovernor;

/// Producer side of the intake channel. Sending waits while the channel is
/// full.
#[derive(Clone, Debug)]
pub struct AggregatorHandle {
    tx: mpsc::Sender<QueueEntry>,
}

impl AggregatorHandle {
    pub async fn insert(&self, entry: QueueEntry) -> Result<(), mpsc::error::SendError<QueueEntry>> {
        self.tx.send(entry).await
    }
}

pub struct AggregatorService {
    aggregator: Aggregator,
    rx: mpsc::Receiver<QueueEntry>,
    retry_rx: mpsc::UnboundedReceiver<QueueEntry>,
    flusher: Flusher,
    retry: RetryGovernor,
    flush_interval: Duration,
    final_flush_timeout: Duration,
    metrics: Arc<Metrics>,
    cancel_token: CancellationToken,
}

impl AggregatorService {
    #[must_use]
    pub fn new(
        config: &Config,
        flusher: Flusher,
        metrics: Arc<Metrics>,
        cancel_token: CancellationToken,
    ) -> (Self, AggregatorHandle) {
        let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));
        let (retry_tx, retry_rx) = mpsc::unbounded_channel();

        let service = AggregatorService {
            aggregator: Aggregator::new(config.max_buffer_size),
            rx,
            retry_rx,
            flusher,
            retry: RetryGovernor::new(config.max_request_retry, retry_tx, Arc::clone(&metrics)),
            flush_interval: config.flush_interval,
            final_flush_timeout: config.request_timeout,
            metrics,
            cancel_token,
        };

        (service, AggregatorHandle { tx })
    }

    pub async fn run(mut self) {
        debug!("LOGS | Aggregator service started");

        let timer = sleep(self.flush_interval);
        tokio::pin!(timer);

        loop {
            tokio::select! {
                () = self.cancel_token.cancelled() => {
                    debug!("LOGS | Received shutdown signal, draining remaining entries");
                    break;
                }
                entry = self.rx.recv() => {
                    let Some(entry) = entry else {
                        debug!("LOGS | Intake channel closed");
                        break;
                    };
                    if self.add(entry).await {
                        timer.as_mut().reset(Instant::now() + self.flush_interval);
                    }
                }
                Some(entry) = self.retry_rx.recv() => {
                    if self.add(entry).await {
                        timer.as_mut().reset(Instant::now() + self.flush_interval);
                    }
                }
                () = &mut timer => {
                    if !self.aggregator.is_empty() {
                        self.flush().await;
                    }
                    timer.as_mut().reset(Instant::now() + self.flush_interval);
                }
            }
        }

        self.shutdown().await;
        debug!("LOGS | Aggregator service stopped");
    }

    /// Appends `entry` and flushes right away when the batch is full. Returns
    /// whether a flush happened.
    async fn add(&mut self, entry: QueueEntry) -> bool {
        if self.aggregator.add(entry) {
            self.flush().await;
            return true;
        }
        false
    }

    async fn flush(&mut self) {
        let batch = self.aggregator.take_batch();
        let outcome = tokio::select! {
            biased;
            () = self.cancel_token.cancelled() => None,
            outcome = self.flusher.flush(&batch) => Some(outcome),
        };

        match outcome {
            Some(FlushOutcome::Retry) => self.resubmit(batch),
            Some(FlushOutcome::Delivered | FlushOutcome::Dropped) => {}
            None => {
                debug!(
                    "LOGS | Shipment of {} lines interrupted by shutdown",
                    batch.len()
                );
                self.aggregator.restore(batch);
            }
        }
    }

    fn resubmit(&self, batch: Vec<QueueEntry>) {
        let outcome = self.retry.resubmit(batch);
        debug!(
            "LOGS | {} lines resubmitted, {} dropped",
            outcome.resubmitted, outcome.dropped
        );
    }

    /// Flush of the shutdown path. Cancellation is already signalled here, so
    /// the shipment is bounded by a timeout instead.
    async fn final_flush(&mut self) {
        if self.aggregator.is_empty() {
            return;
        }
        let batch = self.aggregator.take_batch();
        let outcome = timeout(self.final_flush_timeout, self.flusher.flush(&batch)).await;
        match outcome {
            Ok(FlushOutcome::Retry) => self.resubmit(batch),
            Ok(FlushOutcome::Delivered | FlushOutcome::Dropped) => {}
            Err(_) => {
                warn!(
                    "LOGS | Final flush did not finish within {:?}, dropping {} lines",
                    self.final_flush_timeout,
                    batch.len()
                );
                self.metrics.add_dropped(batch.len() as u64);
            }
        }
    }

    async fn shutdown(&mut self) {
        self.rx.close();
        // retries already queued are older than anything left in the intake
        let mut queued = Vec::new();
        while let Ok(entry) = self.retry_rx.try_recv() {
            queued.push(entry);
        }
        while let Ok(entry) = self.rx.try_recv() {
            queued.push(entry);
        }
        for entry in queued {
            if self.aggregator.add(entry) {
                self.final_flush().await;
            }
        }
        self.final_flush().await;

        let mut pending = 0u64;
        while let Ok(entry) = self.retry_rx.try_recv() {
            warn!(
                "LOGS | Shutting down, dropping line awaiting retry: {}",
                entry.line.line
            );
            pending += 1;
        }
        if pending > 0 {
            self.metrics.add_dropped(pending);
        }
    }
}
