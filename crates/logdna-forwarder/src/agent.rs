// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Pipeline wiring.
//!
//! [`Forwarder::start`] spawns two tasks:
//!
//! - [`LogsAgent`], which normalizes incoming [`RawRecord`]s and feeds the
//!   intake channel
//! - [`AggregatorService`], the single consumer owning the batch
//!
//! and returns a [`ForwarderHandle`] to feed and stop them.

use std::sync::Arc;

use tokio::sync::mpsc::{self, error::TryRecvError, Sender};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::aggregator_service::{AggregatorHandle, AggregatorService};
use crate::config::Config;
use crate::errors::ConfigError;
use crate::flusher::Flusher;
use crate::http::{self, HttpTransport, Transport};
use crate::message::RawRecord;
use crate::metrics::Metrics;
use crate::processor::LogsProcessor;

#[allow(clippy::module_name_repetitions)]
pub struct LogsAgent {
    rx: mpsc::Receiver<RawRecord>,
    processor: LogsProcessor,
    aggregator_handle: AggregatorHandle,
    cancel_token: CancellationToken,
}

impl LogsAgent {
    #[must_use]
    pub fn new(
        config: Arc<Config>,
        metrics: Arc<Metrics>,
        aggregator_handle: AggregatorHandle,
        cancel_token: CancellationToken,
    ) -> (Self, Sender<RawRecord>) {
        let (tx, rx) = mpsc::channel::<RawRecord>(config.queue_capacity.max(1));
        let processor = LogsProcessor::new(config, metrics);

        let agent = Self {
            rx,
            processor,
            aggregator_handle,
            cancel_token,
        };

        (agent, tx)
    }

    /// Processes records until cancellation, then drains what is already
    /// queued. Dropping the agent afterwards closes the intake channel.
    pub async fn spin(mut self) {
        loop {
            tokio::select! {
                record = self.rx.recv() => {
                    let Some(record) = record else {
                        debug!("LOGS_AGENT | All senders dropped");
                        break;
                    };
                    if !self.forward(&record).await {
                        break;
                    }
                }
                () = self.cancel_token.cancelled() => {
                    debug!("LOGS_AGENT | Received shutdown signal, draining remaining records");
                    self.rx.close();
                    loop {
                        match self.rx.try_recv() {
                            Ok(record) => {
                                if !self.forward(&record).await {
                                    break;
                                }
                            }
                            Err(TryRecvError::Empty | TryRecvError::Disconnected) => break,
                        }
                    }
                    break;
                }
            }
        }
        debug!("LOGS_AGENT | Stopped");
    }

    /// Returns `false` once the consumer is gone.
    async fn forward(&self, record: &RawRecord) -> bool {
        match self.processor.process(record) {
            Ok(Some(entry)) => {
                if self.aggregator_handle.insert(entry).await.is_err() {
                    error!("LOGS_AGENT | Aggregator is gone, dropping record");
                    return false;
                }
                true
            }
            // empty payload, or already counted and logged by the processor
            Ok(None) | Err(_) => true,
        }
    }
}

/// Entry point of the library.
pub struct Forwarder;

impl Forwarder {
    /// Starts the pipeline with the default HTTP transport.
    pub fn start_with_http(
        config: Arc<Config>,
        metrics: Arc<Metrics>,
    ) -> Result<ForwarderHandle, ConfigError> {
        config.validate()?;
        let client = http::get_client(&config)?;
        let transport = HttpTransport::new(
            client.clone(),
            http::RetryStrategy::from_config(&config),
        );
        Ok(Self::spawn(config, client, Arc::new(transport), metrics))
    }

    /// Starts the pipeline shipping through `transport`. Must be called from
    /// within a tokio runtime.
    pub fn start(
        config: Arc<Config>,
        transport: Arc<dyn Transport>,
        metrics: Arc<Metrics>,
    ) -> Result<ForwarderHandle, ConfigError> {
        config.validate()?;
        let client = http::get_client(&config)?;
        Ok(Self::spawn(config, client, transport, metrics))
    }

    fn spawn(
        config: Arc<Config>,
        client: reqwest::Client,
        transport: Arc<dyn Transport>,
        metrics: Arc<Metrics>,
    ) -> ForwarderHandle {
        let cancel_token = CancellationToken::new();
        // The consumer stops once the normalizer drops its intake handle, so
        // records drained by the normalizer on shutdown still get shipped.
        let aggregator_cancel_token = CancellationToken::new();
        let flusher = Flusher::new(Arc::clone(&config), client, transport, Arc::clone(&metrics));
        let (service, aggregator_handle) = AggregatorService::new(
            &config,
            flusher,
            Arc::clone(&metrics),
            aggregator_cancel_token.clone(),
        );
        let (agent, tx) = LogsAgent::new(
            config,
            Arc::clone(&metrics),
            aggregator_handle,
            cancel_token.clone(),
        );

        let agent_task = tokio::spawn(agent.spin());
        let aggregator_task = tokio::spawn(service.run());
        debug!("LOGS | Forwarder started");

        ForwarderHandle {
            tx,
            cancel_token,
            aggregator_cancel_token,
            agent_task,
            aggregator_task,
            metrics,
        }
    }
}

#[allow(clippy::module_name_repetitions)]
pub struct ForwarderHandle {
    tx: Sender<RawRecord>,
    cancel_token: CancellationToken,
    aggregator_cancel_token: CancellationToken,
    agent_task: JoinHandle<()>,
    aggregator_task: JoinHandle<()>,
    metrics: Arc<Metrics>,
}

impl ForwarderHandle {
    /// Producer side of the pipeline. Sending waits while the queue is full.
    #[must_use]
    pub fn sender(&self) -> Sender<RawRecord> {
        self.tx.clone()
    }

    /// Cancelling it stops intake; the consumer follows once the normalizer
    /// has drained.
    #[must_use]
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    #[must_use]
    pub fn metrics(&self) -> Arc<Metrics> {
        Arc::clone(&self.metrics)
    }

    /// Stops both tasks. Records already queued are still normalized and
    /// shipped with one last flush.
    pub async fn shutdown(self) {
        let ForwarderHandle {
            tx,
            cancel_token,
            aggregator_cancel_token,
            agent_task,
            aggregator_task,
            ..
        } = self;
        drop(tx);
        cancel_token.cancel();

        // the normalizer has to finish first, it feeds the consumer's drain
        if let Err(e) = agent_task.await {
            error!("LOGS | Normalizer task failed: {e}");
        }
        aggregator_cancel_token.cancel();
        if let Err(e) = aggregator_task.await {
            error!("LOGS | Aggregator task failed: {e}");
        }
        debug!("LOGS | Forwarder stopped");
    }
}
