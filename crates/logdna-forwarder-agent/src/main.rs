// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

use std::process::ExitCode;
use std::sync::Arc;

use tokio::io::{stdin, AsyncBufReadExt, BufReader};
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use logdna_forwarder::{
    agent::Forwarder,
    config::Config,
    logger::{self, Formatter},
    message::RawRecord,
    metrics::Metrics,
};

#[tokio::main]
pub async fn main() -> ExitCode {
    let config = Config::from_env();

    let (log_level, prefix) = match &config {
        Ok(c) => (
            c.effective_log_level().to_string(),
            if c.hostname.is_empty() {
                logger::DEFAULT_PREFIX.to_string()
            } else {
                c.hostname.clone()
            },
        ),
        Err(_) => ("info".to_string(), logger::DEFAULT_PREFIX.to_string()),
    };
    let env_filter = format!("h2=off,hyper=off,reqwest=off,rustls=off,{log_level}");

    let subscriber = tracing_subscriber::fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_new(env_filter).unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .event_format(Formatter::new(prefix))
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("setting default subscriber failed: {e}");
    }
    debug!("Logging subsystem enabled");

    let config = match config {
        Ok(c) => Arc::new(c),
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };

    let metrics = Arc::new(Metrics::new());
    let handle = match Forwarder::start_with_http(Arc::clone(&config), Arc::clone(&metrics)) {
        Ok(handle) => handle,
        Err(e) => {
            error!("Unable to start forwarder: {e}");
            return ExitCode::FAILURE;
        }
    };
    info!("Forwarding logs to {}", config.endpoint_url());

    let sender = handle.sender();
    let mut lines = BufReader::new(stdin()).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                match line {
                    Ok(Some(line)) if line.trim().is_empty() => {}
                    Ok(Some(line)) => match serde_json::from_str::<RawRecord>(&line) {
                        Ok(record) => {
                            if sender.send(record).await.is_err() {
                                error!("Forwarder stopped accepting records");
                                break;
                            }
                        }
                        Err(e) => warn!("Skipping malformed record: {e}"),
                    },
                    Ok(None) => {
                        debug!("End of input");
                        break;
                    }
                    Err(e) => {
                        error!("Failed to read input: {e}");
                        break;
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Received interrupt, shutting down");
                break;
            }
        }
    }

    drop(sender);
    handle.shutdown().await;

    let snapshot = metrics.snapshot();
    info!(
        "Shipped {} lines in {} requests, {} retried, {} dropped",
        snapshot.shipped_entries,
        snapshot.requests,
        snapshot.retried_entries,
        snapshot.dropped_entries
    );
    ExitCode::SUCCESS
}
