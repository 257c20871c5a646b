// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! HTTP plumbing: the `reqwest` client and the [`Transport`] the shipper
//! sends its requests through.

use std::error::Error;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use rand::Rng;
use reqwest::{ClientBuilder, StatusCode};
use tracing::debug;

use crate::config::Config;
use crate::errors::{ConfigError, TransportError};

/// TCP keep-alive probe interval of pooled connections.
const TCP_KEEPALIVE: Duration = Duration::from_secs(30);

/// What came back from the ingest endpoint. The body is always read in full
/// so the connection can go back to the pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntakeResponse {
    pub status: StatusCode,
    pub body: String,
}

/// Sends one prepared request. Any HTTP status is a response; only failures
/// below HTTP are errors.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: reqwest::Request) -> Result<IntakeResponse, TransportError>;
}

/// How often and how fast [`HttpTransport`] repeats a request that failed at
/// the transport level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryStrategy {
    /// Up to `n` attempts, back to back.
    Immediate(u64),
    /// Up to `attempts` attempts, `interval` apart plus a random jitter in
    /// `[0, jitter]`.
    ConstantBackoff {
        attempts: u64,
        interval: Duration,
        jitter: Duration,
    },
}

impl RetryStrategy {
    /// One first attempt plus `http_client_retry` retries.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        let attempts = config.http_client_retry.saturating_add(1);
        if config.backoff_interval.is_zero() && config.jitter_interval.is_zero() {
            RetryStrategy::Immediate(attempts)
        } else {
            RetryStrategy::ConstantBackoff {
                attempts,
                interval: config.backoff_interval,
                jitter: config.jitter_interval,
            }
        }
    }

    #[must_use]
    pub fn attempts(&self) -> u64 {
        let attempts = match self {
            RetryStrategy::Immediate(attempts)
            | RetryStrategy::ConstantBackoff { attempts, .. } => *attempts,
        };
        attempts.max(1)
    }

    fn delay(&self) -> Option<Duration> {
        match self {
            RetryStrategy::Immediate(_) => None,
            RetryStrategy::ConstantBackoff {
                interval, jitter, ..
            } => {
                let jitter_ms = u64::try_from(jitter.as_millis()).unwrap_or(u64::MAX);
                let extra = if jitter_ms == 0 {
                    0
                } else {
                    rand::thread_rng().gen_range(0..=jitter_ms)
                };
                Some(interval.saturating_add(Duration::from_millis(extra)))
            }
        }
    }
}

/// [`Transport`] over a pooled `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    retry_strategy: RetryStrategy,
}

impl HttpTransport {
    #[must_use]
    pub fn new(client: reqwest::Client, retry_strategy: RetryStrategy) -> Self {
        HttpTransport {
            client,
            retry_strategy,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        Ok(HttpTransport::new(
            get_client(config)?,
            RetryStrategy::from_config(config),
        ))
    }

    async fn execute(&self, request: reqwest::Request) -> Result<IntakeResponse, reqwest::Error> {
        let resp = self.client.execute(request).await?;
        let status = resp.status();
        let body = match resp.text().await {
            Ok(body) => body,
            Err(e) => {
                debug!("LOGS | Failed to read response body for status {status}: {e}");
                String::new()
            }
        };
        Ok(IntakeResponse { status, body })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: reqwest::Request) -> Result<IntakeResponse, TransportError> {
        let max_attempts = self.retry_strategy.attempts();
        let mut attempts = 0;

        loop {
            attempts += 1;
            let time = Instant::now();
            let Some(attempt) = request.try_clone() else {
                // streaming bodies cannot be replayed
                return self
                    .execute(request)
                    .await
                    .map_err(|source| TransportError { attempts, source });
            };

            match self.execute(attempt).await {
                Ok(response) => return Ok(response),
                Err(e) => {
                    if attempts >= max_attempts {
                        debug!(
                            "LOGS | Request failed after {} ms and {} attempts: {:?}",
                            time.elapsed().as_millis(),
                            attempts,
                            e
                        );
                        return Err(TransportError {
                            attempts,
                            source: e,
                        });
                    }
                    debug!("LOGS | Attempt {attempts}/{max_attempts} failed: {e}");
                    if let Some(delay) = self.retry_strategy.delay() {
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }
    }
}

/// Builds the shared client with the configured timeouts. The TLS handshake
/// budget is folded into the connect timeout, which covers it in `reqwest`.
pub fn get_client(config: &Config) -> Result<reqwest::Client, ConfigError> {
    build_client(config).map_err(|e| ConfigError::HttpClient(e.to_string()))
}

fn build_client(config: &Config) -> Result<reqwest::Client, Box<dyn Error>> {
    let client = create_reqwest_client_builder()?
        .connect_timeout(
            config
                .connect_timeout
                .saturating_add(config.tls_handshake_timeout),
        )
        .timeout(config.request_timeout)
        .pool_idle_timeout(Some(config.idle_timeout))
        .tcp_keepalive(Some(TCP_KEEPALIVE));

    Ok(client.build()?)
}

#[cfg(not(feature = "fips"))]
pub fn create_reqwest_client_builder() -> Result<ClientBuilder, Box<dyn Error>> {
    Ok(reqwest::Client::builder().use_rustls_tls())
}

/// FIPS variant: TLS is configured from the process-wide crypto provider,
/// which must be FIPS compliant, and the native root certificates.
#[cfg(feature = "fips")]
pub fn create_reqwest_client_builder() -> Result<ClientBuilder, Box<dyn Error>> {
    let provider =
        rustls::crypto::CryptoProvider::get_default().ok_or("No crypto provider configured")?;

    if !provider.fips() {
        return Err("Crypto provider is not FIPS-compliant".into());
    }

    let mut roots = rustls::RootCertStore::empty();
    let mut valid_count = 0;
    for cert in rustls_native_certs::load_native_certs().certs {
        match roots.add(cert) {
            Ok(()) => valid_count += 1,
            Err(err) => debug!("Failed to parse certificate: {:?}", err),
        }
    }
    if valid_count == 0 {
        return Err("No valid certificates found in native root store".into());
    }

    let tls = rustls::ClientConfig::builder_with_provider(provider.clone())
        .with_protocol_versions(rustls::ALL_VERSIONS)
        .map_err(|_| "Failed to set protocol versions")?
        .with_root_certificates(roots)
        .with_no_client_auth();

    if !tls.fips() {
        return Err("The final TLS configuration is not FIPS-compliant".into());
    }

    Ok(reqwest::Client::builder().use_preconfigured_tls(tls))
}

/// Scripted [`Transport`] for unit tests: records every request and answers
/// from a queue of canned outcomes, `200 OK` once the queue is empty.
#[cfg(test)]
pub(crate) mod fake {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    #[derive(Debug, Clone)]
    pub(crate) enum Outcome {
        Status(u16, &'static str),
        TransportFailure,
        /// Never answers.
        Hang,
    }

    #[derive(Debug, Clone)]
    pub(crate) struct RecordedRequest {
        pub url: reqwest::Url,
        pub headers: reqwest::header::HeaderMap,
        pub body: Vec<u8>,
        pub at: tokio::time::Instant,
    }

    #[derive(Debug, Default)]
    pub(crate) struct RecordingTransport {
        outcomes: Mutex<VecDeque<Outcome>>,
        requests: Mutex<Vec<RecordedRequest>>,
    }

    impl RecordingTransport {
        pub(crate) fn with_outcomes(outcomes: Vec<Outcome>) -> Self {
            RecordingTransport {
                outcomes: Mutex::new(outcomes.into()),
                requests: Mutex::default(),
            }
        }

        pub(crate) fn requests(&self) -> Vec<RecordedRequest> {
            self.requests.lock().unwrap().clone()
        }

        /// The `line` fields of every recorded payload, one vec per request.
        pub(crate) fn shipped_lines(&self) -> Vec<Vec<String>> {
            self.requests()
                .iter()
                .map(|r| {
                    let payload: crate::message::ReceivedPayload =
                        serde_json::from_slice(&r.body).unwrap();
                    payload.lines.into_iter().map(|l| l.line).collect()
                })
                .collect()
        }
    }

    #[async_trait]
    impl Transport for RecordingTransport {
        async fn send(&self, request: reqwest::Request) -> Result<IntakeResponse, TransportError> {
            let body = request
                .body()
                .and_then(reqwest::Body::as_bytes)
                .map(<[u8]>::to_vec)
                .unwrap_or_default();
            self.requests.lock().unwrap().push(RecordedRequest {
                url: request.url().clone(),
                headers: request.headers().clone(),
                body,
                at: tokio::time::Instant::now(),
            });

            let outcome = self.outcomes.lock().unwrap().pop_front();
            match outcome {
                None => Ok(IntakeResponse {
                    status: StatusCode::OK,
                    body: String::new(),
                }),
                Some(Outcome::Status(code, body)) => Ok(IntakeResponse {
                    status: StatusCode::from_u16(code).unwrap(),
                    body: body.to_string(),
                }),
                Some(Outcome::Hang) => std::future::pending().await,
                Some(Outcome::TransportFailure) => {
                    let source = reqwest::Client::new()
                        .get("not a url")
                        .build()
                        .unwrap_err();
                    Err(TransportError {
                        attempts: 1,
                        source,
                    })
                }
            }
        }
    }
}
