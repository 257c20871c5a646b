// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Counters describing what the pipeline did.
//!
//! One [`Metrics`] instance is shared by every component through an `Arc`.
//! Exporting the values is left to the embedding process, which reads them
//! with [`Metrics::snapshot`].

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tracing::error;

#[derive(Debug, Default)]
pub struct Metrics {
    requests: AtomicU64,
    request_latency_count: AtomicU64,
    request_latency_micros: AtomicU64,
    status_codes: Mutex<BTreeMap<u16, u64>>,
    marshal_errors: AtomicU64,
    encode_errors: AtomicU64,
    transport_errors: AtomicU64,
    retried_entries: AtomicU64,
    dropped_entries: AtomicU64,
    shipped_entries: AtomicU64,
}

/// Point-in-time copy of [`Metrics`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub requests: u64,
    pub request_latency_count: u64,
    pub request_latency_micros: u64,
    pub status_codes: BTreeMap<u16, u64>,
    pub marshal_errors: u64,
    pub encode_errors: u64,
    pub transport_errors: u64,
    pub retried_entries: u64,
    pub dropped_entries: u64,
    pub shipped_entries: u64,
}

impl Metrics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_request(&self, latency: Duration) {
        self.requests.fetch_add(1, Ordering::Relaxed);
        self.request_latency_count.fetch_add(1, Ordering::Relaxed);
        let micros = u64::try_from(latency.as_micros()).unwrap_or(u64::MAX);
        self.request_latency_micros
            .fetch_add(micros, Ordering::Relaxed);
    }

    pub fn add_status_code(&self, status: u16) {
        match self.status_codes.lock() {
            Ok(mut codes) => *codes.entry(status).or_insert(0) += 1,
            Err(e) => error!("METRICS | status code map lock poisoned: {e}"),
        }
    }

    pub fn add_marshal_error(&self) {
        self.marshal_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_encode_error(&self) {
        self.encode_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_transport_error(&self) {
        self.transport_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_retried(&self, count: u64) {
        self.retried_entries.fetch_add(count, Ordering::Relaxed);
    }

    pub fn add_dropped(&self, count: u64) {
        self.dropped_entries.fetch_add(count, Ordering::Relaxed);
    }

    pub fn add_shipped(&self, count: u64) {
        self.shipped_entries.fetch_add(count, Ordering::Relaxed);
    }

    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        let status_codes = match self.status_codes.lock() {
            Ok(codes) => codes.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };
        MetricsSnapshot {
            requests: self.requests.load(Ordering::Relaxed),
            request_latency_count: self.request_latency_count.load(Ordering::Relaxed),
            request_latency_micros: self.request_latency_micros.load(Ordering::Relaxed),
            status_codes,
            marshal_errors: self.marshal_errors.load(Ordering::Relaxed),
            encode_errors: self.encode_errors.load(Ordering::Relaxed),
            transport_errors: self.transport_errors.load(Ordering::Relaxed),
            retried_entries: self.retried_entries.load(Ordering::Relaxed),
            dropped_entries: self.dropped_entries.load(Ordering::Relaxed),
            shipped_entries: self.shipped_entries.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_counters_accumulate() {
        let metrics = Metrics::new();
        metrics.add_request(Duration::from_millis(3));
        metrics.add_request(Duration::from_millis(2));
        metrics.add_status_code(200);
        metrics.add_status_code(200);
        metrics.add_status_code(503);
        metrics.add_transport_error();
        metrics.add_dropped(4);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.requests, 2);
        assert_eq!(snapshot.request_latency_micros, 5_000);
        assert_eq!(snapshot.status_codes.get(&200), Some(&2));
        assert_eq!(snapshot.status_codes.get(&503), Some(&1));
        assert_eq!(snapshot.transport_errors, 1);
        assert_eq!(snapshot.dropped_entries, 4);
        assert_eq!(snapshot.encode_errors, 0);
    }

    #[tokio::test]
    async fn test_concurrent_updates() {
        let metrics = Arc::new(Metrics::new());
        let mut tasks = Vec::new();
        for _ in 0..10 {
            let m = Arc::clone(&metrics);
            tasks.push(tokio::spawn(async move {
                m.add_status_code(200);
                m.add_retried(1);
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.status_codes.get(&200), Some(&10));
        assert_eq!(snapshot.retried_entries, 10);
    }
}
