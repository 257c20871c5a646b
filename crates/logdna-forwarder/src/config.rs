// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::constants;
use crate::errors::ConfigError;
use std::env;
use std::time::Duration;

/// How the API key is presented to the ingest endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthMode {
    /// HTTP Basic, key as username and an empty password.
    #[default]
    Basic,
    /// `apikey` query parameter.
    QueryKey,
}

/// Tag configuration as it may arrive from the outside: one comma separated
/// string or a list. Normalized with [`TagSpec::into_tags`] before it reaches
/// the resolver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagSpec {
    Delimited(String),
    List(Vec<String>),
}

impl TagSpec {
    /// Ordered tag items, trimmed, without empty items.
    #[must_use]
    pub fn into_tags(self) -> Vec<String> {
        let items: Vec<String> = match self {
            TagSpec::Delimited(s) => s.split(',').map(str::to_string).collect(),
            TagSpec::List(list) => list,
        };
        items
            .into_iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect()
    }
}

/// Configuration of the forwarder. Read-only once the pipeline is built.
#[derive(Debug, Clone)]
pub struct Config {
    /// LogDNA ingestion key
    pub api_key: String,
    /// Ingest URL, with or without scheme
    pub endpoint: String,
    pub auth_mode: AuthMode,
    /// Static hostname for every envelope. Empty means the container's own.
    pub hostname: String,
    /// Sent as the `hostname` query parameter
    pub ingest_hostname: String,
    pub tags: Vec<String>,
    pub flush_interval: Duration,
    pub max_buffer_size: usize,
    /// 0 disables truncation
    pub max_line_length: usize,
    pub max_request_retry: u64,
    pub http_client_retry: u64,
    pub backoff_interval: Duration,
    pub jitter_interval: Duration,
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
    pub tls_handshake_timeout: Duration,
    pub idle_timeout: Duration,
    pub queue_capacity: usize,
    /// Forces debug logging of the agent itself
    pub verbose: bool,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            endpoint: constants::DEFAULT_LOGDNA_URL.to_string(),
            auth_mode: AuthMode::default(),
            hostname: String::new(),
            ingest_hostname: constants::DEFAULT_INGEST_HOSTNAME.to_string(),
            tags: Vec::new(),
            flush_interval: constants::DEFAULT_FLUSH_INTERVAL,
            max_buffer_size: constants::DEFAULT_MAX_BUFFER_SIZE,
            max_line_length: constants::DEFAULT_MAX_LINE_LENGTH,
            max_request_retry: constants::DEFAULT_MAX_REQUEST_RETRY,
            http_client_retry: constants::DEFAULT_HTTP_CLIENT_RETRY,
            backoff_interval: constants::DEFAULT_BACKOFF_INTERVAL,
            jitter_interval: constants::DEFAULT_JITTER_INTERVAL,
            request_timeout: constants::DEFAULT_REQUEST_TIMEOUT,
            connect_timeout: constants::DEFAULT_CONNECT_TIMEOUT,
            tls_handshake_timeout: constants::DEFAULT_TLS_HANDSHAKE_TIMEOUT,
            idle_timeout: constants::DEFAULT_IDLE_TIMEOUT,
            queue_capacity: constants::DEFAULT_QUEUE_CAPACITY,
            verbose: false,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Create configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds the configuration from any variable source. Values that do not
    /// parse fall back to their default.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let string_opt = |name: &str| lookup(name).filter(|v| !v.is_empty());
        let uint_opt = |name: &str| string_opt(name).and_then(|v| v.trim().parse::<u64>().ok());

        let api_key = string_opt("LOGDNA_KEY").ok_or(ConfigError::MissingCredential("LOGDNA_KEY"))?;

        let auth_mode = match string_opt("LOGDNA_AUTH").map(|v| v.to_lowercase()) {
            None => defaults.auth_mode,
            Some(v) if v == "basic" => AuthMode::Basic,
            Some(v) if v == "query" => AuthMode::QueryKey,
            Some(v) => {
                return Err(ConfigError::Invalid(format!(
                    "LOGDNA_AUTH must be 'basic' or 'query', got '{v}'"
                )))
            }
        };

        let millis = |name: &str, default: Duration| {
            uint_opt(name).map_or(default, Duration::from_millis)
        };
        let secs = |name: &str, default: Duration| {
            uint_opt(name).map_or(default, Duration::from_secs)
        };

        let config = Self {
            api_key,
            endpoint: string_opt("LOGDNA_URL").unwrap_or(defaults.endpoint),
            auth_mode,
            hostname: string_opt("HOSTNAME").unwrap_or_default(),
            ingest_hostname: string_opt("INGEST_HOSTNAME").unwrap_or(defaults.ingest_hostname),
            tags: string_opt("TAGS")
                .map(|t| TagSpec::Delimited(t).into_tags())
                .unwrap_or_default(),
            flush_interval: millis("FLUSH_INTERVAL", defaults.flush_interval),
            max_buffer_size: uint_opt("MAX_BUFFER_SIZE")
                .and_then(|mib| usize::try_from(mib).ok())
                .map_or(defaults.max_buffer_size, |mib| {
                    mib.saturating_mul(1_024 * 1_024)
                }),
            max_line_length: uint_opt("MAX_LINE_LENGTH")
                .and_then(|v| usize::try_from(v).ok())
                .unwrap_or(defaults.max_line_length),
            max_request_retry: uint_opt("MAX_REQUEST_RETRY").unwrap_or(defaults.max_request_retry),
            http_client_retry: uint_opt("HTTP_CLIENT_RETRY").unwrap_or(defaults.http_client_retry),
            backoff_interval: millis("HTTP_CLIENT_BACKOFF", defaults.backoff_interval),
            jitter_interval: millis("HTTP_CLIENT_JITTER", defaults.jitter_interval),
            request_timeout: secs("HTTP_CLIENT_TIMEOUT", defaults.request_timeout),
            connect_timeout: secs("HTTP_CONNECT_TIMEOUT", defaults.connect_timeout),
            tls_handshake_timeout: secs(
                "HTTP_TLS_HANDSHAKE_TIMEOUT",
                defaults.tls_handshake_timeout,
            ),
            idle_timeout: secs("HTTP_IDLE_TIMEOUT", defaults.idle_timeout),
            queue_capacity: uint_opt("QUEUE_CAPACITY")
                .and_then(|v| usize::try_from(v).ok())
                .unwrap_or(defaults.queue_capacity),
            verbose: string_opt("VERBOSE").is_some_and(|v| {
                matches!(v.to_lowercase().as_str(), "1" | "true" | "yes")
            }),
            log_level: string_opt("LOG_LEVEL")
                .map(|v| v.to_lowercase())
                .unwrap_or(defaults.log_level),
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_key.trim().is_empty() {
            return Err(ConfigError::MissingCredential("LOGDNA_KEY"));
        }

        if self.endpoint.trim().is_empty() {
            return Err(ConfigError::Invalid("LOGDNA_URL cannot be empty".to_string()));
        }

        if self.flush_interval.is_zero() {
            return Err(ConfigError::Invalid(
                "FLUSH_INTERVAL must be greater than 0".to_string(),
            ));
        }

        if self.max_buffer_size == 0 {
            return Err(ConfigError::Invalid(
                "MAX_BUFFER_SIZE must be greater than 0".to_string(),
            ));
        }

        if self.queue_capacity == 0 {
            return Err(ConfigError::Invalid(
                "QUEUE_CAPACITY must be greater than 0".to_string(),
            ));
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&self.log_level.as_str()) {
            return Err(ConfigError::Invalid(format!(
                "Invalid log level '{}'. Must be one of: trace, debug, info, warn, error",
                self.log_level
            )));
        }

        Ok(())
    }

    /// Level the agent's own logger runs at.
    #[must_use]
    pub fn effective_log_level(&self) -> &str {
        if self.verbose {
            "debug"
        } else {
            &self.log_level
        }
    }

    /// Endpoint with an `https://` scheme unless one is present.
    #[must_use]
    pub fn endpoint_url(&self) -> String {
        let endpoint = self.endpoint.trim();
        if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
            endpoint.to_string()
        } else {
            format!("https://{endpoint}")
        }
    }
}
