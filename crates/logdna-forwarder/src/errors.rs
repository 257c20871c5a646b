// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Error types of the forwarder.
//!
//! Only [`ConfigError`] ever reaches the caller of the pipeline. Everything
//! else is handled inside the consumer, logged and counted.

use reqwest::StatusCode;

/// Invalid or missing configuration. Fatal at construction time.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Cannot find environment variable \"{0}\"")]
    MissingCredential(&'static str),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Unable to build HTTP client: {0}")]
    HttpClient(String),
}

/// A tag template that could not be compiled or evaluated.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TemplateError {
    #[error("unclosed action starting at byte {0}")]
    Unclosed(usize),

    #[error("missing value for action at byte {0}")]
    EmptyAction(usize),

    #[error("function \"{0}\" not defined")]
    UnknownFunction(String),

    #[error("unexpected \"{0}\" in action")]
    UnexpectedToken(String),

    #[error("can't evaluate field {0}")]
    UnknownField(String),

    #[error("can't index item of type {0}")]
    NotIndexable(String),

    #[error("{0} is a map, use index to read a key")]
    MapNotPrintable(String),
}

/// The normalizer could not serialize an envelope.
#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("JSON marshalling error: {source}. Missing message data: {data}")]
    Marshal {
        source: serde_json::Error,
        data: String,
    },
}

/// The HTTP exchange failed below the HTTP layer: connection refused, DNS,
/// timeout, broken connection. Always transient.
#[derive(Debug, thiserror::Error)]
#[error("HTTP client post request error after {attempts} attempt(s): {source}")]
pub struct TransportError {
    pub attempts: u64,
    #[source]
    pub source: reqwest::Error,
}

/// Why a batch was not delivered.
#[derive(Debug, thiserror::Error)]
pub enum ShippingError {
    /// The batch could not be serialized. Structural, never retried.
    #[error("JSON encoding error: {0}")]
    Encode(String),

    /// The request itself could not be built. Structural, never retried.
    #[error("invalid request: {0}")]
    Request(String),

    /// Transport failure. The batch goes to the retry governor.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The endpoint answered with a non-2xx status. Never retried.
    #[error("received status code {status} while sending message: {body}")]
    Rejected { status: StatusCode, body: String },
}

impl ShippingError {
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, ShippingError::Transport(_))
    }
}
