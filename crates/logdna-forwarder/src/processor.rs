// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Entry normalization.
//!
//! Turns a [`RawRecord`] into the [`QueueEntry`] the batch buffer holds:
//!
//! ```text
//!   RawRecord ──> truncate message ──> level / hostname / tags ──> Envelope
//!                                                                     │
//!                                                       serde_json    v
//!                                        QueueEntry { Line { timestamp, line, file } }
//! ```
//!
//! Empty payloads are skipped. An envelope that cannot be serialized is
//! counted, logged and dropped.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::error;

use crate::config::Config;
use crate::constants::TRUNCATION_SUFFIX;
use crate::errors::ProcessError;
use crate::message::{ContainerInfo, Envelope, Line, QueueEntry, RawRecord};
use crate::metrics::Metrics;
use crate::tags::TagResolver;

pub const LEVEL_INFO: &str = "INFO";
pub const LEVEL_ERROR: &str = "ERROR";

#[derive(Debug, Clone)]
pub struct LogsProcessor {
    config: Arc<Config>,
    tags: TagResolver,
    metrics: Arc<Metrics>,
}

impl LogsProcessor {
    #[must_use]
    pub fn new(config: Arc<Config>, metrics: Arc<Metrics>) -> Self {
        let tags = TagResolver::new(config.tags.clone());
        LogsProcessor {
            config,
            tags,
            metrics,
        }
    }

    /// Normalizes one record. `Ok(None)` means the record carried no payload.
    pub fn process(&self, record: &RawRecord) -> Result<Option<QueueEntry>, ProcessError> {
        if record.data.is_empty() {
            return Ok(None);
        }

        let envelope = self.envelope(record);
        let line = match serde_json::to_string(&envelope) {
            Ok(line) => line,
            Err(source) => {
                self.metrics.add_marshal_error();
                error!(
                    "LOGS | JSON marshalling error: {source}. Missing message data: {}",
                    record.data
                );
                return Err(ProcessError::Marshal {
                    source,
                    data: record.data.clone(),
                });
            }
        };

        Ok(Some(QueueEntry::new(Line {
            timestamp: now_epoch_seconds(),
            line,
            file: record.container.name.clone(),
        })))
    }

    #[must_use]
    pub fn envelope(&self, record: &RawRecord) -> Envelope {
        let mut container: ContainerInfo = record.container.clone();
        container.name = container.name.trim_matches('/').to_string();

        Envelope {
            message: truncate(&record.data, self.config.max_line_length),
            container,
            level: level(&record.source, record.priority.as_deref()),
            hostname: self.hostname(record),
            tags: self.tags.resolve(record),
        }
    }

    fn hostname(&self, record: &RawRecord) -> String {
        if self.config.hostname.is_empty() {
            record.container.config.hostname.clone()
        } else {
            self.config.hostname.clone()
        }
    }
}

/// Cuts `message` to at most `max_length` bytes, backing off to a character
/// boundary, and appends [`TRUNCATION_SUFFIX`]. A `max_length` of 0 keeps the
/// message as is.
#[must_use]
pub fn truncate(message: &str, max_length: usize) -> String {
    if max_length == 0 || message.len() <= max_length {
        return message.to_string();
    }

    let mut cut = max_length;
    while !message.is_char_boundary(cut) {
        cut -= 1;
    }

    let mut truncated = String::with_capacity(cut + TRUNCATION_SUFFIX.len());
    truncated.push_str(&message[..cut]);
    truncated.push_str(TRUNCATION_SUFFIX);
    truncated
}

/// Level of a record: the explicit priority if any, otherwise derived from
/// the stream.
#[must_use]
pub fn level(source: &str, priority: Option<&str>) -> String {
    if let Some(priority) = priority.filter(|p| !p.is_empty()) {
        return priority.to_string();
    }
    match source {
        "stdout" => LEVEL_INFO.to_string(),
        "stderr" => LEVEL_ERROR.to_string(),
        _ => String::new(),
    }
}

fn now_epoch_seconds() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .ok()
        .and_then(|d| i64::try_from(d.as_secs()).ok())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::ContainerConfig;
    use proptest::prelude::*;
    use serde_json::Value;

    fn processor(config: Config) -> LogsProcessor {
        LogsProcessor::new(Arc::new(config), Arc::new(Metrics::new()))
    }

    fn config() -> Config {
        Config {
            api_key: "key".to_string(),
            ..Default::default()
        }
    }

    fn record(data: &str, source: &str) -> RawRecord {
        RawRecord {
            data: data.to_string(),
            source: source.to_string(),
            priority: None,
            container: ContainerInfo {
                name: "/web".to_string(),
                id: "c0ffee".to_string(),
                pid: Some(7),
                config: ContainerConfig {
                    image: "nginx".to_string(),
                    hostname: "container-host".to_string(),
                    labels: Default::default(),
                },
            },
        }
    }

    fn envelope_json(entry: &QueueEntry) -> Value {
        serde_json::from_str(&entry.line.line).unwrap()
    }

    #[test]
    fn test_empty_payload_is_skipped() {
        let processor = processor(config());
        assert!(processor.process(&record("", "stdout")).unwrap().is_none());
    }

    #[test]
    fn test_process_builds_line() {
        let processor = processor(config());
        let entry = processor
            .process(&record("hello", "stdout"))
            .unwrap()
            .unwrap();

        assert_eq!(entry.retry_count, 0);
        assert_eq!(entry.line.file, "/web");
        assert!(entry.line.timestamp > 0);

        let json = envelope_json(&entry);
        assert_eq!(json["message"], "hello");
        assert_eq!(json["level"], "INFO");
        assert_eq!(json["hostname"], "container-host");
        assert_eq!(json["tags"], "");
        assert_eq!(json["container"]["name"], "web");
        assert_eq!(json["container"]["id"], "c0ffee");
        assert_eq!(json["container"]["pid"], 7);
        assert_eq!(json["container"]["config"]["image"], "nginx");
    }

    #[test]
    fn test_size_is_serialized_envelope_length() {
        let processor = processor(config());
        let entry = processor.process(&record("abc", "stdout")).unwrap().unwrap();
        assert_eq!(entry.size(), entry.line.line.len());
    }

    #[test]
    fn test_level_from_stream_and_priority() {
        assert_eq!(level("stdout", None), "INFO");
        assert_eq!(level("stderr", None), "ERROR");
        assert_eq!(level("journal", None), "");
        assert_eq!(level("stdout", Some("WARN")), "WARN");
        assert_eq!(level("stderr", Some("")), "ERROR");
    }

    #[test]
    fn test_configured_hostname_wins() {
        let processor = processor(Config {
            hostname: "static-host".to_string(),
            ..config()
        });
        let entry = processor.process(&record("x", "stderr")).unwrap().unwrap();
        let json = envelope_json(&entry);
        assert_eq!(json["hostname"], "static-host");
        assert_eq!(json["level"], "ERROR");
    }

    #[test]
    fn test_tags_are_resolved() {
        let processor = processor(Config {
            tags: vec![
                "static".to_string(),
                "{{.Container.Config.Image}}".to_string(),
                "static".to_string(),
            ],
            ..config()
        });
        let envelope = processor.envelope(&record("x", "stdout"));
        assert_eq!(envelope.tags, "static,nginx");
    }

    #[test]
    fn test_truncation_applies_to_envelope_message() {
        let processor = processor(Config {
            max_line_length: 5,
            ..config()
        });
        let envelope = processor.envelope(&record("0123456789", "stdout"));
        assert_eq!(envelope.message, "01234 (cut off, too long...)");
    }

    #[test]
    fn test_truncate_keeps_short_messages_and_zero_limit() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("exact", 5), "exact");
        assert_eq!(truncate("anything goes", 0), "anything goes");
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        // "é" is two bytes, cutting at 2 would split it
        let truncated = truncate("aéb", 2);
        assert_eq!(truncated, format!("a{TRUNCATION_SUFFIX}"));
    }

    proptest! {
        #[test]
        fn prop_truncated_ascii_length(message in "[a-zA-Z0-9 ]{0,200}", max in 1usize..100) {
            let truncated = truncate(&message, max);
            if message.len() > max {
                prop_assert_eq!(truncated.len(), max + TRUNCATION_SUFFIX.len());
                prop_assert!(truncated.ends_with(TRUNCATION_SUFFIX));
                prop_assert!(message.starts_with(&truncated[..max]));
            } else {
                prop_assert_eq!(truncated, message);
            }
        }

        #[test]
        fn prop_truncated_never_exceeds_limit_plus_suffix(message in "\\PC{0,100}", max in 1usize..64) {
            let truncated = truncate(&message, max);
            prop_assert!(truncated.len() <= max + TRUNCATION_SUFFIX.len());
        }
    }
}
