// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Records flowing through the pipeline, from the host intake to the wire.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One log record as handed over by the host log-streaming framework.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRecord {
    /// The log payload. Empty payloads are skipped.
    #[serde(default)]
    pub data: String,
    /// Stream the line was read from, `stdout` or `stderr`.
    #[serde(default)]
    pub source: String,
    /// Explicit level supplied by the host. Wins over the stream-derived one.
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub container: ContainerInfo,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerInfo {
    /// Name as reported by the runtime, usually with a leading `/`.
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
    #[serde(default)]
    pub config: ContainerConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerConfig {
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub hostname: String,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

/// Normalized record. Its JSON form is the `line` sent to LogDNA.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Envelope {
    pub message: String,
    pub container: ContainerInfo,
    pub level: String,
    pub hostname: String,
    pub tags: String,
}

/// Wire entry of the `lines` array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Line {
    /// Epoch seconds at which the entry entered the pipeline.
    pub timestamp: i64,
    /// The serialized [`Envelope`].
    pub line: String,
    /// Originating source name.
    pub file: String,
}

/// Unit held by the batch buffer and carried through the retry path.
///
/// `retry_count` never leaves the process, only `line` is serialized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueEntry {
    pub line: Line,
    pub retry_count: u64,
}

impl QueueEntry {
    #[must_use]
    pub fn new(line: Line) -> Self {
        QueueEntry {
            line,
            retry_count: 0,
        }
    }

    /// Bytes this entry adds to the batch size.
    #[must_use]
    pub fn size(&self) -> usize {
        self.line.line.len()
    }
}

/// Body of the POST request.
#[derive(Debug, Serialize)]
pub struct Payload<'a> {
    pub lines: Vec<&'a Line>,
}

/// Owned counterpart of [`Payload`], used when reading a body back.
#[derive(Debug, Deserialize)]
pub struct ReceivedPayload {
    pub lines: Vec<Line>,
}

impl<'a> Payload<'a> {
    #[must_use]
    pub fn from_entries(entries: &'a [QueueEntry]) -> Self {
        Payload {
            lines: entries.iter().map(|entry| &entry.line).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(timestamp: i64, text: &str, file: &str) -> QueueEntry {
        QueueEntry::new(Line {
            timestamp,
            line: text.to_string(),
            file: file.to_string(),
        })
    }

    #[test]
    fn test_payload_round_trip_keeps_order() {
        let entries = vec![
            line(1_700_000_000, r#"{"message":"first"}"#, "/web"),
            line(1_700_000_001, r#"{"message":"second \"quoted\""}"#, "/db"),
            line(1_700_000_001, "", "/web"),
        ];

        let body = serde_json::to_vec(&Payload::from_entries(&entries)).unwrap();
        let decoded: ReceivedPayload = serde_json::from_slice(&body).unwrap();

        let expected: Vec<Line> = entries.into_iter().map(|e| e.line).collect();
        assert_eq!(decoded.lines, expected);
    }

    #[test]
    fn test_retry_count_is_not_serialized() {
        let mut entry = line(42, "x", "/web");
        entry.retry_count = 3;

        let body = serde_json::to_string(&Payload::from_entries(&[entry])).unwrap();
        assert_eq!(
            body,
            r#"{"lines":[{"timestamp":42,"line":"x","file":"/web"}]}"#
        );
    }

    #[test]
    fn test_raw_record_deserializes_with_missing_fields() {
        let record: RawRecord =
            serde_json::from_str(r#"{"data":"hello","source":"stdout"}"#).unwrap();
        assert_eq!(record.data, "hello");
        assert_eq!(record.priority, None);
        assert!(record.container.config.labels.is_empty());
    }

    #[test]
    fn test_pid_skipped_when_absent() {
        let info = ContainerInfo {
            name: "web".to_string(),
            ..Default::default()
        };
        let json = serde_json::to_string(&info).unwrap();
        assert!(!json.contains("pid"));
    }
}
