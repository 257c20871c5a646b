// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! The batch buffer.
//!
//! Entries accumulate in arrival order together with the byte size of their
//! serialized envelopes. The buffer only knows whether the size threshold is
//! reached; when to flush is decided by
//! [`crate::aggregator_service::AggregatorService`], which is also its only
//! owner.

use crate::constants;
use crate::message::QueueEntry;

#[derive(Debug, Clone)]
pub struct Aggregator {
    entries: Vec<QueueEntry>,
    size: usize,
    max_buffer_size: usize,
}

impl Default for Aggregator {
    fn default() -> Self {
        Aggregator::new(constants::DEFAULT_MAX_BUFFER_SIZE)
    }
}

impl Aggregator {
    #[must_use]
    pub fn new(max_buffer_size: usize) -> Self {
        Aggregator {
            entries: Vec::new(),
            size: 0,
            max_buffer_size,
        }
    }

    /// Appends `entry`. Returns `true` once the accumulated size reaches the
    /// threshold, in which case the batch must be taken before anything else
    /// is added.
    pub fn add(&mut self, entry: QueueEntry) -> bool {
        self.size = self.size.saturating_add(entry.size());
        self.entries.push(entry);
        self.is_full()
    }

    #[must_use]
    pub fn is_full(&self) -> bool {
        self.size >= self.max_buffer_size
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Sum of the `line` lengths of the buffered entries.
    #[must_use]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Hands the whole batch over and starts a fresh one.
    pub fn take_batch(&mut self) -> Vec<QueueEntry> {
        self.size = 0;
        std::mem::take(&mut self.entries)
    }

    /// Puts a batch that was taken but never shipped back in front of the
    /// entries added since.
    pub fn restore(&mut self, mut batch: Vec<QueueEntry>) {
        self.size = batch
            .iter()
            .map(QueueEntry::size)
            .fold(self.size, usize::saturating_add);
        batch.append(&mut self.entries);
        self.entries = batch;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Line;

    fn entry(text: &str) -> QueueEntry {
        QueueEntry::new(Line {
            timestamp: 1,
            line: text.to_string(),
            file: "/web".to_string(),
        })
    }

    #[test]
    fn test_default_threshold() {
        let aggregator = Aggregator::default();
        assert_eq!(aggregator.max_buffer_size, constants::DEFAULT_MAX_BUFFER_SIZE);
        assert!(aggregator.is_empty());
        assert_eq!(aggregator.size(), 0);
    }

    #[test]
    fn test_add_tracks_size_in_order() {
        let mut aggregator = Aggregator::new(100);
        assert!(!aggregator.add(entry("abc")));
        assert!(!aggregator.add(entry("defgh")));

        assert_eq!(aggregator.len(), 2);
        assert_eq!(aggregator.size(), 8);

        let batch = aggregator.take_batch();
        let lines: Vec<&str> = batch.iter().map(|e| e.line.line.as_str()).collect();
        assert_eq!(lines, vec!["abc", "defgh"]);
    }

    #[test]
    fn test_threshold_reached_on_equal_size() {
        let mut aggregator = Aggregator::new(6);
        assert!(!aggregator.add(entry("abc")));
        assert!(aggregator.add(entry("def")));
        assert!(aggregator.is_full());
    }

    #[test]
    fn test_single_oversized_entry_is_full() {
        let mut aggregator = Aggregator::new(4);
        assert!(aggregator.add(entry("way too long")));
        assert_eq!(aggregator.len(), 1);
    }

    #[test]
    fn test_take_batch_resets() {
        let mut aggregator = Aggregator::new(4);
        aggregator.add(entry("abcd"));

        let batch = aggregator.take_batch();
        assert_eq!(batch.len(), 1);
        assert!(aggregator.is_empty());
        assert_eq!(aggregator.size(), 0);
        assert!(!aggregator.is_full());
        assert!(aggregator.take_batch().is_empty());
    }

    #[test]
    fn test_restore_goes_before_newer_entries() {
        let mut aggregator = Aggregator::new(100);
        aggregator.add(entry("ab"));
        let batch = aggregator.take_batch();
        aggregator.add(entry("cde"));

        aggregator.restore(batch);

        assert_eq!(aggregator.size(), 5);
        let lines: Vec<String> = aggregator
            .take_batch()
            .into_iter()
            .map(|e| e.line.line)
            .collect();
        assert_eq!(lines, vec!["ab", "cde"]);
    }
}
