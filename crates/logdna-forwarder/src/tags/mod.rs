// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Tag resolution.
//!
//! Each configured tag item is either a literal or a template. Templates are
//! compiled once when the resolver is built and evaluated per record. The
//! output of a template may hold several tags separated by `:`.
//!
//! Whatever happens, resolution never fails: an item whose template cannot
//! be compiled or evaluated contributes its raw text as a literal tag.

pub mod template;

use crate::message::RawRecord;
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashSet;
use tracing::{debug, warn};

pub use template::Template;

lazy_static! {
    /// A tag item is a template when it holds at least one `{{ ... }}` action.
    static ref TEMPLATE_PATTERN: Regex = template_pattern();
}

#[allow(clippy::expect_used)]
fn template_pattern() -> Regex {
    Regex::new(r"\{\{.+\}\}").expect("failed creating regex")
}

const TEMPLATE_OUTPUT_SEPARATOR: char = ':';

#[derive(Debug, Clone)]
enum TagItem {
    Literal(String),
    Template { raw: String, template: Template },
}

/// Turns the configured tag list into the `tags` field of an envelope.
#[derive(Debug, Clone, Default)]
pub struct TagResolver {
    items: Vec<TagItem>,
}

#[must_use]
pub fn is_template(tag: &str) -> bool {
    TEMPLATE_PATTERN.is_match(tag)
}

impl TagResolver {
    #[must_use]
    pub fn new(tags: Vec<String>) -> Self {
        let probe = RawRecord::default();
        let items = tags
            .into_iter()
            .map(|raw| {
                if !is_template(&raw) {
                    return TagItem::Literal(raw);
                }
                // Field lookups are static, so a dry run on an empty record
                // surfaces evaluation errors once instead of on every line.
                match Template::parse(&raw).and_then(|t| t.execute(&probe).map(|_| t)) {
                    Ok(template) => TagItem::Template { raw, template },
                    Err(e) => {
                        warn!("LOGS | Tag template {raw:?} is invalid, using it as a literal: {e}");
                        TagItem::Literal(raw)
                    }
                }
            })
            .collect();

        TagResolver { items }
    }

    /// Comma separated, de-duplicated tags for `record`, in first-seen order.
    #[must_use]
    pub fn resolve(&self, record: &RawRecord) -> String {
        let mut seen: HashSet<String> = HashSet::new();
        let mut tags: Vec<String> = Vec::with_capacity(self.items.len());
        let mut push = |tag: &str| {
            if !tag.is_empty() && seen.insert(tag.to_string()) {
                tags.push(tag.to_string());
            }
        };

        for item in &self.items {
            match item {
                TagItem::Literal(tag) => push(tag),
                TagItem::Template { raw, template } => match template.execute(record) {
                    Ok(output) => {
                        for part in output.split(TEMPLATE_OUTPUT_SEPARATOR) {
                            push(part);
                        }
                    }
                    Err(e) => {
                        debug!("LOGS | Cannot execute tag template {raw:?}: {e}");
                        push(raw);
                    }
                },
            }
        }

        tags.join(",")
    }
}
