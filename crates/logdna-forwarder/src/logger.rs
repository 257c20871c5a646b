// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Line format of the forwarder's own logs.
//!
//! ```text
//! logdna-forwarder | INFO | LOGS | Successfully flushed 12 lines
//! logdna-forwarder | DEBUG | flush{count=3}: LOGS | Flushing 3 lines
//! ```
//!
//! The prefix identifies the forwarder among the container logs it runs
//! next to; the binary sets it to the configured hostname when there is one.

use std::fmt;
use tracing_core::{Event, Subscriber};
use tracing_subscriber::fmt::{
    format::{self, FormatEvent, FormatFields},
    FmtContext, FormattedFields,
};
use tracing_subscriber::registry::LookupSpan;

pub const DEFAULT_PREFIX: &str = "logdna-forwarder";

#[derive(Debug, Clone)]
pub struct Formatter {
    prefix: String,
}

impl Default for Formatter {
    fn default() -> Self {
        Formatter::new(DEFAULT_PREFIX)
    }
}

impl Formatter {
    #[must_use]
    pub fn new(prefix: impl Into<String>) -> Self {
        Formatter {
            prefix: prefix.into(),
        }
    }
}

impl<S, N> FormatEvent<S, N> for Formatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: format::Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let metadata = event.metadata();
        write!(&mut writer, "{} | {} | ", self.prefix, metadata.level())?;

        if let Some(scope) = ctx.event_scope() {
            for span in scope.from_root() {
                write!(writer, "{}", span.name())?;

                let ext = span.extensions();
                if let Some(fields) = ext.get::<FormattedFields<N>>() {
                    if !fields.is_empty() {
                        write!(writer, "{{{fields}}}")?;
                    }
                }
                write!(writer, ": ")?;
            }
        }

        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::{Arc, Mutex};
    use tracing::{info, info_span, warn};

    #[derive(Clone, Default)]
    struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

    impl io::Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn capture(formatter: Formatter, f: impl FnOnce()) -> String {
        let buffer = SharedBuffer::default();
        let writer = buffer.clone();
        let subscriber = tracing_subscriber::fmt::Subscriber::builder()
            .with_ansi(false)
            .event_format(formatter)
            .with_writer(move || writer.clone())
            .finish();
        tracing::subscriber::with_default(subscriber, f);
        let bytes = buffer.0.lock().unwrap().clone();
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn test_prefix_and_level() {
        let output = capture(Formatter::new("web-1"), || info!("LOGS | hello"));
        assert_eq!(output, "web-1 | INFO | LOGS | hello\n");
    }

    #[test]
    fn test_default_prefix() {
        let output = capture(Formatter::default(), || warn!("careful"));
        assert_eq!(output, "logdna-forwarder | WARN | careful\n");
    }

    #[test]
    fn test_span_context_is_included() {
        let output = capture(Formatter::default(), || {
            let span = info_span!("flush", count = 3);
            let _guard = span.enter();
            info!("shipping");
        });
        assert_eq!(output, "logdna-forwarder | INFO | flush{count=3}: shipping\n");
    }
}
