//! Picks text vs. binary mode per connection and drives the chosen
//! parser to exhaustion against a live [`Registry`].

use tracing::warn;

use crate::error::MetricsError;
use crate::ingress::binary::{BinaryParser, MAGIC};
use crate::ingress::source::ByteSource;
use crate::ingress::text::TextParser;
use crate::registry::Registry;
use crate::sample::{MetricType, Sample};

/// The wire mode a connection is pinned to for its whole lifetime, once
/// the first byte has been observed.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Mode {
    Text,
    Binary,
}

/// Drives one connection's byte stream: detects mode from the first
/// byte, then repeatedly parses and applies samples until the source
/// runs dry or a framing/parse error occurs.
pub struct ConnectionDriver {
    mode: Option<Mode>,
}

impl ConnectionDriver {
    #[must_use]
    pub fn new() -> Self {
        Self { mode: None }
    }

    /// The mode this connection has settled on, if any bytes have been
    /// seen yet.
    #[must_use]
    pub fn mode(&self) -> Option<Mode> {
        self.mode
    }

    /// Feeds every complete record/line currently buffered in `source`
    /// into `registry`. Returns once the source has no more complete
    /// records, or the first malformed record/line is hit — per §4.1/
    /// §4.2, a parse or framing error means the driver stops and the
    /// caller closes the connection.
    ///
    /// # Errors
    /// Returns the first [`MetricsError`] raised by the chosen parser.
    pub fn drive<S: ByteSource>(
        &mut self,
        source: &mut S,
        registry: &Registry,
    ) -> Result<(), MetricsError> {
        if self.mode.is_none() {
            let Some(first) = source.peek_byte() else {
                return Ok(());
            };
            self.mode = Some(if first == MAGIC {
                Mode::Binary
            } else {
                Mode::Text
            });
        }

        loop {
            let sample = match self.mode {
                Some(Mode::Text) => TextParser::parse_line(source)?,
                Some(Mode::Binary) => BinaryParser::parse_record(source)?,
                None => unreachable!("mode is set above before this loop runs"),
            };
            let Some(sample) = sample else {
                return Ok(());
            };
            registry.add_sample(&sample);
            if let Some(counter_name) = registry.input_counter_name() {
                registry.add_sample(&Sample::numeric(MetricType::Counter, counter_name, 1.0));
            }
        }
    }
}

impl Default for ConnectionDriver {
    fn default() -> Self {
        Self::new()
    }
}

/// Logs a dropped connection at the point its driver returned an error.
pub fn log_connection_error(err: &MetricsError) {
    warn!(error = %err, "connection closed after malformed input");
}
