use thiserror::Error;

/// Errors that can occur while parsing ingress bytes, mutating the
/// registry, or serializing a retired registry to its sink.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// A custom error with a free-form message.
    #[error("Custom error: {0}")]
    Custom(String),

    /// The binary framing was malformed: bad magic, unknown type code,
    /// or a missing NUL terminator.
    #[error("framing error: {0}")]
    Framing(String),

    /// The text grammar could not be parsed (bad number, unknown type
    /// letter, etc). Partial lines are not represented as this error.
    #[error("parse error: {0}")]
    Parse(String),

    /// A `HistogramConfig` resolved for a metric name was structurally
    /// invalid (fewer than 3 bins).
    #[error("invalid histogram config: {0}")]
    InvalidHistogramConfig(String),

    /// An I/O error from the standard library, surfaced by the
    /// downstream serializer sink.
    #[error("Std Io error: {0}")]
    StdIo(#[from] std::io::Error),

    /// Failed to record a value into the timer quantile sketch.
    #[error("Histogram record error: {0}")]
    Histogram(#[from] hdrhistogram::RecordError),

    /// Failed to construct the timer quantile sketch.
    #[error("Histogram creation error: {0}")]
    HistogramCreation(#[from] hdrhistogram::CreationError),
}

impl From<String> for MetricsError {
    fn from(value: String) -> Self {
        Self::Custom(value)
    }
}

impl From<&str> for MetricsError {
    fn from(value: &str) -> Self {
        Self::Custom(value.to_string())
    }
}
