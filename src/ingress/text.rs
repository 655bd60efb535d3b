//! Text (statsd-compatible) wire grammar: `name:value|type[|@sample_rate]`.

use crate::error::MetricsError;
use crate::ingress::source::ByteSource;
use crate::sample::{MetricType, Sample};

/// Parses one text-protocol line at a time off a [`ByteSource`].
pub struct TextParser;

impl TextParser {
    /// Attempts to parse the next complete line.
    ///
    /// Returns `Ok(None)` if no terminator is buffered yet (not an
    /// error — the driver just returns and is re-invoked once more bytes
    /// arrive). Returns `Ok(Some(sample))` for a successfully parsed
    /// line. Returns `Err` for a malformed line; per §4.1 the driver
    /// closes the connection on this path.
    ///
    /// # Errors
    /// Returns [`MetricsError::Parse`] if the line's grammar is invalid.
    pub fn parse_line<'s, S: ByteSource>(
        source: &'s mut S,
    ) -> Result<Option<Sample<'s>>, MetricsError> {
        let Some(line) = source.extract_until(b'\n') else {
            return Ok(None);
        };

        let colon = find(line, b':').ok_or_else(|| {
            MetricsError::Parse(format!("missing ':' in {}", lossy(line)))
        })?;
        let name_bytes = &line[..colon];
        if name_bytes.is_empty() || name_bytes.contains(&0) {
            return Err(MetricsError::Parse(format!(
                "empty or NUL-containing metric name in {}",
                lossy(line)
            )));
        }
        let name = std::str::from_utf8(name_bytes)
            .map_err(|_| MetricsError::Parse("metric name is not valid UTF-8".to_string()))?;

        let rest = &line[colon + 1..];
        let pipe = find(rest, b'|').ok_or_else(|| {
            MetricsError::Parse(format!("missing '|type' in {}", lossy(line)))
        })?;
        let value_bytes = &rest[..pipe];
        let after_pipe = &rest[pipe + 1..];

        let (type_byte, after_type) = after_pipe
            .split_first()
            .ok_or_else(|| MetricsError::Parse("missing type letter".to_string()))?;

        let sample_rate = parse_sample_rate_suffix(after_type)?;

        let sample = match type_byte {
            b'c' => {
                let mut value = parse_number(value_bytes)?;
                if let Some(rate) = sample_rate {
                    if rate > 0.0 && rate <= 1.0 {
                        value /= rate;
                    }
                }
                Sample::numeric(MetricType::Counter, name, value)
            }
            b'm' => Sample::numeric(MetricType::Timer, name, parse_number(value_bytes)?),
            b'k' => Sample::numeric(MetricType::KeyVal, name, parse_number(value_bytes)?),
            b'g' => {
                let (metric_type, num_slice) = match value_bytes.first() {
                    Some(b'+') => (MetricType::Gauge, &value_bytes[1..]),
                    Some(b'-') => (MetricType::GaugeDelta, value_bytes),
                    _ => (MetricType::Gauge, value_bytes),
                };
                Sample::numeric(metric_type, name, parse_number(num_slice)?)
            }
            b's' => Sample::member(name, value_bytes),
            other => {
                return Err(MetricsError::Parse(format!(
                    "unknown type letter '{}'",
                    *other as char
                )))
            }
        };

        Ok(Some(sample))
    }
}

/// Consumes an optional sample-rate suffix, returning the parsed rate if
/// present. Both `|@rate` (the formal grammar in §4.1) and `@rate` (the
/// form used by §8's S1 scenario) are accepted as the same construct; an
/// empty suffix is fine (no sample rate given), and anything else is a
/// parse error.
fn parse_sample_rate_suffix(after_type: &[u8]) -> Result<Option<f64>, MetricsError> {
    if after_type.is_empty() {
        return Ok(None);
    }
    let rate_bytes = if after_type.starts_with(b"|@") {
        &after_type[2..]
    } else if after_type.starts_with(b"@") {
        &after_type[1..]
    } else {
        return Err(MetricsError::Parse(format!(
            "unexpected trailing data {}",
            lossy(after_type)
        )));
    };
    Ok(Some(parse_number(rate_bytes)?))
}

fn find(haystack: &[u8], needle: u8) -> Option<usize> {
    haystack.iter().position(|&b| b == needle)
}

fn lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

/// Permissive decimal grammar: optional leading `-`, digits, optional
/// `.` and fractional digits. No exponents — any trailing byte past the
/// recognized grammar is a parse error, and `e`/`E` notation falls out
/// as trailing garbage rather than being special-cased.
fn parse_number(bytes: &[u8]) -> Result<f64, MetricsError> {
    let mut i = 0;
    if bytes.first() == Some(&b'-') {
        i += 1;
    }

    let int_start = i;
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
    }
    let mut has_digits = i > int_start;

    if bytes.get(i) == Some(&b'.') {
        i += 1;
        let frac_start = i;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        has_digits = has_digits || i > frac_start;
    }

    if !has_digits {
        return Err(MetricsError::Parse(format!(
            "no digits in numeric value {}",
            lossy(bytes)
        )));
    }
    if i != bytes.len() {
        return Err(MetricsError::Parse(format!(
            "trailing garbage in numeric value {}",
            lossy(bytes)
        )));
    }

    let s = std::str::from_utf8(bytes)
        .map_err(|_| MetricsError::Parse("numeric value is not valid UTF-8".to_string()))?;
    s.parse::<f64>()
        .map_err(|err| MetricsError::Parse(format!("invalid numeric value {s}: {err}")))
}
