//! Fixed-layout, little-endian, packed binary wire protocol.
//!
//! ```text
//! magic:u8 = 0xAA | metric_type:u8 | key_len:u16
//! ```
//! followed by either an 8-byte double (non-Set types) or a 2-byte
//! set-value length plus two NUL-terminated strings (Set).

use crate::error::MetricsError;
use crate::ingress::source::ByteSource;
use crate::sample::{MetricType, Sample};

/// The fixed magic byte every binary record begins with.
pub const MAGIC: u8 = 0xAA;

const PREAMBLE_LEN: usize = 4;
const VALUE_LEN: usize = 8;
const SET_LEN_FIELD: usize = 2;

/// Parses one binary-protocol record at a time off a [`ByteSource`].
pub struct BinaryParser;

impl BinaryParser {
    /// Attempts to parse the next complete record.
    ///
    /// Returns `Ok(None)` if fewer bytes than the record requires are
    /// buffered — nothing is consumed in that case, preserving the
    /// "atomic per record" contract of §4.2. Returns `Err` for a framing
    /// error (bad magic, unknown type code, missing NUL).
    ///
    /// # Errors
    /// Returns [`MetricsError::Framing`] if the bytes at the head of the
    /// stream do not match the protocol.
    pub fn parse_record<'s, S: ByteSource>(
        source: &'s mut S,
    ) -> Result<Option<Sample<'s>>, MetricsError> {
        let Some(preamble) = source.peek_exact(PREAMBLE_LEN) else {
            return Ok(None);
        };

        if preamble[0] != MAGIC {
            return Err(MetricsError::Framing(format!(
                "bad magic byte 0x{:02x}",
                preamble[0]
            )));
        }
        let metric_type = MetricType::from_binary_code(preamble[1])
            .ok_or_else(|| MetricsError::Framing(format!("unknown type code {}", preamble[1])))?;
        let key_len = u16::from_le_bytes([preamble[2], preamble[3]]) as usize;

        if metric_type == MetricType::Set {
            Self::parse_set_record(source, key_len)
        } else {
            Self::parse_value_record(source, metric_type, key_len)
        }
    }

    fn parse_value_record<'s, S: ByteSource>(
        source: &'s mut S,
        metric_type: MetricType,
        key_len: usize,
    ) -> Result<Option<Sample<'s>>, MetricsError> {
        let total = PREAMBLE_LEN + VALUE_LEN + key_len;
        let Some(record) = source.extract_exact(total) else {
            return Ok(None);
        };

        let mut value_bytes = [0u8; VALUE_LEN];
        value_bytes.copy_from_slice(&record[PREAMBLE_LEN..PREAMBLE_LEN + VALUE_LEN]);
        let value = f64::from_le_bytes(value_bytes);

        let key = &record[PREAMBLE_LEN + VALUE_LEN..];
        let name = nul_terminated_str(key)?;

        Ok(Some(Sample::numeric(metric_type, name, value)))
    }

    fn parse_set_record<'s, S: ByteSource>(
        source: &'s mut S,
        key_len: usize,
    ) -> Result<Option<Sample<'s>>, MetricsError> {
        let header_len = PREAMBLE_LEN + SET_LEN_FIELD;
        let Some(header) = source.peek_exact(header_len) else {
            return Ok(None);
        };
        let set_value_len =
            u16::from_le_bytes([header[PREAMBLE_LEN], header[PREAMBLE_LEN + 1]]) as usize;

        let total = header_len + key_len + set_value_len;
        let Some(record) = source.extract_exact(total) else {
            return Ok(None);
        };

        let key = &record[header_len..header_len + key_len];
        let member = &record[header_len + key_len..];

        let name = nul_terminated_str(key)?;
        let member = nul_terminated_bytes(member)?;

        Ok(Some(Sample::member(name, member)))
    }
}

/// Validates that `bytes` ends in a NUL and returns the UTF-8 string
/// before it.
fn nul_terminated_str(bytes: &[u8]) -> Result<&str, MetricsError> {
    let member = nul_terminated_bytes(bytes)?;
    std::str::from_utf8(member)
        .map_err(|_| MetricsError::Framing("key is not valid UTF-8".to_string()))
}

/// Validates that `bytes` ends in a NUL and returns the slice before it.
fn nul_terminated_bytes(bytes: &[u8]) -> Result<&[u8], MetricsError> {
    match bytes.last() {
        Some(0) => Ok(&bytes[..bytes.len() - 1]),
        _ => Err(MetricsError::Framing(
            "expected NUL-terminated string".to_string(),
        )),
    }
}
