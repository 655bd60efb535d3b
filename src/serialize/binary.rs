//! Binary serializer: packed `timestamp|type|value_type|key_len|value`
//! prefix records, exactly as spec.md §4.6 frames them.

use std::io::{self, Write};

use crate::registry::{Accumulator, Registry};
use crate::sample::MetricType;

const VALUE_NONE: u8 = 0x00;
const VALUE_SUM: u8 = 0x01;
const VALUE_SUM_SQ: u8 = 0x02;
const VALUE_MEAN: u8 = 0x03;
const VALUE_COUNT: u8 = 0x04;
const VALUE_STDDEV: u8 = 0x05;
const VALUE_MIN: u8 = 0x06;
const VALUE_MAX: u8 = 0x07;
const VALUE_HIST_FLOOR: u8 = 0x08;
const VALUE_HIST_BIN: u8 = 0x09;
const VALUE_HIST_CEIL: u8 = 0x0A;
const VALUE_PERCENTILE_BASE: u8 = 0x80;

const PERCENTILES: [(f64, u8); 4] = [(0.5, 50), (0.9, 90), (0.95, 95), (0.99, 99)];

/// Walks `registry` and writes one packed record per derived statistic
/// to `writer`.
///
/// # Errors
/// Returns any [`io::Error`] raised by `writer`.
pub fn write_registry(registry: &Registry, writer: &mut dyn Write) -> io::Result<()> {
    let ts = registry.created_at();
    let mut result = Ok(());

    registry.iterate(|name, acc| {
        if result.is_err() {
            return;
        }
        result = write_one(name, acc, ts, writer);
    });

    result
}

fn write_one(name: &str, acc: &Accumulator, ts: u64, writer: &mut dyn Write) -> io::Result<()> {
    match acc {
        Accumulator::KeyVal(kv) => {
            write_record(writer, ts, MetricType::KeyVal, VALUE_NONE, name, kv.value, None)
        }
        Accumulator::Gauge(gauge) => {
            write_record(writer, ts, MetricType::Gauge, VALUE_NONE, name, gauge.value, None)
        }
        #[allow(clippy::cast_precision_loss)]
        Accumulator::Set(set) => write_record(
            writer,
            ts,
            MetricType::Set,
            VALUE_SUM,
            name,
            set.cardinality() as f64,
            None,
        ),
        Accumulator::Counter(counter) => {
            write_moments(writer, ts, MetricType::Counter, name, &counter.moments)
        }
        Accumulator::Timer(timer) => {
            write_moments(writer, ts, MetricType::Timer, name, &timer.moments)?;
            for (q, p) in PERCENTILES {
                let value = timer.sketch.value_at_quantile(q);
                write_record(
                    writer,
                    ts,
                    MetricType::Timer,
                    VALUE_PERCENTILE_BASE | p,
                    name,
                    value,
                    None,
                )?;
            }
            if let Some(hist) = &timer.histogram {
                #[allow(clippy::cast_precision_loss)]
                write_record(
                    writer,
                    ts,
                    MetricType::Timer,
                    VALUE_HIST_FLOOR,
                    name,
                    hist.floor as f64,
                    Some(0),
                )?;
                for (i, count) in hist.bins.iter().enumerate() {
                    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
                    write_record(
                        writer,
                        ts,
                        MetricType::Timer,
                        VALUE_HIST_BIN,
                        name,
                        *count as f64,
                        Some(i as u32 + 1),
                    )?;
                }
                #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
                write_record(
                    writer,
                    ts,
                    MetricType::Timer,
                    VALUE_HIST_CEIL,
                    name,
                    hist.ceil as f64,
                    Some(hist.bins.len() as u32 + 1),
                )?;
            }
            Ok(())
        }
    }
}

#[allow(clippy::cast_precision_loss)]
fn write_moments(
    writer: &mut dyn Write,
    ts: u64,
    metric_type: MetricType,
    name: &str,
    moments: &crate::registry::accumulator::Moments,
) -> io::Result<()> {
    write_record(writer, ts, metric_type, VALUE_SUM, name, moments.sum, None)?;
    write_record(writer, ts, metric_type, VALUE_SUM_SQ, name, moments.sum_sq, None)?;
    write_record(writer, ts, metric_type, VALUE_MEAN, name, moments.mean(), None)?;
    write_record(
        writer,
        ts,
        metric_type,
        VALUE_COUNT,
        name,
        moments.count as f64,
        None,
    )?;
    write_record(
        writer,
        ts,
        metric_type,
        VALUE_STDDEV,
        name,
        moments.stddev(),
        None,
    )?;
    write_record(writer, ts, metric_type, VALUE_MIN, name, moments.min(), None)?;
    write_record(writer, ts, metric_type, VALUE_MAX, name, moments.max(), None)
}

/// Writes one packed record: `ts:u64 | type:u8 | value_type:u8 |
/// key_len:u16 | value:f64`, the NUL-terminated key, and (for histogram
/// records) a trailing `bin_index:u32`.
fn write_record(
    writer: &mut dyn Write,
    ts: u64,
    metric_type: MetricType,
    value_type: u8,
    name: &str,
    value: f64,
    bin_index: Option<u32>,
) -> io::Result<()> {
    let key_len = (name.len() + 1) as u16;
    writer.write_all(&ts.to_le_bytes())?;
    writer.write_all(&[metric_type.binary_code(), value_type])?;
    writer.write_all(&key_len.to_le_bytes())?;
    writer.write_all(&value.to_le_bytes())?;
    writer.write_all(name.as_bytes())?;
    writer.write_all(&[0])?;
    if let Some(index) = bin_index {
        writer.write_all(&index.to_le_bytes())?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DaemonConfig;
    use crate::ingress::source::BufferedSource;
    use crate::ingress::text::TextParser;
    use crate::registry::Registry;
    use std::sync::Arc;

    fn feed(registry: &Registry, text: &[u8]) {
        let mut source = BufferedSource::new();
        source.feed(text);
        while let Some(sample) = TextParser::parse_line(&mut source).unwrap() {
            registry.add_sample(&sample);
        }
    }

    #[test]
    fn s3_binary_gauge_scenario() {
        let registry = Registry::new(Arc::new(DaemonConfig::default()), 0);
        feed(&registry, b"g:42|g\n");
        let mut buf = Vec::new();
        write_registry(&registry, &mut buf).unwrap();

        assert_eq!(&buf[8..10], &[MetricType::Gauge.binary_code(), VALUE_NONE]);
        let key_len = u16::from_le_bytes([buf[10], buf[11]]);
        assert_eq!(key_len, 2);
        let value = f64::from_le_bytes(buf[12..20].try_into().unwrap());
        assert_eq!(value, 42.0);
        assert_eq!(&buf[20..22], b"g\0");
        assert_eq!(buf.len(), 22);
    }

    #[test]
    fn s5_empty_rotation_produces_zero_bytes() {
        let registry = Registry::new(Arc::new(DaemonConfig::default()), 0);
        let mut buf = Vec::new();
        write_registry(&registry, &mut buf).unwrap();
        assert!(buf.is_empty());
    }

    #[test]
    fn set_emits_a_single_sum_tagged_record() {
        let registry = Registry::new(Arc::new(DaemonConfig::default()), 0);
        registry.set_update("u", b"alice\0");
        registry.set_update("u", b"bob\0");
        let mut buf = Vec::new();
        write_registry(&registry, &mut buf).unwrap();
        assert_eq!(&buf[8..10], &[MetricType::Set.binary_code(), VALUE_SUM]);
        let value = f64::from_le_bytes(buf[12..20].try_into().unwrap());
        assert_eq!(value, 2.0);
    }
}
