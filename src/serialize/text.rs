//! Text serializer: one `|`-separated record per line, exactly as
//! spec.md §4.6's table describes.

use std::io::{self, Write};

use bumpalo::Bump;
use itoa::Buffer;

use crate::registry::{Accumulator, Registry};

const QUANTILES: [(f64, &str); 4] = [
    (0.5, "median"),
    (0.9, "upper_90"),
    (0.95, "upper_95"),
    (0.99, "upper_99"),
];

/// Walks `registry` and writes one line per derived statistic to `writer`.
///
/// # Errors
/// Returns any [`io::Error`] raised by `writer`.
pub fn write_registry(registry: &Registry, writer: &mut dyn Write) -> io::Result<()> {
    let ts = registry.created_at();
    let mut int_buf = Buffer::new();
    let bump = Bump::new();
    let mut result = Ok(());

    registry.iterate(|name, acc| {
        if result.is_err() {
            return;
        }
        result = write_one(name, acc, ts, writer, &mut int_buf, &bump);
    });

    result
}

#[allow(clippy::too_many_lines)]
fn write_one(
    name: &str,
    acc: &Accumulator,
    ts: u64,
    writer: &mut dyn Write,
    int_buf: &mut Buffer,
    bump: &Bump,
) -> io::Result<()> {
    match acc {
        Accumulator::KeyVal(kv) => {
            writeln!(writer, "{name}|{}|{ts}", fmt6(bump, kv.value))
        }
        Accumulator::Gauge(gauge) => {
            writeln!(writer, "{name}|{}|{ts}", fmt6(bump, gauge.value))
        }
        Accumulator::Counter(counter) => {
            writeln!(writer, "{name}|{}|{ts}", fmt6(bump, counter.moments.sum))
        }
        Accumulator::Set(set) => {
            writeln!(writer, "{name}|{}|{ts}", int_buf.format(set.cardinality()))
        }
        Accumulator::Timer(timer) => {
            let moments = &timer.moments;
            let fields: [(&str, f64); 5] = [
                ("sum", moments.sum),
                ("sum_sq", moments.sum_sq),
                ("mean", moments.mean()),
                ("lower", moments.min()),
                ("upper", moments.max()),
            ];
            for (field, value) in fields {
                writeln!(writer, "timers.{name}.{field}|{}|{ts}", fmt6(bump, value))?;
            }
            writeln!(
                writer,
                "timers.{name}.count|{}|{ts}",
                int_buf.format(moments.count)
            )?;
            writeln!(writer, "timers.{name}.stdev|{}|{ts}", fmt6(bump, moments.stddev()))?;
            for (q, field) in QUANTILES {
                let value = timer.sketch.value_at_quantile(q);
                writeln!(writer, "timers.{name}.{field}|{}|{ts}", fmt6(bump, value))?;
            }
            if let Some(hist) = &timer.histogram {
                writeln!(
                    writer,
                    "{name}.histogram.bin_<{}|{}|{ts}",
                    fmt2(bump, hist.config.min_val),
                    int_buf.format(hist.floor)
                )?;
                for (i, count) in hist.bins.iter().enumerate() {
                    #[allow(clippy::cast_precision_loss)]
                    let lower = hist.config.min_val + (i as f64) * hist.config.bin_width;
                    writeln!(
                        writer,
                        "{name}.histogram.bin_{}|{}|{ts}",
                        fmt2(bump, lower),
                        int_buf.format(*count)
                    )?;
                }
                writeln!(
                    writer,
                    "{name}.histogram.bin_>{}|{}|{ts}",
                    fmt2(bump, hist.config.max_val),
                    int_buf.format(hist.ceil)
                )
            } else {
                Ok(())
            }
        }
    }
}

fn fmt6(bump: &Bump, value: f64) -> bumpalo::collections::String<'_> {
    bumpalo::format!(in bump, "{value:.6}")
}

fn fmt2(bump: &Bump, value: f64) -> bumpalo::collections::String<'_> {
    bumpalo::format!(in bump, "{value:.2}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DaemonConfig, HistogramConfig};
    use crate::ingress::text::TextParser;
    use crate::ingress::source::BufferedSource;
    use std::sync::Arc;

    fn lines_from(registry: &Registry) -> Vec<String> {
        let mut buf = Vec::new();
        write_registry(registry, &mut buf).unwrap();
        String::from_utf8(buf)
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    fn feed(registry: &Registry, text: &[u8]) {
        let mut source = BufferedSource::new();
        source.feed(text);
        while let Some(sample) = TextParser::parse_line(&mut source).unwrap() {
            registry.add_sample(&sample);
        }
    }

    #[test]
    fn s1_text_counter_scenario() {
        let registry = Registry::new(Arc::new(DaemonConfig::default()), 100);
        feed(&registry, b"a:1|c\na:2|c\na:3|c@0.5\n");
        let lines = lines_from(&registry);
        assert!(lines.contains(&"a|9.000000|100".to_string()));
    }

    #[test]
    fn s2_text_timer_histogram_scenario() {
        let config = Arc::new(DaemonConfig {
            histograms: Arc::new(|name| {
                (name == "a").then_some(HistogramConfig {
                    min_val: 0.0,
                    max_val: 10.0,
                    bin_width: 5.0,
                })
            }),
            ..DaemonConfig::default()
        });
        let registry = Registry::new(config, 50);
        feed(&registry, b"a:1|m\na:6|m\na:15|m\n");
        let lines = lines_from(&registry);
        assert!(lines.contains(&"a.histogram.bin_<0.00|0|50".to_string()));
        assert!(lines.contains(&"a.histogram.bin_0.00|1|50".to_string()));
        assert!(lines.contains(&"a.histogram.bin_5.00|1|50".to_string()));
        assert!(lines.contains(&"a.histogram.bin_>10.00|1|50".to_string()));
    }

    #[test]
    fn s5_empty_rotation_produces_zero_records() {
        let registry = Registry::new(Arc::new(DaemonConfig::default()), 0);
        let lines = lines_from(&registry);
        assert!(lines.is_empty());
    }

    #[test]
    fn s6_gauge_delta_without_prior_scenario() {
        let registry = Registry::new(Arc::new(DaemonConfig::default()), 10);
        feed(&registry, b"g:+5|g\n");
        let lines = lines_from(&registry);
        assert!(lines.contains(&"g|5.000000|10".to_string()));
    }

    #[test]
    fn set_cardinality_is_formatted_as_an_integer() {
        let registry = Registry::new(Arc::new(DaemonConfig::default()), 0);
        for _ in 0..3 {
            registry.set_update("u", b"alice\0");
        }
        registry.set_update("u", b"bob\0");
        let lines = lines_from(&registry);
        assert!(lines.contains(&"u|2|0".to_string()));
    }

    #[test]
    fn timer_record_order_matches_spec_table() {
        // spec.md §4.6: sum, sum_sq, mean, lower, upper, count, stdev,
        // median, upper_90, upper_95, upper_99 — count before stdev.
        let registry = Registry::new(Arc::new(DaemonConfig::default()), 0);
        feed(&registry, b"a:1|m\na:2|m\na:3|m\n");
        let lines = lines_from(&registry);
        let suffixes = [
            "sum", "sum_sq", "mean", "lower", "upper", "count", "stdev", "median", "upper_90",
            "upper_95", "upper_99",
        ];
        let positions: Vec<usize> = suffixes
            .iter()
            .map(|field| {
                lines
                    .iter()
                    .position(|line| line.starts_with(&format!("timers.a.{field}|")))
                    .expect("field present")
            })
            .collect();
        assert!(
            positions.windows(2).all(|w| w[0] < w[1]),
            "timer fields out of order: {positions:?} for {suffixes:?} against {lines:?}"
        );
    }
}
