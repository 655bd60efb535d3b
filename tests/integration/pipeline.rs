//! End-to-end: bytes in through a `ConnectionDriver`, statistics out
//! through the text serializer, covering spec.md §8's scenarios against
//! the whole ingress pipeline rather than any one module in isolation.

use std::sync::Arc;

use rylv_metricsd::config::{DaemonConfig, HistogramConfig};
use rylv_metricsd::ingress::{BufferedSource, ConnectionDriver};
use rylv_metricsd::registry::Registry;
use rylv_metricsd::serialize::serialize_registry;

fn drive_lines(registry: &Registry, text: &[u8]) {
    let mut source = BufferedSource::new();
    source.feed(text);
    let mut driver = ConnectionDriver::new();
    driver.drive(&mut source, registry).unwrap();
}

fn lines_of(registry: &Registry) -> Vec<String> {
    let mut buf = Vec::new();
    serialize_registry(registry, &mut buf).unwrap();
    String::from_utf8(buf)
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect()
}

#[test]
fn s1_counter_additivity_and_sample_rate_scale_through_the_driver() {
    let registry = Registry::new(Arc::new(DaemonConfig::default()), 100);
    drive_lines(&registry, b"a:1|c\na:2|c\na:3|c@0.5\n");
    let lines = lines_of(&registry);
    assert!(lines.contains(&"a|9.000000|100".to_string()));
}

#[test]
fn s2_timer_histogram_bins_through_the_driver() {
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
    drive_lines(&registry, b"a:1|m\na:6|m\na:15|m\n");
    let lines = lines_of(&registry);
    assert!(lines.contains(&"a.histogram.bin_<0.00|0|50".to_string()));
    assert!(lines.contains(&"a.histogram.bin_0.00|1|50".to_string()));
    assert!(lines.contains(&"a.histogram.bin_5.00|1|50".to_string()));
    assert!(lines.contains(&"a.histogram.bin_>10.00|1|50".to_string()));
    assert!(lines.contains(&"timers.a.count|3|50".to_string()));
}

#[test]
fn s4_set_cardinality_through_driver_across_text_and_binary() {
    let text_registry = Registry::new(Arc::new(DaemonConfig::default()), 0);
    drive_lines(&text_registry, b"u:alice|s\nu:alice|s\nu:alice|s\nu:bob|s\n");
    assert_eq!(text_registry.len(), 1);

    let mut buf = Vec::new();
    let mut magic_frame = |name: &str, member: &str| {
        let mut frame = vec![0xAA, rylv_metricsd::MetricType::Set.binary_code()];
        let key = format!("{name}\0");
        let value = format!("{member}\0");
        frame.extend_from_slice(&(key.len() as u16).to_le_bytes());
        frame.extend_from_slice(&(value.len() as u16).to_le_bytes());
        frame.extend_from_slice(key.as_bytes());
        frame.extend_from_slice(value.as_bytes());
        buf.extend_from_slice(&frame);
    };
    magic_frame("u", "alice");
    magic_frame("u", "alice");
    magic_frame("u", "alice");
    magic_frame("u", "bob");

    let binary_registry = Registry::new(Arc::new(DaemonConfig::default()), 0);
    drive_lines(&binary_registry, &buf);

    let text_lines = lines_of(&text_registry);
    let binary_lines = lines_of(&binary_registry);
    assert_eq!(text_lines, binary_lines);
    assert!(text_lines.contains(&"u|2|0".to_string()));
}

#[test]
fn s5_empty_registry_flushes_nothing() {
    let registry = Registry::new(Arc::new(DaemonConfig::default()), 0);
    assert!(lines_of(&registry).is_empty());
}

#[test]
fn s6_gauge_delta_without_prior_reading_starts_from_zero() {
    let registry = Registry::new(Arc::new(DaemonConfig::default()), 10);
    drive_lines(&registry, b"g:-3|g\n");
    let lines = lines_of(&registry);
    assert!(lines.contains(&"g|-3.000000|10".to_string()));
}

#[test]
fn mixed_types_on_one_name_drop_the_conflicting_sample() {
    let registry = Registry::new(Arc::new(DaemonConfig::default()), 0);
    drive_lines(&registry, b"a:1|c\na:5|g\na:2|c\n");
    let lines = lines_of(&registry);
    assert!(lines.contains(&"a|3.000000|0".to_string()));
}

#[test]
fn malformed_line_stops_the_driver_without_poisoning_prior_samples() {
    let registry = Registry::new(Arc::new(DaemonConfig::default()), 0);
    let mut source = BufferedSource::new();
    source.feed(b"a:1|c\na:bad|c\n");
    let mut driver = ConnectionDriver::new();
    assert!(driver.drive(&mut source, &registry).is_err());
    assert_eq!(registry.len(), 1);
}

#[test]
fn input_counter_increments_once_per_accepted_sample() {
    let config = Arc::new(DaemonConfig {
        input_counter: Some("ingress.accepted".to_string()),
        ..DaemonConfig::default()
    });
    let registry = Registry::new(config, 0);
    drive_lines(&registry, b"a:1|c\nb:2|c\n");
    let lines = lines_of(&registry);
    assert!(lines.contains(&"ingress.accepted|2.000000|0".to_string()));
}
