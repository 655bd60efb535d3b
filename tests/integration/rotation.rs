//! End-to-end double-buffered rotation: ingress into the current epoch,
//! rotate, and confirm the retired epoch's statistics reach the sink
//! while the new epoch starts empty (spec.md §4.5).

use std::io::Write;
use std::sync::{Arc, Mutex};

use rylv_metricsd::config::DaemonConfig;
use rylv_metricsd::flush::Daemon;
use rylv_metricsd::ingress::{BufferedSource, ConnectionDriver};

#[derive(Clone, Default)]
struct CapturingSink(Arc<Mutex<Vec<u8>>>);

impl Write for CapturingSink {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }
    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

fn feed(daemon: &Daemon, text: &[u8]) {
    let registry = daemon.current().expect("daemon has a current registry");
    let mut source = BufferedSource::new();
    source.feed(text);
    let mut driver = ConnectionDriver::new();
    driver.drive(&mut source, &registry).unwrap();
}

#[test]
fn rotation_hands_off_one_epochs_data_and_starts_the_next_epoch_empty() {
    let daemon = Daemon::new(Arc::new(DaemonConfig::default()), 100);
    feed(&daemon, b"a:1|c\na:2|c\na:3|c@0.5\n");

    let sink = CapturingSink::default();
    daemon.rotate(200, sink.clone());

    feed(&daemon, b"a:7|c\n");
    daemon.final_flush(sink.clone());

    let bytes = sink.0.lock().unwrap().clone();
    let text = String::from_utf8(bytes).unwrap();
    let lines: Vec<&str> = text.lines().collect();

    assert!(lines.contains(&"a|9.000000|100"));
    assert!(lines.contains(&"a|7.000000|200"));
}

#[test]
fn after_final_flush_the_current_registry_is_gone() {
    let daemon = Daemon::new(Arc::new(DaemonConfig::default()), 0);
    feed(&daemon, b"a:1|c\n");
    daemon.final_flush(CapturingSink::default());
    assert!(daemon.current().is_none());
}

#[test]
fn multiple_rotations_each_flush_their_own_epoch_once() {
    let daemon = Daemon::new(Arc::new(DaemonConfig::default()), 0);
    let sink = CapturingSink::default();

    for (epoch, value) in [(1u64, 1.0), (2, 2.0), (3, 3.0)] {
        feed(&daemon, format!("a:{value}|c\n").as_bytes());
        daemon.rotate(epoch, sink.clone());
    }
    daemon.final_flush(sink.clone());

    let bytes = sink.0.lock().unwrap().clone();
    let text = String::from_utf8(bytes).unwrap();
    assert!(text.contains("a|1.000000|0"));
    assert!(text.contains("a|2.000000|1"));
    assert!(text.contains("a|3.000000|2"));
}
