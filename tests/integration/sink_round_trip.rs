//! A flush routed through a spawned child process rather than an
//! in-memory buffer, exercising [`rylv_metricsd::sink::ChildProcessSink`]
//! against a real rotation.

use std::fs;
use std::sync::Arc;

use rylv_metricsd::config::DaemonConfig;
use rylv_metricsd::flush::Daemon;
use rylv_metricsd::ingress::{BufferedSource, ConnectionDriver};
use rylv_metricsd::sink::ChildProcessSink;

#[test]
fn flush_output_reaches_disk_through_a_spawned_child() {
    let daemon = Daemon::new(Arc::new(DaemonConfig::default()), 0);
    {
        let registry = daemon.current().unwrap();
        let mut source = BufferedSource::new();
        source.feed(b"a:9|c\n");
        let mut driver = ConnectionDriver::new();
        driver.drive(&mut source, &registry).unwrap();
    }

    let out_file = tempfile::NamedTempFile::new().unwrap();
    let out_path = out_file.path().to_path_buf();
    let command = format!("cat > {}", out_path.display());
    let sink = ChildProcessSink::spawn(&command).unwrap();

    daemon.final_flush(sink);

    // Dropping the sink closes the child's stdin; poll briefly for it to
    // flush the file rather than assuming it's already landed.
    for _ in 0..50 {
        if fs::metadata(&out_path).map(|m| m.len() > 0).unwrap_or(false) {
            break;
        }
        std::thread::sleep(std::time::Duration::from_millis(20));
    }

    let contents = fs::read_to_string(&out_path).unwrap_or_default();
    assert!(contents.contains("a|9.000000|0"));
}
