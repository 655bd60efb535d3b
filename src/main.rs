//! Demo wiring: a TCP listener feeding the ingress pipeline, plus a
//! flush timer rotating the daemon on a fixed interval. The acceptor
//! and timer live here because spec.md §1 treats both as external
//! collaborators, out of scope for the library crate itself.

use std::io::Read;
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use rylv_metricsd::config::DaemonConfig;
use rylv_metricsd::flush::Daemon;
use rylv_metricsd::ingress::{BufferedSource, ConnectionDriver};
use tracing::{info, warn};

const BIND_ADDR: &str = "127.0.0.1:8125";
const FLUSH_INTERVAL: Duration = Duration::from_secs(10);

fn main() {
    tracing_subscriber::fmt::init();

    let config = Arc::new(DaemonConfig::default());
    let daemon = Arc::new(Daemon::new(config, now()));

    let flush_daemon = daemon.clone();
    thread::spawn(move || run_flush_timer(&flush_daemon));

    let listener = match TcpListener::bind(BIND_ADDR) {
        Ok(listener) => listener,
        Err(err) => {
            warn!(error = %err, "failed to bind ingress listener");
            return;
        }
    };
    info!(addr = BIND_ADDR, "metrics ingress listening");

    for stream in listener.incoming() {
        match stream {
            Ok(stream) => {
                let conn_daemon = daemon.clone();
                thread::spawn(move || handle_connection(stream, &conn_daemon));
            }
            Err(err) => warn!(error = %err, "failed to accept connection"),
        }
    }
}

fn run_flush_timer(daemon: &Daemon) {
    loop {
        thread::sleep(FLUSH_INTERVAL);
        daemon.rotate(now(), std::io::stdout());
    }
}

fn handle_connection(mut stream: TcpStream, daemon: &Daemon) {
    let mut source = BufferedSource::new();
    let mut driver = ConnectionDriver::new();
    let mut read_buf = [0u8; 4096];

    loop {
        let Some(registry) = daemon.current() else {
            return;
        };

        match driver.drive(&mut source, &registry) {
            Ok(()) => {}
            Err(err) => {
                warn!(error = %err, "connection closed after malformed input");
                return;
            }
        }
        source.compact();

        match stream.read(&mut read_buf) {
            Ok(0) => return,
            Ok(n) => source.feed(&read_buf[..n]),
            Err(err) => {
                warn!(error = %err, "connection read failed");
                return;
            }
        }
    }
}

fn now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_secs())
}
