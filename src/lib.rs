//! # rylv-metricsd
//!
//! The ingress core of a high-throughput, statsd-compatible metrics
//! aggregation daemon: dual-format (text/binary) wire parsing, a
//! current-epoch aggregator registry, and the double-buffered
//! flush/serialize handoff that rotates a retired registry out to an
//! asynchronous serializer.
//!
//! The TCP/UDP acceptor, the flush-interval timer, the child-process
//! launcher, and the on-disk configuration loader are external
//! collaborators — this crate exposes trait seams ([`ingress::ByteSource`],
//! [`std::io::Write`]) for each instead of depending on a particular I/O
//! runtime.
//!
//! ## Quick start
//!
//! ```no_run
//! use rylv_metricsd::config::DaemonConfig;
//! use rylv_metricsd::flush::Daemon;
//! use rylv_metricsd::ingress::{BufferedSource, ConnectionDriver};
//! use std::sync::Arc;
//!
//! let daemon = Daemon::new(Arc::new(DaemonConfig::default()), 0);
//!
//! let mut source = BufferedSource::new();
//! source.feed(b"requests:1|c\n");
//! let mut driver = ConnectionDriver::new();
//! if let Some(registry) = daemon.current() {
//!     driver.drive(&mut source, &registry).ok();
//! }
//!
//! daemon.rotate(1, std::io::sink());
//! daemon.final_flush(std::io::sink());
//! ```

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::todo)]
#![deny(clippy::unimplemented)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![warn(clippy::missing_errors_doc)]
#![warn(clippy::missing_panics_doc)]
#![allow(clippy::module_name_repetitions)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod config;
mod error;
pub mod flush;
pub mod ingress;
pub mod registry;
pub mod sample;
pub mod serialize;
pub mod sink;
pub mod sketch;

pub use config::DaemonConfig;
pub use error::MetricsError;
pub use flush::Daemon;
pub use registry::Registry;
pub use sample::{MetricType, Sample, SampleValue};

/// Result type for fallible operations across this crate.
pub type MetricResult<T> = Result<T, MetricsError>;
