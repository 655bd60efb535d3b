//! Ingress pipeline: byte-stream abstraction, the two wire-format
//! parsers, and the per-connection driver that picks between them.

pub mod binary;
pub mod driver;
pub mod source;
pub mod text;

pub use binary::BinaryParser;
pub use driver::{ConnectionDriver, Mode};
pub use source::{BufferedSource, ByteSource};
pub use text::TextParser;
