//! Line-oriented framing over async byte streams
//!
//! The wire protocol interleaves two kinds of traffic on one stream:
//! newline-terminated UTF-8 control lines and raw payload bytes whose
//! length is carried out-of-band on the control channel. [`LineReader`]
//! and [`LineWriter`] keep the two from stepping on each other.

mod reader;
mod writer;

pub use reader::LineReader;
pub use writer::LineWriter;
