//! Ferry Common Library
//!
//! Shared protocol constants, command parsing, line framing, and hashing
//! for the Ferry file transfer system.

pub mod framing;
pub mod hash;
pub mod protocol;

/// Version string exchanged in the opening handshake.
///
/// The server requires an exact match; there is no negotiation with older
/// or newer revisions.
pub const PROTOCOL_VERSION: &str = "1.0";

/// Default port for Ferry connections
pub const DEFAULT_PORT: u16 = 5000;

/// Size of each socket read while accumulating control lines (4 KiB)
pub const READ_BUFFER_SIZE: usize = 4096;

/// Chunk size for streaming raw payload bytes (64 KiB)
pub const STREAM_BUFFER_SIZE: usize = 64 * 1024;

/// Upper bound on a single control line, terminator included (64 KiB).
///
/// A peer that sends this many bytes without a newline is not speaking the
/// protocol; the read fails instead of buffering without bound.
pub const MAX_LINE_LENGTH: usize = 64 * 1024;

/// Buffer size for SHA-256 hashing operations (1MB for fewer syscalls)
pub const HASH_BUFFER_SIZE: usize = 1024 * 1024;
