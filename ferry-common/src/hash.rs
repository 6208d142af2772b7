//! SHA-256 hashing for transfer verification
//!
//! Files are hashed in [`HASH_BUFFER_SIZE`] blocks so memory use stays flat
//! regardless of file size. The async entry point runs the work on the
//! blocking thread pool via `spawn_blocking`, keeping tokio's async workers
//! free during large transfers.

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use sha2::{Digest, Sha256};

use crate::HASH_BUFFER_SIZE;

/// Compute the SHA-256 hash of an entire file, lowercase hex encoded.
///
/// Runs on a blocking thread pool to avoid blocking async workers.
pub async fn compute_sha256(path: &Path) -> io::Result<String> {
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || compute_sha256_sync(&path))
        .await
        .map_err(|e| io::Error::other(format!("hash task failed: {e}")))?
}

/// Synchronous SHA-256 computation over a file.
pub fn compute_sha256_sync(path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; HASH_BUFFER_SIZE];

    loop {
        let bytes_read = file.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(hex::encode(hasher.finalize()))
}

/// Compute the SHA-256 hash of an in-memory buffer, lowercase hex encoded.
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}
