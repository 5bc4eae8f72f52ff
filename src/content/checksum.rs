//! Checksum calculation using SHA-256
//!
//! The same digest is computed on the dispatcher and on the worker, so a
//! file is accepted only when both sides agree on its content. Digests are
//! rendered as 64 lowercase hex characters.

use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

/// Read buffer used when hashing files from disk
const READ_CHUNK_SIZE: usize = 64 * 1024;

/// Compute the checksum for the given content
///
/// # Example
///
/// ```
/// use build_relay::content::checksum::checksum;
///
/// let sum = checksum(b"int main() { return 0; }");
/// assert_eq!(sum.len(), 64);
/// ```
pub fn checksum(content: &[u8]) -> String {
    format!("{:x}", Sha256::digest(content))
}

/// Check that `content` hashes to `expected`
///
/// Digests are compared exactly; an uppercase rendering does not match.
pub fn verify(expected: &str, content: &[u8]) -> bool {
    checksum(content) == expected
}

/// Compute the checksum of a file on disk without loading it whole
pub fn checksum_file(path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; READ_CHUNK_SIZE];

    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}
