//! Checksum utilities for payload digests and request identity hashing

use sha2::{Digest, Sha256};
use std::io::Read;

use crate::error::Result;

/// Compute the lowercase-hex SHA-256 digest of a string.
pub fn sha256_hex(s: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(s.as_bytes());
    hex::encode(hasher.finalize())
}

/// Compute the lowercase-hex SHA-256 digest of any readable source,
/// together with the number of bytes consumed.
pub fn sha256_hex_reader<R: Read>(reader: &mut R) -> Result<(String, u64)> {
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];
    let mut total: u64 = 0;

    loop {
        let bytes_read = reader.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
        total += bytes_read as u64;
    }

    Ok((hex::encode(hasher.finalize()), total))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_sha256_hex_known_vector() {
        assert_eq!(
            sha256_hex("hello world"),
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[test]
    fn test_sha256_hex_reader_matches_string_form() {
        let data = "hello world";
        let mut cursor = Cursor::new(data.as_bytes());
        let (digest, bytes) = sha256_hex_reader(&mut cursor).unwrap();
        assert_eq!(digest, sha256_hex(data));
        assert_eq!(bytes, data.len() as u64);
    }
}
