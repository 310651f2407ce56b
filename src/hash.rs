//! Content hashing for dedupe identity.

use sha2::{Digest, Sha256};

/// Lowercase hex SHA-256 of `data`.
pub fn content_hash(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_digest() {
        assert_eq!(
            content_hash(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn distinct_content_distinct_hash() {
        assert_ne!(content_hash(b"invoice 1"), content_hash(b"invoice 2"));
        assert_eq!(content_hash(b"same"), content_hash(b"same"));
    }
}
