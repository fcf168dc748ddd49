//! Hash helpers for checksums, content addressing and state fingerprints.

use blake2::digest::consts::U32;
use blake2::{Blake2b, Digest as _};
use sha2::{Digest, Sha256};

type Blake2b256 = Blake2b<U32>;

/// Lowercase hex SHA-256 of `data`.
pub fn sha256_hex(data: &[u8]) -> String {
    let digest = Sha256::digest(data);
    format!("{:x}", digest)
}

/// BLAKE2b-256 over a sequence of fields.
///
/// Every field is length-prefixed so that adjacent fields cannot be
/// re-split into a different sequence with the same digest.
pub fn blake2b_256(fields: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Blake2b256::new();
    for field in fields {
        hasher.update((field.len() as u64).to_le_bytes());
        hasher.update(field);
    }
    hasher.finalize().into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_known_vector() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_sha256_hex_length() {
        assert_eq!(sha256_hex(b"").len(), 64);
    }

    #[test]
    fn test_blake2b_field_boundaries_matter() {
        let a = blake2b_256(&[&b"ab"[..], &b"c"[..]]);
        let b = blake2b_256(&[&b"a"[..], &b"bc"[..]]);
        assert_ne!(a, b);
        assert_eq!(a, blake2b_256(&[&b"ab"[..], &b"c"[..]]));
    }
}
