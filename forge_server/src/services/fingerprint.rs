//! Content fingerprinting for tamper-evident build records.

use sha2::{Digest, Sha256};

/// Full SHA-256 digest of arbitrary content, hex-encoded (64 chars).
pub fn sha256_hex(content: &[u8]) -> String {
    hex::encode(Sha256::digest(content))
}

/// Short display prefix of a hex digest, used in logs and chain proofs.
pub fn short(digest: &str) -> String {
    digest.chars().take(10).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_is_deterministic_and_fixed_length() {
        let a = sha256_hex(b"use anchor_lang::prelude::*;");
        let b = sha256_hex(b"use anchor_lang::prelude::*;");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn small_change_yields_unrelated_digest() {
        let a = sha256_hex(b"build_success");
        let b = sha256_hex(b"build_success.");
        assert_ne!(a, b);
        assert_ne!(&a[..10], &b[..10]);
    }

    #[test]
    fn short_prefix_is_ten_chars() {
        let digest = sha256_hex(b"init");
        assert_eq!(short(&digest).len(), 10);
        assert!(digest.starts_with(&short(&digest)));
    }
}
