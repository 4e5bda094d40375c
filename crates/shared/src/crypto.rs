//! Cryptographic utilities shared across the webhook pipeline.

use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

type HmacSha256 = Hmac<Sha256>;

/// Computes SHA-256 hash of the input and returns it as a hex string.
pub fn sha256_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}

/// Computes the lowercase hex HMAC-SHA256 of `body` keyed by `secret`.
///
/// The caller is responsible for prefixing the result with `sha256=` per the
/// outbound webhook signature header contract.
pub fn hmac_sha256_hex(secret: &str, body: &[u8]) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts keys of any length");
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_hex() {
        let hash = sha256_hex("test");
        assert_eq!(hash.len(), 64);
        assert_eq!(
            hash,
            "9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08"
        );
    }

    #[test]
    fn test_hmac_sha256_hex_is_64_lowercase_hex_chars() {
        let sig = hmac_sha256_hex("my-secret", b"{\"a\":1}");
        assert_eq!(sig.len(), 64);
        assert!(sig.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_hmac_sha256_hex_is_deterministic() {
        let a = hmac_sha256_hex("secret", b"payload");
        let b = hmac_sha256_hex("secret", b"payload");
        assert_eq!(a, b);
    }

    #[test]
    fn test_hmac_sha256_hex_changes_with_secret() {
        let a = hmac_sha256_hex("secret-a", b"payload");
        let b = hmac_sha256_hex("secret-b", b"payload");
        assert_ne!(a, b);
    }

    #[test]
    fn test_hmac_sha256_hex_known_vector() {
        // HMAC-SHA256("key", "The quick brown fox jumps over the lazy dog")
        let sig = hmac_sha256_hex("key", b"The quick brown fox jumps over the lazy dog");
        assert_eq!(
            sig,
            "f7bc83f430538424b13298e6aa6fb143ef4d59a14946175997479dbc2d1a3cd8"
        );
    }
}
