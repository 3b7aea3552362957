//! One-time tokens for password resets and email verification.
//!
//! Tokens are random 256-bit hex strings. Only the SHA-256 digest is stored;
//! the plaintext travels once, inside the email.

use sha2::{Digest, Sha256};

/// Generate a token and its at-rest digest: `(plaintext, digest)`.
pub fn generate() -> (String, String) {
    let bytes: [u8; 32] = rand::random();
    let token = hex(&bytes);
    let token_digest = digest(&token);
    (token, token_digest)
}

/// SHA-256 digest of a token, hex-encoded.
pub fn digest(token: &str) -> String {
    format!("{:x}", Sha256::digest(token.as_bytes()))
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_are_unique_and_digests_match() {
        let (a, a_digest) = generate();
        let (b, _) = generate();

        assert_ne!(a, b);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(digest(&a), a_digest);
        assert_ne!(digest(&b), a_digest);
    }
}
