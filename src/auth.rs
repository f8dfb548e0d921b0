//! Shared-password check guarding every mutating operation.
//!
//! There is one password for the whole application. Its SHA-256 digest is
//! configured at startup and compared against the digest of what the operator
//! types. This keeps casual visitors from editing; it is not a security
//! boundary.

use sha2::{Digest, Sha256};

/// Digest used when none is configured (the password `featherpack`).
pub const DEFAULT_PASSWORD_DIGEST: &str =
    "329547bfc9107e8433af0dca45af376b3f4540efb0a16489087e68b9149fca8f";

/// Hex-encoded SHA-256 of a password.
///
/// # Examples
/// ```
/// use featherpack::auth::{hash_password, DEFAULT_PASSWORD_DIGEST};
///
/// assert_eq!(hash_password("featherpack"), DEFAULT_PASSWORD_DIGEST);
/// ```
pub fn hash_password(password: &str) -> String {
    hex::encode(Sha256::digest(password.as_bytes()))
}

/// The configured password digest.
#[derive(Clone, Debug)]
pub struct PasswordGate {
    digest: String,
}

impl PasswordGate {
    /// Build a gate from a hex digest. Returns `None` unless it is 64 hex
    /// characters.
    pub fn from_digest(digest: &str) -> Option<Self> {
        let digest = digest.trim().to_ascii_lowercase();
        if digest.len() != 64 || !digest.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        Some(PasswordGate { digest })
    }

    pub fn verify(&self, password: &str) -> bool {
        constant_time_eq(hash_password(password).as_bytes(), self.digest.as_bytes())
    }
}

impl Default for PasswordGate {
    fn default() -> Self {
        PasswordGate {
            digest: DEFAULT_PASSWORD_DIGEST.to_string(),
        }
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_gate() {
        let gate = PasswordGate::default();
        assert!(gate.verify("featherpack"));
        assert!(!gate.verify("Featherpack"));
        assert!(!gate.verify(""));
    }

    #[test]
    fn test_from_digest() {
        let digest = hash_password("hunter2");
        assert_eq!(
            digest,
            "f52fbd32b2b3b86ff88ef6c490628285f482af15ddcb29541f94bcf526a3f6c7"
        );

        let gate = PasswordGate::from_digest(&digest.to_uppercase()).unwrap();
        assert!(gate.verify("hunter2"));
        assert!(!gate.verify("featherpack"));

        assert!(PasswordGate::from_digest("not-a-digest").is_none());
        assert!(PasswordGate::from_digest(&digest[..10]).is_none());
    }
}
