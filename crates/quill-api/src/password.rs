//! Werkzeug-compatible `pbkdf2:sha256` password hashes.
//!
//! Stored form: `pbkdf2:sha256:<iterations>$<salt>$<hex digest>`, so hashes
//! written by the earlier deployment keep verifying.

use pbkdf2::pbkdf2_hmac;
use rand::{Rng, distr::Alphanumeric};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use tracing::warn;

pub const SALT_LENGTH: usize = 8;
pub const DEFAULT_ITERATIONS: u32 = 600_000;

/// Iteration count implied by a bare `pbkdf2:sha256` method.
const LEGACY_ITERATIONS: u32 = 260_000;
const METHOD: &str = "pbkdf2:sha256";

#[derive(Debug, Clone)]
pub struct Pbkdf2Hasher {
    iterations: u32,
}

impl Default for Pbkdf2Hasher {
    fn default() -> Self {
        Self::new(DEFAULT_ITERATIONS)
    }
}

impl Pbkdf2Hasher {
    pub fn new(iterations: u32) -> Self {
        Self {
            iterations: iterations.max(1),
        }
    }

    pub fn hash(&self, password: &str) -> String {
        let salt = generate_salt(SALT_LENGTH);
        let digest = derive(password, &salt, self.iterations);
        format!("{METHOD}:{}${salt}${digest}", self.iterations)
    }
}

/// Check `password` against a stored hash. Malformed hashes never verify.
pub fn verify_password(stored: &str, password: &str) -> bool {
    let Some((method, salt, digest)) = split_hash(stored) else {
        warn!("Stored password hash has an unrecognised format");
        return false;
    };

    let iterations = match method.strip_prefix(METHOD) {
        Some("") => LEGACY_ITERATIONS,
        Some(rest) => match rest.strip_prefix(':').and_then(|n| n.parse::<u32>().ok()) {
            Some(n) if n > 0 => n,
            _ => {
                warn!("Stored password hash has a bad iteration count: {}", method);
                return false;
            }
        },
        None => {
            warn!("Unsupported password hash method: {}", method);
            return false;
        }
    };

    let expected = derive(password, salt, iterations);
    expected.as_bytes().ct_eq(digest.as_bytes()).into()
}

fn split_hash(stored: &str) -> Option<(&str, &str, &str)> {
    let mut parts = stored.splitn(3, '$');
    let method = parts.next()?;
    let salt = parts.next()?;
    let digest = parts.next()?;
    Some((method, salt, digest))
}

fn derive(password: &str, salt: &str, iterations: u32) -> String {
    let mut out = [0u8; 32];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), salt.as_bytes(), iterations, &mut out);
    hex::encode(out)
}

fn generate_salt(len: usize) -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_has_werkzeug_layout() {
        let hash = Pbkdf2Hasher::new(1_000).hash("pw1");
        let (method, salt, digest) = split_hash(&hash).unwrap();

        assert_eq!(method, "pbkdf2:sha256:1000");
        assert_eq!(salt.len(), SALT_LENGTH);
        assert!(salt.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_eq!(digest.len(), 64);
    }

    #[test]
    fn verifies_only_original_password() {
        let hasher = Pbkdf2Hasher::new(1_000);
        let hash = hasher.hash("pw1");

        assert!(verify_password(&hash, "pw1"));
        assert!(!verify_password(&hash, "pw2"));
        assert!(!verify_password(&hash, ""));
    }

    #[test]
    fn same_password_gets_fresh_salt() {
        let hasher = Pbkdf2Hasher::new(1_000);
        assert_ne!(hasher.hash("pw1"), hasher.hash("pw1"));
    }

    #[test]
    fn verifies_known_pbkdf2_sha256_vectors() {
        let one = "pbkdf2:sha256:1$salt$120fb6cffcf8b32c43e7225256c4f837a86548c92ccc35480805987cb70be17b";
        assert!(verify_password(one, "password"));
        assert!(!verify_password(one, "Password"));

        let many = "pbkdf2:sha256:4096$salt$c5e478d59288c841aa530db6845c4c8d962893a001ce4e11a4963873aa98134a";
        assert!(verify_password(many, "password"));
    }

    #[test]
    fn rejects_malformed_hashes() {
        assert!(!verify_password("", "password"));
        assert!(!verify_password("plaintext", "plaintext"));
        assert!(!verify_password("pbkdf2:sha1:1$salt$abcd", "password"));
        assert!(!verify_password("pbkdf2:sha256:zero$salt$abcd", "password"));
        assert!(!verify_password("pbkdf2:sha256:0$salt$abcd", "password"));
    }
}
