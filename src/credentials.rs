//! Password hashing used by login and registration.
//!
//! Stored hashes have the form `base64(salt):base64(derived_key)`. Callers
//! only ever hash and verify; nothing else inspects the format.

use base64::{engine::general_purpose::STANDARD, Engine};
use rand::Rng;
use sha2::Sha256;
use std::sync::Arc;

/// Default PBKDF2 iteration count.
pub const DEFAULT_ITERATIONS: u32 = 65_536;

const SALT_LEN: usize = 16;
const KEY_LEN: usize = 32;

#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("password must not be empty")]
    EmptyPassword,
    #[error("hashing task failed: {0}")]
    Task(String),
}

/// Hashes and verifies passwords.
pub trait CredentialVerifier: Send + Sync {
    fn hash(&self, plaintext: &str) -> Result<String, CredentialError>;

    /// False for a wrong password and for a malformed stored hash alike.
    fn verify(&self, plaintext: &str, stored_hash: &str) -> bool;
}

/// PBKDF2-HMAC-SHA256 with a random per-password salt.
#[derive(Debug, Clone)]
pub struct Pbkdf2Verifier {
    iterations: u32,
}

impl Pbkdf2Verifier {
    pub fn new() -> Self {
        Self::with_iterations(DEFAULT_ITERATIONS)
    }

    pub fn with_iterations(iterations: u32) -> Self {
        Self {
            iterations: iterations.max(1),
        }
    }

    fn derive(&self, plaintext: &str, salt: &[u8]) -> [u8; KEY_LEN] {
        let mut key = [0u8; KEY_LEN];
        pbkdf2::pbkdf2_hmac::<Sha256>(plaintext.as_bytes(), salt, self.iterations, &mut key);
        key
    }
}

impl Default for Pbkdf2Verifier {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialVerifier for Pbkdf2Verifier {
    fn hash(&self, plaintext: &str) -> Result<String, CredentialError> {
        if plaintext.is_empty() {
            return Err(CredentialError::EmptyPassword);
        }

        let mut salt = [0u8; SALT_LEN];
        rand::rng().fill(&mut salt);
        let key = self.derive(plaintext, &salt);

        Ok(format!("{}:{}", STANDARD.encode(salt), STANDARD.encode(key)))
    }

    fn verify(&self, plaintext: &str, stored_hash: &str) -> bool {
        let Some((salt, expected)) = stored_hash.split_once(':') else {
            return false;
        };
        let (Ok(salt), Ok(expected)) = (STANDARD.decode(salt), STANDARD.decode(expected)) else {
            return false;
        };
        if expected.len() != KEY_LEN {
            return false;
        }

        let actual = self.derive(plaintext, &salt);
        constant_time_eq(&actual, &expected)
    }
}

/// Hashes on the blocking pool; key derivation is deliberately slow.
pub async fn hash_blocking(
    verifier: Arc<dyn CredentialVerifier>,
    plaintext: &str,
) -> Result<String, CredentialError> {
    let plaintext = plaintext.to_string();
    tokio::task::spawn_blocking(move || verifier.hash(&plaintext))
        .await
        .map_err(|e| CredentialError::Task(e.to_string()))?
}

/// Verifies on the blocking pool. A panicked task counts as a mismatch.
pub async fn verify_blocking(
    verifier: Arc<dyn CredentialVerifier>,
    plaintext: &str,
    stored_hash: &str,
) -> bool {
    let plaintext = plaintext.to_string();
    let stored_hash = stored_hash.to_string();

    match tokio::task::spawn_blocking(move || verifier.verify(&plaintext, &stored_hash)).await {
        Ok(verified) => verified,
        Err(e) => {
            tracing::warn!(error = %e, "Password verification task failed");
            false
        }
    }
}

/// Byte comparison whose timing does not depend on where inputs differ.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verifier() -> Pbkdf2Verifier {
        Pbkdf2Verifier::with_iterations(1_000)
    }

    #[test]
    fn test_hash_then_verify() {
        let v = verifier();
        let hash = v.hash("correct horse").unwrap();

        assert!(v.verify("correct horse", &hash));
        assert!(!v.verify("wrong horse", &hash));
    }

    #[test]
    fn test_hash_format() {
        let hash = verifier().hash("pw").unwrap();
        let (salt, key) = hash.split_once(':').unwrap();

        assert_eq!(STANDARD.decode(salt).unwrap().len(), SALT_LEN);
        assert_eq!(STANDARD.decode(key).unwrap().len(), KEY_LEN);
    }

    #[test]
    fn test_salts_differ() {
        let v = verifier();
        assert_ne!(v.hash("same").unwrap(), v.hash("same").unwrap());
    }

    #[test]
    fn test_malformed_hash_does_not_verify() {
        let v = verifier();

        assert!(!v.verify("pw", ""));
        assert!(!v.verify("pw", "no-separator"));
        assert!(!v.verify("pw", "!!!:???"));
        assert!(!v.verify("pw", "c2FsdA==:c2hvcnQ="));
    }

    #[test]
    fn test_iteration_count_is_part_of_hash_identity() {
        let hash = Pbkdf2Verifier::with_iterations(1_000).hash("pw").unwrap();

        assert!(!Pbkdf2Verifier::with_iterations(2_000).verify("pw", &hash));
    }

    #[test]
    fn test_empty_password_rejected() {
        assert!(matches!(
            verifier().hash(""),
            Err(CredentialError::EmptyPassword)
        ));
    }

    #[tokio::test]
    async fn test_blocking_helpers() {
        let v: Arc<dyn CredentialVerifier> = Arc::new(verifier());
        let hash = hash_blocking(v.clone(), "pw").await.unwrap();

        assert!(verify_blocking(v.clone(), "pw", &hash).await);
        assert!(!verify_blocking(v, "other", &hash).await);
    }
}
