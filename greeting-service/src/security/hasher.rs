use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use secrecy::{ExposeSecret, Secret};

/// One-way credential encoding used both when accounts are created and when submitted
/// credentials are checked.
pub trait CredentialHasher: Send + Sync {
    fn hash(&self, raw: &Secret<String>) -> anyhow::Result<String>;

    /// Whether `raw` matches the stored `hash`. A malformed hash never matches.
    fn verify(&self, raw: &Secret<String>, hash: &str) -> bool;
}

/// Argon2id with default parameters. The salt is generated per hash and embedded in
/// the PHC string.
#[derive(Debug, Clone, Default)]
pub struct Argon2Hasher;

impl CredentialHasher for Argon2Hasher {
    fn hash(&self, raw: &Secret<String>) -> anyhow::Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = Argon2::default()
            .hash_password(raw.expose_secret().as_bytes(), &salt)
            .map_err(|e| anyhow::anyhow!("Failed to hash password: {}", e))?
            .to_string();
        Ok(hash)
    }

    fn verify(&self, raw: &Secret<String>, hash: &str) -> bool {
        let Ok(parsed) = PasswordHash::new(hash) else {
            tracing::warn!("Stored credential is not a valid PHC string");
            return false;
        };

        Argon2::default()
            .verify_password(raw.expose_secret().as_bytes(), &parsed)
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secret(value: &str) -> Secret<String> {
        Secret::new(value.to_string())
    }

    #[test]
    fn hash_is_salted_phc_string() {
        let hasher = Argon2Hasher;
        let first = hasher.hash(&secret("greeting")).unwrap();
        let second = hasher.hash(&secret("greeting")).unwrap();

        assert!(first.starts_with("$argon2"));
        assert_ne!(first, "greeting");
        assert_ne!(first, second);
    }

    #[test]
    fn verify_matches_only_the_original() {
        let hasher = Argon2Hasher;
        let hash = hasher.hash(&secret("greeting")).unwrap();

        assert!(hasher.verify(&secret("greeting"), &hash));
        assert!(!hasher.verify(&secret("Greeting"), &hash));
        assert!(!hasher.verify(&secret(""), &hash));
    }

    #[test]
    fn malformed_hash_never_matches() {
        assert!(!Argon2Hasher.verify(&secret("greeting"), "not-a-hash"));
        assert!(!Argon2Hasher.verify(&secret("greeting"), ""));
    }
}
