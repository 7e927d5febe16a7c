use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// Plain-text secret as received from a caller. Neither `Debug` nor `Serialize` prints it.
#[derive(Clone, Deserialize)]
#[serde(transparent)]
pub struct Password(String);

impl Password {
    pub fn new(password: String) -> Self {
        Self(password)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Password(***)")
    }
}

impl Serialize for Password {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str("***")
    }
}

/// Credential hashing collaborator. Implementations own salting and constant-time
/// comparison.
pub trait CredentialHasher: Send + Sync {
    fn hash(&self, password: &Password) -> Result<String, anyhow::Error>;

    /// Returns `false` for a wrong password and for a hash it cannot parse.
    fn verify(&self, password: &Password, credential_hash: &str) -> bool;
}

/// Argon2id with the crate's default parameters; the salt is embedded in the PHC string.
#[derive(Debug, Default, Clone)]
pub struct Argon2Hasher;

impl CredentialHasher for Argon2Hasher {
    fn hash(&self, password: &Password) -> Result<String, anyhow::Error> {
        let salt = SaltString::generate(&mut OsRng);

        let hash = Argon2::default()
            .hash_password(password.as_str().as_bytes(), &salt)
            .map_err(|e| anyhow::anyhow!("Failed to hash password: {}", e))?
            .to_string();

        Ok(hash)
    }

    fn verify(&self, password: &Password, credential_hash: &str) -> bool {
        let parsed_hash = match PasswordHash::new(credential_hash) {
            Ok(hash) => hash,
            Err(e) => {
                tracing::warn!(error = %e, "Stored credential hash is not a valid PHC string");
                return false;
            }
        };

        Argon2::default()
            .verify_password(password.as_str().as_bytes(), &parsed_hash)
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_argon2_phc_string() {
        let password = Password::new("margaux-2024".to_string());
        let hash = Argon2Hasher.hash(&password).expect("Failed to hash password");

        assert!(hash.starts_with("$argon2"));
        assert!(!hash.contains("margaux-2024"));
    }

    #[test]
    fn verify_accepts_only_the_original_password() {
        let password = Password::new("margaux-2024".to_string());
        let hash = Argon2Hasher.hash(&password).expect("Failed to hash password");

        assert!(Argon2Hasher.verify(&password, &hash));
        assert!(!Argon2Hasher.verify(&Password::new("cantenac".to_string()), &hash));
    }

    #[test]
    fn salts_differ_between_hashes() {
        let password = Password::new("margaux-2024".to_string());
        let first = Argon2Hasher.hash(&password).unwrap();
        let second = Argon2Hasher.hash(&password).unwrap();

        assert_ne!(first, second);
        assert!(Argon2Hasher.verify(&password, &first));
        assert!(Argon2Hasher.verify(&password, &second));
    }

    #[test]
    fn garbage_hash_never_verifies() {
        let password = Password::new("margaux-2024".to_string());
        assert!(!Argon2Hasher.verify(&password, "not-a-phc-string"));
    }

    #[test]
    fn debug_redacts_secret() {
        let password = Password::new("margaux-2024".to_string());
        assert_eq!(format!("{:?}", password), "Password(***)");
    }

    #[test]
    fn serialize_redacts_secret() {
        let password = Password::new("margaux-2024".to_string());
        assert_eq!(serde_json::to_string(&password).unwrap(), "\"***\"");
    }
}
