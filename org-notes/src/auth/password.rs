use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::{distributions::Alphanumeric, Rng};

use crate::{config, Error, Result};

/// Argon2id hash in PHC format.
pub fn hash(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| Error::Unexpected(format!("failed to hash password: {e}")))
}

pub fn verify(password: &str, hash: &str) -> Result<bool> {
    let parsed = PasswordHash::new(hash).map_err(|e| Error::Unexpected(format!("invalid password hash: {e}")))?;
    Ok(Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok())
}

/// Hashing is deliberately slow, keep it off the async workers.
pub async fn hash_blocking(password: String) -> Result<String> {
    tokio::task::spawn_blocking(move || hash(&password))
        .await
        .map_err(|e| Error::Unexpected(e.to_string()))?
}

pub async fn verify_blocking(password: String, hash: String) -> Result<bool> {
    tokio::task::spawn_blocking(move || verify(&password, &hash))
        .await
        .map_err(|e| Error::Unexpected(e.to_string()))?
}

pub fn validate_new_password(password: &str, confirm_password: &str) -> Result<()> {
    let min = config().min_password_length;
    if password.is_empty() {
        return Err(Error::Validation("Password is required".into()));
    }
    if password != confirm_password {
        return Err(Error::Validation("Passwords do not match".into()));
    }
    if password.chars().count() < min {
        return Err(Error::Validation(format!(
            "Password must be at least {min} characters long"
        )));
    }
    Ok(())
}

/// Opaque token for invite and reset links.
pub fn token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(32)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_and_verify() {
        let hashed = hash("correct horse").unwrap();

        assert!(hashed.starts_with("$argon2id$"));
        assert!(verify("correct horse", &hashed).unwrap());
        assert!(!verify("battery staple", &hashed).unwrap());
        assert!(verify("anything", "not a phc string").is_err());
    }

    #[test]
    fn new_password_rules() {
        assert!(validate_new_password("secret1", "secret1").is_ok());
        assert!(matches!(
            validate_new_password("secret1", "secret2"),
            Err(Error::Validation(message)) if message == "Passwords do not match"
        ));
        assert!(matches!(
            validate_new_password("abc", "abc"),
            Err(Error::Validation(message)) if message.contains("at least 6")
        ));
        assert!(validate_new_password("", "").is_err());
    }

    #[test]
    fn tokens_are_unique_and_alphanumeric() {
        let (a, b) = (token(), token());

        assert_eq!(a.len(), 32);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(a, b);
    }
}
