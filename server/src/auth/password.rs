//! Argon2id password hashing. Both operations are CPU-bound and run on the
//! blocking pool.

use argon2::password_hash::{
    rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString,
};
use argon2::Argon2;
use tokio::task;

use crate::utils::error::{AppError, AppResult};

pub async fn hash_password(plain: String) -> AppResult<String> {
    task::spawn_blocking(move || hash_password_blocking(&plain))
        .await
        .map_err(|e| AppError::InternalServerError(format!("password hashing task failed: {e}")))?
}

/// Verifies `plain` against a stored PHC hash string in constant time.
/// A malformed stored hash counts as a mismatch.
pub async fn verify_password(hash: String, plain: String) -> AppResult<bool> {
    task::spawn_blocking(move || verify_password_blocking(&hash, &plain))
        .await
        .map_err(|e| AppError::InternalServerError(format!("password verify task failed: {e}")))
}

pub fn hash_password_blocking(plain: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::InternalServerError(format!("failed to hash password: {e}")))
}

fn verify_password_blocking(hash: &str, plain: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(plain.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            tracing::warn!(error = %e, "Stored password hash is malformed");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn hash_verifies_only_the_original_password() {
        let hash = hash_password("pumpkin-patch".to_string()).await.unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password(hash.clone(), "pumpkin-patch".to_string()).await.unwrap());
        assert!(!verify_password(hash, "pumpkin-patch!".to_string()).await.unwrap());
    }

    #[tokio::test]
    async fn salts_differ_between_hashes() {
        let first = hash_password("hayride".to_string()).await.unwrap();
        let second = hash_password("hayride".to_string()).await.unwrap();
        assert_ne!(first, second);
    }

    #[tokio::test]
    async fn malformed_hash_is_a_mismatch() {
        assert!(!verify_password("plaintext".to_string(), "plaintext".to_string())
            .await
            .unwrap());
    }
}
