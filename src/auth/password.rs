use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::rngs::OsRng;
use tracing::error;

/// Hash a plaintext password with a fresh per-user salt. The salt is
/// embedded in the returned PHC string, so `verify_password` needs no
/// extra state.
pub fn hash_password(plain: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let digest = Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map_err(|e| {
            error!(error = %e, "argon2 hash_password error");
            anyhow::anyhow!(e.to_string())
        })?
        .to_string();
    Ok(digest)
}

pub fn verify_password(plain: &str, digest: &str) -> anyhow::Result<bool> {
    let parsed = PasswordHash::new(digest).map_err(|e| {
        error!(error = %e, "argon2 parse digest error");
        anyhow::anyhow!(e.to_string())
    })?;
    Ok(Argon2::default()
        .verify_password(plain.as_bytes(), &parsed)
        .is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_and_verify_roundtrip() {
        let password = "Abcdef1!";
        let digest = hash_password(password).expect("hashing should succeed");
        assert!(verify_password(password, &digest).expect("verify should succeed"));
    }

    #[test]
    fn verify_rejects_wrong_password() {
        let digest = hash_password("Abcdef1!").expect("hashing should succeed");
        assert!(!verify_password("wrong", &digest).expect("verify should not error"));
    }

    #[test]
    fn same_password_hashes_differently() {
        // Per-user salt: two digests of the same plaintext never collide
        let a = hash_password("Abcdef1!").expect("hash a");
        let b = hash_password("Abcdef1!").expect("hash b");
        assert_ne!(a, b);
        assert!(verify_password("Abcdef1!", &a).unwrap());
        assert!(verify_password("Abcdef1!", &b).unwrap());
    }

    #[test]
    fn verify_errors_on_malformed_digest() {
        let err = verify_password("anything", "not-a-valid-digest").unwrap_err();
        assert!(!err.to_string().is_empty());
    }
}
