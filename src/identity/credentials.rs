//! Password hashing and credential verification.

use anyhow::{anyhow, Result};
use argon2::{Argon2, PasswordHasher, PasswordVerifier};
use password_hash::{PasswordHash, SaltString};

use super::user::User;
use crate::error::{AuthError, StoreError};
use crate::store::Repository;

/// Hash a plaintext password into a PHC string with a fresh random salt.
pub fn hash_password(password: &str) -> Result<String> {
    let mut salt_bytes = [0u8; 16];
    getrandom::getrandom(&mut salt_bytes).map_err(|e| anyhow!(e.to_string()))?;
    let salt = SaltString::encode_b64(&salt_bytes).map_err(|e| anyhow!(e.to_string()))?;
    let argon2 = Argon2::default();
    let phc = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow!(e.to_string()))?
        .to_string();
    Ok(phc)
}

/// Check a plaintext password against a stored PHC hash. The comparison
/// runs inside the argon2 crate and is not observable through timing.
pub fn verify_password(hash: &str, password: &str) -> bool {
    if let Ok(parsed) = PasswordHash::new(hash) {
        let argon2 = Argon2::default();
        argon2.verify_password(password.as_bytes(), &parsed).is_ok()
    } else {
        false
    }
}

/// Verifies a claimed username/password pair against the user repository.
#[derive(Clone)]
pub struct CredentialVerifier {
    users: Repository<User>,
}

impl CredentialVerifier {
    pub fn new(users: Repository<User>) -> Self {
        Self { users }
    }

    /// Unknown usernames and wrong passwords are indistinguishable in the
    /// returned error. Store failures other than NotFound propagate
    /// unchanged so a broken store is never reported as bad credentials.
    pub fn verify(&self, username: &str, password: &str) -> Result<User, AuthError> {
        let user = match self.users.get(username) {
            Ok(user) => user,
            Err(StoreError::NotFound) => return Err(AuthError::InvalidCredentials),
            Err(e) => return Err(AuthError::Store(e)),
        };
        if !verify_password(&user.password_hash, password) {
            return Err(AuthError::InvalidCredentials);
        }
        Ok(user)
    }
}
