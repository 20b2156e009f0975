use serde::{Deserialize, Serialize};

/// Identity record held by the entity store, keyed by username.
///
/// Only the PHC hash of the password is stored; the plaintext exists
/// solely while the configuration loader (or an administrative create)
/// runs it through `hash_password`. Records are immutable once stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub username: String,
    pub email: String,
    #[serde(default)]
    pub given_name: String,
    #[serde(default)]
    pub surname: String,
    #[serde(default)]
    pub groups: Vec<String>,
    pub password_hash: String,
}
