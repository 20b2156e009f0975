//! Session records and identifier generation.

use anyhow::{anyhow, Result};
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::user::User;

/// An authenticated login.
///
/// Written once on successful credential verification, then only read.
/// Expiry is enforced by the authenticator comparing `expires_at` against
/// the wall clock on every lookup; the record itself never changes and no
/// sliding renewal exists. The profile fields are a snapshot taken at
/// login time, so later edits to the user cannot alter an issued session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Random, unguessable identifier; store key and cookie value.
    pub id: String,
    /// SAML SessionIndex handed to the protocol engine.
    pub index: String,
    /// Subject identifier for the assertion (the user's email).
    pub name_id: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub username: String,
    pub email: String,
    #[serde(default)]
    pub given_name: String,
    #[serde(default)]
    pub surname: String,
    #[serde(default)]
    pub groups: Vec<String>,
}

impl Session {
    /// Build a fresh session for `user` expiring `lifetime` from now.
    pub fn issue(user: &User, lifetime: Duration) -> Result<Session> {
        let now = Utc::now();
        Ok(Session {
            id: generate_session_id()?,
            index: Uuid::new_v4().to_string(),
            name_id: user.email.clone(),
            created_at: now,
            expires_at: now + lifetime,
            username: user.username.clone(),
            email: user.email.clone(),
            given_name: user.given_name.clone(),
            surname: user.surname.clone(),
            groups: user.groups.clone(),
        })
    }

    pub fn is_expired_at(&self, at: DateTime<Utc>) -> bool {
        at >= self.expires_at
    }
}

/// 256-bit random token, base64url without padding.
pub fn generate_session_id() -> Result<String> {
    let mut buf = [0u8; 32];
    getrandom::getrandom(&mut buf).map_err(|e| anyhow!(e.to_string()))?;
    Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(buf))
}
