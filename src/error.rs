//! Error model shared by the store, identity and HTTP layers.

use axum::http::StatusCode;
use thiserror::Error;

/// Errors surfaced by the entity store.
///
/// `NotFound` is an expected condition callers branch on explicitly; the
/// remaining variants mean the store itself is broken and map to 500-class
/// responses. A decode failure is never collapsed into `NotFound`.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,
    /// The key exists but its payload does not match the expected record shape.
    #[error("stored record could not be decoded: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("store failure: {0}")]
    Internal(String),
}

impl StoreError {
    pub fn http_status(&self) -> StatusCode {
        match self {
            StoreError::NotFound => StatusCode::NOT_FOUND,
            StoreError::Decode(_) | StoreError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Credential verification outcome.
///
/// Unknown usernames and wrong passwords both collapse into
/// `InvalidCredentials` so the login form cannot be used to enumerate
/// accounts. Store failures other than NotFound keep their own variant and
/// must never be presented as a credential problem.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid username or password")]
    InvalidCredentials,
    #[error(transparent)]
    Store(#[from] StoreError),
}
