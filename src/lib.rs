//! Test SAML Identity Provider.
//!
//! Everything protocol-shaped (metadata XML, AuthnRequest parsing,
//! assertion signing) lives behind the engine boundary in `saml`; this
//! crate owns credential verification, session issuance and resumption,
//! and the in-memory entity store backing both.

pub mod config;
pub mod error;
pub mod identity;
pub mod login;
pub mod saml;
pub mod server;
pub mod store;
