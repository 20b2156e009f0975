//! Boundary toward the external SAML protocol engine.
//!
//! The engine owns every XML concern: metadata documents, AuthnRequest
//! parsing, signing, response marshaling. This crate hands it two
//! capabilities -- session resolution and service-provider lookup -- and
//! receives the still-opaque request material back through the login
//! round trip. Nothing in this module inspects SAML payloads.

use axum::http::{HeaderMap, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::StoreError;
use crate::identity::Session;

/// SAML HTTP-POST binding identifier for assertion consumer endpoints.
pub const HTTP_POST_BINDING: &str = "urn:oasis:names:tc:SAML:2.0:bindings:HTTP-POST";

/// A remote relying party, registered from configuration at startup and
/// read-only afterwards. Keyed in the store by `entity_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceProvider {
    pub entity_id: String,
    pub assertion_consumer_services: Vec<Endpoint>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub binding: String,
    pub location: String,
}

/// The pending authentication request. Opaque here except for the raw
/// payload replayed through the login form and the relay-state token the
/// service provider expects back unmodified.
#[derive(Debug, Clone, Default)]
pub struct AuthnRequest {
    pub request_buffer: Vec<u8>,
    pub relay_state: String,
}

/// What the engine hands over from the inbound HTTP request when it calls
/// back for session resolution.
#[derive(Debug, Clone)]
pub struct SsoRequestContext {
    pub method: Method,
    /// True when the request arrived over a secure transport; controls the
    /// `Secure` attribute of the session cookie.
    pub secure: bool,
    pub username: Option<String>,
    pub password: Option<String>,
    pub session_cookie: Option<String>,
}

impl Default for SsoRequestContext {
    fn default() -> Self {
        Self {
            method: Method::GET,
            secure: false,
            username: None,
            password: None,
            session_cookie: None,
        }
    }
}

/// Capability interface the protocol engine depends on, implemented by
/// the session authenticator.
pub trait IdpCallbacks: Send + Sync {
    /// Resolve the authenticated session for the request.
    ///
    /// `Ok` returns the session; any cookie to set on the eventual
    /// response has been added to `response_headers`, which the engine
    /// must carry onto the response it writes. `Err` carries a complete
    /// HTTP response (login challenge or internal error) that the engine
    /// must send as-is -- the SSO flow halts there.
    fn resolve_session(
        &self,
        ctx: &SsoRequestContext,
        request: &AuthnRequest,
        response_headers: &mut HeaderMap,
    ) -> Result<Session, Response>;

    /// Look up a registered service provider by entity id. `NotFound`
    /// aborts the SSO flow with a protocol-level error on the engine side.
    fn resolve_service_provider(&self, entity_id: &str) -> Result<ServiceProvider, StoreError>;
}

/// The face of the external SAML protocol library.
///
/// Real implementations live outside this crate and are constructed over
/// an [`IdpCallbacks`]. [`StubEngine`] below is the only in-tree
/// implementation.
pub trait SamlEngine: Send + Sync {
    /// Serve the IdP metadata document.
    fn serve_metadata(&self) -> Response;

    /// Handle an inbound SSO request. `saml_request` and `relay_state`
    /// arrive as the raw query/form values, still base64/opaque.
    fn serve_sso(&self, ctx: SsoRequestContext, saml_request: &str, relay_state: &str) -> Response;
}

/// Protocol-free stand-in used by tests and local smoke runs.
///
/// It performs no XML work at all: the SAMLRequest value is decoded only
/// to recover the opaque byte payload that must survive the login round
/// trip, and a successful resolution is reported as a plain page instead
/// of a signed assertion.
pub struct StubEngine {
    callbacks: Arc<dyn IdpCallbacks>,
}

impl StubEngine {
    pub fn new(callbacks: Arc<dyn IdpCallbacks>) -> Self {
        Self { callbacks }
    }
}

impl SamlEngine for StubEngine {
    fn serve_metadata(&self) -> Response {
        (
            StatusCode::NOT_IMPLEMENTED,
            "metadata requires a SAML protocol engine\n",
        )
            .into_response()
    }

    fn serve_sso(&self, ctx: SsoRequestContext, saml_request: &str, relay_state: &str) -> Response {
        let request_buffer = if saml_request.is_empty() {
            Vec::new()
        } else {
            match BASE64.decode(saml_request) {
                Ok(bytes) => bytes,
                Err(_) => {
                    return (StatusCode::BAD_REQUEST, "malformed SAMLRequest\n").into_response()
                }
            }
        };
        let request = AuthnRequest { request_buffer, relay_state: relay_state.to_string() };

        let mut response_headers = HeaderMap::new();
        match self.callbacks.resolve_session(&ctx, &request, &mut response_headers) {
            Err(response) => response,
            Ok(session) => {
                // A real engine signs and posts an assertion here.
                let body = format!(
                    "authenticated as {} (session index {}), relay state {:?}\n",
                    session.name_id, session.index, request.relay_state
                );
                let mut response = (StatusCode::OK, body).into_response();
                response.headers_mut().extend(response_headers);
                response
            }
        }
    }
}
