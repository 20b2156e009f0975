//! The session state machine the protocol engine calls back into once
//! per inbound SSO request.
//!
//! Three kinds of evidence can arrive: a credential submission, a
//! session cookie, or nothing. Credentials are verified and turn into a
//! fresh persisted session plus a cookie; a cookie resolves to an
//! existing session if it is still unexpired; everything else gets the
//! login form with the pending protocol request carried through. Store
//! failures other than NotFound fail the request closed with a plain
//! 500 instead of the form.

use askama::Template;
use axum::http::{header, HeaderMap, HeaderValue, Method, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{Duration, Utc};
use tracing::{error, info};

use super::credentials::CredentialVerifier;
use super::session::Session;
use crate::error::{AuthError, StoreError};
use crate::login::{LoginPage, LoginPageSettings};
use crate::saml::{AuthnRequest, IdpCallbacks, ServiceProvider, SsoRequestContext};
use crate::store::{EntityStore, Repository};

pub const SESSION_COOKIE: &str = "session";

/// Decides, synchronously, whether the caller is authenticated.
///
/// Session lifetime is threaded in at construction; there is no ambient
/// session-age state anywhere else.
pub struct SessionAuthenticator {
    sessions: Repository<Session>,
    service_providers: Repository<ServiceProvider>,
    verifier: CredentialVerifier,
    session_lifetime: Duration,
    login: LoginPageSettings,
    sso_url: String,
}

impl SessionAuthenticator {
    pub fn new(
        store: &EntityStore,
        session_lifetime: Duration,
        login: LoginPageSettings,
        sso_url: impl Into<String>,
    ) -> Self {
        Self {
            sessions: store.sessions.clone(),
            service_providers: store.service_providers.clone(),
            verifier: CredentialVerifier::new(store.users.clone()),
            session_lifetime,
            login,
            sso_url: sso_url.into(),
        }
    }

    fn login_with_credentials(
        &self,
        ctx: &SsoRequestContext,
        request: &AuthnRequest,
        username: &str,
        response_headers: &mut HeaderMap,
    ) -> Result<Session, Response> {
        let password = ctx.password.as_deref().unwrap_or_default();
        let user = match self.verifier.verify(username, password) {
            Ok(user) => user,
            Err(AuthError::InvalidCredentials) => {
                info!("failed login attempt for {}", username);
                return Err(self.challenge(request, username, Some("Invalid username or password")));
            }
            Err(AuthError::Store(e)) => {
                error!("user lookup failed: {e}");
                return Err(internal_error());
            }
        };

        let session = match Session::issue(&user, self.session_lifetime) {
            Ok(session) => session,
            Err(e) => {
                error!("could not issue session: {e}");
                return Err(internal_error());
            }
        };
        if let Err(e) = self.sessions.put(&session.id, &session) {
            error!("could not persist session: {e}");
            return Err(internal_error());
        }

        response_headers.append(
            header::SET_COOKIE,
            session_cookie(&session.id, self.session_lifetime, ctx.secure),
        );
        info!("issued session for {}", user.username);
        Ok(session)
    }

    fn resume_from_cookie(
        &self,
        request: &AuthnRequest,
        session_id: &str,
    ) -> Result<Session, Response> {
        match self.sessions.get(session_id) {
            // A missing session means "never logged in", not an error.
            Err(StoreError::NotFound) => Err(self.challenge(request, "", None)),
            Err(e) => {
                error!("session lookup failed: {e}");
                Err(internal_error())
            }
            Ok(session) if session.is_expired_at(Utc::now()) => {
                // Silent re-prompt; the stale record may stay in the store.
                Err(self.challenge(request, "", None))
            }
            Ok(session) => Ok(session),
        }
    }

    /// Render the login form, carrying the pending protocol request and
    /// relay state through unmodified so the SSO flow can resume after
    /// the user resubmits.
    fn challenge(&self, request: &AuthnRequest, username: &str, notice: Option<&str>) -> Response {
        let page = LoginPage {
            title: self.login.title.clone().unwrap_or_else(|| "Login".to_string()),
            description: self.login.description_html.clone(),
            users: self.login.users.clone(),
            notice: notice.map(str::to_string),
            username: username.to_string(),
            url: self.sso_url.clone(),
            saml_request: BASE64.encode(&request.request_buffer),
            relay_state: request.relay_state.clone(),
        };
        match page.render() {
            Ok(html) => Html(html).into_response(),
            Err(e) => {
                error!("login page render failed: {e}");
                internal_error()
            }
        }
    }
}

impl IdpCallbacks for SessionAuthenticator {
    fn resolve_session(
        &self,
        ctx: &SsoRequestContext,
        request: &AuthnRequest,
        response_headers: &mut HeaderMap,
    ) -> Result<Session, Response> {
        if ctx.method == Method::POST {
            if let Some(username) = ctx.username.as_deref().filter(|u| !u.is_empty()) {
                return self.login_with_credentials(ctx, request, username, response_headers);
            }
        }
        if let Some(session_id) = ctx.session_cookie.as_deref() {
            return self.resume_from_cookie(request, session_id);
        }
        Err(self.challenge(request, "", None))
    }

    fn resolve_service_provider(&self, entity_id: &str) -> Result<ServiceProvider, StoreError> {
        self.service_providers.get(entity_id)
    }
}

fn internal_error() -> Response {
    (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error\n").into_response()
}

fn session_cookie(session_id: &str, lifetime: Duration, secure: bool) -> HeaderValue {
    let mut cookie = format!(
        "{}={}; HttpOnly; Path=/; Max-Age={}",
        SESSION_COOKIE,
        session_id,
        lifetime.num_seconds()
    );
    if secure {
        cookie.push_str("; Secure");
    }
    // Session ids are base64url, so the cookie value is always valid ASCII.
    HeaderValue::from_str(&cookie).unwrap()
}
