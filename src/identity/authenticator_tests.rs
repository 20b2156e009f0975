use super::*;
use crate::error::StoreError;
use crate::login::LoginPageSettings;
use crate::saml::{AuthnRequest, Endpoint, IdpCallbacks, ServiceProvider, SsoRequestContext, HTTP_POST_BINDING};
use crate::store::{Collection, EntityStore};
use axum::body::to_bytes;
use axum::http::{header, HeaderMap, Method, StatusCode};
use axum::response::Response;
use chrono::{Duration, Utc};
use serde_json::json;

const SSO_URL: &str = "http://localhost:8080/sso";

fn fixture() -> (EntityStore, SessionAuthenticator) {
    let store = EntityStore::new();
    let user = User {
        username: "alice".to_string(),
        email: "alice@example.com".to_string(),
        given_name: "Alice".to_string(),
        surname: "Liddell".to_string(),
        groups: vec!["testers".to_string()],
        password_hash: hash_password("hunter2").unwrap(),
    };
    store.users.put(&user.username, &user).unwrap();
    let authenticator = SessionAuthenticator::new(
        &store,
        Duration::hours(1),
        LoginPageSettings::default(),
        SSO_URL,
    );
    (store, authenticator)
}

fn credential_post(username: &str, password: &str) -> SsoRequestContext {
    SsoRequestContext {
        method: Method::POST,
        secure: false,
        username: Some(username.to_string()),
        password: Some(password.to_string()),
        session_cookie: None,
    }
}

fn cookie_request(session_id: &str) -> SsoRequestContext {
    SsoRequestContext {
        session_cookie: Some(session_id.to_string()),
        ..SsoRequestContext::default()
    }
}

fn pending_request() -> AuthnRequest {
    AuthnRequest {
        request_buffer: b"<AuthnRequest/>".to_vec(),
        relay_state: "relay-42".to_string(),
    }
}

async fn body_text(response: Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[test]
fn valid_credentials_issue_a_persisted_session_and_cookie() {
    let (store, auth) = fixture();
    let mut headers = HeaderMap::new();
    let session = auth
        .resolve_session(&credential_post("alice", "hunter2"), &pending_request(), &mut headers)
        .expect("session");
    assert_eq!(session.name_id, "alice@example.com");
    assert_eq!(store.sessions.get(&session.id).unwrap(), session);

    let cookie = headers.get(header::SET_COOKIE).unwrap().to_str().unwrap();
    assert!(cookie.starts_with(&format!("session={}", session.id)));
    assert!(cookie.contains("HttpOnly"));
    assert!(cookie.contains("Path=/"));
    assert!(cookie.contains("Max-Age=3600"));
    assert!(!cookie.contains("Secure"));
}

#[test]
fn secure_transport_marks_the_cookie_secure() {
    let (_store, auth) = fixture();
    let mut ctx = credential_post("alice", "hunter2");
    ctx.secure = true;
    let mut headers = HeaderMap::new();
    auth.resolve_session(&ctx, &pending_request(), &mut headers)
        .expect("session");
    let cookie = headers.get(header::SET_COOKIE).unwrap().to_str().unwrap();
    assert!(cookie.contains("; Secure"));
}

#[tokio::test]
async fn wrong_password_renders_a_notice_and_no_cookie() {
    let (store, auth) = fixture();
    let mut headers = HeaderMap::new();
    let response = auth
        .resolve_session(&credential_post("alice", "wrong"), &pending_request(), &mut headers)
        .expect_err("challenge");
    assert_eq!(response.status(), StatusCode::OK);
    assert!(headers.get(header::SET_COOKIE).is_none());
    assert!(store.sessions.list().unwrap().is_empty());

    let html = body_text(response).await;
    assert!(html.contains("Invalid username or password"));
    assert!(html.contains(r#"value="alice""#));
    assert!(html.contains(r#"name="SAMLRequest" value="PEF1dGhuUmVxdWVzdC8+""#));
    assert!(html.contains(r#"name="RelayState" value="relay-42""#));
}

#[tokio::test]
async fn unknown_cookie_re_challenges_without_a_notice() {
    let (_store, auth) = fixture();
    let mut headers = HeaderMap::new();
    let response = auth
        .resolve_session(&cookie_request("no-such-session"), &pending_request(), &mut headers)
        .expect_err("challenge");
    assert_eq!(response.status(), StatusCode::OK);

    let html = body_text(response).await;
    assert!(!html.contains("class=\"notice\""));
    assert!(html.contains(r#"name="RelayState" value="relay-42""#));
}

#[test]
fn expired_session_re_challenges_and_the_record_stays() {
    let (store, auth) = fixture();
    let user = store.users.get("alice").unwrap();
    let mut session = Session::issue(&user, Duration::hours(1)).unwrap();
    session.created_at = Utc::now() - Duration::hours(3);
    session.expires_at = Utc::now() - Duration::hours(2);
    store.sessions.put(&session.id, &session).unwrap();

    let mut headers = HeaderMap::new();
    let result = auth.resolve_session(&cookie_request(&session.id), &pending_request(), &mut headers);
    assert!(result.is_err());
    // Lazy eviction is optional; the stale record may stay.
    assert!(store.sessions.get(&session.id).is_ok());
}

#[test]
fn valid_cookie_resumes_the_session_unchanged() {
    let (store, auth) = fixture();
    let mut headers = HeaderMap::new();
    let issued = auth
        .resolve_session(&credential_post("alice", "hunter2"), &pending_request(), &mut headers)
        .expect("session");

    let mut resume_headers = HeaderMap::new();
    let resumed = auth
        .resolve_session(&cookie_request(&issued.id), &pending_request(), &mut resume_headers)
        .expect("resumed session");
    assert_eq!(resumed, issued);
    // No renewal: the stored expiry is untouched and no new cookie is set.
    assert_eq!(store.sessions.get(&issued.id).unwrap().expires_at, issued.expires_at);
    assert!(resume_headers.get(header::SET_COOKIE).is_none());
}

#[test]
fn corrupted_session_record_is_fatal_not_a_login_form() {
    let (store, auth) = fixture();
    store.put_raw(Collection::Sessions, "broken", json!({"id": 42}));
    let mut headers = HeaderMap::new();
    let response = auth
        .resolve_session(&cookie_request("broken"), &pending_request(), &mut headers)
        .expect_err("fatal");
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn no_session_evidence_gets_a_fresh_challenge() {
    let (_store, auth) = fixture();
    let mut headers = HeaderMap::new();
    let response = auth
        .resolve_session(&SsoRequestContext::default(), &pending_request(), &mut headers)
        .expect_err("challenge");
    assert_eq!(response.status(), StatusCode::OK);
    let html = body_text(response).await;
    assert!(html.contains("<form"));
    assert!(!html.contains("class=\"notice\""));
}

#[test]
fn post_with_empty_username_is_not_a_credential_submission() {
    let (store, auth) = fixture();
    let ctx = SsoRequestContext {
        method: Method::POST,
        username: Some(String::new()),
        password: Some("hunter2".to_string()),
        ..SsoRequestContext::default()
    };
    let mut headers = HeaderMap::new();
    assert!(auth.resolve_session(&ctx, &pending_request(), &mut headers).is_err());
    assert!(store.sessions.list().unwrap().is_empty());
}

#[test]
fn service_provider_lookup_passes_through_the_store() {
    let (store, auth) = fixture();
    assert!(matches!(
        auth.resolve_service_provider("https://sp.example.com/metadata"),
        Err(StoreError::NotFound)
    ));

    let sp = ServiceProvider {
        entity_id: "https://sp.example.com/metadata".to_string(),
        assertion_consumer_services: vec![Endpoint {
            binding: HTTP_POST_BINDING.to_string(),
            location: "https://sp.example.com/acs".to_string(),
        }],
    };
    store.service_providers.put(&sp.entity_id, &sp).unwrap();
    let found = auth.resolve_service_provider(&sp.entity_id).unwrap();
    assert_eq!(found.assertion_consumer_services[0].location, "https://sp.example.com/acs");
}
