//! Axum HTTP surface for the test IdP.
//!
//! Responsibilities:
//! - Bulk-load configured users (hash-then-store) and service providers
//!   at startup, with per-record inventory logs.
//! - Mount the health, metadata and SSO routes over the protocol engine.
//! - Optionally mount the /debug listings when explicitly enabled.

use std::sync::Arc;

use anyhow::Context;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Form, Json, Router};
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info};

use crate::config::{Config, ServiceConfig, UserConfig};
use crate::identity::{hash_password, SessionAuthenticator, User, SESSION_COOKIE};
use crate::login::{render_markdown, DisplayUser, LoginPageSettings};
use crate::saml::{
    Endpoint, SamlEngine, ServiceProvider, SsoRequestContext, StubEngine, HTTP_POST_BINDING,
};
use crate::store::EntityStore;

/// Shared server state injected into all handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: EntityStore,
    pub engine: Arc<dyn SamlEngine>,
}

/// Hash-then-store every configured user. This is the same operation an
/// administrative create-user would perform; loading is all-or-nothing
/// per record.
pub fn load_users(store: &EntityStore, users: &[UserConfig]) -> anyhow::Result<()> {
    for user in users {
        let password_hash = hash_password(&user.password)
            .with_context(|| format!("While hashing password for user: {}", user.username))?;
        let record = User {
            username: user.username.clone(),
            email: user.email.clone(),
            given_name: user.first_name.clone(),
            surname: user.last_name.clone(),
            groups: user.groups.clone(),
            password_hash,
        };
        store
            .users
            .put(&record.username, &record)
            .with_context(|| format!("While storing user: {}", user.username))?;
        info!("initialized user: {}", record.username);
    }
    Ok(())
}

pub fn load_service_providers(
    store: &EntityStore,
    services: &[ServiceConfig],
) -> anyhow::Result<()> {
    for service in services {
        let record = ServiceProvider {
            entity_id: service.entity_id.clone(),
            assertion_consumer_services: vec![Endpoint {
                binding: HTTP_POST_BINDING.to_string(),
                location: service.assertion_consumer_service.clone(),
            }],
        };
        store
            .service_providers
            .put(&record.entity_id, &record)
            .with_context(|| format!("While storing service provider: {}", record.entity_id))?;
        info!("initialized service provider: {}", record.entity_id);
    }
    Ok(())
}

fn login_page_settings(config: &Config) -> LoginPageSettings {
    LoginPageSettings {
        title: config.login_page.title.clone(),
        description_html: config.login_page.description.as_deref().map(render_markdown),
        users: if config.login_page.dump_users {
            config
                .users
                .iter()
                .map(|user| DisplayUser {
                    username: user.username.clone(),
                    password: user.password.clone(),
                    email: user.email.clone(),
                })
                .collect()
        } else {
            Vec::new()
        },
    }
}

/// Build the entity store, load the configured records, and wire the
/// authenticator into the protocol engine.
pub fn app_state(config: &Config) -> anyhow::Result<AppState> {
    let store = EntityStore::new();
    load_users(&store, &config.users)?;
    load_service_providers(&store, &config.services)?;

    let authenticator = SessionAuthenticator::new(
        &store,
        config.session_lifetime(),
        login_page_settings(config),
        config.sso_url(),
    );
    let engine: Arc<dyn SamlEngine> = Arc::new(StubEngine::new(Arc::new(authenticator)));
    Ok(AppState { store, engine })
}

pub fn router(state: AppState, debug_enabled: bool) -> Router {
    let mut app = Router::new()
        .route("/health", get(health))
        .route("/metadata", get(metadata))
        .route("/sso", get(sso_get).post(sso_post));
    if debug_enabled {
        app = app
            .route("/debug/users", get(debug_users))
            .route("/debug/services", get(debug_services))
            .route("/debug/sessions", get(debug_sessions));
    }
    app.with_state(state)
}

/// Load everything and serve until shutdown.
pub async fn run(config: Config) -> anyhow::Result<()> {
    let state = app_state(&config).context("While loading users and service providers")?;
    if config.debug.enabled {
        info!("debug listings enabled under /debug");
    }
    let app = router(state, config.debug.enabled);

    let addr = format!("{}:{}", config.host, config.port);
    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn health() -> &'static str {
    "Healthy"
}

async fn metadata(State(state): State<AppState>) -> Response {
    state.engine.serve_metadata()
}

#[derive(Debug, Default, Deserialize)]
struct SsoParams {
    #[serde(rename = "SAMLRequest", default)]
    saml_request: String,
    #[serde(rename = "RelayState", default)]
    relay_state: String,
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
}

async fn sso_get(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<SsoParams>,
) -> Response {
    serve_sso(&state, Method::GET, &headers, params)
}

async fn sso_post(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(params): Form<SsoParams>,
) -> Response {
    serve_sso(&state, Method::POST, &headers, params)
}

fn serve_sso(state: &AppState, method: Method, headers: &HeaderMap, params: SsoParams) -> Response {
    let ctx = SsoRequestContext {
        method,
        secure: is_secure(headers),
        username: non_empty(params.username),
        password: non_empty(params.password),
        session_cookie: parse_cookie(headers, SESSION_COOKIE),
    };
    state.engine.serve_sso(ctx, &params.saml_request, &params.relay_state)
}

fn non_empty(value: String) -> Option<String> {
    if value.is_empty() { None } else { Some(value) }
}

/// The server itself listens on plain HTTP; a fronting proxy announces
/// TLS termination via X-Forwarded-Proto.
fn is_secure(headers: &HeaderMap) -> bool {
    headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .map(|proto| proto.eq_ignore_ascii_case("https"))
        .unwrap_or(false)
}

fn parse_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    let cookie = headers.get("cookie").or_else(|| headers.get("Cookie"))?;
    let s = cookie.to_str().ok()?;
    for part in s.split(';') {
        let p = part.trim();
        if let Some(eq) = p.find('=') {
            let (k, v) = p.split_at(eq);
            if k == name {
                return Some(v[1..].to_string());
            }
        }
    }
    None
}

async fn debug_users(State(state): State<AppState>) -> Response {
    match state.store.users.list() {
        // Password hashes stay out of the listing.
        Ok(users) => {
            let listed: Vec<_> = users
                .into_iter()
                .map(|user| {
                    json!({
                        "username": user.username,
                        "email": user.email,
                        "given_name": user.given_name,
                        "surname": user.surname,
                        "groups": user.groups,
                    })
                })
                .collect();
            Json(listed).into_response()
        }
        Err(e) => {
            error!("user listing failed: {e}");
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error\n").into_response()
        }
    }
}

async fn debug_services(State(state): State<AppState>) -> Response {
    match state.store.service_providers.list() {
        Ok(services) => Json(services).into_response(),
        Err(e) => {
            error!("service provider listing failed: {e}");
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error\n").into_response()
        }
    }
}

async fn debug_sessions(State(state): State<AppState>) -> Response {
    match state.store.sessions.list() {
        Ok(sessions) => Json(sessions).into_response(),
        Err(e) => {
            error!("session listing failed: {e}");
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error\n").into_response()
        }
    }
}
