use anyhow::Context;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use test_saml_idp::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Init logging
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap();
    fmt().with_env_filter(filter).init();

    let rust_log = std::env::var("RUST_LOG").unwrap_or_else(|_| "<unset>".to_string());
    let config_path = std::env::var("IDP_CONFIG").unwrap_or_else(|_| "config.yml".to_string());

    let mut config = if std::path::Path::new(&config_path).exists() {
        info!(target: "idp", "Loading configuration from {}", config_path);
        Config::load(&config_path)?
    } else {
        info!(target: "idp", "No configuration file at {}, using defaults", config_path);
        Config::default()
    };

    if let Ok(host) = std::env::var("IDP_HOST") {
        config.host = host;
    }
    if let Ok(port) = std::env::var("IDP_PORT") {
        config.port = port
            .parse()
            .with_context(|| format!("Invalid IDP_PORT: {}", port))?;
    }

    info!(
        target: "idp",
        "Test SAML IdP starting: RUST_LOG='{}', listen={}:{}, users={}, service_providers={}, session_max_age={}h",
        rust_log, config.host, config.port, config.users.len(), config.services.len(),
        config.session_max_age_hours
    );

    test_saml_idp::server::run(config).await
}
