//! YAML configuration: listen address, session policy, login page
//! options and the bulk-loaded users and service providers. Host/port
//! env overrides are applied by the binary after loading.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub host: String,
    pub port: u16,
    /// Externally visible base URL used for the login form's submit
    /// target. Falls back to `http://<host>:<port>` when unset.
    pub public_url: Option<String>,
    /// Absolute session lifetime in hours. Expiry is always creation
    /// time plus this value; sessions are never renewed.
    pub session_max_age_hours: i64,
    pub login_page: LoginPageConfig,
    pub debug: DebugConfig,
    pub users: Vec<UserConfig>,
    pub services: Vec<ServiceConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            public_url: None,
            session_max_age_hours: 24 * 14,
            login_page: LoginPageConfig::default(),
            debug: DebugConfig::default(),
            users: Vec::new(),
            services: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoginPageConfig {
    pub title: Option<String>,
    /// Markdown, rendered to HTML once at startup.
    pub description: Option<String>,
    /// List the configured test accounts (plaintext passwords included)
    /// on the login page.
    pub dump_users: bool,
}

/// Diagnostic listings under /debug. Off unless explicitly enabled.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DebugConfig {
    pub enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserConfig {
    pub username: String,
    pub email: String,
    /// Plaintext here only; hashed before it reaches the store.
    pub password: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub groups: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub entity_id: String,
    pub assertion_consumer_service: String,
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Config> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration file: {}", path.display()))?;
        let config: Config = serde_yaml::from_str(&raw)
            .with_context(|| format!("Failed to parse configuration file: {}", path.display()))?;
        Ok(config)
    }

    pub fn session_lifetime(&self) -> chrono::Duration {
        chrono::Duration::hours(self.session_max_age_hours)
    }

    pub fn base_url(&self) -> String {
        match &self.public_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => format!("http://{}:{}", self.host, self.port),
        }
    }

    pub fn sso_url(&self) -> String {
        format!("{}/sso", self.base_url())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn full_file_parses() {
        let yaml = r#"
host: 127.0.0.1
port: 9090
public_url: https://idp.example.com/
session_max_age_hours: 2
login_page:
  title: Acme Test IdP
  description: "A **test** IdP"
  dump_users: true
debug:
  enabled: true
users:
  - username: alice
    email: alice@example.com
    password: hunter2
    first_name: Alice
    last_name: Liddell
    groups:
      - testers
services:
  - entity_id: https://sp.example.com/metadata
    assertion_consumer_service: https://sp.example.com/acs
"#;
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(yaml.as_bytes()).unwrap();
        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.port, 9090);
        assert_eq!(config.session_lifetime(), chrono::Duration::hours(2));
        assert_eq!(config.sso_url(), "https://idp.example.com/sso");
        assert!(config.login_page.dump_users);
        assert!(config.debug.enabled);
        assert_eq!(config.users[0].groups, vec!["testers".to_string()]);
        assert_eq!(config.services[0].entity_id, "https://sp.example.com/metadata");
    }

    #[test]
    fn omitted_fields_take_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"port: 8081\n").unwrap();
        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 8081);
        assert_eq!(config.session_max_age_hours, 336);
        assert!(!config.debug.enabled);
        assert!(config.users.is_empty());
        assert_eq!(config.sso_url(), "http://0.0.0.0:8081/sso");
    }

    #[test]
    fn user_name_parts_and_groups_are_optional() {
        let yaml = "users:\n  - username: bob\n    email: bob@example.com\n    password: pw\n";
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.users[0].first_name, "");
        assert!(config.users[0].groups.is_empty());
    }

    #[test]
    fn unreadable_file_reports_the_path() {
        let err = Config::load("/no/such/config.yml").unwrap_err();
        assert!(err.to_string().contains("/no/such/config.yml"));
    }
}
