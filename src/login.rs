//! Login page rendering: a self-contained HTML form that carries the
//! pending protocol request and relay state through the credential
//! round trip.

use askama::Template;
use comrak::{markdown_to_html, Options};

/// Page chrome and debug options, resolved once at startup.
#[derive(Debug, Clone, Default)]
pub struct LoginPageSettings {
    pub title: Option<String>,
    /// Pre-rendered HTML from the configured markdown description.
    pub description_html: Option<String>,
    /// Test accounts listed on the page when account dumping is enabled.
    pub users: Vec<DisplayUser>,
}

/// A configured test account shown on the login page.
#[derive(Debug, Clone)]
pub struct DisplayUser {
    pub username: String,
    pub password: String,
    pub email: String,
}

#[derive(Template)]
#[template(path = "login.html")]
pub struct LoginPage {
    pub title: String,
    pub description: Option<String>,
    pub users: Vec<DisplayUser>,
    pub notice: Option<String>,
    pub username: String,
    pub url: String,
    pub saml_request: String,
    pub relay_state: String,
}

pub fn render_markdown(markdown: &str) -> String {
    markdown_to_html(markdown, &Options::default())
}
