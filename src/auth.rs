//! Portal login.

use std::time::Duration;

use log::info;

use crate::browser::{first_match, wait_for, Candidate, Locator, Readiness, Session};
use crate::error::ScrapeError;

pub const EMAIL_ENV: &str = "ECLERKS_EMAIL";
pub const PASSWORD_ENV: &str = "ECLERKS_PASSWORD";

/// Login identity. Validated eagerly: a missing or empty secret is a
/// configuration error raised before any session is acquired.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub email: String,
    password: String,
}

impl Credentials {
    pub fn new(email: &str, password: &str) -> Result<Self, ScrapeError> {
        if email.trim().is_empty() {
            return Err(ScrapeError::Configuration(format!(
                "{EMAIL_ENV} is not set"
            )));
        }
        if password.trim().is_empty() {
            return Err(ScrapeError::Configuration(format!(
                "{PASSWORD_ENV} is not set"
            )));
        }
        Ok(Credentials {
            email: email.trim().to_string(),
            password: password.trim().to_string(),
        })
    }

    pub fn from_env() -> Result<Self, ScrapeError> {
        let email = std::env::var(EMAIL_ENV).unwrap_or_default();
        let password = std::env::var(PASSWORD_ENV).unwrap_or_default();
        Credentials::new(&email, &password)
    }
}

#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Wait for the email control to become visible.
    pub form_timeout: Duration,
    /// Wait for the post-login greeting marker.
    pub greeting_timeout: Duration,
    pub field_timeout: Duration,
}

impl Default for AuthConfig {
    fn default() -> Self {
        AuthConfig {
            form_timeout: Duration::from_secs(20),
            greeting_timeout: Duration::from_secs(20),
            field_timeout: Duration::from_secs(5),
        }
    }
}

pub struct Authenticator {
    credentials: Credentials,
    config: AuthConfig,
}

impl Authenticator {
    pub fn new(credentials: Credentials, config: AuthConfig) -> Self {
        Authenticator {
            credentials,
            config,
        }
    }

    /// Navigate to `base_url` and log in. Any missing control or timeout
    /// is an authentication failure; no internal retry.
    pub fn login(&self, session: &dyn Session, base_url: &str) -> Result<(), ScrapeError> {
        session.goto(base_url)?;

        let email = wait_for(
            session,
            &Locator::xpath("//*[@placeholder=\"email address\"]"),
            Readiness::Visible,
            self.config.form_timeout,
        )
        .ok_or_else(|| ScrapeError::Authentication("email field never appeared".into()))?;
        session.type_text(&email, &self.credentials.email)?;

        let password = wait_for(
            session,
            &Locator::xpath("//*[@placeholder=\"password\"]"),
            Readiness::Visible,
            self.config.field_timeout,
        )
        .ok_or_else(|| ScrapeError::Authentication("password field not found".into()))?;
        session.type_text(&password, &self.credentials.password)?;

        let login_candidates = [
            Candidate::new("login-title", Locator::xpath("//*[@title=\"Login\"]")),
            Candidate::new(
                "login-button-text",
                Locator::xpath("//button[contains(., 'Login')]"),
            ),
        ];
        let (button, _) = first_match(
            session,
            &login_candidates,
            Readiness::Clickable,
            self.config.field_timeout,
        )
        .ok_or_else(|| ScrapeError::Authentication("login control not found".into()))?;
        session.click(&button)?;

        // The greeting banner is the only reliable post-login marker.
        wait_for(
            session,
            &Locator::xpath("//*[contains(text(), 'Hello')]"),
            Readiness::Present,
            self.config.greeting_timeout,
        )
        .ok_or_else(|| ScrapeError::Authentication("greeting never appeared".into()))?;

        info!("login successful for {}", self.credentials.email);
        Ok(())
    }
}
