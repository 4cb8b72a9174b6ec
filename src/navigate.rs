//! Reaching the criminal search form from the portal home page.

use std::time::Duration;

use log::{info, warn};

use crate::browser::{first_match, settle, wait_for, Candidate, Locator, Readiness, Session};
use crate::error::ScrapeError;

/// Consent panel handling is tri-state: an absent panel is success, a
/// panel that resists every accept locator is not.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsentOutcome {
    Accepted,
    Absent,
    Failed,
}

#[derive(Debug, Clone)]
pub struct NavigatorConfig {
    pub entry_timeout: Duration,
    /// Short probe; a miss means the panel is not present this session.
    pub consent_probe_timeout: Duration,
    pub consent_accept_timeout: Duration,
    pub ready_timeout: Duration,
}

impl Default for NavigatorConfig {
    fn default() -> Self {
        NavigatorConfig {
            entry_timeout: Duration::from_secs(10),
            consent_probe_timeout: Duration::from_secs(5),
            consent_accept_timeout: Duration::from_secs(10),
            ready_timeout: Duration::from_secs(15),
        }
    }
}

pub struct SearchNavigator {
    config: NavigatorConfig,
}

fn entry_candidates() -> Vec<Candidate> {
    vec![
        Candidate::new("step1-id", Locator::id("criminal-search-step1")),
        Candidate::new(
            "criminal-link",
            Locator::css("a[href*='criminal' i]"),
        ),
        Candidate::new(
            "criminal-button",
            Locator::xpath("//button[contains(translate(., 'CRIMINAL', 'criminal'), 'criminal')]"),
        ),
    ]
}

fn accept_candidates() -> Vec<Candidate> {
    vec![
        Candidate::new("fetch-id", Locator::id("fetch-criminal-search")),
        Candidate::new("accept-text", Locator::xpath("//button[contains(., 'Accept')]")),
        Candidate::new("agree-text", Locator::xpath("//button[contains(., 'Agree')]")),
    ]
}

impl SearchNavigator {
    pub fn new(config: NavigatorConfig) -> Self {
        SearchNavigator { config }
    }

    /// Click through to the search form, handling the optional EULA panel
    /// and any new window the portal opens.
    pub fn navigate(&self, session: &dyn Session, base_url: &str) -> Result<(), ScrapeError> {
        session.goto(base_url)?;

        let (entry, name) = first_match(
            session,
            &entry_candidates(),
            Readiness::Clickable,
            self.config.entry_timeout,
        )
        .ok_or_else(|| {
            ScrapeError::Navigation("search entry control not found by any locator".into())
        })?;
        session.click(&entry)?;
        info!("entered criminal search via '{name}'");

        match self.handle_consent(session)? {
            ConsentOutcome::Accepted => info!("consent panel accepted"),
            ConsentOutcome::Absent => info!("no consent panel this session"),
            ConsentOutcome::Failed => {
                return Err(ScrapeError::Navigation(
                    "consent panel present but no accept control resolved".into(),
                ));
            }
        }

        self.switch_to_newest_window(session)?;

        if !settle(session, self.config.ready_timeout) {
            return Err(ScrapeError::Navigation(
                "search page never reached document-ready".into(),
            ));
        }
        Ok(())
    }

    fn handle_consent(&self, session: &dyn Session) -> Result<ConsentOutcome, ScrapeError> {
        let panel = match wait_for(
            session,
            &Locator::css(".statewide-portal-eula-body"),
            Readiness::Visible,
            self.config.consent_probe_timeout,
        ) {
            Some(panel) => panel,
            None => return Ok(ConsentOutcome::Absent),
        };

        // The accept control only arms once the terms are scrolled out.
        session.scroll_to_bottom(Some(&panel))?;

        match first_match(
            session,
            &accept_candidates(),
            Readiness::Clickable,
            self.config.consent_accept_timeout,
        ) {
            Some((accept, _)) => {
                session.click(&accept)?;
                Ok(ConsentOutcome::Accepted)
            }
            None => Ok(ConsentOutcome::Failed),
        }
    }

    /// The portal opens the search form in a new tab; follow the most
    /// recently opened handle.
    fn switch_to_newest_window(&self, session: &dyn Session) -> Result<(), ScrapeError> {
        let handles = session.window_handles()?;
        if handles.len() > 1 {
            let newest = handles.last().cloned().unwrap_or_default();
            info!("switching to newest window handle ({} open)", handles.len());
            session.switch_window(&newest)?;
        } else if handles.is_empty() {
            warn!("no window handles reported; staying on current context");
        }
        Ok(())
    }
}
