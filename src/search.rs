//! Submitting the search and waiting on its outcome.

use std::thread;
use std::time::{Duration, Instant};

use log::{debug, info};

use crate::browser::{first_match, Candidate, Locator, Readiness, Session, POLL_INTERVAL};
use crate::error::ScrapeError;

/// Zero rows is a distinct success, not a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchOutcome {
    Results,
    Empty,
}

fn submit_candidates() -> Vec<Candidate> {
    vec![
        Candidate::new("submit-id", Locator::id("submitButton")),
        Candidate::new("submit-type", Locator::css("button[type='submit']")),
        Candidate::new("search-text", Locator::xpath("//a[contains(., 'Search')]")),
    ]
}

fn results_candidates() -> Vec<Candidate> {
    vec![
        Candidate::new(
            "gridview-table",
            Locator::xpath("//div[contains(@id, 'gridview')]/table"),
        ),
        Candidate::new("extjs-grid", Locator::css(".x-grid-view table")),
        Candidate::new("generic-results", Locator::css("table.results-table")),
    ]
}

fn no_results_marker() -> Locator {
    Locator::xpath(
        "//*[contains(text(), 'No records found') or contains(text(), 'No results')]",
    )
}

#[derive(Debug, Clone)]
pub struct SearchConfig {
    pub submit_timeout: Duration,
    /// Shared budget for the results-or-empty wait.
    pub outcome_budget: Duration,
}

impl Default for SearchConfig {
    fn default() -> Self {
        SearchConfig {
            submit_timeout: Duration::from_secs(10),
            outcome_budget: Duration::from_secs(30),
        }
    }
}

pub struct SearchExecutor {
    config: SearchConfig,
}

impl SearchExecutor {
    pub fn new(config: SearchConfig) -> Self {
        SearchExecutor { config }
    }

    /// Click submit and wait for whichever comes first: a results table
    /// or the explicit no-results marker. Neither within the budget is a
    /// search failure.
    pub fn submit(&self, session: &dyn Session) -> Result<SearchOutcome, ScrapeError> {
        let (button, name) = first_match(
            session,
            &submit_candidates(),
            Readiness::Clickable,
            self.config.submit_timeout,
        )
        .ok_or_else(|| ScrapeError::Search("submit control not found by any locator".into()))?;
        session.click(&button)?;
        debug!("search submitted via '{name}'");

        let deadline = Instant::now() + self.config.outcome_budget;
        let empty_marker = no_results_marker();
        loop {
            for candidate in results_candidates() {
                match session.find(&candidate.locator) {
                    Ok(Some(_)) => {
                        info!("results table appeared ('{}')", candidate.name);
                        // Pull lazily-rendered rows into the viewport.
                        session.scroll_to_bottom(None)?;
                        return Ok(SearchOutcome::Results);
                    }
                    Ok(None) => {}
                    Err(e) => debug!("results probe failed: {e}"),
                }
            }
            match session.find(&empty_marker) {
                Ok(Some(_)) => {
                    info!("search returned no records");
                    return Ok(SearchOutcome::Empty);
                }
                Ok(None) => {}
                Err(e) => debug!("no-results probe failed: {e}"),
            }
            if Instant::now() >= deadline {
                return Err(ScrapeError::Search(
                    "neither results nor a no-results marker appeared in budget".into(),
                ));
            }
            thread::sleep(POLL_INTERVAL);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::fake::{FakeElement, FakeSession};

    fn fast() -> SearchConfig {
        SearchConfig {
            submit_timeout: Duration::ZERO,
            outcome_budget: Duration::ZERO,
        }
    }

    fn with_submit(session: &mut FakeSession) {
        session.place(Locator::id("submitButton"), FakeElement::text("Search"));
    }

    #[test]
    fn test_results_present() {
        let mut session = FakeSession::new();
        with_submit(&mut session);
        session.place(
            Locator::xpath("//div[contains(@id, 'gridview')]/table"),
            FakeElement::text(""),
        );

        let outcome = SearchExecutor::new(fast()).submit(&session).unwrap();
        assert_eq!(outcome, SearchOutcome::Results);
    }

    #[test]
    fn test_no_results_marker_is_empty_outcome() {
        let mut session = FakeSession::new();
        with_submit(&mut session);
        session.place(
            Locator::xpath(
                "//*[contains(text(), 'No records found') or contains(text(), 'No results')]",
            ),
            FakeElement::text("No records found"),
        );

        let outcome = SearchExecutor::new(fast()).submit(&session).unwrap();
        assert_eq!(outcome, SearchOutcome::Empty);
    }

    #[test]
    fn test_budget_exhaustion_is_search_error() {
        let mut session = FakeSession::new();
        with_submit(&mut session);

        assert!(matches!(
            SearchExecutor::new(fast()).submit(&session),
            Err(ScrapeError::Search(_))
        ));
    }

    #[test]
    fn test_missing_submit_control_is_search_error() {
        let session = FakeSession::new();
        assert!(matches!(
            SearchExecutor::new(fast()).submit(&session),
            Err(ScrapeError::Search(_))
        ));
    }

    #[test]
    fn test_submit_falls_back_past_missing_id() {
        let mut session = FakeSession::new();
        session.place(Locator::css("button[type='submit']"), FakeElement::text("Go"));
        session.place(
            Locator::css(".x-grid-view table"),
            FakeElement::text(""),
        );

        let outcome = SearchExecutor::new(fast()).submit(&session).unwrap();
        assert_eq!(outcome, SearchOutcome::Results);
    }
}
