//! Browser automation capability and the locator-fallback machinery.
//!
//! Every component talks to the portal through the [`Session`] trait, so
//! the fallback policy is testable against [`fake::FakeSession`] without a
//! real browser. The portal's DOM is unstable: nothing here assumes a
//! single locator is correct, only that an ordered list of hypotheses is.

use std::fmt;
use std::thread;
use std::time::{Duration, Instant};

use log::debug;

use crate::error::SessionError;

/// Poll spacing for every bounded wait.
pub const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// How an element is addressed in the DOM.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Locator {
    Css(String),
    XPath(String),
}

impl Locator {
    pub fn css(selector: impl Into<String>) -> Self {
        Locator::Css(selector.into())
    }

    pub fn xpath(expr: impl Into<String>) -> Self {
        Locator::XPath(expr.into())
    }

    pub fn id(id: &str) -> Self {
        Locator::Css(format!("#{id}"))
    }

    /// W3C location strategy pair for the wire protocol.
    pub fn wire(&self) -> (&'static str, &str) {
        match self {
            Locator::Css(s) => ("css selector", s),
            Locator::XPath(s) => ("xpath", s),
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::Css(s) => write!(f, "css({s})"),
            Locator::XPath(s) => write!(f, "xpath({s})"),
        }
    }
}

/// Opaque element handle, only meaningful to the session that issued it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element(pub String);

/// What "found" means for a probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    Present,
    Visible,
    Clickable,
}

/// One hypothesis in an ordered fallback list.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub name: &'static str,
    pub locator: Locator,
}

impl Candidate {
    pub fn new(name: &'static str, locator: Locator) -> Self {
        Candidate { name, locator }
    }
}

/// The browser capability consumed by every component. One session drives
/// one browser; components never construct their own.
pub trait Session {
    fn goto(&self, url: &str) -> Result<(), SessionError>;
    fn find(&self, locator: &Locator) -> Result<Option<Element>, SessionError>;
    fn find_all(&self, locator: &Locator) -> Result<Vec<Element>, SessionError>;
    fn find_within(
        &self,
        parent: &Element,
        locator: &Locator,
    ) -> Result<Vec<Element>, SessionError>;
    fn click(&self, element: &Element) -> Result<(), SessionError>;
    fn type_text(&self, element: &Element, text: &str) -> Result<(), SessionError>;
    fn clear(&self, element: &Element) -> Result<(), SessionError>;
    fn text(&self, element: &Element) -> Result<String, SessionError>;
    fn attribute(&self, element: &Element, name: &str)
        -> Result<Option<String>, SessionError>;
    /// Current `value` property (not the static attribute).
    fn value(&self, element: &Element) -> Result<Option<String>, SessionError>;
    /// Set `value` directly and dispatch synthetic input/change events.
    fn inject_value(&self, element: &Element, value: &str) -> Result<(), SessionError>;
    fn is_displayed(&self, element: &Element) -> Result<bool, SessionError>;
    fn is_enabled(&self, element: &Element) -> Result<bool, SessionError>;
    /// Scroll a container (or the window when `None`) to its bottom.
    fn scroll_to_bottom(&self, element: Option<&Element>) -> Result<(), SessionError>;
    fn window_handles(&self) -> Result<Vec<String>, SessionError>;
    fn switch_window(&self, handle: &str) -> Result<(), SessionError>;
    fn document_ready(&self) -> Result<bool, SessionError>;
    /// Idempotent. Releasing twice or releasing a dead session is a no-op.
    fn quit(&mut self) -> Result<(), SessionError>;
}

fn meets(session: &dyn Session, element: &Element, readiness: Readiness) -> bool {
    let check = || -> Result<bool, SessionError> {
        Ok(match readiness {
            Readiness::Present => true,
            Readiness::Visible => session.is_displayed(element)?,
            Readiness::Clickable => {
                session.is_displayed(element)? && session.is_enabled(element)?
            }
        })
    };
    check().unwrap_or(false)
}

/// Poll for `locator` until it satisfies `readiness` or the deadline
/// passes. Probe-time session errors are logged and treated as misses;
/// the caller escalates only once its whole fallback list is exhausted.
pub fn wait_for(
    session: &dyn Session,
    locator: &Locator,
    readiness: Readiness,
    timeout: Duration,
) -> Option<Element> {
    let deadline = Instant::now() + timeout;
    loop {
        match session.find(locator) {
            Ok(Some(el)) if meets(session, &el, readiness) => return Some(el),
            Ok(_) => {}
            Err(e) => debug!("probe {locator} failed: {e}"),
        }
        if Instant::now() >= deadline {
            return None;
        }
        thread::sleep(POLL_INTERVAL);
    }
}

/// Try an ordered candidate list; each candidate gets its own timeout
/// slice and the first match wins. `None` means the list is exhausted.
pub fn first_match(
    session: &dyn Session,
    candidates: &[Candidate],
    readiness: Readiness,
    per_candidate: Duration,
) -> Option<(Element, &'static str)> {
    for candidate in candidates {
        if let Some(el) = wait_for(session, &candidate.locator, readiness, per_candidate) {
            debug!("locator '{}' matched via {}", candidate.name, candidate.locator);
            return Some((el, candidate.name));
        }
        debug!("locator '{}' missed ({})", candidate.name, candidate.locator);
    }
    None
}

/// Poll for a non-empty collection. Empty on deadline, never an error.
pub fn wait_for_all(
    session: &dyn Session,
    locator: &Locator,
    timeout: Duration,
) -> Vec<Element> {
    let deadline = Instant::now() + timeout;
    loop {
        match session.find_all(locator) {
            Ok(els) if !els.is_empty() => return els,
            Ok(_) => {}
            Err(e) => debug!("collection probe {locator} failed: {e}"),
        }
        if Instant::now() >= deadline {
            return Vec::new();
        }
        thread::sleep(POLL_INTERVAL);
    }
}

/// Wait for the document-ready signal. False on deadline.
pub fn settle(session: &dyn Session, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        match session.document_ready() {
            Ok(true) => return true,
            Ok(false) => {}
            Err(e) => debug!("readiness probe failed: {e}"),
        }
        if Instant::now() >= deadline {
            return false;
        }
        thread::sleep(POLL_INTERVAL);
    }
}


#[cfg(test)]
mod tests {
    use super::fake::{FakeElement, FakeSession};
    use super::*;

    #[test]
    fn test_first_match_takes_first_resolving_candidate() {
        let mut s = FakeSession::new();
        s.place(Locator::id("second-choice"), FakeElement::text("hit"));

        let candidates = [
            Candidate::new("first", Locator::id("first-choice")),
            Candidate::new("second", Locator::id("second-choice")),
        ];
        let (_, name) =
            first_match(&s, &candidates, Readiness::Clickable, Duration::ZERO).unwrap();
        assert_eq!(name, "second");
    }

    #[test]
    fn test_first_match_exhaustion_returns_none() {
        let s = FakeSession::new();
        let candidates = [Candidate::new("only", Locator::id("missing"))];
        assert!(first_match(&s, &candidates, Readiness::Present, Duration::ZERO).is_none());
    }

    #[test]
    fn test_clickable_requires_displayed_and_enabled() {
        let mut s = FakeSession::new();
        s.place(Locator::id("hidden"), FakeElement::text("x").hidden());
        s.place(Locator::id("dead"), FakeElement::text("x").disabled());
        s.place(Locator::id("live"), FakeElement::text("x"));

        assert!(wait_for(&s, &Locator::id("hidden"), Readiness::Clickable, Duration::ZERO).is_none());
        assert!(wait_for(&s, &Locator::id("dead"), Readiness::Clickable, Duration::ZERO).is_none());
        assert!(wait_for(&s, &Locator::id("live"), Readiness::Clickable, Duration::ZERO).is_some());
        // A disabled element is still present.
        assert!(wait_for(&s, &Locator::id("dead"), Readiness::Present, Duration::ZERO).is_some());
    }

    #[test]
    fn test_wait_for_all_empty_on_deadline() {
        let s = FakeSession::new();
        assert!(wait_for_all(&s, &Locator::css("tr"), Duration::ZERO).is_empty());
    }
}
