//! Populating the search date range.
//!
//! The portal's date inputs are ExtJS-generated and their ids drift
//! between deployments, so identification is a list of independent
//! strategy groups. A group is only accepted when both the start and end
//! slots resolve; a partial hit discards the whole group. Failure of
//! every group is degraded mode, never a run failure.

use std::time::Duration;

use chrono::NaiveDate;
use log::{info, warn};

use crate::browser::{first_match, Candidate, Element, Locator, Readiness, Session};

/// Portal-native date entry format.
const PORTAL_DATE_FMT: &str = "%m/%d/%Y";

struct StrategyGroup {
    name: &'static str,
    start: Vec<Candidate>,
    end: Vec<Candidate>,
}

fn strategy_groups() -> Vec<StrategyGroup> {
    vec![
        StrategyGroup {
            name: "extjs-stable-ids",
            start: vec![Candidate::new(
                "start-id",
                Locator::id("datefield-1029-inputEl"),
            )],
            end: vec![Candidate::new(
                "end-id",
                Locator::id("datefield-1030-inputEl"),
            )],
        },
        StrategyGroup {
            name: "datefield-positional",
            start: vec![Candidate::new(
                "first-datefield",
                Locator::xpath("(//input[contains(@id, 'datefield')])[1]"),
            )],
            end: vec![Candidate::new(
                "second-datefield",
                Locator::xpath("(//input[contains(@id, 'datefield')])[2]"),
            )],
        },
        StrategyGroup {
            name: "generic-attributes",
            start: vec![
                Candidate::new("name-from", Locator::css("input[name*='from' i]")),
                Candidate::new(
                    "placeholder-from",
                    Locator::css("input[placeholder*='from' i]"),
                ),
                Candidate::new("aria-start", Locator::css("input[aria-label*='start' i]")),
            ],
            end: vec![
                Candidate::new("name-to", Locator::css("input[name*='to' i]")),
                Candidate::new(
                    "placeholder-to",
                    Locator::css("input[placeholder*='to' i]"),
                ),
                Candidate::new("aria-end", Locator::css("input[aria-label*='end' i]")),
            ],
        },
    ]
}

#[derive(Debug, Clone)]
pub struct DateRangeConfig {
    pub field_timeout: Duration,
}

impl Default for DateRangeConfig {
    fn default() -> Self {
        DateRangeConfig {
            field_timeout: Duration::from_secs(5),
        }
    }
}

pub struct DateRangeConfigurator {
    config: DateRangeConfig,
}

impl DateRangeConfigurator {
    pub fn new(config: DateRangeConfig) -> Self {
        DateRangeConfigurator { config }
    }

    /// Best effort: true when both fields were set and read back
    /// non-empty, false when the run must proceed without a date filter.
    pub fn set_range(
        &self,
        session: &dyn Session,
        from: NaiveDate,
        to: NaiveDate,
    ) -> bool {
        let (start, end, group) = match self.resolve(session) {
            Some(resolved) => resolved,
            None => {
                warn!("no date field strategy group resolved; proceeding without date filter");
                return false;
            }
        };
        info!("date fields resolved via strategy group '{group}'");

        let from_text = from.format(PORTAL_DATE_FMT).to_string();
        let to_text = to.format(PORTAL_DATE_FMT).to_string();

        if !set_field(session, &start, &from_text) || !set_field(session, &end, &to_text) {
            return false;
        }

        // The portal may reformat what we typed; only emptiness counts
        // as failure.
        let start_ok = matches!(session.value(&start), Ok(Some(v)) if !v.trim().is_empty());
        let end_ok = matches!(session.value(&end), Ok(Some(v)) if !v.trim().is_empty());
        if !(start_ok && end_ok) {
            warn!("date fields did not retain values after set");
            return false;
        }
        info!("date range set: {from_text} - {to_text}");
        true
    }

    fn resolve(
        &self,
        session: &dyn Session,
    ) -> Option<(Element, Element, &'static str)> {
        for group in strategy_groups() {
            let start = first_match(
                session,
                &group.start,
                Readiness::Visible,
                self.config.field_timeout,
            );
            let start = match start {
                Some((el, _)) => el,
                None => {
                    warn!("strategy group '{}': start slot unresolved, skipping", group.name);
                    continue;
                }
            };
            // Both slots or nothing: a half-resolved group is worthless.
            match first_match(
                session,
                &group.end,
                Readiness::Visible,
                self.config.field_timeout,
            ) {
                Some((end, _)) => return Some((start, end, group.name)),
                None => {
                    warn!("strategy group '{}': end slot unresolved, skipping", group.name);
                }
            }
        }
        None
    }
}

/// Clear, then set via direct value injection with synthetic events;
/// fall back to simulated keystrokes when the injection channel fails.
fn set_field(session: &dyn Session, field: &Element, text: &str) -> bool {
    if let Err(e) = session.clear(field) {
        warn!("clearing date field failed: {e}");
    }
    match session.inject_value(field, text) {
        Ok(()) => true,
        Err(e) => {
            warn!("value injection failed ({e}); falling back to keystrokes");
            match session.type_text(field, text) {
                Ok(()) => true,
                Err(e) => {
                    warn!("keystroke entry failed: {e}");
                    false
                }
            }
        }
    }
}
