//! Case record data model and run bookkeeping types.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Closed single-character code sets from the portal's defendant columns.
pub const SEX_CODES: &[char] = &['M', 'F', 'U'];
pub const RACE_CODES: &[char] = &['W', 'B', 'H', 'A', 'U'];

pub const UNKNOWN_CODE: char = 'U';

/// One scraped case, keyed by `case_number`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseRecord {
    pub case_number: String,
    pub defendant_name: String,
    pub birth_date: Option<NaiveDate>,
    pub sex: char,
    pub race: char,
    /// Never null once normalized; defaults to the normalization date.
    pub date_filed: NaiveDate,
    pub charges: String,
    pub arrest_citation_date: Option<NaiveDate>,
    pub parish: String,
    pub alert_available: bool,
}

/// Inclusive date range plus the pagination cap for one run.
#[derive(Debug, Clone, Copy)]
pub struct SearchCriteria {
    pub from_date: NaiveDate,
    pub to_date: NaiveDate,
    pub max_pages: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Session,
    Login,
    Navigate,
    DateRange,
    Search,
    Extract,
    Export,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Session => "session",
            Phase::Login => "login",
            Phase::Navigate => "navigate",
            Phase::DateRange => "date-range",
            Phase::Search => "search",
            Phase::Extract => "extract",
            Phase::Export => "export",
        }
    }
}

/// Outcome of one phase, recorded in order on the run report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhaseOutcome {
    Completed,
    /// Phase exhausted its fallbacks but the run continues (date range).
    Degraded,
    /// Search answered with the explicit zero-results marker.
    Empty,
    /// Nothing to do (export with zero records).
    Skipped,
    Failed(String),
}

impl PhaseOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            PhaseOutcome::Completed => "completed",
            PhaseOutcome::Degraded => "degraded",
            PhaseOutcome::Empty => "empty",
            PhaseOutcome::Skipped => "skipped",
            PhaseOutcome::Failed(_) => "failed",
        }
    }
}

/// Aggregate result of one run, owned by the controller.
#[derive(Debug, Default)]
pub struct RunReport {
    pub success: bool,
    pub pages_processed: u32,
    pub records_scraped: usize,
    pub records_created: usize,
    pub records_updated: usize,
    /// True when the run executed without an applied date filter.
    pub degraded_date_filter: bool,
    pub phases: Vec<(Phase, PhaseOutcome)>,
    pub error: Option<String>,
}

impl RunReport {
    pub fn record(&mut self, phase: Phase, outcome: PhaseOutcome) {
        self.phases.push((phase, outcome));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case_record_json_round_trip() {
        let rec = CaseRecord {
            case_number: "2023-12345".into(),
            defendant_name: "Doe, John".into(),
            birth_date: NaiveDate::from_ymd_opt(1990, 1, 15),
            sex: 'M',
            race: 'W',
            date_filed: NaiveDate::from_ymd_opt(2023, 1, 20).unwrap(),
            charges: "Theft".into(),
            arrest_citation_date: None,
            parish: "Orleans".into(),
            alert_available: true,
        };
        let json = serde_json::to_string(&rec).unwrap();
        assert!(json.contains("\"date_filed\":\"2023-01-20\""));
        assert!(json.contains("\"birth_date\":\"1990-01-15\""));
        let back: CaseRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, rec);
    }
}
