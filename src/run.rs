//! Phase sequencing for one scrape run.
//!
//! Owns failure aggregation and guarantees the browser session is
//! released on every exit path; the session's own Drop covers panics.

use std::path::PathBuf;

use chrono::Local;
use log::{error, info, warn};

use crate::auth::{AuthConfig, Authenticator, Credentials};
use crate::browser::Session;
use crate::daterange::{DateRangeConfig, DateRangeConfigurator};
use crate::error::ScrapeError;
use crate::export;
use crate::extract::{ExtractorConfig, ResultExtractor};
use crate::navigate::{NavigatorConfig, SearchNavigator};
use crate::search::{SearchConfig, SearchExecutor, SearchOutcome};
use crate::store::RecordStore;
use crate::types::{Phase, PhaseOutcome, RunReport, SearchCriteria};
use crate::webdriver::{SessionConfig, SessionManager};

pub const BASE_URL: &str = "https://eclerksla.com/Home";
pub const DEFAULT_EXPORT_FILE: &str = "scraped_records.csv";

#[derive(Debug, Clone)]
pub struct RunnerConfig {
    pub base_url: String,
    pub export_path: PathBuf,
    pub auth: AuthConfig,
    pub navigator: NavigatorConfig,
    pub daterange: DateRangeConfig,
    pub search: SearchConfig,
    pub extractor: ExtractorConfig,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        RunnerConfig {
            base_url: BASE_URL.to_string(),
            export_path: PathBuf::from(DEFAULT_EXPORT_FILE),
            auth: AuthConfig::default(),
            navigator: NavigatorConfig::default(),
            daterange: DateRangeConfig::default(),
            search: SearchConfig::default(),
            extractor: ExtractorConfig::default(),
        }
    }
}

/// Acquire a session, run all phases, release. The only entry point the
/// CLI uses.
pub fn run(
    credentials: Credentials,
    criteria: SearchCriteria,
    store: &RecordStore,
    session_config: SessionConfig,
    runner_config: &RunnerConfig,
) -> RunReport {
    let manager = SessionManager::new(session_config);
    let mut session = match manager.acquire() {
        Ok(session) => session,
        Err(e) => {
            error!("{e}");
            let mut report = RunReport::default();
            report.record(Phase::Session, PhaseOutcome::Failed(e.to_string()));
            report.error = Some(e.to_string());
            return report;
        }
    };
    run_with_session(&mut session, credentials, criteria, store, runner_config)
}

/// Run all phases against an already-acquired session. Quit is invoked
/// exactly once before returning, whatever the phases did.
pub fn run_with_session<S: Session>(
    session: &mut S,
    credentials: Credentials,
    criteria: SearchCriteria,
    store: &RecordStore,
    config: &RunnerConfig,
) -> RunReport {
    let mut report = RunReport::default();
    report.record(Phase::Session, PhaseOutcome::Completed);

    let result = execute(&*session, credentials, criteria, store, config, &mut report);
    if let Err(e) = session.quit() {
        warn!("session release reported: {e}");
    }

    match result {
        Ok(()) => {
            report.success = true;
            info!(
                "run complete: {} records over {} page(s) ({} created, {} updated)",
                report.records_scraped,
                report.pages_processed,
                report.records_created,
                report.records_updated
            );
        }
        Err(e) => {
            error!("run failed: {e}");
            report.error = Some(e.to_string());
        }
    }
    report
}

fn execute(
    session: &dyn Session,
    credentials: Credentials,
    criteria: SearchCriteria,
    store: &RecordStore,
    config: &RunnerConfig,
    report: &mut RunReport,
) -> Result<(), ScrapeError> {
    let authenticator = Authenticator::new(credentials, config.auth.clone());
    phase(report, Phase::Login, || {
        authenticator.login(session, &config.base_url)
    })?;

    let navigator = SearchNavigator::new(config.navigator.clone());
    phase(report, Phase::Navigate, || {
        navigator.navigate(session, &config.base_url)
    })?;

    // Best effort; a run without a date filter is degraded, not failed.
    let configurator = DateRangeConfigurator::new(config.daterange.clone());
    if configurator.set_range(session, criteria.from_date, criteria.to_date) {
        report.record(Phase::DateRange, PhaseOutcome::Completed);
    } else {
        report.degraded_date_filter = true;
        report.record(Phase::DateRange, PhaseOutcome::Degraded);
    }

    let executor = SearchExecutor::new(config.search.clone());
    let outcome = match executor.submit(session) {
        Ok(outcome) => outcome,
        Err(e) => {
            report.record(Phase::Search, PhaseOutcome::Failed(e.to_string()));
            return Err(e);
        }
    };
    if outcome == SearchOutcome::Empty {
        report.record(Phase::Search, PhaseOutcome::Empty);
        report.record(Phase::Extract, PhaseOutcome::Skipped);
        report.record(Phase::Export, PhaseOutcome::Skipped);
        return Ok(());
    }
    report.record(Phase::Search, PhaseOutcome::Completed);

    let extractor = ResultExtractor::new(config.extractor.clone());
    let summary = match extractor.extract(
        session,
        store,
        criteria.max_pages,
        Local::now().date_naive(),
    ) {
        Ok(summary) => summary,
        Err(e) => {
            report.record(Phase::Extract, PhaseOutcome::Failed(e.to_string()));
            return Err(e);
        }
    };
    report.pages_processed = summary.pages_processed;
    report.records_scraped = summary.records.len();
    report.records_created = summary.created;
    report.records_updated = summary.updated;
    report.record(Phase::Extract, PhaseOutcome::Completed);

    if summary.records.is_empty() {
        report.record(Phase::Export, PhaseOutcome::Skipped);
    } else {
        phase(report, Phase::Export, || {
            export::write(&config.export_path, &summary.records)
        })?;
    }
    Ok(())
}

fn phase<F>(report: &mut RunReport, phase: Phase, body: F) -> Result<(), ScrapeError>
where
    F: FnOnce() -> Result<(), ScrapeError>,
{
    match body() {
        Ok(()) => {
            report.record(phase, PhaseOutcome::Completed);
            Ok(())
        }
        Err(e) => {
            report.record(phase, PhaseOutcome::Failed(e.to_string()));
            Err(e)
        }
    }
}
