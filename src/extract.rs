//! Paginated row extraction from the results grid.
//!
//! Containment rules: anything wrong with one cell or one row is logged
//! and skipped, never escalated. Only failure to resolve the row
//! collection itself fails the run, and rows upserted before that point
//! stay committed.

use std::thread;
use std::time::Duration;

use chrono::NaiveDate;
use log::{debug, info, warn};

use crate::browser::{
    first_match, settle, wait_for_all, Candidate, Element, Locator, Readiness, Session,
};
use crate::error::ScrapeError;
use crate::normalize::{self, RawRow};
use crate::store::RecordStore;
use crate::types::CaseRecord;

/// Grid rows carry up to this many positional cells.
const MAX_CELLS: usize = 10;
/// Rows with fewer cells are header or filler rows.
const MIN_CELLS: usize = 5;
/// Natural-key minimum; shorter case numbers cannot identify a record.
const MIN_CASE_NUMBER_LEN: usize = 5;

fn row_candidates() -> Vec<Candidate> {
    vec![
        Candidate::new(
            "gridview-rows",
            Locator::xpath("//div[contains(@id, 'gridview')]/table/tbody/tr"),
        ),
        Candidate::new("extjs-rows", Locator::css(".x-grid-view table tbody tr")),
        Candidate::new("generic-rows", Locator::css("table.results-table tbody tr")),
    ]
}

fn next_candidates() -> Vec<Candidate> {
    vec![
        Candidate::new("next-link", Locator::xpath("//a[contains(., 'Next')]")),
        Candidate::new("next-button", Locator::xpath("//button[contains(., 'Next')]")),
    ]
}

#[derive(Debug, Clone)]
pub struct ExtractorConfig {
    pub rows_timeout: Duration,
    pub next_timeout: Duration,
    /// Fixed pause after clicking next, before the readiness poll.
    pub settle_delay: Duration,
    pub settle_timeout: Duration,
    /// Marker element whose presence in the last cell flags an alert.
    /// Site-specific, so an explicit contract rather than a literal.
    pub alert_marker: String,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        ExtractorConfig {
            rows_timeout: Duration::from_secs(15),
            next_timeout: Duration::from_secs(5),
            settle_delay: Duration::from_secs(2),
            settle_timeout: Duration::from_secs(10),
            alert_marker: ".action-alert".to_string(),
        }
    }
}

/// Accumulated output of the extraction phase.
#[derive(Debug, Default)]
pub struct ExtractSummary {
    pub records: Vec<CaseRecord>,
    pub pages_processed: u32,
    pub created: usize,
    pub updated: usize,
    pub skipped_rows: usize,
}

pub struct ResultExtractor {
    config: ExtractorConfig,
}

impl ResultExtractor {
    pub fn new(config: ExtractorConfig) -> Self {
        ResultExtractor { config }
    }

    /// Walk pages `1..=max_pages`, upserting each surviving row. Ends
    /// early, and normally, when the next control is absent or disabled.
    pub fn extract(
        &self,
        session: &dyn Session,
        store: &RecordStore,
        max_pages: u32,
        today: NaiveDate,
    ) -> Result<ExtractSummary, ScrapeError> {
        let mut summary = ExtractSummary::default();
        let mut page = 1u32;

        loop {
            let rows = self.resolve_rows(session)?;
            info!("page {page}: {} rows", rows.len());

            for row in &rows {
                match self.extract_row(session, row) {
                    Ok(Some(raw)) => {
                        let record = normalize::normalize(&raw, today);
                        match store.upsert(&record) {
                            Ok(true) => summary.created += 1,
                            Ok(false) => summary.updated += 1,
                            Err(e) => {
                                warn!("upsert failed for {}: {e}", record.case_number);
                                summary.skipped_rows += 1;
                                continue;
                            }
                        }
                        debug!("saved record {}", record.case_number);
                        summary.records.push(record);
                    }
                    Ok(None) => summary.skipped_rows += 1,
                    Err(e) => {
                        warn!("row extraction error on page {page}: {e}");
                        summary.skipped_rows += 1;
                    }
                }
            }
            summary.pages_processed = page;

            if page >= max_pages {
                info!("page cap ({max_pages}) reached");
                break;
            }
            match self.next_control(session) {
                Some(next) => {
                    session.click(&next)?;
                    page += 1;
                    thread::sleep(self.config.settle_delay);
                    if !settle(session, self.config.settle_timeout) {
                        warn!("page {page} never settled; extracting anyway");
                    }
                }
                None => {
                    info!("no further pages after page {page}");
                    break;
                }
            }
        }
        Ok(summary)
    }

    /// Resolve the row collection through the fallback list. Exhaustion
    /// here is the one extraction failure that ends the run.
    fn resolve_rows(&self, session: &dyn Session) -> Result<Vec<Element>, ScrapeError> {
        for candidate in row_candidates() {
            let rows = wait_for_all(session, &candidate.locator, self.config.rows_timeout);
            if !rows.is_empty() {
                debug!("rows resolved via '{}'", candidate.name);
                return Ok(rows);
            }
        }
        Err(ScrapeError::Extraction(
            "result rows not found by any locator".into(),
        ))
    }

    /// Read one row's positional cells. `None` means the row is valid to
    /// skip (header, filler, or no usable natural key).
    fn extract_row(
        &self,
        session: &dyn Session,
        row: &Element,
    ) -> Result<Option<RawRow>, ScrapeError> {
        let cells = session.find_within(row, &Locator::css("td"))?;
        if cells.len() < MIN_CELLS {
            debug!("skipping row with {} cells", cells.len());
            return Ok(None);
        }

        let mut raw = RawRow::default();
        for cell in cells.iter().take(MAX_CELLS) {
            raw.cells.push(session.text(cell)?);
        }
        if let Some(alert_cell) = cells.get(9) {
            raw.alert_marker = !session
                .find_within(alert_cell, &Locator::css(&self.config.alert_marker))?
                .is_empty();
        }

        let case_number = raw.cells.get(4).map(|c| c.trim()).unwrap_or("");
        let defendant = raw.cells.first().map(|c| c.trim()).unwrap_or("");
        if defendant.is_empty() || case_number.len() < MIN_CASE_NUMBER_LEN {
            debug!("discarding row without usable key (case '{case_number}')");
            return Ok(None);
        }
        Ok(Some(raw))
    }

    /// `None` ends pagination normally: control absent, disabled by
    /// attribute, or disabled by state.
    fn next_control(&self, session: &dyn Session) -> Option<Element> {
        let (next, _) = first_match(
            session,
            &next_candidates(),
            Readiness::Present,
            self.config.next_timeout,
        )?;
        let class = session
            .attribute(&next, "class")
            .ok()
            .flatten()
            .unwrap_or_default();
        if class.contains("disabled") || !session.is_enabled(&next).unwrap_or(false) {
            debug!("next control disabled");
            return None;
        }
        Some(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::fake::{FakeElement, FakeSession};

    fn fast() -> ExtractorConfig {
        ExtractorConfig {
            rows_timeout: Duration::ZERO,
            next_timeout: Duration::ZERO,
            settle_delay: Duration::ZERO,
            settle_timeout: Duration::ZERO,
            ..Default::default()
        }
    }

    fn rows_locator() -> Locator {
        Locator::xpath("//div[contains(@id, 'gridview')]/table/tbody/tr")
    }

    fn next_locator() -> Locator {
        Locator::xpath("//a[contains(., 'Next')]")
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 1).unwrap()
    }

    /// Add a grid row on `page` whose `td` children carry `cells`.
    fn add_row(session: &mut FakeSession, page: usize, cells: &[&str], alert: bool) {
        let row = session.place_on_page(page, rows_locator(), FakeElement::text(""));
        for (idx, cell) in cells.iter().enumerate() {
            let cell_id = session.attach_child(row, Locator::css("td"), FakeElement::text(cell));
            if alert && idx == 9 {
                session.attach_child(cell_id, Locator::css(".action-alert"), FakeElement::text(""));
            }
        }
    }

    fn full_row(case_number: &str) -> Vec<String> {
        vec![
            "Doe, John".into(),
            "01/15/1990".into(),
            "M".into(),
            "W".into(),
            case_number.into(),
            "01/20/2023".into(),
            "Theft".into(),
            "01/18/2023".into(),
            "Orleans".into(),
            "".into(),
        ]
    }

    fn add_full_row(session: &mut FakeSession, page: usize, case_number: &str) {
        let cells = full_row(case_number);
        let refs: Vec<&str> = cells.iter().map(String::as_str).collect();
        add_row(session, page, &refs, false);
    }

    #[test]
    fn test_single_page_extraction() {
        let mut session = FakeSession::new();
        add_full_row(&mut session, 0, "2023-12345");
        add_full_row(&mut session, 0, "2023-67890");
        let store = RecordStore::open_in_memory().unwrap();

        let summary = ResultExtractor::new(fast())
            .extract(&session, &store, 5, today())
            .unwrap();
        assert_eq!(summary.records.len(), 2);
        assert_eq!(summary.created, 2);
        assert_eq!(summary.pages_processed, 1);
        assert_eq!(store.count().unwrap(), 2);
    }

    #[test]
    fn test_short_row_never_reaches_store() {
        let mut session = FakeSession::new();
        add_row(&mut session, 0, &["Doe", "01/15/1990", "M", "W"], false);
        add_full_row(&mut session, 0, "2023-12345");
        let store = RecordStore::open_in_memory().unwrap();

        let summary = ResultExtractor::new(fast())
            .extract(&session, &store, 1, today())
            .unwrap();
        assert_eq!(summary.records.len(), 1);
        assert_eq!(summary.skipped_rows, 1);
        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn test_rows_without_key_fields_are_discarded() {
        let mut session = FakeSession::new();
        // Empty case number.
        add_row(
            &mut session,
            0,
            &["Doe, John", "", "M", "W", "", "01/20/2023", "", "", "Orleans", ""],
            false,
        );
        // Empty defendant name.
        add_row(
            &mut session,
            0,
            &["", "", "M", "W", "2023-11111", "01/20/2023", "", "", "Orleans", ""],
            false,
        );
        // Case number below the natural-key minimum.
        add_row(
            &mut session,
            0,
            &["Doe, Jane", "", "F", "W", "1234", "01/20/2023", "", "", "Orleans", ""],
            false,
        );
        let store = RecordStore::open_in_memory().unwrap();

        let summary = ResultExtractor::new(fast())
            .extract(&session, &store, 1, today())
            .unwrap();
        assert!(summary.records.is_empty());
        assert_eq!(summary.skipped_rows, 3);
        assert_eq!(store.count().unwrap(), 0);
    }

    #[test]
    fn test_alert_marker_detection() {
        let mut session = FakeSession::new();
        let cells = full_row("2023-12345");
        let refs: Vec<&str> = cells.iter().map(String::as_str).collect();
        add_row(&mut session, 0, &refs, true);
        let store = RecordStore::open_in_memory().unwrap();

        let summary = ResultExtractor::new(fast())
            .extract(&session, &store, 1, today())
            .unwrap();
        assert!(summary.records[0].alert_available);
    }

    #[test]
    fn test_pagination_stops_at_max_pages_with_next_enabled() {
        let mut session = FakeSession::new();
        add_full_row(&mut session, 0, "2023-00001");
        add_full_row(&mut session, 1, "2023-00002");
        session.place_on_page(0, next_locator(), FakeElement::text("Next").advances_page());
        session.place_on_page(1, next_locator(), FakeElement::text("Next").advances_page());
        let store = RecordStore::open_in_memory().unwrap();

        let summary = ResultExtractor::new(fast())
            .extract(&session, &store, 1, today())
            .unwrap();
        assert_eq!(summary.pages_processed, 1);
        assert_eq!(summary.records.len(), 1);
    }

    #[test]
    fn test_pagination_stops_on_disabled_next_before_cap() {
        let mut session = FakeSession::new();
        add_full_row(&mut session, 0, "2023-00001");
        add_full_row(&mut session, 1, "2023-00002");
        session.place_on_page(0, next_locator(), FakeElement::text("Next").advances_page());
        session.place_on_page(
            1,
            next_locator(),
            FakeElement::text("Next")
                .with_attribute("class", "pager-next disabled")
                .advances_page(),
        );
        let store = RecordStore::open_in_memory().unwrap();

        let summary = ResultExtractor::new(fast())
            .extract(&session, &store, 3, today())
            .unwrap();
        assert_eq!(summary.pages_processed, 2);
        assert_eq!(summary.records.len(), 2);
    }

    #[test]
    fn test_pagination_stops_when_next_absent() {
        let mut session = FakeSession::new();
        add_full_row(&mut session, 0, "2023-00001");
        let store = RecordStore::open_in_memory().unwrap();

        let summary = ResultExtractor::new(fast())
            .extract(&session, &store, 3, today())
            .unwrap();
        assert_eq!(summary.pages_processed, 1);
    }

    #[test]
    fn test_row_collection_exhaustion_fails_run() {
        let session = FakeSession::new();
        let store = RecordStore::open_in_memory().unwrap();

        assert!(matches!(
            ResultExtractor::new(fast()).extract(&session, &store, 1, today()),
            Err(ScrapeError::Extraction(_))
        ));
    }

    #[test]
    fn test_rescrape_updates_instead_of_duplicating() {
        let mut session = FakeSession::new();
        add_full_row(&mut session, 0, "2023-12345");
        let store = RecordStore::open_in_memory().unwrap();
        let extractor = ResultExtractor::new(fast());

        let first = extractor.extract(&session, &store, 1, today()).unwrap();
        let second = extractor.extract(&session, &store, 1, today()).unwrap();
        assert_eq!(first.created, 1);
        assert_eq!(second.created, 0);
        assert_eq!(second.updated, 1);
        assert_eq!(store.count().unwrap(), 1);
    }
}
