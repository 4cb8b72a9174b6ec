//! Flat-file export of one run's accumulated records.

use std::path::Path;

use chrono::NaiveDate;
use log::info;

use crate::error::ScrapeError;
use crate::types::CaseRecord;

/// Fixed output column order. Matches the portal's grid, not the store's
/// column order.
const COLUMNS: &[&str] = &[
    "defendant_name",
    "birth_date",
    "sex",
    "race",
    "case_number",
    "date_filed",
    "charges",
    "arrest_citation_date",
    "parish",
    "alert_available",
];

fn date_cell(date: Option<NaiveDate>) -> String {
    date.map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_default()
}

/// Write the full run to `path`, overwriting any previous file. Zero
/// records is an explicit no-op: no file is created or truncated.
pub fn write(path: &Path, records: &[CaseRecord]) -> Result<(), ScrapeError> {
    if records.is_empty() {
        info!("no records accumulated, skipping export");
        return Ok(());
    }

    let mut writer =
        csv::Writer::from_path(path).map_err(|e| ScrapeError::Export(e.to_string()))?;
    writer
        .write_record(COLUMNS)
        .map_err(|e| ScrapeError::Export(e.to_string()))?;

    for rec in records {
        writer
            .write_record(&[
                rec.defendant_name.clone(),
                date_cell(rec.birth_date),
                rec.sex.to_string(),
                rec.race.to_string(),
                rec.case_number.clone(),
                rec.date_filed.format("%Y-%m-%d").to_string(),
                rec.charges.clone(),
                date_cell(rec.arrest_citation_date),
                rec.parish.clone(),
                rec.alert_available.to_string(),
            ])
            .map_err(|e| ScrapeError::Export(e.to_string()))?;
    }
    writer
        .flush()
        .map_err(|e| ScrapeError::Export(e.to_string()))?;

    info!("exported {} records to {}", records.len(), path.display());
    Ok(())
}
