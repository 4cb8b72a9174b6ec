//! Pure normalization of raw row text into a typed [`CaseRecord`].
//!
//! No session access and no clock access: the caller supplies "today" so
//! the `date_filed` default is deterministic under test.

use chrono::NaiveDate;

use crate::types::{CaseRecord, RACE_CODES, SEX_CODES, UNKNOWN_CODE};

/// Date formats tried in order; the first parse wins. No locale
/// disambiguation is attempted.
const DATE_FORMATS: &[&str] = &["%m/%d/%Y", "%Y-%m-%d", "%m-%d-%Y", "%d/%m/%Y"];

/// Raw positional cells read from one result row, in portal column order:
/// 0=defendant_name, 1=birth_date, 2=sex, 3=race, 4=case_number,
/// 5=date_filed, 6=charges, 7=arrest_citation_date, 8=parish. The alert
/// flag comes from a marker element in cell 9, not from its text.
#[derive(Debug, Clone, Default)]
pub struct RawRow {
    pub cells: Vec<String>,
    pub alert_marker: bool,
}

impl RawRow {
    fn cell(&self, idx: usize) -> &str {
        self.cells.get(idx).map(String::as_str).unwrap_or("")
    }
}

/// Try each supported format in order; unparseable input is `None`,
/// never an error.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
}

/// Reduce a sex/race cell to its single-character code. Blank cells and
/// codes outside the closed set both collapse to `'U'`.
fn code_from_cell(raw: &str, allowed: &[char]) -> char {
    let code = raw
        .trim()
        .chars()
        .find(|c| c.is_ascii_alphabetic())
        .map(|c| c.to_ascii_uppercase());
    match code {
        Some(c) if allowed.contains(&c) => c,
        _ => UNKNOWN_CODE,
    }
}

/// Multi-line charge entries become one comma-joined string.
fn join_charges(raw: &str) -> String {
    raw.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Build a typed record from raw cells. `today` backfills `date_filed`
/// when the cell is blank or unparseable: a filing date is never null.
pub fn normalize(row: &RawRow, today: NaiveDate) -> CaseRecord {
    CaseRecord {
        defendant_name: row.cell(0).trim().to_string(),
        birth_date: parse_date(row.cell(1)),
        sex: code_from_cell(row.cell(2), SEX_CODES),
        race: code_from_cell(row.cell(3), RACE_CODES),
        case_number: row.cell(4).trim().to_string(),
        date_filed: parse_date(row.cell(5)).unwrap_or(today),
        charges: join_charges(row.cell(6)),
        arrest_citation_date: parse_date(row.cell(7)),
        parish: row.cell(8).trim().to_string(),
        alert_available: row.alert_marker,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(cells: &[&str]) -> RawRow {
        RawRow {
            cells: cells.iter().map(|c| c.to_string()).collect(),
            alert_marker: false,
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 1).unwrap()
    }

    #[test]
    fn test_parse_date_all_supported_formats() {
        let expected = NaiveDate::from_ymd_opt(2023, 1, 20).unwrap();
        assert_eq!(parse_date("01/20/2023"), Some(expected));
        assert_eq!(parse_date("2023-01-20"), Some(expected));
        assert_eq!(parse_date("01-20-2023"), Some(expected));
        // Day-first only matches once month-first has failed.
        assert_eq!(
            parse_date("20/01/2023"),
            Some(NaiveDate::from_ymd_opt(2023, 1, 20).unwrap())
        );
    }

    #[test]
    fn test_parse_date_first_format_wins() {
        // Ambiguous between %m/%d and %d/%m; the ordered list decides.
        assert_eq!(
            parse_date("01/02/2023"),
            Some(NaiveDate::from_ymd_opt(2023, 1, 2).unwrap())
        );
    }

    #[test]
    fn test_parse_date_rejects_junk() {
        assert_eq!(parse_date(""), None);
        assert_eq!(parse_date("   "), None);
        assert_eq!(parse_date("not-a-date"), None);
        assert_eq!(parse_date("13/45/2023"), None);
    }

    #[test]
    fn test_normalize_full_row() {
        let row = RawRow {
            cells: vec![
                "Doe, John".into(),
                "01/15/1990".into(),
                "M".into(),
                "W".into(),
                "2023-12345".into(),
                "01/20/2023".into(),
                "Theft, Battery".into(),
                "01/18/2023".into(),
                "Orleans".into(),
                "".into(),
            ],
            alert_marker: false,
        };
        let rec = normalize(&row, today());
        assert_eq!(rec.defendant_name, "Doe, John");
        assert_eq!(rec.birth_date, NaiveDate::from_ymd_opt(1990, 1, 15));
        assert_eq!(rec.sex, 'M');
        assert_eq!(rec.race, 'W');
        assert_eq!(rec.case_number, "2023-12345");
        assert_eq!(rec.date_filed, NaiveDate::from_ymd_opt(2023, 1, 20).unwrap());
        assert_eq!(rec.charges, "Theft, Battery");
        assert_eq!(
            rec.arrest_citation_date,
            NaiveDate::from_ymd_opt(2023, 1, 18)
        );
        assert_eq!(rec.parish, "Orleans");
        assert!(!rec.alert_available);
    }

    #[test]
    fn test_blank_codes_default_to_unknown() {
        let rec = normalize(&raw(&["Doe", "", "", "", "12345", "", "", "", ""]), today());
        assert_eq!(rec.sex, 'U');
        assert_eq!(rec.race, 'U');
    }

    #[test]
    fn test_code_outside_closed_set_clamps_to_unknown() {
        let rec = normalize(&raw(&["Doe", "", "X", "Q", "12345", "", "", "", ""]), today());
        assert_eq!(rec.sex, 'U');
        assert_eq!(rec.race, 'U');
    }

    #[test]
    fn test_code_reduces_to_first_character() {
        let rec = normalize(
            &raw(&["Doe", "", "Male", " white ", "12345", "", "", "", ""]),
            today(),
        );
        assert_eq!(rec.sex, 'M');
        assert_eq!(rec.race, 'W');
    }

    #[test]
    fn test_date_filed_defaults_to_today_when_unparseable() {
        let rec = normalize(
            &raw(&["Doe", "", "", "", "12345", "garbled", "", "", ""]),
            today(),
        );
        assert_eq!(rec.date_filed, today());
    }

    #[test]
    fn test_multiline_charges_join() {
        let rec = normalize(
            &raw(&["Doe", "", "", "", "12345", "", "Theft\nBattery\n", "", ""]),
            today(),
        );
        assert_eq!(rec.charges, "Theft, Battery");
    }

    #[test]
    fn test_missing_trailing_cells_read_as_empty() {
        let rec = normalize(&raw(&["Doe", "", "", "", "12345"]), today());
        assert_eq!(rec.charges, "");
        assert_eq!(rec.parish, "");
        assert_eq!(rec.arrest_citation_date, None);
    }
}
