//! Durable case record persistence, keyed by the natural `case_number`.

use chrono::Utc;
use log::debug;
use rusqlite::{params, Connection, OptionalExtension, Result};

use crate::types::CaseRecord;

/// A persisted row, as read back from the store.
#[derive(Debug, Clone)]
pub struct StoredRecord {
    pub record: CaseRecord,
    /// Set once at first persistence, never modified by later upserts.
    pub scraped_timestamp: String,
}

pub struct RecordStore {
    conn: Connection,
}

impl RecordStore {
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(include_str!("../schema.sql"))?;
        Ok(RecordStore { conn })
    }

    /// Insert or overwrite by `case_number` (last-write-wins on every
    /// field except `scraped_timestamp`). Returns true when the key was
    /// newly created. The flag comes from the write's own change count,
    /// not a separate existence probe.
    pub fn upsert(&self, record: &CaseRecord) -> Result<bool> {
        let updated = self.conn.execute(
            "UPDATE case_records SET
                 defendant_name = ?2,
                 birth_date = ?3,
                 sex = ?4,
                 race = ?5,
                 date_filed = ?6,
                 charges = ?7,
                 arrest_citation_date = ?8,
                 parish = ?9,
                 alert_available = ?10
             WHERE case_number = ?1",
            params![
                record.case_number,
                record.defendant_name,
                record.birth_date,
                record.sex.to_string(),
                record.race.to_string(),
                record.date_filed,
                record.charges,
                record.arrest_citation_date,
                record.parish,
                record.alert_available,
            ],
        )?;
        if updated > 0 {
            debug!("updated record {}", record.case_number);
            return Ok(false);
        }

        self.conn.execute(
            "INSERT INTO case_records (case_number, defendant_name, birth_date, sex, race,
                                       date_filed, charges, arrest_citation_date, parish,
                                       alert_available, scraped_timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                record.case_number,
                record.defendant_name,
                record.birth_date,
                record.sex.to_string(),
                record.race.to_string(),
                record.date_filed,
                record.charges,
                record.arrest_citation_date,
                record.parish,
                record.alert_available,
                Utc::now().to_rfc3339(),
            ],
        )?;
        debug!("created record {}", record.case_number);
        Ok(true)
    }

    pub fn count(&self) -> Result<i64> {
        self.conn
            .query_row("SELECT COUNT(*) FROM case_records", [], |row| row.get(0))
    }

    pub fn fetch(&self, case_number: &str) -> Result<Option<StoredRecord>> {
        self.conn
            .query_row(
                "SELECT case_number, defendant_name, birth_date, sex, race, date_filed,
                        charges, arrest_citation_date, parish, alert_available,
                        scraped_timestamp
                 FROM case_records WHERE case_number = ?1",
                [case_number],
                |row| {
                    let sex: String = row.get(3)?;
                    let race: String = row.get(4)?;
                    Ok(StoredRecord {
                        record: CaseRecord {
                            case_number: row.get(0)?,
                            defendant_name: row.get(1)?,
                            birth_date: row.get(2)?,
                            sex: sex.chars().next().unwrap_or('U'),
                            race: race.chars().next().unwrap_or('U'),
                            date_filed: row.get(5)?,
                            charges: row.get(6)?,
                            arrest_citation_date: row.get(7)?,
                            parish: row.get(8)?,
                            alert_available: row.get(9)?,
                        },
                        scraped_timestamp: row.get(10)?,
                    })
                },
            )
            .optional()
    }
}
