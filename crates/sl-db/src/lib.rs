//! Storage layer for shift records.
//!
//! Persists works, work changes, and breaks using `rusqlite`, and serves the
//! record snapshot for a recomputation window. Collisions are never stored.
//!
//! # Thread Safety
//!
//! The [`Database`] type wraps a `rusqlite::Connection`, which is `Send` but not `Sync`.
//! A `Database` instance can be moved between threads but cannot be shared
//! across threads without external synchronization. Concurrent recomputation
//! passes should each open their own `Database`.
//!
//! # Schema
//!
//! Dates are stored as TEXT in `YYYY-MM-DD` format and times of day as TEXT in
//! `HH:MM:SS[.fffffffff]` format, so lexicographic order matches chronological
//! order. Change kinds are stored by their snake-case name.
//!
//! Changes reference works by ID without a foreign key: a change whose work is
//! missing is kept and ignored at build time.

use std::path::Path;

use chrono::{NaiveDate, NaiveTime};
use rusqlite::{Connection, params};
use thiserror::Error;

use sl_core::{
    Break, BreakId, ChangeId, ChangeKind, ClientId, RecomputeWindow, RecordSet, RecordSource,
    ShiftId, ValidationError, Work, WorkChange, WorkId,
};

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIME_FORMAT: &str = "%H:%M:%S%.f";

/// Database errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// An error from the underlying database.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// A stored date, time, or kind could not be parsed.
    #[error("invalid {field} for {table} record {id}: {value}")]
    InvalidField {
        table: &'static str,
        id: String,
        field: &'static str,
        value: String,
    },
    /// A stored ID failed validation.
    #[error("invalid {table} record")]
    Validation {
        table: &'static str,
        #[source]
        source: ValidationError,
    },
}

/// Database connection wrapper.
///
/// See the [module documentation](self) for thread safety considerations.
pub struct Database {
    conn: Connection,
}

/// Number of stored records per kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecordCounts {
    pub works: usize,
    pub changes: usize,
    pub breaks: usize,
}

/// Number of newly inserted records per kind.
pub type InsertStats = RecordCounts;

impl Database {
    /// Opens a database at the given path, creating it if necessary.
    ///
    /// The database schema is automatically initialized on first open.
    pub fn open(path: &Path) -> Result<Self, DbError> {
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Opens an in-memory database.
    ///
    /// Useful for testing. The database is destroyed when the connection closes.
    pub fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Initializes the database schema.
    ///
    /// This is idempotent - safe to call on an already-initialized database.
    fn init(&self) -> Result<(), DbError> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS works (
                id TEXT PRIMARY KEY,
                client_id TEXT NOT NULL,
                shift_id TEXT NOT NULL,
                date TEXT NOT NULL,
                start_time TEXT NOT NULL,
                end_time TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_works_date ON works(date);
            CREATE INDEX IF NOT EXISTS idx_works_client ON works(client_id, date);

            -- kind: start_correction, end_correction, start_replacement, end_replacement
            -- replacement_client_id: only set for replacements
            CREATE TABLE IF NOT EXISTS work_changes (
                id TEXT PRIMARY KEY,
                work_id TEXT NOT NULL,
                kind TEXT NOT NULL,
                start_time TEXT NOT NULL,
                end_time TEXT NOT NULL,
                replacement_client_id TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_work_changes_work ON work_changes(work_id);
            CREATE INDEX IF NOT EXISTS idx_work_changes_replacement ON work_changes(replacement_client_id);

            CREATE TABLE IF NOT EXISTS breaks (
                id TEXT PRIMARY KEY,
                client_id TEXT NOT NULL,
                date TEXT NOT NULL,
                start_time TEXT NOT NULL,
                end_time TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_breaks_client ON breaks(client_id, date);
            ",
        )?;
        Ok(())
    }

    /// Inserts a batch of records in one transaction, ignoring duplicates by ID.
    pub fn insert_records(&mut self, records: &RecordSet) -> Result<InsertStats, DbError> {
        if records.is_empty() {
            return Ok(InsertStats::default());
        }
        let tx = self.conn.transaction()?;
        let mut stats = InsertStats::default();
        {
            let mut stmt = tx.prepare(
                "
                INSERT OR IGNORE INTO works (id, client_id, shift_id, date, start_time, end_time)
                VALUES (?, ?, ?, ?, ?, ?)
                ",
            )?;
            for work in &records.works {
                stats.works += stmt.execute(params![
                    work.id.as_str(),
                    work.client_id.as_str(),
                    work.shift_id.as_str(),
                    format_date(work.date),
                    format_time(work.start),
                    format_time(work.end),
                ])?;
            }
        }
        {
            let mut stmt = tx.prepare(
                "
                INSERT OR IGNORE INTO work_changes
                (id, work_id, kind, start_time, end_time, replacement_client_id)
                VALUES (?, ?, ?, ?, ?, ?)
                ",
            )?;
            for change in &records.changes {
                stats.changes += stmt.execute(params![
                    change.id.as_str(),
                    change.work_id.as_str(),
                    change.kind.as_str(),
                    format_time(change.start),
                    format_time(change.end),
                    change.replacement_client_id.as_ref().map(ClientId::as_str),
                ])?;
            }
        }
        {
            let mut stmt = tx.prepare(
                "
                INSERT OR IGNORE INTO breaks (id, client_id, date, start_time, end_time)
                VALUES (?, ?, ?, ?, ?)
                ",
            )?;
            for brk in &records.breaks {
                stats.breaks += stmt.execute(params![
                    brk.id.as_str(),
                    brk.client_id.as_str(),
                    format_date(brk.date),
                    format_time(brk.start),
                    format_time(brk.end),
                ])?;
            }
        }
        tx.commit()?;
        tracing::debug!(
            works = stats.works,
            changes = stats.changes,
            breaks = stats.breaks,
            "inserted records"
        );
        Ok(stats)
    }

    /// Counts stored records per kind.
    pub fn record_counts(&self) -> Result<RecordCounts, DbError> {
        let count = |table: &str| -> Result<usize, DbError> {
            let n: i64 = self
                .conn
                .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))?;
            Ok(usize::try_from(n).unwrap_or_default())
        };
        Ok(RecordCounts {
            works: count("works")?,
            changes: count("work_changes")?,
            breaks: count("breaks")?,
        })
    }

    /// Loads the record snapshot for a window.
    ///
    /// Works and breaks are loaded from the day before the window through its
    /// last day. With a client filter, works replaced over to the client are
    /// included alongside the client's own works. Changes are loaded for every
    /// returned work.
    pub fn load_records(&self, window: &RecomputeWindow) -> Result<RecordSet, DbError> {
        let from = format_date(window.load_from());
        let to = format_date(window.last());
        let client = window.client_id().map(ClientId::as_str);

        let records = RecordSet {
            works: self.load_works(&from, &to, client)?,
            changes: self.load_changes(&from, &to, client)?,
            breaks: self.load_breaks(&from, &to, client)?,
        };
        tracing::debug!(
            %from,
            %to,
            client = client.unwrap_or("*"),
            works = records.works.len(),
            changes = records.changes.len(),
            breaks = records.breaks.len(),
            "loaded records"
        );
        Ok(records)
    }

    fn load_works(&self, from: &str, to: &str, client: Option<&str>) -> Result<Vec<Work>, DbError> {
        let mut stmt = self.conn.prepare(
            "
            SELECT w.id, w.client_id, w.shift_id, w.date, w.start_time, w.end_time
            FROM works w
            WHERE w.date >= ?1 AND w.date <= ?2
              AND (?3 IS NULL OR w.client_id = ?3 OR w.id IN (
                  SELECT work_id FROM work_changes WHERE replacement_client_id = ?3
              ))
            ORDER BY w.date ASC, w.start_time ASC, w.id ASC
            ",
        )?;
        let rows = stmt.query_map(params![from, to, client], |row| {
            Ok(WorkRow {
                id: row.get(0)?,
                client_id: row.get(1)?,
                shift_id: row.get(2)?,
                date: row.get(3)?,
                start: row.get(4)?,
                end: row.get(5)?,
            })
        })?;
        let mut works = Vec::new();
        for row in rows {
            works.push(row?.into_work()?);
        }
        Ok(works)
    }

    fn load_changes(
        &self,
        from: &str,
        to: &str,
        client: Option<&str>,
    ) -> Result<Vec<WorkChange>, DbError> {
        let mut stmt = self.conn.prepare(
            "
            SELECT c.id, c.work_id, c.kind, c.start_time, c.end_time, c.replacement_client_id
            FROM work_changes c
            JOIN works w ON w.id = c.work_id
            WHERE w.date >= ?1 AND w.date <= ?2
              AND (?3 IS NULL OR w.client_id = ?3 OR w.id IN (
                  SELECT work_id FROM work_changes WHERE replacement_client_id = ?3
              ))
            ORDER BY w.date ASC, w.start_time ASC, c.work_id ASC, c.id ASC
            ",
        )?;
        let rows = stmt.query_map(params![from, to, client], |row| {
            Ok(ChangeRow {
                id: row.get(0)?,
                work_id: row.get(1)?,
                kind: row.get(2)?,
                start: row.get(3)?,
                end: row.get(4)?,
                replacement_client_id: row.get(5)?,
            })
        })?;
        let mut changes = Vec::new();
        for row in rows {
            changes.push(row?.into_change()?);
        }
        Ok(changes)
    }

    fn load_breaks(&self, from: &str, to: &str, client: Option<&str>) -> Result<Vec<Break>, DbError> {
        let mut stmt = self.conn.prepare(
            "
            SELECT id, client_id, date, start_time, end_time
            FROM breaks
            WHERE date >= ?1 AND date <= ?2
              AND (?3 IS NULL OR client_id = ?3)
            ORDER BY date ASC, start_time ASC, id ASC
            ",
        )?;
        let rows = stmt.query_map(params![from, to, client], |row| {
            Ok(BreakRow {
                id: row.get(0)?,
                client_id: row.get(1)?,
                date: row.get(2)?,
                start: row.get(3)?,
                end: row.get(4)?,
            })
        })?;
        let mut breaks = Vec::new();
        for row in rows {
            breaks.push(row?.into_break()?);
        }
        Ok(breaks)
    }
}

impl RecordSource for Database {
    type Error = DbError;

    fn load(&self, window: &RecomputeWindow) -> Result<RecordSet, Self::Error> {
        self.load_records(window)
    }
}

/// A work row as stored.
struct WorkRow {
    id: String,
    client_id: String,
    shift_id: String,
    date: String,
    start: String,
    end: String,
}

impl WorkRow {
    fn into_work(self) -> Result<Work, DbError> {
        const TABLE: &str = "works";
        Ok(Work::new(
            WorkId::new(self.id.clone()).map_err(|source| DbError::Validation { table: TABLE, source })?,
            ClientId::new(self.client_id).map_err(|source| DbError::Validation { table: TABLE, source })?,
            ShiftId::new(self.shift_id).map_err(|source| DbError::Validation { table: TABLE, source })?,
            parse_date(TABLE, &self.id, &self.date)?,
            parse_time(TABLE, &self.id, "start_time", &self.start)?,
            parse_time(TABLE, &self.id, "end_time", &self.end)?,
        ))
    }
}

/// A work change row as stored.
struct ChangeRow {
    id: String,
    work_id: String,
    kind: String,
    start: String,
    end: String,
    replacement_client_id: Option<String>,
}

impl ChangeRow {
    fn into_change(self) -> Result<WorkChange, DbError> {
        const TABLE: &str = "work_changes";
        let kind: ChangeKind = self.kind.parse().map_err(|_| DbError::InvalidField {
            table: TABLE,
            id: self.id.clone(),
            field: "kind",
            value: self.kind.clone(),
        })?;
        let replacement_client_id = self
            .replacement_client_id
            .map(ClientId::new)
            .transpose()
            .map_err(|source| DbError::Validation { table: TABLE, source })?;
        Ok(WorkChange {
            start: parse_time(TABLE, &self.id, "start_time", &self.start)?,
            end: parse_time(TABLE, &self.id, "end_time", &self.end)?,
            id: ChangeId::new(self.id).map_err(|source| DbError::Validation { table: TABLE, source })?,
            work_id: WorkId::new(self.work_id).map_err(|source| DbError::Validation { table: TABLE, source })?,
            kind,
            replacement_client_id,
        })
    }
}

/// A break row as stored.
struct BreakRow {
    id: String,
    client_id: String,
    date: String,
    start: String,
    end: String,
}

impl BreakRow {
    fn into_break(self) -> Result<Break, DbError> {
        const TABLE: &str = "breaks";
        Ok(Break::new(
            BreakId::new(self.id.clone()).map_err(|source| DbError::Validation { table: TABLE, source })?,
            ClientId::new(self.client_id).map_err(|source| DbError::Validation { table: TABLE, source })?,
            parse_date(TABLE, &self.id, &self.date)?,
            parse_time(TABLE, &self.id, "start_time", &self.start)?,
            parse_time(TABLE, &self.id, "end_time", &self.end)?,
        ))
    }
}

fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

fn format_time(time: NaiveTime) -> String {
    time.format(TIME_FORMAT).to_string()
}

fn parse_date(table: &'static str, id: &str, value: &str) -> Result<NaiveDate, DbError> {
    NaiveDate::parse_from_str(value, DATE_FORMAT).map_err(|_| DbError::InvalidField {
        table,
        id: id.to_string(),
        field: "date",
        value: value.to_string(),
    })
}

fn parse_time(
    table: &'static str,
    id: &str,
    field: &'static str,
    value: &str,
) -> Result<NaiveTime, DbError> {
    NaiveTime::parse_from_str(value, TIME_FORMAT).map_err(|_| DbError::InvalidField {
        table,
        id: id.to_string(),
        field,
        value: value.to_string(),
    })
}
