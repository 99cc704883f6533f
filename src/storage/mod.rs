// src/storage/mod.rs
use std::collections::HashMap;
use std::fs;
use std::path::Path;

use rusqlite::{params, Connection, OptionalExtension, Transaction};
use serde::Serialize;

use crate::extractors::{ResolvedApplicant, StatusCode};
use crate::utils::error::StorageError;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS institutions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS statuses (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    slug TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS applicants (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    folio INTEGER NOT NULL UNIQUE,
    full_name TEXT NOT NULL,
    score REAL,
    year INTEGER NOT NULL,
    institution_id INTEGER NOT NULL REFERENCES institutions(id),
    status_id INTEGER NOT NULL REFERENCES statuses(id),
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
";

const APPLICANT_VIEW_SELECT: &str = "
SELECT a.folio, a.full_name, a.score, a.year, i.name, s.slug, s.name
FROM applicants a
JOIN institutions i ON i.id = a.institution_id
JOIN statuses s ON s.id = a.status_id
";

fn now() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Whether an upsert created a new applicant or overwrote one with the same folio.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created,
    Updated,
}

/// Writes needed by an import run.
pub trait ApplicantRepository {
    /// Id of the institution with this exact name, creating it if needed.
    fn institution_id(&mut self, name: &str) -> Result<i64, StorageError>;

    /// Id of the status row for `status`, creating it if needed.
    fn status_id(&mut self, status: StatusCode) -> Result<i64, StorageError>;

    /// Creates or overwrites the applicant sharing `applicant.folio`.
    fn upsert_applicant(
        &mut self,
        applicant: &ResolvedApplicant,
        institution_id: i64,
        status_id: i64,
    ) -> Result<UpsertOutcome, StorageError>;
}

/// Applicant joined with its institution and status, as shown by `list` and `show`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApplicantView {
    pub folio: i64,
    pub full_name: String,
    pub score: Option<f64>,
    pub year: i32,
    pub institution: String,
    pub status_slug: String,
    pub status_name: String,
}

impl ApplicantView {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            folio: row.get(0)?,
            full_name: row.get(1)?,
            score: row.get(2)?,
            year: row.get(3)?,
            institution: row.get(4)?,
            status_slug: row.get(5)?,
            status_name: row.get(6)?,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Page {
    pub items: Vec<ApplicantView>,
    pub page: u32,
    pub per_page: u32,
    pub total: u64,
    pub last_page: u32,
}

pub struct StorageManager {
    conn: Connection,
}

impl StorageManager {
    /// Opens (or creates) the database file and makes sure the schema exists.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let path = path.as_ref();

        // Create the parent directory if it doesn't exist
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).map_err(StorageError::Io)?;
            }
        }

        let conn = Connection::open(path)?;
        tracing::debug!("Opened database {}", path.display());
        Self::with_connection(conn)
    }

    #[cfg(test)]
    pub fn in_memory() -> Result<Self, StorageError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    #[cfg(test)]
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    fn with_connection(conn: Connection) -> Result<Self, StorageError> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    /// Starts the single transaction an import run writes through.
    pub fn begin_import(&mut self) -> Result<ImportSession<'_>, StorageError> {
        let tx = self.conn.transaction()?;
        Ok(ImportSession {
            tx,
            institutions: HashMap::new(),
            statuses: HashMap::new(),
        })
    }

    /// One page of applicants ordered by folio. `page` starts at 1.
    pub fn list_applicants(&self, page: u32, per_page: u32) -> Result<Page, StorageError> {
        let page = page.max(1);
        let per_page = per_page.max(1);

        let total = self.count_applicants()?;
        let last_page = total.div_ceil(per_page as u64).max(1) as u32;
        let offset = (page as i64 - 1) * per_page as i64;

        let mut stmt = self
            .conn
            .prepare(&format!("{} ORDER BY a.folio LIMIT ?1 OFFSET ?2", APPLICANT_VIEW_SELECT))?;
        let items = stmt
            .query_map(params![per_page as i64, offset], ApplicantView::from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Page { items, page, per_page, total, last_page })
    }

    pub fn find_applicant(&self, folio: i64) -> Result<ApplicantView, StorageError> {
        self.conn
            .query_row(
                &format!("{} WHERE a.folio = ?1", APPLICANT_VIEW_SELECT),
                [folio],
                ApplicantView::from_row,
            )
            .optional()?
            .ok_or(StorageError::NotFound(folio))
    }

    pub fn count_applicants(&self) -> Result<u64, StorageError> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM applicants", [], |r| r.get(0))?;
        Ok(count as u64)
    }
}

/// Writes of one import run. Lookups of institutions and statuses are cached
/// for the life of the session only.
///
/// Nothing is visible to other connections until [`ImportSession::commit`];
/// dropping the session rolls every write back.
pub struct ImportSession<'conn> {
    tx: Transaction<'conn>,
    institutions: HashMap<String, i64>,
    statuses: HashMap<StatusCode, i64>,
}

impl ImportSession<'_> {
    pub fn commit(self) -> Result<(), StorageError> {
        self.tx.commit()?;
        tracing::info!("Import transaction committed");
        Ok(())
    }
}

impl ApplicantRepository for ImportSession<'_> {
    fn institution_id(&mut self, name: &str) -> Result<i64, StorageError> {
        if let Some(&id) = self.institutions.get(name) {
            return Ok(id);
        }

        let existing: Option<i64> = self
            .tx
            .query_row("SELECT id FROM institutions WHERE name = ?1", [name], |r| r.get(0))
            .optional()?;
        let id = match existing {
            Some(id) => id,
            None => {
                let ts = now();
                self.tx.execute(
                    "INSERT INTO institutions (name, created_at, updated_at) VALUES (?1, ?2, ?2)",
                    params![name, ts],
                )?;
                tracing::debug!("Created institution '{}'", name);
                self.tx.last_insert_rowid()
            }
        };

        self.institutions.insert(name.to_string(), id);
        Ok(id)
    }

    fn status_id(&mut self, status: StatusCode) -> Result<i64, StorageError> {
        if let Some(&id) = self.statuses.get(&status) {
            return Ok(id);
        }

        let existing: Option<i64> = self
            .tx
            .query_row("SELECT id FROM statuses WHERE slug = ?1", [status.slug()], |r| r.get(0))
            .optional()?;
        let id = match existing {
            Some(id) => id,
            None => {
                let ts = now();
                self.tx.execute(
                    "INSERT INTO statuses (slug, name, created_at, updated_at) VALUES (?1, ?2, ?3, ?3)",
                    params![status.slug(), status.display_name(), ts],
                )?;
                self.tx.last_insert_rowid()
            }
        };

        self.statuses.insert(status, id);
        Ok(id)
    }

    fn upsert_applicant(
        &mut self,
        applicant: &ResolvedApplicant,
        institution_id: i64,
        status_id: i64,
    ) -> Result<UpsertOutcome, StorageError> {
        let ts = now();
        let existing: Option<i64> = self
            .tx
            .query_row("SELECT id FROM applicants WHERE folio = ?1", [applicant.folio], |r| r.get(0))
            .optional()?;

        match existing {
            Some(id) => {
                self.tx.execute(
                    "UPDATE applicants
                     SET full_name = ?1, score = ?2, year = ?3, institution_id = ?4, status_id = ?5, updated_at = ?6
                     WHERE id = ?7",
                    params![
                        applicant.full_name,
                        applicant.score,
                        applicant.year,
                        institution_id,
                        status_id,
                        ts,
                        id
                    ],
                )?;
                Ok(UpsertOutcome::Updated)
            }
            None => {
                self.tx.execute(
                    "INSERT INTO applicants (folio, full_name, score, year, institution_id, status_id, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
                    params![
                        applicant.folio,
                        applicant.full_name,
                        applicant.score,
                        applicant.year,
                        institution_id,
                        status_id,
                        ts
                    ],
                )?;
                Ok(UpsertOutcome::Created)
            }
        }
    }
}
