// src/import.rs
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::extractors::{
    normalize_row, parse_folio, resolve_status, AnnexFile, RawRow, StatusCode, WaitlistFolioSet,
    APPLICATIONS_ANNEX,
};
use crate::storage::{ApplicantRepository, StorageManager, UpsertOutcome};
use crate::utils::error::{AppError, StorageError};

/// Observes how far an import has gone. Purely informational.
pub trait ProgressReporter {
    fn start(&mut self, _total: usize) {}
    fn advance(&mut self, _processed: usize, _total: usize) {}
    fn finish(&mut self, _processed: usize, _total: usize) {}
}

/// Reports nothing.
#[cfg(test)]
pub struct NoProgress;

#[cfg(test)]
impl ProgressReporter for NoProgress {}

/// Logs progress at every tenth of the rows.
#[derive(Default)]
pub struct LogProgress {
    last_decile: usize,
}

impl ProgressReporter for LogProgress {
    fn start(&mut self, total: usize) {
        self.last_decile = 0;
        tracing::info!("Processing {} rows", total);
    }

    fn advance(&mut self, processed: usize, total: usize) {
        if total == 0 {
            return;
        }
        let decile = processed * 10 / total;
        if decile > self.last_decile {
            self.last_decile = decile;
            tracing::info!("Progress: {}/{} rows ({}%)", processed, total, decile * 10);
        }
    }

    fn finish(&mut self, processed: usize, total: usize) {
        tracing::debug!("Processed {}/{} rows", processed, total);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub selected: usize,
    pub waitlisted: usize,
    pub not_selected: usize,
    pub disqualified: usize,
}

impl StatusCounts {
    fn record(&mut self, status: StatusCode) {
        match status {
            StatusCode::Selected => self.selected += 1,
            StatusCode::Waitlisted => self.waitlisted += 1,
            StatusCode::NotSelected => self.not_selected += 1,
            StatusCode::Disqualified => self.disqualified += 1,
        }
    }
}

/// A data row that could not be read in full.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowWarning {
    pub line: Option<usize>,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportSummary {
    pub file: Option<PathBuf>,
    pub year: i32,
    pub waitlist_folios: usize,
    pub rows_found: usize,
    pub imported: usize,
    pub created: usize,
    pub updated: usize,
    pub statuses: StatusCounts,
    pub unrecognized_status: usize,
    pub skipped_rows: Vec<RowWarning>,
    pub score_warnings: Vec<RowWarning>,
    pub institutions: usize,
    pub finished_at: Option<String>,
}

impl ImportSummary {
    /// Human-readable report printed at the end of `import`.
    pub fn render(&self) -> String {
        let mut out = String::new();
        if let Some(file) = &self.file {
            out.push_str(&format!("File: {}\n", file.display()));
        }
        out.push_str(&format!("Year: {}\n", self.year));
        out.push_str(&format!("{} applicants found on the waitlist.\n", self.waitlist_folios));
        out.push_str(&format!("{} applicants found in the general list.\n", self.rows_found));
        out.push_str(&format!(
            "Imported {} ({} new, {} updated) across {} institutions.\n",
            self.imported, self.created, self.updated, self.institutions
        ));
        out.push_str(&format!(
            "  selected: {}, waitlisted: {}, not selected: {}, disqualified: {}\n",
            self.statuses.selected,
            self.statuses.waitlisted,
            self.statuses.not_selected,
            self.statuses.disqualified
        ));
        if self.unrecognized_status > 0 {
            out.push_str(&format!("Dropped {} rows with an unrecognized status.\n", self.unrecognized_status));
        }
        for skipped in &self.skipped_rows {
            out.push_str(&format!("Skipped: {}\n", skipped.reason));
        }
        for warning in &self.score_warnings {
            out.push_str(&format!("Stored without score: {}\n", warning.reason));
        }
        out
    }
}

/// Imports one results file into `storage` inside a single transaction.
///
/// Nothing is written unless every row was handled; a storage failure rolls
/// the whole run back. Rows with an unreadable folio are skipped, rows with an
/// unreadable score are stored without one; both are listed in the summary.
pub fn import_file(
    path: &Path,
    year: i32,
    storage: &mut StorageManager,
    progress: &mut dyn ProgressReporter,
) -> Result<ImportSummary, AppError> {
    tracing::info!("Starting import for year {} from {}", year, path.display());
    let annex = AnnexFile::open(path)?;

    let mut session = storage.begin_import()?;
    let mut summary = import_annexes(&annex, year, &mut session, progress)?;
    session.commit()?;

    summary.file = Some(path.to_path_buf());
    summary.finished_at = Some(chrono::Utc::now().to_rfc3339());
    tracing::info!("Import finished: {} applicants stored", summary.imported);
    Ok(summary)
}

/// Resolves every row of the applications annex and writes it through `repo`.
pub fn import_annexes<R: ApplicantRepository>(
    annex: &AnnexFile,
    year: i32,
    repo: &mut R,
    progress: &mut dyn ProgressReporter,
) -> Result<ImportSummary, StorageError> {
    for status in StatusCode::ALL {
        repo.status_id(status)?;
    }

    let waitlist = annex.waitlist_folios();
    tracing::info!("{} applicants found on the waitlist", waitlist.len());

    let rows = annex.section_rows(APPLICATIONS_ANNEX);
    tracing::info!("{} applicants found in the general list", rows.len());

    let mut summary = ImportSummary {
        year,
        waitlist_folios: waitlist.len(),
        rows_found: rows.len(),
        ..Default::default()
    };
    let mut institutions = HashSet::new();

    let total = rows.len();
    progress.start(total);
    for (idx, row) in rows.iter().enumerate() {
        match row {
            Ok(row) => {
                if let Some(institution_id) = import_row(row, year, &waitlist, repo, &mut summary)? {
                    institutions.insert(institution_id);
                }
            }
            Err(e) => {
                tracing::warn!("Skipping row: {}", e);
                summary.skipped_rows.push(RowWarning { line: None, reason: e.to_string() });
            }
        }
        progress.advance(idx + 1, total);
    }
    progress.finish(total, total);

    summary.institutions = institutions.len();
    Ok(summary)
}

/// Returns the institution id the row was stored under, or `None` if it was dropped.
fn import_row<R: ApplicantRepository>(
    row: &RawRow,
    year: i32,
    waitlist: &WaitlistFolioSet,
    repo: &mut R,
    summary: &mut ImportSummary,
) -> Result<Option<i64>, StorageError> {
    let folio = row.folio.as_deref().and_then(parse_folio);
    let Some(status) = resolve_status(row.status_text.as_deref(), folio, waitlist) else {
        tracing::debug!("Line {}: unrecognized status {:?}, dropping", row.line, row.status_text);
        summary.unrecognized_status += 1;
        return Ok(None);
    };

    let applicant = match normalize_row(row, year, status) {
        Ok((applicant, score_warning)) => {
            if let Some(e) = score_warning {
                tracing::warn!("Storing folio {} without score: {}", applicant.folio, e);
                summary.score_warnings.push(RowWarning { line: Some(row.line), reason: e.to_string() });
            }
            applicant
        }
        Err(e) => {
            tracing::warn!("Skipping row: {}", e);
            summary.skipped_rows.push(RowWarning { line: Some(row.line), reason: e.to_string() });
            return Ok(None);
        }
    };

    let institution_id = repo.institution_id(&applicant.institution_name)?;
    let status_id = repo.status_id(applicant.status)?;
    match repo.upsert_applicant(&applicant, institution_id, status_id)? {
        UpsertOutcome::Created => summary.created += 1,
        UpsertOutcome::Updated => summary.updated += 1,
    }
    summary.imported += 1;
    summary.statuses.record(applicant.status);
    Ok(Some(institution_id))
}
