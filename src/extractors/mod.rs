// src/extractors/mod.rs
pub mod annex;
pub mod record;
pub mod status;

// Re-export key extraction types for convenience
pub use annex::{AnnexFile, RawRow, WaitlistFolioSet, APPLICATIONS_ANNEX};
pub use record::{normalize_row, parse_folio, ResolvedApplicant};
pub use status::{resolve_status, StatusCode};
