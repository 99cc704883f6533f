// src/utils/error.rs
use std::path::PathBuf;
use thiserror::Error;

// Define specific error types for different parts of the application
#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("File does not exist: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Line {line}: folio {text:?} is not an integer")]
    MalformedFolio { line: usize, text: String },

    #[error("Line {line}: score {text:?} is not a number")]
    MalformedScore { line: usize, text: String },

    #[error("Line {line}: could not split row: {message}")]
    RowParse { line: usize, message: String },
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("No applicant with folio {0}")]
    NotFound(i64),
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Extraction failed: {0}")]
    Extraction(#[from] ExtractError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
