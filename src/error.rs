//! Error and issue types shared by the extraction and injection pipeline.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// No encoding candidate decoded the whole file.
    #[error("unreadable file: {}", path.display())]
    UnreadableFile { path: PathBuf },

    /// An opening quote with no matching close before the end of the line.
    #[error("{file}:{line}: quote opened at column {column} is never closed")]
    MalformedQuoting {
        file: String,
        line: usize,
        column: usize,
    },

    #[error("duplicate id {id}, renamed to {resolved}")]
    DuplicateId { id: String, resolved: String },

    #[error("translation {id} in {file} has no current source line")]
    OrphanedTranslationId { id: String, file: String },

    #[error("project path missing: {}", path.display())]
    MissingProjectPaths { path: PathBuf },

    #[error("project already exists: {}", path.display())]
    ProjectExists { path: PathBuf },

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("invalid record data: {0}")]
    Format(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    UnreadableFile,
    MalformedQuoting,
    DuplicateId,
    OrphanedTranslationId,
    MissingProjectPaths,
    Other,
}

/// A recovered error, reported back to the caller with enough location
/// data to fix the source material.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Issue {
    pub kind: IssueKind,

    #[serde(default)]
    pub file: String,

    #[serde(default)]
    pub line: Option<usize>,

    pub message: String,
}

impl Error {
    pub fn kind(&self) -> IssueKind {
        match self {
            Error::UnreadableFile { .. } => IssueKind::UnreadableFile,
            Error::MalformedQuoting { .. } => IssueKind::MalformedQuoting,
            Error::DuplicateId { .. } => IssueKind::DuplicateId,
            Error::OrphanedTranslationId { .. } => IssueKind::OrphanedTranslationId,
            Error::MissingProjectPaths { .. } => IssueKind::MissingProjectPaths,
            _ => IssueKind::Other,
        }
    }

    /// Converts a recovered error into a report entry for `file`.
    pub fn to_issue(&self, file: &str, line: Option<usize>) -> Issue {
        let line = match self {
            Error::MalformedQuoting { line, .. } => Some(*line),
            _ => line,
        };

        Issue {
            kind: self.kind(),
            file: file.to_string(),
            line,
            message: self.to_string(),
        }
    }
}
