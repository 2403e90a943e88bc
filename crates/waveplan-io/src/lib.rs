//! # waveplan-io
//!
//! Boundary formats for waveplan:
//! - JSON project files (configuration + developers + features + stories)
//! - Tabular backlog import with column-alias detection and row validation
//! - 13-column backlog export as XLSX or CSV

use thiserror::Error;
use waveplan_core::PlanError;

pub mod export;
pub mod import;
pub mod project;

pub use import::{ImportOutcome, ImportStats, ImportedStory};
pub use project::ProjectFile;

/// Boundary-layer error.
#[derive(Debug, Error)]
pub enum IoError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("xlsx error: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),

    #[error("required column missing: {0}")]
    MissingColumn(String),

    #[error(transparent)]
    Plan(#[from] PlanError),
}
