//! Error types for template filling and batch generation.
//!
//! Unterminated placeholders and unknown keys are deliberately absent: the
//! first is literal text (logged as a warning), the second resolves to a
//! blank value. Neither stops a document from being generated.

use std::path::PathBuf;
use thiserror::Error;

/// Failure to produce one generated document.
#[derive(Debug, Error)]
pub enum FillError {
    /// The input is not a usable DOCX container.
    #[error("corrupt package: {reason}")]
    CorruptPackage { reason: String },

    /// The output container could not be assembled.
    #[error("failed to write package: {reason}")]
    WriteFailure { reason: String },

    /// The template for a batch record could not be read.
    #[error("template {} unavailable: {source}", path.display())]
    TemplateUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl FillError {
    pub fn corrupt(reason: impl Into<String>) -> Self {
        Self::CorruptPackage {
            reason: reason.into(),
        }
    }

    pub fn write_failure(reason: impl Into<String>) -> Self {
        Self::WriteFailure {
            reason: reason.into(),
        }
    }
}

impl From<crate::xml::XmlError> for FillError {
    fn from(err: crate::xml::XmlError) -> Self {
        Self::corrupt(format!("main document part: {}", err))
    }
}

/// Failure of a batch as a whole (individual records never produce these).
#[derive(Debug, Error)]
pub enum BatchError {
    /// The batch table could not be read.
    #[error("malformed batch table: {0}")]
    Table(String),

    /// A column named on the command line is missing from the table header.
    #[error("column '{0}' not found in batch table")]
    MissingColumn(String),

    /// `run` was called on a driver that already left the idle state.
    #[error("batch driver already ran")]
    AlreadyRun,

    #[error("failed to start worker pool: {0}")]
    ThreadPool(String),
}

impl From<csv::Error> for BatchError {
    fn from(err: csv::Error) -> Self {
        Self::Table(err.to_string())
    }
}
