//! docx-fill
//!
//! Fills `«Key»` placeholders in DOCX templates, even when Word has split a
//! placeholder across several formatting runs, then prunes the paragraphs
//! and list items that substitution left empty.
//!
//! This library provides:
//! - `package`: zip container reader/writer; untouched parts are copied raw
//! - `xml`: lossless XML arena for the main document part
//! - `tokenizer`: logical paragraph text with a per-character run mapping
//! - `scanner`: placeholder scanning over logical text
//! - `substitute`: run-level replacement of matched spans
//! - `prune`: structural removal of emptied paragraphs and list items
//! - `fill`: the per-document pipeline
//! - `batch`: one document per CSV record, failures isolated per record
//! - `formatters`: date and name formatting for batch columns
//!
//! Binaries:
//! - `docx-fill`: list placeholders, fill one template, or run a batch

pub mod batch;
pub mod document;
pub mod error;
pub mod fill;
pub mod formatters;
pub mod package;
pub mod prune;
pub mod scanner;
pub mod substitute;
pub mod tokenizer;
pub mod values;
pub mod xml;

pub use batch::{BatchConfig, BatchDriver, BatchRecord, BatchState, BatchSummary, TemplateRef};
pub use document::{Document, Paragraph};
pub use error::{BatchError, FillError};
pub use fill::{fill, fill_document, list_placeholders, FillOptions, FillReport, FilledDocument, UnknownKeys};
pub use formatters::{DateFormat, FieldFormats, NameFormat};
pub use prune::ListPruning;
pub use substitute::{FieldSource, FieldValue};
