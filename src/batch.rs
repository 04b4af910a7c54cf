//! Batch generation: one output document per input record.
//!
//! Every record owns its template bytes and its own [`Document`], so a
//! record that fails (unreadable template, corrupt package, write failure)
//! is reported against its identity without touching the others. Records
//! run sequentially or on a local rayon pool; outcomes always come back in
//! input order.
//!
//! [`Document`]: crate::document::Document

use crate::error::{BatchError, FillError};
use crate::fill::{fill, FillOptions, FilledDocument};
use crate::formatters::FieldFormats;
use csv::ReaderBuilder;
use lazy_static::lazy_static;
use rayon::prelude::*;
use regex::Regex;
use serde::Serialize;
use std::borrow::Cow;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

// ============================================================================
// Records
// ============================================================================

/// Where a record's template comes from.
#[derive(Debug, Clone)]
pub enum TemplateRef {
    /// Bytes already in memory, shared between records.
    Shared(Arc<Vec<u8>>),
    /// Read from disk when the record runs.
    Path(PathBuf),
    /// The record named no template and there is no default.
    Missing,
}

impl TemplateRef {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self::Shared(Arc::new(bytes))
    }

    fn load(&self) -> Result<Cow<'_, [u8]>, FillError> {
        match self {
            TemplateRef::Shared(bytes) => Ok(Cow::Borrowed(bytes.as_slice())),
            TemplateRef::Path(path) => fs::read(path)
                .map(Cow::Owned)
                .map_err(|source| FillError::TemplateUnavailable {
                    path: path.clone(),
                    source,
                }),
            TemplateRef::Missing => Err(FillError::TemplateUnavailable {
                path: PathBuf::new(),
                source: io::Error::new(io::ErrorKind::NotFound, "no template given for record"),
            }),
        }
    }
}

/// One row of substitution data.
#[derive(Debug, Clone)]
pub struct BatchRecord {
    /// Identity used in logs, failure reports and output file names.
    pub id: String,
    pub template: TemplateRef,
    pub values: HashMap<String, String>,
}

/// Result of one record.
#[derive(Debug)]
pub struct RecordOutcome {
    pub id: String,
    pub result: Result<FilledDocument, FillError>,
}

/// Fill a single record. Never panics on bad input; every failure is a
/// [`FillError`].
pub fn run_record(record: &BatchRecord, options: &FillOptions) -> Result<FilledDocument, FillError> {
    let template = record.template.load()?;
    fill(&template, &record.values, options)
}

// ============================================================================
// Driver
// ============================================================================

/// Configuration for a batch run.
#[derive(Debug, Clone, Default)]
pub struct BatchConfig {
    pub fill: FillOptions,
    /// Worker threads. `None` processes records one after another.
    pub threads: Option<usize>,
}

/// A failed record and a readable cause.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordFailure {
    pub id: String,
    pub error: String,
}

/// Terminal summary of a batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub succeeded: usize,
    pub failures: Vec<RecordFailure>,
}

impl BatchSummary {
    pub fn total(&self) -> usize {
        self.succeeded + self.failures.len()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchState {
    Idle,
    Running { total: usize },
    Completed(BatchSummary),
}

/// Progress information passed to the callback after each record.
#[derive(Debug, Clone, Copy)]
pub struct BatchProgress {
    pub completed: usize,
    pub total: usize,
    pub failed: usize,
}

/// Runs one batch: `Idle -> Running -> Completed`.
#[derive(Debug)]
pub struct BatchDriver {
    config: BatchConfig,
    state: BatchState,
}

impl BatchDriver {
    pub fn new(config: BatchConfig) -> Self {
        Self {
            config,
            state: BatchState::Idle,
        }
    }

    pub fn state(&self) -> &BatchState {
        &self.state
    }

    /// The summary, once the batch completed.
    pub fn summary(&self) -> Option<&BatchSummary> {
        match &self.state {
            BatchState::Completed(summary) => Some(summary),
            _ => None,
        }
    }

    pub fn run(&mut self, records: &[BatchRecord]) -> Result<Vec<RecordOutcome>, BatchError> {
        self.run_with_progress(records, |_| {})
    }

    /// Process every record, calling `on_progress` after each one (from
    /// worker threads when running in parallel).
    pub fn run_with_progress<F>(
        &mut self,
        records: &[BatchRecord],
        on_progress: F,
    ) -> Result<Vec<RecordOutcome>, BatchError>
    where
        F: Fn(&BatchProgress) + Sync,
    {
        if self.state != BatchState::Idle {
            return Err(BatchError::AlreadyRun);
        }

        let pool = match self.config.threads {
            Some(n) => Some(
                rayon::ThreadPoolBuilder::new()
                    .num_threads(n)
                    .build()
                    .map_err(|e| BatchError::ThreadPool(e.to_string()))?,
            ),
            None => None,
        };

        let total = records.len();
        self.state = BatchState::Running { total };
        log::info!("Generating {} documents", total);

        let completed = AtomicUsize::new(0);
        let failed = AtomicUsize::new(0);
        let options = &self.config.fill;

        let process = |record: &BatchRecord| {
            let result = run_record(record, options);
            if let Err(e) = &result {
                failed.fetch_add(1, Ordering::Relaxed);
                log::warn!("Record {}: {}", record.id, e);
            }
            let count = completed.fetch_add(1, Ordering::Relaxed) + 1;
            on_progress(&BatchProgress {
                completed: count,
                total,
                failed: failed.load(Ordering::Relaxed),
            });
            RecordOutcome {
                id: record.id.clone(),
                result,
            }
        };

        let outcomes: Vec<RecordOutcome> = match pool {
            Some(pool) => pool.install(|| records.par_iter().map(process).collect()),
            None => records.iter().map(process).collect(),
        };

        let summary = summarize(&outcomes);
        log::info!(
            "Batch complete: {} succeeded, {} failed",
            summary.succeeded,
            summary.failures.len()
        );
        self.state = BatchState::Completed(summary);
        Ok(outcomes)
    }
}

fn summarize(outcomes: &[RecordOutcome]) -> BatchSummary {
    let mut summary = BatchSummary::default();
    for outcome in outcomes {
        match &outcome.result {
            Ok(_) => summary.succeeded += 1,
            Err(e) => summary.failures.push(RecordFailure {
                id: outcome.id.clone(),
                error: e.to_string(),
            }),
        }
    }
    summary
}

// ============================================================================
// CSV input
// ============================================================================

/// How to read a batch table.
#[derive(Debug, Clone)]
pub struct TableLayout {
    /// Template for rows that do not name their own.
    pub default_template: TemplateRef,
    /// Column holding the record identity. Rows without one are `row N`.
    pub id_column: Option<String>,
    /// Column holding a per-row template file name.
    pub template_column: Option<String>,
    /// Directory that per-row template names are resolved against.
    pub template_dir: Option<PathBuf>,
    /// Date and name formatting applied to each row's values.
    pub formats: Option<FieldFormats>,
}

impl TableLayout {
    pub fn new(default_template: TemplateRef) -> Self {
        Self {
            default_template,
            id_column: None,
            template_column: None,
            template_dir: None,
            formats: None,
        }
    }
}

fn column_index(headers: &[String], name: &Option<String>) -> Result<Option<usize>, BatchError> {
    match name {
        Some(name) => headers
            .iter()
            .position(|h| h == name)
            .map(Some)
            .ok_or_else(|| BatchError::MissingColumn(name.clone())),
        None => Ok(None),
    }
}

/// Read batch records from CSV. Headers are placeholder keys; every column
/// except the template column becomes a value, trimmed. Short rows are
/// accepted and their missing columns are simply absent.
pub fn load_records<R: Read>(reader: R, layout: &TableLayout) -> Result<Vec<BatchRecord>, BatchError> {
    let mut reader = ReaderBuilder::new().flexible(true).from_reader(reader);
    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .enumerate()
        .map(|(i, h)| {
            let h = if i == 0 { h.trim_start_matches('\u{feff}') } else { h };
            h.trim().to_string()
        })
        .collect();

    let id_idx = column_index(&headers, &layout.id_column)?;
    let template_idx = column_index(&headers, &layout.template_column)?;

    let mut records = Vec::new();
    for (row, result) in reader.records().enumerate() {
        let row = row + 1;
        let fields = result.map_err(|e| BatchError::Table(format!("row {}: {}", row, e)))?;

        let mut values: HashMap<String, String> = headers
            .iter()
            .zip(fields.iter())
            .enumerate()
            .filter(|(i, _)| Some(*i) != template_idx)
            .map(|(_, (key, value))| (key.clone(), value.trim().to_string()))
            .collect();
        if let Some(formats) = &layout.formats {
            formats.apply(&mut values);
        }

        let id = id_idx
            .and_then(|i| fields.get(i))
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("row {}", row));

        let template = match template_idx.and_then(|i| fields.get(i)).map(str::trim) {
            Some(name) if !name.is_empty() => TemplateRef::Path(match &layout.template_dir {
                Some(dir) => dir.join(name),
                None => PathBuf::from(name),
            }),
            _ => layout.default_template.clone(),
        };

        records.push(BatchRecord {
            id,
            template,
            values,
        });
    }
    Ok(records)
}

// ============================================================================
// Output
// ============================================================================

lazy_static! {
    static ref UNSAFE_FILE_CHARS: Regex = Regex::new(r#"[<>:"/\\|?*\x00-\x1f]+"#).unwrap();
}

/// Turn a record identity into something usable as a file stem.
pub fn sanitize_file_stem(id: &str) -> String {
    let cleaned = UNSAFE_FILE_CHARS.replace_all(id.trim(), "_");
    let cleaned = cleaned.trim_matches(|c: char| c == '.' || c.is_whitespace());
    if cleaned.is_empty() {
        "document".to_string()
    } else {
        cleaned.to_string()
    }
}

/// Assigns distinct `.docx` file names to record identities.
#[derive(Debug, Default)]
pub struct OutputNames {
    used: HashSet<String>,
}

impl OutputNames {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&mut self, id: &str) -> String {
        let stem = sanitize_file_stem(id);
        let mut name = format!("{}.docx", stem);
        let mut n = 2;
        while !self.used.insert(name.to_lowercase()) {
            name = format!("{}-{}.docx", stem, n);
            n += 1;
        }
        name
    }
}

/// Write a generated document so that `path` either holds the complete
/// output or does not exist.
pub fn write_output(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut partial = path.as_os_str().to_owned();
    partial.push(".part");
    let partial = PathBuf::from(partial);

    if let Err(e) = fs::write(&partial, bytes).and_then(|_| fs::rename(&partial, path)) {
        let _ = fs::remove_file(&partial);
        return Err(e);
    }
    Ok(())
}

/// Write the failed records of a batch as CSV (`id,error`).
pub fn write_failure_report(path: &Path, summary: &BatchSummary) -> csv::Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    if summary.failures.is_empty() {
        writer.write_record(["id", "error"])?;
    }
    for failure in &summary.failures {
        writer.serialize(failure)?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formatters::{DateFormat, NameFormat};

    fn layout() -> TableLayout {
        TableLayout::new(TemplateRef::from_bytes(b"tpl".to_vec()))
    }

    #[test]
    fn test_load_records_uses_headers_as_keys() {
        let csv = "\u{feff}Name,Sub_No\nAda,S-1\nGrace\n";
        let records = load_records(csv.as_bytes(), &layout()).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id, "row 1");
        assert_eq!(records[0].values["Name"], "Ada");
        assert_eq!(records[0].values["Sub_No"], "S-1");
        assert_eq!(records[1].values.get("Sub_No"), None);
        assert!(matches!(records[1].template, TemplateRef::Shared(_)));
    }

    #[test]
    fn test_id_and_template_columns() {
        let mut layout = layout();
        layout.id_column = Some("Sub_No".into());
        layout.template_column = Some("Template".into());
        layout.template_dir = Some(PathBuf::from("tpl"));

        let csv = "Sub_No,Template,Name\nS-1,letter.docx,Ada\n,,Grace\n";
        let records = load_records(csv.as_bytes(), &layout).unwrap();
        assert_eq!(records[0].id, "S-1");
        assert!(!records[0].values.contains_key("Template"));
        assert_eq!(records[0].values["Sub_No"], "S-1");
        match &records[0].template {
            TemplateRef::Path(p) => assert_eq!(p, &Path::new("tpl").join("letter.docx")),
            other => panic!("unexpected template {:?}", other),
        }
        assert_eq!(records[1].id, "row 2");
        assert!(matches!(records[1].template, TemplateRef::Shared(_)));
    }

    #[test]
    fn test_cells_trimmed_and_formatted() {
        let csv = "Name,Reviewer_Name,Sent_Date\n  Ada  ,Dr. Grace Hopper,\n";
        let plain = load_records(csv.as_bytes(), &layout()).unwrap();
        assert_eq!(plain[0].values["Name"], "Ada");
        assert_eq!(plain[0].values["Reviewer_Name"], "Dr. Grace Hopper");
        assert_eq!(plain[0].values["Sent_Date"], "");

        let mut layout = layout();
        let today = chrono::NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
        layout.formats = Some(
            FieldFormats::new(DateFormat::MonthDYyyy, NameFormat::MrMsLast).with_today(today),
        );
        let formatted = load_records(csv.as_bytes(), &layout).unwrap();
        assert_eq!(formatted[0].values["Name"], "Mr./Ms. Ada");
        assert_eq!(formatted[0].values["Reviewer_Name"], "Dr. Hopper");
        assert_eq!(formatted[0].values["Sent_Date"], "March 5, 2024");
    }

    #[test]
    fn test_missing_column_is_batch_error() {
        let mut layout = layout();
        layout.id_column = Some("Id".into());
        let err = load_records("Name\nAda\n".as_bytes(), &layout).unwrap_err();
        assert!(matches!(err, BatchError::MissingColumn(ref c) if c == "Id"));
    }

    #[test]
    fn test_output_names_are_sanitized_and_unique() {
        let mut names = OutputNames::new();
        assert_eq!(names.next("S-1"), "S-1.docx");
        assert_eq!(names.next("a/b:c"), "a_b_c.docx");
        assert_eq!(names.next("S-1"), "S-1-2.docx");
        assert_eq!(names.next("s-1"), "s-1-3.docx");
        assert_eq!(names.next("  ..  "), "document.docx");
    }

    #[test]
    fn test_driver_rejects_second_run() {
        let mut driver = BatchDriver::new(BatchConfig::default());
        assert_eq!(driver.state(), &BatchState::Idle);
        let outcomes = driver.run(&[]).unwrap();
        assert!(outcomes.is_empty());
        assert_eq!(driver.summary(), Some(&BatchSummary::default()));
        assert!(matches!(driver.run(&[]), Err(BatchError::AlreadyRun)));
    }

    #[test]
    fn test_missing_template_fails_only_that_record() {
        let record = BatchRecord {
            id: "x".into(),
            template: TemplateRef::Missing,
            values: HashMap::new(),
        };
        let err = run_record(&record, &FillOptions::default()).unwrap_err();
        assert!(matches!(err, FillError::TemplateUnavailable { .. }));
    }
}
