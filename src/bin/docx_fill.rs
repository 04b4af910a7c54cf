//! Fill `«Key»` placeholders in DOCX templates.
//!
//! Usage:
//!   docx-fill placeholders --template letter.docx
//!   docx-fill fill --template letter.docx --set Name=Ada [--values v.txt] -o out.docx
//!   docx-fill batch --template letter.docx --input rows.csv --output-dir out/ \
//!     [--id-column Sub_No] [--template-column Template] [--failures failed.csv] \
//!     [--date-format month_d_yyyy] [--name-format last_first]
//!
//! `batch` exits non-zero when any record failed.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use docx_fill::batch::{
    load_records, write_failure_report, write_output, BatchConfig, BatchDriver, BatchSummary,
    OutputNames, RecordFailure, TableLayout, TemplateRef,
};
use docx_fill::fill::{fill, list_placeholders, FillOptions, UnknownKeys};
use docx_fill::formatters::{DateFormat, FieldFormats, NameFormat};
use docx_fill::prune::ListPruning;
use docx_fill::values::{load_value_file, parse_assignment};
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "docx-fill")]
#[command(about = "Fill «Key» placeholders in DOCX templates")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the placeholder keys used in a template
    Placeholders {
        /// Template DOCX
        #[arg(short, long)]
        template: PathBuf,
    },

    /// Fill one template and write one document
    Fill {
        /// Template DOCX
        #[arg(short, long)]
        template: PathBuf,

        /// Output DOCX
        #[arg(short, long)]
        output: PathBuf,

        /// Value file (one Key=Value per line, # comments)
        #[arg(long)]
        values: Option<PathBuf>,

        /// Single value, overrides the value file (repeatable)
        #[arg(short, long = "set", value_name = "KEY=VALUE")]
        set: Vec<String>,

        #[command(flatten)]
        flags: FillFlags,
    },

    /// Generate one document per CSV row (headers are keys)
    Batch {
        /// Template DOCX for rows that do not name their own
        #[arg(short, long)]
        template: Option<PathBuf>,

        /// Input CSV
        #[arg(short, long)]
        input: PathBuf,

        /// Directory for generated documents
        #[arg(short, long)]
        output_dir: PathBuf,

        /// Column used as record identity and output file name
        #[arg(long)]
        id_column: Option<String>,

        /// Column naming a per-row template file
        #[arg(long)]
        template_column: Option<String>,

        /// Directory per-row template names are relative to
        #[arg(long)]
        template_dir: Option<PathBuf>,

        /// Write failed records to this CSV (id,error)
        #[arg(long)]
        failures: Option<PathBuf>,

        /// Number of worker threads (default: one record at a time)
        #[arg(long, env = "DOCX_FILL_THREADS")]
        threads: Option<usize>,

        /// Fill empty *date* columns with today's date: mdy_slash, month_d_yyyy, iso
        #[arg(long)]
        date_format: Option<DateFormat>,

        /// Rewrite *name* columns: first_last, last_first, mrms_last
        #[arg(long)]
        name_format: Option<NameFormat>,

        #[command(flatten)]
        flags: FillFlags,
    },
}

#[derive(Args)]
struct FillFlags {
    /// Leave placeholders without a value as literal «Key» text
    #[arg(long)]
    keep_unknown: bool,

    /// Do not remove paragraphs emptied by substitution
    #[arg(long)]
    no_prune: bool,

    /// Which empty list items may be removed
    #[arg(long, value_enum, default_value_t = ListScope::Placeholders)]
    list_scope: ListScope,
}

#[derive(Clone, Copy, ValueEnum)]
enum ListScope {
    /// Only list items that held placeholders
    Placeholders,
    /// Every list item left empty, including empty items in the template
    All,
}

impl FillFlags {
    fn options(&self) -> FillOptions {
        let mut options = FillOptions::default();
        if self.keep_unknown {
            options.unknown_keys = UnknownKeys::KeepLiteral;
        }
        if self.no_prune {
            options = options.without_pruning();
        }
        options.with_list_pruning(match self.list_scope {
            ListScope::All => ListPruning::AllListItems,
            ListScope::Placeholders => ListPruning::PlaceholderParagraphs,
        })
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    run(&cli)
}

fn run(cli: &Cli) -> Result<()> {
    match &cli.command {
        Commands::Placeholders { template } => {
            let bytes = read_template(template)?;
            for key in list_placeholders(&bytes)
                .with_context(|| format!("Failed to read {}", template.display()))?
            {
                println!("{}", key);
            }
            Ok(())
        }
        Commands::Fill {
            template,
            output,
            values,
            set,
            flags,
        } => fill_one(template, output, values.as_ref(), set, flags),
        Commands::Batch {
            template,
            input,
            output_dir,
            id_column,
            template_column,
            template_dir,
            failures,
            threads,
            date_format,
            name_format,
            flags,
        } => {
            if template.is_none() && template_column.is_none() {
                bail!("batch needs --template, --template-column, or both");
            }
            let mut layout = TableLayout::new(match template {
                Some(path) => TemplateRef::from_bytes(read_template(path)?),
                None => TemplateRef::Missing,
            });
            layout.id_column = id_column.clone();
            layout.template_column = template_column.clone();
            layout.template_dir = template_dir.clone();
            if date_format.is_some() || name_format.is_some() {
                layout.formats = Some(FieldFormats::new(
                    date_format.unwrap_or_default(),
                    name_format.unwrap_or_default(),
                ));
            }

            let config = BatchConfig {
                fill: flags.options(),
                threads: *threads,
            };
            run_batch(input, output_dir, failures.as_ref(), &layout, config)
        }
    }
}

fn read_template(path: &PathBuf) -> Result<Vec<u8>> {
    fs::read(path).with_context(|| format!("Failed to read template: {}", path.display()))
}

fn fill_one(
    template: &PathBuf,
    output: &PathBuf,
    values_path: Option<&PathBuf>,
    set: &[String],
    flags: &FillFlags,
) -> Result<()> {
    let mut values: HashMap<String, String> = match values_path {
        Some(path) => load_value_file(path)?,
        None => HashMap::new(),
    };
    for assignment in set {
        let (key, value) = parse_assignment(assignment).context("Invalid --set")?;
        values.insert(key, value);
    }

    let bytes = read_template(template)?;
    let filled = fill(&bytes, &values, &flags.options())
        .with_context(|| format!("Failed to fill {}", template.display()))?;
    write_output(output, &filled.bytes)
        .with_context(|| format!("Failed to write {}", output.display()))?;

    let report = &filled.report;
    eprintln!(
        "Wrote {} ({} substitutions, {} paragraphs pruned)",
        output.display(),
        report.substitutions,
        report.pruned
    );
    if !report.unknown_keys.is_empty() {
        let keys: Vec<&str> = report.unknown_keys.iter().map(String::as_str).collect();
        eprintln!("  No value for: {}", keys.join(", "));
    }
    if report.unterminated > 0 {
        eprintln!("  {} unterminated « left as text", report.unterminated);
    }
    Ok(())
}

fn run_batch(
    input: &PathBuf,
    output_dir: &PathBuf,
    failures_path: Option<&PathBuf>,
    layout: &TableLayout,
    config: BatchConfig,
) -> Result<()> {
    let file = File::open(input).with_context(|| format!("Failed to open {}", input.display()))?;
    let records = load_records(file, layout)
        .with_context(|| format!("Failed to load records from {}", input.display()))?;
    if records.is_empty() {
        eprintln!("Nothing to do!");
        return Ok(());
    }
    fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create {}", output_dir.display()))?;

    let mut driver = BatchDriver::new(config);
    let outcomes = driver.run_with_progress(&records, |p| {
        if p.completed % 10 == 0 || p.completed == p.total {
            eprint!("\r[{}/{}] Generating... ({} errors)    ", p.completed, p.total, p.failed);
            std::io::stderr().flush().ok();
        }
    })?;
    eprintln!();

    let mut names = OutputNames::new();
    let mut written = 0usize;
    let mut write_errors = Vec::new();
    for outcome in outcomes {
        let Ok(filled) = outcome.result else { continue };
        let path = output_dir.join(names.next(&outcome.id));
        match write_output(&path, &filled.bytes) {
            Ok(()) => written += 1,
            Err(e) => {
                log::warn!("Record {}: failed to write {}: {}", outcome.id, path.display(), e);
                write_errors.push((outcome.id, e.to_string()));
            }
        }
    }

    let mut summary = driver
        .summary()
        .cloned()
        .context("Batch did not complete")?;
    for (id, error) in write_errors {
        summary.succeeded -= 1;
        summary.failures.push(RecordFailure {
            id,
            error: format!("write failed: {}", error),
        });
    }

    eprintln!(
        "Done! Wrote {} of {} documents to {}",
        written,
        summary.total(),
        output_dir.display()
    );
    for failure in &summary.failures {
        eprintln!("  FAILED {}: {}", failure.id, failure.error);
    }
    if let Some(path) = failures_path {
        write_failure_report(path, &summary)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        eprintln!("Failure report written to: {}", path.display());
    }
    ensure_all_succeeded(&summary)
}

fn ensure_all_succeeded(summary: &BatchSummary) -> Result<()> {
    if !summary.failures.is_empty() {
        bail!(
            "{} of {} records failed",
            summary.failures.len(),
            summary.total()
        );
    }
    Ok(())
}
