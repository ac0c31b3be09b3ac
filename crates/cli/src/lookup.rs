//! `fuzzylookup match` / `fuzzylookup run`: load both tables, match the key
//! columns, write the annotated target.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use clap::Args;
use serde::Serialize;

use fuzzylookup_io::{report, LoadOptions, ReportOptions, Table};
use fuzzylookup_matcher::config::SourceConfig;
use fuzzylookup_matcher::key::KeyDefect;
use fuzzylookup_matcher::{
    match_keys_with, Blocking, CancelToken, KeySet, LookupConfig, MatchDecision, MatchError,
    MatchOptions, MatchSummary, Metric, Normalization, Scalar, Threshold,
};

use crate::exit_codes::{EXIT_INVALID_INPUT, EXIT_USAGE};
use crate::CliError;

/// Output flags shared by `match` and `run`.
#[derive(Args, Debug, Clone, Default)]
pub struct RunFlags {
    /// Report file (.csv, .tsv or .xlsx). Default: "<target> - matched.<ext>"
    #[arg(long, short = 'o')]
    pub output: Option<PathBuf>,

    /// Print the run summary and per-row decisions as JSON to stdout
    #[arg(long)]
    pub json: bool,

    /// Open the report with the system default application
    #[arg(long)]
    pub open: bool,

    /// Give up after this many seconds (exit 6)
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Suppress the stderr summary
    #[arg(long, short = 'q')]
    pub quiet: bool,
}

#[derive(Serialize)]
struct RunOutput<'a> {
    name: &'a str,
    run_at: String,
    target: String,
    reference: String,
    output: String,
    metric: Metric,
    threshold: Threshold,
    blocking: Blocking,
    normalization: Normalization,
    summary: &'a MatchSummary,
    elapsed_ms: u128,
    decisions: &'a [MatchDecision],
}

/// Run a validated config. Relative file paths resolve against `base_dir`.
pub fn execute(config: &LookupConfig, base_dir: &Path, flags: &RunFlags) -> Result<(), CliError> {
    let metric = config.metric()?;
    let threshold = config.threshold()?;
    let review_floor = config.review_floor()?;

    let target_path = base_dir.join(&config.target.file);
    let reference_path = base_dir.join(&config.reference.file);

    let target = load_source(&target_path, &config.target)?;
    let reference = load_source(&reference_path, &config.reference)?;

    let target_col = key_column(&target, &config.target, &target_path)?;
    let reference_col = key_column(&reference, &config.reference, &reference_path)?;
    let reference_values = reference.column(reference_col);

    let target_keys = extract_keys(&target, target_col, config.normalization, &target_path)?;
    let reference_keys =
        extract_keys(&reference, reference_col, config.normalization, &reference_path)?;

    let cancel = CancelToken::new();
    match flags.timeout {
        Some(0) => cancel.cancel(),
        Some(secs) => {
            let token = cancel.clone();
            std::thread::spawn(move || {
                std::thread::sleep(Duration::from_secs(secs));
                token.cancel();
            });
        }
        None => {}
    }
    let options = MatchOptions {
        blocking: config.matching.blocking,
        parallel: true,
        cancel: Some(cancel),
    };

    log::info!(
        "matching {} target keys against {} reference keys ({}, threshold {})",
        target_keys.len(),
        reference_keys.len(),
        metric,
        threshold
    );
    let started = Instant::now();
    let decisions = match_keys_with(&target_keys, &reference_keys, threshold, &metric, &options)
        .map_err(|e| match e {
            MatchError::Cancelled => CliError::from(e).with_hint(match flags.timeout {
                Some(secs) => format!("no result within {secs}s; raise --timeout or try --blocking length"),
                None => "matching was cancelled".to_string(),
            }),
            other => CliError::from(other),
        })?;
    let elapsed = started.elapsed();
    let summary = MatchSummary::from_decisions(&decisions, reference_keys.len(), review_floor);

    let report_options = ReportOptions {
        label_column: config.output.label_column.clone(),
        labels: config.output.labels(),
        include_scores: config.output.include_scores,
    };
    let annotated = report::build(&target, &decisions, &reference_values, &report_options)
        .map_err(CliError::eval)?;

    let output_path = flags
        .output
        .clone()
        .or_else(|| config.output.file.as_ref().map(|f| base_dir.join(f)))
        .unwrap_or_else(|| fuzzylookup_io::default_output_path(&target_path));
    fuzzylookup_io::save(&annotated, &output_path).map_err(|e| {
        CliError::io(format!("cannot write {}: {}", output_path.display(), e))
            .with_hint("use --output with a .csv, .tsv or .xlsx path")
    })?;

    if flags.json {
        let out = RunOutput {
            name: &config.name,
            run_at: chrono::Local::now().to_rfc3339(),
            target: target_path.display().to_string(),
            reference: reference_path.display().to_string(),
            output: output_path.display().to_string(),
            metric,
            threshold,
            blocking: config.matching.blocking,
            normalization: config.normalization,
            summary: &summary,
            elapsed_ms: elapsed.as_millis(),
            decisions: &decisions,
        };
        let json = serde_json::to_string_pretty(&out)
            .map_err(|e| CliError::eval(format!("JSON serialization error: {e}")))?;
        println!("{json}");
    }

    if !flags.quiet {
        let title = if config.name.is_empty() { "lookup" } else { config.name.as_str() };
        eprintln!(
            "{}: {} of {} target rows found in {} reference rows, {} not found ({} ms)",
            title,
            summary.matched,
            summary.targets,
            summary.references,
            summary.unmatched,
            elapsed.as_millis()
        );
        if let (Some(near), Some(floor)) = (summary.near_misses, review_floor) {
            eprintln!("  {near} near misses (not found, best score {floor} or more)");
        }
        eprintln!("wrote {}", output_path.display());
    }

    if flags.open {
        open::that(&output_path)
            .map_err(|e| CliError::io(format!("cannot open {}: {e}", output_path.display())))?;
    }

    Ok(())
}

pub fn load_source(path: &Path, source: &SourceConfig) -> Result<Table, CliError> {
    load_table(path, source.header_row, source.sheet.clone())
}

pub fn load_table(path: &Path, header_row: usize, sheet: Option<String>) -> Result<Table, CliError> {
    if !path.is_file() {
        return Err(CliError::io(format!("{}: file not found", path.display())));
    }
    fuzzylookup_io::Format::from_path(path).map_err(|e| {
        CliError::args(format!("{}: {}", path.display(), e))
    })?;
    fuzzylookup_io::load(path, &LoadOptions { header_row, sheet }).map_err(CliError::parse)
}

fn key_column(table: &Table, source: &SourceConfig, path: &Path) -> Result<usize, CliError> {
    table.resolve_column(&source.key_column).map_err(|e| match e {
        MatchError::MissingColumn { column, available } => CliError {
            code: EXIT_USAGE,
            message: format!("{}: unknown column: {:?}", path.display(), column),
            hint: Some(format!("available columns: {}", available.join(", "))),
        },
        other => CliError::from(other),
    })
}

fn extract_keys(
    table: &Table,
    col: usize,
    policy: Normalization,
    path: &Path,
) -> Result<KeySet, CliError> {
    let values: Vec<Scalar> = table.column(col);
    KeySet::extract(&values, policy).map_err(|e| match e {
        MatchError::InvalidKey { index, value, defect } => {
            let err = CliError {
                code: EXIT_INVALID_INPUT,
                message: format!(
                    "{}: column {:?}, data row {}: {:?} cannot be used as a key ({})",
                    path.display(),
                    table.headers[col],
                    index + 1,
                    value,
                    defect
                ),
                hint: None,
            };
            match defect {
                KeyDefect::Empty => err.with_hint("fill the blank cell, or allow empty keys (--allow-empty)"),
                KeyDefect::NonText(_) => err.with_hint("convert the key column to text"),
                _ => err,
            }
        }
        other => CliError::from(other),
    })
}
