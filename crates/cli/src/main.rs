// fuzzylookup CLI - mark which rows of one table appear in another

mod exit_codes;
mod lookup;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;

use fuzzylookup_matcher::config::{MatchingConfig, OutputConfig, SourceConfig};
use fuzzylookup_matcher::{
    col_letter, Blocking, CaseFold, LookupConfig, MatchError, Metric, Normalization, Scorer,
};

use exit_codes::{match_exit_code, EXIT_ERROR, EXIT_IO, EXIT_PARSE, EXIT_SUCCESS, EXIT_USAGE};
use lookup::RunFlags;

#[derive(Parser)]
#[command(name = "fuzzylookup")]
#[command(about = "Mark which rows of one table appear in another, tolerating typos and formatting drift")]
#[command(long_version = long_version())]
#[command(version)]
struct Cli {
    /// More logging on stderr (-v info, -vv debug). RUST_LOG overrides.
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Label each TARGET row by whether its key appears in REFERENCE
    #[command(after_help = "\
Examples:
  fuzzylookup match weekly.xlsx scan.xlsx --target-key number --reference-key matched_job --threshold 90
  fuzzylookup match jobs.csv scan.csv --target-key A --reference-key 2 --threshold 100 -o found.csv
  fuzzylookup match weekly.xlsx scan.xlsx --target-key number --reference-key matched_job \\
      --threshold 85 --metric token_sort --with-scores --review-floor 70 --open")]
    Match {
        /// File whose rows get labelled
        target: PathBuf,

        /// File the keys are looked up in
        reference: PathBuf,

        /// Key column in TARGET: header name, column letter, or 1-indexed number
        #[arg(long, value_name = "COL")]
        target_key: String,

        /// Key column in REFERENCE: header name, column letter, or 1-indexed number
        #[arg(long, value_name = "COL")]
        reference_key: String,

        /// Minimum score (0-100) to count as found. 100 means exact after normalization
        #[arg(long, allow_negative_numbers = true)]
        threshold: i64,

        /// Similarity metric: levenshtein, indel, token_sort, token_set, exact
        #[arg(long, default_value = "levenshtein")]
        metric: String,

        /// 1-indexed header row in TARGET (and REFERENCE unless overridden)
        #[arg(long, default_value_t = 1)]
        header_row: usize,

        /// 1-indexed header row in REFERENCE
        #[arg(long)]
        reference_header_row: Option<usize>,

        /// Sheet in TARGET (Excel only; default first sheet)
        #[arg(long)]
        sheet: Option<String>,

        /// Sheet in REFERENCE (Excel only; default first sheet)
        #[arg(long)]
        reference_sheet: Option<String>,

        /// Case folding applied to both key columns
        #[arg(long, value_enum, default_value = "lower")]
        case: CaseArg,

        /// Keep leading/trailing whitespace (implies --keep-whitespace)
        #[arg(long)]
        no_trim: bool,

        /// Keep internal whitespace runs instead of collapsing them
        #[arg(long)]
        keep_whitespace: bool,

        /// Accept blank keys instead of failing
        #[arg(long)]
        allow_empty: bool,

        /// Skip reference keys whose length rules them out
        #[arg(long, value_enum, default_value = "none")]
        blocking: BlockingArg,

        /// Header of the label column added to TARGET
        #[arg(long, default_value = "On Scan")]
        label_column: String,

        /// Label for found rows
        #[arg(long, default_value = "Yes")]
        matched_label: String,

        /// Label for rows not found
        #[arg(long, default_value = "No")]
        unmatched_label: String,

        /// Add "Best Score" and "Best Match" columns
        #[arg(long)]
        with_scores: bool,

        /// Count rows not found but scoring at least this as near misses
        #[arg(long, value_name = "N", allow_negative_numbers = true)]
        review_floor: Option<i64>,

        #[command(flatten)]
        flags: RunFlags,
    },

    /// Run a lookup described by a TOML config file
    #[command(after_help = "\
Examples:
  fuzzylookup run weekly.lookup.toml
  fuzzylookup run weekly.lookup.toml --json > run.json
  fuzzylookup run weekly.lookup.toml -o report.xlsx --open

File paths in the config resolve relative to the config file.")]
    Run {
        /// Path to the .lookup.toml config
        config: PathBuf,

        #[command(flatten)]
        flags: RunFlags,
    },

    /// Check a config file without reading any data
    #[command(after_help = "\
Examples:
  fuzzylookup validate weekly.lookup.toml")]
    Validate {
        /// Path to the .lookup.toml config
        config: PathBuf,
    },

    /// List the columns of a file with their letters and a sample value
    #[command(after_help = "\
Examples:
  fuzzylookup columns weekly.xlsx
  fuzzylookup columns weekly.xlsx --sheet Jobs --header-row 3
  fuzzylookup columns scan.csv --json")]
    Columns {
        file: PathBuf,

        /// 1-indexed header row
        #[arg(long, default_value_t = 1)]
        header_row: usize,

        /// Sheet name (Excel only)
        #[arg(long)]
        sheet: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Score two strings with a metric
    #[command(after_help = "\
Examples:
  fuzzylookup score 'Acme Corp' 'ACME  corp.'
  fuzzylookup score 'corp acme' 'Acme Corp' --metric token_sort
  fuzzylookup score 'Acme' 'acme' --raw")]
    Score {
        a: String,
        b: String,

        #[arg(long, default_value = "levenshtein")]
        metric: String,

        /// Compare as given, without trimming, case folding or whitespace collapsing
        #[arg(long)]
        raw: bool,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum CaseArg {
    Preserve,
    Lower,
}

impl From<CaseArg> for CaseFold {
    fn from(arg: CaseArg) -> Self {
        match arg {
            CaseArg::Preserve => CaseFold::Preserve,
            CaseArg::Lower => CaseFold::Lower,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum BlockingArg {
    None,
    Length,
}

impl From<BlockingArg> for Blocking {
    fn from(arg: BlockingArg) -> Self {
        match arg {
            BlockingArg::None => Blocking::None,
            BlockingArg::Length => Blocking::Length,
        }
    }
}

fn long_version() -> &'static str {
    if cfg!(debug_assertions) {
        concat!(
            env!("CARGO_PKG_VERSION"),
            " (", env!("GIT_COMMIT_HASH"), ")",
            "\nmatcher: fuzzylookup-matcher ", env!("CARGO_PKG_VERSION"),
            "\nbuild:   debug",
            "\ntarget:  ", env!("TARGET"),
        )
    } else {
        concat!(
            env!("CARGO_PKG_VERSION"),
            " (", env!("GIT_COMMIT_HASH"), ")",
            "\nmatcher: fuzzylookup-matcher ", env!("CARGO_PKG_VERSION"),
            "\nbuild:   release",
            "\ntarget:  ", env!("TARGET"),
        )
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Match {
            target,
            reference,
            target_key,
            reference_key,
            threshold,
            metric,
            header_row,
            reference_header_row,
            sheet,
            reference_sheet,
            case,
            no_trim,
            keep_whitespace,
            allow_empty,
            blocking,
            label_column,
            matched_label,
            unmatched_label,
            with_scores,
            review_floor,
            flags,
        } => {
            let config = LookupConfig {
                name: String::new(),
                target: SourceConfig {
                    file: target.display().to_string(),
                    key_column: target_key,
                    header_row,
                    sheet,
                },
                reference: SourceConfig {
                    file: reference.display().to_string(),
                    key_column: reference_key,
                    header_row: reference_header_row.unwrap_or(header_row),
                    sheet: reference_sheet,
                },
                matching: MatchingConfig {
                    metric,
                    threshold,
                    blocking: blocking.into(),
                },
                normalization: Normalization {
                    trim: !no_trim,
                    case: case.into(),
                    collapse_whitespace: !(keep_whitespace || no_trim),
                    allow_empty,
                },
                output: OutputConfig {
                    file: None,
                    label_column,
                    matched_label,
                    unmatched_label,
                    include_scores: with_scores,
                    review_floor,
                },
            };
            cmd_match(config, flags)
        }
        Commands::Run { config, flags } => cmd_run(config, flags),
        Commands::Validate { config } => cmd_validate(config),
        Commands::Columns { file, header_row, sheet, json } => cmd_columns(file, header_row, sheet, json),
        Commands::Score { a, b, metric, raw } => cmd_score(a, b, metric, raw),
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn args(msg: impl Into<String>) -> Self {
        Self { code: EXIT_USAGE, message: msg.into(), hint: None }
    }

    pub fn io(msg: impl Into<String>) -> Self {
        Self { code: EXIT_IO, message: msg.into(), hint: None }
    }

    pub fn parse(msg: impl Into<String>) -> Self {
        Self { code: EXIT_PARSE, message: msg.into(), hint: None }
    }

    pub fn eval(msg: impl Into<String>) -> Self {
        Self { code: EXIT_ERROR, message: msg.into(), hint: None }
    }

    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

impl From<MatchError> for CliError {
    fn from(err: MatchError) -> Self {
        let code = match_exit_code(&err);
        let hint = match &err {
            MatchError::ThresholdOutOfRange(_) => {
                Some("use 100 for exact matches, lower values to tolerate typos".to_string())
            }
            MatchError::MissingColumn { available, .. } => {
                Some(format!("available columns: {}", available.join(", ")))
            }
            _ => None,
        };
        Self { code, message: err.to_string(), hint }
    }
}

// ============================================================================
// match / run / validate
// ============================================================================

fn cmd_match(config: LookupConfig, flags: RunFlags) -> Result<(), CliError> {
    config.validate()?;
    lookup::execute(&config, Path::new(""), &flags)
}

fn read_config(path: &Path) -> Result<LookupConfig, CliError> {
    let config_str = std::fs::read_to_string(path)
        .map_err(|e| CliError::io(format!("cannot read config {}: {e}", path.display())))?;
    LookupConfig::from_toml(&config_str).map_err(|e| {
        let code = match_exit_code(&e);
        CliError { code, message: format!("{}: {}", path.display(), e), hint: None }
    })
}

fn cmd_run(config_path: PathBuf, flags: RunFlags) -> Result<(), CliError> {
    let config = read_config(&config_path)?;
    // Resolve file paths relative to config file's directory
    let base_dir = config_path.parent().unwrap_or_else(|| Path::new(""));
    lookup::execute(&config, base_dir, &flags)
}

fn cmd_validate(config_path: PathBuf) -> Result<(), CliError> {
    let config = read_config(&config_path)?;
    let title = if config.name.is_empty() { "lookup" } else { config.name.as_str() };
    eprintln!(
        "valid: {} '{}' [{}] in '{}' [{}], {} >= {}",
        title,
        config.target.file,
        config.target.key_column,
        config.reference.file,
        config.reference.key_column,
        config.matching.metric,
        config.matching.threshold,
    );
    Ok(())
}

// ============================================================================
// columns
// ============================================================================

#[derive(Serialize)]
struct ColumnInfo {
    index: usize,
    letter: String,
    name: String,
    sample: String,
}

fn cmd_columns(file: PathBuf, header_row: usize, sheet: Option<String>, json: bool) -> Result<(), CliError> {
    if header_row == 0 {
        return Err(CliError::args("--header-row is 1-indexed, got 0"));
    }
    let table = lookup::load_table(&file, header_row, sheet.clone())?;

    let columns: Vec<ColumnInfo> = table
        .headers
        .iter()
        .enumerate()
        .map(|(i, name)| ColumnInfo {
            index: i + 1,
            letter: col_letter(i),
            name: name.clone(),
            sample: table
                .column(i)
                .iter()
                .find(|v| !v.is_empty())
                .map(|v| v.display())
                .unwrap_or_default(),
        })
        .collect();

    if json {
        let out = serde_json::to_string_pretty(&columns)
            .map_err(|e| CliError::eval(format!("JSON serialization error: {e}")))?;
        println!("{out}");
        return Ok(());
    }

    if sheet.is_none() && fuzzylookup_io::Format::from_path(&file) == Ok(fuzzylookup_io::Format::Excel) {
        if let Ok(names) = fuzzylookup_io::xlsx::sheet_names(&file) {
            if names.len() > 1 {
                eprintln!("sheets: {} (showing '{}'; use --sheet)", names.join(", "), names[0]);
            }
        }
    }

    let name_width = columns.iter().map(|c| c.name.chars().count()).max().unwrap_or(0).max(6);
    println!("{:>3}  {:<3}  {:<name_width$}  sample", "#", "col", "header");
    for c in &columns {
        println!("{:>3}  {:<3}  {:<name_width$}  {}", c.index, c.letter, c.name, c.sample);
    }
    eprintln!("{} data rows", table.len());
    Ok(())
}

// ============================================================================
// score
// ============================================================================

fn cmd_score(a: String, b: String, metric: String, raw: bool) -> Result<(), CliError> {
    let metric: Metric = metric.parse()?;
    let (a, b) = if raw {
        (a, b)
    } else {
        let policy = Normalization { allow_empty: true, ..Normalization::default() };
        (policy.apply(&a), policy.apply(&b))
    };
    println!("{}", metric.score(&a, &b));
    Ok(())
}
