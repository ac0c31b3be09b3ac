// Tabular file I/O for lookups: load a sheet as a Table, save a report.

pub mod csv;
pub mod report;
pub mod table;
pub mod xlsx;

use std::path::{Path, PathBuf};

pub use report::ReportOptions;
pub use table::Table;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// Delimiter sniffed (comma, semicolon, tab, pipe).
    Csv,
    Tsv,
    /// Anything calamine opens. Only `.xlsx` is written.
    Excel,
}

impl Format {
    pub fn from_path(path: &Path) -> Result<Self, String> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase());

        match ext.as_deref() {
            Some("csv") | Some("txt") => Ok(Format::Csv),
            Some("tsv") => Ok(Format::Tsv),
            Some("xlsx") | Some("xlsm") | Some("xls") | Some("xlsb") | Some("ods") => {
                Ok(Format::Excel)
            }
            _ => Err(format!(
                "cannot infer format from extension {:?} (expected csv, tsv, txt, xlsx, xlsm, xls, xlsb, ods)",
                ext.as_deref().unwrap_or("(none)")
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadOptions {
    /// 1-indexed.
    pub header_row: usize,
    /// Excel only; first sheet when unset.
    pub sheet: Option<String>,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            header_row: 1,
            sheet: None,
        }
    }
}

pub fn load(path: &Path, options: &LoadOptions) -> Result<Table, String> {
    let grid = match Format::from_path(path)? {
        Format::Csv => csv::import(path)?,
        Format::Tsv => csv::import_tsv(path)?,
        Format::Excel => xlsx::import(path, options.sheet.as_deref())?,
    };
    let table = Table::from_grid(grid, options.header_row)
        .map_err(|e| format!("{}: {}", path.display(), e))?;
    log::info!(
        "loaded {}: {} rows, {} columns",
        path.display(),
        table.len(),
        table.width()
    );
    Ok(table)
}

/// Write by extension: `.csv`/`.txt`, `.tsv`, or `.xlsx`.
pub fn save(table: &Table, path: &Path) -> Result<(), String> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase());

    match ext.as_deref() {
        Some("csv") | Some("txt") => csv::export(table, path),
        Some("tsv") => csv::export_tsv(table, path),
        Some("xlsx") => xlsx::export(table, path),
        other => Err(format!(
            "cannot write {:?} files (use .csv, .tsv or .xlsx)",
            other.unwrap_or("(none)")
        )),
    }
}

/// `<stem> - matched.<ext>` next to the target. Excel targets are written as `.xlsx`.
pub fn default_output_path(target: &Path) -> PathBuf {
    let stem = target
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output");
    let ext = match Format::from_path(target) {
        Ok(Format::Csv) => target
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .unwrap_or_else(|| "csv".to_string()),
        Ok(Format::Tsv) => "tsv".to_string(),
        Ok(Format::Excel) | Err(_) => "xlsx".to_string(),
    };
    target.with_file_name(format!("{} - matched.{}", stem, ext))
}
