// Excel file import (xlsx, xlsm, xls, xlsb, ods) and export (xlsx only)
//
// Import reads one worksheet's cached values; formulas are not evaluated.
// Export writes a single sheet with a bold, frozen header row.

use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader, Sheets};
use rust_xlsxwriter::{Format, Workbook, Worksheet};

use fuzzylookup_matcher::Scalar;

use crate::table::Table;

pub fn sheet_names(path: &Path) -> Result<Vec<String>, String> {
    let workbook: Sheets<_> = open_workbook_auto(path)
        .map_err(|e| format!("Failed to open Excel file: {}", e))?;
    Ok(workbook.sheet_names().to_vec())
}

/// Read one worksheet as raw rows, placed at their sheet positions so that
/// row 1 is always the first grid row. `sheet` matches case-insensitively;
/// `None` reads the first sheet.
pub fn import(path: &Path, sheet: Option<&str>) -> Result<Vec<Vec<Scalar>>, String> {
    let mut workbook: Sheets<_> = open_workbook_auto(path)
        .map_err(|e| format!("Failed to open Excel file: {}", e))?;

    let names = workbook.sheet_names().to_vec();
    let name = match sheet {
        Some(wanted) => names
            .iter()
            .find(|n| n.eq_ignore_ascii_case(wanted))
            .cloned()
            .ok_or_else(|| format!("no sheet named '{}' (sheets: {})", wanted, names.join(", ")))?,
        None => names
            .first()
            .cloned()
            .ok_or_else(|| "Excel file contains no sheets".to_string())?,
    };

    let range = workbook
        .worksheet_range(&name)
        .map_err(|e| format!("Failed to read sheet '{}': {}", name, e))?;

    // Range start offset (data may not begin at A1)
    let (start_row, start_col) = range.start().unwrap_or((0, 0));
    let (height, width) = range.get_size();
    log::debug!(
        "{}: sheet '{}' {}x{} at ({}, {})",
        path.display(),
        name,
        height,
        width,
        start_row,
        start_col
    );

    let mut grid: Vec<Vec<Scalar>> = vec![Vec::new(); start_row as usize];
    for row in range.rows() {
        let mut cells = vec![Scalar::Empty; start_col as usize];
        cells.extend(row.iter().map(to_scalar));
        grid.push(cells);
    }
    Ok(grid)
}

fn to_scalar(cell: &Data) -> Scalar {
    match cell {
        Data::Empty => Scalar::Empty,
        Data::String(s) => Scalar::from(s.as_str()),
        Data::Float(n) => Scalar::Number(*n),
        Data::Int(n) => Scalar::Number(*n as f64),
        Data::Bool(b) => Scalar::Bool(*b),
        Data::Error(e) => Scalar::Error(e.to_string()),
        // Serial number, 1900 date system
        Data::DateTime(dt) => Scalar::Number(dt.as_f64()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Scalar::Text(s.clone()),
    }
}

pub fn export(table: &Table, path: &Path) -> Result<(), String> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();

    let header_format = Format::new().set_bold();
    for (col, header) in table.headers.iter().enumerate() {
        worksheet
            .write_string_with_format(0, col as u16, header, &header_format)
            .map_err(|e| format!("Failed to write header '{}': {}", header, e))?;
    }

    for (row_idx, row) in table.rows.iter().enumerate() {
        for (col_idx, cell) in row.iter().enumerate() {
            write_cell(worksheet, row_idx as u32 + 1, col_idx as u16, cell)?;
        }
    }

    if !table.headers.is_empty() {
        worksheet
            .set_freeze_panes(1, 0)
            .map_err(|e| format!("Failed to set freeze panes: {}", e))?;
    }
    worksheet.autofit();

    workbook
        .save(path)
        .map_err(|e| format!("Failed to save XLSX file: {}", e))?;
    Ok(())
}

fn write_cell(worksheet: &mut Worksheet, row: u32, col: u16, cell: &Scalar) -> Result<(), String> {
    let written = match cell {
        Scalar::Empty => return Ok(()),
        Scalar::Text(s) | Scalar::Error(s) => worksheet.write_string(row, col, s),
        Scalar::Number(n) => worksheet.write_number(row, col, *n),
        Scalar::Bool(b) => worksheet.write_boolean(row, col, *b),
    };
    written
        .map(|_| ())
        .map_err(|e| format!("Failed to write cell ({}, {}): {}", row, col, e))
}
