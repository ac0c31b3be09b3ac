// In-memory table: one header row plus data rows of scalar cells.

use fuzzylookup_matcher::{col_letter, resolve_column, MatchError, Scalar};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub headers: Vec<String>,
    /// Data rows, each padded to `headers.len()`.
    pub rows: Vec<Vec<Scalar>>,
}

impl Table {
    /// Build a table from raw sheet rows. `header_row` is 1-indexed; rows
    /// above it are skipped, fully blank rows below it are dropped, and blank
    /// headers are named after their column letter.
    pub fn from_grid(grid: Vec<Vec<Scalar>>, header_row: usize) -> Result<Self, String> {
        if header_row == 0 {
            return Err("header row is 1-indexed, got 0".to_string());
        }
        let total = grid.len();
        let mut grid = grid.into_iter().skip(header_row - 1);
        let header_cells = grid.next().ok_or_else(|| {
            format!("header row {} is past the end of the data ({} rows)", header_row, total)
        })?;

        let body: Vec<Vec<Scalar>> = grid
            .filter(|row| !row.iter().all(Scalar::is_empty))
            .collect();

        let width = body
            .iter()
            .map(Vec::len)
            .chain(std::iter::once(header_cells.len()))
            .max()
            .unwrap_or(0);

        let headers = (0..width)
            .map(|i| {
                let name = header_cells
                    .get(i)
                    .map(|c| c.display().trim().to_string())
                    .unwrap_or_default();
                if name.is_empty() {
                    col_letter(i)
                } else {
                    name
                }
            })
            .collect();

        let rows = body
            .into_iter()
            .map(|mut row| {
                row.resize(width, Scalar::Empty);
                row
            })
            .collect();

        Ok(Self { headers, rows })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn width(&self) -> usize {
        self.headers.len()
    }

    pub fn resolve_column(&self, spec: &str) -> Result<usize, MatchError> {
        resolve_column(spec, &self.headers)
    }

    /// Cells of one column, top to bottom.
    pub fn column(&self, idx: usize) -> Vec<Scalar> {
        self.rows
            .iter()
            .map(|row| row.get(idx).cloned().unwrap_or(Scalar::Empty))
            .collect()
    }

    /// Write `values` into the column named `name` (case-insensitive),
    /// appending the column if no header matches. Returns its index.
    pub fn set_column(&mut self, name: &str, values: Vec<Scalar>) -> usize {
        let wanted = name.trim().to_lowercase();
        let idx = match self
            .headers
            .iter()
            .position(|h| h.trim().to_lowercase() == wanted)
        {
            Some(idx) => idx,
            None => {
                self.headers.push(name.to_string());
                for row in &mut self.rows {
                    row.push(Scalar::Empty);
                }
                self.headers.len() - 1
            }
        };

        let mut values = values.into_iter();
        for row in &mut self.rows {
            row[idx] = values.next().unwrap_or(Scalar::Empty);
        }
        idx
    }
}
