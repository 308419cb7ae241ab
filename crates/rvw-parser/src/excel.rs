//! Spreadsheet reader using calamine
//!
//! Reads the first worksheet of XLSX/XLS/ODS files; the first row is the header.

use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader};

use crate::{FileType, ParserError, Result, Table, TableReader};

/// Spreadsheet reader
pub struct ExcelReader {
    /// Sheet to read (None = first sheet)
    pub sheet: Option<String>,
}

impl ExcelReader {
    /// Create a new reader that reads the first sheet
    pub fn new() -> Self {
        Self { sheet: None }
    }

    /// Read a named sheet instead of the first one
    pub fn with_sheet(mut self, sheet: impl Into<String>) -> Self {
        self.sheet = Some(sheet.into());
        self
    }

    /// Convert a Data cell to string
    fn cell_to_string(cell: &Data) -> String {
        match cell {
            Data::Empty => String::new(),
            Data::String(s) => s.clone(),
            Data::Float(f) => {
                // Format without unnecessary decimals
                if f.fract() == 0.0 {
                    format!("{}", *f as i64)
                } else {
                    format!("{f}")
                }
            }
            Data::Int(i) => format!("{i}"),
            Data::Bool(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
            Data::Error(e) => format!("#ERROR: {e:?}"),
            Data::DateTime(dt) => format!("{dt}"),
            Data::DateTimeIso(s) => s.clone(),
            Data::DurationIso(s) => s.clone(),
        }
    }
}

impl Default for ExcelReader {
    fn default() -> Self {
        Self::new()
    }
}

impl TableReader for ExcelReader {
    fn read(&self, path: &Path) -> Result<Table> {
        let mut workbook =
            open_workbook_auto(path).map_err(|e| ParserError::ExcelError(e.to_string()))?;

        let range = match &self.sheet {
            Some(name) => workbook
                .worksheet_range(name)
                .map_err(|e| ParserError::ExcelError(format!("sheet {name}: {e}")))?,
            None => workbook
                .worksheet_range_at(0)
                .ok_or_else(|| ParserError::ExcelError("workbook has no sheets".to_string()))?
                .map_err(|e| ParserError::ExcelError(e.to_string()))?,
        };

        let mut rows = range.rows();
        let headers = rows
            .next()
            .map(|row| row.iter().map(Self::cell_to_string).collect())
            .unwrap_or_default();
        let mut table = Table::with_headers(headers);

        // Skip fully empty rows
        for row in rows {
            let cells: Vec<String> = row.iter().map(Self::cell_to_string).collect();
            if !cells.iter().all(|c| c.is_empty()) {
                table.add_row(cells);
            }
        }

        tracing::debug!(path = %path.display(), rows = table.len(), "Spreadsheet read");
        Ok(table)
    }

    fn supported_types(&self) -> &[FileType] {
        &[FileType::Xlsx, FileType::Xls, FileType::Ods]
    }
}
