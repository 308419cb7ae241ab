//! RVW Parser - Tabular review data parsing
//!
//! Supports reading:
//! - CSV files
//! - Microsoft Excel (XLSX, XLS, XLSM) and OpenDocument (ODS) spreadsheets
//!
//! Each reader implements the `TableReader` trait and produces a `Table`.
//! `ReviewConverter` turns a table into `ReviewDocument`s ready for ingestion.

use std::path::Path;
use thiserror::Error;

pub mod converter;
pub mod csv_reader;
pub mod excel;

pub use converter::{ReviewConverter, PRODUCT_COLUMN, REVIEW_COLUMN};
pub use csv_reader::CsvReader;
pub use excel::ExcelReader;

// ============================================================================
// Error Types
// ============================================================================

/// Errors that can occur while reading review data
#[derive(Error, Debug)]
pub enum ParserError {
    /// File format is not supported
    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    /// IO error while reading the file
    #[error("IO error reading file: {path}")]
    IoError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// CSV parsing error
    #[error("CSV parsing error: {0}")]
    CsvError(String),

    /// Excel parsing error
    #[error("Excel parsing error: {0}")]
    ExcelError(String),

    /// Required columns are absent from the header row
    #[error("Missing required columns: {}", missing.join(", "))]
    MissingColumns { missing: Vec<String> },
}

pub type Result<T> = std::result::Result<T, ParserError>;

impl From<ParserError> for rvw_core::RvwError {
    fn from(err: ParserError) -> Self {
        rvw_core::RvwError::DataFormat(err.to_string())
    }
}

// ============================================================================
// File Types
// ============================================================================

/// Supported file types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    Csv,
    Xlsx,
    Xls,
    Ods,
    Unknown,
}

impl FileType {
    /// Detect file type from extension
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_lowercase().as_str() {
            "csv" => Self::Csv,
            "xlsx" | "xlsm" => Self::Xlsx,
            "xls" => Self::Xls,
            "ods" => Self::Ods,
            _ => Self::Unknown,
        }
    }

    /// Detect file type from path
    pub fn from_path(path: &Path) -> Self {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(Self::from_extension)
            .unwrap_or(Self::Unknown)
    }
}

impl std::fmt::Display for FileType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Csv => write!(f, "csv"),
            Self::Xlsx => write!(f, "xlsx"),
            Self::Xls => write!(f, "xls"),
            Self::Ods => write!(f, "ods"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

// ============================================================================
// Tables
// ============================================================================

/// A header row plus data rows, all cells as text
#[derive(Debug, Clone, Default)]
pub struct Table {
    /// Column headers
    pub headers: Vec<String>,

    /// Data rows; a row may be shorter than the header
    pub rows: Vec<Vec<String>>,
}

impl Table {
    /// Create a table with the given headers
    pub fn with_headers(headers: Vec<String>) -> Self {
        Self {
            headers: headers
                .into_iter()
                .map(|h| h.trim_start_matches('\u{feff}').trim().to_string())
                .collect(),
            rows: Vec::new(),
        }
    }

    /// Add a row
    pub fn add_row(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }

    /// Position of a column by exact (trimmed) header name
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Cell value, `None` when the row is too short
    pub fn cell(&self, row: usize, column: usize) -> Option<&str> {
        self.rows
            .get(row)
            .and_then(|r| r.get(column))
            .map(String::as_str)
    }

    /// Number of data rows
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether there are no data rows
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

// ============================================================================
// Reader Trait
// ============================================================================

/// Trait for tabular readers
pub trait TableReader: Send + Sync {
    /// Read the first table of the file at `path`
    fn read(&self, path: &Path) -> Result<Table>;

    /// File types this reader handles
    fn supported_types(&self) -> &[FileType];

    /// Check whether this reader handles a file type
    fn can_read(&self, file_type: FileType) -> bool {
        self.supported_types().contains(&file_type)
    }
}

/// Pick a reader for the file at `path` based on its extension
pub fn reader_for(path: &Path) -> Result<Box<dyn TableReader>> {
    match FileType::from_path(path) {
        FileType::Csv => Ok(Box::new(CsvReader::new())),
        FileType::Xlsx | FileType::Xls | FileType::Ods => Ok(Box::new(ExcelReader::new())),
        FileType::Unknown => Err(ParserError::UnsupportedFormat(path.display().to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_type_detection() {
        assert_eq!(FileType::from_extension("CSV"), FileType::Csv);
        assert_eq!(FileType::from_extension("xlsm"), FileType::Xlsx);
        assert_eq!(
            FileType::from_path(Path::new("data/reviews.ods")),
            FileType::Ods
        );
        assert_eq!(FileType::from_path(Path::new("README")), FileType::Unknown);
    }

    #[test]
    fn test_table_headers_are_normalized() {
        let table = Table::with_headers(vec![
            "\u{feff}product_title".to_string(),
            " review ".to_string(),
        ]);
        assert_eq!(table.column_index("product_title"), Some(0));
        assert_eq!(table.column_index("review"), Some(1));
        assert_eq!(table.column_index("rating"), None);
    }

    #[test]
    fn test_short_rows_have_missing_cells() {
        let mut table = Table::with_headers(vec!["a".to_string(), "b".to_string()]);
        table.add_row(vec!["only-a".to_string()]);
        assert_eq!(table.cell(0, 0), Some("only-a"));
        assert_eq!(table.cell(0, 1), None);
        assert_eq!(table.cell(1, 0), None);
    }

    #[test]
    fn test_reader_for_unknown_extension() {
        let err = reader_for(Path::new("reviews.json")).err().unwrap();
        assert!(matches!(err, ParserError::UnsupportedFormat(_)));
        assert!(reader_for(Path::new("reviews.csv")).is_ok());
    }

    #[test]
    fn test_data_format_conversion() {
        let err: rvw_core::RvwError = ParserError::MissingColumns {
            missing: vec!["review".to_string()],
        }
        .into();
        assert!(matches!(err, rvw_core::RvwError::DataFormat(msg) if msg.contains("review")));
    }
}
