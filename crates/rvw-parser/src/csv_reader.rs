//! CSV reader using the csv crate

use std::path::Path;

use crate::{FileType, ParserError, Result, Table, TableReader};

/// CSV reader
pub struct CsvReader {
    /// Field delimiter
    pub delimiter: u8,
}

impl CsvReader {
    pub fn new() -> Self {
        Self { delimiter: b',' }
    }

    /// Use a different delimiter (e.g. `b';'` or `b'\t'`)
    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    fn map_csv_error(path: &Path, err: csv::Error) -> ParserError {
        if err.is_io_error() {
            if let csv::ErrorKind::Io(source) = err.into_kind() {
                return ParserError::IoError {
                    path: path.display().to_string(),
                    source,
                };
            }
            return ParserError::CsvError(format!("{}: unreadable", path.display()));
        }
        ParserError::CsvError(format!("{}: {err}", path.display()))
    }
}

impl Default for CsvReader {
    fn default() -> Self {
        Self::new()
    }
}

impl TableReader for CsvReader {
    fn read(&self, path: &Path) -> Result<Table> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(self.delimiter)
            .flexible(true)
            .from_path(path)
            .map_err(|e| Self::map_csv_error(path, e))?;

        let headers = reader
            .headers()
            .map_err(|e| Self::map_csv_error(path, e))?
            .iter()
            .map(str::to_string)
            .collect();
        let mut table = Table::with_headers(headers);

        for record in reader.records() {
            let record = record.map_err(|e| Self::map_csv_error(path, e))?;
            table.add_row(record.iter().map(str::to_string).collect());
        }

        tracing::debug!(path = %path.display(), rows = table.len(), "CSV read");
        Ok(table)
    }

    fn supported_types(&self) -> &[FileType] {
        &[FileType::Csv]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_csv(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_read_quoted_multiline_fields() {
        let file = write_csv(
            "product_title,rating,review\n\
             \"Phone, 64GB\",5,\"Great battery.\nWould buy again\"\n",
        );

        let table = CsvReader::new().read(file.path()).unwrap();
        assert_eq!(table.headers, vec!["product_title", "rating", "review"]);
        assert_eq!(table.len(), 1);
        assert_eq!(table.cell(0, 0), Some("Phone, 64GB"));
        assert_eq!(table.cell(0, 2), Some("Great battery.\nWould buy again"));
    }

    #[test]
    fn test_read_ragged_rows() {
        let file = write_csv("product_title,review\nEarbuds\nSpeaker,Loud\n");

        let table = CsvReader::new().read(file.path()).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.cell(0, 1), None);
        assert_eq!(table.cell(1, 1), Some("Loud"));
    }

    #[test]
    fn test_custom_delimiter() {
        let file = write_csv("product_title;review\nLaptop;Fast\n");

        let table = CsvReader::new()
            .with_delimiter(b';')
            .read(file.path())
            .unwrap();
        assert_eq!(table.cell(0, 0), Some("Laptop"));
    }

    #[test]
    fn test_missing_file() {
        let err = CsvReader::new()
            .read(Path::new("/no/such/reviews.csv"))
            .unwrap_err();
        assert!(matches!(err, ParserError::IoError { .. }));
    }
}
