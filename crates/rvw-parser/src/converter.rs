//! Review converter
//!
//! Turns a tabular review export into `ReviewDocument`s: the `review` column
//! becomes the document text and `product_title` its product name.

use std::path::{Path, PathBuf};

use rvw_core::ReviewDocument;

use crate::{reader_for, ParserError, Result, Table};

/// Column holding the product title
pub const PRODUCT_COLUMN: &str = "product_title";

/// Column holding the review body
pub const REVIEW_COLUMN: &str = "review";

/// Loads a review export and converts each usable row into a document
pub struct ReviewConverter {
    path: PathBuf,
}

impl ReviewConverter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the file and convert it.
    ///
    /// Rows missing either field (or holding only whitespace) are skipped.
    pub fn convert(&self) -> Result<Vec<ReviewDocument>> {
        let table = reader_for(&self.path)?.read(&self.path)?;
        let documents = Self::convert_table(&table)?;

        tracing::info!(
            path = %self.path.display(),
            rows = table.len(),
            documents = documents.len(),
            skipped = table.len() - documents.len(),
            "Converted review data"
        );

        Ok(documents)
    }

    /// Convert an already-read table
    pub fn convert_table(table: &Table) -> Result<Vec<ReviewDocument>> {
        let product_idx = table.column_index(PRODUCT_COLUMN);
        let review_idx = table.column_index(REVIEW_COLUMN);

        let (product_idx, review_idx) = match (product_idx, review_idx) {
            (Some(p), Some(r)) => (p, r),
            (p, r) => {
                let mut missing = Vec::new();
                if p.is_none() {
                    missing.push(PRODUCT_COLUMN.to_string());
                }
                if r.is_none() {
                    missing.push(REVIEW_COLUMN.to_string());
                }
                return Err(ParserError::MissingColumns { missing });
            }
        };

        let documents = (0..table.len())
            .filter_map(|row| {
                let product = table.cell(row, product_idx)?.trim();
                let review = table.cell(row, review_idx)?.trim();
                if product.is_empty() || review.is_empty() {
                    return None;
                }
                Some(ReviewDocument::new(review, product))
            })
            .collect();

        Ok(documents)
    }
}
