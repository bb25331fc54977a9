use std::collections::HashMap;
use std::sync::Arc;

use super::row::{CustomDbRow, build_column_index};
use crate::types::RowValues;

/// Rows returned by a procedure call, in server order.
#[derive(Debug, Clone, Default)]
pub struct ResultSet {
    /// The rows returned by the procedure
    pub results: Vec<CustomDbRow>,
    column_names: Option<Arc<Vec<String>>>,
    column_index: Option<Arc<HashMap<String, usize>>>,
}

impl ResultSet {
    /// Create a new result set with a known capacity
    #[must_use]
    pub fn with_capacity(capacity: usize) -> ResultSet {
        ResultSet {
            results: Vec::with_capacity(capacity),
            column_names: None,
            column_index: None,
        }
    }

    /// Build a result set from column names and row values in one go.
    #[must_use]
    pub fn from_rows(column_names: Vec<String>, rows: Vec<Vec<RowValues>>) -> ResultSet {
        let mut result_set = ResultSet::with_capacity(rows.len());
        result_set.set_column_names(Arc::new(column_names));
        for row in rows {
            result_set.add_row_values(row);
        }
        result_set
    }

    /// Set the column names for this result set (shared by all rows)
    pub fn set_column_names(&mut self, column_names: Arc<Vec<String>>) {
        self.column_index = Some(Arc::new(build_column_index(&column_names)));
        self.column_names = Some(column_names);
    }

    /// Get the column names for this result set
    #[must_use]
    pub fn get_column_names(&self) -> Option<&Arc<Vec<String>>> {
        self.column_names.as_ref()
    }

    /// Add a row to the result set. Rows added before column names are set are dropped.
    pub fn add_row_values(&mut self, row_values: Vec<RowValues>) {
        if let (Some(column_names), Some(index)) = (&self.column_names, &self.column_index) {
            self.results.push(CustomDbRow {
                column_names: Arc::clone(column_names),
                rows: row_values,
                column_index_cache: Arc::clone(index),
            });
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.results.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Drop everything after the first `limit` rows.
    pub fn truncate(&mut self, limit: usize) {
        self.results.truncate(limit);
    }
}
