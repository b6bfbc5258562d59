use std::sync::Arc;

use crate::error::SprocDbError;
use crate::types::RowValues;

use super::cursor::ColumnSchema;

/// One buffered result set: the column schema plus every row the server sent for it.
///
/// Drivers that read a whole response up front (and the in-memory test driver) hand
/// these to a [`BufferedCursor`](super::BufferedCursor).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    /// Column schema shared by all rows
    columns: Arc<Vec<ColumnSchema>>,
    /// The rows returned for this result set
    pub results: Vec<Vec<RowValues>>,
}

impl ResultSet {
    /// Create an empty result set with the given columns
    #[must_use]
    pub fn new(columns: Vec<ColumnSchema>) -> ResultSet {
        ResultSet {
            columns: Arc::new(columns),
            results: Vec::new(),
        }
    }

    /// Create an empty result set from column names; ordinals follow slice order.
    #[must_use]
    pub fn with_column_names(names: &[&str]) -> ResultSet {
        Self::new(
            names
                .iter()
                .enumerate()
                .map(|(ordinal, name)| ColumnSchema::new(*name, ordinal))
                .collect(),
        )
    }

    /// Preallocate room for `capacity` rows.
    #[must_use]
    pub fn with_capacity(mut self, capacity: usize) -> ResultSet {
        self.results.reserve(capacity);
        self
    }

    #[must_use]
    pub fn columns(&self) -> &[ColumnSchema] {
        &self.columns
    }

    /// Add a row to the result set
    ///
    /// # Errors
    ///
    /// Returns `SprocDbError::ExecutionError` if the row width does not match the schema.
    pub fn add_row_values(&mut self, row_values: Vec<RowValues>) -> Result<(), SprocDbError> {
        if row_values.len() != self.columns.len() {
            return Err(SprocDbError::ExecutionError(format!(
                "row has {} values but the result set has {} columns",
                row_values.len(),
                self.columns.len()
            )));
        }
        self.results.push(row_values);
        Ok(())
    }

    /// Builder-style [`add_row_values`](Self::add_row_values) for scripted results.
    ///
    /// # Errors
    ///
    /// Same as [`add_row_values`](Self::add_row_values).
    pub fn row(mut self, row_values: Vec<RowValues>) -> Result<ResultSet, SprocDbError> {
        self.add_row_values(row_values)?;
        Ok(self)
    }

    /// Get the index of a column by name, ignoring case
    #[must_use]
    pub fn column_index(&self, column_name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|col| col.name.eq_ignore_ascii_case(column_name))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.results.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_rows_of_wrong_width() {
        let mut rs = ResultSet::with_column_names(&["Id", "Name"]);
        assert!(rs.add_row_values(vec![RowValues::Int(1)]).is_err());
        assert!(
            rs.add_row_values(vec![RowValues::Int(1), RowValues::Null])
                .is_ok()
        );
        assert_eq!(rs.len(), 1);
        assert_eq!(rs.column_index("name"), Some(1));
        assert_eq!(rs.columns()[1].ordinal, 1);
    }
}
