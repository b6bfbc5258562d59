//! Table-valued parameter structures.

use crate::SprocDbError;
use crate::conversion::SqlField;
use crate::types::{DbType, RowValues};

/// One column of a table-valued parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableColumn {
    pub name: String,
    pub db_type: DbType,
}

/// Tabular value passed to the server as a single parameter.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableValue {
    type_name: Option<String>,
    columns: Vec<TableColumn>,
    rows: Vec<Vec<RowValues>>,
}

impl TableValue {
    #[must_use]
    pub fn new(columns: Vec<TableColumn>) -> Self {
        Self {
            type_name: None,
            columns,
            rows: Vec::new(),
        }
    }

    /// Single-column table holding one row per value.
    pub fn single_column<T: SqlField>(
        column_name: &str,
        values: impl IntoIterator<Item = T>,
    ) -> Self {
        let mut table = Self::new(vec![TableColumn {
            name: column_name.to_string(),
            db_type: T::DB_TYPE,
        }]);
        table.rows = values.into_iter().map(|v| vec![v.to_row_value()]).collect();
        table
    }

    /// Multi-column table built from records that describe their own columns.
    ///
    /// Columns appear in ascending declared order; records become rows in iteration order.
    pub fn from_records<'a, T: TableRecord + 'a>(records: impl IntoIterator<Item = &'a T>) -> Self {
        let mut columns = T::table_columns();
        // stable: equal orders keep declaration order
        columns.sort_by_key(|c| c.order);

        let mut table = Self::new(
            columns
                .iter()
                .map(|c| TableColumn {
                    name: c.name.to_string(),
                    db_type: c.db_type,
                })
                .collect(),
        );
        table.rows = records
            .into_iter()
            .map(|record| columns.iter().map(|c| (c.value)(record)).collect())
            .collect();
        table
    }

    /// Server-side table type, e.g. `dbo.IdList`. Some drivers require it.
    #[must_use]
    pub fn with_type_name(mut self, type_name: &str) -> Self {
        self.type_name = Some(type_name.to_string());
        self
    }

    /// Append a row.
    ///
    /// # Errors
    /// Returns `SprocDbError::ParameterError` if the row width differs from the column count.
    pub fn push_row(&mut self, row: Vec<RowValues>) -> Result<(), SprocDbError> {
        if row.len() != self.columns.len() {
            return Err(SprocDbError::ParameterError(format!(
                "table row has {} values but {} columns are declared",
                row.len(),
                self.columns.len()
            )));
        }
        self.rows.push(row);
        Ok(())
    }

    #[must_use]
    pub fn type_name(&self) -> Option<&str> {
        self.type_name.as_deref()
    }

    #[must_use]
    pub fn columns(&self) -> &[TableColumn] {
        &self.columns
    }

    #[must_use]
    pub fn rows(&self) -> &[Vec<RowValues>] {
        &self.rows
    }
}

/// Column metadata for one record property taking part in a table-valued parameter.
pub struct ColumnSql<T> {
    pub name: &'static str,
    pub order: i32,
    pub db_type: DbType,
    pub value: fn(&T) -> RowValues,
}

impl<T> std::fmt::Debug for ColumnSql<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ColumnSql")
            .field("name", &self.name)
            .field("order", &self.order)
            .field("db_type", &self.db_type)
            .finish_non_exhaustive()
    }
}

/// A record type usable as a row of a structured table-valued parameter.
///
/// Only properties listed by [`table_columns`](TableRecord::table_columns) take part.
/// Implement it by hand or with [`impl_table_record!`](crate::impl_table_record).
pub trait TableRecord: Sized {
    fn table_columns() -> Vec<ColumnSql<Self>>;
}
