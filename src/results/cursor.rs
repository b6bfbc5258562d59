use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::command::CommandBehavior;
use crate::error::SprocDbError;
use crate::types::{DbType, RowValues};

use super::result_set::ResultSet;

/// Name and position of one result column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSchema {
    pub name: String,
    pub ordinal: usize,
    pub db_type: Option<DbType>,
}

impl ColumnSchema {
    #[must_use]
    pub fn new(name: impl Into<String>, ordinal: usize) -> Self {
        Self {
            name: name.into(),
            ordinal,
            db_type: None,
        }
    }
}

/// Forward-only, single-pass cursor over the result sets of one execution.
///
/// A cursor belongs to exactly one reader; it is not meant to be shared between tasks.
#[async_trait]
pub trait ResultCursor: Send {
    /// Columns of the current result set.
    ///
    /// # Errors
    /// `InvalidState` once the cursor has moved past its last result set.
    fn columns(&self) -> Result<&[ColumnSchema], SprocDbError>;

    /// Whether the current result set holds at least one row.
    fn has_rows(&self) -> bool;

    /// Move to the next row of the current result set.
    ///
    /// # Errors
    /// `InvalidState` once the cursor has moved past its last result set.
    fn read(&mut self) -> Result<bool, SprocDbError>;

    /// Raw value at `ordinal` in the current row.
    ///
    /// # Errors
    /// `InvalidState` when no row is current, `ArgumentError` for an unknown ordinal.
    fn value(&self, ordinal: usize) -> Result<&RowValues, SprocDbError>;

    /// Advance to the next result set; `false` when there is none.
    ///
    /// # Errors
    /// Driver failures while fetching the next result set.
    fn next_result(&mut self) -> Result<bool, SprocDbError>;

    /// Async form of [`next_result`](Self::next_result).
    ///
    /// # Errors
    /// `Cancelled` if `ct` fired, otherwise as `next_result`.
    async fn next_result_async(&mut self, ct: &CancellationToken) -> Result<bool, SprocDbError> {
        if ct.is_cancelled() {
            return Err(SprocDbError::Cancelled("next result set".to_string()));
        }
        self.next_result()
    }
}

/// Cursor over result sets that were fully read into memory.
#[derive(Debug)]
pub struct BufferedCursor {
    sets: Vec<ResultSet>,
    set_index: usize,
    row_index: Option<usize>,
    exhausted: bool,
}

impl BufferedCursor {
    /// Wrap `sets`, applying the row/result-set limits requested by `behavior`.
    ///
    /// An execution that produced no result set still exposes one empty set, the way a
    /// reader over a procedure without `SELECT` reports no columns and no rows.
    #[must_use]
    pub fn new(mut sets: Vec<ResultSet>, behavior: CommandBehavior) -> Self {
        if sets.is_empty() {
            sets.push(ResultSet::default());
        }
        if behavior.contains(CommandBehavior::SINGLE_RESULT) {
            sets.truncate(1);
        }
        if behavior.contains(CommandBehavior::SCHEMA_ONLY) {
            for set in &mut sets {
                set.results.clear();
            }
        } else if behavior.contains(CommandBehavior::SINGLE_ROW) {
            for set in &mut sets {
                set.results.truncate(1);
            }
        }
        Self {
            sets,
            set_index: 0,
            row_index: None,
            exhausted: false,
        }
    }

    fn current(&self) -> Result<&ResultSet, SprocDbError> {
        if self.exhausted {
            return Err(SprocDbError::InvalidState(
                "the reader has no current result set".to_string(),
            ));
        }
        self.sets.get(self.set_index).ok_or_else(|| {
            SprocDbError::InvalidState("the reader has no current result set".to_string())
        })
    }
}

impl ResultCursor for BufferedCursor {
    fn columns(&self) -> Result<&[ColumnSchema], SprocDbError> {
        self.current().map(ResultSet::columns)
    }

    fn has_rows(&self) -> bool {
        self.current().is_ok_and(|set| !set.is_empty())
    }

    fn read(&mut self) -> Result<bool, SprocDbError> {
        let len = self.current()?.len();
        let next = self.row_index.map_or(0, |i| i + 1);
        if next < len {
            self.row_index = Some(next);
            Ok(true)
        } else {
            // park past the end so `value` fails until the next result set
            self.row_index = Some(len);
            Ok(false)
        }
    }

    fn value(&self, ordinal: usize) -> Result<&RowValues, SprocDbError> {
        let set = self.current()?;
        let row = self
            .row_index
            .and_then(|i| set.results.get(i))
            .ok_or_else(|| SprocDbError::InvalidState("the reader has no current row".to_string()))?;
        row.get(ordinal).ok_or_else(|| {
            SprocDbError::ArgumentError(format!(
                "column ordinal {ordinal} is out of range ({} columns)",
                row.len()
            ))
        })
    }

    fn next_result(&mut self) -> Result<bool, SprocDbError> {
        if self.exhausted {
            return Ok(false);
        }
        self.row_index = None;
        if self.set_index + 1 < self.sets.len() {
            self.set_index += 1;
            tracing::trace!(result_set = self.set_index, "advanced to next result set");
            Ok(true)
        } else {
            self.exhausted = true;
            Ok(false)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_sets() -> Vec<ResultSet> {
        let mut first = ResultSet::with_column_names(&["Id"]);
        first.add_row_values(vec![RowValues::Int(1)]).unwrap();
        first.add_row_values(vec![RowValues::Int(2)]).unwrap();
        let mut second = ResultSet::with_column_names(&["Name"]);
        second
            .add_row_values(vec![RowValues::Text("a".into())])
            .unwrap();
        vec![first, second]
    }

    #[test]
    fn walks_rows_and_sets() {
        let mut cursor = BufferedCursor::new(two_sets(), CommandBehavior::DEFAULT);
        assert!(cursor.value(0).is_err());
        assert!(cursor.read().unwrap());
        assert_eq!(cursor.value(0).unwrap(), &RowValues::Int(1));
        assert!(cursor.read().unwrap());
        assert!(!cursor.read().unwrap());
        assert!(cursor.value(0).is_err());

        assert!(cursor.next_result().unwrap());
        assert_eq!(cursor.columns().unwrap()[0].name, "Name");
        assert!(cursor.read().unwrap());
        assert!(matches!(
            cursor.value(3),
            Err(SprocDbError::ArgumentError(_))
        ));

        assert!(!cursor.next_result().unwrap());
        assert!(matches!(cursor.read(), Err(SprocDbError::InvalidState(_))));
        assert!(!cursor.has_rows());
        assert!(!cursor.next_result().unwrap());
    }

    #[test]
    fn behavior_limits_sets_and_rows() {
        let mut cursor = BufferedCursor::new(
            two_sets(),
            CommandBehavior::SINGLE_RESULT | CommandBehavior::SINGLE_ROW,
        );
        assert!(cursor.read().unwrap());
        assert!(!cursor.read().unwrap());
        assert!(!cursor.next_result().unwrap());

        let cursor = BufferedCursor::new(two_sets(), CommandBehavior::SCHEMA_ONLY);
        assert!(!cursor.has_rows());
        assert_eq!(cursor.columns().unwrap().len(), 1);
    }

    #[test]
    fn no_result_sets_reads_as_empty() {
        let mut cursor = BufferedCursor::new(Vec::new(), CommandBehavior::DEFAULT);
        assert!(cursor.columns().unwrap().is_empty());
        assert!(!cursor.read().unwrap());
        assert!(!cursor.next_result().unwrap());
    }
}
