use tokio_util::sync::CancellationToken;

use crate::conversion::SqlField;
use crate::error::SprocDbError;
use crate::mapper::{self, Mappable};

use super::cursor::{ColumnSchema, ResultCursor};

/// Reader handed to result handlers: typed extraction over one live result cursor.
///
/// Each `read_*` call consumes (part of) the current result set; call
/// [`next_result`](Self::next_result) to move on when the procedure returns several.
pub struct SpResultsReader<'a> {
    cursor: Box<dyn ResultCursor + 'a>,
}

impl<'a> SpResultsReader<'a> {
    #[must_use]
    pub fn new(cursor: Box<dyn ResultCursor + 'a>) -> Self {
        Self { cursor }
    }

    /// Map every remaining row of the current result set.
    ///
    /// # Errors
    /// `InvalidState` past the last result set, `Mapping` if a value does not fit its
    /// property, or a driver error while reading.
    pub fn read_to_list<T: Mappable>(&mut self) -> Result<Vec<T>, SprocDbError> {
        mapper::map_rows(self.cursor.as_mut())
    }

    /// Map the first row of the current result set; the remaining rows are skipped.
    ///
    /// # Errors
    /// Same as [`read_to_list`](Self::read_to_list).
    pub fn read_to_entity<T: Mappable>(&mut self) -> Result<Option<T>, SprocDbError> {
        mapper::map_first(self.cursor.as_mut())
    }

    /// Read column 0 of the next row as a scalar.
    ///
    /// Returns `None` when there is no row or the value is null.
    ///
    /// # Errors
    /// `Mapping` if the value does not convert to `T`.
    pub fn read_to_value<T: SqlField>(&mut self) -> Result<Option<T>, SprocDbError> {
        if !self.cursor.read()? {
            return Ok(None);
        }
        let value = self.cursor.value(0)?;
        if value.is_null() {
            return Ok(None);
        }
        T::from_row_value(value).map(Some).map_err(|e| {
            let column = self
                .cursor
                .columns()
                .ok()
                .and_then(|cols| cols.first())
                .map_or_else(|| "0".to_string(), |c| c.name.clone());
            SprocDbError::mapping(column, e.to_string())
        })
    }

    /// Columns of the current result set.
    ///
    /// # Errors
    /// `InvalidState` past the last result set.
    pub fn columns(&self) -> Result<&[ColumnSchema], SprocDbError> {
        self.cursor.columns()
    }

    /// Advance to the next result set.
    ///
    /// # Errors
    /// Driver failures while fetching the next result set.
    pub fn next_result(&mut self) -> Result<bool, SprocDbError> {
        self.cursor.next_result()
    }

    /// Async [`next_result`](Self::next_result) that cannot be cancelled.
    ///
    /// # Errors
    /// Driver failures while fetching the next result set.
    pub async fn next_result_async(&mut self) -> Result<bool, SprocDbError> {
        self.cursor
            .next_result_async(&CancellationToken::new())
            .await
    }

    /// Async [`next_result`](Self::next_result) observing `ct`.
    ///
    /// # Errors
    /// `Cancelled` if `ct` fired, otherwise driver failures.
    pub async fn next_result_async_with(
        &mut self,
        ct: &CancellationToken,
    ) -> Result<bool, SprocDbError> {
        self.cursor.next_result_async(ct).await
    }
}

impl std::fmt::Debug for SpResultsReader<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpResultsReader").finish_non_exhaustive()
    }
}
