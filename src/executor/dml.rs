use tokio_util::sync::CancellationToken;

use crate::command::SprocCommand;
use crate::driver::{AsyncDbConnection, ConnectionState, DbConnection, NonQueryOutcome};
use crate::error::SprocDbError;
use crate::parameter::ParameterSet;

use super::ExecOptions;
use super::reader::NoOutputHandler;
use super::scope::ConnectionScope;

impl<C: DbConnection + ?Sized> SprocCommand<'_, C> {
    /// Execute the procedure without reading rows and return the affected-row count.
    ///
    /// A closed connection is opened whether or not it is managed; it is closed again only
    /// when managed. The count is -1 when the server reports none (e.g. `SET NOCOUNT ON`).
    ///
    /// Driver notes for SQL Server (`MssqlConnection`):
    /// a procedure with any output or return-value parameter, `with_error_params` included,
    /// always reports -1 because its outputs are read back as a row. Otherwise the count is
    /// the sum of every count the server reports, so rows returned by `SELECT`s inside
    /// the procedure are counted along with `INSERT`/`UPDATE`/`DELETE` rows.
    ///
    /// # Errors
    /// `InvalidState` for an unbound command, or driver failures (unchanged).
    pub fn execute_stored_non_query(self, options: ExecOptions) -> Result<i64, SprocDbError> {
        self.run_non_query(options, None::<NoOutputHandler>)
    }

    /// Like [`execute_stored_non_query`](Self::execute_stored_non_query), calling
    /// `output_handler` with the output parameter values after execution.
    ///
    /// # Errors
    /// As `execute_stored_non_query`, plus the output handler's error.
    pub fn execute_stored_non_query_with_output<O>(
        self,
        options: ExecOptions,
        output_handler: O,
    ) -> Result<i64, SprocDbError>
    where
        O: FnOnce(&ParameterSet) -> Result<(), SprocDbError>,
    {
        self.run_non_query(options, Some(output_handler))
    }

    fn run_non_query<O>(
        self,
        options: ExecOptions,
        output_handler: Option<O>,
    ) -> Result<i64, SprocDbError>
    where
        O: FnOnce(&ParameterSet) -> Result<(), SprocDbError>,
    {
        self.ensure_bound()?;
        let SprocCommand { conn, mut call } = self;

        let mut scope = ConnectionScope::new(conn, options.closes_on_exit());
        if scope.state() == ConnectionState::Closed {
            scope.open()?;
        }

        let NonQueryOutcome {
            rows_affected,
            outputs,
        } = scope.execute_non_query(&call)?;
        call.parameters.apply_outputs(outputs);
        if let Some(handler) = output_handler {
            handler(&call.parameters)?;
        }

        scope.finish()?;
        tracing::debug!(procedure = %call.command_text, rows_affected, "stored procedure completed");
        Ok(rows_affected)
    }
}

impl<C: AsyncDbConnection + ?Sized> SprocCommand<'_, C> {
    /// Async [`execute_stored_non_query`](Self::execute_stored_non_query).
    ///
    /// # Errors
    /// `Cancelled` if `ct` fires during open or execute, otherwise as the sync form.
    pub async fn execute_stored_non_query_async(
        self,
        options: ExecOptions,
        ct: &CancellationToken,
    ) -> Result<i64, SprocDbError> {
        self.run_non_query_async(options, ct, None::<NoOutputHandler>)
            .await
    }

    /// Async [`execute_stored_non_query_with_output`](Self::execute_stored_non_query_with_output).
    ///
    /// # Errors
    /// `Cancelled` if `ct` fires during open or execute, otherwise as the sync form.
    pub async fn execute_stored_non_query_with_output_async<O>(
        self,
        options: ExecOptions,
        ct: &CancellationToken,
        output_handler: O,
    ) -> Result<i64, SprocDbError>
    where
        O: FnOnce(&ParameterSet) -> Result<(), SprocDbError>,
    {
        self.run_non_query_async(options, ct, Some(output_handler))
            .await
    }

    async fn run_non_query_async<O>(
        self,
        options: ExecOptions,
        ct: &CancellationToken,
        output_handler: Option<O>,
    ) -> Result<i64, SprocDbError>
    where
        O: FnOnce(&ParameterSet) -> Result<(), SprocDbError>,
    {
        self.ensure_bound()?;
        let SprocCommand { conn, mut call } = self;

        let mut scope = ConnectionScope::new(conn, options.closes_on_exit());
        if scope.state() == ConnectionState::Closed {
            scope.open_async(ct).await?;
        }

        let NonQueryOutcome {
            rows_affected,
            outputs,
        } = scope.execute_non_query_async(&call, ct).await?;
        call.parameters.apply_outputs(outputs);
        if let Some(handler) = output_handler {
            handler(&call.parameters)?;
        }

        scope.finish()?;
        tracing::debug!(procedure = %call.command_text, rows_affected, "stored procedure completed");
        Ok(rows_affected)
    }
}
