use tokio_util::sync::CancellationToken;

use crate::command::SprocCommand;
use crate::driver::{AsyncDbConnection, ConnectionState, DbConnection, ReaderOutcome};
use crate::error::SprocDbError;
use crate::parameter::ParameterSet;
use crate::results::SpResultsReader;

use super::ExecOptions;
use super::scope::ConnectionScope;

pub(super) type NoOutputHandler = fn(&ParameterSet) -> Result<(), SprocDbError>;

impl<C: DbConnection + ?Sized> SprocCommand<'_, C> {
    /// Execute the procedure and hand its result sets to `handle_results`.
    ///
    /// The handler runs synchronously while the cursor is live; whatever it returns is
    /// returned from here once the connection has been released.
    ///
    /// # Errors
    /// `InvalidState` for an unbound command, driver failures (unchanged), or the
    /// handler's own error. The connection is closed on every path when managed.
    pub fn execute_stored_proc<R, H>(
        self,
        options: ExecOptions,
        handle_results: H,
    ) -> Result<R, SprocDbError>
    where
        H: FnOnce(&mut SpResultsReader<'_>) -> Result<R, SprocDbError>,
    {
        self.run_reader(options, None::<NoOutputHandler>, handle_results)
    }

    /// Like [`execute_stored_proc`](Self::execute_stored_proc), calling `output_handler`
    /// with the output parameter values before `handle_results` runs.
    ///
    /// # Errors
    /// As `execute_stored_proc`, plus the output handler's error.
    pub fn execute_stored_proc_with_output<R, O, H>(
        self,
        options: ExecOptions,
        output_handler: O,
        handle_results: H,
    ) -> Result<R, SprocDbError>
    where
        O: FnOnce(&ParameterSet) -> Result<(), SprocDbError>,
        H: FnOnce(&mut SpResultsReader<'_>) -> Result<R, SprocDbError>,
    {
        self.run_reader(options, Some(output_handler), handle_results)
    }

    fn run_reader<R, O, H>(
        self,
        options: ExecOptions,
        output_handler: Option<O>,
        handle_results: H,
    ) -> Result<R, SprocDbError>
    where
        O: FnOnce(&ParameterSet) -> Result<(), SprocDbError>,
        H: FnOnce(&mut SpResultsReader<'_>) -> Result<R, SprocDbError>,
    {
        self.ensure_bound()?;
        let SprocCommand { conn, mut call } = self;

        let mut scope = ConnectionScope::new(conn, options.closes_on_exit());
        if options.manage_connection && scope.state() == ConnectionState::Closed {
            scope.open()?;
        }

        tracing::debug!(
            procedure = %call.command_text,
            parameters = call.parameters.len(),
            "executing stored procedure"
        );
        let result = {
            let ReaderOutcome { cursor, outputs } = scope.execute_reader(&call, options.behavior)?;
            call.parameters.apply_outputs(outputs);
            let mut reader = SpResultsReader::new(cursor);
            if let Some(handler) = output_handler {
                handler(&call.parameters)?;
            }
            handle_results(&mut reader)?
        };

        scope.finish()?;
        tracing::debug!(procedure = %call.command_text, "stored procedure completed");
        Ok(result)
    }
}

impl<C: AsyncDbConnection + ?Sized> SprocCommand<'_, C> {
    /// Async [`execute_stored_proc`](Self::execute_stored_proc). Opening and executing
    /// observe `ct`; the handler itself runs synchronously.
    ///
    /// # Errors
    /// `Cancelled` if `ct` fires during open or execute, otherwise as the sync form.
    pub async fn execute_stored_proc_async<R, H>(
        self,
        options: ExecOptions,
        ct: &CancellationToken,
        handle_results: H,
    ) -> Result<R, SprocDbError>
    where
        H: FnOnce(&mut SpResultsReader<'_>) -> Result<R, SprocDbError>,
    {
        self.run_reader_async(options, ct, None::<NoOutputHandler>, handle_results)
            .await
    }

    /// Async [`execute_stored_proc_with_output`](Self::execute_stored_proc_with_output).
    ///
    /// # Errors
    /// `Cancelled` if `ct` fires during open or execute, otherwise as the sync form.
    pub async fn execute_stored_proc_with_output_async<R, O, H>(
        self,
        options: ExecOptions,
        ct: &CancellationToken,
        output_handler: O,
        handle_results: H,
    ) -> Result<R, SprocDbError>
    where
        O: FnOnce(&ParameterSet) -> Result<(), SprocDbError>,
        H: FnOnce(&mut SpResultsReader<'_>) -> Result<R, SprocDbError>,
    {
        self.run_reader_async(options, ct, Some(output_handler), handle_results)
            .await
    }

    async fn run_reader_async<R, O, H>(
        self,
        options: ExecOptions,
        ct: &CancellationToken,
        output_handler: Option<O>,
        handle_results: H,
    ) -> Result<R, SprocDbError>
    where
        O: FnOnce(&ParameterSet) -> Result<(), SprocDbError>,
        H: FnOnce(&mut SpResultsReader<'_>) -> Result<R, SprocDbError>,
    {
        self.ensure_bound()?;
        let SprocCommand { conn, mut call } = self;

        let mut scope = ConnectionScope::new(conn, options.closes_on_exit());
        if options.manage_connection && scope.state() == ConnectionState::Closed {
            scope.open_async(ct).await?;
        }

        tracing::debug!(
            procedure = %call.command_text,
            parameters = call.parameters.len(),
            "executing stored procedure asynchronously"
        );
        let result = {
            let ReaderOutcome { cursor, outputs } = scope
                .execute_reader_async(&call, options.behavior, ct)
                .await?;
            call.parameters.apply_outputs(outputs);
            let mut reader = SpResultsReader::new(cursor);
            if let Some(handler) = output_handler {
                handler(&call.parameters)?;
            }
            handle_results(&mut reader)?
        };

        scope.finish()?;
        tracing::debug!(procedure = %call.command_text, "stored procedure completed");
        Ok(result)
    }
}
