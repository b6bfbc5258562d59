//! Contracts a relational driver implements to run stored-procedure commands.
//!
//! The executor only needs ADO-style primitives: open/close, execute a command into a
//! forward-only cursor (or into an affected-row count), and report output parameter
//! values. Implementations live in [`crate::mssql`] and [`crate::test_utils`].

use std::future::Future;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::command::{CommandBehavior, ProcedureCall};
use crate::error::SprocDbError;
use crate::parameter::OutputValues;
use crate::results::ResultCursor;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Closed,
    Open,
    /// The connection failed and must be closed before it can be reopened.
    Broken,
}

/// Cursor plus output values produced by a reader execution.
pub struct ReaderOutcome<'a> {
    pub cursor: Box<dyn ResultCursor + 'a>,
    pub outputs: OutputValues,
}

/// Result of a non-query execution.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NonQueryOutcome {
    /// Rows affected, or -1 when the server did not report a count.
    pub rows_affected: i64,
    pub outputs: OutputValues,
}

/// Synchronous driver connection.
pub trait DbConnection: Send {
    fn state(&self) -> ConnectionState;

    /// Schema prepended to procedure names when loading a command.
    fn default_schema(&self) -> Option<&str> {
        None
    }

    /// Create an empty native command.
    ///
    /// # Errors
    /// Drivers that cannot run stored procedures return `Unimplemented`.
    fn create_command(&self) -> Result<ProcedureCall, SprocDbError> {
        Ok(ProcedureCall::default())
    }

    /// # Errors
    /// Driver failures while connecting.
    fn open(&mut self) -> Result<(), SprocDbError>;

    /// Closing an already closed connection is a no-op.
    ///
    /// # Errors
    /// Driver failures while disconnecting.
    fn close(&mut self) -> Result<(), SprocDbError>;

    /// Run `call` and expose its result sets.
    ///
    /// # Errors
    /// Driver failures, passed through unchanged.
    fn execute_reader(
        &mut self,
        call: &ProcedureCall,
        behavior: CommandBehavior,
    ) -> Result<ReaderOutcome<'_>, SprocDbError>;

    /// Run `call` without reading rows.
    ///
    /// # Errors
    /// Driver failures, passed through unchanged.
    fn execute_non_query(&mut self, call: &ProcedureCall) -> Result<NonQueryOutcome, SprocDbError>;
}

/// Asynchronous driver connection. Opening and executing are the only suspension points.
#[async_trait]
pub trait AsyncDbConnection: DbConnection {
    /// # Errors
    /// `Cancelled` if `ct` fires first, otherwise driver failures.
    async fn open_async(&mut self, ct: &CancellationToken) -> Result<(), SprocDbError>;

    /// # Errors
    /// `Cancelled` if `ct` fires first, otherwise driver failures.
    async fn execute_reader_async<'a>(
        &'a mut self,
        call: &ProcedureCall,
        behavior: CommandBehavior,
        ct: &CancellationToken,
    ) -> Result<ReaderOutcome<'a>, SprocDbError>;

    /// # Errors
    /// `Cancelled` if `ct` fires first, otherwise driver failures.
    async fn execute_non_query_async(
        &mut self,
        call: &ProcedureCall,
        ct: &CancellationToken,
    ) -> Result<NonQueryOutcome, SprocDbError>;
}

/// Await `fut` unless `ct` fires first, in which case the future is dropped.
///
/// # Errors
/// `Cancelled` naming `operation`, or the future's own error.
pub async fn run_cancellable<F, T>(
    ct: &CancellationToken,
    operation: &str,
    fut: F,
) -> Result<T, SprocDbError>
where
    F: Future<Output = Result<T, SprocDbError>>,
{
    tokio::select! {
        biased;
        () = ct.cancelled() => Err(SprocDbError::Cancelled(operation.to_string())),
        res = fut => res,
    }
}
