use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::client::{MssqlClient, create_mssql_client};
use super::config::MssqlOptions;
use super::query::{ExecBatch, collect_result_sets, render_exec_batch, split_outputs};
use crate::command::{CommandBehavior, ProcedureCall};
use crate::driver::{
    AsyncDbConnection, ConnectionState, DbConnection, NonQueryOutcome, ReaderOutcome,
    run_cancellable,
};
use crate::error::SprocDbError;
use crate::results::{BufferedCursor, ResultSet};

/// SQL Server connection driven by tiberius.
///
/// Only the async operations talk to the server; the sync `open`/`execute_*` methods
/// report `Unimplemented`. A failed, cancelled, or timed-out execution drops the client and
/// the connection reports `Broken` until it is closed.
///
/// Non-query counts differ from ADO: a call with output or return-value parameters reports
/// -1, and other calls sum every statement count, `SELECT`s included.
pub struct MssqlConnection {
    options: MssqlOptions,
    client: Option<MssqlClient>,
    broken: bool,
}

impl std::fmt::Debug for MssqlConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MssqlConnection")
            .field("options", &self.options)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl MssqlConnection {
    /// A closed connection; nothing is dialled until it is opened.
    #[must_use]
    pub fn new(options: MssqlOptions) -> Self {
        Self {
            options,
            client: None,
            broken: false,
        }
    }

    #[must_use]
    pub fn options(&self) -> &MssqlOptions {
        &self.options
    }

    fn take_client(&mut self) -> Result<MssqlClient, SprocDbError> {
        self.client
            .take()
            .ok_or_else(|| SprocDbError::InvalidState("the connection is not open".to_string()))
    }

    /// Put the client back after a successful execution. After a failure the TDS stream
    /// may still hold unread tokens, so the client is dropped instead.
    fn restore<T>(&mut self, client: MssqlClient, res: &Result<T, SprocDbError>) {
        if let Err(e) = res {
            tracing::warn!(error = %e, "dropping SQL Server client after a failed execution");
            self.broken = true;
        } else {
            self.client = Some(client);
        }
    }

    async fn run_batch(
        &mut self,
        batch: &ExecBatch,
        timeout: u16,
        ct: &CancellationToken,
    ) -> Result<Vec<ResultSet>, SprocDbError> {
        let mut client = self.take_client()?;
        let res = interruptible(timeout, ct, async {
            let stream = batch.query().query(&mut client).await?;
            collect_result_sets(stream).await
        })
        .await;
        self.restore(client, &res);
        res
    }

    async fn run_counted(
        &mut self,
        batch: &ExecBatch,
        timeout: u16,
        ct: &CancellationToken,
    ) -> Result<Vec<u64>, SprocDbError> {
        let mut client = self.take_client()?;
        let res = interruptible(timeout, ct, async {
            let result = batch.query().execute(&mut client).await?;
            Ok(result.rows_affected().to_vec())
        })
        .await;
        self.restore(client, &res);
        res
    }
}

/// Await `fut` under the command timeout (0 waits indefinitely) and `ct`.
async fn interruptible<T, F>(timeout: u16, ct: &CancellationToken, fut: F) -> Result<T, SprocDbError>
where
    F: Future<Output = Result<T, SprocDbError>>,
{
    if timeout == 0 {
        return run_cancellable(ct, "execute", fut).await;
    }
    let limited = async {
        tokio::time::timeout(Duration::from_secs(u64::from(timeout)), fut)
            .await
            .unwrap_or_else(|_| {
                Err(SprocDbError::ExecutionError(format!(
                    "command timed out after {timeout} seconds"
                )))
            })
    };
    run_cancellable(ct, "execute", limited).await
}

impl DbConnection for MssqlConnection {
    fn state(&self) -> ConnectionState {
        match (&self.client, self.broken) {
            (Some(_), _) => ConnectionState::Open,
            (None, true) => ConnectionState::Broken,
            (None, false) => ConnectionState::Closed,
        }
    }

    fn default_schema(&self) -> Option<&str> {
        self.options.default_schema.as_deref()
    }

    fn open(&mut self) -> Result<(), SprocDbError> {
        Err(SprocDbError::Unimplemented(
            "SQL Server connections open with open_async".to_string(),
        ))
    }

    fn close(&mut self) -> Result<(), SprocDbError> {
        if self.client.take().is_some() {
            tracing::debug!(server = %self.options.server, "closed SQL Server connection");
        }
        self.broken = false;
        Ok(())
    }

    fn execute_reader(
        &mut self,
        _call: &ProcedureCall,
        _behavior: CommandBehavior,
    ) -> Result<ReaderOutcome<'_>, SprocDbError> {
        Err(SprocDbError::Unimplemented(
            "SQL Server commands run with execute_stored_proc_async".to_string(),
        ))
    }

    fn execute_non_query(&mut self, _call: &ProcedureCall) -> Result<NonQueryOutcome, SprocDbError> {
        Err(SprocDbError::Unimplemented(
            "SQL Server commands run with execute_stored_non_query_async".to_string(),
        ))
    }
}

#[async_trait]
impl AsyncDbConnection for MssqlConnection {
    async fn open_async(&mut self, ct: &CancellationToken) -> Result<(), SprocDbError> {
        if self.state() != ConnectionState::Closed {
            return Err(SprocDbError::InvalidState(format!(
                "cannot open a connection in state {:?}",
                self.state()
            )));
        }
        let client = run_cancellable(ct, "open", create_mssql_client(&self.options)).await?;
        self.client = Some(client);
        Ok(())
    }

    async fn execute_reader_async<'a>(
        &'a mut self,
        call: &ProcedureCall,
        behavior: CommandBehavior,
        ct: &CancellationToken,
    ) -> Result<ReaderOutcome<'a>, SprocDbError> {
        let batch = render_exec_batch(call)?;
        tracing::trace!(sql = %batch.sql, binds = batch.binds.len(), "sending stored procedure batch");

        let mut sets = self.run_batch(&batch, call.timeout, ct).await?;
        let outputs = split_outputs(&mut sets, &batch)?;
        Ok(ReaderOutcome {
            cursor: Box::new(BufferedCursor::new(sets, behavior)),
            outputs,
        })
    }

    async fn execute_non_query_async(
        &mut self,
        call: &ProcedureCall,
        ct: &CancellationToken,
    ) -> Result<NonQueryOutcome, SprocDbError> {
        let batch = render_exec_batch(call)?;
        tracing::trace!(sql = %batch.sql, binds = batch.binds.len(), "sending stored procedure batch");

        if batch.has_outputs() {
            // reading the output row consumes the done tokens, so no count is available
            let mut sets = self.run_batch(&batch, call.timeout, ct).await?;
            let outputs = split_outputs(&mut sets, &batch)?;
            return Ok(NonQueryOutcome {
                rows_affected: -1,
                outputs,
            });
        }

        // tiberius reports one count per DONE token without the statement kind, so SELECT
        // row counts are summed in too
        let counts = self.run_counted(&batch, call.timeout, ct).await?;
        let rows_affected = if counts.is_empty() {
            -1
        } else {
            i64::try_from(counts.iter().sum::<u64>()).unwrap_or(i64::MAX)
        };
        Ok(NonQueryOutcome {
            rows_affected,
            outputs: Vec::new(),
        })
    }
}
