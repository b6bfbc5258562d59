//! Scripted in-memory driver.
//!
//! Each procedure name maps to a [`ProcedureScript`] describing what an execution returns:
//! result sets, output values, an affected-row count, or a failure. Every executed call is
//! recorded so tests can inspect the parameters that reached the driver.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::command::{CommandBehavior, ProcedureCall};
use crate::driver::{
    AsyncDbConnection, ConnectionState, DbConnection, NonQueryOutcome, ReaderOutcome,
    run_cancellable,
};
use crate::error::SprocDbError;
use crate::parameter::OutputValues;
use crate::results::{BufferedCursor, ResultSet};
use crate::types::RowValues;

/// Failure raised by a [`ProcedureScript`] or an unknown procedure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct MemoryDriverError(pub String);

/// What one execution of a procedure produces.
#[derive(Debug, Clone)]
pub struct ProcedureScript {
    result_sets: Vec<ResultSet>,
    outputs: OutputValues,
    rows_affected: i64,
    failure: Option<String>,
}

impl Default for ProcedureScript {
    fn default() -> Self {
        Self {
            result_sets: Vec::new(),
            outputs: Vec::new(),
            rows_affected: -1,
            failure: None,
        }
    }
}

impl ProcedureScript {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn result_set(mut self, set: ResultSet) -> Self {
        self.result_sets.push(set);
        self
    }

    #[must_use]
    pub fn output(mut self, name: &str, value: impl Into<RowValues>) -> Self {
        self.outputs.push((name.to_string(), value.into()));
        self
    }

    /// Count reported by non-query executions; -1 (no count) unless set.
    #[must_use]
    pub fn rows_affected(mut self, rows: i64) -> Self {
        self.rows_affected = rows;
        self
    }

    /// Make every execution fail with a driver error carrying `message`.
    #[must_use]
    pub fn fails_with(mut self, message: &str) -> Self {
        self.failure = Some(message.to_string());
        self
    }
}

/// In-memory [`DbConnection`] / [`AsyncDbConnection`] for tests and benchmarks.
#[derive(Debug, Clone)]
pub struct MemoryConnection {
    state: ConnectionState,
    default_schema: Option<String>,
    procedures: HashMap<String, ProcedureScript>,
    supports_commands: bool,
    latency: Duration,
    fail_on_close: bool,
    calls: Vec<ProcedureCall>,
    open_count: usize,
    close_count: usize,
}

impl Default for MemoryConnection {
    fn default() -> Self {
        Self {
            state: ConnectionState::Closed,
            default_schema: None,
            procedures: HashMap::new(),
            supports_commands: true,
            latency: Duration::ZERO,
            fail_on_close: false,
            calls: Vec::new(),
            open_count: 0,
            close_count: 0,
        }
    }
}

impl MemoryConnection {
    /// A closed connection with no procedures and no default schema.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_default_schema(mut self, schema: &str) -> Self {
        self.default_schema = Some(schema.to_string());
        self
    }

    /// Register `script` under `name`; lookups ignore ASCII case.
    #[must_use]
    pub fn with_procedure(mut self, name: &str, script: ProcedureScript) -> Self {
        self.procedures.insert(name.to_ascii_lowercase(), script);
        self
    }

    #[must_use]
    pub fn with_state(mut self, state: ConnectionState) -> Self {
        self.state = state;
        self
    }

    /// Refuse to create commands, like a driver without stored-procedure support.
    #[must_use]
    pub fn without_command_support(mut self) -> Self {
        self.supports_commands = false;
        self
    }

    /// Delay applied by the async open and execute paths.
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Make `close` report a failure (the connection still ends up closed).
    #[must_use]
    pub fn fail_on_close(mut self) -> Self {
        self.fail_on_close = true;
        self
    }

    /// Every call executed so far, in order.
    #[must_use]
    pub fn calls(&self) -> &[ProcedureCall] {
        &self.calls
    }

    #[must_use]
    pub fn last_call(&self) -> Option<&ProcedureCall> {
        self.calls.last()
    }

    #[must_use]
    pub fn open_count(&self) -> usize {
        self.open_count
    }

    #[must_use]
    pub fn close_count(&self) -> usize {
        self.close_count
    }

    fn run(&mut self, call: &ProcedureCall) -> Result<&ProcedureScript, SprocDbError> {
        if self.state != ConnectionState::Open {
            return Err(SprocDbError::InvalidState(format!(
                "connection must be open to execute (state: {:?})",
                self.state
            )));
        }
        self.calls.push(call.clone());
        let script = self
            .procedures
            .get(&call.command_text.to_ascii_lowercase())
            .ok_or_else(|| {
                SprocDbError::driver(MemoryDriverError(format!(
                    "could not find stored procedure '{}'",
                    call.command_text
                )))
            })?;
        match &script.failure {
            Some(message) => Err(SprocDbError::driver(MemoryDriverError(message.clone()))),
            None => Ok(script),
        }
    }

    async fn delay(&self, ct: &CancellationToken, operation: &str) -> Result<(), SprocDbError> {
        let latency = self.latency;
        run_cancellable(ct, operation, async move {
            if !latency.is_zero() {
                tokio::time::sleep(latency).await;
            }
            Ok(())
        })
        .await
    }
}

impl DbConnection for MemoryConnection {
    fn state(&self) -> ConnectionState {
        self.state
    }

    fn default_schema(&self) -> Option<&str> {
        self.default_schema.as_deref()
    }

    fn create_command(&self) -> Result<ProcedureCall, SprocDbError> {
        if self.supports_commands {
            Ok(ProcedureCall::default())
        } else {
            Err(SprocDbError::Unimplemented(
                "this connection cannot create commands".to_string(),
            ))
        }
    }

    fn open(&mut self) -> Result<(), SprocDbError> {
        if self.state != ConnectionState::Closed {
            return Err(SprocDbError::InvalidState(format!(
                "cannot open a connection in state {:?}",
                self.state
            )));
        }
        self.state = ConnectionState::Open;
        self.open_count += 1;
        Ok(())
    }

    fn close(&mut self) -> Result<(), SprocDbError> {
        if self.state == ConnectionState::Closed {
            return Ok(());
        }
        self.state = ConnectionState::Closed;
        self.close_count += 1;
        if self.fail_on_close {
            return Err(SprocDbError::driver(MemoryDriverError(
                "close failed".to_string(),
            )));
        }
        Ok(())
    }

    fn execute_reader(
        &mut self,
        call: &ProcedureCall,
        behavior: CommandBehavior,
    ) -> Result<ReaderOutcome<'_>, SprocDbError> {
        let script = self.run(call)?;
        let cursor = BufferedCursor::new(script.result_sets.clone(), behavior);
        Ok(ReaderOutcome {
            cursor: Box::new(cursor),
            outputs: script.outputs.clone(),
        })
    }

    fn execute_non_query(&mut self, call: &ProcedureCall) -> Result<NonQueryOutcome, SprocDbError> {
        let script = self.run(call)?;
        Ok(NonQueryOutcome {
            rows_affected: script.rows_affected,
            outputs: script.outputs.clone(),
        })
    }
}

#[async_trait]
impl AsyncDbConnection for MemoryConnection {
    async fn open_async(&mut self, ct: &CancellationToken) -> Result<(), SprocDbError> {
        self.delay(ct, "open").await?;
        self.open()
    }

    async fn execute_reader_async<'a>(
        &'a mut self,
        call: &ProcedureCall,
        behavior: CommandBehavior,
        ct: &CancellationToken,
    ) -> Result<ReaderOutcome<'a>, SprocDbError> {
        self.delay(ct, "execute").await?;
        self.execute_reader(call, behavior)
    }

    async fn execute_non_query_async(
        &mut self,
        call: &ProcedureCall,
        ct: &CancellationToken,
    ) -> Result<NonQueryOutcome, SprocDbError> {
        self.delay(ct, "execute").await?;
        self.execute_non_query(call)
    }
}
