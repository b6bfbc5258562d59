use std::ops::BitOr;

use crate::driver::DbConnection;
use crate::error::SprocDbError;
use crate::parameter::ParameterSet;

mod params;

/// How the command text is interpreted by the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CommandType {
    #[default]
    Text,
    StoredProcedure,
}

/// Reader behavior flags, combinable with `|`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct CommandBehavior(u8);

impl CommandBehavior {
    pub const DEFAULT: Self = Self(0);
    /// Expose only the first result set.
    pub const SINGLE_RESULT: Self = Self(0x01);
    /// Expose column information but no rows.
    pub const SCHEMA_ONLY: Self = Self(0x02);
    /// Expose at most one row per result set.
    pub const SINGLE_ROW: Self = Self(0x08);
    /// Close the connection after execution even when it is not managed.
    pub const CLOSE_CONNECTION: Self = Self(0x20);

    #[must_use]
    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for CommandBehavior {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Driver-facing description of a command: target, timeout, and parameters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProcedureCall {
    pub command_text: String,
    pub command_type: CommandType,
    /// Seconds; 0 waits indefinitely.
    pub timeout: u16,
    pub parameters: ParameterSet,
}

impl ProcedureCall {
    /// Whether the command targets a named stored procedure.
    #[must_use]
    pub fn is_bound(&self) -> bool {
        self.command_type == CommandType::StoredProcedure && !self.command_text.is_empty()
    }
}

/// Options for [`StoredProcExt::load_stored_proc_with`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadOptions {
    pub prepend_default_schema: bool,
    pub command_timeout: u16,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            prepend_default_schema: true,
            command_timeout: 30,
        }
    }
}

impl LoadOptions {
    #[must_use]
    pub fn prepend_default_schema(mut self, prepend: bool) -> Self {
        self.prepend_default_schema = prepend;
        self
    }

    #[must_use]
    pub fn command_timeout(mut self, seconds: u16) -> Self {
        self.command_timeout = seconds;
        self
    }
}

/// Single-use stored-procedure command bound to a connection.
///
/// Build it with [`StoredProcExt::load_stored_proc`], attach parameters, then consume it
/// with one of the `execute_*` methods.
/// ```rust
/// use sproc_middleware::prelude::*;
/// use sproc_middleware::test_utils::{MemoryConnection, ProcedureScript};
///
/// # fn main() -> Result<(), SprocDbError> {
/// let mut conn = MemoryConnection::new()
///     .with_default_schema("dbo")
///     .with_procedure("dbo.spTouch", ProcedureScript::new().rows_affected(3));
///
/// let mut cmd = conn.load_stored_proc("spTouch")?;
/// cmd.with_param("Id", 1)?.with_param("Name", "test")?;
/// assert_eq!(cmd.execute_stored_non_query(ExecOptions::default())?, 3);
/// # Ok(())
/// # }
/// ```
pub struct SprocCommand<'c, C: ?Sized> {
    pub(crate) conn: &'c mut C,
    pub(crate) call: ProcedureCall,
}

impl<'c, C: DbConnection + ?Sized> SprocCommand<'c, C> {
    /// Create an unbound command from the connection's native command factory.
    ///
    /// # Errors
    /// Propagates the driver's refusal to create a command.
    pub fn new(conn: &'c mut C) -> Result<Self, SprocDbError> {
        let call = conn.create_command()?;
        Ok(Self { conn, call })
    }

    /// Create a command targeting `proc_name`.
    ///
    /// # Errors
    /// `ArgumentError` for an empty name, or the driver's refusal to create a command.
    pub fn load(
        conn: &'c mut C,
        proc_name: &str,
        options: LoadOptions,
    ) -> Result<Self, SprocDbError> {
        let mut cmd = Self::new(conn)?;
        cmd.call.timeout = options.command_timeout;

        let qualified = match cmd.conn.default_schema() {
            Some(schema) if options.prepend_default_schema => format!("{schema}.{proc_name}"),
            _ => proc_name.to_string(),
        };
        cmd.set_stored_proc(&qualified)?;
        tracing::debug!(procedure = %cmd.call.command_text, timeout = cmd.call.timeout, "loaded stored procedure");
        Ok(cmd)
    }
}

impl<C: ?Sized> SprocCommand<'_, C> {
    /// Point the command at a stored procedure.
    ///
    /// # Errors
    /// `ArgumentError` for an empty name.
    pub fn set_stored_proc(&mut self, proc_name: &str) -> Result<&mut Self, SprocDbError> {
        if proc_name.trim().is_empty() {
            return Err(SprocDbError::ArgumentError(
                "stored procedure name must not be empty".to_string(),
            ));
        }
        self.call.command_text = proc_name.to_string();
        self.call.command_type = CommandType::StoredProcedure;
        Ok(self)
    }

    /// Set the command timeout in seconds (0 waits indefinitely).
    pub fn set_timeout(&mut self, seconds: u16) -> &mut Self {
        self.call.timeout = seconds;
        self
    }

    /// Procedure name as it will be sent, including any schema prefix.
    #[must_use]
    pub fn procedure_name(&self) -> &str {
        &self.call.command_text
    }

    #[must_use]
    pub fn command_type(&self) -> CommandType {
        self.call.command_type
    }

    #[must_use]
    pub fn timeout(&self) -> u16 {
        self.call.timeout
    }

    #[must_use]
    pub fn parameters(&self) -> &ParameterSet {
        &self.call.parameters
    }

    /// The driver-facing description of this command.
    #[must_use]
    pub fn call(&self) -> &ProcedureCall {
        &self.call
    }

    pub(crate) fn ensure_bound(&self) -> Result<(), SprocDbError> {
        if self.call.is_bound() {
            Ok(())
        } else {
            Err(SprocDbError::InvalidState(
                "call load_stored_proc before using this method".to_string(),
            ))
        }
    }
}

/// Entry point for building stored-procedure commands on any connection.
pub trait StoredProcExt: DbConnection {
    /// Load `proc_name` with the default options: schema prefix on, 30 second timeout.
    ///
    /// # Errors
    /// See [`SprocCommand::load`].
    fn load_stored_proc(&mut self, proc_name: &str) -> Result<SprocCommand<'_, Self>, SprocDbError> {
        SprocCommand::load(self, proc_name, LoadOptions::default())
    }

    /// Load `proc_name` with explicit options.
    ///
    /// # Errors
    /// See [`SprocCommand::load`].
    fn load_stored_proc_with(
        &mut self,
        proc_name: &str,
        options: LoadOptions,
    ) -> Result<SprocCommand<'_, Self>, SprocDbError> {
        SprocCommand::load(self, proc_name, options)
    }
}

impl<C: DbConnection + ?Sized> StoredProcExt for C {}
