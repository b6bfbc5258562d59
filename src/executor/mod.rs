//! Runs a [`SprocCommand`](crate::command::SprocCommand) against its connection.
//!
//! With `manage_connection` (the default) the executor opens a closed connection and
//! always closes it before returning, whether the driver, a handler, or a cancellation
//! token ended the call. Callers composing several commands on one externally managed
//! connection turn it off.

mod dml;
mod reader;
mod scope;

use crate::command::CommandBehavior;

/// Execution options shared by the reader and non-query executors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecOptions {
    pub behavior: CommandBehavior,
    pub manage_connection: bool,
}

impl Default for ExecOptions {
    fn default() -> Self {
        Self {
            behavior: CommandBehavior::DEFAULT,
            manage_connection: true,
        }
    }
}

impl ExecOptions {
    #[must_use]
    pub fn behavior(mut self, behavior: CommandBehavior) -> Self {
        self.behavior = behavior;
        self
    }

    #[must_use]
    pub fn manage_connection(mut self, manage: bool) -> Self {
        self.manage_connection = manage;
        self
    }

    pub(crate) fn closes_on_exit(self) -> bool {
        self.manage_connection || self.behavior.contains(CommandBehavior::CLOSE_CONNECTION)
    }
}
