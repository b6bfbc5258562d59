use thiserror::Error;

#[cfg(feature = "mssql")]
use tiberius;

/// Boxed error raised by a driver implementation.
pub type DriverError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum SprocDbError {
    #[cfg(feature = "mssql")]
    #[error(transparent)]
    MssqlError(#[from] tiberius::error::Error),

    /// Failure reported by the underlying driver, passed through untouched.
    #[error(transparent)]
    Driver(DriverError),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Invalid argument: {0}")]
    ArgumentError(String),

    #[error("Operation cancelled: {0}")]
    Cancelled(String),

    #[error("Cannot map column `{column}`: {message}")]
    Mapping { column: String, message: String },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Parameter conversion error: {0}")]
    ParameterError(String),

    #[error("SQL execution error: {0}")]
    ExecutionError(String),

    #[error("Unimplemented feature: {0}")]
    Unimplemented(String),
}

impl SprocDbError {
    /// Wrap any driver error without reinterpreting it.
    pub fn driver<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        SprocDbError::Driver(Box::new(err))
    }

    pub(crate) fn mapping(column: impl Into<String>, message: impl Into<String>) -> Self {
        SprocDbError::Mapping {
            column: column.into(),
            message: message.into(),
        }
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, SprocDbError::Cancelled(_))
    }
}
