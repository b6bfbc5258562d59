//! Convenient imports for common functionality.
//!
//! This module re-exports the most commonly used types and traits
//! to make it easier to get started with the library.

pub use crate::command::{
    CommandBehavior, CommandType, LoadOptions, ProcedureCall, SprocCommand, StoredProcExt,
};
pub use crate::conversion::{ConversionError, ParamValue, SqlField};
pub use crate::driver::{AsyncDbConnection, ConnectionState, DbConnection};
pub use crate::error::SprocDbError;
pub use crate::executor::ExecOptions;
pub use crate::mapper::{Mappable, PropertyMap};
pub use crate::parameter::{
    ParamConfig, ParameterDirection, ParameterSet, ParameterValue, SqlParameter,
};
pub use crate::results::{ColumnSchema, ResultSet, SpResultsReader};
pub use crate::table::{ColumnSql, TableRecord, TableValue};
pub use crate::types::{DbType, RowValues};
pub use crate::{impl_mappable, impl_table_record};

pub use tokio_util::sync::CancellationToken;

#[cfg(feature = "mssql")]
pub use crate::mssql::{MssqlConnection, MssqlOptions};
