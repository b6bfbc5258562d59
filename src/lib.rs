#![forbid(unsafe_code)]

//! Fluent stored-procedure commands with typed row mapping.
//!
//! Load a procedure on any [`DbConnection`](driver::DbConnection), bind scalar, output,
//! and table-valued parameters, then execute it and map each result set into plain
//! structs through a [`SpResultsReader`](results::SpResultsReader).
//!
//! ```rust
//! use sproc_middleware::prelude::*;
//! use sproc_middleware::test_utils::{MemoryConnection, ProcedureScript};
//!
//! #[derive(Debug, Default)]
//! struct Employee {
//!     id: i32,
//!     name: String,
//! }
//! sproc_middleware::impl_mappable!(Employee { id: i32, name: String });
//!
//! # fn main() -> Result<(), SprocDbError> {
//! let rows = ResultSet::with_column_names(&["ID", "NAME"])
//!     .row(vec![RowValues::Int(1), RowValues::Text("Ada".into())])?;
//! let mut conn = MemoryConnection::new()
//!     .with_default_schema("dbo")
//!     .with_procedure("dbo.spGetEmployees", ProcedureScript::new().result_set(rows));
//!
//! let employees = conn
//!     .load_stored_proc("spGetEmployees")?
//!     .execute_stored_proc(ExecOptions::default(), |r| r.read_to_list::<Employee>())?;
//! assert_eq!(employees[0].name, "Ada");
//! # Ok(())
//! # }
//! ```

#[macro_use]
mod macros;

pub mod command;
pub mod conversion;
pub mod driver;
pub mod error;
pub mod executor;
pub mod mapper;
pub mod parameter;
pub mod prelude;
pub mod results;
pub mod table;
pub mod types;

#[cfg(feature = "mssql")]
pub mod mssql;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use error::SprocDbError;
