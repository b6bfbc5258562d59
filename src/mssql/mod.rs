// MSSQL module - SQL Server driver for stored-procedure commands
//
// - config: Connection options, builder, and environment loading
// - client: Raw client creation
// - params: Type names, identifier quoting, and value binding
// - query: Batch rendering for procedure calls and result collection
// - connection: `DbConnection` / `AsyncDbConnection` implementation

pub mod client;
pub mod config;
pub mod connection;
pub mod params;
pub mod query;

// Re-export the public API
pub use client::{MssqlClient, create_mssql_client};
pub use config::{MssqlOptions, MssqlOptionsBuilder};
pub use connection::MssqlConnection;
pub use query::{ExecBatch, render_exec_batch};
