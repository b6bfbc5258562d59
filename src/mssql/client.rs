use tiberius::{Client, SqlBrowser};
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};

use super::config::MssqlOptions;
use crate::error::SprocDbError;

/// Type alias for SQL Server client
pub type MssqlClient = Client<Compat<TcpStream>>;

/// Open a raw tiberius client for `opts`.
///
/// Named instances are resolved through the SQL Browser service; otherwise the host and
/// port are dialled directly.
///
/// # Errors
/// Returns `SprocDbError::ConnectionError` if the TCP connection or login fails.
pub async fn create_mssql_client(opts: &MssqlOptions) -> Result<MssqlClient, SprocDbError> {
    let config = opts.tiberius_config();

    let tcp = if opts.instance_name.is_some() {
        TcpStream::connect_named(&config).await.map_err(|e| {
            SprocDbError::ConnectionError(format!("SQL Browser lookup failed: {e}"))
        })?
    } else {
        TcpStream::connect(config.get_addr())
            .await
            .map_err(|e| SprocDbError::ConnectionError(format!("TCP connection error: {e}")))?
    };
    tcp.set_nodelay(true)
        .map_err(|e| SprocDbError::ConnectionError(format!("TCP configuration error: {e}")))?;

    tracing::debug!(server = %opts.server, database = %opts.database, "connecting to SQL Server");
    Client::connect(config, tcp.compat_write())
        .await
        .map_err(|e| SprocDbError::ConnectionError(format!("SQL Server connection error: {e}")))
}
