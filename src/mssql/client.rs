use tiberius::{Client, Config, SqlBrowser};
use tokio::net::TcpStream;
use tokio_util::compat::TokioAsyncWriteCompatExt;

use super::config::MssqlClient;
use crate::error::SqlProcError;

/// Open a new SQL Server connection.
///
/// Named instances are resolved through the SQL Server Browser service.
///
/// # Errors
/// Returns `SqlProcError::ConnectionError` if the TCP connection or the TDS login fails.
pub async fn create_mssql_client(config: &Config) -> Result<MssqlClient, SqlProcError> {
    tracing::debug!(addr = %config.get_addr(), "connecting to SQL Server");

    let tcp = TcpStream::connect_named(config)
        .await
        .map_err(|e| SqlProcError::ConnectionError(format!("TCP connection error: {e}")))?;
    tcp.set_nodelay(true)
        .map_err(|e| SqlProcError::ConnectionError(format!("TCP configuration error: {e}")))?;

    let client = Client::connect(config.clone(), tcp.compat_write())
        .await
        .map_err(|e| {
            SqlProcError::ConnectionError(format!("SQL Server connection error: {e}"))
        })?;

    tracing::debug!("connected to SQL Server");
    Ok(client)
}
