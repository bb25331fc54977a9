use async_trait::async_trait;
use tiberius::{Config, Query};

use super::client::create_mssql_client;
use super::config::{MssqlClient, MssqlOptions, config_from_connection_string};
use super::query::{
    ProcedureBatch, RawResult, build_procedure_batch, map_tiberius_error, parse_status,
    run_batch,
};
use crate::driver::{ProcedureCall, ProcedureConnection, ProcedureDriver, ProcedureStatus};
use crate::error::SqlProcError;
use crate::results::ResultSet;
use crate::types::RowValues;

/// Opens SQL Server connections from a fixed configuration.
#[derive(Debug, Clone)]
pub struct MssqlDriver {
    config: Config,
}

impl MssqlDriver {
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn from_options(opts: &MssqlOptions) -> Self {
        Self::new(opts.to_tiberius_config())
    }

    /// # Errors
    ///
    /// Returns `SqlProcError::ConfigError` if the connection string cannot be parsed.
    pub fn from_connection_string(connection_string: &str) -> Result<Self, SqlProcError> {
        config_from_connection_string(connection_string).map(Self::new)
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }
}

#[async_trait]
impl ProcedureDriver for MssqlDriver {
    type Connection = MssqlConnection;

    async fn connect(&self) -> Result<MssqlConnection, SqlProcError> {
        let client = create_mssql_client(&self.config).await?;
        Ok(MssqlConnection { client })
    }
}

/// One SQL Server connection.
pub struct MssqlConnection {
    client: MssqlClient,
}

impl std::fmt::Debug for MssqlConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MssqlConnection")
            .field("client", &"<MssqlClient>")
            .finish()
    }
}

impl MssqlConnection {
    /// Wrap a client opened elsewhere.
    #[must_use]
    pub fn from_client(client: MssqlClient) -> Self {
        Self { client }
    }

    /// Raw client, for statements this crate does not cover.
    pub fn client_mut(&mut self) -> &mut MssqlClient {
        &mut self.client
    }

    async fn simple(&mut self, sql: &str, what: &str) -> Result<(), SqlProcError> {
        Query::new(sql)
            .execute(&mut self.client)
            .await
            .map_err(|e| match map_tiberius_error(e) {
                server @ SqlProcError::Server { .. } => server,
                other => SqlProcError::TransactionError(format!("MSSQL {what} error: {other}")),
            })?;
        Ok(())
    }
}

fn take_status(
    sets: &mut Vec<RawResult>,
    batch: &ProcedureBatch,
) -> Result<ProcedureStatus, SqlProcError> {
    let status = sets.pop().ok_or_else(|| {
        SqlProcError::ExecutionError("procedure returned no status result set".to_string())
    })?;
    parse_status(&status, batch)
}

#[async_trait]
impl ProcedureConnection for MssqlConnection {
    async fn execute_non_query(
        &mut self,
        call: ProcedureCall<'_>,
    ) -> Result<ProcedureStatus, SqlProcError> {
        let batch = build_procedure_batch(call, true)?;
        let mut sets = run_batch(&mut self.client, &batch, call.params, None).await?;
        take_status(&mut sets, &batch)
    }

    async fn execute_scalar(&mut self, call: ProcedureCall<'_>) -> Result<RowValues, SqlProcError> {
        let batch = build_procedure_batch(call, false)?;
        let sets = run_batch(&mut self.client, &batch, call.params, Some(1)).await?;
        Ok(sets
            .into_iter()
            .next()
            .and_then(|set| set.rows.into_iter().next())
            .and_then(|row| row.into_iter().next())
            .unwrap_or(RowValues::Null))
    }

    async fn execute_reader(
        &mut self,
        call: ProcedureCall<'_>,
        capture_status: bool,
        row_limit: Option<usize>,
    ) -> Result<(ResultSet, Option<ProcedureStatus>), SqlProcError> {
        let batch = build_procedure_batch(call, capture_status)?;
        // the status set trails the rows, so a limit only applies when it is not wanted
        let first_limit = if capture_status { None } else { row_limit };
        let mut sets = run_batch(&mut self.client, &batch, call.params, first_limit).await?;

        let status = if capture_status {
            Some(take_status(&mut sets, &batch)?)
        } else {
            None
        };
        let mut result_set = sets
            .into_iter()
            .next()
            .map(RawResult::into_result_set)
            .unwrap_or_default();
        if let Some(limit) = row_limit {
            result_set.truncate(limit);
        }
        Ok((result_set, status))
    }

    async fn begin_transaction(&mut self) -> Result<(), SqlProcError> {
        self.simple("BEGIN TRANSACTION", "begin transaction").await
    }

    async fn commit(&mut self) -> Result<(), SqlProcError> {
        self.simple("COMMIT TRANSACTION", "commit").await
    }

    async fn rollback(&mut self) -> Result<(), SqlProcError> {
        // the server may already have aborted the transaction (XACT_ABORT, severe errors)
        self.simple("IF @@TRANCOUNT > 0 ROLLBACK TRANSACTION", "rollback")
            .await
    }

    async fn close(self) -> Result<(), SqlProcError> {
        self.client
            .close()
            .await
            .map_err(|e| SqlProcError::ConnectionError(format!("SQL Server close error: {e}")))?;
        tracing::debug!("SQL Server connection closed");
        Ok(())
    }
}
