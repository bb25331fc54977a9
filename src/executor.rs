//! The stored-procedure executor: bind parameters, run a procedure, read its results.

use std::mem;
use std::time::Instant;

use crate::driver::{ProcedureCall, ProcedureConnection, ProcedureDriver, ProcedureStatus};
use crate::error::SqlProcError;
use crate::params::Parameter;
use crate::results::{Record, fill_record, record_from_row};
use crate::transaction::ProcTransaction;
use crate::tx_outcome::TxOutcome;
use crate::types::{Direction, RowValues, SqlType};

/// Values captured from the most recent call. Each call overwrites the fields it produces
/// and leaves the others as they were.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecutionResult {
    /// Rows affected by the last non-query call
    pub rows_affected: Option<u64>,
    /// `@RETURN_VALUE` of the last non-query call in text form, or the server error
    /// number when the call hit a referential-integrity conflict
    pub return_value: Option<String>,
    /// First column of the first row of the last scalar call
    pub scalar_value: Option<RowValues>,
    /// Identifier captured by the last [`ProcedureExecutor::execute_returning_id`] call
    pub generated_id: Option<i64>,
}

/// Runs stored procedures through a [`ProcedureDriver`].
///
/// Parameters bound with [`bind`](Self::bind) are consumed by the next execute or read
/// call, whether it succeeds or not.
///
/// ```rust,no_run
/// use sproc_middleware::prelude::*;
///
/// # async fn demo() -> Result<(), SqlProcError> {
/// let driver = MssqlDriver::from_connection_string(
///     "server=tcp:localhost,1433;database=app;user id=sa;password=secret;TrustServerCertificate=true",
/// )?;
/// let mut exec = ProcedureExecutor::new(driver);
/// exec.bind("UserId", 42, SqlType::Numeric)?;
/// exec.execute("sp_DeleteUser").await?;
/// if exec.return_value() == Some("547") {
///     // the user is still referenced elsewhere
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ProcedureExecutor<D: ProcedureDriver> {
    driver: D,
    pending: Vec<Parameter>,
    last: ExecutionResult,
}

impl<D: ProcedureDriver> ProcedureExecutor<D> {
    #[must_use]
    pub fn new(driver: D) -> Self {
        Self {
            driver,
            pending: Vec::new(),
            last: ExecutionResult::default(),
        }
    }

    #[must_use]
    pub fn driver(&self) -> &D {
        &self.driver
    }

    /// Queue an input parameter for the next call.
    ///
    /// # Errors
    ///
    /// Returns `SqlProcError::ParameterError` for an invalid name or a value that cannot be
    /// represented as `sql_type` (for example malformed guid text). Nothing is queued then.
    pub fn bind(
        &mut self,
        name: &str,
        value: impl Into<RowValues>,
        sql_type: SqlType,
    ) -> Result<&mut Self, SqlProcError> {
        self.bind_with_direction(name, value, sql_type, Direction::Input)
    }

    /// Queue a parameter with an explicit direction for the next call.
    ///
    /// # Errors
    ///
    /// See [`bind`](Self::bind).
    pub fn bind_with_direction(
        &mut self,
        name: &str,
        value: impl Into<RowValues>,
        sql_type: SqlType,
        direction: Direction,
    ) -> Result<&mut Self, SqlProcError> {
        let param = Parameter::new(name, value.into(), sql_type, direction)?;
        self.pending.push(param);
        Ok(self)
    }

    /// Parameters waiting for the next call, in bind order.
    #[must_use]
    pub fn pending_parameters(&self) -> &[Parameter] {
        &self.pending
    }

    #[must_use]
    pub fn last_result(&self) -> &ExecutionResult {
        &self.last
    }

    #[must_use]
    pub fn rows_affected(&self) -> Option<u64> {
        self.last.rows_affected
    }

    #[must_use]
    pub fn return_value(&self) -> Option<&str> {
        self.last.return_value.as_deref()
    }

    #[must_use]
    pub fn scalar_value(&self) -> Option<&RowValues> {
        self.last.scalar_value.as_ref()
    }

    #[must_use]
    pub fn generated_id(&self) -> Option<i64> {
        self.last.generated_id
    }

    /// Run a procedure as a non-query on a fresh connection, capturing rows affected and
    /// the return value.
    ///
    /// Rows affected is the count reported by the procedure's last statement
    /// (`@@ROWCOUNT` right after the call), not a sum over every statement it ran. A
    /// procedure that ends with `SET @x = ...` reports 1.
    ///
    /// A referential-integrity conflict is not an error: the server's error number is
    /// stored as the return value instead.
    ///
    /// # Errors
    ///
    /// Returns `SqlProcError::Procedure` wrapping any other failure.
    pub async fn execute(&mut self, procedure: &str) -> Result<&ExecutionResult, SqlProcError> {
        self.run_non_query(procedure, None).await?;
        Ok(&self.last)
    }

    /// Like [`execute`](Self::execute), and also store the integer value of the output
    /// parameter `id_param` as [`generated_id`](Self::generated_id).
    ///
    /// Rows affected and the return value are recorded even when the id cannot be read.
    ///
    /// # Errors
    ///
    /// Returns `SqlProcError::Procedure` if the call fails or `id_param` did not come back
    /// as an integer.
    pub async fn execute_returning_id(
        &mut self,
        procedure: &str,
        id_param: &str,
    ) -> Result<&ExecutionResult, SqlProcError> {
        let id_param = id_param.trim().trim_start_matches('@').to_string();
        self.run_non_query(procedure, Some(id_param)).await?;
        Ok(&self.last)
    }

    /// Run a procedure and keep the first column of its first row as the scalar value.
    /// Rows affected and the return value are left untouched.
    ///
    /// # Errors
    ///
    /// Returns `SqlProcError::Procedure` wrapping any failure other than a
    /// referential-integrity conflict.
    pub async fn execute_scalar(
        &mut self,
        procedure: &str,
    ) -> Result<&ExecutionResult, SqlProcError> {
        let params = mem::take(&mut self.pending);
        let call = ProcedureCall::new(procedure, &params);
        let started = Instant::now();
        tracing::debug!(procedure, params = params.len(), "executing scalar procedure");

        let result = match self.driver.connect().await {
            Ok(mut conn) => {
                let result = conn.execute_scalar(call).await;
                release(conn).await;
                result
            }
            Err(e) => Err(e),
        };

        match result {
            Ok(value) => {
                tracing::debug!(
                    procedure,
                    duration_ms = elapsed_ms(started),
                    "scalar procedure completed"
                );
                self.last.scalar_value = Some(value);
            }
            Err(err) => self.settle_failure(procedure, err)?,
        }
        Ok(&self.last)
    }

    /// Run a non-query procedure inside the caller's transaction.
    ///
    /// On any failure the transaction is rolled back once before the error is reported
    /// (or, for a referential-integrity conflict, before the error number is stored as the
    /// return value).
    ///
    /// # Errors
    ///
    /// Returns `SqlProcError::Procedure` wrapping the failure.
    pub async fn execute_with_transaction(
        &mut self,
        tx: &mut ProcTransaction<D::Connection>,
        procedure: &str,
    ) -> Result<&ExecutionResult, SqlProcError> {
        self.run_in_transaction(tx, procedure, None).await?;
        Ok(&self.last)
    }

    /// [`execute_with_transaction`](Self::execute_with_transaction) that also stores the
    /// integer output parameter `id_param` as [`generated_id`](Self::generated_id).
    ///
    /// An id that cannot be read counts as a failed call and rolls the transaction back.
    ///
    /// # Errors
    ///
    /// Returns `SqlProcError::Procedure` if the call fails or `id_param` did not come back
    /// as an integer.
    pub async fn execute_with_transaction_returning_id(
        &mut self,
        tx: &mut ProcTransaction<D::Connection>,
        procedure: &str,
        id_param: &str,
    ) -> Result<&ExecutionResult, SqlProcError> {
        let id_param = id_param.trim().trim_start_matches('@').to_string();
        self.run_in_transaction(tx, procedure, Some(id_param)).await?;
        Ok(&self.last)
    }

    /// Run a procedure and copy the columns named by `columns` from its first row into
    /// the template. With no rows the template comes back unchanged.
    ///
    /// # Errors
    ///
    /// Returns `SqlProcError::Procedure` if the call fails or a requested column is not in
    /// the result set.
    pub async fn read_row(
        &mut self,
        procedure: &str,
        mut columns: Record,
    ) -> Result<Record, SqlProcError> {
        let params = mem::take(&mut self.pending);
        let call = ProcedureCall::new(procedure, &params);
        tracing::debug!(procedure, params = params.len(), "reading single row");

        let result = async {
            let mut conn = self.driver.connect().await?;
            let result = conn.execute_reader(call, false, Some(1)).await;
            release(conn).await;
            let (result_set, _) = result?;
            if let Some(row) = result_set.results.first() {
                fill_record(&mut columns, row)?;
            }
            Ok::<_, SqlProcError>(columns)
        }
        .await;

        result.map_err(|err| wrap(procedure, err))
    }

    /// Run a procedure once and build one record per result row holding exactly the keys
    /// of `columns`. Rows affected and the return value of the same execution are captured.
    ///
    /// # Errors
    ///
    /// Returns `SqlProcError::Procedure` if the call fails or any row lacks a requested
    /// column; rows read so far are discarded.
    pub async fn read_row_list(
        &mut self,
        procedure: &str,
        columns: &Record,
    ) -> Result<Vec<Record>, SqlProcError> {
        let params = mem::take(&mut self.pending);
        let call = ProcedureCall::new(procedure, &params);
        let started = Instant::now();
        tracing::debug!(procedure, params = params.len(), "reading row list");

        let result = async {
            let mut conn = self.driver.connect().await?;
            let result = conn.execute_reader(call, true, None).await;
            release(conn).await;
            let (result_set, status) = result?;
            let records = result_set
                .results
                .iter()
                .map(|row| record_from_row(columns, row))
                .collect::<Result<Vec<_>, _>>()?;
            if let Some(status) = status {
                self.record_status(status, None)?;
            }
            Ok::<_, SqlProcError>(records)
        }
        .await;

        match result {
            Ok(records) => {
                tracing::debug!(
                    procedure,
                    rows = records.len(),
                    duration_ms = elapsed_ms(started),
                    "row list read"
                );
                Ok(records)
            }
            Err(err) => Err(wrap(procedure, err)),
        }
    }

    /// Open a connection and begin a transaction on it.
    ///
    /// # Errors
    ///
    /// Returns `SqlProcError` if connecting or starting the transaction fails.
    pub async fn connect(&self) -> Result<ProcTransaction<D::Connection>, SqlProcError> {
        let conn = self.driver.connect().await?;
        ProcTransaction::begin(conn).await
    }

    /// Close and release the transaction's connection if it is still open.
    ///
    /// # Errors
    ///
    /// Returns the driver's error if the close handshake fails.
    pub async fn disconnect(
        &self,
        mut tx: ProcTransaction<D::Connection>,
    ) -> Result<(), SqlProcError> {
        tx.disconnect().await
    }

    /// Commit (`committed == true`) or roll back the caller's transaction.
    ///
    /// # Errors
    ///
    /// See [`ProcTransaction::finish`].
    pub async fn finish_transaction(
        &self,
        tx: &mut ProcTransaction<D::Connection>,
        committed: bool,
    ) -> Result<TxOutcome, SqlProcError> {
        tx.finish(committed).await
    }

    async fn run_in_transaction(
        &mut self,
        tx: &mut ProcTransaction<D::Connection>,
        procedure: &str,
        id_param: Option<String>,
    ) -> Result<(), SqlProcError> {
        let params = mem::take(&mut self.pending);
        let call = ProcedureCall::new(procedure, &params);
        let started = Instant::now();
        tracing::debug!(procedure, params = params.len(), "executing procedure in transaction");

        let result = match tx.connection_mut() {
            Ok(conn) => conn.execute_non_query(call).await,
            Err(e) => Err(e),
        };

        match result.and_then(|status| self.record_status(status, id_param.as_deref())) {
            Ok(()) => {
                tracing::debug!(
                    procedure,
                    rows_affected = self.last.rows_affected,
                    duration_ms = elapsed_ms(started),
                    "procedure completed in transaction"
                );
                Ok(())
            }
            Err(err) => {
                if let Err(rollback_err) = tx.rollback_after_failure().await {
                    tracing::error!(procedure, error = %rollback_err, "rollback after failure failed");
                }
                self.settle_failure(procedure, err)?;
                self.last.rows_affected = Some(0);
                Ok(())
            }
        }
    }

    async fn run_non_query(
        &mut self,
        procedure: &str,
        id_param: Option<String>,
    ) -> Result<(), SqlProcError> {
        let params = mem::take(&mut self.pending);
        let call = ProcedureCall::new(procedure, &params);
        let started = Instant::now();
        tracing::debug!(procedure, params = params.len(), "executing procedure");

        let result = match self.driver.connect().await {
            Ok(mut conn) => {
                let result = conn.execute_non_query(call).await;
                release(conn).await;
                result
            }
            Err(e) => Err(e),
        };

        match result.and_then(|status| self.record_status(status, id_param.as_deref())) {
            Ok(()) => {
                tracing::debug!(
                    procedure,
                    rows_affected = self.last.rows_affected,
                    duration_ms = elapsed_ms(started),
                    "procedure completed"
                );
                Ok(())
            }
            Err(err) => {
                self.settle_failure(procedure, err)?;
                self.last.rows_affected = Some(0);
                Ok(())
            }
        }
    }

    fn record_status(
        &mut self,
        status: ProcedureStatus,
        id_param: Option<&str>,
    ) -> Result<(), SqlProcError> {
        self.last.rows_affected = Some(status.rows_affected);
        self.last.return_value = Some(status.return_value.to_string());
        if let Some(name) = id_param {
            self.last.generated_id = Some(read_generated_id(&status, name)?);
        }
        Ok(())
    }

    /// Turn a referential-integrity conflict into a return value; wrap everything else.
    /// Rows affected are left to the non-query callers.
    fn settle_failure(&mut self, procedure: &str, err: SqlProcError) -> Result<(), SqlProcError> {
        let code = self.driver.constraint_violation_code();
        if err.server_number() == Some(code) {
            tracing::warn!(procedure, code, error = %err, "procedure hit a referential-integrity conflict");
            self.last.return_value = Some(code.to_string());
            return Ok(());
        }
        Err(wrap(procedure, err))
    }
}

fn read_generated_id(status: &ProcedureStatus, name: &str) -> Result<i64, SqlProcError> {
    let value = status
        .outputs
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value)
        .ok_or_else(|| {
            SqlProcError::ExecutionError(format!(
                "output parameter '{name}' was not returned; bind it as Output or InputOutput"
            ))
        })?;
    match value {
        RowValues::Int(id) => Ok(*id),
        RowValues::Decimal(text) | RowValues::Text(text) => text.parse::<i64>().map_err(|_| {
            SqlProcError::ExecutionError(format!(
                "output parameter '{name}' holds '{text}', not an integer id"
            ))
        }),
        other => Err(SqlProcError::ExecutionError(format!(
            "output parameter '{name}' holds {other:?}, not an integer id"
        ))),
    }
}

fn wrap(procedure: &str, err: SqlProcError) -> SqlProcError {
    tracing::error!(procedure, error = %err, "stored procedure failed");
    err.in_procedure(procedure)
}

async fn release<C: ProcedureConnection>(conn: C) {
    if let Err(e) = conn.close().await {
        tracing::warn!(error = %e, "closing connection failed");
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
