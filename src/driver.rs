//! What the executor needs from a database client.
//!
//! The executor never talks to a wire protocol directly; it asks a [`ProcedureDriver`] for
//! connections and runs calls through [`ProcedureConnection`]. The SQL Server implementation
//! lives in [`crate::mssql`].

use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::SqlProcError;
use crate::params::Parameter;
use crate::results::ResultSet;
use crate::types::RowValues;

/// SQL Server error number for "statement conflicted with a FOREIGN KEY / REFERENCE constraint".
pub const REFERENTIAL_INTEGRITY_ERROR: u32 = 547;

/// A stored procedure invocation: the procedure name and its parameters in bind order.
#[derive(Debug, Clone, Copy)]
pub struct ProcedureCall<'a> {
    pub procedure: &'a str,
    pub params: &'a [Parameter],
}

impl<'a> ProcedureCall<'a> {
    #[must_use]
    pub fn new(procedure: &'a str, params: &'a [Parameter]) -> Self {
        Self { procedure, params }
    }
}

/// Out-of-band results of a non-query call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProcedureStatus {
    pub rows_affected: u64,
    /// Value of `@RETURN_VALUE`
    pub return_value: RowValues,
    /// Final values of output, input-output and return-value parameters, keyed by name
    pub outputs: HashMap<String, RowValues>,
}

/// Opens connections for the executor.
#[async_trait]
pub trait ProcedureDriver: Send + Sync {
    type Connection: ProcedureConnection;

    /// Open a new connection.
    ///
    /// # Errors
    /// Returns `SqlProcError` if the connection cannot be established.
    async fn connect(&self) -> Result<Self::Connection, SqlProcError>;

    /// Server error number that means a referential-integrity conflict.
    fn constraint_violation_code(&self) -> u32 {
        REFERENTIAL_INTEGRITY_ERROR
    }
}

/// One open connection to the database.
#[async_trait]
pub trait ProcedureConnection: Send {
    /// Run a procedure for its side effects, capturing row count, return value and outputs.
    ///
    /// # Errors
    /// Returns `SqlProcError` if the call fails.
    async fn execute_non_query(
        &mut self,
        call: ProcedureCall<'_>,
    ) -> Result<ProcedureStatus, SqlProcError>;

    /// Run a procedure and return the first column of its first row (`Null` when no rows).
    ///
    /// # Errors
    /// Returns `SqlProcError` if the call fails.
    async fn execute_scalar(&mut self, call: ProcedureCall<'_>) -> Result<RowValues, SqlProcError>;

    /// Run a procedure once and materialize its first result set.
    ///
    /// `row_limit` caps how many rows are kept. When `capture_status` is set the status
    /// (row count, return value, outputs) of the same execution is returned as well.
    ///
    /// # Errors
    /// Returns `SqlProcError` if the call or row decoding fails.
    async fn execute_reader(
        &mut self,
        call: ProcedureCall<'_>,
        capture_status: bool,
        row_limit: Option<usize>,
    ) -> Result<(ResultSet, Option<ProcedureStatus>), SqlProcError>;

    /// # Errors
    /// Returns `SqlProcError` if the server refuses to start a transaction.
    async fn begin_transaction(&mut self) -> Result<(), SqlProcError>;

    /// # Errors
    /// Returns `SqlProcError` if the commit fails.
    async fn commit(&mut self) -> Result<(), SqlProcError>;

    /// # Errors
    /// Returns `SqlProcError` if the rollback fails.
    async fn rollback(&mut self) -> Result<(), SqlProcError>;

    /// Close the connection, releasing server resources.
    ///
    /// # Errors
    /// Returns `SqlProcError` if the close handshake fails; the connection is gone either way.
    async fn close(self) -> Result<(), SqlProcError>
    where
        Self: Sized;
}
