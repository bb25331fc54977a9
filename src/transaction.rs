//! Caller-owned transaction handle shared across several procedure calls.

use crate::driver::ProcedureConnection;
use crate::error::SqlProcError;
use crate::tx_outcome::TxOutcome;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TxState {
    Open,
    RolledBack,
    Finished,
}

/// A connection with an open transaction.
///
/// Created by [`ProcedureExecutor::connect`](crate::executor::ProcedureExecutor::connect)
/// or [`ProcTransaction::begin`] and passed explicitly to every call that should take part
/// in the unit of work. Finish it with [`finish`](ProcTransaction::finish) and release it
/// with [`disconnect`](ProcTransaction::disconnect). Dropping it closes the connection
/// without committing, so the server discards any uncommitted work.
pub struct ProcTransaction<C: ProcedureConnection> {
    conn: Option<C>,
    state: TxState,
}

impl<C: ProcedureConnection> std::fmt::Debug for ProcTransaction<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcTransaction")
            .field("connected", &self.conn.is_some())
            .field("state", &self.state)
            .finish()
    }
}

impl<C: ProcedureConnection> ProcTransaction<C> {
    /// Begin a transaction on an already-open connection.
    ///
    /// # Errors
    ///
    /// Returns `SqlProcError` if the server refuses to start the transaction.
    pub async fn begin(mut conn: C) -> Result<Self, SqlProcError> {
        conn.begin_transaction().await?;
        tracing::debug!("transaction started");
        Ok(Self {
            conn: Some(conn),
            state: TxState::Open,
        })
    }

    /// Whether the transaction can still run statements.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.state == TxState::Open && self.conn.is_some()
    }

    /// Whether the underlying connection is still held.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.conn.is_some()
    }

    pub(crate) fn connection_mut(&mut self) -> Result<&mut C, SqlProcError> {
        match (&mut self.conn, self.state) {
            (Some(conn), TxState::Open) => Ok(conn),
            (None, _) => Err(SqlProcError::TransactionError(
                "connection has been released".to_string(),
            )),
            (Some(_), TxState::RolledBack) => Err(SqlProcError::TransactionError(
                "transaction was rolled back after a failed call".to_string(),
            )),
            (Some(_), TxState::Finished) => Err(SqlProcError::TransactionError(
                "transaction has already been finished".to_string(),
            )),
        }
    }

    /// Roll back after a failed call. Runs at most once per transaction.
    pub(crate) async fn rollback_after_failure(&mut self) -> Result<(), SqlProcError> {
        if self.state != TxState::Open {
            return Ok(());
        }
        let Some(conn) = self.conn.as_mut() else {
            return Ok(());
        };
        self.state = TxState::RolledBack;
        conn.rollback().await
    }

    /// Commit (`committed == true`) or roll back the transaction.
    ///
    /// A rollback is skipped when the connection is gone or a failed call already rolled
    /// the transaction back.
    ///
    /// # Errors
    ///
    /// Returns `SqlProcError::TransactionError` when committing a transaction that is no
    /// longer open, or the driver's error if commit/rollback fails.
    pub async fn finish(&mut self, committed: bool) -> Result<TxOutcome, SqlProcError> {
        if committed {
            let conn = self.connection_mut()?;
            conn.commit().await?;
            self.state = TxState::Finished;
            tracing::debug!("transaction committed");
            return Ok(TxOutcome::Committed);
        }

        match (self.conn.as_mut(), self.state) {
            (Some(conn), TxState::Open) => {
                // mark first: a failed rollback must not be retried by Drop or a later finish
                self.state = TxState::Finished;
                conn.rollback().await?;
                tracing::debug!("transaction rolled back");
                Ok(TxOutcome::RolledBack)
            }
            _ => {
                self.state = TxState::Finished;
                Ok(TxOutcome::Skipped)
            }
        }
    }

    /// Close and release the connection if it is still held.
    ///
    /// # Errors
    ///
    /// Returns the driver's error if the close handshake fails; the connection is released
    /// regardless.
    pub async fn disconnect(&mut self) -> Result<(), SqlProcError> {
        match self.conn.take() {
            Some(conn) => {
                if self.state == TxState::Open {
                    tracing::warn!("disconnecting with an unfinished transaction");
                    self.state = TxState::Finished;
                }
                conn.close().await
            }
            None => Ok(()),
        }
    }
}

impl<C: ProcedureConnection> Drop for ProcTransaction<C> {
    fn drop(&mut self) {
        if self.conn.is_some() && self.state == TxState::Open {
            tracing::warn!("ProcTransaction dropped while open; uncommitted work is discarded");
        }
    }
}
