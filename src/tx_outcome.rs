/// Outcome returned when a [`ProcTransaction`](crate::transaction::ProcTransaction) is finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxOutcome {
    /// The transaction was committed.
    Committed,
    /// The transaction was rolled back.
    RolledBack,
    /// Rollback was requested but there was nothing to undo: the connection is gone or
    /// the transaction had already been rolled back after a failed call.
    Skipped,
}

impl TxOutcome {
    #[must_use]
    pub fn is_committed(self) -> bool {
        matches!(self, TxOutcome::Committed)
    }
}
