//! Convenient imports for common functionality.
//!
//! This module re-exports the most commonly used types and functions
//! to make it easier to get started with the library.

pub use crate::driver::{
    ProcedureCall, ProcedureConnection, ProcedureDriver, ProcedureStatus,
    REFERENTIAL_INTEGRITY_ERROR,
};
pub use crate::error::SqlProcError;
pub use crate::executor::{ExecutionResult, ProcedureExecutor};
pub use crate::params::Parameter;
pub use crate::results::{CustomDbRow, Record, ResultSet};
pub use crate::transaction::ProcTransaction;
pub use crate::tx_outcome::TxOutcome;
pub use crate::types::{Direction, RowValues, SqlType};

#[cfg(feature = "mssql")]
pub use crate::mssql::{
    MssqlClient, MssqlConnection, MssqlDriver, MssqlOptions, create_mssql_client,
};
