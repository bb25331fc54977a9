//! Async stored-procedure executor.
//!
//! Bind named, typed parameters on a [`ProcedureExecutor`], then run a procedure as a
//! non-query, a scalar, inside an explicit [`ProcTransaction`], or as a reader that fills
//! caller-shaped [`Record`]s. SQL Server support (via tiberius) sits behind the default
//! `mssql` feature; other backends plug in through [`ProcedureDriver`].

pub mod prelude;

pub mod driver;
pub mod error;
pub mod executor;
pub mod params;
pub mod results;
pub mod transaction;
pub mod tx_outcome;
pub mod types;

#[cfg(feature = "mssql")]
pub mod mssql;

pub use driver::{
    ProcedureCall, ProcedureConnection, ProcedureDriver, ProcedureStatus,
    REFERENTIAL_INTEGRITY_ERROR,
};
pub use error::SqlProcError;
pub use executor::{ExecutionResult, ProcedureExecutor};
pub use params::Parameter;
pub use results::{CustomDbRow, Record, ResultSet, fill_record, record_from_row};
pub use transaction::ProcTransaction;
pub use tx_outcome::TxOutcome;
pub use types::{Direction, RowValues, SqlType};

#[cfg(feature = "mssql")]
pub use mssql::{MssqlConnection, MssqlDriver, MssqlOptions};
