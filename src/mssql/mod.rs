// MSSQL module - SQL Server implementation of the procedure driver seam
//
// - config: connection options and tiberius `Config` construction
// - client: raw client creation (TCP + SQL Browser)
// - params: parameter conversion between crate values and tiberius column data
// - query: T-SQL batch generation and result-set collection
// - executor: `MssqlDriver` / `MssqlConnection`

pub mod client;
pub mod config;
pub mod executor;
pub mod params;
pub mod query;

pub use client::create_mssql_client;
pub use config::{MssqlClient, MssqlOptions, MssqlOptionsBuilder, config_from_connection_string};
pub use executor::{MssqlConnection, MssqlDriver};
pub use params::{TypedParam, column_data_to_row_value};
pub use query::{ProcedureBatch, build_procedure_batch, quote_procedure_name};
