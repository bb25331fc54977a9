//! Materialized reader output and the caller-shaped records built from it.

mod record;
mod result_set;
mod row;

pub use record::{Record, fill_record, record_from_row};
pub use result_set::ResultSet;
pub use row::CustomDbRow;
