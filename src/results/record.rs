use std::collections::HashMap;

use super::row::CustomDbRow;
use crate::error::SqlProcError;
use crate::types::RowValues;

/// Column name → value mapping whose keys are chosen by the caller.
pub type Record = HashMap<String, RowValues>;

/// Overwrite every key of `template` with the matching column of `row`.
///
/// # Errors
///
/// Returns `SqlProcError::ExecutionError` naming the first requested column the row does
/// not have. `template` is left untouched in that case.
pub fn fill_record(template: &mut Record, row: &CustomDbRow) -> Result<(), SqlProcError> {
    let mut resolved = Vec::with_capacity(template.len());
    for key in template.keys() {
        let value = row.get(key).ok_or_else(|| missing_column(key))?;
        resolved.push((key.clone(), value.clone()));
    }
    for (key, value) in resolved {
        template.insert(key, value);
    }
    Ok(())
}

/// Build a fresh record holding exactly the template's keys, read from `row`.
///
/// # Errors
///
/// Returns `SqlProcError::ExecutionError` if a requested column is missing.
pub fn record_from_row(template: &Record, row: &CustomDbRow) -> Result<Record, SqlProcError> {
    template
        .keys()
        .map(|key| {
            row.get(key)
                .map(|value| (key.clone(), value.clone()))
                .ok_or_else(|| missing_column(key))
        })
        .collect()
}

fn missing_column(key: &str) -> SqlProcError {
    SqlProcError::ExecutionError(format!("column '{key}' is not present in the result set"))
}
