use std::collections::HashMap;
use std::fmt::Write;
use std::sync::Arc;

use futures_util::TryStreamExt;
use tiberius::{QueryItem, QueryStream, ToSql};

use super::config::MssqlClient;
use super::params::{TypedParam, column_data_to_row_value};
use crate::driver::{ProcedureCall, ProcedureStatus};
use crate::error::SqlProcError;
use crate::params::Parameter;
use crate::results::ResultSet;
use crate::types::{Direction, RowValues};

const RETURN_VALUE_COLUMN: &str = "RETURN_VALUE";
const ROWS_AFFECTED_COLUMN: &str = "ROWS_AFFECTED";

/// T-SQL batch that invokes one stored procedure.
///
/// The batch declares `@RETURN_VALUE`, a local variable per output parameter, runs
/// `EXEC @RETURN_VALUE = proc ...` and captures `@@ROWCOUNT`. With a status select it ends
/// with one extra result set: return value, row count, then each output in bind order.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcedureBatch {
    pub sql: String,
    /// Indices (into the call's params) of the values sent as `@P1..@Pn`
    pub bound: Vec<usize>,
    /// Names of the output columns in the status result set, after the two fixed columns
    pub outputs: Vec<String>,
    pub with_status: bool,
}

/// Build the batch for `call`.
///
/// # Errors
///
/// Returns `SqlProcError::ParameterError` for an empty or malformed procedure name.
pub fn build_procedure_batch(
    call: ProcedureCall<'_>,
    with_status: bool,
) -> Result<ProcedureBatch, SqlProcError> {
    let procedure = quote_procedure_name(call.procedure)?;
    let mut sql = String::with_capacity(128);
    let mut bound = Vec::new();
    let mut outputs = Vec::new();
    let mut args = Vec::new();
    let mut selects = Vec::new();

    sql.push_str("DECLARE @RETURN_VALUE INT;\n");
    sql.push_str("DECLARE @__rows BIGINT;\n");

    for (idx, param) in call.params.iter().enumerate() {
        let name = param.name();
        let direction = param.direction();
        let placeholder = if direction.sends_value() {
            bound.push(idx);
            Some(format!("@P{}", bound.len()))
        } else {
            None
        };

        match direction {
            Direction::Input => {
                // sends_value() always holds for inputs
                let placeholder = placeholder.unwrap_or_else(|| "NULL".to_string());
                args.push(format!("@{name} = {placeholder}"));
            }
            Direction::InputOutput | Direction::Output => {
                let var = format!("@__out{idx}");
                let _ = write!(sql, "DECLARE {var} {}", param.sql_type().tsql_name());
                if let Some(placeholder) = placeholder {
                    let _ = write!(sql, " = {placeholder}");
                }
                sql.push_str(";\n");
                args.push(format!("@{name} = {var} OUTPUT"));
                selects.push(format!("{var} AS {}", quote_ident(name)));
                outputs.push(name.to_string());
            }
            Direction::ReturnValue => {
                selects.push(format!("@RETURN_VALUE AS {}", quote_ident(name)));
                outputs.push(name.to_string());
            }
        }
    }

    let _ = write!(sql, "EXEC @RETURN_VALUE = {procedure}");
    if !args.is_empty() {
        sql.push(' ');
        sql.push_str(&args.join(", "));
    }
    sql.push_str(";\nSET @__rows = @@ROWCOUNT;\n");

    if with_status {
        let _ = write!(
            sql,
            "SELECT @RETURN_VALUE AS [{RETURN_VALUE_COLUMN}], @__rows AS [{ROWS_AFFECTED_COLUMN}]"
        );
        for select in &selects {
            sql.push_str(", ");
            sql.push_str(select);
        }
        sql.push_str(";\n");
    }

    Ok(ProcedureBatch {
        sql,
        bound,
        outputs,
        with_status,
    })
}

/// Bracket-quote each part of a (possibly schema-qualified) procedure name.
///
/// # Errors
///
/// Returns `SqlProcError::ParameterError` for an empty name or an empty name part.
pub fn quote_procedure_name(name: &str) -> Result<String, SqlProcError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(SqlProcError::ParameterError(
            "procedure name is empty".to_string(),
        ));
    }
    let parts = split_name_parts(trimmed).ok_or_else(|| {
        SqlProcError::ParameterError(format!("invalid procedure name '{name}'"))
    })?;
    if parts.len() > 4 || parts.iter().any(String::is_empty) {
        return Err(SqlProcError::ParameterError(format!(
            "invalid procedure name '{name}'"
        )));
    }
    Ok(parts
        .iter()
        .map(|p| quote_ident(p))
        .collect::<Vec<_>>()
        .join("."))
}

/// Split `a.[b.c].d` into parts, honoring brackets and `]]` escapes.
fn split_name_parts(name: &str) -> Option<Vec<String>> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut chars = name.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '[' if current.is_empty() => loop {
                match chars.next()? {
                    ']' if chars.peek() == Some(&']') => {
                        chars.next();
                        current.push(']');
                    }
                    ']' => break,
                    other => current.push(other),
                }
            },
            '.' => parts.push(std::mem::take(&mut current)),
            c if c.is_whitespace() || c == ';' || c == '\'' => return None,
            c => current.push(c),
        }
    }
    parts.push(current);
    Some(parts)
}

fn quote_ident(ident: &str) -> String {
    format!("[{}]", ident.replace(']', "]]"))
}

/// One result set as read off the wire.
#[derive(Debug, Default)]
pub(crate) struct RawResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<RowValues>>,
}

impl RawResult {
    pub(crate) fn into_result_set(self) -> ResultSet {
        let mut result_set = ResultSet::with_capacity(self.rows.len());
        result_set.set_column_names(Arc::new(self.columns));
        for row in self.rows {
            result_set.add_row_values(row);
        }
        result_set
    }
}

/// Send `batch` with the call's parameters and read back every result set.
///
/// With `first_limit`, only that many rows of the first result set are kept and rows of
/// later sets are skipped. The stream is still drained so the connection stays usable.
/// Callers that need the trailing status set must pass `None`.
///
/// # Errors
///
/// Returns `SqlProcError::Server` for server-side errors, other variants for transport or
/// decoding failures.
pub(crate) async fn run_batch(
    client: &mut MssqlClient,
    batch: &ProcedureBatch,
    params: &[Parameter],
    first_limit: Option<usize>,
) -> Result<Vec<RawResult>, SqlProcError> {
    let typed = batch
        .bound
        .iter()
        .map(|&idx| TypedParam::new(&params[idx]))
        .collect::<Result<Vec<_>, _>>()?;
    let refs: Vec<&dyn ToSql> = typed.iter().map(|p| p as &dyn ToSql).collect();

    let stream = client
        .query(batch.sql.as_str(), &refs[..])
        .await
        .map_err(map_tiberius_error)?;
    collect_results(stream, first_limit).await
}

async fn collect_results(
    mut stream: QueryStream<'_>,
    first_limit: Option<usize>,
) -> Result<Vec<RawResult>, SqlProcError> {
    let mut collector = ResultCollector::new(first_limit);
    while let Some(item) = stream.try_next().await.map_err(map_tiberius_error)? {
        match item {
            QueryItem::Metadata(meta) => collector
                .start_set(meta.columns().iter().map(|c| c.name().to_string()).collect()),
            QueryItem::Row(row) => {
                if !collector.wants_row() {
                    continue;
                }
                let values = row
                    .into_iter()
                    .map(column_data_to_row_value)
                    .collect::<Result<Vec<_>, _>>()?;
                collector.push_row(values);
            }
        }
    }
    Ok(collector.finish())
}

/// Accumulates result sets off the stream, honoring an optional first-set row limit.
#[derive(Debug)]
struct ResultCollector {
    sets: Vec<RawResult>,
    first_limit: Option<usize>,
}

impl ResultCollector {
    fn new(first_limit: Option<usize>) -> Self {
        Self {
            sets: Vec::new(),
            first_limit,
        }
    }

    fn start_set(&mut self, columns: Vec<String>) {
        self.sets.push(RawResult {
            columns,
            rows: Vec::new(),
        });
    }

    /// Whether the next row would be kept. Checked before decoding.
    fn wants_row(&self) -> bool {
        match (self.first_limit, self.sets.len()) {
            (_, 0) => false,
            (None, _) => true,
            (Some(limit), 1) => self.sets[0].rows.len() < limit,
            (Some(_), _) => false,
        }
    }

    fn push_row(&mut self, values: Vec<RowValues>) {
        if !self.wants_row() {
            return;
        }
        if let Some(current) = self.sets.last_mut() {
            current.rows.push(values);
        }
    }

    fn finish(self) -> Vec<RawResult> {
        self.sets
    }
}

/// Read the trailing status result set produced by a batch built with a status select.
///
/// # Errors
///
/// Returns `SqlProcError::ExecutionError` if the status set is missing or malformed.
pub(crate) fn parse_status(
    status: &RawResult,
    batch: &ProcedureBatch,
) -> Result<ProcedureStatus, SqlProcError> {
    let row = status.rows.first().ok_or_else(|| {
        SqlProcError::ExecutionError("procedure status row missing".to_string())
    })?;
    if row.len() != batch.outputs.len() + 2 {
        return Err(SqlProcError::ExecutionError(format!(
            "procedure status row has {} columns, expected {}",
            row.len(),
            batch.outputs.len() + 2
        )));
    }
    let rows_affected = match &row[1] {
        RowValues::Int(n) => u64::try_from(*n).unwrap_or(0),
        _ => 0,
    };
    let outputs: HashMap<String, RowValues> = batch
        .outputs
        .iter()
        .cloned()
        .zip(row[2..].iter().cloned())
        .collect();
    Ok(ProcedureStatus {
        rows_affected,
        return_value: row[0].clone(),
        outputs,
    })
}

pub(crate) fn map_tiberius_error(e: tiberius::error::Error) -> SqlProcError {
    match e {
        tiberius::error::Error::Server(token) => SqlProcError::Server {
            number: token.code(),
            state: token.state(),
            class: token.class(),
            message: token.message().to_string(),
        },
        other => SqlProcError::MssqlError(other),
    }
}
