use std::borrow::Cow;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use tiberius::numeric::Numeric;
use tiberius::{ColumnData, FromSql, ToSql};

use crate::error::SqlProcError;
use crate::params::Parameter;
use crate::types::{RowValues, SqlType};

/// A bound value paired with its declared type, so NULLs go out typed.
pub struct TypedParam<'a> {
    value: &'a RowValues,
    sql_type: SqlType,
    numeric: Option<Numeric>,
}

impl<'a> TypedParam<'a> {
    /// Prepare one parameter for sending.
    ///
    /// # Errors
    ///
    /// Returns `SqlProcError::ParameterError` if a decimal does not fit SQL Server's
    /// DECIMAL(38).
    pub fn new(param: &'a Parameter) -> Result<Self, SqlProcError> {
        let numeric = match param.value() {
            RowValues::Decimal(text) => Some(decimal_to_numeric(text).ok_or_else(|| {
                SqlProcError::ParameterError(format!(
                    "parameter '{}': decimal '{text}' exceeds DECIMAL(38) precision",
                    param.name()
                ))
            })?),
            _ => None,
        };
        Ok(Self {
            value: param.value(),
            sql_type: param.sql_type(),
            numeric,
        })
    }
}

impl ToSql for TypedParam<'_> {
    fn to_sql(&self) -> ColumnData<'_> {
        match self.value {
            RowValues::Int(i) => ColumnData::I64(Some(*i)),
            RowValues::Float(f) => ColumnData::F64(Some(*f)),
            RowValues::Decimal(_) => ColumnData::Numeric(self.numeric),
            RowValues::Text(s) => ColumnData::String(Some(Cow::from(s.as_str()))),
            RowValues::Bool(b) => ColumnData::Bit(Some(*b)),
            RowValues::Timestamp(dt) => dt.to_sql(),
            RowValues::Guid(g) => ColumnData::Guid(Some(*g)),
            RowValues::Blob(bytes) => ColumnData::Binary(Some(Cow::from(bytes.as_slice()))),
            RowValues::Json(value) => ColumnData::String(Some(Cow::Owned(value.to_string()))),
            RowValues::Null => typed_null(self.sql_type),
        }
    }
}

fn typed_null(sql_type: SqlType) -> ColumnData<'static> {
    match sql_type {
        SqlType::DateTime => ColumnData::DateTime2(None),
        SqlType::Numeric => ColumnData::I64(None),
        SqlType::Boolean => ColumnData::Bit(None),
        SqlType::Decimal => ColumnData::Numeric(None),
        SqlType::String => ColumnData::String(None),
        SqlType::Float => ColumnData::F64(None),
        SqlType::Guid => ColumnData::Guid(None),
        SqlType::Binary => ColumnData::Binary(None),
    }
}

/// Convert a canonical decimal string into a `Numeric`. `None` when it does not fit.
pub(crate) fn decimal_to_numeric(text: &str) -> Option<Numeric> {
    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };
    let (int_part, frac_part) = digits.split_once('.').unwrap_or((digits, ""));
    let scale = u8::try_from(frac_part.len()).ok()?;
    let significant = format!("{int_part}{frac_part}");
    let significant = significant.trim_start_matches('0');
    if scale > 37 || significant.len() > 38 {
        return None;
    }
    let magnitude: i128 = if significant.is_empty() {
        0
    } else {
        significant.parse().ok()?
    };
    let value = if negative { -magnitude } else { magnitude };
    Some(Numeric::new_with_scale(value, scale))
}

/// Convert one column value read from SQL Server into `RowValues`.
///
/// # Errors
///
/// Returns `SqlProcError::ExecutionError` if a date/time value cannot be decoded.
pub fn column_data_to_row_value(data: ColumnData<'static>) -> Result<RowValues, SqlProcError> {
    let value = match data {
        ColumnData::Bit(v) => v.map(RowValues::Bool),
        ColumnData::U8(v) => v.map(|i| RowValues::Int(i64::from(i))),
        ColumnData::I16(v) => v.map(|i| RowValues::Int(i64::from(i))),
        ColumnData::I32(v) => v.map(|i| RowValues::Int(i64::from(i))),
        ColumnData::I64(v) => v.map(RowValues::Int),
        ColumnData::F32(v) => v.map(|f| RowValues::Float(f64::from(f))),
        ColumnData::F64(v) => v.map(RowValues::Float),
        ColumnData::String(v) => v.map(|s| RowValues::Text(s.into_owned())),
        ColumnData::Guid(v) => v.map(RowValues::Guid),
        ColumnData::Binary(v) => v.map(|b| RowValues::Blob(b.into_owned())),
        ColumnData::Numeric(v) => v.map(|n| RowValues::Decimal(n.to_string())),
        ColumnData::Xml(v) => v.map(|x| RowValues::Text(x.into_owned().into_string())),
        temporal => decode_temporal(&temporal)?,
    };
    Ok(value.unwrap_or(RowValues::Null))
}

fn decode_temporal(data: &ColumnData<'static>) -> Result<Option<RowValues>, SqlProcError> {
    let value = match data {
        ColumnData::DateTimeOffset(_) => DateTime::<Utc>::from_sql(data)
            .map_err(decode_error)?
            .map(|dt| RowValues::Timestamp(dt.naive_utc())),
        ColumnData::Date(_) => NaiveDate::from_sql(data)
            .map_err(decode_error)?
            .map(|d| RowValues::Timestamp(d.and_time(NaiveTime::MIN))),
        ColumnData::Time(_) => NaiveTime::from_sql(data)
            .map_err(decode_error)?
            .map(|t| RowValues::Text(t.to_string())),
        // DATETIME, SMALLDATETIME and DATETIME2
        _ => NaiveDateTime::from_sql(data)
            .map_err(decode_error)?
            .map(RowValues::Timestamp),
    };
    Ok(value)
}

fn decode_error(e: tiberius::error::Error) -> SqlProcError {
    SqlProcError::ExecutionError(format!("SQL Server value decode error: {e}"))
}
