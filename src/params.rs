//! Parameter descriptors bound ahead of a procedure call.

use chrono::{NaiveDate, NaiveTime};
use uuid::Uuid;

use crate::error::SqlProcError;
use crate::types::{Direction, RowValues, SqlType};

/// One named, typed argument for a stored procedure.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    name: String,
    value: RowValues,
    sql_type: SqlType,
    direction: Direction,
}

impl Parameter {
    /// Build a parameter, normalizing the name and coercing the value to the declared type.
    ///
    /// Guid parameters accept text and are parsed here, so a malformed identifier fails
    /// before any connection is opened. `RowValues::Null` is kept as an explicit NULL of
    /// the declared type.
    ///
    /// # Errors
    ///
    /// Returns `SqlProcError::ParameterError` if the name is not a valid identifier or the
    /// value cannot be represented as `sql_type`.
    pub fn new(
        name: &str,
        value: RowValues,
        sql_type: SqlType,
        direction: Direction,
    ) -> Result<Self, SqlProcError> {
        let name = normalize_name(name)?;
        let value = coerce_value(&name, value, sql_type)?;
        Ok(Self {
            name,
            value,
            sql_type,
            direction,
        })
    }

    /// Parameter name without the leading `@`.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn value(&self) -> &RowValues {
        &self.value
    }

    #[must_use]
    pub fn sql_type(&self) -> SqlType {
        self.sql_type
    }

    #[must_use]
    pub fn direction(&self) -> Direction {
        self.direction
    }
}

fn normalize_name(name: &str) -> Result<String, SqlProcError> {
    let trimmed = name.trim();
    let bare = trimmed.strip_prefix('@').unwrap_or(trimmed);
    let mut chars = bare.chars();
    let valid_start = chars
        .next()
        .is_some_and(|c| c.is_alphabetic() || c == '_');
    let valid_rest = chars.all(|c| c.is_alphanumeric() || matches!(c, '_' | '#' | '$' | '@'));
    if !valid_start || !valid_rest || bare.len() > 127 {
        return Err(SqlProcError::ParameterError(format!(
            "invalid parameter name '{name}'"
        )));
    }
    Ok(bare.to_string())
}

/// Convert `value` to the representation `sql_type` is sent as. Obvious conversions
/// (numeric text, 0/1 flags, timestamp text) are applied; anything else is rejected.
fn coerce_value(name: &str, value: RowValues, sql_type: SqlType) -> Result<RowValues, SqlProcError> {
    match (sql_type, value) {
        (_, RowValues::Null) => Ok(RowValues::Null),
        (SqlType::Guid, RowValues::Guid(g)) => Ok(RowValues::Guid(g)),
        (SqlType::Guid, other) => {
            let text = other.to_string();
            Uuid::parse_str(text.trim())
                .map(RowValues::Guid)
                .map_err(|e| {
                    SqlProcError::ParameterError(format!(
                        "parameter '{name}': '{text}' is not a valid guid: {e}"
                    ))
                })
        }
        (SqlType::Decimal, RowValues::Decimal(s) | RowValues::Text(s)) => {
            normalize_decimal(&s).map(RowValues::Decimal).ok_or_else(|| {
                SqlProcError::ParameterError(format!(
                    "parameter '{name}': '{s}' is not a valid decimal"
                ))
            })
        }
        (SqlType::Decimal, RowValues::Int(i)) => Ok(RowValues::Decimal(i.to_string())),
        (SqlType::Decimal, RowValues::Float(f)) => normalize_decimal(&f.to_string())
            .map(RowValues::Decimal)
            .ok_or_else(|| {
                SqlProcError::ParameterError(format!("parameter '{name}': {f} is not a valid decimal"))
            }),
        (SqlType::Numeric, RowValues::Int(i)) => Ok(RowValues::Int(i)),
        (SqlType::Numeric, RowValues::Bool(b)) => Ok(RowValues::Int(i64::from(b))),
        (SqlType::Numeric, RowValues::Float(f))
            if f.fract() == 0.0 && (-9.0e18..=9.0e18).contains(&f) =>
        {
            Ok(RowValues::Int(f as i64))
        }
        (SqlType::Numeric, value @ (RowValues::Text(_) | RowValues::Decimal(_))) => {
            parse_text(&value, |s| s.parse::<i64>().ok().map(RowValues::Int))
                .ok_or_else(|| mismatch(name, sql_type, &value))
        }
        (SqlType::Float, RowValues::Float(f)) => Ok(RowValues::Float(f)),
        (SqlType::Float, RowValues::Int(i)) => Ok(RowValues::Float(i as f64)),
        (SqlType::Float, value @ (RowValues::Text(_) | RowValues::Decimal(_))) => parse_text(&value, |s| {
            s.parse::<f64>()
                .ok()
                .filter(|f| f.is_finite())
                .map(RowValues::Float)
        })
        .ok_or_else(|| mismatch(name, sql_type, &value)),
        (SqlType::Boolean, RowValues::Bool(b)) => Ok(RowValues::Bool(b)),
        (SqlType::Boolean, RowValues::Int(i @ (0 | 1))) => Ok(RowValues::Bool(i == 1)),
        (SqlType::Boolean, value @ RowValues::Text(_)) => parse_text(&value, parse_bool)
            .ok_or_else(|| mismatch(name, sql_type, &value)),
        (SqlType::DateTime, RowValues::Timestamp(dt)) => Ok(RowValues::Timestamp(dt)),
        (SqlType::DateTime, value @ RowValues::Text(_)) => parse_text(&value, parse_timestamp)
            .ok_or_else(|| mismatch(name, sql_type, &value)),
        (SqlType::String, value @ (RowValues::Text(_) | RowValues::Json(_))) => Ok(value),
        (SqlType::String, value @ RowValues::Blob(_)) => Err(mismatch(name, sql_type, &value)),
        (SqlType::String, other) => Ok(RowValues::Text(other.to_string())),
        (SqlType::Binary, RowValues::Blob(bytes)) => Ok(RowValues::Blob(bytes)),
        (_, other) => Err(mismatch(name, sql_type, &other)),
    }
}

fn parse_text(value: &RowValues, parse: impl Fn(&str) -> Option<RowValues>) -> Option<RowValues> {
    match value {
        RowValues::Text(s) | RowValues::Decimal(s) => parse(s.trim()),
        _ => None,
    }
}

fn parse_bool(s: &str) -> Option<RowValues> {
    match s.to_ascii_lowercase().as_str() {
        "1" | "true" => Some(RowValues::Bool(true)),
        "0" | "false" => Some(RowValues::Bool(false)),
        _ => None,
    }
}

fn parse_timestamp(s: &str) -> Option<RowValues> {
    let text = RowValues::Text(s.replacen('T', " ", 1));
    if let Some(dt) = text.as_timestamp() {
        return Some(RowValues::Timestamp(dt));
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .map(|d| RowValues::Timestamp(d.and_time(NaiveTime::MIN)))
}

fn mismatch(name: &str, sql_type: SqlType, value: &RowValues) -> SqlProcError {
    SqlProcError::ParameterError(format!(
        "parameter '{name}': {value:?} cannot be sent as {}",
        sql_type.tsql_name()
    ))
}

/// Canonical form of a plain decimal literal: optional sign, no leading zeros, no
/// trailing `.`. Returns `None` for anything else (exponents, NaN, empty input).
#[must_use]
pub fn normalize_decimal(input: &str) -> Option<String> {
    let s = input.trim();
    let (negative, digits) = match s.as_bytes().first()? {
        b'-' => (true, &s[1..]),
        b'+' => (false, &s[1..]),
        _ => (false, s),
    };
    let (int_part, frac_part) = match digits.split_once('.') {
        Some((i, f)) => (i, f),
        None => (digits, ""),
    };
    if int_part.is_empty() && frac_part.is_empty() {
        return None;
    }
    if !int_part.bytes().all(|b| b.is_ascii_digit()) || !frac_part.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let int_trimmed = int_part.trim_start_matches('0');
    let int_out = if int_trimmed.is_empty() { "0" } else { int_trimmed };
    let is_zero = int_out == "0" && frac_part.bytes().all(|b| b == b'0');
    let mut out = String::with_capacity(s.len() + 1);
    if negative && !is_zero {
        out.push('-');
    }
    out.push_str(int_out);
    if !frac_part.is_empty() {
        out.push('.');
        out.push_str(frac_part);
    }
    Some(out)
}
