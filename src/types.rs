use std::fmt;

use chrono::NaiveDateTime;
use clap::ValueEnum;
use serde::Serialize;
use serde_json::Value as JsonValue;
use uuid::Uuid;

/// Values that can be bound as procedure parameters or read back from result rows.
///
/// ```rust
/// use sproc_middleware::prelude::*;
///
/// let values = vec![
///     RowValues::Int(1),
///     RowValues::Text("alice".into()),
///     RowValues::Bool(true),
///     RowValues::Null,
/// ];
/// # let _ = values;
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RowValues {
    /// Integer value (64-bit)
    Int(i64),
    /// Floating point value (64-bit)
    Float(f64),
    /// Exact decimal, kept in its canonical text form (`-12.50`)
    Decimal(String),
    /// Text/string value
    Text(String),
    /// Boolean value
    Bool(bool),
    /// Timestamp value
    Timestamp(NaiveDateTime),
    /// Unique identifier
    Guid(Uuid),
    /// Binary data
    Blob(Vec<u8>),
    /// JSON document, sent to SQL Server as NVARCHAR text
    Json(JsonValue),
    /// NULL value
    #[default]
    Null,
}

impl RowValues {
    /// Check if this value is NULL
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    pub fn as_int(&self) -> Option<&i64> {
        if let RowValues::Int(value) = self {
            Some(value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        if let RowValues::Text(value) = self {
            Some(value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<&bool> {
        if let RowValues::Bool(value) = self {
            return Some(value);
        } else if let Some(i) = self.as_int() {
            if *i == 1 {
                return Some(&true);
            } else if *i == 0 {
                return Some(&false);
            }
        }
        None
    }

    #[must_use]
    pub fn as_timestamp(&self) -> Option<NaiveDateTime> {
        if let RowValues::Timestamp(value) = self {
            return Some(*value);
        } else if let Some(s) = self.as_text() {
            if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
                return Some(dt);
            }
            if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
                return Some(dt);
            }
        }
        None
    }

    #[must_use]
    pub fn as_float(&self) -> Option<f64> {
        if let RowValues::Float(value) = self {
            Some(*value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_decimal(&self) -> Option<&str> {
        if let RowValues::Decimal(value) = self {
            Some(value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_guid(&self) -> Option<Uuid> {
        if let RowValues::Guid(value) = self {
            Some(*value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_json(&self) -> Option<&JsonValue> {
        if let RowValues::Json(value) = self {
            Some(value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_blob(&self) -> Option<&[u8]> {
        if let RowValues::Blob(bytes) = self {
            Some(bytes)
        } else {
            None
        }
    }
}

/// Text form used for return values; NULL renders as an empty string.
impl fmt::Display for RowValues {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowValues::Int(i) => write!(f, "{i}"),
            RowValues::Float(v) => write!(f, "{v}"),
            RowValues::Decimal(s) | RowValues::Text(s) => f.write_str(s),
            RowValues::Bool(b) => write!(f, "{b}"),
            RowValues::Timestamp(dt) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S%.f")),
            RowValues::Guid(g) => write!(f, "{g}"),
            RowValues::Blob(bytes) => {
                f.write_str("0x")?;
                for b in bytes {
                    write!(f, "{b:02X}")?;
                }
                Ok(())
            }
            RowValues::Json(value) => write!(f, "{value}"),
            RowValues::Null => Ok(()),
        }
    }
}

impl From<i64> for RowValues {
    fn from(value: i64) -> Self {
        RowValues::Int(value)
    }
}

impl From<i32> for RowValues {
    fn from(value: i32) -> Self {
        RowValues::Int(i64::from(value))
    }
}

impl From<f64> for RowValues {
    fn from(value: f64) -> Self {
        RowValues::Float(value)
    }
}

impl From<bool> for RowValues {
    fn from(value: bool) -> Self {
        RowValues::Bool(value)
    }
}

impl From<&str> for RowValues {
    fn from(value: &str) -> Self {
        RowValues::Text(value.to_string())
    }
}

impl From<String> for RowValues {
    fn from(value: String) -> Self {
        RowValues::Text(value)
    }
}

impl From<NaiveDateTime> for RowValues {
    fn from(value: NaiveDateTime) -> Self {
        RowValues::Timestamp(value)
    }
}

impl From<Uuid> for RowValues {
    fn from(value: Uuid) -> Self {
        RowValues::Guid(value)
    }
}

impl From<JsonValue> for RowValues {
    fn from(value: JsonValue) -> Self {
        RowValues::Json(value)
    }
}

impl<T: Into<RowValues>> From<Option<T>> for RowValues {
    fn from(value: Option<T>) -> Self {
        value.map_or(RowValues::Null, Into::into)
    }
}

/// Declared SQL type of a bound parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum)]
pub enum SqlType {
    /// DATETIME
    DateTime,
    /// BIGINT
    Numeric,
    /// BIT
    Boolean,
    /// DECIMAL
    Decimal,
    /// NVARCHAR
    String,
    /// FLOAT
    Float,
    /// UNIQUEIDENTIFIER
    Guid,
    /// VARBINARY
    Binary,
}

impl SqlType {
    /// T-SQL type name used when declaring variables for this type.
    #[must_use]
    pub fn tsql_name(self) -> &'static str {
        match self {
            SqlType::DateTime => "DATETIME",
            SqlType::Numeric => "BIGINT",
            SqlType::Boolean => "BIT",
            SqlType::Decimal => "DECIMAL(38, 10)",
            SqlType::String => "NVARCHAR(MAX)",
            SqlType::Float => "FLOAT",
            SqlType::Guid => "UNIQUEIDENTIFIER",
            SqlType::Binary => "VARBINARY(MAX)",
        }
    }
}

/// Direction of a procedure parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, ValueEnum)]
pub enum Direction {
    #[default]
    Input,
    InputOutput,
    Output,
    ReturnValue,
}

impl Direction {
    /// Whether the value is sent to the server.
    #[must_use]
    pub fn sends_value(self) -> bool {
        matches!(self, Direction::Input | Direction::InputOutput)
    }

    /// Whether the server writes a value back into the parameter.
    #[must_use]
    pub fn receives_value(self) -> bool {
        !matches!(self, Direction::Input)
    }
}
