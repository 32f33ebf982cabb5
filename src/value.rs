use std::fmt;

use serde::Deserialize;

/// A scalar value read from the pipeline definition.
///
/// Scalars show up in three places: fill values for constant imputation,
/// numeric knobs that may also be a `${...}` placeholder (oversampling
/// factors, feature cardinality), and leaf values of the workflow document.
///
/// # Examples
///
/// ```
/// use molehill::Value;
///
/// // Placeholders are rendered verbatim
/// let factor = Value::from("${oversample_n_times}");
/// assert_eq!(factor.to_string(), "${oversample_n_times}");
///
/// // Whole floats keep their decimal point
/// assert_eq!(Value::Float(1.0).to_string(), "1.0");
///
/// // Text becomes a quoted SQL literal
/// assert_eq!(Value::from("missing").sql_literal(), "'missing'");
/// assert_eq!(Value::Integer(0).sql_literal(), "0");
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// YAML null
    Null,

    /// Boolean (true/false)
    Boolean(bool),

    /// Integer number (preserved separately from floats)
    Integer(i64),

    /// Floating-point number
    Float(f64),

    /// UTF-8 string
    String(String),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Render as a SQL literal: strings are single-quoted, everything else
    /// is rendered as-is.
    pub fn sql_literal(&self) -> String {
        match self {
            Value::String(s) => format!("'{}'", s.replace('\'', "''")),
            other => other.to_string(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Integer(n) => write!(f, "{}", n),
            Value::Float(n) if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e16 => {
                write!(f, "{:.1}", n)
            }
            Value::Float(n) => write!(f, "{}", n),
            Value::String(s) => write!(f, "{}", s),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Integer(n)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Float(n)
    }
}
