use std::fmt;

use crate::error::EmitError;

/// A log attribute value.
///
/// Values are captured once at the logging framework boundary, and are then either coerced to a number (counters,
/// gauges, timers) or passed through as-is (histograms, sets).
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    /// Boolean.
    Bool(bool),

    /// Signed integer.
    Int(i64),

    /// Unsigned integer.
    UInt(u64),

    /// Floating-point number.
    Float(f64),

    /// String.
    Str(String),
}

impl Value {
    /// Coerces this value to a finite floating-point number.
    ///
    /// Strings are parsed after trimming surrounding whitespace, and booleans map to `1` and `0`.
    ///
    /// # Errors
    ///
    /// If the value is a string that does not parse as a number, or the resulting number is not finite,
    /// [`EmitError::NotNumeric`] is returned.
    pub fn as_f64(&self) -> Result<f64, EmitError> {
        let n = match self {
            Value::Bool(b) => f64::from(u8::from(*b)),
            Value::Int(i) => *i as f64,
            Value::UInt(u) => *u as f64,
            Value::Float(f) => *f,
            Value::Str(s) => s.trim().parse::<f64>().map_err(|_| EmitError::NotNumeric)?,
        };

        if n.is_finite() {
            Ok(n)
        } else {
            Err(EmitError::NotNumeric)
        }
    }

    /// Returns `true` if this value carries no information: an empty string.
    pub fn is_empty(&self) -> bool {
        matches!(self, Value::Str(s) if s.is_empty())
    }
}

/// Returns the value if it is present and not empty.
pub(crate) fn non_empty(value: Option<&Value>) -> Option<&Value> {
    value.filter(|v| !v.is_empty())
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => f.write_str(if *b { "true" } else { "false" }),
            Value::Int(i) => f.write_str(itoa::Buffer::new().format(*i)),
            Value::UInt(u) => f.write_str(itoa::Buffer::new().format(*u)),
            Value::Float(v) => f.write_str(ryu::Buffer::new().format(*v)),
            Value::Str(s) => f.write_str(s),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(i64::from(value))
    }
}

impl From<u64> for Value {
    fn from(value: u64) -> Self {
        Value::UInt(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Str(value.to_owned())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Str(value)
    }
}

#[cfg(test)]
mod tests {
    use super::Value;

    #[test]
    fn numeric_coercion() {
        let cases = [
            (Value::Int(-3), Some(-3.0)),
            (Value::UInt(42), Some(42.0)),
            (Value::Float(1.5), Some(1.5)),
            (Value::Bool(true), Some(1.0)),
            (Value::from(" 12.25 "), Some(12.25)),
            (Value::from("one"), None),
            (Value::from(""), None),
            (Value::from("inf"), None),
            (Value::Float(f64::NAN), None),
        ];

        for (value, expected) in cases {
            assert_eq!(value.as_f64().ok(), expected, "coercing {value:?}");
        }
    }

    #[test]
    fn display() {
        assert_eq!(Value::Int(-7).to_string(), "-7");
        assert_eq!(Value::Float(2.5).to_string(), "2.5");
        assert_eq!(Value::Bool(false).to_string(), "false");
        assert_eq!(Value::from("PUT").to_string(), "PUT");
    }

    #[test]
    fn emptiness() {
        assert!(Value::from("").is_empty());
        assert!(!Value::from(" ").is_empty());
        assert!(!Value::Int(0).is_empty());
    }
}
