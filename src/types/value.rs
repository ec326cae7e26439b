use crate::types::Affinity;
use anyhow::{bail, Result};
use std::cmp::Ordering;
use std::fmt;

/// Storage classes, in comparison order
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum StorageClass {
    Null = 0,
    Integer = 1,
    Real = 2,
    Text = 3,
    Blob = 4,
}

impl StorageClass {
    pub fn from_u8(value: u8) -> Result<Self> {
        match value {
            0 => Ok(StorageClass::Null),
            1 => Ok(StorageClass::Integer),
            2 => Ok(StorageClass::Real),
            3 => Ok(StorageClass::Text),
            4 => Ok(StorageClass::Blob),
            _ => bail!("Unknown storage class: {}", value),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            StorageClass::Null => "null",
            StorageClass::Integer => "integer",
            StorageClass::Real => "real",
            StorageClass::Text => "text",
            StorageClass::Blob => "blob",
        }
    }

    /// Rank used when comparing values of different classes.
    /// INTEGER and REAL share a rank and compare numerically.
    fn rank(self) -> u8 {
        match self {
            StorageClass::Null => 0,
            StorageClass::Integer | StorageClass::Real => 1,
            StorageClass::Text => 2,
            StorageClass::Blob => 3,
        }
    }
}

/// A single SQL value held in a register, a record field or a literal.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl Value {
    /// Build a REAL value; NaN is stored as NULL.
    pub fn real(value: f64) -> Self {
        if value.is_nan() {
            Value::Null
        } else {
            Value::Real(value)
        }
    }

    pub fn boolean(value: bool) -> Self {
        Value::Integer(value as i64)
    }

    pub fn storage_class(&self) -> StorageClass {
        match self {
            Value::Null => StorageClass::Null,
            Value::Integer(_) => StorageClass::Integer,
            Value::Real(_) => StorageClass::Real,
            Value::Text(_) => StorageClass::Text,
            Value::Blob(_) => StorageClass::Blob,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Value::Integer(_) | Value::Real(_))
    }

    /// Truth value under three-valued logic: `None` is unknown.
    pub fn to_bool(&self) -> Option<bool> {
        match self {
            Value::Null => None,
            Value::Integer(i) => Some(*i != 0),
            other => Some(other.as_real() != 0.0),
        }
    }

    /// Numeric value, reading the longest numeric prefix of text.
    pub fn as_real(&self) -> f64 {
        match self {
            Value::Null => 0.0,
            Value::Integer(i) => *i as f64,
            Value::Real(r) => *r,
            Value::Text(s) => match parse_numeric_prefix(s).0 {
                Value::Integer(i) => i as f64,
                Value::Real(r) => r,
                _ => 0.0,
            },
            Value::Blob(b) => Value::Text(String::from_utf8_lossy(b).into_owned()).as_real(),
        }
    }

    pub fn as_integer(&self) -> i64 {
        match self {
            Value::Null => 0,
            Value::Integer(i) => *i,
            Value::Real(r) => real_to_integer(*r),
            Value::Text(s) => match parse_numeric_prefix(s).0 {
                Value::Integer(i) => i,
                Value::Real(r) => real_to_integer(r),
                _ => 0,
            },
            Value::Blob(b) => Value::Text(String::from_utf8_lossy(b).into_owned()).as_integer(),
        }
    }

    /// Value as an arithmetic operand: numbers stay, text and blobs are
    /// converted through their numeric prefix, NULL stays NULL.
    pub fn to_numeric(&self) -> Value {
        match self {
            Value::Null => Value::Null,
            Value::Integer(_) | Value::Real(_) => self.clone(),
            Value::Text(s) => parse_numeric_prefix(s).0,
            Value::Blob(b) => parse_numeric_prefix(&String::from_utf8_lossy(b)).0,
        }
    }

    /// Text rendering, or `None` for NULL.
    pub fn to_text(&self) -> Option<String> {
        match self {
            Value::Null => None,
            Value::Integer(i) => Some(i.to_string()),
            Value::Real(r) => Some(format_real(*r)),
            Value::Text(s) => Some(s.clone()),
            Value::Blob(b) => Some(String::from_utf8_lossy(b).into_owned()),
        }
    }

    /// Apply a column or comparison affinity.
    ///
    /// Text is only converted to a number when the whole string is a
    /// well-formed number; numbers become text under TEXT affinity.
    pub fn apply_affinity(self, affinity: Affinity) -> Value {
        match affinity {
            Affinity::Text => match self {
                Value::Integer(_) | Value::Real(_) => {
                    Value::Text(self.to_text().unwrap_or_default())
                }
                other => other,
            },
            Affinity::Numeric | Affinity::Integer => match self {
                Value::Text(ref s) => match parse_numeric_prefix(s) {
                    (num, true) => integral_if_exact(num),
                    _ => self,
                },
                Value::Real(_) => integral_if_exact(self),
                other => other,
            },
            Affinity::Real => match self {
                Value::Text(ref s) => match parse_numeric_prefix(s) {
                    (num, true) => Value::real(num.as_real()),
                    _ => self,
                },
                Value::Integer(i) => Value::Real(i as f64),
                other => other,
            },
            Affinity::Blob | Affinity::None => self,
        }
    }

    /// Explicit CAST conversion.
    pub fn cast(self, affinity: Affinity) -> Value {
        if self.is_null() {
            return Value::Null;
        }
        match affinity {
            Affinity::Blob | Affinity::None => match self {
                Value::Blob(_) => self,
                other => Value::Blob(other.to_text().unwrap_or_default().into_bytes()),
            },
            Affinity::Text => Value::Text(self.to_text().unwrap_or_default()),
            Affinity::Numeric => integral_if_exact(self.to_numeric()),
            Affinity::Integer => Value::Integer(self.as_integer()),
            Affinity::Real => Value::real(self.as_real()),
        }
    }

    /// Compare two values: NULL < numbers < text < blob. Numbers compare
    /// numerically across INTEGER and REAL, text uses `text_cmp`, blobs
    /// compare bytewise.
    pub fn compare_with<F>(&self, other: &Value, text_cmp: F) -> Ordering
    where
        F: Fn(&str, &str) -> Ordering,
    {
        let (lc, rc) = (self.storage_class().rank(), other.storage_class().rank());
        if lc != rc {
            return lc.cmp(&rc);
        }
        match (self, other) {
            (Value::Null, Value::Null) => Ordering::Equal,
            (Value::Integer(a), Value::Integer(b)) => a.cmp(b),
            (Value::Integer(a), Value::Real(b)) => compare_int_real(*a, *b),
            (Value::Real(a), Value::Integer(b)) => compare_int_real(*b, *a).reverse(),
            (Value::Real(a), Value::Real(b)) => a.partial_cmp(b).unwrap_or(Ordering::Equal),
            (Value::Text(a), Value::Text(b)) => text_cmp(a, b),
            (Value::Blob(a), Value::Blob(b)) => a.cmp(b),
            _ => Ordering::Equal,
        }
    }

    /// Compare with the binary collation.
    pub fn compare(&self, other: &Value) -> Ordering {
        self.compare_with(other, |a, b| a.cmp(b))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Real(r) => write!(f, "{}", format_real(*r)),
            Value::Text(s) => write!(f, "{}", s),
            Value::Blob(b) => {
                write!(f, "x'")?;
                for byte in b {
                    write!(f, "{:02x}", byte)?;
                }
                write!(f, "'")
            }
        }
    }
}

fn compare_int_real(i: i64, r: f64) -> Ordering {
    // i64 -> f64 is lossy above 2^53, compare in the integer domain when the
    // real is integral and within range.
    if r.fract() == 0.0 && r >= i64::MIN as f64 && r < i64::MAX as f64 {
        return i.cmp(&(r as i64));
    }
    (i as f64).partial_cmp(&r).unwrap_or(Ordering::Equal)
}

fn real_to_integer(r: f64) -> i64 {
    if r.is_nan() {
        0
    } else {
        // `as` saturates at the i64 bounds
        r as i64
    }
}

/// Convert a REAL holding an exact integer into an INTEGER.
fn integral_if_exact(value: Value) -> Value {
    match value {
        Value::Real(r)
            if r.fract() == 0.0 && r >= -9.223_372_036_854_775e18 && r < 9.223_372_036_854_775e18 =>
        {
            Value::Integer(r as i64)
        }
        other => other,
    }
}

/// Render a REAL the way result columns show it: integral values keep a
/// trailing `.0`, other values use the shortest round-trip form.
pub fn format_real(r: f64) -> String {
    if r.is_finite() && r.fract() == 0.0 && r.abs() < 1e15 {
        format!("{:.1}", r)
    } else if r.is_infinite() {
        if r > 0.0 { "Inf".to_string() } else { "-Inf".to_string() }
    } else {
        format!("{}", r)
    }
}

/// Parse the longest numeric prefix of `text`.
///
/// Returns the number (INTEGER when it has no fraction or exponent and fits
/// in 64 bits, REAL otherwise; `Integer(0)` when there is no number at all)
/// and whether the whole string, ignoring surrounding whitespace, was a
/// well-formed number.
pub fn parse_numeric_prefix(text: &str) -> (Value, bool) {
    let s = text.trim_start();
    let bytes = s.as_bytes();
    let mut i = 0;
    if i < bytes.len() && (bytes[i] == b'+' || bytes[i] == b'-') {
        i += 1;
    }
    let int_start = i;
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
    }
    let int_digits = i - int_start;
    let mut is_real = false;
    if i < bytes.len() && bytes[i] == b'.' {
        let mut k = i + 1;
        while k < bytes.len() && bytes[k].is_ascii_digit() {
            k += 1;
        }
        if int_digits > 0 || k > i + 1 {
            is_real = true;
            i = k;
        }
    }
    if int_digits == 0 && !is_real {
        return (Value::Integer(0), false);
    }
    if i < bytes.len() && (bytes[i] == b'e' || bytes[i] == b'E') {
        let mut k = i + 1;
        if k < bytes.len() && (bytes[k] == b'+' || bytes[k] == b'-') {
            k += 1;
        }
        let exp_start = k;
        while k < bytes.len() && bytes[k].is_ascii_digit() {
            k += 1;
        }
        if k > exp_start {
            is_real = true;
            i = k;
        }
    }
    let number = &s[..i];
    let whole = s[i..].trim().is_empty();
    let value = if is_real {
        Value::real(number.parse::<f64>().unwrap_or(0.0))
    } else {
        match number.parse::<i64>() {
            Ok(v) => Value::Integer(v),
            Err(_) => Value::real(number.parse::<f64>().unwrap_or(0.0)),
        }
    };
    (value, whole)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_class_conversion() -> Result<()> {
        assert_eq!(StorageClass::from_u8(0)?, StorageClass::Null);
        assert_eq!(StorageClass::from_u8(3)?, StorageClass::Text);
        assert!(StorageClass::from_u8(99).is_err());
        assert_eq!(Value::Real(1.5).storage_class().name(), "real");
        Ok(())
    }

    #[test]
    fn test_parse_numeric_prefix() {
        assert_eq!(parse_numeric_prefix("42"), (Value::Integer(42), true));
        assert_eq!(parse_numeric_prefix("  -7  "), (Value::Integer(-7), true));
        assert_eq!(parse_numeric_prefix("1.5"), (Value::Real(1.5), true));
        assert_eq!(parse_numeric_prefix("1e3"), (Value::Real(1000.0), true));
        assert_eq!(parse_numeric_prefix("12abc"), (Value::Integer(12), false));
        assert_eq!(parse_numeric_prefix("abc"), (Value::Integer(0), false));
        assert_eq!(parse_numeric_prefix(".5"), (Value::Real(0.5), true));
        // Too big for i64 becomes REAL
        assert_eq!(
            parse_numeric_prefix("9223372036854775808"),
            (Value::Real(9223372036854775808.0), true)
        );
    }

    #[test]
    fn test_apply_affinity() {
        assert_eq!(
            Value::Text("10".into()).apply_affinity(Affinity::Numeric),
            Value::Integer(10)
        );
        assert_eq!(
            Value::Text("3.0".into()).apply_affinity(Affinity::Integer),
            Value::Integer(3)
        );
        assert_eq!(
            Value::Text("10x".into()).apply_affinity(Affinity::Numeric),
            Value::Text("10x".into())
        );
        assert_eq!(
            Value::Integer(5).apply_affinity(Affinity::Text),
            Value::Text("5".into())
        );
        assert_eq!(Value::Integer(5).apply_affinity(Affinity::Real), Value::Real(5.0));
        assert_eq!(
            Value::Integer(5).apply_affinity(Affinity::Blob),
            Value::Integer(5)
        );
    }

    #[test]
    fn test_cast() {
        assert_eq!(Value::Text("12.7".into()).cast(Affinity::Integer), Value::Integer(12));
        assert_eq!(Value::Text("abc".into()).cast(Affinity::Numeric), Value::Integer(0));
        assert_eq!(Value::Real(2.0).cast(Affinity::Text), Value::Text("2.0".into()));
        assert_eq!(Value::Integer(1).cast(Affinity::Real), Value::Real(1.0));
        assert_eq!(Value::Null.cast(Affinity::Integer), Value::Null);
        assert_eq!(
            Value::Text("ab".into()).cast(Affinity::Blob),
            Value::Blob(b"ab".to_vec())
        );
    }

    #[test]
    fn test_compare_storage_classes() {
        assert_eq!(Value::Null.compare(&Value::Integer(1)), Ordering::Less);
        assert_eq!(Value::Integer(1).compare(&Value::Real(1.0)), Ordering::Equal);
        assert_eq!(Value::Integer(2).compare(&Value::Real(1.5)), Ordering::Greater);
        assert_eq!(
            Value::Integer(100).compare(&Value::Text("1".into())),
            Ordering::Less
        );
        assert_eq!(
            Value::Text("z".into()).compare(&Value::Blob(vec![0])),
            Ordering::Less
        );
        assert_eq!(
            Value::Text("a".into()).compare_with(&Value::Text("A".into()), |a, b| a
                .to_lowercase()
                .cmp(&b.to_lowercase())),
            Ordering::Equal
        );
    }

    #[test]
    fn test_truth_values() {
        assert_eq!(Value::Null.to_bool(), None);
        assert_eq!(Value::Integer(0).to_bool(), Some(false));
        assert_eq!(Value::Real(0.5).to_bool(), Some(true));
        assert_eq!(Value::Text("1abc".into()).to_bool(), Some(true));
        assert_eq!(Value::Text("abc".into()).to_bool(), Some(false));
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::Real(1.0).to_string(), "1.0");
        assert_eq!(Value::Real(0.25).to_string(), "0.25");
        assert_eq!(Value::Blob(vec![0xab, 0x01]).to_string(), "x'ab01'");
        assert_eq!(Value::Null.to_string(), "NULL");
    }
}
