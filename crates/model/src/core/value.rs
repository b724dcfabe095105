use serde::{Deserialize, Serialize};
use std::{cmp::Ordering, fmt};

/// A single column value as it travels from one store to another.
///
/// The variants follow the MySQL protocol one-to-one so that a row read from
/// the source is written back byte-for-byte, including legacy zero dates such
/// as `0000-00-00` that a calendar type would refuse.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Value {
    Null,
    Bytes(Vec<u8>),
    Int(i64),
    Uint(u64),
    Float(f32),
    Double(f64),
    /// year, month, day, hour, minute, second, microsecond
    Date(u16, u8, u8, u8, u8, u8, u32),
    /// negative, days, hours, minutes, seconds, microseconds
    Time(bool, u32, u8, u8, u8, u32),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_string(&self) -> Option<String> {
        match self {
            Value::Bytes(b) => String::from_utf8(b.clone()).ok(),
            Value::Int(v) => Some(v.to_string()),
            Value::Uint(v) => Some(v.to_string()),
            Value::Float(v) => Some(v.to_string()),
            Value::Double(v) => Some(v.to_string()),
            Value::Date(..) | Value::Time(..) => Some(self.to_string()),
            Value::Null => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::Int(v) => u64::try_from(*v).ok(),
            Value::Uint(v) => Some(*v),
            Value::Bytes(b) => std::str::from_utf8(b).ok()?.parse().ok(),
            _ => None,
        }
    }

    fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(v) => Some(*v as f64),
            Value::Uint(v) => Some(*v as f64),
            Value::Float(v) => Some(*v as f64),
            Value::Double(v) => Some(*v),
            _ => None,
        }
    }
}

// NULL sorts first, numbers compare across widths, everything else compares
// within its own variant only.
impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        use Value::*;
        match (self, other) {
            (Null, Null) => Some(Ordering::Equal),
            (Null, _) => Some(Ordering::Less),
            (_, Null) => Some(Ordering::Greater),
            (Int(a), Int(b)) => a.partial_cmp(b),
            (Uint(a), Uint(b)) => a.partial_cmp(b),
            (Bytes(a), Bytes(b)) => a.partial_cmp(b),
            (Date(..), Date(..)) | (Time(..), Time(..)) => {
                self.to_string().partial_cmp(&other.to_string())
            }
            _ => match (self.as_f64(), other.as_f64()) {
                (Some(a), Some(b)) => a.partial_cmp(&b),
                _ => None,
            },
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Bytes(b) => write!(f, "{}", String::from_utf8_lossy(b)),
            Value::Int(v) => write!(f, "{v}"),
            Value::Uint(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Double(v) => write!(f, "{v}"),
            Value::Date(y, mo, d, h, mi, s, us) => {
                write!(f, "{y:04}-{mo:02}-{d:02} {h:02}:{mi:02}:{s:02}")?;
                if *us > 0 {
                    write!(f, ".{us:06}")?;
                }
                Ok(())
            }
            Value::Time(neg, days, h, mi, s, us) => {
                let hours = *days * 24 + u32::from(*h);
                let sign = if *neg { "-" } else { "" };
                write!(f, "{sign}{hours:02}:{mi:02}:{s:02}")?;
                if *us > 0 {
                    write!(f, ".{us:06}")?;
                }
                Ok(())
            }
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Bytes(s.as_bytes().to_vec())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Bytes(s.into_bytes())
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::Uint(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_date_renders_verbatim() {
        let v = Value::Date(0, 0, 0, 0, 0, 0, 0);
        assert_eq!(v.to_string(), "0000-00-00 00:00:00");
    }

    #[test]
    fn orders_numbers_across_widths() {
        assert!(Value::Int(2) < Value::Uint(3));
        assert!(Value::Null < Value::Int(-10));
        assert!(Value::Double(1.5) > Value::Int(1));
        assert_eq!(Value::from("a").partial_cmp(&Value::Int(1)), None);
    }

    #[test]
    fn reads_counts_from_text() {
        assert_eq!(Value::from("250").as_u64(), Some(250));
        assert_eq!(Value::Int(-1).as_u64(), None);
    }
}
