use std::cmp::Ordering;
use std::fmt;

use arrow::datatypes::DataType;

use crate::decimal::DecimalValue;

/// A constant value appearing in a lowered expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    Decimal(DecimalValue),
    String(String),
}

macro_rules! impl_from_for_literal {
    ($variant:ident, $($t:ty),*) => {
        $(
            impl From<$t> for Literal {
                fn from(v: $t) -> Self {
                    Literal::$variant(v.into())
                }
            }
        )*
    };
}

impl_from_for_literal!(Integer, i8, i16, i32, i64, u8, u16, u32);
impl_from_for_literal!(Float, f32, f64);
impl_from_for_literal!(Boolean, bool);
impl_from_for_literal!(Decimal, DecimalValue);

impl From<&str> for Literal {
    fn from(v: &str) -> Self {
        Literal::String(v.to_string())
    }
}

impl From<String> for Literal {
    fn from(v: String) -> Self {
        Literal::String(v)
    }
}

impl<T: Into<Literal>> From<Option<T>> for Literal {
    fn from(v: Option<T>) -> Self {
        v.map_or(Literal::Null, Into::into)
    }
}

impl Literal {
    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Literal::Null)
    }

    /// Natural type of the literal, `Null` for NULL.
    pub fn data_type(&self) -> DataType {
        match self {
            Literal::Null => DataType::Null,
            Literal::Boolean(_) => DataType::Boolean,
            Literal::Integer(_) => DataType::Int64,
            Literal::Float(_) => DataType::Float64,
            Literal::Decimal(d) => DataType::Decimal128(d.precision(), d.scale()),
            Literal::String(_) => DataType::Utf8,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Literal::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// SQL comparison. `None` when either side is NULL or the values are not comparable.
    pub fn compare(&self, other: &Literal) -> Option<Ordering> {
        use Literal::*;
        match (self, other) {
            (Null, _) | (_, Null) => None,
            (Boolean(a), Boolean(b)) => Some(a.cmp(b)),
            (Integer(a), Integer(b)) => Some(a.cmp(b)),
            (String(a), String(b)) => Some(a.cmp(b)),
            (Decimal(a), Decimal(b)) => Some(a.cmp(b)),
            (Integer(a), Decimal(b)) => Some(DecimalValue::from_i64(*a).cmp(b)),
            (Decimal(a), Integer(b)) => Some(a.cmp(&DecimalValue::from_i64(*b))),
            (Float(a), Float(b)) => a.partial_cmp(b),
            (Float(a), b) => b.as_f64().and_then(|b| a.partial_cmp(&b)),
            (a, Float(b)) => a.as_f64().and_then(|a| a.partial_cmp(b)),
            _ => None,
        }
    }

    /// True when both values are non-NULL and compare equal. NULL never equals anything.
    pub fn sql_eq(&self, other: &Literal) -> Option<bool> {
        if self.is_null() || other.is_null() {
            return None;
        }
        Some(self.compare(other) == Some(Ordering::Equal))
    }

    /// Equality for set operations, where NULL equals NULL.
    pub fn not_distinct(&self, other: &Literal) -> bool {
        match (self, other) {
            (Literal::Null, Literal::Null) => true,
            (Literal::Null, _) | (_, Literal::Null) => false,
            _ => self.compare(other) == Some(Ordering::Equal),
        }
    }

    fn as_f64(&self) -> Option<f64> {
        match self {
            Literal::Integer(i) => Some(*i as f64),
            Literal::Float(f) => Some(*f),
            Literal::Decimal(d) => Some(d.to_f64()),
            _ => None,
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Null => f.write_str("NULL"),
            Literal::Boolean(b) => write!(f, "{b}"),
            Literal::Integer(i) => write!(f, "{i}"),
            Literal::Float(v) => write!(f, "{v:?}"),
            Literal::Decimal(d) => write!(f, "{d}"),
            Literal::String(s) => write!(f, "'{}'", s.replace('\'', "''")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_never_compares() {
        assert_eq!(Literal::Null.sql_eq(&Literal::Null), None);
        assert_eq!(Literal::from(1).sql_eq(&Literal::Null), None);
        assert!(Literal::Null.not_distinct(&Literal::Null));
    }

    #[test]
    fn numeric_families_compare() {
        let five: DecimalValue = "5.00".parse().unwrap();
        assert_eq!(Literal::from(5).sql_eq(&Literal::from(five)), Some(true));
        assert_eq!(
            Literal::from(2.5).compare(&Literal::from(2)),
            Some(Ordering::Greater)
        );
        assert_eq!(Literal::from("a").compare(&Literal::from(1)), None);
    }

    #[test]
    fn string_display_escapes_quotes() {
        assert_eq!(Literal::from("it's").to_string(), "'it''s'");
    }
}
