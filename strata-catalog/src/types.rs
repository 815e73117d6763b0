//! Column type helpers over Arrow's `DataType`.

use std::sync::Arc;

use arrow::datatypes::{DataType, Field};

/// Decimal with no declared precision or scale. Values are stored as given.
pub const UNBOUNDED_DECIMAL: DataType = DataType::Decimal128(0, 0);

/// Array of `Decimal128(precision, scale)`.
pub fn decimal_array(precision: u8, scale: i8) -> DataType {
    DataType::List(Arc::new(Field::new(
        "item",
        DataType::Decimal128(precision, scale),
        true,
    )))
}

/// Scale mutated values of this type must be rounded to, if any.
///
/// Only bounded decimals and arrays of bounded decimals round. A precision of zero marks an
/// unbounded decimal, whose values keep whatever scale they arrive with.
pub fn rounding_scale(data_type: &DataType) -> Option<i8> {
    match data_type {
        DataType::Decimal128(precision, scale) if *precision > 0 => Some(*scale),
        DataType::List(field) => match field.data_type() {
            DataType::Decimal128(precision, scale) if *precision > 0 => Some(*scale),
            _ => None,
        },
        _ => None,
    }
}

/// SQL-flavoured type name for error messages.
pub fn sql_type_name(data_type: &DataType) -> String {
    match data_type {
        DataType::Null => "unknown".into(),
        DataType::Boolean => "BOOL".into(),
        DataType::Int8 | DataType::Int16 => "INT2".into(),
        DataType::Int32 => "INT4".into(),
        DataType::Int64
        | DataType::UInt8
        | DataType::UInt16
        | DataType::UInt32
        | DataType::UInt64 => "INT8".into(),
        DataType::Float16 | DataType::Float32 => "FLOAT4".into(),
        DataType::Float64 => "FLOAT8".into(),
        DataType::Decimal128(0, 0) => "DECIMAL".into(),
        DataType::Decimal128(p, s) => format!("DECIMAL({p},{s})"),
        DataType::Utf8 | DataType::LargeUtf8 | DataType::Utf8View => "STRING".into(),
        DataType::Binary | DataType::LargeBinary => "BYTES".into(),
        DataType::Date32 | DataType::Date64 => "DATE".into(),
        DataType::Timestamp(_, None) => "TIMESTAMP".into(),
        DataType::Timestamp(_, Some(_)) => "TIMESTAMPTZ".into(),
        DataType::List(field) => format!("{}[]", sql_type_name(field.data_type())),
        other => format!("{other:?}"),
    }
}

#[derive(PartialEq, Eq)]
enum Family {
    Unknown,
    Bool,
    Int,
    Float,
    Decimal,
    String,
    Bytes,
    Date,
    Timestamp,
    Array,
    Other,
}

fn family(data_type: &DataType) -> Family {
    match data_type {
        DataType::Null => Family::Unknown,
        DataType::Boolean => Family::Bool,
        DataType::Int8
        | DataType::Int16
        | DataType::Int32
        | DataType::Int64
        | DataType::UInt8
        | DataType::UInt16
        | DataType::UInt32
        | DataType::UInt64 => Family::Int,
        DataType::Float16 | DataType::Float32 | DataType::Float64 => Family::Float,
        DataType::Decimal128(_, _) | DataType::Decimal256(_, _) => Family::Decimal,
        DataType::Utf8 | DataType::LargeUtf8 | DataType::Utf8View => Family::String,
        DataType::Binary | DataType::LargeBinary => Family::Bytes,
        DataType::Date32 | DataType::Date64 => Family::Date,
        DataType::Timestamp(_, _) => Family::Timestamp,
        DataType::List(_) | DataType::LargeList(_) => Family::Array,
        _ => Family::Other,
    }
}

/// True when a value of type `value` may be stored in a column of type `column` without an
/// explicit cast. Widths, precisions and scales within one family are interchangeable, and the
/// NULL type fits everything.
pub fn types_equivalent(value: &DataType, column: &DataType) -> bool {
    let (vf, cf) = (family(value), family(column));
    if vf == Family::Unknown || cf == Family::Unknown {
        return true;
    }
    match (value, column) {
        (DataType::List(a), DataType::List(b)) => types_equivalent(a.data_type(), b.data_type()),
        _ if vf == Family::Other => value == column,
        _ => vf == cf,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unbounded_decimals_do_not_round() {
        assert_eq!(rounding_scale(&UNBOUNDED_DECIMAL), None);
        assert_eq!(rounding_scale(&DataType::Decimal128(10, 2)), Some(2));
        assert_eq!(rounding_scale(&decimal_array(6, 3)), Some(3));
        assert_eq!(rounding_scale(&decimal_array(0, 0)), None);
        assert_eq!(rounding_scale(&DataType::Float64), None);
    }

    #[test]
    fn families_are_equivalent() {
        assert!(types_equivalent(&DataType::Int32, &DataType::Int64));
        assert!(types_equivalent(&DataType::Null, &DataType::Utf8));
        assert!(types_equivalent(
            &DataType::Decimal128(5, 0),
            &DataType::Decimal128(10, 2)
        ));
        assert!(!types_equivalent(&DataType::Utf8, &DataType::Int64));
        assert!(!types_equivalent(&decimal_array(6, 3), &DataType::Decimal128(6, 3)));
    }

    #[test]
    fn type_names() {
        assert_eq!(sql_type_name(&DataType::Decimal128(10, 2)), "DECIMAL(10,2)");
        assert_eq!(sql_type_name(&UNBOUNDED_DECIMAL), "DECIMAL");
        assert_eq!(sql_type_name(&decimal_array(6, 3)), "DECIMAL(6,3)[]");
    }
}
