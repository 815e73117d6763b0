//! Return types of the builtin functions default and computed expressions may call.

use arrow::datatypes::{DataType, TimeUnit};
use strata_catalog::sql_type_name;
use strata_result::{Error, Result};

fn expect_args(name: &str, args: &[DataType], count: usize) -> Result<()> {
    if args.len() != count {
        return Err(Error::InvalidArgumentError(format!(
            "{name}() takes {count} argument(s), {} given",
            args.len()
        )));
    }
    Ok(())
}

fn is_numeric(data_type: &DataType) -> bool {
    data_type.is_numeric() || matches!(data_type, DataType::Null)
}

/// Result type of `name(args...)`.
pub fn return_type(name: &str, args: &[DataType]) -> Result<DataType> {
    match name {
        "now" | "current_timestamp" | "transaction_timestamp" => {
            expect_args(name, args, 0)?;
            Ok(DataType::Timestamp(TimeUnit::Microsecond, Some("UTC".into())))
        }
        "unique_rowid" => {
            expect_args(name, args, 0)?;
            Ok(DataType::Int64)
        }
        "gen_random_uuid" => {
            expect_args(name, args, 0)?;
            Ok(DataType::Utf8)
        }
        "lower" | "upper" | "btrim" => {
            expect_args(name, args, 1)?;
            Ok(DataType::Utf8)
        }
        "length" => {
            expect_args(name, args, 1)?;
            Ok(DataType::Int64)
        }
        "abs" | "round" => {
            if args.is_empty() || args.len() > 2 || !is_numeric(&args[0]) {
                return Err(Error::InvalidArgumentError(format!(
                    "unknown signature: {name}({})",
                    args.iter().map(sql_type_name).collect::<Vec<_>>().join(", ")
                )));
            }
            Ok(args[0].clone())
        }
        "coalesce" => {
            if args.is_empty() {
                return Err(Error::InvalidArgumentError(
                    "coalesce() requires at least one argument".into(),
                ));
            }
            Ok(args
                .iter()
                .find(|t| !matches!(t, DataType::Null))
                .cloned()
                .unwrap_or(DataType::Null))
        }
        _ => Err(Error::InvalidArgumentError(format!(
            "unknown function: {name}()"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signatures() {
        assert_eq!(return_type("unique_rowid", &[]).unwrap(), DataType::Int64);
        assert_eq!(
            return_type("coalesce", &[DataType::Null, DataType::Utf8]).unwrap(),
            DataType::Utf8
        );
        assert!(return_type("lower", &[]).is_err());
        assert!(return_type("frobnicate", &[]).is_err());
        assert!(return_type("abs", &[DataType::Utf8]).is_err());
    }
}
