use arrow::datatypes::DataType;
use sqlparser::ast::{
    BinaryOperator, Expr as SqlExpr, FunctionArg, FunctionArgExpr, FunctionArguments, Ident,
    UnaryOperator, Value,
};
use strata_catalog::{sql_type_name, types_equivalent};
use strata_expr::{BinaryOp, CompareOp, DecimalValue, Literal, ScalarExpr};
use strata_plan::{ScopeColumn, find_column};
use strata_result::{Error, Result};

use crate::functions;

/// A lowered expression and the type it produces.
#[derive(Clone, Debug, PartialEq)]
pub struct TypedExpr {
    pub expr: ScalarExpr,
    pub data_type: DataType,
}

impl TypedExpr {
    fn new(expr: ScalarExpr, data_type: DataType) -> Self {
        Self { expr, data_type }
    }
}

/// Parses expression text and lowers parsed expressions against a set of scope columns.
///
/// Errors are returned as produced; the planner re-signals them unchanged.
pub trait ScalarResolver: Send + Sync {
    fn parse_expr(&self, text: &str) -> Result<SqlExpr>;

    /// Resolve `expr` against `cols`. `desired` guides the typing of constants (a bare `1`
    /// headed for a DECIMAL column becomes a decimal) but is not enforced.
    fn resolve(
        &self,
        expr: &SqlExpr,
        cols: &[ScopeColumn],
        desired: Option<&DataType>,
    ) -> Result<TypedExpr>;

    /// Resolve `expr` and require its type to be equivalent to `required`.
    fn resolve_and_require_type(
        &self,
        expr: &SqlExpr,
        cols: &[ScopeColumn],
        required: &DataType,
    ) -> Result<ScalarExpr> {
        let typed = self.resolve(expr, cols, Some(required))?;
        if !types_equivalent(&typed.data_type, required) {
            return Err(Error::InvalidArgumentError(format!(
                "expected {expr} to be of type {}, found type {}",
                sql_type_name(required),
                sql_type_name(&typed.data_type)
            )));
        }
        Ok(typed.expr)
    }
}

/// [`ScalarResolver`] over `sqlparser`'s generic dialect.
#[derive(Clone, Copy, Debug, Default)]
pub struct SqlScalarResolver;

impl ScalarResolver for SqlScalarResolver {
    fn parse_expr(&self, text: &str) -> Result<SqlExpr> {
        crate::parse::parse_expr(text)
    }

    fn resolve(
        &self,
        expr: &SqlExpr,
        cols: &[ScopeColumn],
        desired: Option<&DataType>,
    ) -> Result<TypedExpr> {
        let lowered = lower(expr, cols, desired)?;
        tracing::trace!(%expr, lowered = %lowered.expr, "resolved scalar expression");
        Ok(lowered)
    }
}

fn lower(expr: &SqlExpr, cols: &[ScopeColumn], desired: Option<&DataType>) -> Result<TypedExpr> {
    match expr {
        SqlExpr::Identifier(ident) => lower_column(cols, None, ident),
        SqlExpr::CompoundIdentifier(parts) => match parts.as_slice() {
            [.., qualifier, name] => lower_column(cols, Some(&qualifier.value), name),
            [name] => lower_column(cols, None, name),
            [] => Err(Error::InvalidArgumentError("empty identifier".into())),
        },
        SqlExpr::Value(value) => lower_value(&value.value, desired),
        SqlExpr::Nested(inner) => lower(inner, cols, desired),
        SqlExpr::UnaryOp { op, expr: inner } => match op {
            UnaryOperator::Plus => lower(inner, cols, desired),
            UnaryOperator::Minus => {
                let typed = lower(inner, cols, desired)?;
                let negated = match typed.expr {
                    ScalarExpr::Literal(Literal::Integer(v)) => {
                        ScalarExpr::Literal(Literal::Integer(-v))
                    }
                    ScalarExpr::Literal(Literal::Float(v)) => {
                        ScalarExpr::Literal(Literal::Float(-v))
                    }
                    ScalarExpr::Literal(Literal::Decimal(d)) => {
                        let value = DecimalValue::new(-d.raw_value(), d.scale())
                            .map_err(|e| Error::InvalidArgumentError(e.to_string()))?;
                        ScalarExpr::Literal(Literal::Decimal(value))
                    }
                    other => ScalarExpr::Binary {
                        left: Box::new(ScalarExpr::literal(0)),
                        op: BinaryOp::Subtract,
                        right: Box::new(other),
                    },
                };
                Ok(TypedExpr::new(negated, typed.data_type))
            }
            UnaryOperator::Not => {
                let inner = require_bool(inner, cols)?;
                Ok(TypedExpr::new(ScalarExpr::not(inner), DataType::Boolean))
            }
            other => Err(unsupported(format!("unary operator {other}"))),
        },
        SqlExpr::IsNull(inner) => {
            let typed = lower(inner, cols, None)?;
            Ok(TypedExpr::new(ScalarExpr::is_null(typed.expr), DataType::Boolean))
        }
        SqlExpr::IsNotNull(inner) => {
            let typed = lower(inner, cols, None)?;
            Ok(TypedExpr::new(
                ScalarExpr::is_not_null(typed.expr),
                DataType::Boolean,
            ))
        }
        SqlExpr::BinaryOp { left, op, right } => lower_binary(left, op, right, cols, desired),
        SqlExpr::Function(func) => {
            let name = func.name.to_string().to_ascii_lowercase();
            let raw_args: Vec<&SqlExpr> = match &func.args {
                FunctionArguments::None => Vec::new(),
                FunctionArguments::List(list) => list
                    .args
                    .iter()
                    .map(|arg| match arg {
                        FunctionArg::Unnamed(FunctionArgExpr::Expr(e)) => Ok(e),
                        other => Err(unsupported(format!("function argument {other}"))),
                    })
                    .collect::<Result<_>>()?,
                FunctionArguments::Subquery(_) => {
                    return Err(unsupported(format!("subquery argument to {name}()")));
                }
            };
            let mut args = Vec::with_capacity(raw_args.len());
            let mut arg_types = Vec::with_capacity(raw_args.len());
            for arg in raw_args {
                let typed = lower(arg, cols, desired)?;
                arg_types.push(typed.data_type);
                args.push(typed.expr);
            }
            let data_type = functions::return_type(&name, &arg_types)?;
            Ok(TypedExpr::new(ScalarExpr::Function { name, args }, data_type))
        }
        SqlExpr::Case {
            operand,
            conditions,
            else_result,
            ..
        } => {
            let operand = operand
                .as_ref()
                .map(|o| lower(o, cols, None))
                .transpose()?;
            let mut result_type: Option<DataType> = None;
            let mut branches = Vec::with_capacity(conditions.len());
            for when in conditions {
                let cond = match &operand {
                    Some(op) => {
                        let value = lower(&when.condition, cols, Some(&op.data_type))?;
                        ScalarExpr::compare(op.expr.clone(), CompareOp::Eq, value.expr)
                    }
                    None => require_bool(&when.condition, cols)?,
                };
                let value = lower(&when.result, cols, desired.or(result_type.as_ref()))?;
                merge_result_type(&mut result_type, &value.data_type)?;
                branches.push((cond, value.expr));
            }
            let else_expr = match else_result {
                Some(e) => {
                    let value = lower(e, cols, desired.or(result_type.as_ref()))?;
                    merge_result_type(&mut result_type, &value.data_type)?;
                    Some(Box::new(value.expr))
                }
                None => None,
            };
            Ok(TypedExpr::new(
                ScalarExpr::Case {
                    branches,
                    else_expr,
                },
                result_type.unwrap_or(DataType::Null),
            ))
        }
        other => Err(unsupported(format!("expression {other}"))),
    }
}

fn unsupported(what: String) -> Error {
    Error::InvalidArgumentError(format!("unsupported {what}"))
}

fn lower_column(cols: &[ScopeColumn], qualifier: Option<&str>, name: &Ident) -> Result<TypedExpr> {
    let ord = find_column(cols, qualifier, &name.value)?.ok_or_else(|| {
        Error::UndefinedColumn(match qualifier {
            Some(q) => format!("{q}.{}", name.value),
            None => name.value.clone(),
        })
    })?;
    let col = &cols[ord];
    Ok(TypedExpr::new(ScalarExpr::column(col.id), col.data_type.clone()))
}

fn lower_value(value: &Value, desired: Option<&DataType>) -> Result<TypedExpr> {
    match value {
        Value::Null => Ok(TypedExpr::new(
            ScalarExpr::null(),
            desired.cloned().unwrap_or(DataType::Null),
        )),
        Value::Boolean(b) => Ok(TypedExpr::new(ScalarExpr::literal(*b), DataType::Boolean)),
        Value::SingleQuotedString(s) | Value::DoubleQuotedString(s) => Ok(TypedExpr::new(
            ScalarExpr::literal(s.as_str()),
            DataType::Utf8,
        )),
        Value::Number(text, _) => lower_number(text, desired),
        other => Err(unsupported(format!("literal {other}"))),
    }
}

fn lower_number(text: &str, desired: Option<&DataType>) -> Result<TypedExpr> {
    let invalid = |e: &dyn std::fmt::Display| {
        Error::InvalidArgumentError(format!("invalid numeric literal {text}: {e}"))
    };
    let wants_decimal = matches!(desired, Some(DataType::Decimal128(_, _)));
    let wants_float = matches!(
        desired,
        Some(DataType::Float16 | DataType::Float32 | DataType::Float64)
    );

    if text.contains(['e', 'E']) || wants_float {
        let value = text.parse::<f64>().map_err(|e| invalid(&e))?;
        return Ok(TypedExpr::new(ScalarExpr::literal(value), DataType::Float64));
    }
    if text.contains('.') || wants_decimal {
        let value: DecimalValue = text.parse().map_err(|e| invalid(&e))?;
        let data_type = match desired {
            Some(dt @ DataType::Decimal128(_, _)) => dt.clone(),
            _ => {
                let precision = value.precision().max(value.scale().max(0) as u8);
                DataType::Decimal128(precision, value.scale())
            }
        };
        return Ok(TypedExpr::new(ScalarExpr::literal(value), data_type));
    }
    let value = text.parse::<i64>().map_err(|e| invalid(&e))?;
    Ok(TypedExpr::new(ScalarExpr::literal(value), DataType::Int64))
}

fn require_bool(expr: &SqlExpr, cols: &[ScopeColumn]) -> Result<ScalarExpr> {
    let typed = lower(expr, cols, Some(&DataType::Boolean))?;
    if !types_equivalent(&typed.data_type, &DataType::Boolean) {
        return Err(Error::InvalidArgumentError(format!(
            "argument of {expr} must be type BOOL, not type {}",
            sql_type_name(&typed.data_type)
        )));
    }
    Ok(typed.expr)
}

fn merge_result_type(current: &mut Option<DataType>, next: &DataType) -> Result<()> {
    match current {
        Some(existing) if matches!(existing, DataType::Null) => *current = Some(next.clone()),
        Some(existing) => {
            if !types_equivalent(next, existing) {
                return Err(Error::InvalidArgumentError(format!(
                    "incompatible value types {} and {}",
                    sql_type_name(existing),
                    sql_type_name(next)
                )));
            }
        }
        None => *current = Some(next.clone()),
    }
    Ok(())
}

fn comparable(left: &DataType, right: &DataType) -> bool {
    types_equivalent(left, right) || (left.is_numeric() && right.is_numeric())
}

fn arithmetic_type(left: &DataType, right: &DataType) -> Option<DataType> {
    match (left, right) {
        (DataType::Null, other) | (other, DataType::Null) => Some(other.clone()),
        (l @ DataType::Decimal128(_, _), r) | (r, l @ DataType::Decimal128(_, _))
            if r.is_numeric() =>
        {
            Some(l.clone())
        }
        (l, r) if l.is_floating() || r.is_floating() => {
            (l.is_numeric() && r.is_numeric()).then_some(DataType::Float64)
        }
        (l, r) if l.is_integer() && r.is_integer() => Some(DataType::Int64),
        _ => None,
    }
}

fn lower_binary(
    left: &SqlExpr,
    op: &BinaryOperator,
    right: &SqlExpr,
    cols: &[ScopeColumn],
    desired: Option<&DataType>,
) -> Result<TypedExpr> {
    let compare_op = match op {
        BinaryOperator::Eq => Some(CompareOp::Eq),
        BinaryOperator::NotEq => Some(CompareOp::NotEq),
        BinaryOperator::Lt => Some(CompareOp::Lt),
        BinaryOperator::LtEq => Some(CompareOp::LtEq),
        BinaryOperator::Gt => Some(CompareOp::Gt),
        BinaryOperator::GtEq => Some(CompareOp::GtEq),
        _ => None,
    };
    if let Some(cmp) = compare_op {
        let l = lower(left, cols, None)?;
        let r = lower(right, cols, Some(&l.data_type))?;
        if !comparable(&l.data_type, &r.data_type) {
            return Err(Error::InvalidArgumentError(format!(
                "unsupported comparison operator: {} {} {}",
                sql_type_name(&l.data_type),
                cmp.as_str(),
                sql_type_name(&r.data_type)
            )));
        }
        return Ok(TypedExpr::new(
            ScalarExpr::compare(l.expr, cmp, r.expr),
            DataType::Boolean,
        ));
    }

    match op {
        BinaryOperator::And | BinaryOperator::Or => {
            let l = require_bool(left, cols)?;
            let r = require_bool(right, cols)?;
            let expr = if matches!(op, BinaryOperator::And) {
                ScalarExpr::And(vec![l, r])
            } else {
                ScalarExpr::Or(vec![l, r])
            };
            Ok(TypedExpr::new(expr, DataType::Boolean))
        }
        BinaryOperator::StringConcat => {
            let l = lower(left, cols, Some(&DataType::Utf8))?;
            let r = lower(right, cols, Some(&DataType::Utf8))?;
            Ok(TypedExpr::new(
                ScalarExpr::Binary {
                    left: Box::new(l.expr),
                    op: BinaryOp::Concat,
                    right: Box::new(r.expr),
                },
                DataType::Utf8,
            ))
        }
        BinaryOperator::Plus
        | BinaryOperator::Minus
        | BinaryOperator::Multiply
        | BinaryOperator::Divide
        | BinaryOperator::Modulo => {
            let arith = match op {
                BinaryOperator::Plus => BinaryOp::Add,
                BinaryOperator::Minus => BinaryOp::Subtract,
                BinaryOperator::Multiply => BinaryOp::Multiply,
                BinaryOperator::Divide => BinaryOp::Divide,
                _ => BinaryOp::Modulo,
            };
            let l = lower(left, cols, desired)?;
            let r = lower(right, cols, Some(&l.data_type))?;
            let data_type = arithmetic_type(&l.data_type, &r.data_type).ok_or_else(|| {
                Error::InvalidArgumentError(format!(
                    "unsupported binary operator: {} {} {}",
                    sql_type_name(&l.data_type),
                    arith.as_str(),
                    sql_type_name(&r.data_type)
                ))
            })?;
            Ok(TypedExpr::new(
                ScalarExpr::Binary {
                    left: Box::new(l.expr),
                    op: arith,
                    right: Box::new(r.expr),
                },
                data_type,
            ))
        }
        other => Err(unsupported(format!("binary operator {other}"))),
    }
}

#[cfg(test)]
mod tests {
    use strata_types::ColumnId;

    use super::*;

    fn cols() -> Vec<ScopeColumn> {
        vec![
            ScopeColumn::new(ColumnId(1), "x", DataType::Int64).with_table("t"),
            ScopeColumn::new(ColumnId(2), "price", DataType::Decimal128(10, 2)).with_table("t"),
            ScopeColumn::new(ColumnId(3), "name", DataType::Utf8).with_table("t"),
            ScopeColumn::new(ColumnId(4), "gone", DataType::Int64).with_mutation(true),
        ]
    }

    fn resolve(text: &str, desired: Option<&DataType>) -> Result<TypedExpr> {
        let resolver = SqlScalarResolver;
        let expr = resolver.parse_expr(text)?;
        resolver.resolve(&expr, &cols(), desired)
    }

    #[test]
    fn integer_constant_takes_desired_decimal_type() {
        let typed = resolve("1", Some(&DataType::Decimal128(10, 2))).unwrap();
        assert_eq!(typed.data_type, DataType::Decimal128(10, 2));
        assert!(matches!(typed.expr, ScalarExpr::Literal(Literal::Decimal(_))));

        let typed = resolve("1", None).unwrap();
        assert_eq!(typed.data_type, DataType::Int64);
    }

    #[test]
    fn resolves_qualified_columns_and_arithmetic() {
        let typed = resolve("t.price * 2", None).unwrap();
        assert_eq!(typed.data_type, DataType::Decimal128(10, 2));
        assert!(typed.expr.referenced_columns().contains(&ColumnId(2)));
    }

    #[test]
    fn mutation_columns_are_not_resolvable() {
        let err = resolve("gone + 1", None).unwrap_err();
        assert_eq!(err, Error::UndefinedColumn("gone".into()));
    }

    #[test]
    fn require_type_rejects_mismatch() {
        let resolver = SqlScalarResolver;
        let expr = resolver.parse_expr("name").unwrap();
        let err = resolver
            .resolve_and_require_type(&expr, &cols(), &DataType::Boolean)
            .unwrap_err();
        assert!(err.to_string().contains("to be of type BOOL"), "{err}");

        let expr = resolver.parse_expr("x > 0 AND name IS NOT NULL").unwrap();
        assert!(
            resolver
                .resolve_and_require_type(&expr, &cols(), &DataType::Boolean)
                .is_ok()
        );
    }

    #[test]
    fn comparing_string_to_int_fails() {
        assert!(resolve("name = 1", None).is_err());
    }

    #[test]
    fn searched_and_simple_case() {
        let typed = resolve("CASE WHEN x IS NULL THEN 'a' ELSE name END", None).unwrap();
        assert_eq!(typed.data_type, DataType::Utf8);
        let typed = resolve("CASE x WHEN 1 THEN 10 ELSE 20 END", None).unwrap();
        assert_eq!(typed.data_type, DataType::Int64);
    }
}
