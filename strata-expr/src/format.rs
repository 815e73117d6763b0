//! Lightweight formatting helpers for expression enums.

use std::fmt;

use crate::{BinaryOp, CompareOp, ScalarExpr};

impl BinaryOp {
    /// Render the operator as a human-readable symbol.
    pub fn as_str(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Subtract => "-",
            BinaryOp::Multiply => "*",
            BinaryOp::Divide => "/",
            BinaryOp::Modulo => "%",
            BinaryOp::Concat => "||",
        }
    }
}

impl CompareOp {
    /// Render the operator as a human-readable symbol.
    pub fn as_str(&self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::NotEq => "!=",
            CompareOp::Lt => "<",
            CompareOp::LtEq => "<=",
            CompareOp::Gt => ">",
            CompareOp::GtEq => ">=",
        }
    }
}

fn write_joined(f: &mut fmt::Formatter<'_>, items: &[ScalarExpr], sep: &str) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(sep)?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

impl fmt::Display for ScalarExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalarExpr::Column(id) => write!(f, "{id}"),
            ScalarExpr::Literal(lit) => write!(f, "{lit}"),
            ScalarExpr::Binary { left, op, right } => {
                write!(f, "({left} {} {right})", op.as_str())
            }
            ScalarExpr::Compare { left, op, right } => {
                write!(f, "{left} {} {right}", op.as_str())
            }
            ScalarExpr::And(items) => {
                f.write_str("(")?;
                write_joined(f, items, " AND ")?;
                f.write_str(")")
            }
            ScalarExpr::Or(items) => {
                f.write_str("(")?;
                write_joined(f, items, " OR ")?;
                f.write_str(")")
            }
            ScalarExpr::Not(inner) => write!(f, "NOT {inner}"),
            ScalarExpr::IsNull { expr, negated } => {
                if *negated {
                    write!(f, "{expr} IS NOT NULL")
                } else {
                    write!(f, "{expr} IS NULL")
                }
            }
            ScalarExpr::Case {
                branches,
                else_expr,
            } => {
                f.write_str("CASE")?;
                for (cond, value) in branches {
                    write!(f, " WHEN {cond} THEN {value}")?;
                }
                if let Some(e) = else_expr {
                    write!(f, " ELSE {e}")?;
                }
                f.write_str(" END")
            }
            ScalarExpr::Function { name, args } => {
                write!(f, "{name}(")?;
                write_joined(f, args, ", ")?;
                f.write_str(")")
            }
            ScalarExpr::RoundDecimal { input, scale } => {
                write!(f, "round_to_scale({input}, {scale})")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use strata_types::ColumnId;

    use crate::ScalarExpr;

    #[test]
    fn renders_upsert_case() {
        let e = ScalarExpr::Case {
            branches: vec![(
                ScalarExpr::is_null(ScalarExpr::column(ColumnId(7))),
                ScalarExpr::column(ColumnId(2)),
            )],
            else_expr: Some(Box::new(ScalarExpr::column(ColumnId(9)))),
        };
        assert_eq!(e.to_string(), "CASE WHEN @7 IS NULL THEN @2 ELSE @9 END");
    }
}
