use rustc_hash::FxHashSet;
use strata_types::ColumnId;

use crate::literal::Literal;

/// Arithmetic and string operators.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Concat,
}

/// Comparison operators.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CompareOp {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
}

/// A typed-checked scalar expression over plan columns.
#[derive(Clone, Debug, PartialEq)]
pub enum ScalarExpr {
    Column(ColumnId),
    Literal(Literal),
    Binary {
        left: Box<ScalarExpr>,
        op: BinaryOp,
        right: Box<ScalarExpr>,
    },
    Compare {
        left: Box<ScalarExpr>,
        op: CompareOp,
        right: Box<ScalarExpr>,
    },
    And(Vec<ScalarExpr>),
    Or(Vec<ScalarExpr>),
    Not(Box<ScalarExpr>),
    IsNull {
        expr: Box<ScalarExpr>,
        negated: bool,
    },
    /// Searched CASE: the first branch whose condition is true wins.
    Case {
        branches: Vec<(ScalarExpr, ScalarExpr)>,
        else_expr: Option<Box<ScalarExpr>>,
    },
    Function {
        name: String,
        args: Vec<ScalarExpr>,
    },
    /// Round a decimal (or every element of a decimal array) to `scale` fractional digits.
    RoundDecimal {
        input: Box<ScalarExpr>,
        scale: i8,
    },
}

impl ScalarExpr {
    #[inline]
    pub fn column(id: ColumnId) -> Self {
        ScalarExpr::Column(id)
    }

    #[inline]
    pub fn literal(lit: impl Into<Literal>) -> Self {
        ScalarExpr::Literal(lit.into())
    }

    #[inline]
    pub fn null() -> Self {
        ScalarExpr::Literal(Literal::Null)
    }

    pub fn compare(left: ScalarExpr, op: CompareOp, right: ScalarExpr) -> Self {
        ScalarExpr::Compare {
            left: Box::new(left),
            op,
            right: Box::new(right),
        }
    }

    /// `left = right` over two columns, the shape of every join condition the planner emits.
    pub fn columns_eq(left: ColumnId, right: ColumnId) -> Self {
        Self::compare(Self::Column(left), CompareOp::Eq, Self::Column(right))
    }

    pub fn is_null(expr: ScalarExpr) -> Self {
        ScalarExpr::IsNull {
            expr: Box::new(expr),
            negated: false,
        }
    }

    pub fn is_not_null(expr: ScalarExpr) -> Self {
        ScalarExpr::IsNull {
            expr: Box::new(expr),
            negated: true,
        }
    }

    /// Conjunction; a single operand is returned unwrapped.
    pub fn all_of(mut exprs: Vec<ScalarExpr>) -> Self {
        if exprs.len() == 1 {
            return exprs.remove(0);
        }
        ScalarExpr::And(exprs)
    }

    /// Disjunction; a single operand is returned unwrapped.
    pub fn any_of(mut exprs: Vec<ScalarExpr>) -> Self {
        if exprs.len() == 1 {
            return exprs.remove(0);
        }
        ScalarExpr::Or(exprs)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(expr: ScalarExpr) -> Self {
        ScalarExpr::Not(Box::new(expr))
    }

    pub fn round_decimal(input: ScalarExpr, scale: i8) -> Self {
        ScalarExpr::RoundDecimal {
            input: Box::new(input),
            scale,
        }
    }

    /// Visit this node and every descendant in pre-order.
    pub fn walk<'a>(&'a self, f: &mut impl FnMut(&'a ScalarExpr)) {
        f(self);
        match self {
            ScalarExpr::Column(_) | ScalarExpr::Literal(_) => {}
            ScalarExpr::Binary { left, right, .. } | ScalarExpr::Compare { left, right, .. } => {
                left.walk(f);
                right.walk(f);
            }
            ScalarExpr::And(items) | ScalarExpr::Or(items) => {
                for item in items {
                    item.walk(f);
                }
            }
            ScalarExpr::Not(inner) => inner.walk(f),
            ScalarExpr::IsNull { expr, .. } => expr.walk(f),
            ScalarExpr::Case {
                branches,
                else_expr,
            } => {
                for (cond, value) in branches {
                    cond.walk(f);
                    value.walk(f);
                }
                if let Some(e) = else_expr {
                    e.walk(f);
                }
            }
            ScalarExpr::Function { args, .. } => {
                for arg in args {
                    arg.walk(f);
                }
            }
            ScalarExpr::RoundDecimal { input, .. } => input.walk(f),
        }
    }

    /// Every column the expression reads.
    pub fn referenced_columns(&self) -> FxHashSet<ColumnId> {
        let mut cols = FxHashSet::default();
        self.walk(&mut |e| {
            if let ScalarExpr::Column(id) = e {
                cols.insert(*id);
            }
        });
        cols
    }
}
