//! A small interpreter for built plans.
//!
//! The evaluator runs a plan over rows held in a [`TableStore`] with SQL three-valued logic. It
//! exists so tests can execute the foreign key check queries a mutation plan carries; it never
//! applies the writes themselves. Everything is evaluated eagerly with nested loops.

use std::cmp::Ordering;

use rustc_hash::FxHashMap;
use strata_catalog::TableSchema;
use strata_expr::{BinaryOp, CompareOp, DecimalValue, Literal, ScalarExpr};
use strata_plan::{JoinKind, Metadata, MutationPlan, OrderingColumn, RelExpr};
use strata_result::{Error, Result};
use strata_types::{ColumnId, StableId, WithId};

/// Stored rows per catalog table. Each row holds one value per table column in schema order.
#[derive(Clone, Debug, Default)]
pub struct TableStore {
    tables: FxHashMap<StableId, Vec<Vec<Literal>>>,
}

impl TableStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a row. Missing trailing values (hidden and mutation-only columns) are NULL.
    pub fn insert<I, L>(&mut self, table: &TableSchema, values: I)
    where
        I: IntoIterator<Item = L>,
        L: Into<Literal>,
    {
        let mut row: Vec<Literal> = values.into_iter().map(Into::into).collect();
        row.resize(table.deletable_column_count(), Literal::Null);
        self.tables.entry(table.id).or_default().push(row);
    }

    pub fn rows(&self, id: StableId) -> &[Vec<Literal>] {
        self.tables.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// The rows produced by a plan node, with one value per output column.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Relation {
    pub cols: Vec<ColumnId>,
    pub rows: Vec<Vec<Literal>>,
}

impl Relation {
    fn position(&self, id: ColumnId) -> Result<usize> {
        self.cols
            .iter()
            .position(|&c| c == id)
            .ok_or_else(|| Error::assertion(format!("column {id} is not produced here")))
    }

    /// Every value of column `id`, in row order.
    pub fn column(&self, id: ColumnId) -> Result<Vec<Literal>> {
        let pos = self.position(id)?;
        Ok(self.rows.iter().map(|row| row[pos].clone()).collect())
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Values of the columns bound while evaluating one row.
pub type Env = FxHashMap<ColumnId, Literal>;

fn env_of(cols: &[ColumnId], row: &[Literal]) -> Env {
    cols.iter().copied().zip(row.iter().cloned()).collect()
}

pub struct Evaluator<'a> {
    md: &'a Metadata,
    store: &'a TableStore,
    buffers: FxHashMap<WithId, Relation>,
    next_rowid: i64,
}

impl<'a> Evaluator<'a> {
    pub fn new(md: &'a Metadata, store: &'a TableStore) -> Self {
        Self {
            md,
            store,
            buffers: FxHashMap::default(),
            next_rowid: 1_000_000,
        }
    }

    /// Make `rel` readable through `with`.
    pub fn bind(&mut self, with: WithId, rel: Relation) {
        self.buffers.insert(with, rel);
    }

    pub fn eval(&mut self, expr: &RelExpr) -> Result<Relation> {
        match expr {
            RelExpr::Scan(scan) => {
                let meta = self.md.table(scan.table);
                let ordinals = scan
                    .cols
                    .iter()
                    .map(|&id| {
                        meta.column_ordinal(id).ok_or_else(|| {
                            Error::assertion(format!("{id} is not a column of {}", meta.alias))
                        })
                    })
                    .collect::<Result<Vec<_>>>()?;
                let rows = self
                    .store
                    .rows(meta.schema.id)
                    .iter()
                    .map(|row| ordinals.iter().map(|&ord| row[ord].clone()).collect())
                    .collect();
                Ok(Relation {
                    cols: scan.cols.clone(),
                    rows,
                })
            }
            RelExpr::Values { cols, rows } => {
                let env = Env::default();
                let rows = rows
                    .iter()
                    .map(|row| {
                        row.iter()
                            .map(|e| self.scalar(e, &env))
                            .collect::<Result<Vec<_>>>()
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok(Relation {
                    cols: cols.clone(),
                    rows,
                })
            }
            RelExpr::Project {
                input,
                items,
                passthrough,
            } => {
                let input = self.eval(input)?;
                let positions = passthrough
                    .iter()
                    .map(|&id| input.position(id))
                    .collect::<Result<Vec<_>>>()?;
                let mut rows = Vec::with_capacity(input.rows.len());
                for row in &input.rows {
                    let env = env_of(&input.cols, row);
                    let mut out: Vec<Literal> = positions.iter().map(|&p| row[p].clone()).collect();
                    for item in items {
                        out.push(self.scalar(&item.expr, &env)?);
                    }
                    rows.push(out);
                }
                Ok(Relation {
                    cols: expr.output_cols(),
                    rows,
                })
            }
            RelExpr::Select { input, filter } => {
                let mut rel = self.eval(input)?;
                let mut kept = Vec::with_capacity(rel.rows.len());
                for row in rel.rows {
                    let env = env_of(&rel.cols, &row);
                    if self.scalar(filter, &env)?.as_bool() == Some(true) {
                        kept.push(row);
                    }
                }
                rel.rows = kept;
                Ok(rel)
            }
            RelExpr::Join {
                kind,
                left,
                right,
                on,
            } => {
                let left = self.eval(left)?;
                let right = self.eval(right)?;
                self.join(*kind, left, right, on)
            }
            RelExpr::Except {
                left,
                right,
                left_cols,
                right_cols,
                out_cols,
            } => {
                let left = self.eval(left)?;
                let right = self.eval(right)?;
                let lpos = left_cols
                    .iter()
                    .map(|&id| left.position(id))
                    .collect::<Result<Vec<_>>>()?;
                let rpos = right_cols
                    .iter()
                    .map(|&id| right.position(id))
                    .collect::<Result<Vec<_>>>()?;
                let key = |row: &[Literal], pos: &[usize]| -> Vec<Literal> {
                    pos.iter().map(|&p| row[p].clone()).collect()
                };
                let removed: Vec<Vec<Literal>> =
                    right.rows.iter().map(|row| key(row, &rpos)).collect();
                let mut rows: Vec<Vec<Literal>> = Vec::new();
                for row in &left.rows {
                    let k = key(row, &lpos);
                    if removed.iter().any(|r| not_distinct(r, &k))
                        || rows.iter().any(|r| not_distinct(r, &k))
                    {
                        continue;
                    }
                    rows.push(k);
                }
                Ok(Relation {
                    cols: out_cols.clone(),
                    rows,
                })
            }
            RelExpr::WithScan {
                with,
                in_cols,
                out_cols,
            } => {
                let buffer = self
                    .buffers
                    .get(with)
                    .ok_or_else(|| Error::assertion(format!("buffer {with} is not bound")))?;
                let positions = in_cols
                    .iter()
                    .map(|&id| buffer.position(id))
                    .collect::<Result<Vec<_>>>()?;
                let rows = buffer
                    .rows
                    .iter()
                    .map(|row| positions.iter().map(|&p| row[p].clone()).collect())
                    .collect();
                Ok(Relation {
                    cols: out_cols.clone(),
                    rows,
                })
            }
            RelExpr::DistinctOn {
                input,
                grouping,
                error_on_duplicate,
                nulls_distinct,
            } => {
                let mut rel = self.eval(input)?;
                let positions = grouping
                    .iter()
                    .map(|&id| rel.position(id))
                    .collect::<Result<Vec<_>>>()?;
                let mut seen: Vec<Vec<Literal>> = Vec::new();
                let mut kept = Vec::with_capacity(rel.rows.len());
                for row in rel.rows {
                    let key: Vec<Literal> = positions.iter().map(|&p| row[p].clone()).collect();
                    if *nulls_distinct && key.iter().any(Literal::is_null) {
                        kept.push(row);
                        continue;
                    }
                    if seen.iter().any(|k| not_distinct(k, &key)) {
                        if let Some(msg) = error_on_duplicate {
                            return Err(Error::ConstraintError(msg.clone()));
                        }
                        continue;
                    }
                    seen.push(key);
                    kept.push(row);
                }
                rel.rows = kept;
                Ok(rel)
            }
            RelExpr::Sort { input, ordering } => {
                let mut rel = self.eval(input)?;
                let keys = ordering
                    .iter()
                    .map(|o| rel.position(o.column).map(|p| (p, *o)))
                    .collect::<Result<Vec<(usize, OrderingColumn)>>>()?;
                rel.rows.sort_by(|a, b| {
                    for &(p, o) in &keys {
                        let ord = sort_order(&a[p], &b[p]);
                        let ord = if o.descending { ord.reverse() } else { ord };
                        if ord != Ordering::Equal {
                            return ord;
                        }
                    }
                    Ordering::Equal
                });
                Ok(rel)
            }
            RelExpr::Limit { input, limit } => {
                let mut rel = self.eval(input)?;
                match self.scalar(limit, &Env::default())? {
                    Literal::Integer(n) => rel.rows.truncate(n.max(0) as usize),
                    Literal::Null => {}
                    other => {
                        return Err(Error::InvalidArgumentError(format!(
                            "LIMIT must be an integer, got {other}"
                        )));
                    }
                }
                Ok(rel)
            }
            RelExpr::Mutation(m) => {
                // The rows a mutation returns, without applying it.
                let input = self.eval(&m.input)?;
                let cols = m.output_cols();
                let positions = cols
                    .iter()
                    .map(|&id| input.position(id))
                    .collect::<Result<Vec<_>>>()?;
                let rows = input
                    .rows
                    .iter()
                    .map(|row| positions.iter().map(|&p| row[p].clone()).collect())
                    .collect();
                Ok(Relation { cols, rows })
            }
        }
    }

    fn join(
        &mut self,
        kind: JoinKind,
        left: Relation,
        right: Relation,
        on: &[ScalarExpr],
    ) -> Result<Relation> {
        let mut cols = left.cols.clone();
        if matches!(kind, JoinKind::Inner | JoinKind::LeftOuter) {
            cols.extend(right.cols.iter().copied());
        }
        let mut rows = Vec::new();
        for lrow in &left.rows {
            let mut matched = false;
            for rrow in &right.rows {
                let mut env = env_of(&left.cols, lrow);
                env.extend(env_of(&right.cols, rrow));
                let mut pass = true;
                for cond in on {
                    if self.scalar(cond, &env)?.as_bool() != Some(true) {
                        pass = false;
                        break;
                    }
                }
                if !pass {
                    continue;
                }
                matched = true;
                match kind {
                    JoinKind::Inner | JoinKind::LeftOuter => {
                        rows.push(lrow.iter().chain(rrow).cloned().collect());
                    }
                    JoinKind::Semi | JoinKind::Anti => break,
                }
            }
            match kind {
                JoinKind::LeftOuter if !matched => {
                    let mut row = lrow.clone();
                    row.resize(cols.len(), Literal::Null);
                    rows.push(row);
                }
                JoinKind::Semi if matched => rows.push(lrow.clone()),
                JoinKind::Anti if !matched => rows.push(lrow.clone()),
                _ => {}
            }
        }
        Ok(Relation { cols, rows })
    }

    /// Evaluate a scalar expression against the bound columns of one row.
    pub fn scalar(&mut self, expr: &ScalarExpr, env: &Env) -> Result<Literal> {
        Ok(match expr {
            ScalarExpr::Column(id) => env
                .get(id)
                .cloned()
                .ok_or_else(|| Error::assertion(format!("column {id} is not bound")))?,
            ScalarExpr::Literal(lit) => lit.clone(),
            ScalarExpr::Binary { left, op, right } => {
                let l = self.scalar(left, env)?;
                let r = self.scalar(right, env)?;
                binary(*op, l, r)?
            }
            ScalarExpr::Compare { left, op, right } => {
                let l = self.scalar(left, env)?;
                let r = self.scalar(right, env)?;
                match l.compare(&r) {
                    None => Literal::Null,
                    Some(ord) => Literal::Boolean(match op {
                        CompareOp::Eq => ord == Ordering::Equal,
                        CompareOp::NotEq => ord != Ordering::Equal,
                        CompareOp::Lt => ord == Ordering::Less,
                        CompareOp::LtEq => ord != Ordering::Greater,
                        CompareOp::Gt => ord == Ordering::Greater,
                        CompareOp::GtEq => ord != Ordering::Less,
                    }),
                }
            }
            ScalarExpr::And(exprs) => {
                let mut saw_null = false;
                for e in exprs {
                    match self.scalar(e, env)?.as_bool() {
                        Some(false) => return Ok(Literal::Boolean(false)),
                        Some(true) => {}
                        None => saw_null = true,
                    }
                }
                if saw_null {
                    Literal::Null
                } else {
                    Literal::Boolean(true)
                }
            }
            ScalarExpr::Or(exprs) => {
                let mut saw_null = false;
                for e in exprs {
                    match self.scalar(e, env)?.as_bool() {
                        Some(true) => return Ok(Literal::Boolean(true)),
                        Some(false) => {}
                        None => saw_null = true,
                    }
                }
                if saw_null {
                    Literal::Null
                } else {
                    Literal::Boolean(false)
                }
            }
            ScalarExpr::Not(inner) => match self.scalar(inner, env)?.as_bool() {
                Some(b) => Literal::Boolean(!b),
                None => Literal::Null,
            },
            ScalarExpr::IsNull { expr, negated } => {
                Literal::Boolean(self.scalar(expr, env)?.is_null() != *negated)
            }
            ScalarExpr::Case {
                branches,
                else_expr,
            } => {
                for (cond, value) in branches {
                    if self.scalar(cond, env)?.as_bool() == Some(true) {
                        return self.scalar(value, env);
                    }
                }
                match else_expr {
                    Some(e) => self.scalar(e, env)?,
                    None => Literal::Null,
                }
            }
            ScalarExpr::Function { name, args } => {
                let args = args
                    .iter()
                    .map(|a| self.scalar(a, env))
                    .collect::<Result<Vec<_>>>()?;
                self.function(name, args)?
            }
            ScalarExpr::RoundDecimal { input, scale } => match self.scalar(input, env)? {
                Literal::Null => Literal::Null,
                Literal::Decimal(d) => Literal::Decimal(round(d, *scale)?),
                Literal::Integer(i) => Literal::Decimal(round(DecimalValue::from_i64(i), *scale)?),
                other => {
                    return Err(Error::InvalidArgumentError(format!(
                        "cannot round {other} to a decimal scale"
                    )));
                }
            },
        })
    }

    fn function(&mut self, name: &str, args: Vec<Literal>) -> Result<Literal> {
        Ok(match (name, args.as_slice()) {
            ("unique_rowid", []) => {
                self.next_rowid += 1;
                Literal::Integer(self.next_rowid)
            }
            ("coalesce", args) => args
                .iter()
                .find(|a| !a.is_null())
                .cloned()
                .unwrap_or(Literal::Null),
            (_, [Literal::Null]) => Literal::Null,
            ("lower", [Literal::String(s)]) => Literal::String(s.to_lowercase()),
            ("upper", [Literal::String(s)]) => Literal::String(s.to_uppercase()),
            ("btrim", [Literal::String(s)]) => Literal::String(s.trim().to_string()),
            ("length", [Literal::String(s)]) => Literal::Integer(s.chars().count() as i64),
            ("abs", [Literal::Integer(i)]) => Literal::Integer(i.abs()),
            ("abs", [Literal::Float(f)]) => Literal::Float(f.abs()),
            _ => {
                return Err(Error::InvalidArgumentError(format!(
                    "function {name}() is not supported by the evaluator"
                )));
            }
        })
    }
}

fn round(d: DecimalValue, scale: i8) -> Result<DecimalValue> {
    d.round_to_scale(scale)
        .map_err(|e| Error::InvalidArgumentError(e.to_string()))
}

fn not_distinct(a: &[Literal], b: &[Literal]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.not_distinct(y))
}

/// NULLs sort first.
fn sort_order(a: &Literal, b: &Literal) -> Ordering {
    match (a.is_null(), b.is_null()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => a.compare(b).unwrap_or(Ordering::Equal),
    }
}

fn binary(op: BinaryOp, l: Literal, r: Literal) -> Result<Literal> {
    use Literal::*;
    if l.is_null() || r.is_null() {
        return Ok(Null);
    }
    let overflow = || Error::InvalidArgumentError("integer out of range".into());
    Ok(match (op, l, r) {
        (BinaryOp::Concat, a, b) => String(format!("{}{}", plain(&a), plain(&b))),
        (op, Integer(a), Integer(b)) => Integer(match op {
            BinaryOp::Add => a.checked_add(b).ok_or_else(overflow)?,
            BinaryOp::Subtract => a.checked_sub(b).ok_or_else(overflow)?,
            BinaryOp::Multiply => a.checked_mul(b).ok_or_else(overflow)?,
            BinaryOp::Divide | BinaryOp::Modulo if b == 0 => {
                return Err(Error::InvalidArgumentError("division by zero".into()));
            }
            BinaryOp::Divide => a / b,
            _ => a % b,
        }),
        (op, Decimal(a), b) => decimal_binary(op, a, as_decimal(b)?)?,
        (op, a, Decimal(b)) => decimal_binary(op, as_decimal(a)?, b)?,
        (op, a, b) => {
            let (Some(a), Some(b)) = (as_f64(&a), as_f64(&b)) else {
                return Err(Error::InvalidArgumentError(format!(
                    "unsupported operands for {}",
                    op.as_str()
                )));
            };
            Float(match op {
                BinaryOp::Add => a + b,
                BinaryOp::Subtract => a - b,
                BinaryOp::Multiply => a * b,
                BinaryOp::Divide => a / b,
                _ => a % b,
            })
        }
    })
}

fn decimal_binary(op: BinaryOp, a: DecimalValue, b: DecimalValue) -> Result<Literal> {
    let err = |e: strata_expr::DecimalError| Error::InvalidArgumentError(e.to_string());
    let value = match op {
        BinaryOp::Add | BinaryOp::Subtract => {
            let scale = a.scale().max(b.scale());
            let (a, b) = (
                a.round_to_scale(scale).map_err(err)?,
                b.round_to_scale(scale).map_err(err)?,
            );
            let raw = if op == BinaryOp::Add {
                a.raw_value().checked_add(b.raw_value())
            } else {
                a.raw_value().checked_sub(b.raw_value())
            };
            let raw = raw.ok_or_else(|| Error::InvalidArgumentError("decimal overflow".into()))?;
            DecimalValue::new(raw, scale).map_err(err)?
        }
        BinaryOp::Multiply => {
            let raw = a
                .raw_value()
                .checked_mul(b.raw_value())
                .ok_or_else(|| Error::InvalidArgumentError("decimal overflow".into()))?;
            DecimalValue::new(raw, a.scale() + b.scale()).map_err(err)?
        }
        _ => return Ok(Literal::Float(binary_f64(op, a.to_f64(), b.to_f64()))),
    };
    Ok(Literal::Decimal(value))
}

fn binary_f64(op: BinaryOp, a: f64, b: f64) -> f64 {
    match op {
        BinaryOp::Divide => a / b,
        _ => a % b,
    }
}

fn as_decimal(lit: Literal) -> Result<DecimalValue> {
    match lit {
        Literal::Decimal(d) => Ok(d),
        Literal::Integer(i) => Ok(DecimalValue::from_i64(i)),
        other => Err(Error::InvalidArgumentError(format!("{other} is not a decimal"))),
    }
}

fn as_f64(lit: &Literal) -> Option<f64> {
    match lit {
        Literal::Integer(i) => Some(*i as f64),
        Literal::Float(f) => Some(*f),
        Literal::Decimal(d) => Some(d.to_f64()),
        _ => None,
    }
}

fn plain(lit: &Literal) -> String {
    match lit {
        Literal::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Evaluate the input of the plan's mutation node: the rows it would write, with every
/// column of the input.
pub fn mutation_input(plan: &MutationPlan, md: &Metadata, store: &TableStore) -> Result<Relation> {
    let m = plan
        .mutation()
        .ok_or_else(|| Error::assertion("plan has no mutation node"))?;
    Evaluator::new(md, store).eval(&m.input)
}

/// Run every foreign key check of `plan` against `store`.
///
/// The mutation input is evaluated once and bound to the plan's buffer id. The first check
/// producing a row is reported through its violation error.
pub fn run_fk_checks(plan: &MutationPlan, md: &Metadata, store: &TableStore) -> Result<()> {
    let m = plan
        .mutation()
        .ok_or_else(|| Error::assertion("plan has no mutation node"))?;
    let mut evaluator = Evaluator::new(md, store);
    let input = evaluator.eval(&m.input)?;
    if let Some(with) = m.private.with_id {
        evaluator.bind(with, input);
    }
    for item in &m.checks {
        let found = evaluator.eval(&item.check)?;
        tracing::debug!(fk_ordinal = item.fk_ordinal, rows = found.len(), "ran foreign key check");
        if !found.is_empty() {
            return Err(item.violation(md));
        }
    }
    Ok(())
}
