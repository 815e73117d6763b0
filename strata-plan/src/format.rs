//! Indented text rendering of plan trees, used in trace logs and tests.

use std::fmt::Write;

use strata_types::ColumnId;

use crate::metadata::Metadata;
use crate::mutation::{ColList, FkDirection, MutationExpr};
use crate::rel::RelExpr;

/// Render `expr` as an indented tree.
pub fn explain(expr: &RelExpr, md: &Metadata) -> String {
    let mut out = String::new();
    write_expr(&mut out, expr, md, 0);
    out
}

fn cols(list: &[ColumnId]) -> String {
    let parts: Vec<String> = list.iter().map(|c| c.to_string()).collect();
    format!("({})", parts.join(","))
}

fn col_list(list: &ColList) -> String {
    let parts: Vec<String> = list
        .iter()
        .map(|c| c.map_or_else(|| "-".to_string(), |c| c.to_string()))
        .collect();
    format!("({})", parts.join(","))
}

fn line(out: &mut String, depth: usize, text: impl AsRef<str>) {
    for _ in 0..depth {
        out.push_str("  ");
    }
    out.push_str(text.as_ref());
    out.push('\n');
}

fn write_expr(out: &mut String, expr: &RelExpr, md: &Metadata, depth: usize) {
    match expr {
        RelExpr::Scan(scan) => {
            let table = md.table(scan.table);
            let mut text = format!("scan {}", table.schema.name);
            if let Some(hint) = &scan.index_hint {
                let _ = write!(text, "@{hint}");
            }
            let _ = write!(text, " {}", cols(&scan.cols));
            if scan.ignore_foreign_keys {
                text.push_str(" ignore-fks");
            }
            line(out, depth, text);
        }
        RelExpr::Values { cols: c, rows } => {
            line(out, depth, format!("values {} rows={}", cols(c), rows.len()));
            for row in rows {
                let parts: Vec<String> = row.iter().map(|e| e.to_string()).collect();
                line(out, depth + 1, format!("({})", parts.join(", ")));
            }
        }
        RelExpr::Project {
            input,
            items,
            passthrough,
        } => {
            line(out, depth, format!("project passthrough={}", cols(passthrough)));
            for item in items {
                line(
                    out,
                    depth + 1,
                    format!("{} {} := {}", item.id, md.column(item.id).alias, item.expr),
                );
            }
            write_expr(out, input, md, depth + 1);
        }
        RelExpr::Select { input, filter } => {
            line(out, depth, format!("select {filter}"));
            write_expr(out, input, md, depth + 1);
        }
        RelExpr::Join {
            kind,
            left,
            right,
            on,
        } => {
            let conds: Vec<String> = on.iter().map(|c| c.to_string()).collect();
            line(out, depth, format!("{} on ({})", kind.as_str(), conds.join(" AND ")));
            write_expr(out, left, md, depth + 1);
            write_expr(out, right, md, depth + 1);
        }
        RelExpr::Except {
            left,
            right,
            left_cols,
            right_cols,
            out_cols,
        } => {
            line(
                out,
                depth,
                format!(
                    "except {} - {} -> {}",
                    cols(left_cols),
                    cols(right_cols),
                    cols(out_cols)
                ),
            );
            write_expr(out, left, md, depth + 1);
            write_expr(out, right, md, depth + 1);
        }
        RelExpr::WithScan {
            with,
            in_cols,
            out_cols,
        } => line(
            out,
            depth,
            format!("with-scan {with} {} -> {}", cols(in_cols), cols(out_cols)),
        ),
        RelExpr::DistinctOn {
            input,
            grouping,
            error_on_duplicate,
            nulls_distinct,
        } => {
            let mut text = format!("distinct-on {}", cols(grouping));
            if error_on_duplicate.is_some() {
                text.push_str(" error-on-dup");
            }
            if *nulls_distinct {
                text.push_str(" nulls-distinct");
            }
            line(out, depth, text);
            write_expr(out, input, md, depth + 1);
        }
        RelExpr::Sort { input, ordering } => {
            let parts: Vec<String> = ordering
                .iter()
                .map(|o| format!("{}{}", if o.descending { "-" } else { "+" }, o.column))
                .collect();
            line(out, depth, format!("sort {}", parts.join(",")));
            write_expr(out, input, md, depth + 1);
        }
        RelExpr::Limit { input, limit } => {
            line(out, depth, format!("limit {limit}"));
            write_expr(out, input, md, depth + 1);
        }
        RelExpr::Mutation(m) => write_mutation(out, m, md, depth),
    }
}

fn write_mutation(out: &mut String, m: &MutationExpr, md: &Metadata, depth: usize) {
    let p = &m.private;
    line(
        out,
        depth,
        format!("{} {}", m.kind, md.table(p.table).schema.name),
    );
    let roles = [
        ("insert", &p.insert_cols),
        ("fetch", &p.fetch_cols),
        ("update", &p.update_cols),
        ("upsert", &p.upsert_cols),
        ("check", &p.check_cols),
    ];
    for (name, list) in roles {
        if list.iter().any(Option::is_some) {
            line(out, depth + 1, format!("{name}-cols {}", col_list(list)));
        }
    }
    if let Some(canary) = p.canary_col {
        line(out, depth + 1, format!("canary {canary}"));
    }
    if let Some(ret) = &p.return_cols {
        line(out, depth + 1, format!("return-cols {}", col_list(ret)));
    }
    if p.fk_fallback {
        line(out, depth + 1, "fk-fallback");
    }
    if let Some(with) = p.with_id {
        line(out, depth + 1, format!("buffer {with}"));
    }
    line(out, depth + 1, "input");
    write_expr(out, &m.input, md, depth + 2);
    for check in &m.checks {
        let dir = match check.direction {
            FkDirection::Outbound => "outbound",
            FkDirection::Inbound => "inbound",
        };
        let name = check.constraint(md).map_or("?", |fk| fk.name.as_str());
        line(
            out,
            depth + 1,
            format!("fk-check {dir} {name} key={}", cols(&check.key_cols)),
        );
        write_expr(out, &check.check, md, depth + 2);
    }
}
