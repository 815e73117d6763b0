use std::ops::ControlFlow;

use rustc_hash::FxHashSet;
use sqlparser::ast::{Expr as SqlExpr, visit_expressions};
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser;
use sqlparser::tokenizer::Token;
use strata_result::{Error, Result};

/// Parse a standalone scalar expression.
pub fn parse_expr(text: &str) -> Result<SqlExpr> {
    let dialect = GenericDialect {};
    let parse_error = |err: sqlparser::parser::ParserError| Error::Parse {
        near: text.to_string(),
        message: err.to_string(),
    };
    let mut parser = Parser::new(&dialect).try_with_sql(text).map_err(parse_error)?;
    let expr = parser.parse_expr().map_err(parse_error)?;
    let trailing = parser.peek_token();
    if trailing.token != Token::EOF {
        return Err(Error::Parse {
            near: trailing.token.to_string(),
            message: "unexpected trailing input".into(),
        });
    }
    Ok(expr)
}

/// Lowercase names of every column the expression references, qualified or not.
pub fn column_refs(expr: &SqlExpr) -> FxHashSet<String> {
    let mut names = FxHashSet::default();
    let _ = visit_expressions(expr, |e| {
        match e {
            SqlExpr::Identifier(ident) => {
                names.insert(ident.value.to_ascii_lowercase());
            }
            SqlExpr::CompoundIdentifier(parts) => {
                if let Some(last) = parts.last() {
                    names.insert(last.value.to_ascii_lowercase());
                }
            }
            _ => {}
        }
        ControlFlow::<()>::Continue(())
    });
    names
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_default_expressions() {
        assert!(parse_expr("now()").is_ok());
        assert!(parse_expr("a + b * 2").is_ok());
        assert!(parse_expr("NULL").is_ok());
    }

    #[test]
    fn reports_parse_errors() {
        let err = parse_expr("a +").unwrap_err();
        assert!(matches!(err, Error::Parse { .. }), "{err:?}");
        let err = parse_expr("a b").unwrap_err();
        assert!(matches!(err, Error::Parse { .. }), "{err:?}");
    }

    #[test]
    fn collects_column_references() {
        let expr = parse_expr("lower(t.Name) || suffix || 'x'").unwrap();
        let refs = column_refs(&expr);
        assert_eq!(refs.len(), 2);
        assert!(refs.contains("name"));
        assert!(refs.contains("suffix"));
    }
}
