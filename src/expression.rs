//! Parser for the SQL-like where clause.
//!
//! A where clause such as `location=default-site or location=site_1` is parsed
//! into an [`Expr`] tree of AND/OR groups over `field <op> value` comparisons.
//! The grammar lives in `expression.pest`. Parsing failures surface as
//! [`GraphselError::Parse`] before any remote call is made.

use pest::Parser;
use pest::iterators::Pair;
use pest_derive::Parser;

use crate::error::{GraphselError, Result};

#[derive(Parser)]
#[grammar = "expression.pest"]
struct ExpressionParser;

/// Comparison operator of a leaf condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cmp {
    Eq,
    Ne,
}

/// Parsed boolean expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    And(Vec<Expr>),
    Or(Vec<Expr>),
    Leaf { field: String, op: Cmp, value: String },
}

/// Parse a where clause into an expression tree.
pub fn parse_expression(input: &str) -> Result<Expr> {
    let mut pairs = ExpressionParser::parse(Rule::expression, input).map_err(|e| {
        let (line, col) = match e.line_col {
            pest::error::LineColLocation::Pos((l, c)) => (Some(l), Some(c)),
            pest::error::LineColLocation::Span((l, c), _) => (Some(l), Some(c)),
        };
        GraphselError::Parse { message: format!("invalid where clause: {e}"), line, col }
    })?;
    let expression = pairs.next().ok_or_else(|| GraphselError::Parse {
        message: "empty where clause".into(),
        line: None,
        col: None,
    })?;
    let or_expr = expression
        .into_inner()
        .find(|p| p.as_rule() == Rule::or_expr)
        .ok_or_else(|| GraphselError::Parse {
            message: "empty where clause".into(),
            line: None,
            col: None,
        })?;
    Ok(convert_or(or_expr))
}

fn convert_or(pair: Pair<Rule>) -> Expr {
    let mut children: Vec<Expr> = pair.into_inner().map(convert_and).collect();
    if children.len() == 1 { children.remove(0) } else { Expr::Or(children) }
}

fn convert_and(pair: Pair<Rule>) -> Expr {
    let mut children: Vec<Expr> = pair.into_inner().map(convert_primary).collect();
    if children.len() == 1 { children.remove(0) } else { Expr::And(children) }
}

fn convert_primary(pair: Pair<Rule>) -> Expr {
    let inner = pair.into_inner().next().expect("primary has one child");
    match inner.as_rule() {
        Rule::comparison => convert_comparison(inner),
        Rule::or_expr => convert_or(inner),
        rule => unreachable!("unexpected rule in primary: {rule:?}"),
    }
}

fn convert_comparison(pair: Pair<Rule>) -> Expr {
    let mut field = String::new();
    let mut op = Cmp::Eq;
    let mut value = String::new();
    for part in pair.into_inner() {
        match part.as_rule() {
            Rule::field => field = part.as_str().to_owned(),
            Rule::operator => op = if part.as_str() == "!=" { Cmp::Ne } else { Cmp::Eq },
            Rule::value => {
                let raw = part.as_str();
                // strip enclosing double quotes from quoted values
                value = if raw.len() >= 2 && raw.starts_with('"') && raw.ends_with('"') {
                    raw[1..raw.len() - 1].to_owned()
                } else {
                    raw.to_owned()
                };
            }
            _ => (),
        }
    }
    Expr::Leaf { field, op, value }
}
