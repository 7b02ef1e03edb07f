//! SELECT statements emitted for compiled M queries.
//!
//! The layout is fixed: one clause per line, select items indented on their
//! own lines, so converted files diff cleanly against each other.

use super::dialect::SqlDialect;
use super::expr::Expr;
use super::token::{Token, TokenStream};

/// A SELECT list item.
#[derive(Debug, Clone, PartialEq)]
#[must_use = "builders have no effect until used"]
pub struct SelectExpr {
    pub expr: Expr,
    pub alias: Option<String>,
}

impl SelectExpr {
    pub fn new(expr: Expr) -> Self {
        Self { expr, alias: None }
    }

    pub fn with_alias(mut self, alias: &str) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn to_tokens(&self) -> TokenStream {
        let mut ts = self.expr.to_tokens();
        if let Some(alias) = &self.alias {
            push_alias(&mut ts, alias);
        }
        ts
    }
}

/// A Unity Catalog table. Catalog and schema are omitted when unknown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRef {
    pub catalog: Option<String>,
    pub schema: Option<String>,
    pub table: String,
}

impl TableRef {
    /// `catalog.schema.table`.
    pub fn qualified(catalog: &str, schema: &str, table: &str) -> Self {
        Self {
            catalog: Some(catalog.into()),
            schema: Some(schema.into()),
            table: table.into(),
        }
    }
}

/// What a query reads from.
#[derive(Debug, Clone, PartialEq)]
pub enum FromItem {
    Table(TableRef),
    /// A derived table whose SQL is already in the target dialect.
    Derived { sql: String, alias: String },
}

impl FromItem {
    fn to_tokens(&self) -> TokenStream {
        let mut ts = TokenStream::new();
        match self {
            FromItem::Table(table) => {
                ts.push(Token::QualifiedIdent {
                    catalog: table.catalog.clone(),
                    schema: table.schema.clone(),
                    name: table.table.clone(),
                });
            }
            FromItem::Derived { sql, alias } => {
                let body = sql.trim_end().trim_end_matches(';');
                ts.lparen()
                    .newline()
                    .push(Token::Raw(indent_lines(body)))
                    .newline()
                    .rparen();
                push_alias(&mut ts, alias);
            }
        }
        ts
    }
}

fn push_alias(ts: &mut TokenStream, alias: &str) {
    ts.space()
        .push(Token::As)
        .space()
        .push(Token::Ident(alias.to_string()));
}

/// Indent non-empty lines by one level.
fn indent_lines(sql: &str) -> String {
    let mut out = String::with_capacity(sql.len());
    for (i, line) in sql.lines().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        if !line.is_empty() {
            out.push_str("  ");
            out.push_str(line);
        }
    }
    out
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDir {
    Asc,
    Desc,
}

/// An ORDER BY key. `dir` is `None` when the source left it implicit.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderByExpr {
    pub expr: Expr,
    pub dir: Option<SortDir>,
}

impl OrderByExpr {
    pub fn new(expr: Expr) -> Self {
        Self { expr, dir: None }
    }

    pub fn asc(expr: Expr) -> Self {
        Self {
            expr,
            dir: Some(SortDir::Asc),
        }
    }

    pub fn desc(expr: Expr) -> Self {
        Self {
            expr,
            dir: Some(SortDir::Desc),
        }
    }

    fn to_tokens(&self) -> TokenStream {
        let mut ts = self.expr.to_tokens();
        match self.dir {
            Some(SortDir::Asc) => {
                ts.space().push(Token::Asc);
            }
            Some(SortDir::Desc) => {
                ts.space().push(Token::Desc);
            }
            None => {}
        }
        ts
    }
}

/// A single SELECT statement.
///
/// An empty `select` renders as `*`.
#[derive(Debug, Clone, Default, PartialEq)]
#[must_use = "Query has no effect until converted to SQL with to_sql()"]
pub struct Query {
    pub select: Vec<SelectExpr>,
    pub distinct: bool,
    pub from: Option<FromItem>,
    pub where_clause: Option<Expr>,
    pub group_by: Vec<Expr>,
    pub having: Option<Expr>,
    pub order_by: Vec<OrderByExpr>,
    pub limit: Option<u64>,
}

impl Query {
    pub fn to_tokens(&self, dialect: &dyn SqlDialect) -> TokenStream {
        let mut ts = TokenStream::new();

        ts.push(Token::Select);
        if self.distinct {
            ts.space().push(Token::Distinct);
        }
        if self.select.is_empty() {
            ts.newline().indent(1).push(Token::Star);
        }
        for (i, item) in self.select.iter().enumerate() {
            if i > 0 {
                ts.comma();
            }
            ts.newline().indent(1).append(&item.to_tokens());
        }

        if let Some(from) = &self.from {
            ts.newline().push(Token::From).space().append(&from.to_tokens());
        }
        if let Some(predicate) = &self.where_clause {
            ts.newline().push(Token::Where).space().append(&predicate.to_tokens());
        }
        if !self.group_by.is_empty() {
            ts.newline().push(Token::GroupBy).space();
            push_list(&mut ts, self.group_by.iter().map(Expr::to_tokens));
        }
        if let Some(predicate) = &self.having {
            ts.newline().push(Token::Having).space().append(&predicate.to_tokens());
        }
        if !self.order_by.is_empty() {
            ts.newline().push(Token::OrderBy).space();
            push_list(&mut ts, self.order_by.iter().map(OrderByExpr::to_tokens));
        }
        if let Some(n) = self.limit {
            ts.newline().append(&dialect.emit_limit(n));
        }
        ts
    }

    pub fn to_sql(&self, dialect: &dyn SqlDialect) -> String {
        self.to_tokens(dialect).serialize(dialect)
    }
}

/// `a, b, c` on one line.
fn push_list(ts: &mut TokenStream, items: impl Iterator<Item = TokenStream>) {
    for (i, item) in items.enumerate() {
        if i > 0 {
            ts.comma().space();
        }
        ts.append(&item);
    }
}
