//! SQL expression AST and builder helpers.
//!
//! Expressions are built by the M compiler and rendered through
//! [`TokenStream`]. Binary operators are parenthesized from precedence, so
//! callers can combine predicates freely.

use super::dialect::SqlDialect;
use super::token::{Token, TokenStream};

/// A SQL expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Column reference, optionally table-qualified.
    Column {
        table: Option<String>,
        column: String,
    },

    /// Literal value.
    Literal(Literal),

    /// Binary operation: left op right
    BinaryOp {
        left: Box<Expr>,
        op: BinaryOperator,
        right: Box<Expr>,
    },

    /// Unary operation: op expr
    UnaryOp { op: UnaryOperator, expr: Box<Expr> },

    /// Function call: name(args)
    Function {
        name: String,
        args: Vec<Expr>,
        distinct: bool,
    },

    /// CAST(expr AS type), the type already in target spelling.
    Cast { expr: Box<Expr>, data_type: String },

    /// CASE WHEN ... THEN ... ELSE ... END
    Case {
        when_clauses: Vec<(Expr, Expr)>,
        else_clause: Option<Box<Expr>>,
    },

    /// expr [NOT] IN (values)
    In {
        expr: Box<Expr>,
        values: Vec<Expr>,
        negated: bool,
    },

    /// expr IS [NOT] NULL
    IsNull { expr: Box<Expr>, negated: bool },

    /// INTERVAL n UNIT
    Interval { amount: i64, unit: String },

    /// `*`, optionally `* EXCEPT (cols)`
    Star { except: Vec<String> },

    /// Parenthesized expression.
    Paren(Box<Expr>),

    /// Pre-rendered SQL.
    Raw(String),
}

/// Literal values.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Int(i64),
    Float(f64),
    String(String),
    Bool(bool),
    Null,
    /// `YYYY-MM-DD`
    Date(String),
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    // Comparison
    Eq,
    Ne,
    Lt,
    Gt,
    Lte,
    Gte,
    // Logical
    And,
    Or,
    // Arithmetic
    Plus,
    Minus,
    Mul,
    Div,
    // String
    Concat,
}

impl BinaryOperator {
    fn precedence(self) -> u8 {
        match self {
            BinaryOperator::Or => 1,
            BinaryOperator::And => 2,
            BinaryOperator::Eq
            | BinaryOperator::Ne
            | BinaryOperator::Lt
            | BinaryOperator::Gt
            | BinaryOperator::Lte
            | BinaryOperator::Gte => 3,
            BinaryOperator::Plus | BinaryOperator::Minus | BinaryOperator::Concat => 4,
            BinaryOperator::Mul | BinaryOperator::Div => 5,
        }
    }

    fn token(self) -> Token {
        match self {
            BinaryOperator::Eq => Token::Eq,
            BinaryOperator::Ne => Token::Ne,
            BinaryOperator::Lt => Token::Lt,
            BinaryOperator::Gt => Token::Gt,
            BinaryOperator::Lte => Token::Lte,
            BinaryOperator::Gte => Token::Gte,
            BinaryOperator::And => Token::And,
            BinaryOperator::Or => Token::Or,
            BinaryOperator::Plus => Token::Plus,
            BinaryOperator::Minus => Token::Minus,
            BinaryOperator::Mul => Token::Mul,
            BinaryOperator::Div => Token::Div,
            BinaryOperator::Concat => Token::Concat,
        }
    }
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    Not,
    Minus,
}

impl Expr {
    pub fn to_tokens(&self) -> TokenStream {
        let mut ts = TokenStream::new();
        self.write_tokens(&mut ts);
        ts
    }

    pub fn to_sql(&self, dialect: &dyn SqlDialect) -> String {
        self.to_tokens().serialize(dialect)
    }

    /// Append this expression to `ts`.
    fn write_tokens(&self, ts: &mut TokenStream) {
        match self {
            Expr::Column { table, column } => {
                if let Some(table) = table {
                    ts.push(Token::Ident(table.clone())).push(Token::Dot);
                }
                ts.push(Token::Ident(column.clone()));
            }
            Expr::Literal(lit) => {
                ts.push(lit.token());
            }
            Expr::BinaryOp { left, op, right } => {
                // `a - (b - c)` and `a / (b / c)` keep their parentheses
                let right_assoc = matches!(op, BinaryOperator::Minus | BinaryOperator::Div);
                left.write_operand(ts, op.precedence(), false);
                ts.space().push(op.token()).space();
                right.write_operand(ts, op.precedence(), right_assoc);
            }
            Expr::UnaryOp { op, expr } => {
                match op {
                    UnaryOperator::Not => ts.push(Token::Not).space(),
                    UnaryOperator::Minus => ts.push(Token::Minus),
                };
                expr.write_operand(ts, u8::MAX, false);
            }
            Expr::Function {
                name,
                args,
                distinct,
            } => {
                ts.push(Token::FunctionName(name.clone())).lparen();
                if *distinct {
                    ts.push(Token::Distinct).space();
                }
                write_list(ts, args);
                ts.rparen();
            }
            Expr::Cast { expr, data_type } => {
                ts.push(Token::Cast).lparen();
                expr.write_tokens(ts);
                ts.space()
                    .push(Token::As)
                    .space()
                    .push(Token::Raw(data_type.clone()))
                    .rparen();
            }
            Expr::Case {
                when_clauses,
                else_clause,
            } => {
                ts.push(Token::Case);
                for (condition, result) in when_clauses {
                    ts.space().push(Token::When).space();
                    condition.write_tokens(ts);
                    ts.space().push(Token::Then).space();
                    result.write_tokens(ts);
                }
                if let Some(fallback) = else_clause {
                    ts.space().push(Token::Else).space();
                    fallback.write_tokens(ts);
                }
                ts.space().push(Token::End);
            }
            // an empty IN list is not valid SQL
            Expr::In { values, negated, .. } if values.is_empty() => {
                ts.push(Token::LitBool(*negated));
            }
            Expr::In {
                expr,
                values,
                negated,
            } => {
                expr.write_tokens(ts);
                if *negated {
                    ts.space().push(Token::Not);
                }
                ts.space().push(Token::In).space().lparen();
                write_list(ts, values);
                ts.rparen();
            }
            Expr::IsNull { expr, negated } => {
                expr.write_tokens(ts);
                let test = if *negated { Token::IsNotNull } else { Token::IsNull };
                ts.space().push(test);
            }
            Expr::Interval { amount, unit } => {
                ts.push(Token::Interval {
                    amount: *amount,
                    unit: unit.clone(),
                });
            }
            Expr::Star { except } => {
                ts.push(Token::Star);
                if !except.is_empty() {
                    ts.space().push(Token::Except).space().lparen();
                    for (i, name) in except.iter().enumerate() {
                        if i > 0 {
                            ts.comma().space();
                        }
                        ts.push(Token::Ident(name.clone()));
                    }
                    ts.rparen();
                }
            }
            Expr::Paren(inner) => {
                ts.lparen();
                inner.write_tokens(ts);
                ts.rparen();
            }
            Expr::Raw(sql) => {
                ts.push(Token::Raw(sql.clone()));
            }
        }
    }

    /// Write as the operand of an operator binding at `parent`.
    fn write_operand(&self, ts: &mut TokenStream, parent: u8, right_assoc: bool) {
        let wrap = match self {
            Expr::BinaryOp { op, .. } => {
                let own = op.precedence();
                own < parent || (right_assoc && own == parent)
            }
            _ => false,
        };
        if wrap {
            ts.lparen();
            self.write_tokens(ts);
            ts.rparen();
        } else {
            self.write_tokens(ts);
        }
    }
}

impl Literal {
    fn token(&self) -> Token {
        match self {
            Literal::Int(n) => Token::LitInt(*n),
            Literal::Float(f) => Token::LitFloat(*f),
            Literal::String(s) => Token::LitString(s.clone()),
            Literal::Bool(b) => Token::LitBool(*b),
            Literal::Null => Token::LitNull,
            Literal::Date(d) => Token::LitDate(d.clone()),
        }
    }
}

fn write_list(ts: &mut TokenStream, items: &[Expr]) {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            ts.comma().space();
        }
        item.write_tokens(ts);
    }
}

// =============================================================================
// Constructors
// =============================================================================

/// Column reference.
pub fn col(name: &str) -> Expr {
    Expr::Column {
        table: None,
        column: name.into(),
    }
}

pub fn lit_int(n: i64) -> Expr {
    Expr::Literal(Literal::Int(n))
}

pub fn lit_float(f: f64) -> Expr {
    Expr::Literal(Literal::Float(f))
}

pub fn lit_str(s: &str) -> Expr {
    Expr::Literal(Literal::String(s.into()))
}

pub fn lit_bool(b: bool) -> Expr {
    Expr::Literal(Literal::Bool(b))
}

pub fn lit_null() -> Expr {
    Expr::Literal(Literal::Null)
}

/// `DATE 'YYYY-MM-DD'`
pub fn lit_date(date: &str) -> Expr {
    Expr::Literal(Literal::Date(date.into()))
}

pub fn star() -> Expr {
    Expr::Star { except: vec![] }
}

/// `* EXCEPT (cols)`
pub fn star_except(columns: Vec<String>) -> Expr {
    Expr::Star { except: columns }
}

/// `INTERVAL n UNIT`
pub fn interval(amount: i64, unit: &str) -> Expr {
    Expr::Interval {
        amount,
        unit: unit.into(),
    }
}

/// `CAST(expr AS data_type)`
pub fn cast(expr: Expr, data_type: &str) -> Expr {
    Expr::Cast {
        expr: Box::new(expr),
        data_type: data_type.into(),
    }
}

/// Generic function call.
pub fn func(name: &str, args: Vec<Expr>) -> Expr {
    Expr::Function {
        name: name.into(),
        args,
        distinct: false,
    }
}

pub fn count(expr: Expr) -> Expr {
    func("COUNT", vec![expr])
}

pub fn count_star() -> Expr {
    func("COUNT", vec![star()])
}

pub fn sum(expr: Expr) -> Expr {
    func("SUM", vec![expr])
}

pub fn avg(expr: Expr) -> Expr {
    func("AVG", vec![expr])
}

pub fn min(expr: Expr) -> Expr {
    func("MIN", vec![expr])
}

pub fn max(expr: Expr) -> Expr {
    func("MAX", vec![expr])
}

/// Conjoin predicates; `None` when empty.
pub fn and_all(predicates: impl IntoIterator<Item = Expr>) -> Option<Expr> {
    predicates.into_iter().reduce(|acc, p| acc.and(p))
}

/// Operator methods so predicates read left to right.
pub trait ExprExt: Sized {
    fn into_expr(self) -> Expr;

    fn binary(self, op: BinaryOperator, other: impl Into<Expr>) -> Expr {
        Expr::BinaryOp {
            left: Box::new(self.into_expr()),
            op,
            right: Box::new(other.into()),
        }
    }

    fn eq(self, other: impl Into<Expr>) -> Expr {
        self.binary(BinaryOperator::Eq, other)
    }

    fn gt(self, other: impl Into<Expr>) -> Expr {
        self.binary(BinaryOperator::Gt, other)
    }

    fn gte(self, other: impl Into<Expr>) -> Expr {
        self.binary(BinaryOperator::Gte, other)
    }

    fn and(self, other: impl Into<Expr>) -> Expr {
        self.binary(BinaryOperator::And, other)
    }

    fn or(self, other: impl Into<Expr>) -> Expr {
        self.binary(BinaryOperator::Or, other)
    }

    fn sub(self, other: impl Into<Expr>) -> Expr {
        self.binary(BinaryOperator::Minus, other)
    }

    fn is_null(self) -> Expr {
        Expr::IsNull {
            expr: Box::new(self.into_expr()),
            negated: false,
        }
    }

    fn is_not_null(self) -> Expr {
        Expr::IsNull {
            expr: Box::new(self.into_expr()),
            negated: true,
        }
    }
}

impl ExprExt for Expr {
    fn into_expr(self) -> Expr {
        self
    }
}
