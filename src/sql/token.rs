//! SQL output tokens - the atomic units of generated SQL.
//!
//! These are distinct from the lexical tokens in [`crate::tsql::lexer`]:
//! lexical tokens describe text that was read, output tokens describe text
//! that will be written and know how to render themselves for a dialect.

use super::dialect::SqlDialect;

/// SQL output token.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // === Keywords ===
    Select,
    Distinct,
    From,
    Where,
    GroupBy,
    Having,
    OrderBy,
    Limit,
    And,
    Or,
    Not,
    As,
    Asc,
    Desc,
    In,
    IsNull,
    IsNotNull,
    Case,
    When,
    Then,
    Else,
    End,
    Cast,
    Except,

    // === Punctuation ===
    Comma,
    Dot,
    Star,
    LParen,
    RParen,

    // === Operators ===
    Eq,
    Ne,
    Lt,
    Gt,
    Lte,
    Gte,
    Plus,
    Minus,
    Mul,
    Div,
    Concat,

    // === Whitespace / Formatting ===
    Space,
    Newline,
    Indent(usize),

    // === Dynamic Content ===
    /// Simple identifier (column, alias)
    Ident(String),
    /// Unity Catalog name: catalog.schema.table, each part optional but the last
    QualifiedIdent {
        catalog: Option<String>,
        schema: Option<String>,
        name: String,
    },
    /// Integer literal
    LitInt(i64),
    /// Float literal
    LitFloat(f64),
    /// String literal
    LitString(String),
    /// Boolean literal
    LitBool(bool),
    /// NULL literal
    LitNull,
    /// Date literal, `YYYY-MM-DD`
    LitDate(String),
    /// Interval literal: amount and plural unit keyword
    Interval { amount: i64, unit: String },

    /// Function name, rendered upper-case
    FunctionName(String),

    // === Escape Hatch ===
    /// Pre-rendered SQL passed directly to output without escaping.
    ///
    /// Only for text that is already target-dialect SQL, such as a
    /// converted embedded query or a mapped type name.
    Raw(String),
}

impl Token {
    /// Text of tokens that render the same in every dialect.
    fn fixed(&self) -> Option<&'static str> {
        let text = match self {
            Token::Select => "SELECT",
            Token::Distinct => "DISTINCT",
            Token::From => "FROM",
            Token::Where => "WHERE",
            Token::GroupBy => "GROUP BY",
            Token::Having => "HAVING",
            Token::OrderBy => "ORDER BY",
            Token::Limit => "LIMIT",
            Token::And => "AND",
            Token::Or => "OR",
            Token::Not => "NOT",
            Token::As => "AS",
            Token::Asc => "ASC",
            Token::Desc => "DESC",
            Token::In => "IN",
            Token::IsNull => "IS NULL",
            Token::IsNotNull => "IS NOT NULL",
            Token::Case => "CASE",
            Token::When => "WHEN",
            Token::Then => "THEN",
            Token::Else => "ELSE",
            Token::End => "END",
            Token::Cast => "CAST",
            Token::Except => "EXCEPT",
            Token::Comma => ",",
            Token::Dot => ".",
            Token::Star | Token::Mul => "*",
            Token::LParen => "(",
            Token::RParen => ")",
            Token::Eq => "=",
            Token::Ne => "<>",
            Token::Lt => "<",
            Token::Gt => ">",
            Token::Lte => "<=",
            Token::Gte => ">=",
            Token::Plus => "+",
            Token::Minus => "-",
            Token::Div => "/",
            Token::Space => " ",
            Token::Newline => "\n",
            _ => return None,
        };
        Some(text)
    }

    /// Append this token's SQL for `dialect` to `out`.
    pub fn write_to(&self, out: &mut String, dialect: &dyn SqlDialect) {
        if let Some(text) = self.fixed() {
            out.push_str(text);
            return;
        }
        match self {
            Token::Concat => out.push_str(dialect.concat_operator()),
            Token::Indent(depth) => {
                for _ in 0..*depth {
                    out.push_str("  ");
                }
            }
            Token::Ident(name) => out.push_str(&dialect.render_identifier(name)),
            Token::QualifiedIdent {
                catalog,
                schema,
                name,
            } => {
                for part in [catalog.as_deref(), schema.as_deref()].into_iter().flatten() {
                    out.push_str(&dialect.render_identifier(part));
                    out.push('.');
                }
                out.push_str(&dialect.render_identifier(name));
            }
            Token::LitInt(n) => out.push_str(&n.to_string()),
            // NaN and infinities have no SQL literal
            Token::LitFloat(f) if !f.is_finite() => out.push_str(dialect.format_null()),
            Token::LitFloat(f) => out.push_str(ryu::Buffer::new().format(*f)),
            Token::LitString(s) => out.push_str(&dialect.quote_string(s)),
            Token::LitBool(b) => out.push_str(dialect.format_bool(*b)),
            Token::LitNull => out.push_str(dialect.format_null()),
            Token::LitDate(d) => out.push_str(&dialect.format_date_literal(d)),
            Token::Interval { amount, unit } => {
                out.push_str(&dialect.format_interval(&amount.to_string(), unit))
            }
            Token::FunctionName(name) => out.push_str(&name.to_uppercase()),
            Token::Raw(sql) => out.push_str(sql),
            _ => {}
        }
    }

    /// This token alone as SQL.
    pub fn serialize(&self, dialect: &dyn SqlDialect) -> String {
        let mut out = String::new();
        self.write_to(&mut out, dialect);
        out
    }
}

/// Tokens in output order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TokenStream {
    tokens: Vec<Token>,
}

impl TokenStream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, token: Token) -> &mut Self {
        self.tokens.push(token);
        self
    }

    pub fn extend(&mut self, tokens: impl IntoIterator<Item = Token>) -> &mut Self {
        self.tokens.extend(tokens);
        self
    }

    pub fn append(&mut self, other: &TokenStream) -> &mut Self {
        self.extend(other.tokens.iter().cloned())
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn serialize(&self, dialect: &dyn SqlDialect) -> String {
        let mut out = String::new();
        for token in &self.tokens {
            token.write_to(&mut out, dialect);
        }
        out
    }

    pub fn space(&mut self) -> &mut Self {
        self.push(Token::Space)
    }

    pub fn newline(&mut self) -> &mut Self {
        self.push(Token::Newline)
    }

    pub fn indent(&mut self, depth: usize) -> &mut Self {
        self.push(Token::Indent(depth))
    }

    pub fn comma(&mut self) -> &mut Self {
        self.push(Token::Comma)
    }

    pub fn lparen(&mut self) -> &mut Self {
        self.push(Token::LParen)
    }

    pub fn rparen(&mut self) -> &mut Self {
        self.push(Token::RParen)
    }
}
