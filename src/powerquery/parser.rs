//! Recursive-descent parser for M `let ... in` documents.
//!
//! Covers the expression forms that appear in Power Query steps: literals,
//! lists, records, field and item access, calls, `each`, lambdas,
//! `if/then/else`, `try/otherwise`, nested `let`, and the logical, comparison
//! and arithmetic operators. Anything else is an [`ConvertError::MSyntax`].

use super::ast::{Binding, MBinaryOp, MDocument, MExpr, MUnaryOp};
use super::lexer::{tokenize, Keyword, MToken, Spanned};
use crate::error::{ConvertError, ConvertResult};

/// Parse a complete M document.
pub fn parse(source: &str) -> ConvertResult<MDocument> {
    let tokens = tokenize(source)?;
    Parser::new(tokens, source.len()).document()
}

/// Parse a single M expression.
pub fn parse_expr(source: &str) -> ConvertResult<MExpr> {
    let tokens = tokenize(source)?;
    let mut parser = Parser::new(tokens, source.len());
    let expr = parser.expr()?;
    parser.expect_end()?;
    Ok(expr)
}

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
    eof: usize,
}

impl Parser {
    fn new(tokens: Vec<Spanned>, eof: usize) -> Self {
        Self { tokens, pos: 0, eof }
    }

    // =========================================================================
    // Cursor
    // =========================================================================

    fn peek(&self) -> Option<&MToken> {
        self.tokens.get(self.pos).map(|t| &t.token)
    }

    fn offset(&self) -> usize {
        self.tokens.get(self.pos).map_or(self.eof, |t| t.span.start)
    }

    fn prev_end(&self) -> usize {
        self.pos
            .checked_sub(1)
            .and_then(|p| self.tokens.get(p))
            .map_or(0, |t| t.span.end)
    }

    fn advance(&mut self) -> Option<MToken> {
        let tok = self.tokens.get(self.pos).map(|t| t.token.clone());
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn eat_punct(&mut self, p: char) -> bool {
        if self.peek().is_some_and(|t| t.is_punct(p)) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn eat_op(&mut self, op: &str) -> bool {
        if self.peek().is_some_and(|t| t.is_op(op)) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn eat_keyword(&mut self, kw: Keyword) -> bool {
        if self.peek().is_some_and(|t| t.is_keyword(kw)) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn error(&self, message: impl Into<String>) -> ConvertError {
        ConvertError::MSyntax {
            offset: self.offset(),
            message: message.into(),
        }
    }

    fn expected(&self, what: &str) -> ConvertError {
        match self.peek() {
            Some(tok) => self.error(format!("expected {}, found {}", what, describe(tok))),
            None => self.error(format!("expected {}, found end of input", what)),
        }
    }

    fn expect_punct(&mut self, p: char) -> ConvertResult<()> {
        if self.eat_punct(p) {
            Ok(())
        } else {
            Err(self.expected(&format!("'{}'", p)))
        }
    }

    fn expect_keyword(&mut self, kw: Keyword) -> ConvertResult<()> {
        if self.eat_keyword(kw) {
            Ok(())
        } else {
            Err(self.expected(&format!("'{}'", kw.as_str())))
        }
    }

    fn expect_end(&self) -> ConvertResult<()> {
        match self.peek() {
            None => Ok(()),
            Some(_) => Err(self.expected("end of input")),
        }
    }

    /// A step or parameter name.
    fn name(&mut self) -> ConvertResult<String> {
        match self.peek() {
            Some(MToken::Ident(name)) | Some(MToken::QuotedIdent(name)) => {
                let name = name.clone();
                self.pos += 1;
                Ok(name)
            }
            _ => Err(self.expected("a name")),
        }
    }

    // =========================================================================
    // Document
    // =========================================================================

    fn document(&mut self) -> ConvertResult<MDocument> {
        // `section Section1; shared Query1 = let ... in x;`
        if self.eat_keyword(Keyword::Section) {
            while self.advance().is_some_and(|t| !t.is_punct(';')) {}
        }
        if self.eat_keyword(Keyword::Shared) {
            self.name()?;
            if !self.eat_op("=") {
                return Err(self.expected("'='"));
            }
        }

        self.expect_keyword(Keyword::Let)?;
        let bindings = self.bindings()?;
        self.expect_keyword(Keyword::In)?;
        let output_offset = self.offset();
        let output = self.name()?;
        self.eat_punct(';');
        self.expect_end()?;

        Ok(MDocument {
            bindings,
            output,
            output_offset,
        })
    }

    fn bindings(&mut self) -> ConvertResult<Vec<Binding>> {
        let mut bindings = Vec::new();
        loop {
            let offset = self.offset();
            let name = self.name()?;
            if !self.eat_op("=") {
                return Err(self.expected("'=' after step name"));
            }
            let start = self.offset();
            let expr = self.expr()?;
            let end = self.prev_end();
            bindings.push(Binding {
                name,
                expr,
                start,
                end,
                offset,
            });
            if !self.eat_punct(',') {
                break;
            }
        }
        Ok(bindings)
    }

    // =========================================================================
    // Expressions
    // =========================================================================

    fn expr(&mut self) -> ConvertResult<MExpr> {
        match self.peek() {
            Some(MToken::Keyword(Keyword::Each)) => {
                self.pos += 1;
                Ok(MExpr::Each(Box::new(self.expr()?)))
            }
            Some(MToken::Keyword(Keyword::If)) => {
                self.pos += 1;
                let condition = self.expr()?;
                self.expect_keyword(Keyword::Then)?;
                let then_branch = self.expr()?;
                self.expect_keyword(Keyword::Else)?;
                let else_branch = self.expr()?;
                Ok(MExpr::If {
                    condition: Box::new(condition),
                    then_branch: Box::new(then_branch),
                    else_branch: Box::new(else_branch),
                })
            }
            Some(MToken::Keyword(Keyword::Let)) => {
                self.pos += 1;
                let bindings = self.bindings()?;
                self.expect_keyword(Keyword::In)?;
                let body = self.expr()?;
                Ok(MExpr::Let {
                    bindings,
                    body: Box::new(body),
                })
            }
            Some(MToken::Keyword(Keyword::Try)) => {
                self.pos += 1;
                let body = self.expr()?;
                let otherwise = if self.eat_keyword(Keyword::Otherwise) {
                    Some(Box::new(self.expr()?))
                } else {
                    None
                };
                Ok(MExpr::Try {
                    body: Box::new(body),
                    otherwise,
                })
            }
            _ => self.binary(0),
        }
    }

    /// Precedence climbing over the binary operator table.
    fn binary(&mut self, min_prec: u8) -> ConvertResult<MExpr> {
        let mut left = self.unary()?;
        while let Some((op, prec)) = self.peek().and_then(binary_op) {
            if prec < min_prec {
                break;
            }
            self.pos += 1;
            let right = self.binary(prec + 1)?;
            left = MExpr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn unary(&mut self) -> ConvertResult<MExpr> {
        if self.eat_keyword(Keyword::Not) {
            return Ok(MExpr::Unary {
                op: MUnaryOp::Not,
                expr: Box::new(self.unary()?),
            });
        }
        if self.eat_op("-") {
            return Ok(MExpr::Unary {
                op: MUnaryOp::Neg,
                expr: Box::new(self.unary()?),
            });
        }
        if self.eat_op("+") {
            return self.unary();
        }
        // `each` and `if` are allowed as operands, e.g. in list items
        if self
            .peek()
            .is_some_and(|t| t.is_keyword(Keyword::Each) || t.is_keyword(Keyword::If))
        {
            return self.expr();
        }
        self.postfix()
    }

    fn postfix(&mut self) -> ConvertResult<MExpr> {
        let mut expr = self.primary()?;
        loop {
            if self.eat_punct('(') {
                let args = self.sequence(')')?;
                expr = MExpr::Call {
                    function: Box::new(expr),
                    args,
                };
            } else if self.peek().is_some_and(|t| t.is_punct('[')) {
                self.pos += 1;
                let field = self.field_name()?;
                self.expect_punct(']')?;
                expr = MExpr::Field {
                    target: Some(Box::new(expr)),
                    field,
                };
            } else if self.eat_punct('{') {
                let key = self.expr()?;
                self.expect_punct('}')?;
                expr = MExpr::Item {
                    target: Box::new(expr),
                    key: Box::new(key),
                };
            } else if self.eat_op("?") {
                // optional access: same meaning for translation
            } else {
                return Ok(expr);
            }
        }
    }

    fn primary(&mut self) -> ConvertResult<MExpr> {
        let Some(tok) = self.peek().cloned() else {
            return Err(self.expected("an expression"));
        };
        match tok {
            MToken::Number(n) => {
                self.pos += 1;
                Ok(MExpr::Number(n))
            }
            MToken::Text(s) => {
                self.pos += 1;
                Ok(MExpr::Text(s))
            }
            MToken::Ident(name) | MToken::QuotedIdent(name) => {
                self.pos += 1;
                Ok(MExpr::Ident(name))
            }
            MToken::Hash(name) => {
                self.pos += 1;
                Ok(MExpr::Intrinsic(name))
            }
            MToken::Keyword(Keyword::True) => {
                self.pos += 1;
                Ok(MExpr::Bool(true))
            }
            MToken::Keyword(Keyword::False) => {
                self.pos += 1;
                Ok(MExpr::Bool(false))
            }
            MToken::Keyword(Keyword::Null) => {
                self.pos += 1;
                Ok(MExpr::Null)
            }
            MToken::Keyword(Keyword::Type) => {
                self.pos += 1;
                self.type_name().map(MExpr::Type)
            }
            MToken::Punct('(') => self.paren_or_lambda(),
            MToken::Punct('{') => {
                self.pos += 1;
                self.sequence('}').map(MExpr::List)
            }
            MToken::Punct('[') => {
                self.pos += 1;
                self.record_or_field()
            }
            other => Err(self.error(format!("unexpected {}", describe(&other)))),
        }
    }

    /// Comma-separated expressions up to `close`.
    fn sequence(&mut self, close: char) -> ConvertResult<Vec<MExpr>> {
        let mut items = Vec::new();
        if self.eat_punct(close) {
            return Ok(items);
        }
        loop {
            items.push(self.expr()?);
            if self.eat_punct(',') {
                continue;
            }
            self.expect_punct(close)?;
            return Ok(items);
        }
    }

    /// `type text`, `type nullable number`, `type table`.
    fn type_name(&mut self) -> ConvertResult<String> {
        let name = match self.peek() {
            Some(MToken::Ident(name)) if name == "nullable" => {
                self.pos += 1;
                return self.type_name();
            }
            Some(MToken::Ident(name)) => name.clone(),
            Some(MToken::Keyword(Keyword::Null)) => "null".into(),
            _ => return Err(self.expected("a type name")),
        };
        self.pos += 1;
        // `type table [...]` and `type [...]` carry a row shape we do not use
        if self.peek().is_some_and(|t| t.is_punct('[')) {
            self.pos += 1;
            self.skip_group('[', ']')?;
        }
        Ok(name)
    }

    fn skip_group(&mut self, open: char, close: char) -> ConvertResult<()> {
        let mut depth = 1usize;
        while depth > 0 {
            match self.advance() {
                Some(t) if t.is_punct(open) => depth += 1,
                Some(t) if t.is_punct(close) => depth -= 1,
                Some(_) => {}
                None => return Err(self.expected(&format!("'{}'", close))),
            }
        }
        Ok(())
    }

    /// A field name inside `[...]`: generalized identifiers may contain
    /// spaces, e.g. `[Order Date]`.
    fn field_name(&mut self) -> ConvertResult<String> {
        if let Some(MToken::QuotedIdent(name)) = self.peek() {
            let name = name.clone();
            self.pos += 1;
            return Ok(name);
        }
        let mut parts = Vec::new();
        while let Some(tok) = self.peek() {
            let part = match tok {
                MToken::Ident(s) => s.clone(),
                MToken::Keyword(kw) => kw.as_str().to_string(),
                MToken::Number(n) => n.to_string(),
                _ => break,
            };
            parts.push(part);
            self.pos += 1;
        }
        if parts.is_empty() {
            return Err(self.expected("a field name"));
        }
        Ok(parts.join(" "))
    }

    fn record_or_field(&mut self) -> ConvertResult<MExpr> {
        if self.eat_punct(']') {
            return Ok(MExpr::Record(Vec::new()));
        }
        let first = self.field_name()?;
        if self.eat_punct(']') {
            return Ok(MExpr::Field {
                target: None,
                field: first,
            });
        }

        let mut fields = Vec::new();
        let mut name = first;
        loop {
            if !self.eat_op("=") {
                return Err(self.expected("'=' in record"));
            }
            fields.push((name, self.expr()?));
            if self.eat_punct(']') {
                return Ok(MExpr::Record(fields));
            }
            self.expect_punct(',')?;
            name = self.field_name()?;
        }
    }

    fn paren_or_lambda(&mut self) -> ConvertResult<MExpr> {
        let start = self.pos;
        self.pos += 1;
        if let Some(params) = self.lambda_head() {
            let body = self.expr()?;
            return Ok(MExpr::Lambda {
                params,
                body: Box::new(body),
            });
        }
        self.pos = start + 1;
        let inner = self.expr()?;
        self.expect_punct(')')?;
        Ok(inner)
    }

    /// `x, optional y as text) as number =>`, after the opening paren.
    /// Leaves the cursor unspecified on failure.
    fn lambda_head(&mut self) -> Option<Vec<String>> {
        let mut params = Vec::new();
        if !self.eat_punct(')') {
            loop {
                if matches!(self.peek(), Some(MToken::Ident(s)) if s == "optional") {
                    self.pos += 1;
                }
                params.push(self.name().ok()?);
                if self.eat_keyword(Keyword::As) {
                    self.type_name_bare()?;
                }
                if self.eat_punct(',') {
                    continue;
                }
                if self.eat_punct(')') {
                    break;
                }
                return None;
            }
        }
        if self.eat_keyword(Keyword::As) {
            self.type_name_bare()?;
        }
        self.eat_op("=>").then_some(params)
    }

    /// Parameter annotations: `as text`, `as nullable number`.
    fn type_name_bare(&mut self) -> Option<()> {
        match self.advance()? {
            MToken::Ident(name) if name == "nullable" => self.type_name_bare(),
            MToken::Ident(_) | MToken::Keyword(Keyword::Type) | MToken::Keyword(Keyword::Null) => {
                Some(())
            }
            _ => None,
        }
    }
}

fn binary_op(tok: &MToken) -> Option<(MBinaryOp, u8)> {
    let op = match tok {
        MToken::Keyword(Keyword::Or) => (MBinaryOp::Or, 1),
        MToken::Keyword(Keyword::And) => (MBinaryOp::And, 2),
        MToken::Op(o) => match o.as_str() {
            "=" => (MBinaryOp::Eq, 3),
            "<>" => (MBinaryOp::Ne, 3),
            "<" => (MBinaryOp::Lt, 4),
            "<=" => (MBinaryOp::Le, 4),
            ">" => (MBinaryOp::Gt, 4),
            ">=" => (MBinaryOp::Ge, 4),
            "+" => (MBinaryOp::Add, 5),
            "-" => (MBinaryOp::Sub, 5),
            "&" => (MBinaryOp::Concat, 5),
            "*" => (MBinaryOp::Mul, 6),
            "/" => (MBinaryOp::Div, 6),
            _ => return None,
        },
        _ => return None,
    };
    Some(op)
}

fn describe(tok: &MToken) -> String {
    match tok {
        MToken::Ident(s) => format!("name '{}'", s),
        MToken::QuotedIdent(s) => format!("name #\"{}\"", s),
        MToken::Hash(s) => format!("'{}'", s),
        MToken::Text(_) => "text literal".into(),
        MToken::Number(n) => format!("number {}", n),
        MToken::Keyword(kw) => format!("keyword '{}'", kw.as_str()),
        MToken::Op(o) => format!("'{}'", o),
        MToken::Punct(p) => format!("'{}'", p),
    }
}
