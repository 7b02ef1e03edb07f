//! Function-call rewriting.
//!
//! A call is a name token followed by `(`. The name is looked up in the
//! function table; the arguments are split on top-level commas and the
//! call is rebuilt from the original argument tokens plus generated glue.
//! Arguments are left unprotected so the rest of the pass rewrites calls
//! nested inside them.

use super::lexer::{
    matching_paren, next_significant, prev_significant, render, split_args, Token, TokenKind,
};
use super::rules::{glue, Rewrite, RuleContext};
use crate::mapping::{lookup_function, map_type_str, DateUnit, FunctionTransform};
use crate::notes::{Note, NoteCode};

type Arg = (usize, usize);

pub(crate) fn apply(tokens: &[Token], at: usize, ctx: &RuleContext<'_>) -> Option<Rewrite> {
    let tok = &tokens[at];
    if !matches!(tok.kind, TokenKind::Identifier | TokenKind::Keyword) {
        return None;
    }
    let open = next_significant(tokens, at + 1)?;
    if !tokens[open].is_punct("(") {
        return None;
    }
    // schema.fn(...) and method-style calls are user functions
    if prev_significant(tokens, at).is_some_and(|p| tokens[p].is_punct(".")) {
        return None;
    }
    let close = matching_paren(tokens, open)?;

    if tok.is_any_word(&["CAST", "TRY_CAST"]) {
        return current_date_cast(tokens, at, open, close, ctx);
    }

    let mapping = lookup_function(&tok.text)?;
    let name = tok.text.to_ascii_uppercase();
    let args = split_args(tokens, open, close);
    if !mapping.arity.accepts(args.len()) {
        return Some(Rewrite::notes_only(
            at,
            vec![Note::unsupported(format!(
                "{} expects {} argument(s), found {}; call left unchanged",
                name,
                mapping.arity.describe(),
                args.len()
            ))
            .at(tok.offset)],
        ));
    }

    let call = Call {
        tokens,
        at,
        close,
        args,
        offset: tok.offset,
        name,
    };
    match mapping.transform {
        FunctionTransform::Keep => None,
        FunctionTransform::Rename(target) => {
            Some(Rewrite::replace(at, at + 1, glue(target, tok.offset)))
        }
        FunctionTransform::Constant(text) => Some(call.replace_with(glue(text, tok.offset))),
        FunctionTransform::DateAdd => call.date_add(ctx),
        FunctionTransform::DateDiff => call.date_diff(),
        FunctionTransform::DatePart => call.date_part(),
        FunctionTransform::Convert { try_cast } => Some(call.convert(try_cast)),
        FunctionTransform::Stuff => Some(call.stuff()),
    }
}

/// `CAST(GETDATE() AS DATE)` → `CURRENT_DATE()`
fn current_date_cast(
    tokens: &[Token],
    at: usize,
    open: usize,
    close: usize,
    ctx: &RuleContext<'_>,
) -> Option<Rewrite> {
    let inner: Vec<String> = tokens[open + 1..close]
        .iter()
        .filter(|t| !t.is_trivia())
        .map(|t| t.text.to_ascii_uppercase())
        .collect();
    let now = ["GETDATE", "SYSDATETIME", "CURRENT_TIMESTAMP"];
    match inner.as_slice() {
        [f, lp, rp, kw, ty] if now.contains(&f.as_str()) && lp == "(" && rp == ")" && kw == "AS" && ty == "DATE" => {
            Some(Rewrite::replace(
                at,
                close + 1,
                glue(ctx.dialect.current_date(), tokens[at].offset),
            ))
        }
        _ => None,
    }
}

struct Call<'t> {
    tokens: &'t [Token],
    at: usize,
    close: usize,
    args: Vec<Arg>,
    offset: usize,
    name: String,
}

impl<'t> Call<'t> {
    fn replace_with(&self, replacement: Vec<Token>) -> Rewrite {
        Rewrite::replace(self.at, self.close + 1, replacement)
    }

    fn arg(&self, i: usize) -> Vec<Token> {
        let (start, end) = self.args[i];
        self.tokens[start..end].to_vec()
    }

    /// Argument tokens, parenthesized when they form a compound expression.
    fn operand(&self, i: usize) -> Vec<Token> {
        let (start, end) = self.args[i];
        let compound = self.tokens[start..end]
            .iter()
            .any(|t| t.kind == TokenKind::Operator || t.is_word("AND") || t.is_word("OR"));
        if compound && !is_parenthesized(self.tokens, start, end) {
            let mut out = glue("(", self.offset);
            out.extend(self.arg(i));
            out.extend(glue(")", self.offset));
            out
        } else {
            self.arg(i)
        }
    }

    fn glue(&self, text: &str) -> Vec<Token> {
        glue(text, self.offset)
    }

    /// The datepart argument, which T-SQL writes as a bare word.
    fn unit(&self) -> Result<DateUnit, Rewrite> {
        let (start, end) = self.args[0];
        let word = match &self.tokens[start..end] {
            [tok] => tok.value(),
            other => render(other),
        };
        DateUnit::parse(&word).ok_or_else(|| {
            Rewrite::notes_only(
                self.at,
                vec![Note::unsupported(format!(
                    "{} with datepart '{}' is not supported; call left unchanged",
                    self.name, word
                ))
                .at(self.offset)],
            )
        })
    }

    /// Integer literal argument, with optional sign.
    fn literal_int(&self, i: usize) -> Option<i64> {
        let (start, end) = self.args[i];
        let sig: Vec<&Token> = self.tokens[start..end].iter().filter(|t| !t.is_trivia()).collect();
        match sig.as_slice() {
            [n] if n.kind == TokenKind::Number => n.text.parse().ok(),
            [sign, n] if sign.kind == TokenKind::Operator && n.kind == TokenKind::Number => {
                let value: i64 = n.text.parse().ok()?;
                match sign.text.as_str() {
                    "-" => Some(-value),
                    "+" => Some(value),
                    _ => None,
                }
            }
            _ => None,
        }
    }

    /// Whether the call sits next to an arithmetic operator.
    fn in_arithmetic(&self) -> bool {
        let arithmetic = |i: usize| {
            let t = &self.tokens[i];
            t.kind == TokenKind::Operator && matches!(t.text.as_str(), "+" | "-" | "*" | "/" | "%")
        };
        prev_significant(self.tokens, self.at).is_some_and(arithmetic)
            || next_significant(self.tokens, self.close + 1).is_some_and(arithmetic)
    }

    fn date_add(&self, ctx: &RuleContext<'_>) -> Option<Rewrite> {
        let unit = match self.unit() {
            Ok(unit) => unit,
            Err(rewrite) => return Some(rewrite),
        };
        let mut out = Vec::new();
        match self.literal_int(1) {
            Some(n) => {
                let (keyword, multiplier) = unit.interval();
                let amount = n.saturating_mul(multiplier);
                let op = if amount < 0 { "-" } else { "+" };
                let interval = ctx
                    .dialect
                    .format_interval(&amount.unsigned_abs().to_string(), keyword);
                let wrap = self.in_arithmetic();
                if wrap {
                    out.extend(self.glue("("));
                }
                out.extend(self.operand(2));
                out.extend(self.glue(&format!(" {} {}", op, interval)));
                if wrap {
                    out.extend(self.glue(")"));
                }
            }
            None => {
                out.extend(self.glue(&format!("TIMESTAMPADD({}, ", unit.timestamp_unit())));
                out.extend(self.arg(1));
                out.extend(self.glue(", "));
                out.extend(self.arg(2));
                out.extend(self.glue(")"));
            }
        }
        Some(self.replace_with(out))
    }

    fn date_diff(&self) -> Option<Rewrite> {
        let unit = match self.unit() {
            Ok(unit) => unit,
            Err(rewrite) => return Some(rewrite),
        };
        let mut out = Vec::new();
        if unit == DateUnit::Day {
            out.extend(self.glue("DATEDIFF("));
            out.extend(self.arg(2));
            out.extend(self.glue(", "));
            out.extend(self.arg(1));
        } else {
            out.extend(self.glue(&format!("TIMESTAMPDIFF({}, ", unit.timestamp_unit())));
            out.extend(self.arg(1));
            out.extend(self.glue(", "));
            out.extend(self.arg(2));
        }
        out.extend(self.glue(")"));
        Some(self.replace_with(out))
    }

    fn date_part(&self) -> Option<Rewrite> {
        let unit = match self.unit() {
            Ok(unit) => unit,
            Err(rewrite) => return Some(rewrite),
        };
        let mut out = self.glue(&format!("EXTRACT({} FROM ", unit.extract_field()));
        out.extend(self.arg(1));
        out.extend(self.glue(")"));
        Some(self.replace_with(out))
    }

    fn convert(&self, try_cast: bool) -> Rewrite {
        let (start, end) = self.args[0];
        let source_type = render(&self.tokens[start..end]);
        let mut notes = Vec::new();
        let target_type = map_type_str(&source_type).unwrap_or_else(|| {
            notes.push(
                Note::warning(
                    NoteCode::UnmappedType,
                    format!("type {} has no Databricks mapping; left unchanged", source_type),
                )
                .at(self.offset),
            );
            source_type.clone()
        });
        if let Some(&(s, e)) = self.args.get(2) {
            notes.push(
                Note::warning(
                    NoteCode::StyleDropped,
                    format!(
                        "{} style {} dropped; CAST has no style argument",
                        self.name,
                        render(&self.tokens[s..e])
                    ),
                )
                .at(self.offset),
            );
        }

        let mut out = self.glue(if try_cast { "TRY_CAST(" } else { "CAST(" });
        out.extend(self.arg(1));
        out.extend(self.glue(&format!(" AS {})", target_type)));
        let mut rewrite = self.replace_with(out);
        rewrite.notes = notes;
        rewrite
    }

    /// `STUFF(s, start, len, r)` → `OVERLAY(s PLACING r FROM start FOR len)`
    fn stuff(&self) -> Rewrite {
        let mut out = self.glue("OVERLAY(");
        out.extend(self.arg(0));
        out.extend(self.glue(" PLACING "));
        out.extend(self.arg(3));
        out.extend(self.glue(" FROM "));
        out.extend(self.arg(1));
        out.extend(self.glue(" FOR "));
        out.extend(self.arg(2));
        out.extend(self.glue(")"));
        self.replace_with(out)
    }
}

fn is_parenthesized(tokens: &[Token], start: usize, end: usize) -> bool {
    end > start
        && tokens[start].is_punct("(")
        && matching_paren(tokens, start) == Some(end - 1)
}
