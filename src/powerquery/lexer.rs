//! Lexer for Power Query M.
//!
//! Unlike the T-SQL lexer this one is not lossless: whitespace and comments
//! are dropped, and the parser works from byte spans.

use std::ops::Range;

use chumsky::prelude::*;

use crate::error::{ConvertError, ConvertResult};

/// Reserved words of the M language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Keyword {
    Let,
    In,
    Each,
    If,
    Then,
    Else,
    And,
    Or,
    Not,
    True,
    False,
    Null,
    Type,
    As,
    Is,
    Try,
    Otherwise,
    Error,
    Meta,
    Section,
    Shared,
}

impl Keyword {
    fn from_word(word: &str) -> Option<Self> {
        let kw = match word {
            "let" => Keyword::Let,
            "in" => Keyword::In,
            "each" => Keyword::Each,
            "if" => Keyword::If,
            "then" => Keyword::Then,
            "else" => Keyword::Else,
            "and" => Keyword::And,
            "or" => Keyword::Or,
            "not" => Keyword::Not,
            "true" => Keyword::True,
            "false" => Keyword::False,
            "null" => Keyword::Null,
            "type" => Keyword::Type,
            "as" => Keyword::As,
            "is" => Keyword::Is,
            "try" => Keyword::Try,
            "otherwise" => Keyword::Otherwise,
            "error" => Keyword::Error,
            "meta" => Keyword::Meta,
            "section" => Keyword::Section,
            "shared" => Keyword::Shared,
            _ => return None,
        };
        Some(kw)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Keyword::Let => "let",
            Keyword::In => "in",
            Keyword::Each => "each",
            Keyword::If => "if",
            Keyword::Then => "then",
            Keyword::Else => "else",
            Keyword::And => "and",
            Keyword::Or => "or",
            Keyword::Not => "not",
            Keyword::True => "true",
            Keyword::False => "false",
            Keyword::Null => "null",
            Keyword::Type => "type",
            Keyword::As => "as",
            Keyword::Is => "is",
            Keyword::Try => "try",
            Keyword::Otherwise => "otherwise",
            Keyword::Error => "error",
            Keyword::Meta => "meta",
            Keyword::Section => "section",
            Keyword::Shared => "shared",
        }
    }
}

/// A token of M source.
#[derive(Debug, Clone, PartialEq)]
pub enum MToken {
    /// Plain or dotted name: `Source`, `Table.SelectRows`, `Int64.Type`.
    Ident(String),
    /// `#"Changed Type"`, unescaped.
    QuotedIdent(String),
    /// Intrinsics such as `#date` and `#table`.
    Hash(String),
    /// `"text"`, unescaped.
    Text(String),
    Number(f64),
    Keyword(Keyword),
    /// `= <> < > <= >= + - * / & => ? ..`
    Op(String),
    /// `( ) { } [ ] , ;`
    Punct(char),
}

impl MToken {
    pub fn is_op(&self, op: &str) -> bool {
        matches!(self, MToken::Op(o) if o == op)
    }

    pub fn is_punct(&self, p: char) -> bool {
        matches!(self, MToken::Punct(c) if *c == p)
    }

    pub fn is_keyword(&self, kw: Keyword) -> bool {
        matches!(self, MToken::Keyword(k) if *k == kw)
    }
}

/// A token and its byte span.
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: MToken,
    pub span: Range<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RawKind {
    Trivia,
    Text,
    QuotedIdent,
    Unterminated,
    Hash,
    Number,
    Word,
    Operator,
    Punct,
}

fn quoted<'src>() -> impl Parser<'src, &'src str, bool, extra::Err<Rich<'src, char>>> + Clone {
    just('"')
        .then(choice((just("\"\"").ignored(), none_of('"').ignored())).repeated())
        .then(just('"').or_not())
        .map(|(_, close)| close.is_some())
}

fn lexer<'src>(
) -> impl Parser<'src, &'src str, Vec<(RawKind, SimpleSpan)>, extra::Err<Rich<'src, char>>> {
    let whitespace = any()
        .filter(|c: &char| c.is_whitespace())
        .repeated()
        .at_least(1)
        .to(RawKind::Trivia);

    let line_comment = just("//")
        .then(any().and_is(just('\n').not()).repeated())
        .to(RawKind::Trivia);

    let block_comment = just("/*")
        .then(any().and_is(just("*/").not()).repeated())
        .then(just("*/").or_not())
        .to(RawKind::Trivia);

    let string = quoted().map(|closed| if closed { RawKind::Text } else { RawKind::Unterminated });
    let quoted_ident = just('#')
        .ignore_then(quoted())
        .map(|closed| if closed { RawKind::QuotedIdent } else { RawKind::Unterminated });

    let name_part = any()
        .filter(|c: &char| c.is_alphabetic() || *c == '_')
        .then(any().filter(|c: &char| c.is_alphanumeric() || *c == '_').repeated());

    let hash = just('#').then(name_part.clone()).to(RawKind::Hash);

    let number = choice((
        just("0x")
            .then(any().filter(|c: &char| c.is_ascii_hexdigit()).repeated().at_least(1))
            .ignored(),
        text::digits(10)
            .then(just('.').then(text::digits(10)).or_not())
            .then(
                one_of("eE")
                    .then(one_of("+-").or_not())
                    .then(text::digits(10))
                    .or_not(),
            )
            .ignored(),
    ))
    .to(RawKind::Number);

    // Dotted names stay one token: `Table.SelectRows`
    let word = name_part
        .clone()
        .then(just('.').then(name_part).repeated())
        .to(RawKind::Word);

    let operator = choice((
        just("=>"),
        just("<>"),
        just("<="),
        just(">="),
        just("..."),
        just(".."),
        just("??"),
    ))
    .ignored()
    .or(one_of("=<>+-*/&?!@").ignored())
    .to(RawKind::Operator);

    let punct = one_of("(){}[],;").to(RawKind::Punct);

    choice((
        whitespace,
        line_comment,
        block_comment,
        quoted_ident,
        string,
        hash,
        number,
        word,
        operator,
        punct,
    ))
    .map_with(|kind, e| (kind, e.span()))
    .repeated()
    .collect::<Vec<_>>()
    .then_ignore(end())
}

/// Tokenize M source, dropping whitespace and comments.
pub fn tokenize(source: &str) -> ConvertResult<Vec<Spanned>> {
    let (raw, errs) = lexer().parse(source).into_output_errors();
    let raw = match raw {
        Some(raw) if errs.is_empty() => raw,
        _ => {
            let (offset, message) = errs
                .first()
                .map(|e| (e.span().start, format!("unexpected character: {}", e)))
                .unwrap_or((0, "unreadable input".to_string()));
            return Err(ConvertError::MSyntax { offset, message });
        }
    };

    let mut tokens = Vec::with_capacity(raw.len());
    for (kind, span) in raw {
        let text = &source[span.start..span.end];
        let token = match kind {
            RawKind::Trivia => continue,
            RawKind::Unterminated => {
                return Err(ConvertError::MalformedLiteral {
                    offset: span.start,
                    reason: "unterminated text literal".into(),
                })
            }
            RawKind::Text => MToken::Text(unescape(&text[1..text.len() - 1])),
            RawKind::QuotedIdent => MToken::QuotedIdent(unescape(&text[2..text.len() - 1])),
            RawKind::Hash => MToken::Hash(text.to_string()),
            RawKind::Number => MToken::Number(parse_number(text).ok_or_else(|| {
                ConvertError::MalformedLiteral {
                    offset: span.start,
                    reason: format!("invalid number {}", text),
                }
            })?),
            RawKind::Word => match Keyword::from_word(text) {
                Some(kw) => MToken::Keyword(kw),
                None => MToken::Ident(text.to_string()),
            },
            RawKind::Operator => MToken::Op(text.to_string()),
            RawKind::Punct => MToken::Punct(text.chars().next().unwrap_or(',')),
        };
        tokens.push(Spanned {
            token,
            span: span.start..span.end,
        });
    }
    Ok(tokens)
}

fn parse_number(text: &str) -> Option<f64> {
    match text.strip_prefix("0x") {
        Some(hex) => i64::from_str_radix(hex, 16).ok().map(|n| n as f64),
        None => text.parse().ok(),
    }
}

/// Resolve `""` and `#(...)` escapes.
fn unescape(body: &str) -> String {
    let body = body.replace("\"\"", "\"");
    let mut out = String::with_capacity(body.len());
    let mut rest = body.as_str();
    while let Some(start) = rest.find("#(") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find(')').and_then(|end| escape_sequence(&after[..end]).map(|s| (end, s))) {
            Some((end, resolved)) => {
                out.push_str(&resolved);
                rest = &after[end + 1..];
            }
            None => {
                out.push_str("#(");
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

fn escape_sequence(list: &str) -> Option<String> {
    list.split(',')
        .map(|item| match item.trim() {
            "lf" => Some('\n'),
            "cr" => Some('\r'),
            "tab" => Some('\t'),
            "#" => Some('#'),
            hex if matches!(hex.len(), 4 | 8) => {
                u32::from_str_radix(hex, 16).ok().and_then(char::from_u32)
            }
            _ => None,
        })
        .collect()
}
