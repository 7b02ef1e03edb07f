//! Lossless lexer for T-SQL.
//!
//! Every byte of the input lands in exactly one token, whitespace and
//! comments included, so concatenating token texts reproduces the source.
//! Bracketed identifiers, quoted identifiers and string literals are single
//! tokens; rewrite rules therefore never match inside them.
//!
//! The lexer is total. The only failures are an unterminated string or
//! quoted identifier ([`ConvertError::MalformedLiteral`]) and an unterminated
//! `[...]` ([`ConvertError::UnterminatedBracket`]).

use std::collections::HashSet;
use std::sync::LazyLock;

use chumsky::prelude::*;

use crate::error::{ConvertError, ConvertResult};
use crate::sql::dialect::helpers::is_reserved_databricks;

/// Token categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Identifier,
    /// `[name]`, with `]]` escapes.
    BracketedIdentifier,
    /// `"name"` or `` `name` ``.
    QuotedIdentifier,
    /// `'text'` or `N'text'`, with `''` escapes.
    QuotedString,
    Number,
    Operator,
    /// `( ) , . ;`
    Punctuation,
    Keyword,
    Comment,
    Whitespace,
}

/// A lexical token with its byte offset in the original source.
///
/// Tokens created by rewrite rules carry the offset of the text they
/// replaced and are marked `protected`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub offset: usize,
    pub protected: bool,
}

impl Token {
    pub fn new(kind: TokenKind, text: impl Into<String>, offset: usize) -> Self {
        Self {
            kind,
            text: text.into(),
            offset,
            protected: false,
        }
    }

    /// A rule-generated token. Later stages never re-examine it.
    pub fn generated(kind: TokenKind, text: impl Into<String>, offset: usize) -> Self {
        Self {
            protected: true,
            ..Self::new(kind, text, offset)
        }
    }

    /// Unescaped content: brackets and quotes stripped, escapes resolved.
    pub fn value(&self) -> String {
        match self.kind {
            TokenKind::BracketedIdentifier => unwrap_delimited(&self.text, ']'),
            TokenKind::QuotedIdentifier => {
                let close = if self.text.starts_with('`') { '`' } else { '"' };
                unwrap_delimited(&self.text, close)
            }
            TokenKind::QuotedString => {
                let body = self.text.trim_start_matches(['N', 'n']);
                unwrap_delimited(body, '\'')
            }
            _ => self.text.clone(),
        }
    }

    /// Case-insensitive keyword check. Matches identifiers too, since many
    /// T-SQL words are only contextually reserved.
    pub fn is_word(&self, word: &str) -> bool {
        matches!(self.kind, TokenKind::Keyword | TokenKind::Identifier)
            && self.text.eq_ignore_ascii_case(word)
    }

    pub fn is_any_word(&self, words: &[&str]) -> bool {
        words.iter().any(|w| self.is_word(w))
    }

    pub fn is_punct(&self, p: &str) -> bool {
        self.kind == TokenKind::Punctuation && self.text == p
    }

    pub fn is_trivia(&self) -> bool {
        matches!(self.kind, TokenKind::Whitespace | TokenKind::Comment)
    }

    /// Identifier-like token: plain, bracketed or quoted.
    pub fn is_name(&self) -> bool {
        matches!(
            self.kind,
            TokenKind::Identifier | TokenKind::BracketedIdentifier | TokenKind::QuotedIdentifier
        )
    }
}

fn unwrap_delimited(text: &str, close: char) -> String {
    let mut chars = text.chars();
    chars.next();
    let inner = chars.as_str();
    let inner = inner.strip_suffix(close).unwrap_or(inner);
    let doubled: String = [close, close].iter().collect();
    inner.replace(&doubled, &close.to_string())
}

// =============================================================================
// Keywords
// =============================================================================

const TSQL_KEYWORDS: &[&str] = &[
    "ADD", "ALL", "ALTER", "AND", "ANY", "APPLY", "AS", "ASC", "BEGIN", "BETWEEN", "BY", "CASCADE",
    "CASE", "CAST", "CHECK", "CLUSTERED", "COLUMN", "COMMIT", "CONSTRAINT", "CONVERT", "CREATE",
    "CROSS", "DECLARE", "DEFAULT", "DELETE", "DESC", "DISTINCT", "DROP", "ELSE", "END", "EXCEPT",
    "EXEC", "EXECUTE", "EXISTS", "FETCH", "FOREIGN", "FROM", "FULL", "FUNCTION", "GO", "GROUP",
    "HAVING", "IDENTITY", "IF", "IN", "INDEX", "INNER", "INSERT", "INTERSECT", "INTO", "IS",
    "JOIN", "KEY", "LEFT", "LIKE", "MATCHED", "MERGE", "NEXT", "NOCHECK", "NONCLUSTERED", "NOT",
    "NULL", "OFFSET", "ON", "ONLY", "OR", "ORDER", "OUTER", "OUTPUT", "OVER", "PARTITION",
    "PERCENT", "PIVOT", "PRIMARY", "PROC", "PROCEDURE", "REFERENCES", "RETURN", "RETURNS",
    "RIGHT", "ROLLBACK", "ROWS", "SELECT", "SET", "TABLE", "TEXTIMAGE_ON", "THEN", "TIES", "TOP",
    "TRAN", "TRANSACTION", "TRUNCATE", "TRY_CAST", "TRY_CONVERT", "UNION", "UNIQUE", "UNPIVOT",
    "UPDATE", "USE", "USING", "VALUES", "VIEW", "WHEN", "WHERE", "WITH",
];

static KEYWORDS: LazyLock<HashSet<&'static str>> =
    LazyLock::new(|| TSQL_KEYWORDS.iter().copied().collect());

/// Keywords of either dialect. Databricks-reserved words are included so
/// that already-converted text is never mistaken for identifiers.
pub fn is_keyword(word: &str) -> bool {
    KEYWORDS.contains(word.to_ascii_uppercase().as_str()) || is_reserved_databricks(word)
}

// =============================================================================
// Lexer
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RawKind {
    Whitespace,
    Comment,
    String,
    UnterminatedString,
    Bracketed,
    UnterminatedBracket,
    Quoted,
    UnterminatedQuoted,
    Number,
    Word,
    Operator,
    Punctuation,
}

/// `open ... close` where a doubled `close` is an escape.
fn delimited<'src>(
    open: char,
    close: char,
    terminated: RawKind,
    unterminated: RawKind,
) -> impl Parser<'src, &'src str, RawKind, extra::Err<Rich<'src, char>>> + Clone {
    just(open)
        .then(
            choice((
                just(close).then(just(close)).ignored(),
                none_of(close).ignored(),
            ))
            .repeated(),
        )
        .then(just(close).or_not())
        .map(move |(_, end)| if end.is_some() { terminated } else { unterminated })
}

fn lexer<'src>(
) -> impl Parser<'src, &'src str, Vec<(RawKind, SimpleSpan)>, extra::Err<Rich<'src, char>>> {
    let whitespace = any()
        .filter(|c: &char| c.is_whitespace())
        .repeated()
        .at_least(1)
        .to(RawKind::Whitespace);

    // -- ... until newline
    let line_comment = just("--")
        .then(any().and_is(just('\n').not()).repeated())
        .to(RawKind::Comment);

    // /* ... */ with nesting, running to end of input if never closed
    let block_comment = recursive(|nested| {
        just("/*")
            .then(
                choice((
                    nested,
                    any()
                        .and_is(just("*/").not())
                        .and_is(just("/*").not())
                        .ignored(),
                ))
                .repeated(),
            )
            .then(just("*/").or_not())
            .ignored()
    })
    .to(RawKind::Comment);

    let string = one_of("Nn").or_not().ignore_then(delimited(
        '\'',
        '\'',
        RawKind::String,
        RawKind::UnterminatedString,
    ));

    let bracketed = delimited('[', ']', RawKind::Bracketed, RawKind::UnterminatedBracket);
    let double_quoted = delimited('"', '"', RawKind::Quoted, RawKind::UnterminatedQuoted);
    let backtick_quoted = delimited('`', '`', RawKind::Quoted, RawKind::UnterminatedQuoted);

    let hex = just("0x")
        .or(just("0X"))
        .then(any().filter(|c: &char| c.is_ascii_hexdigit()).repeated())
        .to(RawKind::Number);

    let decimal = text::digits(10)
        .then(just('.').then(text::digits(10).or_not()).or_not())
        .then(
            one_of("eE")
                .then(one_of("+-").or_not())
                .then(text::digits(10))
                .or_not(),
        )
        .to(RawKind::Number);

    // Identifiers, keywords, @variables, #temp tables
    let word = any()
        .filter(|c: &char| c.is_alphabetic() || matches!(c, '_' | '@' | '#'))
        .then(
            any()
                .filter(|c: &char| c.is_alphanumeric() || matches!(c, '_' | '@' | '#' | '$'))
                .repeated(),
        )
        .to(RawKind::Word);

    // Multi-char operators first
    let operator = choice((
        just("<>"),
        just("!="),
        just(">="),
        just("<="),
        just("!<"),
        just("!>"),
        just("||"),
        just("::"),
        just("=>"),
        just("+="),
        just("-="),
        just("*="),
        just("/="),
    ))
    .ignored()
    .or(one_of("=<>+-*/%&|^~!:").ignored())
    .to(RawKind::Operator);

    let punctuation = one_of("(),.;").to(RawKind::Punctuation);

    // Anything else stands alone so lexing stays total
    let other = any().to(RawKind::Operator);

    choice((
        whitespace,
        line_comment,
        block_comment,
        string,
        bracketed,
        double_quoted,
        backtick_quoted,
        hex,
        decimal,
        word,
        operator,
        punctuation,
        other,
    ))
    .map_with(|kind, e| (kind, e.span()))
    .repeated()
    .collect::<Vec<_>>()
    .then_ignore(end())
}

/// Tokenize T-SQL source text.
pub fn tokenize(source: &str) -> ConvertResult<Vec<Token>> {
    let (raw, errs) = lexer().parse(source).into_output_errors();
    let raw = match raw {
        Some(raw) if errs.is_empty() => raw,
        _ => {
            let (offset, reason) = errs
                .first()
                .map(|e| (e.span().start, e.to_string()))
                .unwrap_or((0, "unreadable input".to_string()));
            return Err(ConvertError::MalformedLiteral { offset, reason });
        }
    };

    let mut tokens = Vec::with_capacity(raw.len());
    for (kind, span) in raw {
        let text = &source[span.start..span.end];
        let offset = span.start;
        let kind = match kind {
            RawKind::UnterminatedString => {
                return Err(ConvertError::MalformedLiteral {
                    offset,
                    reason: "unterminated string literal".into(),
                })
            }
            RawKind::UnterminatedQuoted => {
                return Err(ConvertError::MalformedLiteral {
                    offset,
                    reason: "unterminated quoted identifier".into(),
                })
            }
            RawKind::UnterminatedBracket => return Err(ConvertError::UnterminatedBracket { offset }),
            RawKind::Whitespace => TokenKind::Whitespace,
            RawKind::Comment => TokenKind::Comment,
            RawKind::String => TokenKind::QuotedString,
            RawKind::Bracketed => TokenKind::BracketedIdentifier,
            RawKind::Quoted => TokenKind::QuotedIdentifier,
            RawKind::Number => TokenKind::Number,
            RawKind::Word if is_keyword(text) => TokenKind::Keyword,
            RawKind::Word => TokenKind::Identifier,
            RawKind::Operator => TokenKind::Operator,
            RawKind::Punctuation => TokenKind::Punctuation,
        };
        tokens.push(Token::new(kind, text, offset));
    }
    Ok(tokens)
}

/// Concatenate token texts.
pub fn render(tokens: &[Token]) -> String {
    tokens.iter().map(|t| t.text.as_str()).collect()
}

// =============================================================================
// Cursor helpers
// =============================================================================

/// Index of the first non-trivia token at or after `from`.
pub fn next_significant(tokens: &[Token], from: usize) -> Option<usize> {
    (from..tokens.len()).find(|&i| !tokens[i].is_trivia())
}

/// Index of the last non-trivia token strictly before `before`.
pub fn prev_significant(tokens: &[Token], before: usize) -> Option<usize> {
    (0..before.min(tokens.len())).rev().find(|&i| !tokens[i].is_trivia())
}

/// Index of the `)` matching the `(` at `open`.
pub fn matching_paren(tokens: &[Token], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (i, tok) in tokens.iter().enumerate().skip(open) {
        if tok.is_punct("(") {
            depth += 1;
        } else if tok.is_punct(")") {
            depth = depth.checked_sub(1)?;
            if depth == 0 {
                return Some(i);
            }
        }
    }
    None
}

/// Index of the `(` that encloses `at`, if any.
pub fn enclosing_paren(tokens: &[Token], at: usize) -> Option<usize> {
    let mut depth = 0usize;
    for i in (0..at.min(tokens.len())).rev() {
        let tok = &tokens[i];
        if tok.is_punct(")") {
            depth += 1;
        } else if tok.is_punct("(") {
            if depth == 0 {
                return Some(i);
            }
            depth -= 1;
        }
    }
    None
}

/// Split the tokens strictly between `open` and `close` on top-level commas.
///
/// Each argument is returned as a half-open index range with surrounding
/// trivia trimmed. An empty argument list yields no ranges.
pub fn split_args(tokens: &[Token], open: usize, close: usize) -> Vec<(usize, usize)> {
    let mut args = Vec::new();
    let mut depth = 0usize;
    let mut start = open + 1;
    for i in open + 1..close {
        let tok = &tokens[i];
        if tok.is_punct("(") {
            depth += 1;
        } else if tok.is_punct(")") {
            depth = depth.saturating_sub(1);
        } else if tok.is_punct(",") && depth == 0 {
            args.push(trim_range(tokens, start, i));
            start = i + 1;
        }
    }
    let last = trim_range(tokens, start, close);
    if !args.is_empty() || last.0 < last.1 {
        args.push(last);
    }
    args
}

/// Shrink `[start, end)` to exclude leading and trailing trivia.
pub fn trim_range(tokens: &[Token], mut start: usize, mut end: usize) -> (usize, usize) {
    while start < end && tokens[start].is_trivia() {
        start += 1;
    }
    while end > start && tokens[end - 1].is_trivia() {
        end -= 1;
    }
    (start, end)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(tokens: &[Token]) -> Vec<TokenKind> {
        tokens
            .iter()
            .filter(|t| t.kind != TokenKind::Whitespace)
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn test_lossless() {
        let source = "SELECT [a]]b], N'it''s' -- note\n/* block */ FROM dbo.t WHERE x >= 1.5e3;";
        let tokens = tokenize(source).unwrap();
        assert_eq!(render(&tokens), source);
    }

    #[test]
    fn test_bracketed_identifier_value() {
        let tokens = tokenize("[Order]]Details]").unwrap();
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].kind, TokenKind::BracketedIdentifier);
        assert_eq!(tokens[0].value(), "Order]Details");
    }

    #[test]
    fn test_string_is_single_token() {
        let tokens = tokenize("'GETDATE() -- not a comment'").unwrap();
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].kind, TokenKind::QuotedString);
        assert_eq!(tokens[0].value(), "GETDATE() -- not a comment");
    }

    #[test]
    fn test_kinds() {
        let tokens = tokenize("SELECT @v, #tmp.col FROM [dbo].\"T\" WHERE a <> 0x1F").unwrap();
        assert_eq!(
            kinds(&tokens),
            vec![
                TokenKind::Keyword,
                TokenKind::Identifier,
                TokenKind::Punctuation,
                TokenKind::Identifier,
                TokenKind::Punctuation,
                TokenKind::Identifier,
                TokenKind::Keyword,
                TokenKind::BracketedIdentifier,
                TokenKind::Punctuation,
                TokenKind::QuotedIdentifier,
                TokenKind::Keyword,
                TokenKind::Identifier,
                TokenKind::Operator,
                TokenKind::Number,
            ]
        );
    }

    #[test]
    fn test_unterminated_bracket_is_fatal() {
        let err = tokenize("SELECT [abc FROM t").unwrap_err();
        assert_eq!(err, ConvertError::UnterminatedBracket { offset: 7 });
    }

    #[test]
    fn test_unterminated_string_is_fatal() {
        let err = tokenize("SELECT 'abc").unwrap_err();
        assert!(matches!(err, ConvertError::MalformedLiteral { offset: 7, .. }));
    }

    #[test]
    fn test_nested_block_comment_is_one_token() {
        let tokens = tokenize("/* a /* b */ ISNULL(x,y) */").unwrap();
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].kind, TokenKind::Comment);

        let tokens = tokenize("SELECT a /* x /* y */ z */ FROM t").unwrap();
        assert_eq!(kinds(&tokens)[2], TokenKind::Comment);
        assert_eq!(tokens.iter().filter(|t| t.kind == TokenKind::Comment).count(), 1);
    }

    #[test]
    fn test_unclosed_block_comment_is_not_fatal() {
        let tokens = tokenize("SELECT 1 /* trailing").unwrap();
        assert_eq!(tokens.last().map(|t| t.kind), Some(TokenKind::Comment));
    }

    #[test]
    fn test_split_args() {
        let tokens = tokenize("f(a, g(b, c), 'x,y')").unwrap();
        let close = matching_paren(&tokens, 1).unwrap();
        let args = split_args(&tokens, 1, close);
        let texts: Vec<String> = args.iter().map(|&(s, e)| render(&tokens[s..e])).collect();
        assert_eq!(texts, vec!["a", "g(b, c)", "'x,y'"]);
    }

    #[test]
    fn test_empty_args() {
        let tokens = tokenize("GETDATE( )").unwrap();
        let close = matching_paren(&tokens, 1).unwrap();
        assert!(split_args(&tokens, 1, close).is_empty());
    }
}
