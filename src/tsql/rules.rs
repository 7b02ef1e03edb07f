//! Rewrite rule engine.
//!
//! A rule looks at a token window anchored at one index and either declines,
//! reports notes, or replaces a contiguous range with new tokens. Replacement
//! tokens created by a rule are `protected`; tokens carried over from the
//! original range (function arguments, for example) are not, so the pass
//! goes on to rewrite them.
//!
//! Passes run one rule category at a time, left to right. Protected tokens
//! and trivia are never used as anchors.

use std::collections::HashSet;

use tracing::trace;

use super::lexer::{
    enclosing_paren, matching_paren, next_significant, prev_significant, render, tokenize, Token,
    TokenKind,
};
use super::{constraints, functions, identifiers};
use crate::mapping::map_type;
use crate::notes::{Note, NoteCode};
use crate::sql::SqlDialect;

// =============================================================================
// Rewrites
// =============================================================================

/// Replace `tokens[start..end]` with `replacement`, reporting `notes`.
///
/// An empty range with an empty replacement only reports notes.
#[derive(Debug, Clone, PartialEq)]
pub struct Rewrite {
    pub start: usize,
    pub end: usize,
    pub replacement: Vec<Token>,
    pub notes: Vec<Note>,
}

impl Rewrite {
    pub fn replace(start: usize, end: usize, replacement: Vec<Token>) -> Self {
        Self {
            start,
            end,
            replacement,
            notes: Vec::new(),
        }
    }

    pub fn notes_only(at: usize, notes: Vec<Note>) -> Self {
        Self {
            start: at,
            end: at,
            replacement: Vec::new(),
            notes,
        }
    }

    pub fn with_note(mut self, note: Note) -> Self {
        self.notes.push(note);
        self
    }

    fn is_noop(&self) -> bool {
        self.start == self.end && self.replacement.is_empty()
    }
}

/// Lex `text` into protected tokens anchored at `offset`.
///
/// Used for generated text so structural punctuation stays visible to later
/// passes.
pub fn glue(text: &str, offset: usize) -> Vec<Token> {
    match tokenize(text) {
        Ok(tokens) => tokens
            .into_iter()
            .map(|t| Token::generated(t.kind, t.text, offset))
            .collect(),
        Err(_) => vec![Token::generated(TokenKind::Keyword, text, offset)],
    }
}

// =============================================================================
// Context
// =============================================================================

/// Facts about the statement being rewritten, gathered before the passes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatementInfo {
    /// First keyword, uppercased.
    pub head: Option<String>,
    /// Names bound by a leading `WITH`, uppercased.
    pub cte_names: HashSet<String>,
    /// `CREATE TABLE` statement.
    pub creates_table: bool,
    /// Primary key columns of a `CREATE TABLE`, uppercased.
    pub key_columns: HashSet<String>,
}

impl StatementInfo {
    pub fn analyze(tokens: &[Token]) -> Self {
        let mut first = next_significant(tokens, 0);
        while let Some(i) = first {
            if tokens[i].is_punct(";") {
                first = next_significant(tokens, i + 1);
            } else {
                break;
            }
        }
        let head = first
            .filter(|&i| matches!(tokens[i].kind, TokenKind::Keyword | TokenKind::Identifier))
            .map(|i| tokens[i].text.to_ascii_uppercase());

        let creates_table = first
            .and_then(|i| next_significant(tokens, i + 1))
            .is_some_and(|j| head.as_deref() == Some("CREATE") && tokens[j].is_word("TABLE"));

        let cte_names = match first {
            Some(i) if tokens[i].is_word("WITH") => collect_cte_names(tokens, i),
            _ => HashSet::new(),
        };

        let key_columns = if creates_table {
            constraints::key_columns(tokens)
        } else {
            HashSet::new()
        };

        Self {
            head,
            cte_names,
            creates_table,
            key_columns,
        }
    }

    pub fn head_is(&self, word: &str) -> bool {
        self.head
            .as_deref()
            .is_some_and(|h| h.eq_ignore_ascii_case(word))
    }

    pub fn is_cte(&self, name: &str) -> bool {
        self.cte_names.contains(&name.to_ascii_uppercase())
    }
}

/// `WITH a AS (...), b (x, y) AS (...)` → {A, B}
fn collect_cte_names(tokens: &[Token], with: usize) -> HashSet<String> {
    let mut names = HashSet::new();
    let mut i = with;
    loop {
        let Some(name) = next_significant(tokens, i + 1) else { break };
        if !tokens[name].is_name() {
            break;
        }
        let Some(mut next) = next_significant(tokens, name + 1) else { break };
        if tokens[next].is_punct("(") {
            let Some(close) = matching_paren(tokens, next) else { break };
            let Some(after) = next_significant(tokens, close + 1) else { break };
            next = after;
        }
        if !tokens[next].is_word("AS") {
            break;
        }
        let Some(open) = next_significant(tokens, next + 1) else { break };
        if !tokens[open].is_punct("(") {
            break;
        }
        names.insert(tokens[name].value().to_ascii_uppercase());
        let Some(close) = matching_paren(tokens, open) else { break };
        match next_significant(tokens, close + 1) {
            Some(comma) if tokens[comma].is_punct(",") => i = comma,
            _ => break,
        }
    }
    names
}

/// Everything a rule may consult besides the tokens.
#[derive(Debug, Clone, Copy)]
pub struct RuleContext<'a> {
    pub catalog: &'a str,
    pub schema: &'a str,
    pub dialect: &'a dyn SqlDialect,
    pub statement: &'a StatementInfo,
}

// =============================================================================
// Rules
// =============================================================================

/// Rule categories, in the order they run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RewriteRule {
    Type,
    Function,
    Identifier,
    Constraint,
}

impl RewriteRule {
    pub const ORDER: [RewriteRule; 4] = [
        RewriteRule::Type,
        RewriteRule::Function,
        RewriteRule::Identifier,
        RewriteRule::Constraint,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            RewriteRule::Type => "type",
            RewriteRule::Function => "function",
            RewriteRule::Identifier => "identifier",
            RewriteRule::Constraint => "constraint",
        }
    }

    /// Try the rule at `at`.
    pub fn apply(&self, tokens: &[Token], at: usize, ctx: &RuleContext<'_>) -> Option<Rewrite> {
        match self {
            RewriteRule::Type => apply_type(tokens, at, ctx),
            RewriteRule::Function => functions::apply(tokens, at, ctx),
            RewriteRule::Identifier => identifiers::apply(tokens, at, ctx),
            RewriteRule::Constraint => constraints::apply(tokens, at, ctx),
        }
    }
}

/// Run one rule category over the token stream.
pub fn apply_rules(
    mut tokens: Vec<Token>,
    rule: RewriteRule,
    ctx: &RuleContext<'_>,
) -> (Vec<Token>, Vec<Note>) {
    let mut notes = Vec::new();
    let mut i = 0;
    while i < tokens.len() {
        if tokens[i].protected || tokens[i].is_trivia() {
            i += 1;
            continue;
        }
        let Some(rewrite) = rule.apply(&tokens, i, ctx) else {
            i += 1;
            continue;
        };
        notes.extend(rewrite.notes.iter().cloned());
        if rewrite.is_noop() {
            i += 1;
            continue;
        }
        trace!(
            rule = rule.name(),
            from = %render(&tokens[rewrite.start..rewrite.end]),
            to = %render(&rewrite.replacement),
            "rewrite"
        );
        // Resume at the replacement so carried-over tokens are visited
        i = rewrite.start;
        tokens.splice(rewrite.start..rewrite.end, rewrite.replacement);
    }
    (tokens, notes)
}

// =============================================================================
// Type rule
// =============================================================================

fn apply_type(tokens: &[Token], at: usize, ctx: &RuleContext<'_>) -> Option<Rewrite> {
    let tok = &tokens[at];
    if !matches!(
        tok.kind,
        TokenKind::Identifier | TokenKind::Keyword | TokenKind::BracketedIdentifier
    ) || tok.text.starts_with('@')
    {
        return None;
    }
    if !is_type_slot(tokens, at, ctx) {
        return None;
    }

    let base = tok.value();
    let (end, params) = match next_significant(tokens, at + 1) {
        Some(open) if tokens[open].is_punct("(") => {
            let close = matching_paren(tokens, open)?;
            (close + 1, Some(render(&tokens[open + 1..close])))
        }
        _ => (at + 1, None),
    };
    let original = render(&tokens[at..end]);

    match map_type(&base, params.as_deref()) {
        Some(mapped) if mapped == original => None,
        Some(mapped) => Some(Rewrite::replace(
            at,
            end,
            vec![Token::generated(TokenKind::Keyword, mapped, tok.offset)],
        )),
        // Keywords in a type slot are structure (AS, IDENTITY, ...), not types
        None if tok.kind == TokenKind::Keyword => None,
        None => Some(Rewrite::notes_only(
            at,
            vec![Note::warning(
                NoteCode::UnmappedType,
                format!("type {} has no Databricks mapping; left unchanged", original),
            )
            .at(tok.offset)],
        )),
    }
}

/// Positions where a data type is expected.
fn is_type_slot(tokens: &[Token], at: usize, ctx: &RuleContext<'_>) -> bool {
    let Some(p) = prev_significant(tokens, at) else { return false };
    let prev = &tokens[p];

    // CAST(x AS type), DECLARE @v AS type
    if prev.is_word("AS") {
        let in_cast = enclosing_paren(tokens, at)
            .and_then(|open| prev_significant(tokens, open))
            .is_some_and(|f| tokens[f].is_any_word(&["CAST", "TRY_CAST"]));
        let after_variable = prev_significant(tokens, p).is_some_and(|v| is_variable(&tokens[v]));
        return in_cast || (after_variable && ctx.statement.head_is("DECLARE"));
    }

    // CONVERT(type, ...)
    if prev.is_punct("(") {
        return prev_significant(tokens, p)
            .is_some_and(|f| tokens[f].is_any_word(&["CONVERT", "TRY_CONVERT"]));
    }

    // DECLARE @v type
    if is_variable(prev) {
        return ctx.statement.head_is("DECLARE");
    }

    if !is_column_name(prev) {
        return false;
    }
    let Some(pp) = prev_significant(tokens, p) else { return false };
    let before = &tokens[pp];

    // ALTER TABLE t ADD c type / ALTER COLUMN c type
    if before.is_any_word(&["ADD", "COLUMN"]) {
        return ctx.statement.head_is("ALTER");
    }

    // CREATE TABLE t (c type, ...)
    if before.is_punct("(") || before.is_punct(",") {
        return enclosing_paren(tokens, at).is_some_and(|open| is_create_table_body(tokens, open));
    }
    false
}

fn is_variable(tok: &Token) -> bool {
    tok.kind == TokenKind::Identifier && tok.text.starts_with('@') && !tok.text.starts_with("@@")
}

const ELEMENT_KEYWORDS: &[&str] = &[
    "ADD", "AS", "CHECK", "COLUMN", "CONSTRAINT", "DEFAULT", "FOREIGN", "IDENTITY", "INDEX", "KEY",
    "NOT", "NULL", "ON", "PRIMARY", "TABLE", "UNIQUE",
];

/// A token that can name a column in a definition list.
pub(crate) fn is_column_name(tok: &Token) -> bool {
    tok.is_name() || (tok.kind == TokenKind::Keyword && !tok.is_any_word(ELEMENT_KEYWORDS))
}

/// Whether the `(` at `open` starts the column list of `CREATE TABLE name (`.
pub(crate) fn is_create_table_body(tokens: &[Token], open: usize) -> bool {
    let mut j = open;
    let mut saw_name = false;
    loop {
        let Some(p) = prev_significant(tokens, j) else { return false };
        let tok = &tokens[p];
        if tok.is_word("TABLE") {
            return saw_name
                && prev_significant(tokens, p).is_some_and(|c| tokens[c].is_word("CREATE"));
        }
        if tok.is_punct(".") || tok.is_name() || tok.kind == TokenKind::Keyword {
            saw_name |= !tok.is_punct(".");
            j = p;
            continue;
        }
        return false;
    }
}
