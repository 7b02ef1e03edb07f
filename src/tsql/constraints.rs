//! `CREATE TABLE` constraint demotion.
//!
//! Delta tables do not enforce most SQL Server constraints, so they are kept
//! as block comments where they stood rather than dropped:
//!
//! ```text
//! id INT NOT NULL PRIMARY KEY,        id INT NOT NULL /* PRIMARY KEY */,
//! name NVARCHAR(50) NOT NULL,   →     name STRING /* NOT NULL */,
//! CONSTRAINT fk FOREIGN KEY ...       /* CONSTRAINT fk FOREIGN KEY ... */
//! ```
//!
//! `NOT NULL` stays on key columns. `IDENTITY` becomes a generated identity
//! column, filegroup and storage options are removed, and the dialect's
//! table format clause is appended after the column list.

use std::collections::HashSet;

use super::lexer::{
    enclosing_paren, matching_paren, next_significant, prev_significant, render, tokenize, Token,
    TokenKind,
};
use super::rules::{glue, is_create_table_body, Rewrite, RuleContext};
use crate::notes::{Note, NoteCode};

const ELEMENT_CONSTRAINTS: &[&str] = &["CONSTRAINT", "PRIMARY", "FOREIGN", "UNIQUE", "CHECK", "INDEX"];

pub(crate) fn apply(tokens: &[Token], at: usize, ctx: &RuleContext<'_>) -> Option<Rewrite> {
    if !ctx.statement.creates_table {
        return None;
    }
    let tok = &tokens[at];

    if tok.is_punct(")") {
        let open = enclosing_paren(tokens, at)?;
        return if is_create_table_body(tokens, open) {
            table_options(tokens, at, ctx)
        } else {
            None
        };
    }

    let open = enclosing_paren(tokens, at)?;
    if !is_create_table_body(tokens, open) {
        return None;
    }
    let close = matching_paren(tokens, open)?;

    // Table-level element: `, CONSTRAINT pk PRIMARY KEY (...)`
    if tok.is_punct(",") {
        let first = next_significant(tokens, at + 1)?;
        if !tokens[first].is_any_word(ELEMENT_CONSTRAINTS) {
            return None;
        }
        let end = element_end(tokens, first, close);
        let mut replacement: Vec<Token> = tokens[at + 1..first].to_vec();
        replacement.push(demoted(tokens, first, end));
        return Some(Rewrite::replace(at, end, replacement).with_note(demotion_note(tokens, first, end)));
    }
    if tok.is_any_word(ELEMENT_CONSTRAINTS) && prev_significant(tokens, at) == Some(open) {
        let end = element_end(tokens, at, close);
        let note = demotion_note(tokens, at, end);
        let mut replacement = vec![demoted(tokens, at, end)];
        // The first element takes its trailing comma with it
        let end = match next_significant(tokens, end) {
            Some(comma) if tokens[comma].is_punct(",") => {
                replacement.extend(tokens[end..comma].iter().cloned());
                comma + 1
            }
            _ => end,
        };
        return Some(Rewrite::replace(at, end, replacement).with_note(note));
    }

    column_constraint(tokens, at, open, ctx)
}

fn column_constraint(
    tokens: &[Token],
    at: usize,
    open: usize,
    ctx: &RuleContext<'_>,
) -> Option<Rewrite> {
    let tok = &tokens[at];

    if tok.is_word("IDENTITY") {
        return identity(tokens, at, ctx);
    }

    if tok.is_word("CONSTRAINT") {
        let name = next_significant(tokens, at + 1)?;
        let kind = next_significant(tokens, name + 1)?;
        if tokens[kind].is_word("DEFAULT") {
            return Some(
                Rewrite::replace(at, kind, Vec::new()).with_note(
                    Note::info(
                        NoteCode::ConstraintDemoted,
                        format!("default constraint name {} dropped", tokens[name].value()),
                    )
                    .at(tok.offset),
                ),
            );
        }
        let end = constraint_extent(tokens, kind)?;
        return Some(demote(tokens, at, end));
    }

    if tok.is_word("NOT") {
        let null = next_significant(tokens, at + 1)?;
        if !tokens[null].is_word("NULL") {
            return None;
        }
        let column = element_column(tokens, at, open)?;
        if ctx.statement.key_columns.contains(&column.to_ascii_uppercase()) {
            return None;
        }
        return Some(demote(tokens, at, null + 1));
    }

    if tok.is_any_word(&["PRIMARY", "UNIQUE", "CHECK", "REFERENCES", "FOREIGN"]) {
        let end = constraint_extent(tokens, at)?;
        return Some(demote(tokens, at, end));
    }
    None
}

/// `IDENTITY(s, i)` or bare `IDENTITY` → generated identity column.
fn identity(tokens: &[Token], at: usize, ctx: &RuleContext<'_>) -> Option<Rewrite> {
    // Already `GENERATED ALWAYS AS IDENTITY (...)`
    if prev_significant(tokens, at).is_some_and(|p| tokens[p].is_word("AS")) {
        return None;
    }
    let (start, increment, end) = match next_significant(tokens, at + 1) {
        Some(open) if tokens[open].is_punct("(") => {
            let close = matching_paren(tokens, open)?;
            let values: Vec<&Token> = tokens[open + 1..close]
                .iter()
                .filter(|t| !t.is_trivia() && !t.is_punct(","))
                .collect();
            match values.as_slice() {
                [s, i] => (s.text.parse().ok()?, i.text.parse().ok()?, close + 1),
                _ => return None,
            }
        }
        _ => (1, 1, at + 1),
    };
    let generated = ctx
        .dialect
        .emit_identity(start, increment)
        .serialize(ctx.dialect);
    Some(Rewrite::replace(at, end, glue(&generated, tokens[at].offset)))
}

/// Options after the column list: `ON [PRIMARY]`, `TEXTIMAGE_ON [PRIMARY]`,
/// `WITH (...)`. They are removed and the table format clause is appended.
fn table_options(tokens: &[Token], close: usize, ctx: &RuleContext<'_>) -> Option<Rewrite> {
    let mut end = close + 1;
    let mut removed = Vec::new();
    loop {
        let Some(next) = next_significant(tokens, end) else { break };
        let tok = &tokens[next];
        if tok.is_any_word(&["ON", "TEXTIMAGE_ON", "FILESTREAM_ON"]) {
            let Some(target) = next_significant(tokens, next + 1) else { break };
            removed.push(render(&tokens[next..target + 1]));
            end = target + 1;
        } else if tok.is_word("WITH") {
            let Some(open) = next_significant(tokens, next + 1).filter(|&o| tokens[o].is_punct("("))
            else {
                break;
            };
            let Some(group_end) = matching_paren(tokens, open) else { break };
            removed.push(render(&tokens[next..group_end + 1]));
            end = group_end + 1;
        } else {
            break;
        }
    }

    let has_format = next_significant(tokens, end).is_some_and(|n| tokens[n].is_word("USING"));
    let format = ctx.dialect.table_format_clause().filter(|_| !has_format);
    if removed.is_empty() && format.is_none() {
        return None;
    }

    let offset = tokens[close].offset;
    let mut replacement = vec![Token::generated(TokenKind::Punctuation, ")", offset)];
    if let Some(format) = format {
        replacement.extend(glue(&format!(" {}", format), offset));
    }
    let notes = removed
        .into_iter()
        .map(|clause| {
            Note::info(
                NoteCode::HintRemoved,
                format!("storage option {} removed", clause),
            )
            .at(offset)
        })
        .collect();
    let mut rewrite = Rewrite::replace(close, end, replacement);
    rewrite.notes = notes;
    Some(rewrite)
}

// =============================================================================
// Extents
// =============================================================================

/// End (exclusive) of one column-level or table-level constraint starting at `at`.
fn constraint_extent(tokens: &[Token], at: usize) -> Option<usize> {
    let mut c = Cursor::new(tokens, at);
    let head = c.next()?;
    let head = &tokens[head];
    if head.is_word("PRIMARY") || head.is_word("UNIQUE") {
        if head.is_word("PRIMARY") && !c.eat_word("KEY") {
            return None;
        }
        c.eat_any(&["CLUSTERED", "NONCLUSTERED"]);
        c.eat_group();
        c.eat_options();
    } else if head.is_word("CHECK") {
        c.eat_words(&["NOT", "FOR", "REPLICATION"]);
        if !c.eat_group() {
            return None;
        }
    } else if head.is_word("FOREIGN") {
        if !c.eat_word("KEY") {
            return None;
        }
        c.eat_group();
        if !c.eat_word("REFERENCES") {
            return None;
        }
        c.eat_references()?;
    } else if head.is_word("REFERENCES") {
        c.eat_references()?;
    } else {
        return None;
    }
    Some(c.pos)
}

/// End (exclusive, trivia trimmed) of the element starting at `first`.
fn element_end(tokens: &[Token], first: usize, close: usize) -> usize {
    let mut depth = 0usize;
    let mut end = close;
    for i in first..close {
        let tok = &tokens[i];
        if tok.is_punct("(") {
            depth += 1;
        } else if tok.is_punct(")") {
            depth = depth.saturating_sub(1);
        } else if tok.is_punct(",") && depth == 0 {
            end = i;
            break;
        }
    }
    while end > first && tokens[end - 1].is_trivia() {
        end -= 1;
    }
    end
}

/// The column name that starts the element containing `at`.
fn element_column(tokens: &[Token], at: usize, open: usize) -> Option<String> {
    let mut depth = 0usize;
    let mut start = open;
    for i in (open + 1..at).rev() {
        let tok = &tokens[i];
        if tok.is_punct(")") {
            depth += 1;
        } else if tok.is_punct("(") {
            depth = depth.saturating_sub(1);
        } else if tok.is_punct(",") && depth == 0 {
            start = i;
            break;
        }
    }
    next_significant(tokens, start + 1).map(|i| tokens[i].value())
}

// =============================================================================
// Demotion
// =============================================================================

fn demote(tokens: &[Token], start: usize, end: usize) -> Rewrite {
    Rewrite::replace(start, end, vec![demoted(tokens, start, end)])
        .with_note(demotion_note(tokens, start, end))
}

fn demoted(tokens: &[Token], start: usize, end: usize) -> Token {
    Token::generated(
        TokenKind::Comment,
        format!("/* {} */", comment_text(tokens, start, end)),
        tokens[start].offset,
    )
}

fn demotion_note(tokens: &[Token], start: usize, end: usize) -> Note {
    Note::info(
        NoteCode::ConstraintDemoted,
        format!(
            "{} is not enforced by Delta; kept as a comment",
            comment_text(tokens, start, end)
        ),
    )
    .at(tokens[start].offset)
}

/// Single-line text safe to embed in a block comment.
fn comment_text(tokens: &[Token], start: usize, end: usize) -> String {
    render(&tokens[start..end])
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .replace("*/", "* /")
}

// =============================================================================
// Key columns
// =============================================================================

/// Upper-cased names of primary key columns in a `CREATE TABLE` statement.
///
/// Constraints already demoted to comments still count, so a second
/// conversion keeps the same `NOT NULL`s as the first.
pub(crate) fn key_columns(tokens: &[Token]) -> HashSet<String> {
    let mut keys = HashSet::new();
    let Some(open) = (0..tokens.len()).find(|&i| tokens[i].is_punct("(") && is_create_table_body(tokens, i))
    else {
        return keys;
    };
    let Some(close) = matching_paren(tokens, open) else { return keys };

    let mut element_start = open + 1;
    for i in open + 1..=close {
        let at_boundary = i == close
            || (tokens[i].is_punct(",") && enclosing_paren(tokens, i) == Some(open));
        if !at_boundary {
            continue;
        }
        collect_element_keys(&tokens[element_start..i], &mut keys);
        element_start = i + 1;
    }
    keys
}

fn collect_element_keys(element: &[Token], keys: &mut HashSet<String>) {
    let column = element
        .iter()
        .find(|t| !t.is_trivia())
        .filter(|t| !t.is_any_word(ELEMENT_CONSTRAINTS))
        .map(|t| t.value().to_ascii_uppercase());

    let mut record = |found: Option<Vec<String>>| match found {
        Some(list) => keys.extend(list),
        None => keys.extend(column.clone()),
    };

    if let Some(found) = primary_key_in(element) {
        record(found);
    }
    for comment in element.iter().filter(|t| t.kind == TokenKind::Comment) {
        let inner = comment
            .text
            .trim_start_matches("/*")
            .trim_end_matches("*/");
        if let Ok(inner_tokens) = tokenize(inner) {
            if let Some(found) = primary_key_in(&inner_tokens) {
                record(found);
            }
        }
    }
}

/// Finds `PRIMARY KEY [CLUSTERED] [(cols)]`. The outer `Option` says whether a
/// primary key is present, the inner one carries an explicit column list.
fn primary_key_in(tokens: &[Token]) -> Option<Option<Vec<String>>> {
    let primary = (0..tokens.len()).find(|&i| {
        tokens[i].is_word("PRIMARY")
            && next_significant(tokens, i + 1).is_some_and(|k| tokens[k].is_word("KEY"))
    })?;
    let mut c = Cursor::new(tokens, primary);
    c.next();
    c.next();
    c.eat_any(&["CLUSTERED", "NONCLUSTERED"]);
    let Some(open) = c.peek().filter(|&o| tokens[o].is_punct("(")) else {
        return Some(None);
    };
    let close = matching_paren(tokens, open)?;
    let columns = tokens[open + 1..close]
        .iter()
        .filter(|t| t.is_name() || (t.kind == TokenKind::Keyword && !t.is_any_word(&["ASC", "DESC"])))
        .map(|t| t.value().to_ascii_uppercase())
        .collect();
    Some(Some(columns))
}

// =============================================================================
// Cursor
// =============================================================================

/// Forward scanner over significant tokens.
struct Cursor<'t> {
    tokens: &'t [Token],
    /// One past the last consumed token.
    pos: usize,
}

impl<'t> Cursor<'t> {
    fn new(tokens: &'t [Token], start: usize) -> Self {
        Self { tokens, pos: start }
    }

    fn peek(&self) -> Option<usize> {
        next_significant(self.tokens, self.pos)
    }

    fn next(&mut self) -> Option<usize> {
        let i = self.peek()?;
        self.pos = i + 1;
        Some(i)
    }

    fn eat_word(&mut self, word: &str) -> bool {
        match self.peek() {
            Some(i) if self.tokens[i].is_word(word) => {
                self.pos = i + 1;
                true
            }
            _ => false,
        }
    }

    fn eat_any(&mut self, words: &[&str]) -> bool {
        words.iter().any(|w| self.eat_word(w))
    }

    /// Consume `words` only when all of them follow in order.
    fn eat_words(&mut self, words: &[&str]) -> bool {
        let saved = self.pos;
        if words.iter().all(|w| self.eat_word(w)) {
            true
        } else {
            self.pos = saved;
            false
        }
    }

    fn eat_group(&mut self) -> bool {
        match self.peek() {
            Some(open) if self.tokens[open].is_punct("(") => match matching_paren(self.tokens, open) {
                Some(close) => {
                    self.pos = close + 1;
                    true
                }
                None => false,
            },
            _ => false,
        }
    }

    /// `WITH (...)` index options and `ON filegroup`.
    fn eat_options(&mut self) {
        loop {
            let saved = self.pos;
            if self.eat_word("WITH") {
                if self.eat_group() {
                    continue;
                }
                self.pos = saved;
            }
            if self.eat_word("ON") {
                if self.peek().is_some_and(|i| self.tokens[i].is_name()) {
                    self.next();
                    continue;
                }
                self.pos = saved;
            }
            break;
        }
    }

    /// `table [(cols)] [ON DELETE|UPDATE action]...`
    fn eat_references(&mut self) -> Option<()> {
        let first = self.next()?;
        if !self.tokens[first].is_name() {
            return None;
        }
        while self.peek().is_some_and(|i| self.tokens[i].is_punct(".")) {
            self.next();
            self.next()?;
        }
        self.eat_group();
        loop {
            let saved = self.pos;
            if self.eat_word("ON") && self.eat_any(&["DELETE", "UPDATE"]) {
                let action = self.eat_word("CASCADE")
                    || self.eat_words(&["NO", "ACTION"])
                    || self.eat_words(&["SET", "NULL"])
                    || self.eat_words(&["SET", "DEFAULT"]);
                if action {
                    continue;
                }
            }
            self.pos = saved;
            break;
        }
        self.eat_words(&["NOT", "FOR", "REPLICATION"]);
        Some(())
    }
}
