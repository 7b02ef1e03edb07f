//! Statement splitting and statement-level cleanup.
//!
//! Splitting happens once per file on the full token stream, so token
//! offsets stay relative to the file. Cleanup covers what has no Databricks
//! counterpart at all: session `SET` options, `USE`, table and query hints,
//! and `TOP`, which moves to a trailing `LIMIT`.

use std::mem;

use super::lexer::{
    enclosing_paren, matching_paren, next_significant, prev_significant, render, Token, TokenKind,
};
use super::rules::glue;
use crate::notes::{Note, NoteCode};

// =============================================================================
// Splitting
// =============================================================================

/// Split a file into statements on top-level `;` and `GO` lines.
///
/// A `GO` separator is dropped and the statement before it is terminated
/// with `;` unless it already ends with one. Session `SET` and `USE`
/// statements also end at their line end or at the next statement keyword,
/// since scripts often separate them with newlines only.
pub fn split(tokens: Vec<Token>) -> Vec<Vec<Token>> {
    let separators: Vec<bool> = (0..tokens.len()).map(|i| is_batch_separator(&tokens, i)).collect();
    let session_starts: Vec<bool> = (0..tokens.len())
        .map(|i| session_statement_at(&tokens, i).is_some())
        .collect();
    let mut statements = Vec::new();
    let mut current: Vec<Token> = Vec::new();
    let mut depth = 0usize;
    let mut in_session = false;

    for ((tok, separator), session_start) in tokens.into_iter().zip(separators).zip(session_starts) {
        if separator {
            terminate(&mut current, tok.offset);
            statements.push(mem::take(&mut current));
            depth = 0;
            in_session = false;
            continue;
        }
        if depth == 0 {
            if in_session && ends_session_statement(&tok) {
                statements.push(mem::take(&mut current));
                in_session = false;
            }
            if session_start {
                if prev_significant(&current, current.len()).is_some() {
                    statements.push(mem::take(&mut current));
                }
                in_session = true;
            }
        }
        if tok.is_punct("(") {
            depth += 1;
        } else if tok.is_punct(")") {
            depth = depth.saturating_sub(1);
        }
        let ends_statement = tok.is_punct(";") && depth == 0;
        current.push(tok);
        if ends_statement {
            statements.push(mem::take(&mut current));
            in_session = false;
        }
    }
    if !current.is_empty() {
        statements.push(current);
    }
    statements
}

const STATEMENT_KEYWORDS: &[&str] = &[
    "ALTER", "CREATE", "DECLARE", "DELETE", "DROP", "INSERT", "MERGE", "SELECT", "SET",
    "UPDATE", "USE", "WITH",
];

fn ends_session_statement(tok: &Token) -> bool {
    (tok.kind == TokenKind::Whitespace && tok.text.contains('\n'))
        || tok.is_any_word(STATEMENT_KEYWORDS)
}

/// `GO` alone on its line, or after a `;` that ends the line's statement.
fn is_batch_separator(tokens: &[Token], i: usize) -> bool {
    if !tokens[i].is_word("GO") {
        return false;
    }
    let line_start = match i.checked_sub(1).map(|p| &tokens[p]) {
        None => true,
        Some(prev) if prev.kind == TokenKind::Whitespace => {
            prev.text.contains('\n')
                || i == 1
                || tokens[i - 2].is_punct(";")
        }
        Some(prev) => prev.is_punct(";"),
    };
    let line_end = match tokens.get(i + 1) {
        None => true,
        Some(next) if next.kind == TokenKind::Whitespace => {
            next.text.contains('\n')
                || tokens
                    .get(i + 2)
                    .map_or(true, |t| t.kind == TokenKind::Comment)
        }
        Some(next) => next.kind == TokenKind::Comment,
    };
    line_start && line_end
}

fn terminate(statement: &mut Vec<Token>, offset: usize) {
    if let Some(last) = prev_significant(statement, statement.len()) {
        if !statement[last].is_punct(";") {
            statement.insert(last + 1, Token::generated(TokenKind::Punctuation, ";", offset));
        }
    }
}

// =============================================================================
// Cleanup
// =============================================================================

const SESSION_OPTIONS: &[&str] = &[
    "ANSI_DEFAULTS", "ANSI_NULL_DFLT_ON", "ANSI_NULLS", "ANSI_PADDING", "ANSI_WARNINGS",
    "ARITHABORT", "CONCAT_NULL_YIELDS_NULL", "DATEFIRST", "DATEFORMAT", "DEADLOCK_PRIORITY",
    "FMTONLY", "IMPLICIT_TRANSACTIONS", "LANGUAGE", "LOCK_TIMEOUT", "NOCOUNT", "NOEXEC",
    "NUMERIC_ROUNDABORT", "QUOTED_IDENTIFIER", "ROWCOUNT", "STATISTICS", "TEXTSIZE",
    "TRANSACTION", "XACT_ABORT",
];

const TABLE_HINTS: &[&str] = &[
    "FORCESCAN", "FORCESEEK", "HOLDLOCK", "INDEX", "NOEXPAND", "NOLOCK", "NOWAIT", "PAGLOCK",
    "READCOMMITTED", "READCOMMITTEDLOCK", "READPAST", "READUNCOMMITTED", "REPEATABLEREAD",
    "ROWLOCK", "SERIALIZABLE", "SNAPSHOT", "TABLOCK", "TABLOCKX", "UPDLOCK", "XLOCK",
];

/// Apply statement-level cleanup.
pub fn cleanup(tokens: Vec<Token>, notes: &mut Vec<Note>) -> Vec<Token> {
    if let Some(kind) = session_statement(&tokens) {
        return comment_out(tokens, kind, notes);
    }
    let tokens = remove_hints(tokens, notes);
    top_to_limit(tokens, notes)
}

fn session_statement(tokens: &[Token]) -> Option<&'static str> {
    session_statement_at(tokens, next_significant(tokens, 0)?)
}

/// `USE db`, or `SET <option> ...` where the option is not assigned with `=`
/// (`UPDATE t SET Language = 'en'` assigns a column).
fn session_statement_at(tokens: &[Token], at: usize) -> Option<&'static str> {
    if tokens[at].is_word("USE") {
        return Some("USE");
    }
    if !tokens[at].is_word("SET") {
        return None;
    }
    let option = next_significant(tokens, at + 1)?;
    if !tokens[option].is_any_word(SESSION_OPTIONS) {
        return None;
    }
    let assigned = next_significant(tokens, option + 1).is_some_and(|n| tokens[n].is_punct("="));
    (!assigned).then_some("session SET")
}

fn comment_out(mut tokens: Vec<Token>, kind: &str, notes: &mut Vec<Note>) -> Vec<Token> {
    let (Some(first), Some(last)) = (next_significant(&tokens, 0), prev_significant(&tokens, tokens.len()))
    else {
        return tokens;
    };
    let text = render(&tokens[first..=last])
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .replace("*/", "* /");
    let offset = tokens[first].offset;
    notes.push(
        Note::info(
            NoteCode::StatementRemoved,
            format!("{} statement `{}` has no Databricks equivalent; commented out", kind, text),
        )
        .at(offset),
    );
    tokens.splice(
        first..=last,
        [Token::generated(TokenKind::Comment, format!("/* {} */", text), offset)],
    );
    tokens
}

/// `WITH (NOLOCK)`, legacy `t (NOLOCK)` and `OPTION (...)`.
fn remove_hints(mut tokens: Vec<Token>, notes: &mut Vec<Note>) -> Vec<Token> {
    let mut i = 0;
    while i < tokens.len() {
        if tokens[i].protected || tokens[i].is_trivia() {
            i += 1;
            continue;
        }
        let Some((start, end, what)) = hint_at(&tokens, i) else {
            i += 1;
            continue;
        };
        notes.push(
            Note::info(
                NoteCode::HintRemoved,
                format!("{} `{}` removed", what, render(&tokens[i..end])),
            )
            .at(tokens[i].offset),
        );
        tokens.drain(start..end);
        i = start;
    }
    tokens
}

/// Range to remove (including leading whitespace) for a hint at `at`.
fn hint_at(tokens: &[Token], at: usize) -> Option<(usize, usize, &'static str)> {
    let tok = &tokens[at];
    let start = if at > 0 && tokens[at - 1].kind == TokenKind::Whitespace {
        at - 1
    } else {
        at
    };

    if tok.is_word("WITH") || tok.is_word("OPTION") {
        let open = next_significant(tokens, at + 1).filter(|&o| tokens[o].is_punct("("))?;
        let close = matching_paren(tokens, open)?;
        if tok.is_word("OPTION") {
            return enclosing_paren(tokens, at)
                .is_none()
                .then_some((start, close + 1, "query hint"));
        }
        return is_hint_list(tokens, open, close).then_some((start, close + 1, "table hint"));
    }

    // Legacy form directly after a table name
    if tok.is_punct("(") {
        let close = matching_paren(tokens, at)?;
        let after_table = prev_significant(tokens, at).is_some_and(|p| tokens[p].is_name());
        if after_table && is_bare_hint_list(tokens, at, close) {
            return Some((start, close + 1, "table hint"));
        }
    }
    None
}

fn is_hint_list(tokens: &[Token], open: usize, close: usize) -> bool {
    next_significant(tokens, open + 1)
        .filter(|&first| first < close)
        .is_some_and(|first| tokens[first].is_any_word(TABLE_HINTS))
}

/// `(NOLOCK)` or `(NOLOCK, READPAST)`: hint words and commas only, so a call
/// like `SUBSTRING(Index, 1, 2)` never matches.
fn is_bare_hint_list(tokens: &[Token], open: usize, close: usize) -> bool {
    let mut words = tokens[open + 1..close].iter().filter(|t| !t.is_trivia() && !t.is_punct(","));
    let mut any = false;
    let all_hints = words.all(|t| {
        any = true;
        t.is_any_word(TABLE_HINTS) && !t.is_word("INDEX")
    });
    any && all_hints
}

/// `SELECT [DISTINCT] TOP n ...` → `SELECT [DISTINCT] ... LIMIT n`
fn top_to_limit(mut tokens: Vec<Token>, notes: &mut Vec<Note>) -> Vec<Token> {
    let mut i = 0;
    while i < tokens.len() {
        if !tokens[i].is_word("SELECT") || tokens[i].protected {
            i += 1;
            continue;
        }
        let Some(mut top) = next_significant(&tokens, i + 1) else { break };
        if tokens[top].is_any_word(&["DISTINCT", "ALL"]) {
            match next_significant(&tokens, top + 1) {
                Some(t) => top = t,
                None => break,
            }
        }
        if !tokens[top].is_word("TOP") {
            i += 1;
            continue;
        }
        match limit_rewrite(&tokens, i, top) {
            Ok((count_end, insert_at, n)) => {
                let offset = tokens[top].offset;
                tokens.splice(insert_at..insert_at, glue(&format!(" LIMIT {}", n), offset));
                // Drop `TOP n` and the whitespace after it
                let mut remove_end = count_end;
                if tokens.get(remove_end).is_some_and(|t| t.kind == TokenKind::Whitespace) {
                    remove_end += 1;
                }
                tokens.drain(top..remove_end);
            }
            Err(reason) => notes.push(Note::unsupported(reason).at(tokens[top].offset)),
        }
        i += 1;
    }
    tokens
}

/// Validates a `TOP` clause. Returns the end of the count, the index to
/// insert `LIMIT` at, and the count.
fn limit_rewrite(tokens: &[Token], select: usize, top: usize) -> Result<(usize, usize, u64), String> {
    let count = next_significant(tokens, top + 1).ok_or("TOP without a row count")?;
    let (count_end, value) = if tokens[count].is_punct("(") {
        let close = matching_paren(tokens, count).ok_or("unbalanced TOP clause")?;
        let inner: Vec<&Token> = tokens[count + 1..close].iter().filter(|t| !t.is_trivia()).collect();
        match inner.as_slice() {
            [n] => (close + 1, n.text.as_str()),
            _ => return Err(format!("TOP {} is not a constant row count; left unchanged", render(&tokens[count..=close]))),
        }
    } else {
        (count + 1, tokens[count].text.as_str())
    };
    let n: u64 = value
        .parse()
        .map_err(|_| format!("TOP {} is not a constant row count; left unchanged", value))?;

    if let Some(next) = next_significant(tokens, count_end) {
        if tokens[next].is_word("PERCENT") {
            return Err("TOP ... PERCENT has no Databricks equivalent; left unchanged".into());
        }
        if tokens[next].is_word("WITH")
            && next_significant(tokens, next + 1).is_some_and(|t| tokens[t].is_word("TIES"))
        {
            return Err("TOP ... WITH TIES has no Databricks equivalent; left unchanged".into());
        }
    }

    // The query scope ends at the enclosing `)` or the end of the statement
    let scope_end = match enclosing_paren(tokens, select) {
        Some(open) => matching_paren(tokens, open).ok_or("unbalanced query scope")?,
        None => tokens.len(),
    };
    let mut depth = 0usize;
    for tok in &tokens[select..scope_end] {
        if tok.is_punct("(") {
            depth += 1;
        } else if tok.is_punct(")") {
            depth = depth.saturating_sub(1);
        } else if depth == 0 && tok.is_any_word(&["UNION", "EXCEPT", "INTERSECT"]) {
            return Err("TOP in a set operation cannot move to LIMIT; left unchanged".into());
        }
    }

    let mut last = prev_significant(tokens, scope_end).ok_or("empty query")?;
    if tokens[last].is_punct(";") {
        last = prev_significant(tokens, last).ok_or("empty query")?;
    }
    Ok((count_end, last + 1, n))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tsql::lexer::tokenize;

    fn clean(sql: &str) -> (String, Vec<Note>) {
        let mut notes = Vec::new();
        let tokens = cleanup(tokenize(sql).unwrap(), &mut notes);
        (render(&tokens), notes)
    }

    fn split_texts(sql: &str) -> Vec<String> {
        split(tokenize(sql).unwrap())
            .iter()
            .map(|s| render(s))
            .collect()
    }

    #[test]
    fn test_split_on_semicolons() {
        assert_eq!(
            split_texts("SELECT 1; SELECT ';'; SELECT (2)"),
            vec!["SELECT 1;", " SELECT ';';", " SELECT (2)"]
        );
    }

    #[test]
    fn test_go_becomes_semicolon() {
        assert_eq!(
            split_texts("SELECT 1\nGO\nSELECT 2;\nGO\n"),
            vec!["SELECT 1;\n", "\nSELECT 2;", "\n", "\n"]
        );
    }

    #[test]
    fn test_go_after_semicolon_on_same_line() {
        assert_eq!(
            split_texts("SELECT a FROM t; GO\nSELECT b FROM u"),
            vec!["SELECT a FROM t;", " ", "\nSELECT b FROM u"]
        );
    }

    #[test]
    fn test_session_statements_end_at_line_end() {
        assert_eq!(
            split_texts("SET NOCOUNT ON\nUSE mydb\nSELECT b FROM u"),
            vec!["SET NOCOUNT ON", "\nUSE mydb", "\nSELECT b FROM u"]
        );
        assert_eq!(
            split_texts("SELECT a FROM t\nSET XACT_ABORT ON SELECT 1"),
            vec!["SELECT a FROM t\n", "SET XACT_ABORT ON ", "SELECT 1"]
        );
    }

    #[test]
    fn test_update_set_is_not_a_session_statement() {
        assert_eq!(split_texts("UPDATE t\nSET Language = 'en'\nWHERE id = 1").len(), 1);
    }

    #[test]
    fn test_go_inside_line_is_not_a_separator() {
        assert_eq!(split_texts("SELECT go FROM t").len(), 1);
    }

    #[test]
    fn test_session_statements_commented_out() {
        let (sql, notes) = clean("SET NOCOUNT ON;");
        assert_eq!(sql, "/* SET NOCOUNT ON; */");
        assert_eq!(notes[0].code, NoteCode::StatementRemoved);

        let (sql, _) = clean("\nUSE [Sales]\n");
        assert_eq!(sql, "\n/* USE [Sales] */\n");

        let (sql, notes) = clean("SET @x = 1");
        assert_eq!(sql, "SET @x = 1");
        assert!(notes.is_empty());
    }

    #[test]
    fn test_table_hints_removed() {
        let (sql, notes) = clean("SELECT * FROM t WITH (NOLOCK) JOIN u (NOLOCK) ON t.id = u.id");
        assert_eq!(sql, "SELECT * FROM t JOIN u ON t.id = u.id");
        assert_eq!(notes.len(), 2);
        assert!(notes.iter().all(|n| n.code == NoteCode::HintRemoved));
    }

    #[test]
    fn test_query_hint_removed() {
        let (sql, _) = clean("SELECT a FROM t OPTION (RECOMPILE);");
        assert_eq!(sql, "SELECT a FROM t;");
    }

    #[test]
    fn test_cte_with_is_not_a_hint() {
        let (sql, notes) = clean("WITH x (a) AS (SELECT 1) SELECT a FROM x");
        assert_eq!(sql, "WITH x (a) AS (SELECT 1) SELECT a FROM x");
        assert!(notes.is_empty());
    }

    #[test]
    fn test_top_to_limit() {
        assert_eq!(
            clean("SELECT TOP 10 a FROM t ORDER BY a;").0,
            "SELECT a FROM t ORDER BY a LIMIT 10;"
        );
        assert_eq!(
            clean("SELECT DISTINCT TOP (5) a FROM t").0,
            "SELECT DISTINCT a FROM t LIMIT 5"
        );
        assert_eq!(
            clean("SELECT * FROM (SELECT TOP 1 a FROM t ORDER BY a) x").0,
            "SELECT * FROM (SELECT a FROM t ORDER BY a LIMIT 1) x"
        );
    }

    #[test]
    fn test_top_percent_unsupported() {
        let (sql, notes) = clean("SELECT TOP 10 PERCENT a FROM t");
        assert_eq!(sql, "SELECT TOP 10 PERCENT a FROM t");
        assert_eq!(notes[0].code, NoteCode::UnsupportedConstruct);
    }
}
