//! Identifier normalization.
//!
//! Dotted name chains in table positions (`FROM`, `JOIN`, `INTO`, `UPDATE`,
//! `TABLE`, `VIEW`, `REFERENCES`, ...) become Unity Catalog three-part names.
//! Chains anywhere else keep their shape and are only re-quoted: brackets and
//! double quotes are dropped, and backticks are applied when the name is
//! reserved or not a plain identifier.

use super::lexer::{enclosing_paren, next_significant, prev_significant, render, Token, TokenKind};
use super::rules::{glue, Rewrite, RuleContext};
use crate::notes::{Note, NoteCode};
use crate::sql::SqlDialect;

/// Resolve a multi-part name to `[catalog, schema, table]`.
///
/// The catalog always comes from the context. A database part in the source
/// is replaced and reported; a linked-server part is dropped and reported.
/// Chains longer than four parts cannot be resolved.
pub fn normalize(
    parts: &[String],
    default_catalog: &str,
    default_schema: &str,
) -> Result<([String; 3], Vec<Note>), Note> {
    let mut notes = Vec::new();
    let (server, database, schema, table) = match parts {
        [table] => (None, None, None, table),
        [schema, table] => (None, None, Some(schema), table),
        [database, schema, table] => (None, Some(database), Some(schema), table),
        [server, database, schema, table] => (Some(server), Some(database), Some(schema), table),
        _ => {
            return Err(Note::unsupported(format!(
                "name {} has more than four parts; left unchanged",
                parts.join(".")
            )))
        }
    };

    if let Some(server) = server.filter(|s| !s.is_empty()) {
        notes.push(Note::info(
            NoteCode::CatalogReplaced,
            format!("linked server {} dropped from {}", server, parts.join(".")),
        ));
    }
    if let Some(database) = database.filter(|d| !d.is_empty()) {
        if !database.eq_ignore_ascii_case(default_catalog) {
            notes.push(Note::info(
                NoteCode::CatalogReplaced,
                format!("database {} replaced by catalog {}", database, default_catalog),
            ));
        }
    }
    let schema = schema
        .filter(|s| !s.is_empty())
        .map(String::as_str)
        .unwrap_or(default_schema);

    Ok((
        [default_catalog.to_string(), schema.to_string(), table.clone()],
        notes,
    ))
}

/// Join name parts, quoting each only when the dialect requires it.
pub fn render_chain(parts: &[String], dialect: &dyn SqlDialect) -> String {
    parts
        .iter()
        .map(|p| dialect.render_identifier(p))
        .collect::<Vec<_>>()
        .join(".")
}

pub(crate) fn apply(tokens: &[Token], at: usize, ctx: &RuleContext<'_>) -> Option<Rewrite> {
    let tok = &tokens[at];
    if !tok.is_name() || tok.text.starts_with('@') || tok.text.starts_with('#') {
        return None;
    }
    if prev_significant(tokens, at).is_some_and(|p| tokens[p].is_punct(".")) {
        return None;
    }
    let (end, parts) = collect_chain(tokens, at)?;
    let original = render(&tokens[at..end]);
    let followed_by_paren = next_significant(tokens, end).is_some_and(|n| tokens[n].is_punct("("));

    if is_table_position(tokens, at, ctx) && !(parts.len() == 1 && ctx.statement.is_cte(&parts[0])) {
        let (qualified, notes) = match normalize(&parts, ctx.catalog, ctx.schema) {
            Ok(resolved) => resolved,
            Err(note) => return Some(Rewrite::notes_only(at, vec![note.at(tok.offset)])),
        };
        let text = render_chain(&qualified, ctx.dialect);
        let notes = notes.into_iter().map(|n| n.at(tok.offset)).collect();
        if text == original {
            return Some(Rewrite::notes_only(at, notes));
        }
        let mut rewrite = Rewrite::replace(at, end, glue(&text, tok.offset));
        rewrite.notes = notes;
        return Some(rewrite);
    }

    // Function names keep their spelling
    if followed_by_paren {
        return None;
    }
    let text = render_chain(&parts, ctx.dialect);
    if text == original {
        return None;
    }
    Some(Rewrite::replace(at, end, glue(&text, tok.offset)))
}

/// `a.b.c`, `[a].[b]`, `db..t` starting at `at`. Returns the end index and
/// the unescaped parts.
fn collect_chain(tokens: &[Token], at: usize) -> Option<(usize, Vec<String>)> {
    let mut parts = vec![tokens[at].value()];
    let mut i = at + 1;
    while i < tokens.len() && tokens[i].is_punct(".") {
        match tokens.get(i + 1) {
            Some(next) if next.is_punct(".") => {
                parts.push(String::new());
                i += 1;
            }
            Some(next)
                if !next.protected
                    && (next.is_name() || next.kind == TokenKind::Keyword) =>
            {
                parts.push(next.value());
                i += 2;
            }
            // `t.*` and trailing dots end the chain before the dot
            _ => break,
        }
    }
    // Skip a dangling `..` with no name after it
    if parts.last().is_some_and(String::is_empty) {
        return None;
    }
    let end = i;
    Some((end, parts))
}

const TABLE_INTRODUCERS: &[&str] = &["JOIN", "INTO", "UPDATE", "TABLE", "VIEW", "REFERENCES", "MERGE"];

/// Whether the chain at `at` names a table.
fn is_table_position(tokens: &[Token], at: usize, ctx: &RuleContext<'_>) -> bool {
    let Some(p) = prev_significant(tokens, at) else { return false };
    let prev = &tokens[p];
    if prev.is_any_word(TABLE_INTRODUCERS) {
        return true;
    }
    if prev.is_word("DELETE") {
        return true;
    }
    if prev.is_word("USING") {
        return ctx.statement.head_is("MERGE");
    }
    if prev.is_word("FROM") {
        return from_reads_table(tokens, p);
    }
    // DROP TABLE IF EXISTS t
    if prev.is_word("EXISTS") {
        return prev_significant(tokens, p).is_some_and(|q| tokens[q].is_word("IF"));
    }
    // FROM a, b
    if prev.is_punct(",") {
        return clause_before(tokens, p)
            .is_some_and(|k| tokens[k].is_word("FROM") && from_reads_table(tokens, k));
    }
    false
}

const CLAUSE_KEYWORDS: &[&str] = &[
    "SELECT", "FROM", "WHERE", "JOIN", "ON", "GROUP", "ORDER", "HAVING", "SET", "VALUES", "INTO",
    "UNION", "BY", "WITH", "USING", "UPDATE", "DELETE", "APPLY",
];

/// The nearest clause keyword before `at` at the same nesting depth.
fn clause_before(tokens: &[Token], at: usize) -> Option<usize> {
    let mut depth = 0usize;
    for i in (0..at).rev() {
        let tok = &tokens[i];
        if tok.is_punct(")") {
            depth += 1;
        } else if tok.is_punct("(") {
            if depth == 0 {
                return None;
            }
            depth -= 1;
        } else if depth == 0 {
            if tok.is_punct(";") {
                return None;
            }
            if tok.is_any_word(CLAUSE_KEYWORDS) {
                return Some(i);
            }
        }
    }
    None
}

/// `FROM` introduces a table only inside a query scope, not inside
/// `EXTRACT(YEAR FROM d)` or `OVERLAY(s PLACING r FROM 1)`.
fn from_reads_table(tokens: &[Token], from: usize) -> bool {
    let scope_start = enclosing_paren(tokens, from).map_or(0, |open| open + 1);
    let mut depth = 0usize;
    for i in (scope_start..from).rev() {
        let tok = &tokens[i];
        if tok.is_punct(")") {
            depth += 1;
        } else if tok.is_punct("(") {
            depth = depth.saturating_sub(1);
        } else if depth == 0 && tok.is_any_word(&["SELECT", "DELETE", "UPDATE"]) {
            return true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::Databricks;
    use crate::tsql::lexer::tokenize;
    use crate::tsql::rules::{apply_rules, RewriteRule, StatementInfo};

    fn rewrite(sql: &str) -> (String, Vec<Note>) {
        let tokens = tokenize(sql).unwrap();
        let info = StatementInfo::analyze(&tokens);
        let ctx = RuleContext {
            catalog: "cat",
            schema: "dbo",
            dialect: &Databricks,
            statement: &info,
        };
        let (tokens, notes) = apply_rules(tokens, RewriteRule::Identifier, &ctx);
        (render(&tokens), notes)
    }

    fn parts(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_normalize() {
        let (q, notes) = normalize(&parts(&["dbo", "Customer"]), "cat", "dbo").unwrap();
        assert_eq!(q, ["cat", "dbo", "Customer"]);
        assert!(notes.is_empty());

        let (q, _) = normalize(&parts(&["Customer"]), "cat", "sales").unwrap();
        assert_eq!(q, ["cat", "sales", "Customer"]);

        let (q, notes) = normalize(&parts(&["Legacy", "", "T"]), "cat", "dbo").unwrap();
        assert_eq!(q, ["cat", "dbo", "T"]);
        assert_eq!(notes[0].code, NoteCode::CatalogReplaced);

        let (q, notes) = normalize(&parts(&["srv", "db", "s", "t"]), "cat", "dbo").unwrap();
        assert_eq!(q, ["cat", "s", "t"]);
        assert_eq!(notes.len(), 2);

        assert!(normalize(&parts(&["a", "b", "c", "d", "e"]), "cat", "dbo").is_err());
    }

    #[test]
    fn test_bracketed_table() {
        let (sql, notes) = rewrite("SELECT * FROM [dbo].[Customer]");
        assert_eq!(sql, "SELECT * FROM cat.dbo.Customer");
        assert!(notes.is_empty());
    }

    #[test]
    fn test_bare_table_and_join() {
        assert_eq!(
            rewrite("SELECT c.Name FROM Customer c JOIN dbo.Orders o ON o.CustomerId = c.Id").0,
            "SELECT c.Name FROM cat.dbo.Customer c JOIN cat.dbo.Orders o ON o.CustomerId = c.Id"
        );
    }

    #[test]
    fn test_requote_only_outside_tables() {
        assert_eq!(
            rewrite("SELECT [c].[Order], [Order Date], [Amount] FROM t").0,
            "SELECT c.`Order`, `Order Date`, Amount FROM cat.dbo.t"
        );
    }

    #[test]
    fn test_comma_joined_tables() {
        assert_eq!(
            rewrite("SELECT a.x FROM A a, [B] b WHERE a.id = b.id").0,
            "SELECT a.x FROM cat.dbo.A a, cat.dbo.B b WHERE a.id = b.id"
        );
    }

    #[test]
    fn test_cte_temp_and_variables_skipped() {
        assert_eq!(
            rewrite("WITH recent AS (SELECT * FROM Orders) SELECT * FROM recent").0,
            "WITH recent AS (SELECT * FROM cat.dbo.Orders) SELECT * FROM recent"
        );
        assert_eq!(
            rewrite("SELECT @x INTO #tmp FROM #src").0,
            "SELECT @x INTO #tmp FROM #src"
        );
    }

    #[test]
    fn test_extract_from_is_not_a_table() {
        assert_eq!(
            rewrite("SELECT EXTRACT(YEAR FROM OrderDate) FROM t").0,
            "SELECT EXTRACT(YEAR FROM OrderDate) FROM cat.dbo.t"
        );
    }

    #[test]
    fn test_three_part_name_replaces_database() {
        let (sql, notes) = rewrite("INSERT INTO Sales.dbo.Fact (a) SELECT 1");
        assert_eq!(sql, "INSERT INTO cat.dbo.Fact (a) SELECT 1");
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].code, NoteCode::CatalogReplaced);
    }

    #[test]
    fn test_already_qualified_is_stable() {
        let (sql, notes) = rewrite("SELECT * FROM cat.dbo.Customer");
        assert_eq!(sql, "SELECT * FROM cat.dbo.Customer");
        assert!(notes.is_empty());
    }
}
