//! T-SQL scripts through the full rewrite pipeline.

use lakeshift::{convert, ConversionContext, ConversionResult, NoteCode, Severity, SourceDialect};

fn run(sql: &str) -> ConversionResult {
    convert(sql, SourceDialect::TSql, &ConversionContext::new("cat", "dbo"))
}

fn output(result: &ConversionResult) -> &str {
    result
        .output_sql
        .as_deref()
        .unwrap_or_else(|| panic!("conversion failed: {:?}", result.notes))
}

#[test]
fn test_reporting_query() {
    let result = run("SELECT TOP 5 [c].[Name], ISNULL(c.Region, 'n/a') AS Region\n\
         FROM [dbo].[Customer] c WITH (NOLOCK)\n\
         WHERE c.CreatedAt > DATEADD(day, -7, GETDATE())\n\
         ORDER BY c.Name;");
    assert_eq!(
        output(&result),
        "SELECT c.Name, COALESCE(c.Region, 'n/a') AS Region\n\
         FROM cat.dbo.Customer c\n\
         WHERE c.CreatedAt > CURRENT_TIMESTAMP() - INTERVAL 7 DAYS\n\
         ORDER BY c.Name LIMIT 5;"
    );
    assert_eq!(result.notes.len(), 1);
    assert_eq!(result.notes[0].code, NoteCode::HintRemoved);
    assert!(!result.incomplete);
}

#[test]
fn test_dateadd_negative_month() {
    let result = run("SELECT DATEADD(month, -3, OrderDate) AS Cutoff FROM Orders");
    assert_eq!(
        output(&result),
        "SELECT OrderDate - INTERVAL 3 MONTHS AS Cutoff FROM cat.dbo.Orders"
    );
}

#[test]
fn test_comments_and_strings_survive() {
    let source = "SELECT 'GETDATE()' AS label -- ISNULL(x, y)\nFROM t /* [dbo].[x] */";
    let result = run(source);
    assert_eq!(
        output(&result),
        "SELECT 'GETDATE()' AS label -- ISNULL(x, y)\nFROM cat.dbo.t /* [dbo].[x] */"
    );
    assert!(result.notes.is_empty());
}

#[test]
fn test_arity_mismatch_is_noted_not_fatal() {
    let result = run("SELECT 1;\nSELECT ISNULL(a) FROM t;");
    let sql = output(&result);
    assert!(sql.contains("ISNULL(a)"), "{}", sql);
    assert_eq!(result.notes.len(), 1);
    assert_eq!(result.notes[0].code, NoteCode::UnsupportedConstruct);
    let pos = result.notes[0].position.unwrap();
    assert_eq!((pos.line, pos.column), (2, 8));
}

#[test]
fn test_unterminated_bracket_is_fatal() {
    let result = run("SELECT a\nFROM [dbo].[Orders");
    assert!(!result.succeeded());
    assert_eq!(result.notes.len(), 1);
    let note = &result.notes[0];
    assert_eq!(note.code, NoteCode::UnterminatedBracket);
    assert_eq!(note.severity, Severity::Error);
    let pos = note.position.unwrap();
    assert_eq!((pos.line, pos.column), (2, 12));
}

#[test]
fn test_unterminated_string_is_fatal() {
    let result = run("SELECT 'open FROM t");
    assert!(!result.succeeded());
    assert_eq!(result.notes.len(), 1);
    assert_eq!(result.notes[0].code, NoteCode::MalformedLiteral);
}

#[test]
fn test_batch_separators_and_session_statements() {
    let result = run("SET NOCOUNT ON;\nGO\nUSE [Sales]\nGO\nSELECT ISNULL(a, 0) FROM [dbo].[T]\nGO\n");
    let sql = output(&result);
    assert!(sql.contains("/* SET NOCOUNT ON; */"), "{}", sql);
    assert!(sql.contains("/* USE [Sales]"), "{}", sql);
    assert!(sql.contains("SELECT COALESCE(a, 0) FROM cat.dbo.T"), "{}", sql);
    assert!(!sql.contains("GO"), "{}", sql);
    assert_eq!(
        result
            .notes
            .iter()
            .filter(|n| n.code == NoteCode::StatementRemoved)
            .count(),
        2
    );
}

#[test]
fn test_session_statements_without_separators() {
    let result = run("SET NOCOUNT ON\nUSE mydb\nSELECT b FROM u");
    assert_eq!(
        output(&result),
        "/* SET NOCOUNT ON */\n/* USE mydb */\nSELECT b FROM cat.dbo.u"
    );
    assert_eq!(result.notes.len(), 2);
    assert!(result.notes.iter().all(|n| n.code == NoteCode::StatementRemoved));
}

#[test]
fn test_go_after_semicolon() {
    let result = run("SELECT a FROM t; GO\nSELECT b FROM u;");
    let sql = output(&result);
    assert!(!sql.contains("GO"), "{}", sql);
    assert!(sql.contains("SELECT a FROM cat.dbo.t;"), "{}", sql);
    assert!(sql.contains("SELECT b FROM cat.dbo.u;"), "{}", sql);
}

#[test]
fn test_convert_style_dropped() {
    let result = run("SELECT CONVERT(VARCHAR(10), OrderDate, 103) FROM Orders");
    assert_eq!(
        output(&result),
        "SELECT CAST(OrderDate AS STRING) FROM cat.dbo.Orders"
    );
    assert_eq!(result.notes[0].code, NoteCode::StyleDropped);
}

#[test]
fn test_three_part_name_replaces_database() {
    let result = run("INSERT INTO Sales.dbo.Fact (a) SELECT GETDATE()");
    assert_eq!(
        output(&result),
        "INSERT INTO cat.dbo.Fact (a) SELECT CURRENT_TIMESTAMP()"
    );
    assert_eq!(result.notes[0].code, NoteCode::CatalogReplaced);
}

#[test]
fn test_context_schema_for_bare_names() {
    let context = ConversionContext::new("lake", "sales");
    let result = convert("SELECT * FROM Orders o JOIN [Customer] c ON o.cid = c.id", SourceDialect::TSql, &context);
    assert_eq!(
        result.output_sql.as_deref(),
        Some("SELECT * FROM lake.sales.Orders o JOIN lake.sales.Customer c ON o.cid = c.id")
    );
}
