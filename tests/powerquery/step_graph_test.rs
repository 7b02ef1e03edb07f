//! Step graph validation failures surface as single fatal notes.

use lakeshift::powerquery::{parser, MPipeline, StepKind};
use lakeshift::{convert, ConversionContext, ConvertError, NoteCode, Severity, SourceDialect};

fn fatal(src: &str) -> (NoteCode, String, Option<(usize, usize)>) {
    let result = convert(src, SourceDialect::PowerQuery, &ConversionContext::default());
    assert!(!result.succeeded(), "expected failure for {}", src);
    assert_eq!(result.notes.len(), 1);
    let note = &result.notes[0];
    assert_eq!(note.severity, Severity::Error);
    (
        note.code,
        note.message.clone(),
        note.position.map(|p| (p.line, p.column)),
    )
}

#[test]
fn test_declaration_order_is_not_execution_order() {
    // steps declared out of order are fine as long as references point back
    let src = r#"let
    Source = Sql.Database("srv", "main"),
    Orders = Source{[Schema="dbo",Item="Orders"]}[Data],
    Unused = Table.Distinct(Orders),
    Filtered = Table.SelectRows(Orders, each [Amount] > 0)
in
    Filtered"#;
    let pipeline = MPipeline::build(src, parser::parse(src).unwrap()).unwrap();
    let chain: Vec<&str> = pipeline.chain().iter().map(|s| s.name.as_str()).collect();
    assert_eq!(chain, vec!["Source", "Orders", "Filtered"]);
    assert_eq!(pipeline.step("Unused").map(|s| s.kind), Some(StepKind::Distinct));
    assert_eq!(pipeline.output(), "Filtered");
}

#[test]
fn test_cycle_is_fatal() {
    let (code, message, _) = fatal(
        "let\n    A = Table.Distinct(B),\n    B = Table.Distinct(A)\nin\n    A",
    );
    assert_eq!(code, NoteCode::CyclicStepDependency);
    assert!(message.contains("A -> B -> A") || message.contains("B -> A -> B"), "{}", message);
}

#[test]
fn test_self_reference_is_fatal() {
    let src = "let X = Table.Distinct(X) in X";
    let err = MPipeline::build(src, parser::parse(src).unwrap()).unwrap_err();
    assert_eq!(
        err,
        ConvertError::CyclicStepDependency {
            cycle: vec!["X".into(), "X".into()]
        }
    );
}

#[test]
fn test_undeclared_step_reference() {
    let (code, message, position) = fatal(
        "let\n    Source = Sql.Database(\"s\", \"d\"),\n    F = Table.SelectRows(Sourse, each true)\nin\n    F",
    );
    assert_eq!(code, NoteCode::UnresolvedStepReference);
    assert!(message.contains("Sourse"), "{}", message);
    assert_eq!(position, Some((3, 5)));
}

#[test]
fn test_output_must_be_a_step() {
    let (code, message, position) = fatal("let\n    A = 1\nin\n    B");
    assert_eq!(code, NoteCode::UnresolvedStepReference);
    assert_eq!(message, "Output step 'B' is not declared");
    assert_eq!(position, Some((4, 5)));
}

#[test]
fn test_syntax_error_position() {
    let (code, _, position) = fatal("let\n    A = Table.Distinct(,\nin\n    A");
    assert_eq!(code, NoteCode::MSyntaxError);
    assert_eq!(position.map(|(line, _)| line), Some(2));
}

#[test]
fn test_unterminated_text() {
    let (code, _, position) = fatal("let\n    A = \"open\nin\n    A");
    assert_eq!(code, NoteCode::MalformedLiteral);
    assert_eq!(position, Some((2, 9)));
}

#[test]
fn test_library_names_are_not_steps() {
    let src = r#"let
    Source = Excel.Workbook(File.Contents("C:\data\book.xlsx"), null, true),
    Sheet = Source{[Item="Sales",Kind="Sheet"]}[Data],
    Sorted = Table.Sort(Sheet, {{"Date", Order.Ascending}})
in
    Sorted"#;
    let result = convert(src, SourceDialect::PowerQuery, &ConversionContext::default());
    let sql = result.output_sql.expect("converted");
    assert!(sql.contains("FROM main.staging.sales"), "{}", sql);
    assert!(sql.contains("ORDER BY Date ASC"), "{}", sql);
}
