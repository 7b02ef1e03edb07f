//! The public conversion API: dialect routing, batches and reports.

use lakeshift::prelude::*;

const M_ORDERS: &str = r#"let
    Source = Sql.Database("srv", "main"),
    Orders = Source{[Schema="dbo",Item="Orders"]}[Data],
    Kept = Table.SelectColumns(Orders, {"OrderId", "Amount"})
in
    Kept"#;

#[test]
fn test_fabric_matches_tsql_with_passthrough_note() {
    let context = ConversionContext::new("cat", "dbo");
    let sql = "SELECT TOP 3 ISNULL(Amount, 0) FROM [dbo].[Sales] WITH (NOLOCK)";
    let tsql = convert(sql, SourceDialect::TSql, &context);
    let fabric = convert(sql, SourceDialect::Fabric, &context);

    assert_eq!(fabric.output_sql, tsql.output_sql);
    assert_eq!(fabric.dialect, SourceDialect::Fabric);
    assert_eq!(fabric.notes.len(), tsql.notes.len() + 1);
    let last = fabric.notes.last().unwrap();
    assert_eq!(last.code, NoteCode::FabricPassthrough);
    assert_eq!(last.severity, Severity::Info);
}

#[test]
fn test_dialect_routes_parser() {
    let context = ConversionContext::default();
    let as_m = convert(M_ORDERS, SourceDialect::PowerQuery, &context);
    assert_eq!(
        as_m.output_sql.as_deref(),
        Some("SELECT\n  OrderId,\n  Amount\nFROM main.dbo.Orders;")
    );

    let as_tsql = convert("SELECT ISNULL(a, 0) FROM Orders", SourceDialect::TSql, &context);
    assert_eq!(as_tsql.dialect, SourceDialect::TSql);
    assert_eq!(
        as_tsql.output_sql.as_deref(),
        Some("SELECT COALESCE(a, 0) FROM main.dbo.Orders")
    );
}

#[test]
fn test_batch_isolates_failures() {
    let context = ConversionContext::new("cat", "dbo");
    let results = convert_batch(
        [
            ("let A = Table.Distinct(A) in A", SourceDialect::PowerQuery),
            ("SELECT LEN(Name) FROM Customer", SourceDialect::TSql),
            ("SELECT [broken", SourceDialect::Fabric),
            (M_ORDERS, SourceDialect::PowerQuery),
        ],
        &context,
    );
    assert_eq!(results.len(), 4);
    assert!(!results[0].succeeded());
    assert_eq!(results[0].notes[0].code, NoteCode::CyclicStepDependency);
    assert_eq!(
        results[1].output_sql.as_deref(),
        Some("SELECT LENGTH(Name) FROM cat.dbo.Customer")
    );
    assert!(!results[2].succeeded());
    assert_eq!(results[2].notes.len(), 1);
    assert!(results[3].succeeded());
}

#[test]
fn test_conversion_is_deterministic() {
    let context = ConversionContext::default();
    let first = convert(M_ORDERS, SourceDialect::PowerQuery, &context);
    let second = convert(M_ORDERS, SourceDialect::PowerQuery, &context);
    assert_eq!(first, second);
}

#[test]
fn test_json_report_shape() {
    let context = ConversionContext::default();
    let result = convert(
        "SELECT CONVERT(VARCHAR(10), d, 103) FROM t",
        SourceDialect::TSql,
        &context,
    );
    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["dialect"], "tsql");
    assert_eq!(json["incomplete"], false);
    assert_eq!(json["output_sql"], "SELECT CAST(d AS STRING) FROM main.dbo.t");
    assert_eq!(json["notes"][0]["code"], "STYLE_DROPPED");
    assert_eq!(json["notes"][0]["position"]["line"], 1);

    let m = convert("let X = 1 in Y", SourceDialect::PowerQuery, &context);
    let json = serde_json::to_value(&m).unwrap();
    assert_eq!(json["dialect"], "m");
    assert!(json["output_sql"].is_null());
    assert_eq!(json["notes"][0]["severity"], "error");
}

#[test]
fn test_emitted_sql_passes_syntax_check() {
    let context = ConversionContext::new("cat", "dbo");
    let validator = SyntaxValidator::lenient();

    let m = convert(M_ORDERS, SourceDialect::PowerQuery, &context);
    assert_eq!(
        validator.validate(m.output_sql.as_deref().unwrap(), &Databricks),
        ValidationOutcome::Passed
    );

    let select = convert(
        "SELECT ISNULL(a, 0) AS a FROM [dbo].[T] ORDER BY a",
        SourceDialect::TSql,
        &context,
    );
    assert_eq!(
        validator.validate(select.output_sql.as_deref().unwrap(), &Databricks),
        ValidationOutcome::Passed
    );

    let ddl = convert(
        "CREATE TABLE T (id INT IDENTITY(1,1), v INT)",
        SourceDialect::TSql,
        &context,
    );
    let outcome = validator.validate(ddl.output_sql.as_deref().unwrap(), &Databricks);
    assert!(!outcome.is_failed(), "{:?}", outcome);
}

#[test]
fn test_settings_feed_context() {
    let settings = Settings::from_toml(
        "[defaults]\ncatalog = \"lake\"\nschema = \"sales\"\n\n[staging]\nschema = \"landing\"\n",
    )
    .unwrap();
    let context = settings.context(None).unwrap();
    let result = convert("SELECT * FROM Orders", SourceDialect::TSql, &context);
    assert_eq!(result.output_sql.as_deref(), Some("SELECT * FROM lake.sales.Orders"));
}
