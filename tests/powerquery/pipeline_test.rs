//! End-to-end compilation of M queries to Databricks SQL.

use lakeshift::{convert, ConversionContext, ConversionResult, NoteCode, Severity, SourceDialect};

fn compile(src: &str) -> ConversionResult {
    convert(src, SourceDialect::PowerQuery, &ConversionContext::default())
}

fn sql(result: &ConversionResult) -> &str {
    result
        .output_sql
        .as_deref()
        .unwrap_or_else(|| panic!("conversion failed: {:?}", result.notes))
}

fn assert_clause_order(sql: &str, clauses: &[&str]) {
    let positions: Vec<usize> = clauses
        .iter()
        .map(|c| sql.find(c).unwrap_or_else(|| panic!("missing {} in\n{}", c, sql)))
        .collect();
    assert!(positions.windows(2).all(|w| w[0] < w[1]), "clause order in\n{}", sql);
}

const OPPORTUNITIES: &str = r#"let
    Source = Salesforce.Data("https://login.salesforce.com/", [ApiVersion=48]),
    Opportunity = Source{[Name="Opportunity"]}[Data],
    #"Removed Other Columns" = Table.SelectColumns(Opportunity,{"Id", "Name", "Amount", "CreatedDate"}),
    #"Filtered Rows" = Table.SelectRows(#"Removed Other Columns", each Date.IsInPreviousNDays([CreatedDate], 365)),
    #"Changed Type" = Table.TransformColumnTypes(#"Filtered Rows",{{"Amount", Currency.Type}, {"CreatedDate", type datetime}}),
    #"Sorted Rows" = Table.Sort(#"Changed Type",{{"CreatedDate", Order.Descending}})
in
    #"Sorted Rows""#;

#[test]
fn test_filter_cast_sort_pipeline() {
    let result = compile(OPPORTUNITIES);
    let sql = sql(&result);

    assert_clause_order(sql, &["SELECT", "FROM", "WHERE", "ORDER BY"]);
    assert!(sql.contains("FROM main.staging.opportunity"), "{}", sql);
    assert!(sql.contains("WHERE CreatedDate >= CURRENT_DATE() - INTERVAL 365 DAYS"), "{}", sql);
    assert!(sql.contains("ORDER BY CreatedDate DESC"), "{}", sql);
    assert!(sql.contains("CAST(Amount AS DECIMAL(19,4)) AS Amount"), "{}", sql);
    assert!(sql.contains("CAST(CreatedDate AS TIMESTAMP) AS CreatedDate"), "{}", sql);
    assert!(sql.ends_with(';'));
    assert_eq!(sql.matches("SELECT").count(), 1);

    assert!(!result.incomplete);
    assert_eq!(result.notes.len(), 1);
    assert_eq!(result.notes[0].code, NoteCode::ExternalSourceAssumed);
    assert_eq!(result.notes[0].severity, Severity::Warning);
}

#[test]
fn test_staging_schema_from_context() {
    let context = ConversionContext::new("lake", "dbo").with_staging_schema("landing");
    let result = convert(OPPORTUNITIES, SourceDialect::PowerQuery, &context);
    assert!(sql(&result).contains("FROM lake.landing.opportunity"));
}

#[test]
fn test_group_then_filter_becomes_having() {
    let result = compile(
        r#"let
    Source = Sql.Database("srv", "main"),
    Orders = Source{[Schema="sales",Item="Orders"]}[Data],
    Grouped = Table.Group(Orders, {"Region"}, {{"Total", each List.Sum([Amount]), type number}, {"OrderCount", each Table.RowCount(_), Int64.Type}}),
    Big = Table.SelectRows(Grouped, each [Total] > 1000),
    Sorted = Table.Sort(Big, {{"Total", Order.Descending}}),
    Top = Table.FirstN(Sorted, 5)
in
    Top"#,
    );
    let sql = sql(&result);

    assert_clause_order(sql, &["SELECT", "FROM", "GROUP BY", "HAVING", "ORDER BY", "LIMIT"]);
    assert!(sql.contains("SUM(Amount) AS Total"), "{}", sql);
    assert!(sql.contains("COUNT(*) AS OrderCount"), "{}", sql);
    assert!(sql.contains("FROM main.sales.Orders"), "{}", sql);
    assert!(sql.contains("GROUP BY Region"), "{}", sql);
    assert!(sql.contains("HAVING SUM(Amount) > 1000"), "{}", sql);
    assert!(sql.contains("ORDER BY Total DESC"), "{}", sql);
    assert!(sql.contains("LIMIT 5"), "{}", sql);
    assert!(!sql.contains("WHERE"));
    assert!(result.notes.is_empty(), "{:?}", result.notes);
}

#[test]
fn test_filters_are_conjoined() {
    let result = compile(
        r#"let
    Source = Sql.Database("srv", "main"),
    T = Source{[Schema="dbo",Item="Customer"]}[Data],
    Active = Table.SelectRows(T, each [IsActive] = true and [Region] <> null),
    Named = Table.SelectRows(Active, each Text.StartsWith([Name], "A"))
in
    Named"#,
    );
    let sql = sql(&result);
    assert!(
        sql.contains("WHERE IsActive = true AND Region IS NOT NULL AND STARTSWITH(Name, 'A')"),
        "{}",
        sql
    );
}

#[test]
fn test_untranslatable_condition_dropped() {
    let result = compile(
        r#"let
    Source = Sql.Database("srv", "main"),
    T = Source{[Schema="dbo",Item="Customer"]}[Data],
    F = Table.SelectRows(T, each [Score] > 3 and Custom.IsVip([Id]))
in
    F"#,
    );
    let sql = sql(&result);
    assert!(sql.contains("WHERE Score > 3"), "{}", sql);
    assert!(!sql.contains("IsVip"));
    assert!(result.incomplete);
    assert_eq!(result.count(Severity::Unsupported), 1);
}

#[test]
fn test_unknown_step_degrades() {
    let result = compile(
        r#"let
    Source = Sql.Database("srv", "main"),
    T = Source{[Schema="dbo",Item="Orders"]}[Data],
    Added = Table.AddColumn(T, "Net", each [Gross] - [Tax]),
    Kept = Table.SelectColumns(Added, {"Id", "Gross"})
in
    Kept"#,
    );
    let sql = sql(&result);
    assert!(sql.contains("Id,\n  Gross\nFROM main.dbo.Orders"), "{}", sql);
    assert!(result.incomplete);
    let note = &result.notes[0];
    assert_eq!(note.code, NoteCode::UnsupportedConstruct);
    assert!(note.message.contains("Added"));
    assert_eq!(note.position.map(|p| p.line), Some(4));
}

#[test]
fn test_rename_and_remove_on_all_columns() {
    let result = compile(
        r#"let
    Source = Sql.Database("srv", "main"),
    T = Source{[Schema="dbo",Item="Customer"]}[Data],
    Renamed = Table.RenameColumns(T, {{"Cust Name", "CustomerName"}}),
    Trimmed = Table.RemoveColumns(Renamed, {"Notes"})
in
    Trimmed"#,
    );
    let sql = sql(&result);
    assert!(sql.contains("* EXCEPT (`Cust Name`, Notes)"), "{}", sql);
    assert!(sql.contains("`Cust Name` AS CustomerName"), "{}", sql);
    assert!(!result.incomplete);
}

#[test]
fn test_filter_sees_through_rename() {
    let result = compile(
        r#"let
    Source = Sql.Database("srv", "main"),
    T = Source{[Schema="dbo",Item="Customer"]}[Data],
    Kept = Table.SelectColumns(T, {"Id", "Cust Name"}),
    Renamed = Table.RenameColumns(Kept, {"Cust Name", "CustomerName"}),
    F = Table.SelectRows(Renamed, each [CustomerName] <> "")
in
    F"#,
    );
    let sql = sql(&result);
    assert!(sql.contains("`Cust Name` AS CustomerName"), "{}", sql);
    assert!(sql.contains("WHERE `Cust Name` <> ''"), "{}", sql);
}

#[test]
fn test_native_query_is_converted() {
    let result = compile(
        r#"let
    Source = Sql.Database("srv", "main", [Query="SELECT TOP 10 OrderId, ISNULL(Amount, 0) AS Amount FROM dbo.Orders"]),
    Sorted = Table.Sort(Source, {{"Amount", Order.Descending}})
in
    Sorted"#,
    );
    let sql = sql(&result);
    assert!(sql.contains("COALESCE(Amount, 0) AS Amount"), "{}", sql);
    assert!(sql.contains("main.dbo.Orders"), "{}", sql);
    assert!(sql.contains("LIMIT 10"), "{}", sql);
    assert!(sql.contains(") AS src"), "{}", sql);
    assert!(sql.contains("ORDER BY Amount DESC"), "{}", sql);
}

#[test]
fn test_native_query_lexer_error_is_fatal() {
    let src = "let\n    Source = Sql.Database(\"srv\", \"db\", [Query=\"SELECT [x FROM t\"])\nin\n    Source";
    let result = compile(src);
    assert!(!result.succeeded());
    assert_eq!(result.notes.len(), 1);
    assert_eq!(result.notes[0].code, NoteCode::UnterminatedBracket);
    assert_eq!(result.notes[0].position.map(|p| p.line), Some(2));
}

#[test]
fn test_database_without_table_is_incomplete() {
    let result = compile(r#"let Source = Sql.Database("srv", "Sales") in Source"#);
    assert!(result.succeeded());
    assert!(result.incomplete);
    assert!(result.notes.iter().any(|n| n.code == NoteCode::UnsupportedConstruct));
}

#[test]
fn test_distinct_and_first_n() {
    let result = compile(
        r#"let
    Source = Sql.Database("srv", "main"),
    T = Source{[Schema="dbo",Item="Orders"]}[Data],
    Regions = Table.SelectColumns(T, "Region"),
    D = Table.Distinct(Regions),
    F = Table.FirstN(D, 20),
    G = Table.FirstN(F, 50)
in
    G"#,
    );
    let sql = sql(&result);
    assert!(sql.starts_with("SELECT DISTINCT\n  Region"), "{}", sql);
    assert!(sql.contains("LIMIT 20"), "{}", sql);
}

#[test]
fn test_navigation_on_connector_call() {
    let result = compile(
        r#"let
    A = Sql.Database("srv", "main"){[Schema="dbo",Item="T"]}[Data],
    F = Table.SelectRows(A, each [a] = 1)
in
    F"#,
    );
    let first_sql = sql(&result);
    assert_clause_order(first_sql, &["SELECT", "FROM main.dbo.T", "WHERE a = 1"]);
    assert!(!result.incomplete, "{:?}", result.notes);

    let result = compile(
        r#"let Account = Salesforce.Data("https://login.salesforce.com/"){[Name="Account"]}[Data] in Account"#,
    );
    assert!(sql(&result).contains("FROM main.staging.account"), "{}", sql(&result));
    assert!(!result.incomplete);
    assert_eq!(result.notes.len(), 1);
    assert_eq!(result.notes[0].code, NoteCode::ExternalSourceAssumed);
}

#[test]
fn test_filter_after_first_n_wraps_subquery() {
    let result = compile(
        r#"let
    Source = Sql.Database("srv", "main"),
    T = Source{[Schema="dbo",Item="T"]}[Data],
    N = Table.FirstN(T, 10),
    F = Table.SelectRows(N, each [a] > 1)
in
    F"#,
    );
    let sql = sql(&result);
    assert_clause_order(sql, &["FROM (", "FROM main.dbo.T", "LIMIT 10", ") AS prev", "WHERE a > 1"]);
    assert_eq!(sql.matches("LIMIT").count(), 1);
    assert!(!result.incomplete);
}

#[test]
fn test_sort_after_first_n_wraps_subquery() {
    let result = compile(
        r#"let
    Source = Sql.Database("srv", "main"),
    T = Source{[Schema="dbo",Item="T"]}[Data],
    N = Table.FirstN(T, 10),
    S = Table.Sort(N, {{"a", Order.Descending}})
in
    S"#,
    );
    let sql = sql(&result);
    assert_clause_order(sql, &["LIMIT 10", ") AS prev", "ORDER BY a DESC"]);
}

#[test]
fn test_second_group_wraps_subquery() {
    let result = compile(
        r#"let
    Source = Sql.Database("srv", "main"),
    T = Source{[Schema="dbo",Item="Orders"]}[Data],
    ByCustomer = Table.Group(T, {"Region", "Customer"}, {{"Total", each List.Sum([Amount]), type number}}),
    ByRegion = Table.Group(ByCustomer, {"Region"}, {{"Best", each List.Max([Total]), type number}})
in
    ByRegion"#,
    );
    let sql = sql(&result);
    assert_clause_order(
        sql,
        &["MAX(Total) AS Best", "SUM(Amount) AS Total", "GROUP BY Region, Customer", ") AS prev", "GROUP BY Region;"],
    );
    assert!(!result.incomplete, "{:?}", result.notes);
}
