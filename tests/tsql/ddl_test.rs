//! CREATE TABLE conversion to Delta tables.

use lakeshift::{convert, ConversionContext, NoteCode, SourceDialect};

const ORDERS: &str = "CREATE TABLE [dbo].[Orders] (
    [OrderId] INT IDENTITY(1,1) PRIMARY KEY,
    [CustomerId] INT NOT NULL REFERENCES dbo.Customer (Id),
    [Amount] MONEY,
    [Note] NVARCHAR(MAX),
    [IsPaid] BIT NOT NULL,
    [CreatedAt] DATETIME2 DEFAULT GETDATE(),
    [RowGuid] UNIQUEIDENTIFIER DEFAULT NEWID()
) ON [PRIMARY];";

fn convert_orders() -> (String, Vec<NoteCode>) {
    let result = convert(ORDERS, SourceDialect::TSql, &ConversionContext::new("cat", "dbo"));
    let codes = result.notes.iter().map(|n| n.code).collect();
    (result.output_sql.expect("converted"), codes)
}

#[test]
fn test_table_name_and_format() {
    let (sql, _) = convert_orders();
    assert!(sql.starts_with("CREATE TABLE cat.dbo.Orders ("), "{}", sql);
    assert!(sql.ends_with(") USING DELTA;"), "{}", sql);
    assert!(!sql.contains("[PRIMARY]"), "{}", sql);
}

#[test]
fn test_column_types() {
    let (sql, _) = convert_orders();
    assert!(sql.contains("Amount DECIMAL(19,4)"), "{}", sql);
    assert!(sql.contains("Note STRING"), "{}", sql);
    assert!(sql.contains("IsPaid BOOLEAN"), "{}", sql);
    assert!(sql.contains("CreatedAt TIMESTAMP"), "{}", sql);
    assert!(sql.contains("RowGuid STRING"), "{}", sql);
    assert!(!sql.contains("NVARCHAR"), "{}", sql);
}

#[test]
fn test_identity_and_defaults() {
    let (sql, _) = convert_orders();
    assert!(
        sql.contains("OrderId INT GENERATED ALWAYS AS IDENTITY (START WITH 1 INCREMENT BY 1) /* PRIMARY KEY */"),
        "{}",
        sql
    );
    assert!(sql.contains("DEFAULT CURRENT_TIMESTAMP()"), "{}", sql);
    assert!(sql.contains("DEFAULT UUID()"), "{}", sql);
}

#[test]
fn test_constraints_demoted_to_comments() {
    let (sql, codes) = convert_orders();
    assert!(sql.contains("IsPaid BOOLEAN /* NOT NULL */"), "{}", sql);
    assert!(sql.contains("/* REFERENCES"), "{}", sql);
    assert!(codes.iter().filter(|c| **c == NoteCode::ConstraintDemoted).count() >= 3);
    assert!(codes.contains(&NoteCode::HintRemoved));
}

#[test]
fn test_unmapped_type_kept_with_note() {
    let result = convert(
        "CREATE TABLE Places (Id INT, Shape GEOGRAPHY)",
        SourceDialect::TSql,
        &ConversionContext::default(),
    );
    let sql = result.output_sql.as_deref().unwrap();
    assert!(sql.contains("Shape GEOGRAPHY"), "{}", sql);
    assert!(result.notes.iter().any(|n| n.code == NoteCode::UnmappedType));
}
