//! Converting already converted output changes nothing.

use lakeshift::{convert, ConversionContext, SourceDialect};

fn once(sql: &str) -> String {
    convert(sql, SourceDialect::TSql, &ConversionContext::new("cat", "dbo"))
        .output_sql
        .unwrap_or_else(|| panic!("failed to convert {}", sql))
}

fn assert_fixed_point(sql: &str) {
    let first = once(sql);
    let second = once(&first);
    assert_eq!(first, second, "second pass changed the output of {}", sql);
}

#[test]
fn test_select_is_stable() {
    assert_fixed_point(
        "SELECT TOP 5 [c].[Name], ISNULL(c.Region, 'n/a') AS Region\n\
         FROM [dbo].[Customer] c WITH (NOLOCK)\n\
         WHERE c.CreatedAt > DATEADD(day, -7, GETDATE())\n\
         ORDER BY c.Name;",
    );
}

#[test]
fn test_functions_are_stable() {
    assert_fixed_point("SELECT LEN(Name), DATEDIFF(day, a, b), NEWID(), CAST(GETDATE() AS DATE) FROM t");
    assert_fixed_point("SELECT DATEADD(month, @n, d), DATEPART(dw, d) FROM [Sales].[dbo].[Fact]");
}

#[test]
fn test_ddl_is_stable() {
    assert_fixed_point(
        "CREATE TABLE [dbo].[Orders] (\n\
         [OrderId] BIGINT IDENTITY(1,1) NOT NULL,\n\
         [Amount] MONEY NOT NULL,\n\
         [Name] NVARCHAR(100) CONSTRAINT df_n DEFAULT 'x',\n\
         CONSTRAINT pk_orders PRIMARY KEY CLUSTERED ([OrderId] ASC)\n\
         ) ON [PRIMARY];",
    );
}

#[test]
fn test_session_statements_are_stable() {
    assert_fixed_point("SET NOCOUNT ON;\nGO\nSELECT a FROM t OPTION (RECOMPILE);\n");
}

#[test]
fn test_databricks_input_is_untouched() {
    let sql = "SELECT COALESCE(a, 0) AS a FROM cat.dbo.t WHERE d > CURRENT_TIMESTAMP() - INTERVAL 1 DAYS LIMIT 3;";
    assert_eq!(once(sql), sql);
}
