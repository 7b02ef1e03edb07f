//! Translation of M row functions to SQL expressions.
//!
//! Row functions are the `each ...` or `(r) => ...` arguments of
//! `Table.SelectRows` and `Table.Group`. Field access on the row becomes a
//! column reference; a supported set of library functions maps to Databricks
//! functions. Anything else is [`Untranslatable`] and the caller decides what
//! to drop.

use crate::sql::expr::{
    avg, cast, col, count, count_star, func, interval, lit_bool, lit_date, lit_float, lit_int,
    lit_null, lit_str, max, min, sum, BinaryOperator, Expr, ExprExt, UnaryOperator,
};

use super::ast::{MBinaryOp, MExpr, MUnaryOp};

/// An M expression with no SQL counterpart.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct Untranslatable(pub String);

type TranslateResult = Result<Expr, Untranslatable>;

fn untranslatable<T>(message: impl Into<String>) -> Result<T, Untranslatable> {
    Err(Untranslatable(message.into()))
}

/// Translates the body of one row function.
#[derive(Debug, Clone, Copy)]
pub struct Translator<'a> {
    /// The lambda parameter naming the row; `_` for `each`.
    row: &'a str,
    /// Whether `List.*` aggregates over columns are allowed.
    aggregates: bool,
}

impl<'a> Translator<'a> {
    /// Unpack `each body` or `(r) => body`.
    pub fn for_row_function(expr: &'a MExpr) -> Option<(Self, &'a MExpr)> {
        match expr {
            MExpr::Each(body) => Some((Self { row: "_", aggregates: false }, body)),
            MExpr::Lambda { params, body } if params.len() == 1 => Some((
                Self {
                    row: &params[0],
                    aggregates: false,
                },
                body,
            )),
            _ => None,
        }
    }

    /// Allow `List.Sum([Col])` style aggregates over the group's rows.
    pub fn grouped(mut self) -> Self {
        self.aggregates = true;
        self
    }

    pub fn translate(&self, expr: &MExpr) -> TranslateResult {
        match expr {
            MExpr::Null => Ok(lit_null()),
            MExpr::Bool(b) => Ok(lit_bool(*b)),
            MExpr::Number(_) => Ok(number(expr)),
            MExpr::Text(s) => Ok(lit_str(s)),
            MExpr::Field { target, field } => {
                if self.is_row(target.as_deref()) {
                    Ok(col(field))
                } else {
                    untranslatable(format!("field access [{}] on a value other than the row", field))
                }
            }
            MExpr::Binary { op, left, right } => self.binary(*op, left, right),
            MExpr::Unary {
                op: MUnaryOp::Not,
                expr,
            } => Ok(negate(self.translate(expr)?)),
            MExpr::Unary {
                op: MUnaryOp::Neg,
                expr,
            } => match expr.as_ref() {
                MExpr::Number(n) => Ok(number(&MExpr::Number(-n))),
                _ => Ok(Expr::UnaryOp {
                    op: UnaryOperator::Minus,
                    expr: Box::new(self.translate(expr)?),
                }),
            },
            MExpr::If {
                condition,
                then_branch,
                else_branch,
            } => Ok(Expr::Case {
                when_clauses: vec![(self.translate(condition)?, self.translate(then_branch)?)],
                else_clause: Some(Box::new(self.translate(else_branch)?)),
            }),
            MExpr::Call { function, args } => match function.as_ref() {
                MExpr::Ident(name) => self.call(name, args),
                MExpr::Intrinsic(name) => intrinsic(name, args),
                _ => untranslatable("call of a computed function"),
            },
            MExpr::Ident(name) if name == self.row => {
                untranslatable("the whole row used as a value")
            }
            MExpr::Ident(name) => untranslatable(format!("reference to {}", name)),
            MExpr::Intrinsic(name) => untranslatable(format!("{} without arguments", name)),
            MExpr::Type(_) => untranslatable("type value"),
            MExpr::List(_) => untranslatable("list value"),
            MExpr::Record(_) => untranslatable("record value"),
            MExpr::Item { .. } => untranslatable("item lookup"),
            MExpr::Each(_) | MExpr::Lambda { .. } => untranslatable("nested function"),
            MExpr::Try { .. } => untranslatable("try/otherwise"),
            MExpr::Let { .. } => untranslatable("let expression"),
        }
    }

    fn is_row(&self, target: Option<&MExpr>) -> bool {
        match target {
            None => true,
            Some(MExpr::Ident(name)) => name == self.row,
            Some(_) => false,
        }
    }

    fn binary(&self, op: MBinaryOp, left: &MExpr, right: &MExpr) -> TranslateResult {
        // `x = null` has no SQL comparison counterpart
        match (op, left, right) {
            (MBinaryOp::Eq, other, MExpr::Null) | (MBinaryOp::Eq, MExpr::Null, other) => {
                return Ok(self.translate(other)?.is_null())
            }
            (MBinaryOp::Ne, other, MExpr::Null) | (MBinaryOp::Ne, MExpr::Null, other) => {
                return Ok(self.translate(other)?.is_not_null())
            }
            _ => {}
        }
        let l = self.translate(left)?;
        let r = self.translate(right)?;
        let op = match op {
            MBinaryOp::Or => BinaryOperator::Or,
            MBinaryOp::And => BinaryOperator::And,
            MBinaryOp::Eq => BinaryOperator::Eq,
            MBinaryOp::Ne => BinaryOperator::Ne,
            MBinaryOp::Lt => BinaryOperator::Lt,
            MBinaryOp::Le => BinaryOperator::Lte,
            MBinaryOp::Gt => BinaryOperator::Gt,
            MBinaryOp::Ge => BinaryOperator::Gte,
            MBinaryOp::Add => BinaryOperator::Plus,
            MBinaryOp::Sub => BinaryOperator::Minus,
            MBinaryOp::Concat => BinaryOperator::Concat,
            MBinaryOp::Mul => BinaryOperator::Mul,
            MBinaryOp::Div => BinaryOperator::Div,
        };
        Ok(l.binary(op, r))
    }

    fn args(&self, name: &str, args: &[MExpr], arity: usize) -> Result<Vec<Expr>, Untranslatable> {
        if args.len() != arity {
            return untranslatable(format!(
                "{} with {} argument(s), expected {}",
                name,
                args.len(),
                arity
            ));
        }
        args.iter().map(|a| self.translate(a)).collect()
    }

    fn call(&self, name: &str, args: &[MExpr]) -> TranslateResult {
        if let Some(agg) = self.aggregate(name, args)? {
            return Ok(agg);
        }
        let renamed = |target: &str, arity: usize| -> TranslateResult {
            Ok(func(target, self.args(name, args, arity)?))
        };
        match name {
            "Text.Contains" | "Text.StartsWith" | "Text.EndsWith" => self.text_match(name, args),
            "Text.Upper" => renamed("UPPER", 1),
            "Text.Lower" => renamed("LOWER", 1),
            "Text.Trim" => renamed("TRIM", 1),
            "Text.Length" => renamed("LENGTH", 1),
            "Text.Start" => renamed("LEFT", 2),
            "Text.End" => renamed("RIGHT", 2),
            "Number.Round" => renamed("ROUND", args.len().clamp(1, 2)),
            "Number.Abs" => renamed("ABS", 1),
            "Date.Year" => renamed("YEAR", 1),
            "Date.Month" => renamed("MONTH", 1),
            "Date.Day" => renamed("DAY", 1),
            "Date.AddDays" => renamed("DATE_ADD", 2),
            "DateTime.LocalNow" | "DateTime.FixedLocalNow" | "DateTimeZone.UtcNow" => {
                self.args(name, args, 0)?;
                Ok(func("CURRENT_TIMESTAMP", vec![]))
            }
            "Date.From" | "DateTime.Date" => {
                let arg = self.args(name, args, 1)?.remove(0);
                Ok(to_date(arg))
            }
            "Date.IsInPreviousNDays" => self.previous_n(name, args, "DAYS"),
            "Date.IsInPreviousNWeeks" => self.previous_n(name, args, "WEEKS"),
            "Date.IsInPreviousNMonths" => self.previous_n(name, args, "MONTHS"),
            "Date.IsInPreviousNYears" => self.previous_n(name, args, "YEARS"),
            "Date.IsInCurrentYear" => {
                let d = self.args(name, args, 1)?.remove(0);
                Ok(func("YEAR", vec![d]).eq(func("YEAR", vec![func("CURRENT_DATE", vec![])])))
            }
            "List.Contains" => self.list_contains(args),
            _ => untranslatable(format!("function {}", name)),
        }
    }

    /// `Date.IsInPreviousNDays(d, n)` → `d >= CURRENT_DATE() - INTERVAL n DAYS`
    fn previous_n(&self, name: &str, args: &[MExpr], unit: &str) -> TranslateResult {
        let [date, n] = args else {
            return untranslatable(format!("{} with {} argument(s)", name, args.len()));
        };
        let Some(n) = n.as_integer() else {
            return untranslatable(format!("{} with a non-literal count", name));
        };
        if n <= 0 {
            return untranslatable(format!("{} with count {}", name, n));
        }
        Ok(self
            .translate(date)?
            .gte(func("CURRENT_DATE", vec![]).sub(interval(n, unit))))
    }

    fn text_match(&self, name: &str, args: &[MExpr]) -> TranslateResult {
        let target = match name {
            "Text.Contains" => "CONTAINS",
            "Text.StartsWith" => "STARTSWITH",
            _ => "ENDSWITH",
        };
        match args {
            [text, part] => Ok(func(target, vec![self.translate(text)?, self.translate(part)?])),
            [text, part, MExpr::Ident(comparer)] if comparer == "Comparer.OrdinalIgnoreCase" => {
                let lower = |e: Expr| func("LOWER", vec![e]);
                Ok(func(
                    target,
                    vec![lower(self.translate(text)?), lower(self.translate(part)?)],
                ))
            }
            _ => untranslatable(format!("{} with {} argument(s)", name, args.len())),
        }
    }

    /// `List.Contains({"a", "b"}, [Col])` → `Col IN ('a', 'b')`
    fn list_contains(&self, args: &[MExpr]) -> TranslateResult {
        let [MExpr::List(items), value] = args else {
            return untranslatable("List.Contains over a value other than a list literal");
        };
        let values = items
            .iter()
            .map(|i| self.translate(i))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Expr::In {
            expr: Box::new(self.translate(value)?),
            values,
            negated: false,
        })
    }

    /// Aggregates over the current group; `None` when `name` is not one.
    fn aggregate(&self, name: &str, args: &[MExpr]) -> Result<Option<Expr>, Untranslatable> {
        let build: fn(Expr) -> Expr = match name {
            "List.Sum" => sum,
            "List.Average" => avg,
            "List.Min" => min,
            "List.Max" => max,
            "List.Median" => |e| func("MEDIAN", vec![e]),
            "List.Count" | "List.NonNullCount" => count,
            "Table.RowCount" => {
                if !self.aggregates {
                    return untranslatable("Table.RowCount outside Table.Group");
                }
                return match args {
                    [arg] if self.is_row_table(arg) => Ok(Some(count_star())),
                    _ => untranslatable("Table.RowCount over a value other than the group"),
                };
            }
            _ => return Ok(None),
        };
        if !self.aggregates {
            return untranslatable(format!("{} outside Table.Group", name));
        }
        let [arg] = args else {
            return untranslatable(format!("{} with {} argument(s)", name, args.len()));
        };
        // List.Count(List.Distinct([Col])) → COUNT(DISTINCT Col)
        if name == "List.Count" {
            if let Some(("List.Distinct", [inner])) = arg.as_call() {
                return Ok(Some(Expr::Function {
                    name: "COUNT".into(),
                    args: vec![self.translate(inner)?],
                    distinct: true,
                }));
            }
        }
        Ok(Some(build(self.translate(arg)?)))
    }

    /// `_` or the lambda parameter, standing for the group's rows.
    fn is_row_table(&self, expr: &MExpr) -> bool {
        matches!(expr, MExpr::Ident(name) if name == self.row)
    }
}

fn number(expr: &MExpr) -> Expr {
    match (expr.as_integer(), expr) {
        (Some(n), _) => lit_int(n),
        (None, MExpr::Number(f)) => lit_float(*f),
        _ => lit_null(),
    }
}

/// `NOT`, folding into `IN` and `IS NULL` where SQL has a negated form.
fn negate(expr: Expr) -> Expr {
    match expr {
        Expr::In {
            expr,
            values,
            negated,
        } => Expr::In {
            expr,
            values,
            negated: !negated,
        },
        Expr::IsNull { expr, negated } => Expr::IsNull {
            expr,
            negated: !negated,
        },
        other => Expr::UnaryOp {
            op: UnaryOperator::Not,
            expr: Box::new(other),
        },
    }
}

fn to_date(expr: Expr) -> Expr {
    match &expr {
        Expr::Function { name, args, .. } if name == "CURRENT_TIMESTAMP" && args.is_empty() => {
            func("CURRENT_DATE", vec![])
        }
        _ => cast(expr, "DATE"),
    }
}

/// `#date(y, m, d)` and `#datetime(y, m, d, h, mi, s)` with literal parts.
fn intrinsic(name: &str, args: &[MExpr]) -> TranslateResult {
    let parts: Option<Vec<i64>> = args.iter().map(MExpr::as_integer).collect();
    match (name, parts.as_deref()) {
        ("#date", Some([y, m, d])) => Ok(lit_date(&format!("{:04}-{:02}-{:02}", y, m, d))),
        ("#datetime", Some([y, m, d, h, mi, s])) => Ok(Expr::Raw(format!(
            "TIMESTAMP '{:04}-{:02}-{:02} {:02}:{:02}:{:02}'",
            y, m, d, h, mi, s
        ))),
        _ => untranslatable(format!("{} with non-literal or missing parts", name)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::powerquery::parser::parse_expr;
    use crate::sql::Databricks;

    fn row(src: &str) -> Result<String, Untranslatable> {
        let expr = parse_expr(src).unwrap();
        let (t, body) = Translator::for_row_function(&expr).unwrap();
        t.translate(body).map(|e| e.to_sql(&Databricks))
    }

    fn grouped(src: &str) -> Result<String, Untranslatable> {
        let expr = parse_expr(src).unwrap();
        let (t, body) = Translator::for_row_function(&expr).unwrap();
        t.grouped().translate(body).map(|e| e.to_sql(&Databricks))
    }

    #[test]
    fn test_comparisons() {
        assert_eq!(
            row(r#"each [Region] = "EU" and [Amount] >= 100"#).unwrap(),
            "Region = 'EU' AND Amount >= 100"
        );
        assert_eq!(row("each [Closed] <> null").unwrap(), "Closed IS NOT NULL");
        assert_eq!(row("(r) => r[Qty] * 2 > 10").unwrap(), "Qty * 2 > 10");
    }

    #[test]
    fn test_previous_n_days() {
        assert_eq!(
            row("each Date.IsInPreviousNDays([CreatedDate], 365)").unwrap(),
            "CreatedDate >= CURRENT_DATE() - INTERVAL 365 DAYS"
        );
        assert_eq!(
            row("each Date.IsInPreviousNMonths([D], 3)").unwrap(),
            "D >= CURRENT_DATE() - INTERVAL 3 MONTHS"
        );
        let err = row("each Date.IsInPreviousNDays([D], -3)").unwrap_err();
        assert!(err.0.contains("count -3"), "{:?}", err);
        assert!(row("each Date.IsInPreviousNYears([D], 0)").is_err());
    }

    #[test]
    fn test_text_and_lists() {
        assert_eq!(
            row(r#"each Text.StartsWith([Name], "Ac")"#).unwrap(),
            "STARTSWITH(Name, 'Ac')"
        );
        assert_eq!(
            row(r#"each not List.Contains({"A", "B"}, [Tier])"#).unwrap(),
            "Tier NOT IN ('A', 'B')"
        );
        assert_eq!(
            row(r#"each [First] & " " & [Last] = "Ada Lovelace""#).unwrap(),
            "First || ' ' || Last = 'Ada Lovelace'"
        );
    }

    #[test]
    fn test_dates() {
        assert_eq!(
            row("each [D] >= #date(2024, 1, 5)").unwrap(),
            "D >= DATE '2024-01-05'"
        );
        assert_eq!(
            row("each [D] < Date.From(DateTime.LocalNow())").unwrap(),
            "D < CURRENT_DATE()"
        );
    }

    #[test]
    fn test_untranslatable() {
        assert!(row("each Text.Proper([Name]) = \"X\"").is_err());
        assert!(row("each [Rec][Field] = 1").is_err());
        assert!(row("each List.Sum([Amount]) > 1").is_err());
    }

    #[test]
    fn test_aggregates() {
        assert_eq!(grouped("each List.Sum([Amount])").unwrap(), "SUM(Amount)");
        assert_eq!(grouped("each Table.RowCount(_)").unwrap(), "COUNT(*)");
        assert_eq!(
            grouped("each List.Count(List.Distinct([Customer]))").unwrap(),
            "COUNT(DISTINCT Customer)"
        );
        assert_eq!(
            grouped("each List.Sum([Net]) / List.Sum([Qty])").unwrap(),
            "SUM(Net) / SUM(Qty)"
        );
    }
}
