//! Compile a validated step chain into one Databricks SELECT.
//!
//! The chain is walked from source to output. Each step updates a
//! [`QueryState`]: the FROM target, the projection, filters, grouping,
//! ordering and limit. Steps with no SQL counterpart leave a note and are
//! skipped; the result is then marked incomplete.

use tracing::debug;

use super::ast::{MBinaryOp, MExpr};
use super::graph::{navigation_root, MPipeline, MStep, StepKind};
use super::predicate::{Translator, Untranslatable};
use super::MOutput;
use crate::convert::ConversionContext;
use crate::error::{ConvertError, ConvertResult};
use crate::mapping::map_m_type;
use crate::notes::{Note, NoteCode, NoteCollector};
use crate::sql::{
    and_all, cast, col, star_except, Databricks, Expr, FromItem, OrderByExpr, Query, SelectExpr,
    TableRef,
};
use crate::tsql::{self, identifiers};

/// Alias given to a converted native query.
const NATIVE_QUERY_ALIAS: &str = "src";

/// Alias given to the query so far when later steps must see its result rows.
const NESTED_QUERY_ALIAS: &str = "prev";

/// Compile the pipeline's output chain.
pub fn compile(
    pipeline: &MPipeline,
    context: &ConversionContext,
    notes: &mut NoteCollector<'_>,
) -> ConvertResult<MOutput> {
    let mut state = QueryState::new(context);
    for step in pipeline.chain() {
        debug!(step = %step.name, kind = %step.kind, "compiling m step");
        state.apply(step)?;
    }
    let (query, incomplete, step_notes) = state.finish();
    notes.extend(step_notes);
    Ok(MOutput {
        sql: format!("{};", query.to_sql(&Databricks)),
        incomplete,
    })
}

// =============================================================================
// Sources
// =============================================================================

/// Where rows come from, as far as the chain has resolved it.
#[derive(Debug, Clone, PartialEq)]
enum Origin {
    None,
    /// `Sql.Databases(server)`: a database still has to be picked.
    Server,
    /// `Sql.Database(server, db)`: a table still has to be picked.
    Database(String),
    /// Any other connector; its data is assumed staged in Databricks.
    External(String),
    Resolved(FromItem),
}

/// Staging table name for an external object: lowercase, spaces as `_`.
fn staging_name(object: &str) -> String {
    object.trim().to_lowercase().replace([' ', '.'], "_")
}

// =============================================================================
// Projection
// =============================================================================

/// One output column and the expression that computes it.
#[derive(Debug, Clone, PartialEq)]
struct ColumnDef {
    name: String,
    expr: Expr,
}

impl ColumnDef {
    fn plain(name: &str) -> Self {
        Self {
            name: name.into(),
            expr: col(name),
        }
    }

    fn select_expr(&self) -> SelectExpr {
        if self.expr == col(&self.name) {
            SelectExpr::new(self.expr.clone())
        } else {
            SelectExpr::new(self.expr.clone()).with_alias(&self.name)
        }
    }
}

/// The SELECT list under construction.
#[derive(Debug, Clone, PartialEq)]
enum Projection {
    /// All source columns, minus `except`, plus rewritten `extra` ones.
    Star {
        except: Vec<String>,
        extra: Vec<ColumnDef>,
    },
    /// An explicit column list.
    List(Vec<ColumnDef>),
}

impl Projection {
    fn find(&self, name: &str) -> Option<&ColumnDef> {
        match self {
            Projection::Star { extra: defs, .. } | Projection::List(defs) => {
                defs.iter().find(|d| d.name == name)
            }
        }
    }

    /// The expression for `name` in terms of source columns.
    fn resolve(&self, name: &str) -> Expr {
        self.find(name)
            .map(|d| d.expr.clone())
            .unwrap_or_else(|| col(name))
    }

    fn select(&mut self, names: &[String]) {
        let defs = names
            .iter()
            .map(|n| self.find(n).cloned().unwrap_or_else(|| ColumnDef::plain(n)))
            .collect();
        *self = Projection::List(defs);
    }

    fn remove(&mut self, names: &[String]) {
        match self {
            Projection::List(defs) => defs.retain(|d| !names.contains(&d.name)),
            Projection::Star { except, extra } => {
                for name in names {
                    let before = extra.len();
                    extra.retain(|d| &d.name != name);
                    if extra.len() == before && !except.contains(name) {
                        except.push(name.clone());
                    }
                }
            }
        }
    }

    /// Returns false when `old` is not a known column of an explicit list.
    fn rename(&mut self, old: &str, new: &str) -> bool {
        match self {
            Projection::List(defs) => match defs.iter_mut().find(|d| d.name == old) {
                Some(def) => {
                    def.name = new.into();
                    true
                }
                None => false,
            },
            Projection::Star { except, extra } => {
                match extra.iter_mut().find(|d| d.name == old) {
                    Some(def) => def.name = new.into(),
                    None => {
                        except.push(old.into());
                        extra.push(ColumnDef {
                            name: new.into(),
                            expr: col(old),
                        });
                    }
                }
                true
            }
        }
    }

    /// Returns false when `name` is not a known column of an explicit list.
    fn retype(&mut self, name: &str, data_type: &str) -> bool {
        let wrap = |expr: Expr| match expr {
            Expr::Cast { expr, .. } => cast(*expr, data_type),
            other => cast(other, data_type),
        };
        match self {
            Projection::List(defs) => match defs.iter_mut().find(|d| d.name == name) {
                Some(def) => {
                    def.expr = wrap(def.expr.clone());
                    true
                }
                None => false,
            },
            Projection::Star { except, extra } => {
                match extra.iter_mut().find(|d| d.name == name) {
                    Some(def) => def.expr = wrap(def.expr.clone()),
                    None => {
                        except.push(name.into());
                        extra.push(ColumnDef {
                            name: name.into(),
                            expr: wrap(col(name)),
                        });
                    }
                }
                true
            }
        }
    }

    fn select_list(&self) -> Vec<SelectExpr> {
        match self {
            Projection::List(defs) => defs.iter().map(ColumnDef::select_expr).collect(),
            Projection::Star { except, extra } => {
                std::iter::once(SelectExpr::new(star_except(except.clone())))
                    .chain(extra.iter().map(ColumnDef::select_expr))
                    .collect()
            }
        }
    }
}

/// Replace references to projected columns with their definitions.
fn substitute(expr: Expr, projection: &Projection) -> Expr {
    let sub = |e: Box<Expr>| Box::new(substitute(*e, projection));
    match expr {
        Expr::Column {
            table: None,
            column,
        } => projection.resolve(&column),
        Expr::BinaryOp { left, op, right } => Expr::BinaryOp {
            left: sub(left),
            op,
            right: sub(right),
        },
        Expr::UnaryOp { op, expr } => Expr::UnaryOp { op, expr: sub(expr) },
        Expr::Function {
            name,
            args,
            distinct,
        } => Expr::Function {
            name,
            args: args.into_iter().map(|a| substitute(a, projection)).collect(),
            distinct,
        },
        Expr::Cast { expr, data_type } => Expr::Cast {
            expr: sub(expr),
            data_type,
        },
        Expr::Case {
            when_clauses,
            else_clause,
        } => Expr::Case {
            when_clauses: when_clauses
                .into_iter()
                .map(|(w, t)| (substitute(w, projection), substitute(t, projection)))
                .collect(),
            else_clause: else_clause.map(sub),
        },
        Expr::In {
            expr,
            values,
            negated,
        } => Expr::In {
            expr: sub(expr),
            values: values.into_iter().map(|v| substitute(v, projection)).collect(),
            negated,
        },
        Expr::IsNull { expr, negated } => Expr::IsNull {
            expr: sub(expr),
            negated,
        },
        Expr::Paren(inner) => Expr::Paren(sub(inner)),
        other => other,
    }
}

// =============================================================================
// Step arguments
// =============================================================================

/// `"A"` or `{"A", "B"}`.
fn text_list(expr: &MExpr) -> Option<Vec<String>> {
    match expr {
        MExpr::Text(s) => Some(vec![s.clone()]),
        MExpr::List(items) => items
            .iter()
            .map(|i| i.as_text().map(str::to_string))
            .collect(),
        _ => None,
    }
}

/// `{{"A", x}, {"B", y}}` or the single pair `{"A", x}`.
fn pairs(expr: &MExpr) -> Option<Vec<(&str, &MExpr)>> {
    fn pair(e: &MExpr) -> Option<(&str, &MExpr)> {
        match e.as_list()? {
            [name, value, ..] => Some((name.as_text()?, value)),
            _ => None,
        }
    }
    let items = expr.as_list()?;
    match items {
        [MExpr::Text(name), value, ..] => Some(vec![(name.as_str(), value)]),
        _ => items.iter().map(pair).collect(),
    }
}

/// The M type named by `type text` or `Int64.Type`.
fn type_name(expr: &MExpr) -> Option<&str> {
    match expr {
        MExpr::Type(name) => Some(name),
        MExpr::Ident(name) => Some(name),
        _ => None,
    }
}

/// Sort direction: `Order.Ascending`, `Order.Descending`, `0` or `1`.
fn sort_order(expr: &MExpr) -> Option<bool> {
    match expr {
        MExpr::Ident(name) if name == "Order.Descending" => Some(true),
        MExpr::Ident(name) if name == "Order.Ascending" => Some(false),
        other => other.as_integer().map(|n| n == 1),
    }
}

/// Sort criteria as `(column, descending)`, `None` meaning default order.
fn sort_keys(expr: &MExpr) -> Option<Vec<(String, Option<bool>)>> {
    let criterion = |e: &MExpr| -> Option<(String, Option<bool>)> {
        match e {
            MExpr::Text(name) => Some((name.clone(), None)),
            MExpr::List(items) => match items.as_slice() {
                [MExpr::Text(name), order] => Some((name.clone(), Some(sort_order(order)?))),
                _ => None,
            },
            _ => None,
        }
    };
    match expr {
        MExpr::Text(name) => Some(vec![(name.clone(), None)]),
        MExpr::List(items) => match items.as_slice() {
            [MExpr::Text(name), order] if sort_order(order).is_some() => {
                Some(vec![(name.clone(), sort_order(order))])
            }
            _ => items.iter().map(criterion).collect(),
        },
        _ => None,
    }
}

/// Top-level `and` operands.
fn conjuncts(expr: &MExpr) -> Vec<&MExpr> {
    match expr {
        MExpr::Binary {
            op: MBinaryOp::And,
            left,
            right,
        } => {
            let mut out = conjuncts(left);
            out.extend(conjuncts(right));
            out
        }
        other => vec![other],
    }
}

/// Record keys of a navigation chain, innermost first:
/// `Source{[Name="db"]}[Data]{[Schema="dbo",Item="T"]}[Data]`.
fn navigation_records(expr: &MExpr) -> Vec<&MExpr> {
    match expr {
        MExpr::Item { key, target } => {
            let mut records = navigation_records(target);
            if matches!(key.as_ref(), MExpr::Record(_)) {
                records.push(key);
            }
            records
        }
        MExpr::Field {
            target: Some(target),
            ..
        } => navigation_records(target),
        _ => Vec::new(),
    }
}

fn record_text<'a>(record: &'a MExpr, field: &str) -> Option<&'a str> {
    record.record_field(field).and_then(MExpr::as_text)
}

/// Move a fatal error from embedded SQL to the step that embeds it.
fn rebase(err: ConvertError, offset: usize) -> ConvertError {
    match err {
        ConvertError::UnterminatedBracket { .. } => ConvertError::UnterminatedBracket { offset },
        ConvertError::MalformedLiteral { reason, .. } => ConvertError::MalformedLiteral {
            offset,
            reason: format!("in native query: {}", reason),
        },
        other => other,
    }
}

// =============================================================================
// Query state
// =============================================================================

struct QueryState<'a> {
    context: &'a ConversionContext,
    origin: Origin,
    source_offset: usize,
    projection: Projection,
    filters: Vec<Expr>,
    group_by: Option<Vec<Expr>>,
    having: Vec<Expr>,
    order_by: Vec<(String, Option<bool>)>,
    limit: Option<u64>,
    distinct: bool,
    incomplete: bool,
    notes: Vec<Note>,
}

impl<'a> QueryState<'a> {
    fn new(context: &'a ConversionContext) -> Self {
        Self {
            context,
            origin: Origin::None,
            source_offset: 0,
            projection: Projection::Star {
                except: Vec::new(),
                extra: Vec::new(),
            },
            filters: Vec::new(),
            group_by: None,
            having: Vec::new(),
            order_by: Vec::new(),
            limit: None,
            distinct: false,
            incomplete: false,
            notes: Vec::new(),
        }
    }

    fn unsupported(&mut self, step: &MStep, message: impl Into<String>) {
        self.incomplete = true;
        self.notes.push(Note::unsupported(message).at(step.offset));
    }

    fn apply(&mut self, step: &MStep) -> ConvertResult<()> {
        let args = step.expr.as_call().map(|(_, args)| args).unwrap_or_default();
        if self.needs_nesting(step.kind) {
            debug!(step = %step.name, "nesting query before m step");
            self.nest();
        }
        match step.kind {
            StepKind::Source => self.source(step)?,
            StepKind::Navigate => self.navigate(step),
            StepKind::SelectColumns => match args.get(1).and_then(text_list) {
                Some(names) => self.projection.select(&names),
                None => self.unsupported(step, format!("step {}: column list is not literal", step.name)),
            },
            StepKind::RemoveColumns => match args.get(1).and_then(text_list) {
                Some(names) => self.projection.remove(&names),
                None => self.unsupported(step, format!("step {}: column list is not literal", step.name)),
            },
            StepKind::RenameColumns => self.rename(step, args),
            StepKind::TransformColumnTypes => self.retype(step, args),
            StepKind::SelectRows => self.select_rows(step, args),
            StepKind::GroupBy => self.group(step, args),
            StepKind::Sort => match args.get(1).and_then(sort_keys) {
                Some(keys) => {
                    let mut rest = std::mem::take(&mut self.order_by);
                    rest.retain(|(name, _)| keys.iter().all(|(k, _)| k != name));
                    self.order_by = keys.into_iter().chain(rest).collect();
                }
                None => self.unsupported(step, format!("step {}: sort criteria are not literal", step.name)),
            },
            StepKind::FirstN => match args.get(1).and_then(MExpr::as_integer) {
                Some(n) if n >= 0 => {
                    let n = n as u64;
                    self.limit = Some(self.limit.map_or(n, |l| l.min(n)));
                }
                _ => self.unsupported(step, format!("step {}: Table.FirstN needs a row count", step.name)),
            },
            StepKind::Distinct => {
                if args.len() <= 1 {
                    self.distinct = true;
                } else {
                    self.unsupported(
                        step,
                        format!("step {}: Table.Distinct over selected columns", step.name),
                    );
                }
            }
            StepKind::Unknown => self.unsupported(
                step,
                format!("step {} is not supported and was skipped: {}", step.name, step.raw_expression),
            ),
        }
        Ok(())
    }

    /// Whether `kind` would change meaning if folded into the current query.
    ///
    /// Row limits apply last in SQL, so filtering, sorting, grouping or
    /// deduplicating after `Table.FirstN` must read the limited rows.
    /// Grouping twice needs the first grouping's output rows.
    fn needs_nesting(&self, kind: StepKind) -> bool {
        match kind {
            StepKind::SelectRows | StepKind::Sort | StepKind::Distinct => self.limit.is_some(),
            StepKind::GroupBy => self.limit.is_some() || self.group_by.is_some(),
            _ => false,
        }
    }

    /// Replace the query built so far with a derived table over it.
    fn nest(&mut self) {
        let source_offset = self.source_offset;
        let fresh = QueryState::new(self.context);
        let inner = std::mem::replace(self, fresh);
        let (query, incomplete, notes) = inner.finish();
        self.notes = notes;
        self.incomplete = incomplete;
        self.source_offset = source_offset;
        self.origin = Origin::Resolved(FromItem::Derived {
            sql: query.to_sql(&Databricks),
            alias: NESTED_QUERY_ALIAS.into(),
        });
    }

    fn source(&mut self, step: &MStep) -> ConvertResult<()> {
        let Some((function, args)) = navigation_root(&step.expr).as_call() else {
            return Ok(());
        };
        self.source_offset = step.offset;
        self.origin = match function {
            "Sql.Databases" => Origin::Server,
            "Sql.Database" => {
                let database = args.get(1).and_then(MExpr::as_text).unwrap_or_default();
                let query = args
                    .get(2)
                    .and_then(|options| record_text(options, "Query"));
                match query {
                    Some(sql) => {
                        let converted = self.native_query(step, sql)?;
                        Origin::Resolved(FromItem::Derived {
                            sql: converted,
                            alias: NATIVE_QUERY_ALIAS.into(),
                        })
                    }
                    None => Origin::Database(database.to_string()),
                }
            }
            connector => Origin::External(connector.to_string()),
        };
        // navigation written on the connector call itself
        self.navigate(step);
        Ok(())
    }

    /// Convert the T-SQL of `[Query="..."]` with its own note collector.
    fn native_query(&mut self, step: &MStep, sql: &str) -> ConvertResult<String> {
        let mut inner = NoteCollector::new(sql);
        let converted =
            tsql::rewrite(sql, self.context, &mut inner).map_err(|e| rebase(e, step.offset))?;
        for mut note in inner.into_notes() {
            note.message = format!("native query of step {}: {}", step.name, note.message);
            note.position = None;
            self.notes.push(note.at(step.offset));
        }
        Ok(converted)
    }

    /// Apply each navigation record of the step. A plain alias has none.
    fn navigate(&mut self, step: &MStep) {
        for record in navigation_records(&step.expr) {
            if !self.navigate_record(step, record) {
                break;
            }
        }
    }

    /// Returns false when the record could not be followed.
    fn navigate_record(&mut self, step: &MStep, record: &MExpr) -> bool {
        let name = record_text(record, "Name");
        let item = record_text(record, "Item");
        match std::mem::replace(&mut self.origin, Origin::None) {
            Origin::Server => match name {
                Some(db) => self.origin = Origin::Database(db.to_string()),
                None => {
                    self.origin = Origin::Server;
                    self.unsupported(step, format!("step {}: database navigation without Name", step.name));
                    return false;
                }
            },
            Origin::Database(database) => {
                let schema = record_text(record, "Schema");
                let (schema, table) = match (item, name) {
                    (Some(item), _) => (schema, item),
                    // `Name="dbo.T"` as written by the navigator
                    (None, Some(name)) => match name.split_once('.') {
                        Some((s, t)) if schema.is_none() => (Some(s), t),
                        _ => (schema, name),
                    },
                    (None, None) => {
                        self.origin = Origin::Database(database);
                        self.unsupported(step, format!("step {}: table navigation without Item", step.name));
                        return false;
                    }
                };
                let parts = [
                    database,
                    schema.unwrap_or_default().to_string(),
                    table.to_string(),
                ];
                match identifiers::normalize(
                    &parts,
                    &self.context.default_catalog,
                    &self.context.default_schema,
                ) {
                    Ok(([catalog, schema, table], notes)) => {
                        self.notes.extend(notes.into_iter().map(|n| n.at(step.offset)));
                        self.origin = Origin::Resolved(FromItem::Table(TableRef::qualified(
                            &catalog, &schema, &table,
                        )));
                    }
                    Err(note) => {
                        self.incomplete = true;
                        self.notes.push(note.at(step.offset));
                        return false;
                    }
                }
            }
            Origin::External(connector) => match name.or(item) {
                Some(object) => self.origin = self.staged(step.offset, &connector, object),
                None => {
                    self.origin = Origin::External(connector);
                    self.unsupported(step, format!("step {}: navigation without Name or Item", step.name));
                    return false;
                }
            },
            origin => {
                self.origin = origin;
                self.unsupported(
                    step,
                    format!("step {}: navigation into a table is not supported", step.name),
                );
                return false;
            }
        }
        true
    }

    /// Assume an external object has been staged under the staging schema.
    fn staged(&mut self, offset: usize, connector: &str, object: &str) -> Origin {
        let table = TableRef::qualified(
            &self.context.default_catalog,
            &self.context.staging_schema,
            &staging_name(object),
        );
        self.notes.push(
            Note::warning(
                NoteCode::ExternalSourceAssumed,
                format!(
                    "{} object {} assumed staged as {}.{}.{}",
                    connector,
                    object,
                    self.context.default_catalog,
                    self.context.staging_schema,
                    staging_name(object)
                ),
            )
            .at(offset),
        );
        Origin::Resolved(FromItem::Table(table))
    }

    fn rename(&mut self, step: &MStep, args: &[MExpr]) {
        let Some(renames) = args.get(1).and_then(pairs) else {
            self.unsupported(step, format!("step {}: rename list is not literal", step.name));
            return;
        };
        for (old, new) in renames {
            match new.as_text() {
                Some(new) if self.projection.rename(old, new) => {}
                _ => self.unsupported(step, format!("step {}: cannot rename column {}", step.name, old)),
            }
        }
    }

    fn retype(&mut self, step: &MStep, args: &[MExpr]) {
        let Some(changes) = args.get(1).and_then(pairs) else {
            self.unsupported(step, format!("step {}: type list is not literal", step.name));
            return;
        };
        for (column, ty) in changes {
            let Some(m_type) = type_name(ty) else {
                self.unsupported(step, format!("step {}: type of column {} is not literal", step.name, column));
                continue;
            };
            match map_m_type(m_type) {
                Some(data_type) => {
                    if !self.projection.retype(column, data_type) {
                        self.unsupported(
                            step,
                            format!("step {}: column {} is not in the projection", step.name, column),
                        );
                    }
                }
                None => self.notes.push(
                    Note::warning(
                        NoteCode::UnmappedType,
                        format!("column {} keeps its type: M type {} has no mapping", column, m_type),
                    )
                    .at(step.offset),
                ),
            }
        }
    }

    fn select_rows(&mut self, step: &MStep, args: &[MExpr]) {
        let Some((translator, body)) = args.get(1).and_then(Translator::for_row_function) else {
            self.unsupported(step, format!("step {}: row filter is not a row function", step.name));
            return;
        };
        for conjunct in conjuncts(body) {
            match translator.translate(conjunct) {
                Ok(expr) => {
                    let expr = substitute(expr, &self.projection);
                    if self.group_by.is_some() {
                        self.having.push(expr);
                    } else {
                        self.filters.push(expr);
                    }
                }
                Err(reason) => self.unsupported(
                    step,
                    format!("step {}: filter condition dropped: {}", step.name, reason),
                ),
            }
        }
    }

    fn group(&mut self, step: &MStep, args: &[MExpr]) {
        let (Some(keys), Some(aggregates)) = (args.get(1).and_then(text_list), args.get(2)) else {
            self.unsupported(step, format!("step {}: grouping keys are not literal", step.name));
            return;
        };

        let mut defs: Vec<ColumnDef> = keys
            .iter()
            .map(|k| ColumnDef {
                name: k.clone(),
                expr: self.projection.resolve(k),
            })
            .collect();
        let group_exprs = defs.iter().map(|d| d.expr.clone()).collect();

        for (name, function) in pairs(aggregates).unwrap_or_default() {
            let translated = match Translator::for_row_function(function) {
                Some((translator, body)) => translator.grouped().translate(body),
                None => Err(Untranslatable(
                    "aggregate is not a row function".into(),
                )),
            };
            match translated {
                Ok(expr) => defs.push(ColumnDef {
                    name: name.to_string(),
                    expr: substitute(expr, &self.projection),
                }),
                Err(reason) => self.unsupported(
                    step,
                    format!("step {}: aggregate column {} dropped: {}", step.name, name, reason),
                ),
            }
        }

        self.group_by = Some(group_exprs);
        self.projection = Projection::List(defs);
    }

    fn finish(mut self) -> (Query, bool, Vec<Note>) {
        let from = match std::mem::replace(&mut self.origin, Origin::None) {
            Origin::Resolved(from) => Some(from),
            // connector read as a whole, e.g. `Csv.Document(...)`
            Origin::External(connector) => match self.staged(self.source_offset, &connector, &connector) {
                Origin::Resolved(from) => Some(from),
                _ => None,
            },
            Origin::Database(database) => {
                self.incomplete = true;
                self.notes.push(Note::unsupported(format!(
                    "database {} is read without selecting a table",
                    database
                )));
                None
            }
            Origin::Server => {
                self.incomplete = true;
                self.notes
                    .push(Note::unsupported("server is read without selecting a database"));
                None
            }
            Origin::None => {
                self.incomplete = true;
                self.notes
                    .push(Note::unsupported("no source step feeds the output step"));
                None
            }
        };

        let order_by = self
            .order_by
            .iter()
            .map(|(name, descending)| match descending {
                Some(true) => OrderByExpr::desc(col(name)),
                Some(false) => OrderByExpr::asc(col(name)),
                None => OrderByExpr::new(col(name)),
            })
            .collect();

        let query = Query {
            select: self.projection.select_list(),
            distinct: self.distinct,
            from,
            where_clause: and_all(self.filters),
            group_by: self.group_by.unwrap_or_default(),
            having: and_all(self.having),
            order_by,
            limit: self.limit,
        };
        (query, self.incomplete, self.notes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::powerquery::parser::parse_expr;

    #[test]
    fn test_sort_keys_forms() {
        let keys = sort_keys(&parse_expr(r#"{{"A", Order.Descending}, {"B", Order.Ascending}}"#).unwrap());
        assert_eq!(
            keys,
            Some(vec![("A".into(), Some(true)), ("B".into(), Some(false))])
        );
        let single = sort_keys(&parse_expr(r#"{"A", Order.Descending}"#).unwrap());
        assert_eq!(single, Some(vec![("A".into(), Some(true))]));
        let bare = sort_keys(&parse_expr(r#"{"A", "B"}"#).unwrap());
        assert_eq!(bare, Some(vec![("A".into(), None), ("B".into(), None)]));
    }

    #[test]
    fn test_pairs_single_and_nested() {
        let nested = parse_expr(r#"{{"A", type text}, {"B", Int64.Type}}"#).unwrap();
        let got: Vec<_> = pairs(&nested)
            .unwrap()
            .into_iter()
            .map(|(n, t)| (n.to_string(), type_name(t).map(str::to_string)))
            .collect();
        assert_eq!(
            got,
            vec![
                ("A".to_string(), Some("text".to_string())),
                ("B".to_string(), Some("Int64.Type".to_string()))
            ]
        );
        let single = parse_expr(r#"{"Old", "New"}"#).unwrap();
        assert_eq!(pairs(&single).unwrap().len(), 1);
    }

    #[test]
    fn test_star_projection_rename_and_cast() {
        let mut projection = Projection::Star {
            except: Vec::new(),
            extra: Vec::new(),
        };
        assert!(projection.rename("Cust Name", "CustomerName"));
        assert!(projection.retype("Amount", "DOUBLE"));
        let sql: Vec<String> = projection
            .select_list()
            .iter()
            .map(|s| s.to_tokens().serialize(&Databricks))
            .collect();
        assert_eq!(
            sql,
            vec![
                "* EXCEPT (`Cust Name`, Amount)",
                "`Cust Name` AS CustomerName",
                "CAST(Amount AS DOUBLE) AS Amount",
            ]
        );
    }

    #[test]
    fn test_list_projection_missing_column() {
        let mut projection = Projection::List(vec![ColumnDef::plain("A")]);
        assert!(!projection.rename("B", "C"));
        assert!(!projection.retype("B", "STRING"));
        projection.remove(&["A".to_string()]);
        assert!(projection.select_list().is_empty());
    }

    #[test]
    fn test_recast_replaces_cast() {
        let mut projection = Projection::List(vec![ColumnDef::plain("A")]);
        projection.retype("A", "STRING");
        projection.retype("A", "BIGINT");
        assert_eq!(projection.resolve("A"), cast(col("A"), "BIGINT"));
    }

    #[test]
    fn test_staging_name() {
        assert_eq!(staging_name("Opportunity Line Item"), "opportunity_line_item");
        assert_eq!(staging_name("Salesforce.Data"), "salesforce_data");
    }
}
