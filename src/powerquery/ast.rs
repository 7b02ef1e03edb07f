//! M expression tree.

use std::collections::HashSet;

/// Binary operators, loosest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MBinaryOp {
    Or,
    And,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Add,
    Sub,
    Concat,
    Mul,
    Div,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MUnaryOp {
    Not,
    Neg,
}

/// An M expression.
#[derive(Debug, Clone, PartialEq)]
pub enum MExpr {
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
    /// A name: a step, a library function or a lambda parameter.
    Ident(String),
    /// `#date`, `#datetime`, `#table`, ...
    Intrinsic(String),
    /// `type text`, `type nullable number`; holds the primitive name.
    Type(String),
    List(Vec<MExpr>),
    Record(Vec<(String, MExpr)>),
    /// `x[Col]`, or `[Col]` inside `each` when `target` is `None`.
    Field {
        target: Option<Box<MExpr>>,
        field: String,
    },
    /// `x{key}`: list index or table row lookup.
    Item {
        target: Box<MExpr>,
        key: Box<MExpr>,
    },
    Call {
        function: Box<MExpr>,
        args: Vec<MExpr>,
    },
    Each(Box<MExpr>),
    Lambda {
        params: Vec<String>,
        body: Box<MExpr>,
    },
    If {
        condition: Box<MExpr>,
        then_branch: Box<MExpr>,
        else_branch: Box<MExpr>,
    },
    Try {
        body: Box<MExpr>,
        otherwise: Option<Box<MExpr>>,
    },
    Let {
        bindings: Vec<Binding>,
        body: Box<MExpr>,
    },
    Binary {
        op: MBinaryOp,
        left: Box<MExpr>,
        right: Box<MExpr>,
    },
    Unary {
        op: MUnaryOp,
        expr: Box<MExpr>,
    },
}

/// `name = expr` inside a `let`.
#[derive(Debug, Clone, PartialEq)]
pub struct Binding {
    pub name: String,
    pub expr: MExpr,
    /// Byte range of `expr` in the source.
    pub start: usize,
    pub end: usize,
    /// Byte offset of the name.
    pub offset: usize,
}

/// A whole M query: `let ... in output`.
#[derive(Debug, Clone, PartialEq)]
pub struct MDocument {
    pub bindings: Vec<Binding>,
    pub output: String,
    pub output_offset: usize,
}

impl MExpr {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            MExpr::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_ident(&self) -> Option<&str> {
        match self {
            MExpr::Ident(s) => Some(s),
            _ => None,
        }
    }

    /// Function name and arguments when this is a direct call.
    pub fn as_call(&self) -> Option<(&str, &[MExpr])> {
        match self {
            MExpr::Call { function, args } => function.as_ident().map(|name| (name, args.as_slice())),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[MExpr]> {
        match self {
            MExpr::List(items) => Some(items),
            _ => None,
        }
    }

    /// Field value of a record literal.
    pub fn record_field(&self, name: &str) -> Option<&MExpr> {
        match self {
            MExpr::Record(fields) => fields.iter().find(|(k, _)| k == name).map(|(_, v)| v),
            _ => None,
        }
    }

    /// Integer value of a whole-number literal, including negated ones.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            MExpr::Number(n) if n.fract() == 0.0 && n.abs() < i64::MAX as f64 => Some(*n as i64),
            MExpr::Unary {
                op: MUnaryOp::Neg,
                expr,
            } => expr.as_integer().map(|n| -n),
            _ => None,
        }
    }

    /// Free names referenced by this expression, in first-use order.
    ///
    /// Names bound by lambda parameters and nested `let` blocks are excluded.
    pub fn free_names(&self) -> Vec<String> {
        let mut out = Vec::new();
        let mut bound = Vec::new();
        self.collect_names(&mut bound, &mut out);
        out
    }

    fn collect_names(&self, bound: &mut Vec<String>, out: &mut Vec<String>) {
        match self {
            MExpr::Ident(name) => {
                if !bound.contains(name) && !out.contains(name) {
                    out.push(name.clone());
                }
            }
            MExpr::Null
            | MExpr::Bool(_)
            | MExpr::Number(_)
            | MExpr::Text(_)
            | MExpr::Intrinsic(_)
            | MExpr::Type(_) => {}
            MExpr::List(items) => items.iter().for_each(|e| e.collect_names(bound, out)),
            MExpr::Record(fields) => fields.iter().for_each(|(_, e)| e.collect_names(bound, out)),
            MExpr::Field { target, .. } => {
                if let Some(t) = target {
                    t.collect_names(bound, out);
                }
            }
            MExpr::Item { target, key } => {
                target.collect_names(bound, out);
                key.collect_names(bound, out);
            }
            MExpr::Call { function, args } => {
                function.collect_names(bound, out);
                args.iter().for_each(|e| e.collect_names(bound, out));
            }
            MExpr::Each(body) => {
                bound.push("_".into());
                body.collect_names(bound, out);
                bound.pop();
            }
            MExpr::Lambda { params, body } => {
                let depth = bound.len();
                bound.extend(params.iter().cloned());
                body.collect_names(bound, out);
                bound.truncate(depth);
            }
            MExpr::If {
                condition,
                then_branch,
                else_branch,
            } => {
                condition.collect_names(bound, out);
                then_branch.collect_names(bound, out);
                else_branch.collect_names(bound, out);
            }
            MExpr::Try { body, otherwise } => {
                body.collect_names(bound, out);
                if let Some(o) = otherwise {
                    o.collect_names(bound, out);
                }
            }
            MExpr::Let { bindings, body } => {
                let depth = bound.len();
                bound.extend(bindings.iter().map(|b| b.name.clone()));
                for b in bindings {
                    b.expr.collect_names(bound, out);
                }
                body.collect_names(bound, out);
                bound.truncate(depth);
            }
            MExpr::Binary { left, right, .. } => {
                left.collect_names(bound, out);
                right.collect_names(bound, out);
            }
            MExpr::Unary { expr, .. } => expr.collect_names(bound, out),
        }
    }
}

impl MDocument {
    pub fn step_names(&self) -> HashSet<&str> {
        self.bindings.iter().map(|b| b.name.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ident(s: &str) -> MExpr {
        MExpr::Ident(s.into())
    }

    #[test]
    fn test_free_names_skip_bound() {
        // Table.SelectRows(Source, (r) => r[Id] = Other)
        let expr = MExpr::Call {
            function: Box::new(ident("Table.SelectRows")),
            args: vec![
                ident("Source"),
                MExpr::Lambda {
                    params: vec!["r".into()],
                    body: Box::new(MExpr::Binary {
                        op: MBinaryOp::Eq,
                        left: Box::new(MExpr::Field {
                            target: Some(Box::new(ident("r"))),
                            field: "Id".into(),
                        }),
                        right: Box::new(ident("Other")),
                    }),
                },
            ],
        };
        assert_eq!(expr.free_names(), vec!["Table.SelectRows", "Source", "Other"]);
    }

    #[test]
    fn test_as_integer() {
        assert_eq!(MExpr::Number(365.0).as_integer(), Some(365));
        assert_eq!(MExpr::Number(1.5).as_integer(), None);
        let neg = MExpr::Unary {
            op: MUnaryOp::Neg,
            expr: Box::new(MExpr::Number(7.0)),
        };
        assert_eq!(neg.as_integer(), Some(-7));
    }
}
