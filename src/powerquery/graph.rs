//! The step graph of an M query.
//!
//! Each `let` binding becomes an [`MStep`] with the step names it references
//! as `inputs`. The graph of those references must be a DAG whose edges only
//! point at earlier declarations, and the `in` name must be a declared step.

use std::collections::{HashMap, HashSet};
use std::fmt;

use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use tracing::debug;

use super::ast::{MDocument, MExpr};
use crate::error::{ConvertError, ConvertResult};

/// What a step does, from its leading function call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StepKind {
    /// A connector call such as `Sql.Database` or `Salesforce.Data`.
    Source,
    /// `Source{[Schema="dbo",Item="T"]}[Data]`, or a plain alias of a step.
    Navigate,
    SelectColumns,
    RemoveColumns,
    RenameColumns,
    SelectRows,
    Sort,
    TransformColumnTypes,
    GroupBy,
    FirstN,
    Distinct,
    Unknown,
}

impl StepKind {
    fn from_function(name: &str) -> Option<Self> {
        let kind = match name {
            "Table.SelectColumns" => StepKind::SelectColumns,
            "Table.RemoveColumns" => StepKind::RemoveColumns,
            "Table.RenameColumns" => StepKind::RenameColumns,
            "Table.SelectRows" => StepKind::SelectRows,
            "Table.Sort" => StepKind::Sort,
            "Table.TransformColumnTypes" => StepKind::TransformColumnTypes,
            "Table.Group" => StepKind::GroupBy,
            "Table.FirstN" => StepKind::FirstN,
            "Table.Distinct" => StepKind::Distinct,
            _ => return None,
        };
        Some(kind)
    }
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A named step of the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct MStep {
    pub name: String,
    /// The step's expression as written.
    pub raw_expression: String,
    /// Referenced step names, in first-use order.
    pub inputs: Vec<String>,
    pub kind: StepKind,
    pub expr: MExpr,
    /// Byte offset of the step name.
    pub offset: usize,
}

/// A validated step graph.
#[derive(Debug, Clone)]
pub struct MPipeline {
    steps: Vec<MStep>,
    index: HashMap<String, usize>,
    output: String,
}

impl MPipeline {
    /// Build and validate the step graph of a parsed document.
    pub fn build(source: &str, doc: MDocument) -> ConvertResult<Self> {
        let names: HashSet<String> = doc.bindings.iter().map(|b| b.name.clone()).collect();
        let names_ref: HashSet<&str> = names.iter().map(String::as_str).collect();

        let mut steps = Vec::with_capacity(doc.bindings.len());
        for binding in doc.bindings {
            let mut inputs = Vec::new();
            for name in binding.expr.free_names() {
                if names.contains(&name) {
                    inputs.push(name);
                } else if is_step_like(&name) {
                    return Err(ConvertError::UnresolvedStepReference {
                        step: Some(binding.name),
                        reference: name,
                        offset: Some(binding.offset),
                    });
                }
            }
            let kind = classify(&binding.expr, &names_ref);
            debug!(step = %binding.name, %kind, inputs = inputs.len(), "classified m step");
            steps.push(MStep {
                raw_expression: source
                    .get(binding.start..binding.end)
                    .unwrap_or_default()
                    .to_string(),
                name: binding.name,
                inputs,
                kind,
                expr: binding.expr,
                offset: binding.offset,
            });
        }

        let index: HashMap<String, usize> = steps
            .iter()
            .enumerate()
            .map(|(i, s)| (s.name.clone(), i))
            .collect();

        if !index.contains_key(&doc.output) {
            return Err(ConvertError::UnresolvedStepReference {
                step: None,
                reference: doc.output,
                offset: Some(doc.output_offset),
            });
        }

        let pipeline = Self {
            steps,
            index,
            output: doc.output,
        };
        pipeline.check_cycles()?;
        pipeline.check_declaration_order()?;
        Ok(pipeline)
    }

    fn graph(&self) -> DiGraph<usize, ()> {
        let mut graph = DiGraph::new();
        let nodes: Vec<NodeIndex> = (0..self.steps.len()).map(|i| graph.add_node(i)).collect();
        for (i, step) in self.steps.iter().enumerate() {
            for input in &step.inputs {
                if let Some(&j) = self.index.get(input) {
                    graph.add_edge(nodes[i], nodes[j], ());
                }
            }
        }
        graph
    }

    fn check_cycles(&self) -> ConvertResult<()> {
        let graph = self.graph();
        for scc in tarjan_scc(&graph) {
            let is_cycle = scc.len() > 1
                || scc
                    .first()
                    .is_some_and(|&n| graph.edges_connecting(n, n).next().is_some());
            if !is_cycle {
                continue;
            }
            let members: HashSet<usize> = scc.iter().map(|&n| graph[n]).collect();
            let Some(&start) = members.iter().min() else { continue };
            let path = self.cycle_path(start, &members);
            return Err(ConvertError::CyclicStepDependency {
                cycle: path.into_iter().map(|i| self.steps[i].name.clone()).collect(),
            });
        }
        Ok(())
    }

    /// Walk references from `start` inside one strongly connected component
    /// until they lead back to it. Returns `[start, .., start]`.
    fn cycle_path(&self, start: usize, members: &HashSet<usize>) -> Vec<usize> {
        let mut path = vec![start];
        let mut visited = HashSet::new();
        if self.extend_cycle(start, start, members, &mut visited, &mut path) {
            path
        } else {
            vec![start, start]
        }
    }

    fn extend_cycle(
        &self,
        at: usize,
        start: usize,
        members: &HashSet<usize>,
        visited: &mut HashSet<usize>,
        path: &mut Vec<usize>,
    ) -> bool {
        visited.insert(at);
        for input in &self.steps[at].inputs {
            let Some(&next) = self.index.get(input) else { continue };
            if !members.contains(&next) {
                continue;
            }
            if next == start {
                path.push(start);
                return true;
            }
            if visited.contains(&next) {
                continue;
            }
            path.push(next);
            if self.extend_cycle(next, start, members, visited, path) {
                return true;
            }
            path.pop();
        }
        false
    }

    /// Inputs must be declared before the step that uses them.
    fn check_declaration_order(&self) -> ConvertResult<()> {
        for (i, step) in self.steps.iter().enumerate() {
            for input in &step.inputs {
                if self.index.get(input).is_some_and(|&j| j > i) {
                    return Err(ConvertError::UnresolvedStepReference {
                        step: Some(step.name.clone()),
                        reference: input.clone(),
                        offset: Some(step.offset),
                    });
                }
            }
        }
        Ok(())
    }

    pub fn steps(&self) -> &[MStep] {
        &self.steps
    }

    pub fn step(&self, name: &str) -> Option<&MStep> {
        self.index.get(name).map(|&i| &self.steps[i])
    }

    pub fn output(&self) -> &str {
        &self.output
    }

    /// The step whose table this step transforms.
    pub fn primary_input(&self, step: &MStep) -> Option<&MStep> {
        let base = match &step.expr {
            MExpr::Call { args, .. } => args
                .iter()
                .find_map(|a| a.as_ident().filter(|n| self.index.contains_key(*n))),
            other => navigation_base(other),
        }?;
        self.step(base)
    }

    /// Steps from the source to the output, following primary inputs
    /// backward from the output step.
    pub fn chain(&self) -> Vec<&MStep> {
        let mut chain = Vec::new();
        let mut current = self.step(&self.output);
        while let Some(step) = current {
            if chain.len() > self.steps.len() {
                break;
            }
            chain.push(step);
            current = self.primary_input(step);
        }
        chain.reverse();
        chain
    }
}

/// Undotted free names are step references; dotted ones are library
/// functions and enum values (`Table.Sort`, `Order.Descending`).
fn is_step_like(name: &str) -> bool {
    !name.contains('.') && name != "_"
}

/// The expression a navigation chain starts from:
/// `Sql.Database(..){[..]}[Data]` → `Sql.Database(..)`.
pub fn navigation_root(expr: &MExpr) -> &MExpr {
    match expr {
        MExpr::Field {
            target: Some(target),
            ..
        } => navigation_root(target),
        MExpr::Item { target, .. } => navigation_root(target),
        other => other,
    }
}

/// The step a navigation expression starts from: `Source{...}[Data]` → `Source`.
fn navigation_base(expr: &MExpr) -> Option<&str> {
    navigation_root(expr).as_ident()
}

/// A connector call that reads no other step.
fn is_connector_call(expr: &MExpr, steps: &HashSet<&str>) -> bool {
    let Some((name, _)) = expr.as_call() else {
        return false;
    };
    let reads_step = expr.free_names().iter().any(|n| steps.contains(n.as_str()));
    name.contains('.') && !name.starts_with("Table.") && !name.starts_with("List.") && !reads_step
}

/// Classify a step expression.
pub fn classify(expr: &MExpr, steps: &HashSet<&str>) -> StepKind {
    if let Some((name, _)) = expr.as_call() {
        if let Some(kind) = StepKind::from_function(name) {
            return kind;
        }
        return if is_connector_call(expr, steps) {
            StepKind::Source
        } else {
            StepKind::Unknown
        };
    }
    match navigation_base(expr) {
        Some(base) if steps.contains(base) => StepKind::Navigate,
        // `Sql.Database(..){[Schema=..,Item=..]}[Data]` in one step
        None if is_connector_call(navigation_root(expr), steps) => StepKind::Source,
        _ => StepKind::Unknown,
    }
}
