//! Cell evaluation and dependent propagation
//!
//! Two propagation strategies live here:
//!
//! - [`propagate`] / [`Propagation`]: breadth-first layers. Every key in a
//!   layer is evaluated against the table as it stood when the layer began,
//!   then the next layer is the concatenation of their dependents. A cell
//!   reachable along several paths is evaluated once per path.
//! - [`recalculate`]: orders the affected cells by longest-path depth from the
//!   roots and evaluates each exactly once, after everything upstream of it.
//!   This is what the engine uses.
//!
//! Neither strategy detects cycles while running; graphs are checked when they
//! are built or merged. `recalculate` still refuses a cyclic schedule instead
//! of looping.

use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::{HashMap, HashSet, VecDeque};
use tracing::warn;

use super::expression::ExprNode;
use super::graph::{cycle_members, TableExpressions};
use super::table::{CellWrite, Table};
use crate::error::{SheetError, SheetResult};

/// Result of evaluating one cell
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub key: String,
    /// Computed value before narrowing to the table's f32 storage
    pub value: f64,
    pub write: CellWrite,
}

impl Evaluation {
    pub fn is_out_of_bounds(&self) -> bool {
        self.write == CellWrite::OutOfBounds
    }
}

fn eval_node(expr: &ExprNode, table: &Table) -> f64 {
    match expr {
        ExprNode::Literal { value } => *value,
        // whatever is stored right now; out-of-bounds reads are NaN
        ExprNode::Reference { value } => table.get(value).map_or(f64::NAN, f64::from),
        ExprNode::Operator { name, left, right } => {
            let left = eval_node(left, table);
            let right = eval_node(right, table);
            name.apply(left, right)
        }
        ExprNode::Unknown { .. } => f64::NAN,
    }
}

/// Evaluate `key` without writing; `None` when it has no formula
pub fn compute(graph: &TableExpressions, table: &Table, key: &str) -> Option<f64> {
    graph.formula(key).map(|expr| eval_node(expr, table))
}

fn missing(table: &Table, key: &str) -> Evaluation {
    Evaluation {
        key: key.to_string(),
        value: table.get(key).map_or(f64::NAN, f64::from),
        write: CellWrite::Missing,
    }
}

/// Evaluate the formula stored at `key` and write the result into the table.
///
/// A key outside the grid is evaluated but not stored; the returned
/// [`Evaluation`] carries `CellWrite::OutOfBounds` so the caller can surface it.
pub fn evaluate(graph: &TableExpressions, table: &mut Table, key: &str) -> Evaluation {
    let Some(value) = compute(graph, table, key) else {
        return missing(table, key);
    };

    let write = table.set(key, value as f32);
    if write == CellWrite::OutOfBounds {
        warn!(key, value, "evaluated cell lies outside the table; result not stored");
    }

    Evaluation {
        key: key.to_string(),
        value,
        write,
    }
}

/// Lazy breadth-first propagation.
///
/// Yields one [`Evaluation`] per frontier entry, layer by layer. Writes made
/// within a layer become visible when the layer is exhausted, so every key of
/// a layer reads the same table state. Single pass; finite only on acyclic
/// graphs. Dropping the iterator mid-layer still commits the writes already
/// yielded.
pub struct Propagation<'a> {
    graph: &'a TableExpressions,
    table: &'a mut Table,
    frontier: Vec<String>,
    position: usize,
    pending: Vec<(usize, f32)>,
    layer: usize,
}

impl<'a> Propagation<'a> {
    pub fn new(graph: &'a TableExpressions, table: &'a mut Table, roots: &[String]) -> Self {
        Self {
            graph,
            table,
            frontier: roots.to_vec(),
            position: 0,
            pending: Vec::new(),
            layer: 0,
        }
    }

    /// Zero-based index of the layer currently being yielded
    pub fn layer(&self) -> usize {
        self.layer
    }

    fn commit(&mut self) {
        for (index, value) in self.pending.drain(..) {
            self.table.set_index(index, value);
        }
    }

    fn evaluate_frozen(&mut self, key: &str) -> Evaluation {
        let Some(value) = compute(self.graph, self.table, key) else {
            return missing(self.table, key);
        };

        let write = match self.table.index_of(key) {
            Some(index) => {
                self.pending.push((index, value as f32));
                CellWrite::Stored(index)
            }
            None => {
                warn!(key, value, "evaluated cell lies outside the table; result not stored");
                CellWrite::OutOfBounds
            }
        };

        Evaluation {
            key: key.to_string(),
            value,
            write,
        }
    }
}

impl Iterator for Propagation<'_> {
    type Item = Evaluation;

    fn next(&mut self) -> Option<Evaluation> {
        loop {
            if let Some(key) = self.frontier.get(self.position).cloned() {
                self.position += 1;
                return Some(self.evaluate_frozen(&key));
            }
            if self.frontier.is_empty() {
                return None;
            }

            self.commit();
            let graph = self.graph;
            self.frontier = self
                .frontier
                .iter()
                .flat_map(|key| graph.dependents_of(key).iter().cloned())
                .collect();
            self.position = 0;
            self.layer += 1;
        }
    }
}

impl Drop for Propagation<'_> {
    fn drop(&mut self) {
        self.commit();
    }
}

/// Eager breadth-first propagation from `roots`; same evaluations, same order as [`Propagation`]
pub fn propagate(graph: &TableExpressions, table: &mut Table, roots: &[String]) -> Vec<Evaluation> {
    Propagation::new(graph, table, roots).collect()
}

/// Cells affected by a change to `roots`, with their longest-path depth
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schedule {
    /// Evaluation order: by depth, then by first discovery
    pub order: Vec<String>,
    pub depths: HashMap<String, usize>,
}

impl Schedule {
    pub fn max_depth(&self) -> usize {
        self.depths.values().copied().max().unwrap_or(0)
    }
}

/// Order every cell reachable from `roots` by longest-path depth.
///
/// Roots sit at depth 0 unless another root feeds them. A cell's depth is one
/// more than the deepest affected cell it reads, so it is scheduled only after
/// all of its affected inputs have settled.
pub fn schedule(graph: &TableExpressions, roots: &[String]) -> SheetResult<Schedule> {
    let mut affected: Vec<&str> = Vec::new();
    let mut seen: HashSet<&str> = HashSet::new();
    let mut queue: VecDeque<&str> = roots.iter().map(String::as_str).collect();

    while let Some(key) = queue.pop_front() {
        if !seen.insert(key) {
            continue;
        }
        affected.push(key);
        queue.extend(graph.dependents_of(key).iter().map(String::as_str));
    }

    let mut dag: DiGraph<&str, ()> = DiGraph::with_capacity(affected.len(), affected.len());
    let nodes: HashMap<&str, NodeIndex> = affected.iter().map(|&key| (key, dag.add_node(key))).collect();
    for &key in &affected {
        for reader in graph.dependents_of(key) {
            if let Some(&target) = nodes.get(reader.as_str()) {
                dag.update_edge(nodes[key], target, ());
            }
        }
    }

    let topo = toposort(&dag, None).map_err(|_| SheetError::CircularDependency {
        cells: cycle_members(&dag),
    })?;

    let mut depth = vec![0usize; dag.node_count()];
    for idx in topo {
        for next in dag.neighbors(idx) {
            depth[next.index()] = depth[next.index()].max(depth[idx.index()] + 1);
        }
    }

    // nodes were added in discovery order, so a stable sort keeps that as tiebreak
    let mut order: Vec<NodeIndex> = dag.node_indices().collect();
    order.sort_by_key(|idx| depth[idx.index()]);

    Ok(Schedule {
        order: order.iter().map(|&idx| dag[idx].to_string()).collect(),
        depths: dag
            .node_indices()
            .map(|idx| (dag[idx].to_string(), depth[idx.index()]))
            .collect(),
    })
}

/// Recompute `roots` and everything downstream, each cell exactly once, in depth order
pub fn recalculate(graph: &TableExpressions, table: &mut Table, roots: &[String]) -> SheetResult<Vec<Evaluation>> {
    let schedule = schedule(graph, roots)?;
    Ok(schedule
        .order
        .iter()
        .map(|key| evaluate(graph, table, key))
        .collect())
}
