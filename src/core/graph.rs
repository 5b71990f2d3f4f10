//! Cell dependency graph: batch build and incremental merge
//!
//! Edge direction follows the spreadsheet reading:
//!
//! ```text
//! dependencies[B] = [A, ...]   B's formula reads A
//! dependents[A]   = [B, ...]   A is read by B
//! ```
//!
//! The two maps are kept as exact transposes of each other. Keys with no
//! edges are absent rather than mapped to an empty list.

use petgraph::algo::{tarjan_scc, toposort};
use petgraph::graph::{DiGraph, NodeIndex};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use tracing::{debug, warn};

use super::expression::{parse, ExprNode};
use crate::error::{SheetError, SheetResult};

/// cellKey → parsed formula
pub type FormulaTable = BTreeMap<String, ExprNode>;

/// cellKey → ordered list of cellKeys
pub type EdgeMap = BTreeMap<String, Vec<String>>;

/// Parsed formulas plus both edge directions
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TableExpressions {
    pub table: FormulaTable,
    pub dependencies: EdgeMap,
    pub dependents: EdgeMap,
}

impl TableExpressions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn formula(&self, key: &str) -> Option<&ExprNode> {
        self.table.get(key)
    }

    /// Cells `key` reads, in reference order (duplicates kept)
    pub fn dependencies_of(&self, key: &str) -> &[String] {
        self.dependencies.get(key).map_or(&[], Vec::as_slice)
    }

    /// Cells that read `key`
    pub fn dependents_of(&self, key: &str) -> &[String] {
        self.dependents.get(key).map_or(&[], Vec::as_slice)
    }

    /// Transitive dependencies of `key`, nearest first, each listed once
    pub fn precedent_chain(&self, key: &str) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut chain = Vec::new();
        let mut queue: VecDeque<&str> = self.dependencies_of(key).iter().map(String::as_str).collect();

        while let Some(current) = queue.pop_front() {
            if current == key || !seen.insert(current) {
                continue;
            }
            chain.push(current.to_string());
            queue.extend(self.dependencies_of(current).iter().map(String::as_str));
        }
        chain
    }

    /// Check `K ∈ dependencies[X] ⇔ X ∈ dependents[K]` and that no empty lists are stored
    pub fn is_consistent(&self) -> bool {
        let forward = self.dependencies.iter().all(|(cell, deps)| {
            !deps.is_empty() && deps.iter().all(|dep| self.dependents_of(dep).contains(cell))
        });
        let backward = self.dependents.iter().all(|(cell, readers)| {
            !readers.is_empty()
                && readers
                    .iter()
                    .all(|reader| self.dependencies_of(reader).contains(cell))
        });
        forward && backward
    }
}

/// Parse a batch of formulas and derive both edge maps.
///
/// Dependency lists keep the depth-first reference order of each formula,
/// duplicates included. Dependent lists follow first-seen order and name
/// each reader once. Cells are visited in key order, not submission order,
/// so readers of one cell are listed sorted: `{B1: "A1", A2: "A1"}` gives
/// `dependents[A1] = [A2, B1]`.
pub fn build(formulas: &BTreeMap<String, String>) -> TableExpressions {
    let mut graph = TableExpressions::new();
    // (source, target): target's formula reads source
    let mut relationships: Vec<(String, String)> = Vec::new();

    for (key, text) in formulas {
        let expr = parse(text);
        for reference in expr.references() {
            relationships.push((reference, key.clone()));
        }
        graph.table.insert(key.clone(), expr);
    }

    for (source, target) in relationships {
        graph
            .dependencies
            .entry(target.clone())
            .or_default()
            .push(source.clone());

        let readers = graph.dependents.entry(source).or_default();
        if !readers.contains(&target) {
            readers.push(target);
        }
    }

    graph
}

fn link(dependents: &mut EdgeMap, source: &str, reader: &str) {
    let readers = dependents.entry(source.to_string()).or_default();
    if !readers.iter().any(|r| r == reader) {
        readers.push(reader.to_string());
    }
}

fn unlink(dependents: &mut EdgeMap, source: &str, reader: &str) {
    if let Some(readers) = dependents.get_mut(source) {
        if let Some(pos) = readers.iter().position(|r| r == reader) {
            readers.remove(pos);
        }
        if readers.is_empty() {
            dependents.remove(source);
        }
    }
}

/// Fold a freshly built batch into an existing graph.
///
/// Every key defined by `incoming` is treated as re-edited: edges its old
/// formula had and the new one lacks are retired, new edges are added once,
/// and a formula that no longer references anything drops out of
/// `dependencies`. Untouched keys carry over unchanged.
///
/// The merged graph is checked for cycles before it is returned; on a cycle
/// the error names the offending cells and `existing` is left as it was.
pub fn merge(existing: &TableExpressions, incoming: &TableExpressions) -> SheetResult<TableExpressions> {
    let mut merged = existing.clone();

    let changed: BTreeSet<&String> = incoming
        .table
        .keys()
        .chain(incoming.dependencies.keys())
        .collect();

    for key in changed {
        let new_deps = incoming.dependencies_of(key);
        let old_deps = existing.dependencies_of(key);

        for stale in old_deps.iter().filter(|dep| !new_deps.contains(*dep)) {
            unlink(&mut merged.dependents, stale, key);
        }
        for dep in new_deps {
            link(&mut merged.dependents, dep, key);
        }

        if new_deps.is_empty() {
            merged.dependencies.remove(key);
        } else {
            merged.dependencies.insert(key.clone(), new_deps.to_vec());
        }
    }

    // reference targets first created by this batch
    for (key, readers) in &incoming.dependents {
        if !merged.dependents.contains_key(key) {
            merged.dependents.insert(key.clone(), readers.clone());
        }
    }

    for (key, expr) in &incoming.table {
        merged.table.insert(key.clone(), expr.clone());
    }

    if let Err(err) = detect_cycles(&merged) {
        warn!(cells = ?err.cycle_cells(), "rejecting edit batch that closes a cycle");
        return Err(err);
    }

    debug!(
        changed = incoming.table.len(),
        formulas = merged.table.len(),
        edges = merged.dependencies.values().map(Vec::len).sum::<usize>(),
        "merged dependency graph"
    );
    Ok(merged)
}

fn node_for<'a>(
    dag: &mut DiGraph<&'a str, ()>,
    nodes: &mut HashMap<&'a str, NodeIndex>,
    key: &'a str,
) -> NodeIndex {
    *nodes.entry(key).or_insert_with(|| dag.add_node(key))
}

/// Reject graphs with circular references.
///
/// Returns `CircularDependency` naming every cell that sits on a cycle
/// (members of a non-trivial strongly connected component, or self-references),
/// sorted by key.
pub fn detect_cycles(graph: &TableExpressions) -> SheetResult<()> {
    let mut dag: DiGraph<&str, ()> = DiGraph::new();
    let mut nodes: HashMap<&str, NodeIndex> = HashMap::new();

    for (reader, deps) in &graph.dependencies {
        let target = node_for(&mut dag, &mut nodes, reader);
        for dep in deps {
            let source = node_for(&mut dag, &mut nodes, dep);
            dag.update_edge(source, target, ());
        }
    }

    if toposort(&dag, None).is_ok() {
        return Ok(());
    }

    Err(SheetError::CircularDependency {
        cells: cycle_members(&dag),
    })
}

/// Keys on a cycle: members of non-trivial strongly connected components plus self-loops
pub(crate) fn cycle_members(dag: &DiGraph<&str, ()>) -> Vec<String> {
    let mut cells: Vec<String> = tarjan_scc(dag)
        .into_iter()
        .filter(|component| component.len() > 1 || dag.contains_edge(component[0], component[0]))
        .flatten()
        .map(|idx| dag[idx].to_string())
        .collect();
    cells.sort();
    cells
}
