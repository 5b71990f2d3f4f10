//! Recalculation core tests against the public API
//!
//! Parser shapes, graph build and merge, and propagation over small tables.

use pretty_assertions::assert_eq;
use royalbit_sheetforge::core::{
    build, merge, parse, propagate, recalculate, ExprNode, Operation, Table, TableExpressions,
};
use std::collections::BTreeMap;

fn formulas(entries: &[(&str, &str)]) -> BTreeMap<String, String> {
    entries
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn keys(list: &[&str]) -> Vec<String> {
    list.iter().map(|k| k.to_string()).collect()
}

// ═══════════════════════════════════════════════════════════════════════════
// PARSER
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_parse_reference_plus_literal() {
    assert_eq!(
        parse("A1 + 10"),
        ExprNode::operator(
            Operation::Add,
            ExprNode::reference("A1"),
            ExprNode::literal(10.0)
        )
    );
}

#[test]
fn test_parse_has_no_unary_minus() {
    assert_eq!(
        parse("-2"),
        ExprNode::operator(Operation::Sub, ExprNode::unknown(""), ExprNode::literal(2.0))
    );
}

#[test]
fn test_parse_blank_is_unknown() {
    assert_eq!(parse(""), ExprNode::unknown(""));
    assert_eq!(parse("   "), ExprNode::unknown(""));
}

#[test]
fn test_parse_left_fold_ignores_precedence() {
    // ((1 + 2) * 3)
    let expr = parse("1 + 2 * 3");
    assert_eq!(
        expr,
        ExprNode::operator(
            Operation::Mul,
            ExprNode::operator(Operation::Add, ExprNode::literal(1.0), ExprNode::literal(2.0)),
            ExprNode::literal(3.0)
        )
    );
}

#[test]
fn test_parse_leaves_equal_operators_plus_one() {
    let samples = [
        "",
        "A1",
        "A1 + 10",
        "-2",
        "1 + 2 * 3 / 4 - 5",
        "A1 / B4 * 3 - B2",
        "++--",
        "foo * bar",
        "3.5e2 / Z9 + ",
        "a1 + B",
    ];
    for text in samples {
        let expr = parse(text);
        assert_eq!(
            expr.leaf_count(),
            expr.operator_count() + 1,
            "leaf/operator mismatch for {text:?}"
        );
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// GRAPH BUILD / MERGE
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_build_edge_maps() {
    let graph = build(&formulas(&[
        ("A10", "42"),
        ("B100", "A10 + 1"),
        ("C5", "A10 / B100 * 3"),
    ]));

    let mut dependencies = BTreeMap::new();
    dependencies.insert("B100".to_string(), keys(&["A10"]));
    dependencies.insert("C5".to_string(), keys(&["A10", "B100"]));
    assert_eq!(graph.dependencies, dependencies);

    let mut dependents = BTreeMap::new();
    dependents.insert("A10".to_string(), keys(&["B100", "C5"]));
    dependents.insert("B100".to_string(), keys(&["C5"]));
    assert_eq!(graph.dependents, dependents);

    assert_eq!(graph.table.len(), 3);
    assert!(graph.is_consistent());
}

#[test]
fn test_merge_retires_stale_dependent() {
    let live = build(&formulas(&[("A1", "1"), ("B1", "2"), ("A2", "A1+B1")]));
    let merged = merge(&live, &build(&formulas(&[("A2", "B1+5")]))).unwrap();

    assert!(!merged.dependents_of("A1").contains(&"A2".to_string()));
    assert_eq!(merged.dependents_of("B1"), ["A2"]);
    assert_eq!(merged.dependencies_of("A2"), ["B1"]);
    assert!(merged.is_consistent());
}

#[test]
fn test_merge_formula_to_literal_drops_edges() {
    let live = build(&formulas(&[("A1", "1"), ("B1", "A1 * 2")]));
    let merged = merge(&live, &build(&formulas(&[("B1", "7")]))).unwrap();

    assert!(merged.dependencies_of("B1").is_empty());
    assert!(merged.dependents_of("A1").is_empty());
    assert!(!merged.dependents.contains_key("A1"));
    assert!(merged.is_consistent());
}

#[test]
fn test_merge_rejects_cycle_and_keeps_existing() {
    let live = build(&formulas(&[("A1", "1"), ("B1", "A1 + 1"), ("C1", "B1 + 1")]));
    let before = live.clone();

    let err = merge(&live, &build(&formulas(&[("A1", "C1")]))).unwrap_err();
    assert_eq!(err.cycle_cells(), ["A1", "B1", "C1"]);
    assert_eq!(live, before);
}

// ═══════════════════════════════════════════════════════════════════════════
// PROPAGATION
// ═══════════════════════════════════════════════════════════════════════════

fn five_by_five() -> TableExpressions {
    build(&formulas(&[
        ("A1", "42"),
        ("B2", "5"),
        ("B4", "A1 + 1"),
        ("A3", "A1 / B4 * 3 - B2"),
    ]))
}

#[test]
fn test_propagate_five_by_five() {
    let graph = five_by_five();
    let mut table = Table::new(5, 5).unwrap();
    propagate(&graph, &mut table, &keys(&["A1", "B2"]));

    assert_eq!(table.get("A1"), Some(42.0));
    assert_eq!(table.get("B4"), Some(43.0));
    assert_eq!(table.get("B2"), Some(5.0));
    let a3 = table.get("A3").unwrap();
    assert!((f64::from(a3) - (-2.069767475128174)).abs() < 1e-6, "A3 = {a3}");

    let nonzero = table.data().iter().filter(|v| **v != 0.0).count();
    assert_eq!(nonzero, 4);
}

#[test]
fn test_propagate_is_idempotent_when_settled() {
    let graph = five_by_five();
    let roots = keys(&["A1", "B2"]);
    let mut table = Table::new(5, 5).unwrap();

    propagate(&graph, &mut table, &roots);
    let settled = table.clone();
    propagate(&graph, &mut table, &roots);
    assert_eq!(table, settled);
}

#[test]
fn test_recalculate_agrees_with_propagate() {
    let graph = five_by_five();
    let roots = keys(&["A1", "B2"]);

    let mut layered = Table::new(5, 5).unwrap();
    propagate(&graph, &mut layered, &roots);

    let mut ordered = Table::new(5, 5).unwrap();
    let evaluations = recalculate(&graph, &mut ordered, &roots).unwrap();

    assert_eq!(ordered, layered);
    // each affected cell exactly once
    assert_eq!(evaluations.len(), 4);
}

#[test]
fn test_out_of_bounds_cell_is_reported() {
    let graph = build(&formulas(&[("A1", "1"), ("E9", "A1 + 1")]));
    let mut table = Table::new(3, 3).unwrap();
    let evaluations = recalculate(&graph, &mut table, &keys(&["A1"])).unwrap();

    let e9 = evaluations.iter().find(|e| e.key == "E9").unwrap();
    assert!(e9.is_out_of_bounds());
    assert_eq!(e9.value, 2.0);
    assert_eq!(table.get("E9"), None);
}
