// Property-based tests for incremental graph merging.
// CI: 256 cases (default). Soak: PROPTEST_CASES=10000 cargo test --release

use std::collections::BTreeMap;

use proptest::prelude::*;
use royalbit_sheetforge::core::{build, detect_cycles, merge, propagate, recalculate, Table, TableExpressions};

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

fn config_256() -> ProptestConfig {
    ProptestConfig {
        cases: std::env::var("PROPTEST_CASES")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(256),
        failure_persistence: None,
        ..ProptestConfig::default()
    }
}

/// Every key fits a 3x3 table
const KEYS: [&str; 9] = ["A1", "A2", "A3", "B1", "B2", "B3", "C1", "C2", "C3"];

// ---------------------------------------------------------------------------
// Generators
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
enum Operand {
    Number(u32),
    Cell(usize),
    /// Reference to the cell the formula is assigned to
    Own,
    Blank,
}

#[derive(Debug, Clone)]
enum FormulaShape {
    Raw(&'static str),
    /// The same reference on both sides of an operator
    Twice(usize, char),
    Chain(Operand, Vec<(char, Operand)>),
}

fn arb_operand() -> impl Strategy<Value = Operand> {
    prop_oneof![
        2 => (0u32..100).prop_map(Operand::Number),
        5 => (0..KEYS.len()).prop_map(Operand::Cell),
        1 => Just(Operand::Own),
        1 => Just(Operand::Blank),
    ]
}

fn arb_op() -> impl Strategy<Value = char> {
    prop::sample::select(vec!['+', '-', '*', '/'])
}

fn arb_shape() -> impl Strategy<Value = FormulaShape> {
    prop_oneof![
        1 => prop::sample::select(vec!["", "-", "   ", "x + 1"]).prop_map(FormulaShape::Raw),
        1 => ((0..KEYS.len()), arb_op()).prop_map(|(cell, op)| FormulaShape::Twice(cell, op)),
        4 => (arb_operand(), prop::collection::vec((arb_op(), arb_operand()), 0..4))
            .prop_map(|(first, rest)| FormulaShape::Chain(first, rest)),
    ]
}

fn render_operand(operand: &Operand, own: &str) -> String {
    match operand {
        Operand::Number(n) => n.to_string(),
        Operand::Cell(i) => KEYS[*i].to_string(),
        Operand::Own => own.to_string(),
        Operand::Blank => String::new(),
    }
}

fn render(shape: &FormulaShape, own: &str) -> String {
    match shape {
        FormulaShape::Raw(text) => text.to_string(),
        FormulaShape::Twice(i, op) => format!("{} {op} {}", KEYS[*i], KEYS[*i]),
        FormulaShape::Chain(first, rest) => {
            let mut text = render_operand(first, own);
            for (op, operand) in rest {
                text.push_str(&format!(" {op} {}", render_operand(operand, own)));
            }
            text
        }
    }
}

/// One edit batch: 1..=3 cells, later entries for the same key win
fn arb_batch() -> impl Strategy<Value = BTreeMap<String, String>> {
    prop::collection::vec(((0..KEYS.len()), arb_shape()), 1..4).prop_map(|entries| {
        entries
            .into_iter()
            .map(|(i, shape)| (KEYS[i].to_string(), render(&shape, KEYS[i])))
            .collect()
    })
}

fn arb_batches() -> impl Strategy<Value = Vec<BTreeMap<String, String>>> {
    prop::collection::vec(arb_batch(), 1..16)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn sorted_edges(map: &BTreeMap<String, Vec<String>>) -> BTreeMap<String, Vec<String>> {
    map.iter()
        .map(|(k, v)| {
            let mut v = v.clone();
            v.sort();
            (k.clone(), v)
        })
        .collect()
}

/// Table contents compared bitwise so NaN cells compare equal
fn bits(table: &Table) -> Vec<u32> {
    table.data().iter().map(|v| v.to_bits()).collect()
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(config_256())]
    #[test]
    fn merge_matches_full_rebuild(batches in arb_batches()) {
        let mut live = TableExpressions::new();
        let mut all: BTreeMap<String, String> = BTreeMap::new();

        for batch in &batches {
            let mut candidate = all.clone();
            candidate.extend(batch.clone());
            let rebuilt = build(&candidate);

            match merge(&live, &build(batch)) {
                Ok(merged) => {
                    prop_assert!(detect_cycles(&rebuilt).is_ok());
                    prop_assert_eq!(&merged.table, &rebuilt.table);
                    prop_assert_eq!(&merged.dependencies, &rebuilt.dependencies);
                    prop_assert_eq!(sorted_edges(&merged.dependents), sorted_edges(&rebuilt.dependents));
                    prop_assert!(merged.is_consistent());
                    live = merged;
                    all = candidate;
                }
                Err(err) => {
                    prop_assert!(!err.cycle_cells().is_empty());
                    prop_assert!(detect_cycles(&rebuilt).is_err());
                }
            }
        }
    }
}

proptest! {
    #![proptest_config(config_256())]
    #[test]
    fn layered_and_ordered_propagation_settle_alike(batches in arb_batches()) {
        let mut live = TableExpressions::new();
        let mut layered = Table::new(3, 3).unwrap();
        let mut ordered = Table::new(3, 3).unwrap();

        for batch in &batches {
            let Ok(merged) = merge(&live, &build(batch)) else {
                continue;
            };
            let roots: Vec<String> = batch.keys().cloned().collect();

            propagate(&merged, &mut layered, &roots);
            recalculate(&merged, &mut ordered, &roots).unwrap();
            prop_assert_eq!(bits(&layered), bits(&ordered));
            live = merged;
        }
    }
}
