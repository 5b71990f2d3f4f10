//! Core recalculation engine: parser, dependency graph, value table, propagation

pub mod expression;
pub mod graph;
pub mod recompute;
pub mod table;

pub use expression::{parse, ExprNode, Operation};
pub use graph::{build, detect_cycles, merge, TableExpressions};
pub use recompute::{evaluate, propagate, recalculate, schedule, Evaluation, Propagation, Schedule};
pub use table::{decode_key, storage_alias, CellWrite, Table};
