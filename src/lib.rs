//! SheetForge - incremental spreadsheet recalculation engine
//!
//! Formulas are parsed into left-folded expression trees, a dependency graph
//! is derived and merged incrementally as cells are edited, and a dense `f32`
//! grid of results is kept consistent by recomputing only what an edit
//! affects.
//!
//! # Example
//!
//! ```
//! use royalbit_sheetforge::engine::SheetEngine;
//! use royalbit_sheetforge::types::{edit_batch, EngineConfig};
//!
//! let mut engine = SheetEngine::new(EngineConfig::new(5, 5)?)?;
//! engine.apply(edit_batch([("A1", "42"), ("B4", "A1 + 1")]))?;
//!
//! assert_eq!(engine.table().get("B4"), Some(43.0));
//! # Ok::<(), royalbit_sheetforge::error::SheetError>(())
//! ```

pub mod api;
pub mod cli;
pub mod core;
pub mod engine;
pub mod error;
pub mod parser;
pub mod types;

// Re-export commonly used types
pub use error::{SheetError, SheetResult};
pub use types::{EditBatch, EngineConfig, Snapshot};
