use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::core::ExprNode;
use crate::error::{SheetError, SheetResult};

//==============================================================================
// Edit requests
//==============================================================================

/// One atomic edit request: cellKey → raw formula text, iterated in key order
pub type EditBatch = BTreeMap<String, String>;

/// Build an edit batch from `(key, formula)` pairs
pub fn edit_batch<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> EditBatch
where
    K: Into<String>,
    V: Into<String>,
{
    entries
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

//==============================================================================
// Engine configuration
//==============================================================================

pub const DEFAULT_WIDTH: usize = 12;
pub const DEFAULT_HEIGHT: usize = 20;

/// Table dimensions fixed at engine creation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub width: usize,
    pub height: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
        }
    }
}

impl EngineConfig {
    pub fn new(width: usize, height: usize) -> SheetResult<Self> {
        let config = Self { width, height };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> SheetResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(SheetError::InvalidDimensions {
                width: self.width,
                height: self.height,
            });
        }
        Ok(())
    }
}

//==============================================================================
// Published snapshot
//==============================================================================

/// Presentation grid: each row is `[row label, cell text, ...]`
pub type RowData = Vec<Vec<String>>;

/// State published to subscribers after every batch
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub parsed_expressions: BTreeMap<String, ExprNode>,
    pub raw_expressions: BTreeMap<String, String>,
    pub row_data: RowData,
}

/// Empty presentation grid with 1-based row labels
pub fn blank_row_data(width: usize, height: usize) -> RowData {
    (1..=height)
        .map(|row| {
            std::iter::once(row.to_string())
                .chain(std::iter::repeat(String::new()).take(width))
                .collect()
        })
        .collect()
}

/// Render a stored value the way the grid shows it
pub fn format_value(value: f32) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value == f32::INFINITY {
        "Infinity".to_string()
    } else if value == f32::NEG_INFINITY {
        "-Infinity".to_string()
    } else if value == 0.0 {
        // also folds -0
        "0".to_string()
    } else {
        format!("{}", f64::from(value))
    }
}

//==============================================================================
// Batch results
//==============================================================================

/// Per-cell problem found while applying a batch
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CellDiagnostic {
    /// The cell was evaluated but lies outside the table, so nothing was stored
    OutOfBounds { key: String },
    /// The formula has operands that did not parse; the cell evaluates to NaN
    UnknownOperand { key: String, formula: String },
    /// Multi-letter column decoded by its first letter; the value lands in `shares_with`'s slot
    ColumnAliased { key: String, shares_with: String },
}

impl CellDiagnostic {
    pub fn key(&self) -> &str {
        match self {
            CellDiagnostic::OutOfBounds { key }
            | CellDiagnostic::UnknownOperand { key, .. }
            | CellDiagnostic::ColumnAliased { key, .. } => key,
        }
    }
}

/// Outcome of one applied edit batch
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchReport {
    /// Cells evaluated, in evaluation order, with their computed values
    pub evaluated: Vec<(String, f64)>,
    pub diagnostics: Vec<CellDiagnostic>,
    pub max_depth: usize,
}

impl BatchReport {
    pub fn value_of(&self, key: &str) -> Option<f64> {
        self.evaluated
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| *v)
    }
}

/// Everything known about one cell
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CellInfo {
    pub key: String,
    pub raw: Option<String>,
    pub parsed: Option<ExprNode>,
    /// `None` when the key is outside the table
    pub value: Option<f32>,
    pub dependencies: Vec<String>,
    pub dependents: Vec<String>,
}

//==============================================================================
// Sheet files
//==============================================================================

/// On-disk sheet description (YAML or JSON)
#[derive(Debug, Clone, PartialEq)]
pub struct SheetFile {
    pub config: EngineConfig,
    pub cells: EditBatch,
}
