use thiserror::Error;

pub type SheetResult<T> = Result<T, SheetError>;

#[derive(Error, Debug)]
pub enum SheetError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Circular dependency detected: {}", .cells.join(", "))]
    CircularDependency { cells: Vec<String> },

    #[error("Invalid table dimensions {width}x{height}: width and height must be positive")]
    InvalidDimensions { width: usize, height: usize },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Engine unavailable: {0}")]
    EngineUnavailable(String),
}

impl SheetError {
    /// Cells named by a circular dependency error, empty for every other kind
    pub fn cycle_cells(&self) -> &[String] {
        match self {
            SheetError::CircularDependency { cells } => cells,
            _ => &[],
        }
    }
}
