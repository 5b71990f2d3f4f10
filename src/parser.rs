use crate::error::{SheetError, SheetResult};
use crate::types::{EditBatch, EngineConfig, SheetFile, DEFAULT_HEIGHT, DEFAULT_WIDTH};
use serde_yaml::Value;
use std::path::Path;

/// Load a sheet file from disk (YAML, or JSON since JSON is valid YAML)
pub fn parse_sheet_file(path: &Path) -> SheetResult<SheetFile> {
    let content = std::fs::read_to_string(path)?;
    parse_sheet_str(&content)
}

/// Parse sheet file content
///
/// ```yaml
/// width: 5      # optional, defaults to 12
/// height: 5     # optional, defaults to 20
/// cells:
///   A1: 42
///   B4: A1 + 1
/// ```
pub fn parse_sheet_str(content: &str) -> SheetResult<SheetFile> {
    let yaml: Value = serde_yaml::from_str(content)?;
    let Value::Mapping(map) = &yaml else {
        return Err(SheetError::Parse(
            "Sheet file must be a mapping with a 'cells' section".to_string(),
        ));
    };

    let width = extract_dimension(map.get("width"), "width", DEFAULT_WIDTH)?;
    let height = extract_dimension(map.get("height"), "height", DEFAULT_HEIGHT)?;
    let config = EngineConfig::new(width, height)?;

    let cells = match map.get("cells") {
        Some(Value::Mapping(cells)) => extract_cells(cells)?,
        Some(Value::Null) | None => EditBatch::new(),
        Some(other) => {
            return Err(SheetError::Parse(format!(
                "'cells' must be a mapping of cell key to formula, found {}",
                describe(other)
            )))
        }
    };

    Ok(SheetFile { config, cells })
}

fn extract_dimension(value: Option<&Value>, name: &str, default: usize) -> SheetResult<usize> {
    match value {
        None | Some(Value::Null) => Ok(default),
        Some(Value::Number(n)) => n
            .as_u64()
            .map(|n| n as usize)
            .ok_or_else(|| SheetError::Parse(format!("'{name}' must be a positive integer, found {n}"))),
        Some(other) => Err(SheetError::Parse(format!(
            "'{name}' must be a positive integer, found {}",
            describe(other)
        ))),
    }
}

fn extract_cells(cells: &serde_yaml::Mapping) -> SheetResult<EditBatch> {
    let mut batch = EditBatch::new();
    for (key, formula) in cells {
        let Value::String(key) = key else {
            return Err(SheetError::Parse(format!(
                "Cell keys must be strings like 'A1', found {}",
                describe(key)
            )));
        };
        let text = match formula {
            Value::String(s) => s.clone(),
            Value::Number(n) => n.to_string(),
            Value::Null => String::new(),
            other => {
                return Err(SheetError::Parse(format!(
                    "Formula for '{key}' must be text or a number, found {}",
                    describe(other)
                )))
            }
        };
        batch.insert(key.clone(), text);
    }
    Ok(batch)
}

fn describe(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Sequence(_) => "a list",
        Value::Mapping(_) => "a mapping",
        Value::Tagged(_) => "a tagged value",
    }
}
