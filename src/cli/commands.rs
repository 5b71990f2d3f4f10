use crate::core::table::encode_key;
use crate::engine::SheetEngine;
use crate::error::{SheetError, SheetResult};
use crate::parser;
use crate::types::{BatchReport, CellDiagnostic, SheetFile};
use colored::Colorize;
use std::path::{Path, PathBuf};

/// Format a number for display, removing unnecessary decimal places
fn format_number(n: f64) -> String {
    if !n.is_finite() {
        return crate::types::format_value(n as f32);
    }
    let rounded = (n * 1e6).round() / 1e6;
    format!("{:.6}", rounded)
        .trim_end_matches('0')
        .trim_end_matches('.')
        .to_string()
}

fn column_label(column: usize) -> String {
    encode_key(column, 0)
        .map(|key| key.trim_end_matches('1').to_string())
        .unwrap_or_else(|| "?".to_string())
}

/// Load a sheet and apply all of its cells as one batch
fn load_engine(file: &Path) -> SheetResult<(SheetFile, SheetEngine, BatchReport)> {
    let sheet = parser::parse_sheet_file(file)?;
    let mut engine = SheetEngine::new(sheet.config)?;
    let report = if sheet.cells.is_empty() {
        BatchReport::default()
    } else {
        engine.apply(sheet.cells.clone())?
    };
    Ok((sheet, engine, report))
}

fn print_diagnostics(diagnostics: &[CellDiagnostic]) {
    for diagnostic in diagnostics {
        match diagnostic {
            CellDiagnostic::OutOfBounds { key } => println!(
                "   {} {} is outside the table; value not stored",
                "⚠️".yellow(),
                key.bright_blue()
            ),
            CellDiagnostic::UnknownOperand { key, formula } => println!(
                "   {} {} has an unrecognised operand: {}",
                "⚠️".yellow(),
                key.bright_blue(),
                formula.yellow()
            ),
            CellDiagnostic::ColumnAliased { key, shares_with } => println!(
                "   {} {} is stored in the same slot as {}",
                "⚠️".yellow(),
                key.bright_blue(),
                shares_with.bright_blue()
            ),
        }
    }
}

/// Execute the calculate command
pub fn calculate(file: PathBuf, verbose: bool, json: bool) -> SheetResult<()> {
    let (sheet, engine, report) = load_engine(&file)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&engine.snapshot())?);
        return Ok(());
    }

    println!("{}", "🔥 SheetForge - Calculating cells".bold().green());
    println!("   File: {}", file.display());
    println!(
        "   Table: {}x{}, {} cells\n",
        sheet.config.width,
        sheet.config.height,
        sheet.cells.len()
    );

    if verbose {
        println!("{}", "🧮 Evaluation order:".cyan());
        for (key, value) in &report.evaluated {
            let formula = sheet.cells.get(key).map(String::as_str).unwrap_or("");
            println!(
                "   {} = {} {}",
                key.bright_blue(),
                format_number(*value).bold().green(),
                formula.yellow()
            );
        }
        println!("   Depth: {}\n", report.max_depth);
    }

    println!("{}", "✅ Calculation Results:".bold().green());
    let snapshot = engine.snapshot();
    let header: String = (0..sheet.config.width)
        .map(|col| format!("{:>10}", column_label(col)))
        .collect();
    println!("   {:>4} {}", "", header.cyan());
    for row in &snapshot.row_data {
        let (label, cells) = row.split_first().map_or(("", &[][..]), |(l, c)| (l.as_str(), c));
        let line: String = cells.iter().map(|c| format!("{c:>10}")).collect();
        println!("   {:>4} {}", label.cyan(), line);
    }

    if !report.diagnostics.is_empty() {
        println!();
        println!("{}", "⚠️  Diagnostics:".bold().yellow());
        print_diagnostics(&report.diagnostics);
    }

    Ok(())
}

/// Execute the validate command over one or more sheet files
pub fn validate(files: Vec<PathBuf>) -> SheetResult<()> {
    let mut failed = Vec::new();

    for file in &files {
        println!("{}", "✅ Validating sheet".bold().green());
        println!("   File: {}", file.display());

        match validate_file(file) {
            Ok(diagnostics) if diagnostics.is_empty() => {
                println!("   {}\n", "All formulas are well-formed and acyclic".green());
            }
            Ok(diagnostics) => {
                print_diagnostics(&diagnostics);
                println!();
            }
            Err(e) => {
                println!("   {}\n", format!("❌ {e}").bold().red());
                failed.push(file.display().to_string());
            }
        }
    }

    if failed.is_empty() {
        Ok(())
    } else {
        Err(SheetError::Validation(format!(
            "{} of {} files failed validation: {}",
            failed.len(),
            files.len(),
            failed.join(", ")
        )))
    }
}

fn validate_file(file: &Path) -> SheetResult<Vec<CellDiagnostic>> {
    // applying the sheet runs the cycle check before anything is evaluated
    let (_, _, report) = load_engine(file)?;
    Ok(report.diagnostics)
}

/// Execute the audit command - show a cell's formula and dependency chain
pub fn audit(file: PathBuf, cell: String) -> SheetResult<()> {
    println!("{}", "🔍 SheetForge - Audit Trail".bold().green());
    println!("   File: {}", file.display());
    println!("   Cell: {}\n", cell.bright_blue().bold());

    let (_, engine, _) = load_engine(&file)?;
    let info = engine.cell(&cell);

    println!("{}", "📋 Cell Information:".bold().cyan());
    match &info.raw {
        Some(raw) => println!("   Formula: {}", raw.bright_yellow()),
        None => println!("   Formula: {}", "(empty)".dimmed()),
    }
    if let Some(parsed) = &info.parsed {
        println!("   Parsed:  {}", parsed.to_string().yellow());
    }
    match info.value {
        Some(value) => println!("   Value:   {}", format_number(f64::from(value)).bold().green()),
        None => println!("   Value:   {}", "outside the table".red()),
    }
    println!();

    println!("{}", "🌳 Depends on:".bold().cyan());
    let chain = engine.expressions().precedent_chain(&cell);
    if chain.is_empty() {
        println!("   No dependencies (literal value)");
    } else {
        for key in &chain {
            let value = engine
                .table()
                .get(key)
                .map(|v| format_number(f64::from(v)))
                .unwrap_or_else(|| "-".to_string());
            let formula = engine
                .expressions()
                .formula(key)
                .map(|f| f.to_string())
                .unwrap_or_default();
            println!(
                "   └─ {} = {} {}",
                key.bright_blue(),
                value.green(),
                formula.yellow()
            );
        }
    }
    println!();

    println!("{}", "📣 Read by:".bold().cyan());
    if info.dependents.is_empty() {
        println!("   No dependents");
    } else {
        for key in &info.dependents {
            println!("   └─ {}", key.bright_blue());
        }
    }

    println!();
    println!("{}", "✅ Audit complete".bold().green());
    Ok(())
}
