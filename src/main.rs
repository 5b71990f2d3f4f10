use clap::{Parser, Subcommand};
use royalbit_sheetforge::cli;
use royalbit_sheetforge::error::SheetResult;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "sheetforge")]
#[command(about = "Incremental spreadsheet recalculation from YAML or JSON sheet files")]
#[command(long_about = "SheetForge - Incremental spreadsheet recalculation

Cells hold arithmetic formulas over + - * / with numeric literals and
references like A1 or C12. Editing a cell recomputes exactly the cells that
read it, in dependency order. Cycles are rejected before anything changes.

SHEET FILE:
  width: 5          # optional, defaults to 12
  height: 5         # optional, defaults to 20
  cells:
    A1: 42
    B4: A1 + 1

COMMANDS:
  calculate   - Evaluate every cell and print the value grid
  validate    - Check sheets for cycles and malformed formulas
  audit       - Show a cell's formula, value and dependency chain

EXAMPLES:
  sheetforge calculate sheet.yaml
  sheetforge calculate sheet.yaml --json
  sheetforge validate a.yaml b.yaml
  sheetforge audit sheet.yaml B4")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate every cell in a sheet file
    Calculate {
        /// Path to the sheet file (YAML or JSON)
        file: PathBuf,

        /// Show each evaluated cell in evaluation order
        #[arg(short, long)]
        verbose: bool,

        /// Print the snapshot as JSON instead of a grid
        #[arg(long)]
        json: bool,
    },

    /// Check sheet files for cycles, unknown operands and out-of-range cells
    Validate {
        /// Path to sheet file(s) to validate
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Show the audit trail for one cell
    Audit {
        /// Path to the sheet file
        file: PathBuf,

        /// Cell key, e.g. B4
        cell: String,
    },
}

fn main() -> SheetResult<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Calculate {
            file,
            verbose,
            json,
        } => cli::calculate(file, verbose, json),

        Commands::Validate { files } => cli::validate(files),

        Commands::Audit { file, cell } => cli::audit(file, cell),
    }
}
