//! SheetForge API Server binary
//!
//! HTTP REST API over a single recalculation engine.

use clap::Parser;
use royalbit_sheetforge::api::{run_api_server, server::ApiConfig};
use royalbit_sheetforge::types::{EngineConfig, DEFAULT_HEIGHT, DEFAULT_WIDTH};

#[derive(Parser, Debug)]
#[command(name = "sheetforge-server")]
#[command(version)]
#[command(about = "SheetForge API Server - HTTP REST API for incremental recalculation")]
#[command(long_about = r#"
SheetForge API Server

Hosts one engine and serialises every edit batch through it:
  - POST /api/v1/edits      - Apply a batch of cell formulas
  - GET  /api/v1/snapshot   - Current formulas and value grid
  - GET  /api/v1/cells/{key} - Formula, value and edges of one cell

Additional endpoints:
  - GET  /health            - Health check
  - GET  /version           - Server version info
  - GET  /                  - API documentation

Example usage:
  sheetforge-server                          # 12x20 table on localhost:8080
  sheetforge-server --width 5 --height 5 --port 3000

  curl -X POST http://localhost:8080/api/v1/edits \
    -H "Content-Type: application/json" \
    -d '{"expressions": {"A1": "42", "B4": "A1 + 1"}}'
"#)]
struct Args {
    /// Host address to bind to (use 0.0.0.0 for all interfaces)
    #[arg(short = 'H', long, default_value = "127.0.0.1", env = "SHEETFORGE_HOST")]
    host: String,

    /// Port to listen on
    #[arg(short, long, default_value = "8080", env = "SHEETFORGE_PORT")]
    port: u16,

    /// Number of columns in the table
    #[arg(long, default_value_t = DEFAULT_WIDTH, env = "SHEETFORGE_WIDTH")]
    width: usize,

    /// Number of rows in the table
    #[arg(long, default_value_t = DEFAULT_HEIGHT, env = "SHEETFORGE_HEIGHT")]
    height: usize,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = ApiConfig {
        host: args.host,
        port: args.port,
        engine: EngineConfig::new(args.width, args.height)?,
    };

    run_api_server(config).await
}
