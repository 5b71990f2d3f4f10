//! SheetForge API Server module
//!
//! Provides an HTTP REST API over the engine worker.
//! Run with `sheetforge-server`.

pub mod handlers;
pub mod server;

pub use server::{build_router, run_api_server};
