//! Engine service: owned state, ordered command worker, snapshot publishing

pub mod service;
pub mod worker;

pub use service::{SheetEngine, Subscriber};
pub use worker::{spawn_engine, EngineHandle};
