//! Single-consumer engine worker
//!
//! The engine runs on its own task and drains one ordered command channel.
//! Producers hold cloned [`EngineHandle`]s; a batch is applied to completion
//! before the next command is read, so edits land strictly in arrival order.

use std::sync::Arc;

use tokio::sync::mpsc::{self, UnboundedReceiver};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::service::SheetEngine;
use crate::error::{SheetError, SheetResult};
use crate::types::{BatchReport, CellInfo, EditBatch, EngineConfig, Snapshot};

/// Inbound queue depth before producers wait
const COMMAND_BUFFER: usize = 256;

enum EngineCommand {
    Edit {
        batch: EditBatch,
        reply: oneshot::Sender<SheetResult<BatchReport>>,
    },
    Subscribe {
        reply: oneshot::Sender<UnboundedReceiver<Arc<Snapshot>>>,
    },
    Snapshot {
        reply: oneshot::Sender<Snapshot>,
    },
    Cell {
        key: String,
        reply: oneshot::Sender<CellInfo>,
    },
}

/// Cloneable producer side of the engine worker
#[derive(Clone)]
pub struct EngineHandle {
    commands: mpsc::Sender<EngineCommand>,
    config: EngineConfig,
}

fn closed() -> SheetError {
    SheetError::EngineUnavailable("engine worker has stopped".to_string())
}

impl EngineHandle {
    pub fn config(&self) -> EngineConfig {
        self.config
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> EngineCommand,
    ) -> SheetResult<T> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(make(reply))
            .await
            .map_err(|_| closed())?;
        response.await.map_err(|_| closed())
    }

    /// Submit one edit batch and wait for it to be applied
    pub async fn submit(&self, batch: EditBatch) -> SheetResult<BatchReport> {
        self.request(|reply| EngineCommand::Edit { batch, reply })
            .await?
    }

    /// Attach a new subscriber; the first message is the current snapshot
    pub async fn subscribe(&self) -> SheetResult<UnboundedReceiver<Arc<Snapshot>>> {
        self.request(|reply| EngineCommand::Subscribe { reply }).await
    }

    pub async fn snapshot(&self) -> SheetResult<Snapshot> {
        self.request(|reply| EngineCommand::Snapshot { reply }).await
    }

    pub async fn cell(&self, key: impl Into<String>) -> SheetResult<CellInfo> {
        let key = key.into();
        self.request(|reply| EngineCommand::Cell { key, reply }).await
    }
}

/// Start the engine on a tokio task.
///
/// The task ends once every [`EngineHandle`] has been dropped.
pub fn spawn_engine(config: EngineConfig) -> SheetResult<(EngineHandle, JoinHandle<()>)> {
    let engine = SheetEngine::new(config)?;
    let (commands, inbox) = mpsc::channel(COMMAND_BUFFER);
    let task = tokio::spawn(run(engine, inbox));
    Ok((EngineHandle { commands, config }, task))
}

async fn run(mut engine: SheetEngine, mut inbox: mpsc::Receiver<EngineCommand>) {
    info!(
        width = engine.config().width,
        height = engine.config().height,
        "sheet engine started"
    );

    while let Some(command) = inbox.recv().await {
        match command {
            EngineCommand::Edit { batch, reply } => {
                let result = engine.apply(batch);
                // the requester may have given up waiting; the batch is applied regardless
                if reply.send(result).is_err() {
                    debug!("edit requester went away before the reply");
                }
            }
            EngineCommand::Subscribe { reply } => {
                let (tx, rx) = mpsc::unbounded_channel();
                engine.subscribe(tx);
                let _ = reply.send(rx);
            }
            EngineCommand::Snapshot { reply } => {
                let _ = reply.send(engine.snapshot());
            }
            EngineCommand::Cell { key, reply } => {
                let _ = reply.send(engine.cell(&key));
            }
        }
    }

    info!("sheet engine stopped");
}
