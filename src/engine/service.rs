//! Owned engine state and the publish contract
//!
//! A [`SheetEngine`] holds everything one compute context owns: the raw
//! formula text, the parsed graph, the numeric table, the presentation grid
//! and the subscriber list. Batches are applied one at a time, and every
//! successful batch ends with a snapshot sent to every live subscriber.

use std::sync::Arc;

use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, warn};

use crate::core::{
    build, evaluate, merge, schedule, storage_alias, CellWrite, Table, TableExpressions,
};
use crate::error::{SheetError, SheetResult};
use crate::types::{
    blank_row_data, format_value, BatchReport, CellDiagnostic, CellInfo, EditBatch, EngineConfig,
    RowData, Snapshot,
};

/// Receives a snapshot after every applied batch
pub type Subscriber = UnboundedSender<Arc<Snapshot>>;

pub struct SheetEngine {
    config: EngineConfig,
    raw_expressions: EditBatch,
    expressions: TableExpressions,
    table: Table,
    row_data: RowData,
    subscribers: Vec<Subscriber>,
}

impl SheetEngine {
    pub fn new(config: EngineConfig) -> SheetResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            raw_expressions: EditBatch::new(),
            expressions: TableExpressions::new(),
            table: Table::new(config.width, config.height)?,
            row_data: blank_row_data(config.width, config.height),
            subscribers: Vec::new(),
        })
    }

    pub fn config(&self) -> EngineConfig {
        self.config
    }

    pub fn expressions(&self) -> &TableExpressions {
        &self.expressions
    }

    pub fn table(&self) -> &Table {
        &self.table
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Apply one edit batch and publish the result.
    ///
    /// The batch is parsed and merged into the live graph first; if the merge
    /// closes a cycle the whole batch is rejected and nothing changes. Otherwise
    /// the edited cells and everything downstream are recomputed in depth order.
    pub fn apply(&mut self, batch: EditBatch) -> SheetResult<BatchReport> {
        if batch.is_empty() {
            return Err(SheetError::Validation(
                "Edit batch must contain at least one cell".to_string(),
            ));
        }

        let incoming = build(&batch);
        let merged = merge(&self.expressions, &incoming)?;
        let roots: Vec<String> = batch.keys().cloned().collect();
        let order = schedule(&merged, &roots)?;

        let mut report = BatchReport {
            max_depth: order.max_depth(),
            ..BatchReport::default()
        };
        for (key, expr) in &incoming.table {
            if expr.has_unknown() {
                report.diagnostics.push(CellDiagnostic::UnknownOperand {
                    key: key.clone(),
                    formula: batch[key].clone(),
                });
            }
            if self.table.index_of(key).is_some() {
                if let Some(shares_with) = storage_alias(key) {
                    report.diagnostics.push(CellDiagnostic::ColumnAliased {
                        key: key.clone(),
                        shares_with,
                    });
                }
            }
        }

        self.expressions = merged;
        self.raw_expressions.extend(batch);

        for key in &order.order {
            let eval = evaluate(&self.expressions, &mut self.table, key);
            match eval.write {
                CellWrite::Stored(index) => {
                    let (row, column) = (index / self.config.width, index % self.config.width);
                    self.row_data[row][column + 1] = format_value(self.table.data()[index]);
                }
                CellWrite::OutOfBounds => report.diagnostics.push(CellDiagnostic::OutOfBounds {
                    key: eval.key.clone(),
                }),
                CellWrite::Missing => {}
            }
            report.evaluated.push((eval.key, eval.value));
        }

        debug!(
            edited = roots.len(),
            evaluated = report.evaluated.len(),
            depth = report.max_depth,
            diagnostics = report.diagnostics.len(),
            "applied edit batch"
        );

        self.publish();
        Ok(report)
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            parsed_expressions: self.expressions.table.clone(),
            raw_expressions: self.raw_expressions.clone(),
            row_data: self.row_data.clone(),
        }
    }

    pub fn cell(&self, key: &str) -> CellInfo {
        CellInfo {
            key: key.to_string(),
            raw: self.raw_expressions.get(key).cloned(),
            parsed: self.expressions.formula(key).cloned(),
            value: self.table.get(key),
            dependencies: self.expressions.dependencies_of(key).to_vec(),
            dependents: self.expressions.dependents_of(key).to_vec(),
        }
    }

    /// Attach a subscriber; it receives the current snapshot immediately
    pub fn subscribe(&mut self, subscriber: Subscriber) {
        let snapshot = Arc::new(self.snapshot());
        if subscriber.send(snapshot).is_ok() {
            self.subscribers.push(subscriber);
        } else {
            warn!("subscriber disconnected before handshake; not attached");
        }
    }

    /// Send the current snapshot to every subscriber, dropping the ones that are gone
    pub fn publish(&mut self) {
        if self.subscribers.is_empty() {
            return;
        }

        let snapshot = Arc::new(self.snapshot());
        let before = self.subscribers.len();
        self.subscribers
            .retain(|subscriber| subscriber.send(Arc::clone(&snapshot)).is_ok());

        let pruned = before - self.subscribers.len();
        if pruned > 0 {
            warn!(
                pruned,
                remaining = self.subscribers.len(),
                "removed disconnected subscribers"
            );
        }
    }
}
