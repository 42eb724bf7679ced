use futures_util::future::join_all;
use serde::Serialize;
use tracing::{debug, warn};

use crate::db::models::UpdateInstruction;
use crate::db::RunnerStore;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WriteFailure {
    pub runner_id: i64,
    pub error: String,
}

/// Per-instruction outcome of [`BatchWriter::apply`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct ApplyReport {
    /// Runner ids written successfully
    pub succeeded: Vec<i64>,
    pub failed: Vec<WriteFailure>,
}

/// Applies update instructions in fixed-size chunks.
///
/// Chunks run one after another; the writes inside a chunk are issued
/// together and awaited as a group. A failed write is recorded and never
/// retried here: the next cycle's observation regenerates it.
pub struct BatchWriter {
    chunk_size: usize,
}

impl BatchWriter {
    pub fn new(chunk_size: usize) -> Self {
        BatchWriter {
            chunk_size: chunk_size.max(1),
        }
    }

    pub async fn apply(&self, store: &dyn RunnerStore, instructions: &[UpdateInstruction]) -> ApplyReport {
        let mut report = ApplyReport::default();

        for (n, chunk) in instructions.chunks(self.chunk_size).enumerate() {
            let results = join_all(chunk.iter().map(|ins| async move {
                (ins.runner_id, store.update_runner(ins).await)
            }))
            .await;

            for (runner_id, result) in results {
                match result {
                    Ok(()) => report.succeeded.push(runner_id),
                    Err(e) => {
                        warn!("Update for runner {} failed: {}", runner_id, e);
                        report.failed.push(WriteFailure {
                            runner_id,
                            error: e.to_string(),
                        });
                    }
                }
            }
            debug!("Chunk {} applied ({} writes)", n + 1, chunk.len());
        }

        report
    }
}
