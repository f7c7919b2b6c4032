//! Concurrent object copies on a fixed-size worker pool.
//!
//! Jobs never fail the caller: each one reports a [`TransferResult`] that
//! carries the captured error (or panic message) when the copy went wrong.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Arc;
use std::time::Instant;

use tracing::{info, warn};

use crate::adapters::object_store::ShardStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyJob {
    pub source_key: String,
    pub destination_key: String,
}

impl CopyJob {
    pub fn new(source_key: impl Into<String>, destination_key: impl Into<String>) -> Self {
        Self {
            source_key: source_key.into(),
            destination_key: destination_key.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferResult {
    pub batch_id: u64,
    pub job: CopyJob,
    pub error: Option<String>,
}

impl TransferResult {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("transfer manager needs at least one worker")]
    NoWorkers,
    #[error("failed to build transfer worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
}

pub struct TransferJobManager<S> {
    pool: rayon::ThreadPool,
    store: Arc<S>,
    sender: Sender<TransferResult>,
    receiver: Receiver<TransferResult>,
    next_batch_id: u64,
    batches: u64,
    submitted: usize,
    collected: Vec<TransferResult>,
    started_at: Option<Instant>,
}

impl<S> TransferJobManager<S>
where
    S: ShardStore + Send + Sync + 'static,
{
    pub fn new(store: Arc<S>, workers: usize) -> Result<Self, TransferError> {
        if workers == 0 {
            return Err(TransferError::NoWorkers);
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|index| format!("farm-transfer-{index}"))
            .build()?;
        let (sender, receiver) = channel();

        Ok(Self {
            pool,
            store,
            sender,
            receiver,
            next_batch_id: 0,
            batches: 0,
            submitted: 0,
            collected: Vec::new(),
            started_at: None,
        })
    }

    pub fn workers(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Queues every job in `jobs` and returns the id shared by their results.
    pub fn submit_batch(&mut self, jobs: Vec<CopyJob>) -> u64 {
        let batch_id = self.next_batch_id;
        self.next_batch_id += 1;
        self.batches += 1;
        self.submitted += jobs.len();
        self.started_at.get_or_insert_with(Instant::now);

        for job in jobs {
            let store = Arc::clone(&self.store);
            let sender = self.sender.clone();
            self.pool.spawn(move || {
                let outcome = catch_unwind(AssertUnwindSafe(|| {
                    store.copy_object(&job.source_key, &job.destination_key)
                }));
                let error = match outcome {
                    Ok(Ok(())) => None,
                    Ok(Err(error)) => Some(error.to_string()),
                    Err(panic) => Some(format!("copy job panicked: {}", panic_message(panic.as_ref()))),
                };
                // The receiver lives as long as the manager.
                let _ = sender.send(TransferResult {
                    batch_id,
                    job,
                    error,
                });
            });
        }

        batch_id
    }

    pub fn pending(&self) -> usize {
        self.submitted - self.collected.len()
    }

    pub fn wait(&mut self) {
        while self.collected.len() < self.submitted {
            match self.receiver.recv() {
                Ok(result) => self.collected.push(result),
                Err(_) => break,
            }
        }
    }

    /// Waits for outstanding jobs and hands back one result per submitted job.
    ///
    /// The manager is empty afterwards and can take new batches.
    pub fn concatenate_results(&mut self) -> Vec<TransferResult> {
        self.wait();
        let results = std::mem::take(&mut self.collected);
        let failed = results.iter().filter(|result| !result.is_success()).count();
        let duration_ms = self
            .started_at
            .take()
            .map(|started| started.elapsed().as_millis() as u64)
            .unwrap_or(0);

        if failed > 0 {
            warn!(
                component = "transfer_manager",
                batches = self.batches,
                jobs = results.len(),
                failed,
                duration_ms,
                "transfer_batch_completed"
            );
        } else {
            info!(
                component = "transfer_manager",
                batches = self.batches,
                jobs = results.len(),
                duration_ms,
                "transfer_batch_completed"
            );
        }

        self.batches = 0;
        self.submitted = 0;
        results
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
