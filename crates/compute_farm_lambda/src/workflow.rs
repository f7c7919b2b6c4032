//! In-process stand-in for the workflow engine.
//!
//! Walks the split tree the same way the engine schedules activities: divide
//! until the leaf level, build every leaf, then merge bottom-up. Sibling
//! subtrees run concurrently on rayon.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::Utc;
use compute_farm_core::contract::{parse_shard_input, ShardSummary, ValidationError};
use compute_farm_core::paths::SplitPath;
use compute_farm_core::storage_keys::shard_object_key;
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::adapters::object_store::ShardStore;
use crate::handlers::build::handle_build;
use crate::handlers::divide::handle_divide;
use crate::handlers::merge::handle_merge;
use crate::handlers::{HandlerConfig, HandlerError};
use crate::transfer::{CopyJob, TransferError, TransferJobManager, TransferResult};

#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error(transparent)]
    Handler(#[from] HandlerError),
    #[error("invalid workflow input: {0}")]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Transfer(#[from] TransferError),
    #[error("{failed} transfer job(s) failed; first error: {first_error}")]
    TransferFailed { failed: usize, first_error: String },
    #[error("divide at '{path}' queued {count} divide tasks (expected 0 or 2)")]
    UnexpectedFanout { path: SplitPath, count: usize },
}

/// Progress hooks; every method defaults to a no-op.
pub trait WorkflowObserver {
    fn leaf_built(&self, _summary: &ShardSummary) {}

    fn merged(&self, _summary: &ShardSummary) {}
}

pub struct NoopObserver;

impl WorkflowObserver for NoopObserver {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageRequest {
    pub source_key: String,
    pub filename: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkflowReport {
    pub filename: String,
    pub max_level: usize,
    pub leaves_built: usize,
    pub merges_performed: usize,
    pub root: ShardSummary,
    pub started_at: String,
    pub finished_at: String,
}

#[derive(Default)]
struct RunCounters {
    leaves_built: AtomicUsize,
    merges_performed: AtomicUsize,
}

pub struct LocalWorkflow<S> {
    config: HandlerConfig,
    store: Arc<S>,
    transfer_workers: usize,
}

impl<S> LocalWorkflow<S>
where
    S: ShardStore + Send + Sync + 'static,
{
    pub fn new(config: HandlerConfig, store: Arc<S>, transfer_workers: usize) -> Self {
        Self {
            config,
            store,
            transfer_workers,
        }
    }

    pub fn config(&self) -> &HandlerConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Copies each source artifact to the root shard key of its filename.
    pub fn stage(&self, requests: &[StageRequest]) -> Result<Vec<TransferResult>, WorkflowError> {
        let jobs = requests
            .iter()
            .map(|request| {
                CopyJob::new(
                    request.source_key.clone(),
                    shard_object_key(&self.config.prefix, &request.filename, &SplitPath::root()),
                )
            })
            .collect();
        self.transfer(jobs)
    }

    /// Copies the sorted root shard of `filename` to `destination_key`.
    pub fn publish(
        &self,
        filename: &str,
        destination_key: &str,
    ) -> Result<TransferResult, WorkflowError> {
        let source_key = shard_object_key(&self.config.prefix, filename, &SplitPath::root());
        let mut results = self.transfer(vec![CopyJob::new(source_key, destination_key)])?;
        results.pop().ok_or_else(|| WorkflowError::TransferFailed {
            failed: 1,
            first_error: "publish job did not report".to_string(),
        })
    }

    pub fn run(&self, task_input: &Value) -> Result<WorkflowReport, WorkflowError> {
        self.run_with_observer(task_input, &NoopObserver)
    }

    pub fn run_with_observer(
        &self,
        task_input: &Value,
        observer: &(dyn WorkflowObserver + Sync),
    ) -> Result<WorkflowReport, WorkflowError> {
        let input = parse_shard_input(task_input)?;
        let started_at = Utc::now();
        let counters = RunCounters::default();

        let root = self.run_subtree(task_input, &SplitPath::root(), observer, &counters)?;

        let finished_at = Utc::now();
        let report = WorkflowReport {
            filename: input.filename,
            max_level: self.config.max_level,
            leaves_built: counters.leaves_built.load(Ordering::Relaxed),
            merges_performed: counters.merges_performed.load(Ordering::Relaxed),
            root,
            started_at: started_at.to_rfc3339(),
            finished_at: finished_at.to_rfc3339(),
        };
        info!(
            component = "local_workflow",
            filename = %report.filename,
            max_level = report.max_level,
            leaves_built = report.leaves_built,
            merges_performed = report.merges_performed,
            line_count = report.root.line_count,
            duration_ms = (finished_at - started_at).num_milliseconds(),
            "workflow_completed"
        );
        Ok(report)
    }

    fn run_subtree(
        &self,
        task_input: &Value,
        path: &SplitPath,
        observer: &(dyn WorkflowObserver + Sync),
        counters: &RunCounters,
    ) -> Result<ShardSummary, WorkflowError> {
        let store = self.store.as_ref();
        let response = handle_divide(task_input, path, &self.config, store)?;

        match response.divide_tasks() {
            [] => {
                let summary = handle_build(task_input, path, &self.config, store)?;
                counters.leaves_built.fetch_add(1, Ordering::Relaxed);
                observer.leaf_built(&summary);
            }
            [left, right] => {
                let (left_result, right_result) = rayon::join(
                    || self.run_subtree(&left.task_input, &left.path_leaf, observer, counters),
                    || self.run_subtree(&right.task_input, &right.path_leaf, observer, counters),
                );
                left_result?;
                right_result?;
            }
            tasks => {
                return Err(WorkflowError::UnexpectedFanout {
                    path: path.clone(),
                    count: tasks.len(),
                })
            }
        }

        let merge_task = response.merge_task();
        let summary = handle_merge(
            &merge_task.task_input,
            &merge_task.path_leaf,
            &self.config,
            store,
        )?;
        if !response.is_leaf() {
            counters.merges_performed.fetch_add(1, Ordering::Relaxed);
            observer.merged(&summary);
        }
        Ok(summary)
    }

    fn transfer(&self, jobs: Vec<CopyJob>) -> Result<Vec<TransferResult>, WorkflowError> {
        let mut manager = TransferJobManager::new(Arc::clone(&self.store), self.transfer_workers)?;
        manager.submit_batch(jobs);
        let results = manager.concatenate_results();

        let failures: Vec<&TransferResult> =
            results.iter().filter(|result| !result.is_success()).collect();
        if let Some(first) = failures.first() {
            let first_error = first.error.clone().unwrap_or_default();
            warn!(
                component = "local_workflow",
                failed = failures.len(),
                source_key = %first.job.source_key,
                error = %first_error,
                "transfer_failed"
            );
            return Err(WorkflowError::TransferFailed {
                failed: failures.len(),
                first_error,
            });
        }
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use compute_farm_core::ordering::is_sorted;
    use serde_json::json;

    use super::*;
    use crate::handlers::test_support::{owned, RecordingStore};

    fn workflow(max_level: usize) -> (Arc<RecordingStore>, LocalWorkflow<RecordingStore>) {
        let store = Arc::new(RecordingStore::new());
        let config = HandlerConfig {
            prefix: "work".to_string(),
            max_level,
        };
        (Arc::clone(&store), LocalWorkflow::new(config, store, 2))
    }

    #[derive(Default)]
    struct PathRecorder {
        leaves: Mutex<Vec<String>>,
        merges: Mutex<Vec<String>>,
    }

    impl WorkflowObserver for PathRecorder {
        fn leaf_built(&self, summary: &ShardSummary) {
            self.leaves
                .lock()
                .expect("poisoned mutex")
                .push(summary.path.to_string());
        }

        fn merged(&self, summary: &ShardSummary) {
            self.merges
                .lock()
                .expect("poisoned mutex")
                .push(summary.path.to_string());
        }
    }

    #[test]
    fn sorts_the_whole_tree() {
        let (store, workflow) = workflow(2);
        store.seed_lines(
            "work/dictionary.zip",
            &["kiwi", "Apple", "fig", "banana", "Date", "cherry", "elder"],
        );

        let report = workflow
            .run(&json!({"filename": "dictionary"}))
            .expect("workflow should succeed");

        assert_eq!(
            store.lines("work/dictionary.zip"),
            Some(owned(&[
                "Apple", "banana", "cherry", "Date", "elder", "fig", "kiwi"
            ]))
        );
        assert_eq!(report.leaves_built, 4);
        assert_eq!(report.merges_performed, 3);
        assert_eq!(report.root.line_count, 7);
        assert_eq!(report.root.path, SplitPath::root());
    }

    #[test]
    fn observer_sees_every_leaf_and_merge() {
        let (store, workflow) = workflow(2);
        store.seed_lines("work/w.zip", &["d", "c", "b", "a"]);
        let recorder = PathRecorder::default();

        workflow
            .run_with_observer(&json!({"filename": "w"}), &recorder)
            .expect("workflow should succeed");

        let mut leaves = recorder.leaves.lock().expect("poisoned mutex").clone();
        leaves.sort();
        assert_eq!(leaves, vec!["00", "01", "10", "11"]);
        let mut merges = recorder.merges.lock().expect("poisoned mutex").clone();
        merges.sort();
        assert_eq!(merges, vec!["", "0", "1"]);
    }

    #[test]
    fn max_level_zero_builds_root_directly() {
        let (store, workflow) = workflow(0);
        store.seed_lines("work/w.zip", &["b", "A"]);

        let report = workflow
            .run(&json!({"filename": "w"}))
            .expect("workflow should succeed");

        assert_eq!(report.leaves_built, 1);
        assert_eq!(report.merges_performed, 0);
        let lines = store.lines("work/w.zip").expect("root shard");
        assert!(is_sorted(&lines));
    }

    #[test]
    fn stage_and_publish_move_artifacts_through_transfer_jobs() {
        let (store, workflow) = workflow(1);
        store.seed_lines("inputs/w.zip", &["b", "a"]);

        let staged = workflow
            .stage(&[StageRequest {
                source_key: "inputs/w.zip".to_string(),
                filename: "w".to_string(),
            }])
            .expect("stage should succeed");
        assert_eq!(staged.len(), 1);
        assert_eq!(staged[0].job.destination_key, "work/w.zip");

        workflow
            .run(&json!({"filename": "w"}))
            .expect("workflow should succeed");
        let published = workflow
            .publish("w", "sorted/w.zip")
            .expect("publish should succeed");

        assert!(published.is_success());
        assert_eq!(store.lines("sorted/w.zip"), Some(owned(&["a", "b"])));
    }

    #[test]
    fn stage_fails_when_any_source_is_missing() {
        let (_store, workflow) = workflow(1);

        let error = workflow
            .stage(&[StageRequest {
                source_key: "inputs/absent.zip".to_string(),
                filename: "absent".to_string(),
            }])
            .expect_err("missing source should fail");

        match error {
            WorkflowError::TransferFailed {
                failed,
                first_error,
            } => {
                assert_eq!(failed, 1);
                assert!(first_error.contains("inputs/absent.zip"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn run_rejects_invalid_input_before_touching_the_store() {
        let (store, workflow) = workflow(1);
        let error = workflow
            .run(&json!({"filename": ""}))
            .expect_err("empty filename should fail");

        assert!(matches!(error, WorkflowError::Validation(_)));
        assert!(store.written_keys().is_empty());
    }
}
