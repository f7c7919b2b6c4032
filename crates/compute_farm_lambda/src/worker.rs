//! Poll/dispatch/respond loop for workers registered with the workflow service.
//!
//! Each activity task names its type (`divide`, `build` or `merge`) and carries
//! a JSON input of the form `{"task_input": ..., "path": "01"}`. The result is
//! reported back as the handler's JSON response, or as a failure whose reason
//! is the error message.

use compute_farm_core::contract::{ActivityRequest, TaskRegistry, ValidationError};
use compute_farm_core::paths::SplitPath;
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::adapters::activity_service::{ActivityService, ActivityServiceError, ActivityTask};
use crate::adapters::object_store::ShardStore;
use crate::config::FarmConfig;
use crate::runtime::{run_activity, RuntimeError};

#[derive(Debug, Deserialize)]
struct WorkerInput {
    task_input: Value,
    #[serde(default)]
    path: SplitPath,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerOutcome {
    Idle,
    Completed { activity_id: String },
    Failed { activity_id: String, reason: String },
}

pub fn activity_request(
    task: &ActivityTask,
    tasks: &TaskRegistry,
) -> Result<ActivityRequest, RuntimeError> {
    let registered = tasks.resolve(&task.activity_name).ok_or_else(|| {
        ValidationError::new(format!(
            "Activity type '{}' is not registered",
            task.activity_name
        ))
    })?;
    let raw = task.input.as_deref().ok_or(RuntimeError::MissingInput)?;
    let input: WorkerInput = serde_json::from_str(raw).map_err(RuntimeError::InvalidEvent)?;

    Ok(ActivityRequest {
        role: registered.role,
        task_version: Some(task.activity_version.clone()).filter(|version| !version.is_empty()),
        task_input: input.task_input,
        path: input.path,
    })
}

/// Polls once and answers the task, if any.
///
/// Handler failures are reported to the service and returned as
/// [`WorkerOutcome::Failed`]; only service errors surface as `Err`.
pub fn run_once<S: ShardStore>(
    service: &impl ActivityService,
    farm: &FarmConfig<S>,
) -> Result<WorkerOutcome, ActivityServiceError> {
    let Some(task) = service.poll_activity_task()? else {
        return Ok(WorkerOutcome::Idle);
    };

    let result = activity_request(&task, &farm.tasks).and_then(|request| run_activity(&request, farm));
    match result {
        Ok(response) => {
            service.complete_activity_task(&task.task_token, &response.to_string())?;
            info!(
                component = "farm_swf_worker",
                activity_id = %task.activity_id,
                activity = %task.activity_name,
                "activity_completed"
            );
            Ok(WorkerOutcome::Completed {
                activity_id: task.activity_id,
            })
        }
        Err(failure) => {
            let reason = failure.to_string();
            service.fail_activity_task(&task.task_token, &reason, &format!("{failure:?}"))?;
            warn!(
                component = "farm_swf_worker",
                activity_id = %task.activity_id,
                activity = %task.activity_name,
                error = %reason,
                "activity_failed"
            );
            Ok(WorkerOutcome::Failed {
                activity_id: task.activity_id,
                reason,
            })
        }
    }
}
