//! Activity event plumbing shared by the Lambda and SWF worker binaries.
//!
//! Re-exports the core primitives so runtime callers have a single module
//! boundary, and turns raw Lambda payloads (direct activity events or SQS
//! batches of them) into handler invocations.

pub use compute_farm_core::{archive, contract, ordering, paths, splitting, storage_keys};

use compute_farm_core::contract::{ActivityRequest, ValidationError, ACTIVITY_SCHEMA_VERSION};
use serde_json::{json, Value};
use tracing::info;

use crate::adapters::object_store::ShardStore;
use crate::config::FarmConfig;
use crate::handlers::{dispatch_activity, HandlerError};

#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("SQS event must include Records array")]
    MissingRecords,
    #[error("SQS record body must be a string")]
    RecordBody,
    #[error("invalid activity event: {0}")]
    InvalidEvent(#[source] serde_json::Error),
    #[error("activity task carries no input")]
    MissingInput,
    #[error("unregistered activity: {0}")]
    Registration(#[from] ValidationError),
    #[error(transparent)]
    Handler(#[from] HandlerError),
}

pub fn is_sqs_event(event: &Value) -> bool {
    event
        .get("Records")
        .and_then(Value::as_array)
        .map(|records| {
            !records.is_empty()
                && records.iter().all(|record| {
                    record
                        .get("eventSource")
                        .and_then(Value::as_str)
                        .map(|source| source == "aws:sqs")
                        .unwrap_or(false)
                })
        })
        .unwrap_or(false)
}

pub fn decode_sqs_activities(event: &Value) -> Result<Vec<ActivityRequest>, RuntimeError> {
    let records = event
        .get("Records")
        .and_then(Value::as_array)
        .ok_or(RuntimeError::MissingRecords)?;

    let mut requests = Vec::with_capacity(records.len());
    for record in records {
        let body = record
            .get("body")
            .and_then(Value::as_str)
            .ok_or(RuntimeError::RecordBody)?;
        let request: ActivityRequest =
            serde_json::from_str(body).map_err(RuntimeError::InvalidEvent)?;
        requests.push(request);
    }

    Ok(requests)
}

pub fn decode_activity_event(event: Value) -> Result<ActivityRequest, RuntimeError> {
    serde_json::from_value(event).map_err(RuntimeError::InvalidEvent)
}

pub fn run_activity<S: ShardStore>(
    request: &ActivityRequest,
    farm: &FarmConfig<S>,
) -> Result<Value, RuntimeError> {
    let task = farm
        .tasks
        .ensure_registered(request.role, request.task_version.as_deref())?;
    info!(
        component = "farm_runtime",
        task = %task.name,
        version = %task.version,
        path = %request.path,
        "activity_started"
    );
    Ok(dispatch_activity(request, &farm.handler_config(), &farm.store)?)
}

/// Handles one Lambda payload.
///
/// A direct activity event returns the handler response unchanged. An SQS
/// batch runs its records in order and returns their responses wrapped in a
/// versioned envelope; the first failure aborts the batch.
pub fn handle_event<S: ShardStore>(
    event: Value,
    farm: &FarmConfig<S>,
) -> Result<Value, RuntimeError> {
    if !is_sqs_event(&event) {
        let request = decode_activity_event(event)?;
        return run_activity(&request, farm);
    }

    let requests = decode_sqs_activities(&event)?;
    let mut results = Vec::with_capacity(requests.len());
    for request in &requests {
        results.push(run_activity(request, farm)?);
    }

    Ok(json!({
        "schema_version": ACTIVITY_SCHEMA_VERSION,
        "status": "ok",
        "processed": results.len(),
        "results": results,
    }))
}
