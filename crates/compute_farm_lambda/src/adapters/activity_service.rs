use aws_sdk_swf::types::TaskList;
use tokio::runtime::Handle;

use super::sdk_runtime::block_on_sdk;

/// SWF caps the failure reason at 256 characters and details at 32 768.
pub const MAX_FAILURE_REASON_CHARS: usize = 256;
pub const MAX_FAILURE_DETAILS_CHARS: usize = 32_768;

/// One activity task handed to this worker by the workflow service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityTask {
    pub task_token: String,
    pub activity_id: String,
    pub activity_name: String,
    pub activity_version: String,
    pub input: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct ActivityServiceError(pub String);

pub trait ActivityService {
    /// Long-polls for the next task; `None` when the poll timed out empty.
    fn poll_activity_task(&self) -> Result<Option<ActivityTask>, ActivityServiceError>;

    fn complete_activity_task(
        &self,
        task_token: &str,
        result: &str,
    ) -> Result<(), ActivityServiceError>;

    fn fail_activity_task(
        &self,
        task_token: &str,
        reason: &str,
        details: &str,
    ) -> Result<(), ActivityServiceError>;
}

/// Activity worker endpoint of AWS Simple Workflow.
#[derive(Debug, Clone)]
pub struct SwfActivityService {
    swf_client: aws_sdk_swf::Client,
    domain: String,
    task_list: String,
    identity: String,
    runtime: Handle,
}

impl SwfActivityService {
    pub fn new(
        swf_client: aws_sdk_swf::Client,
        domain: impl Into<String>,
        task_list: impl Into<String>,
        identity: impl Into<String>,
        runtime: Handle,
    ) -> Self {
        Self {
            swf_client,
            domain: domain.into(),
            task_list: task_list.into(),
            identity: identity.into(),
            runtime,
        }
    }

    fn block_on<T>(
        &self,
        future: impl std::future::Future<Output = Result<T, ActivityServiceError>>,
    ) -> Result<T, ActivityServiceError> {
        block_on_sdk(&self.runtime, future)
            .map_err(|error| ActivityServiceError(error.to_string()))?
    }
}

fn truncate_chars(text: &str, limit: usize) -> String {
    text.chars().take(limit).collect()
}

impl ActivityService for SwfActivityService {
    fn poll_activity_task(&self) -> Result<Option<ActivityTask>, ActivityServiceError> {
        let task_list = TaskList::builder()
            .name(&self.task_list)
            .build()
            .map_err(|error| ActivityServiceError(format!("invalid task list: {error}")))?;
        let request = self
            .swf_client
            .poll_for_activity_task()
            .domain(&self.domain)
            .task_list(task_list)
            .identity(&self.identity);

        self.block_on(async move {
            let output = request.send().await.map_err(|error| {
                ActivityServiceError(format!("failed to poll for activity task: {error}"))
            })?;
            if output.task_token.is_empty() {
                return Ok(None);
            }

            let (activity_name, activity_version) = output
                .activity_type
                .map(|activity_type| (activity_type.name, activity_type.version))
                .unwrap_or_default();
            Ok(Some(ActivityTask {
                task_token: output.task_token,
                activity_id: output.activity_id,
                activity_name,
                activity_version,
                input: output.input,
            }))
        })
    }

    fn complete_activity_task(
        &self,
        task_token: &str,
        result: &str,
    ) -> Result<(), ActivityServiceError> {
        let request = self
            .swf_client
            .respond_activity_task_completed()
            .task_token(task_token)
            .result(result);

        self.block_on(async move {
            request.send().await.map(|_| ()).map_err(|error| {
                ActivityServiceError(format!("failed to complete activity task: {error}"))
            })
        })
    }

    fn fail_activity_task(
        &self,
        task_token: &str,
        reason: &str,
        details: &str,
    ) -> Result<(), ActivityServiceError> {
        let request = self
            .swf_client
            .respond_activity_task_failed()
            .task_token(task_token)
            .reason(truncate_chars(reason, MAX_FAILURE_REASON_CHARS))
            .details(truncate_chars(details, MAX_FAILURE_DETAILS_CHARS));

        self.block_on(async move {
            request.send().await.map(|_| ()).map_err(|error| {
                ActivityServiceError(format!("failed to report activity failure: {error}"))
            })
        })
    }
}
