use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::paths::SplitPath;

pub const ACTIVITY_SCHEMA_VERSION: &str = "v1";
pub const DEFAULT_TASK_VERSION: &str = "1.0";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ValidationError {
    message: String,
}

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskRole {
    Divide,
    Build,
    Merge,
}

impl TaskRole {
    pub const ALL: [TaskRole; 3] = [Self::Divide, Self::Build, Self::Merge];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Divide => "divide",
            Self::Build => "build",
            Self::Merge => "merge",
        }
    }
}

impl fmt::Display for TaskRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskConfig {
    pub name: String,
    pub version: String,
    pub role: TaskRole,
}

impl TaskConfig {
    pub fn new(role: TaskRole, version: impl Into<String>) -> Self {
        Self {
            name: role.as_str().to_string(),
            version: version.into(),
            role,
        }
    }
}

/// The three task types the harness registers with the workflow engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskRegistry {
    divide: TaskConfig,
    build: TaskConfig,
    merge: TaskConfig,
}

impl TaskRegistry {
    pub fn with_version(version: &str) -> Self {
        Self {
            divide: TaskConfig::new(TaskRole::Divide, version),
            build: TaskConfig::new(TaskRole::Build, version),
            merge: TaskConfig::new(TaskRole::Merge, version),
        }
    }

    pub fn get(&self, role: TaskRole) -> &TaskConfig {
        match role {
            TaskRole::Divide => &self.divide,
            TaskRole::Build => &self.build,
            TaskRole::Merge => &self.merge,
        }
    }

    pub fn resolve(&self, name: &str) -> Option<&TaskConfig> {
        self.iter().find(|config| config.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TaskConfig> {
        TaskRole::ALL.into_iter().map(move |role| self.get(role))
    }

    pub fn ensure_registered(
        &self,
        role: TaskRole,
        version: Option<&str>,
    ) -> Result<&TaskConfig, ValidationError> {
        let config = self.get(role);
        match version {
            Some(requested) if requested != config.version => Err(ValidationError::new(format!(
                "Task '{role}' version '{requested}' is not registered (expected '{}')",
                config.version
            ))),
            _ => Ok(config),
        }
    }
}

impl Default for TaskRegistry {
    fn default() -> Self {
        Self::with_version(DEFAULT_TASK_VERSION)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub task_id: String,
    pub task_input: Value,
    pub path_leaf: SplitPath,
}

impl Task {
    pub fn new(task_input: Value, path_leaf: SplitPath) -> Self {
        Self {
            task_id: Uuid::new_v4().to_string(),
            task_input,
            path_leaf,
        }
    }
}

/// Decision built by a divide task: the child divide tasks to schedule plus
/// the merge task that combines their results.
#[derive(Debug, Clone, PartialEq)]
pub struct DivideResponse {
    merge_task: Task,
    divide_tasks: Vec<Task>,
}

impl DivideResponse {
    pub fn new(merge_input: Value, merge_path: SplitPath) -> Self {
        Self {
            merge_task: Task::new(merge_input, merge_path),
            divide_tasks: Vec::with_capacity(2),
        }
    }

    pub fn add_divide_task(&mut self, task_input: Value, path: SplitPath) -> &Task {
        self.divide_tasks.push(Task::new(task_input, path));
        &self.divide_tasks[self.divide_tasks.len() - 1]
    }

    pub fn merge_task(&self) -> &Task {
        &self.merge_task
    }

    pub fn divide_tasks(&self) -> &[Task] {
        &self.divide_tasks
    }

    pub fn is_leaf(&self) -> bool {
        self.divide_tasks.is_empty()
    }

    pub fn to_payload(&self) -> DividePayload {
        DividePayload {
            merge_task_id: self.merge_task.task_id.clone(),
            merge_input: self.merge_task.task_input.clone(),
            merge_path: self.merge_task.path_leaf.clone(),
            divide_task_ids: self
                .divide_tasks
                .iter()
                .map(|task| task.task_id.clone())
                .collect(),
            divide_inputs: self
                .divide_tasks
                .iter()
                .map(|task| task.task_input.clone())
                .collect(),
            divide_paths: self
                .divide_tasks
                .iter()
                .map(|task| task.path_leaf.clone())
                .collect(),
        }
    }
}

/// Plain mapping handed back to the workflow engine. The `divide_*` lists are
/// index-aligned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DividePayload {
    pub merge_task_id: String,
    pub merge_input: Value,
    pub merge_path: SplitPath,
    pub divide_task_ids: Vec<String>,
    pub divide_inputs: Vec<Value>,
    pub divide_paths: Vec<SplitPath>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardInput {
    pub filename: String,
}

pub fn parse_shard_input(task_input: &Value) -> Result<ShardInput, ValidationError> {
    let input = serde_json::from_value::<ShardInput>(task_input.clone())
        .map_err(|error| ValidationError::new(format!("Malformed task input: {error}")))?;

    let filename = input.filename.trim().to_string();
    if filename.is_empty() {
        return Err(ValidationError::new("filename cannot be empty"));
    }
    if filename.contains('/') {
        return Err(ValidationError::new(format!(
            "filename '{filename}' must not contain '/'"
        )));
    }

    Ok(ShardInput { filename })
}

/// One activity invocation as delivered by the workflow engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityRequest {
    pub role: TaskRole,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_version: Option<String>,
    pub task_input: Value,
    #[serde(default)]
    pub path: SplitPath,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardSummary {
    pub key: String,
    pub path: SplitPath,
    pub line_count: usize,
    pub sha256: String,
}

impl ShardSummary {
    pub fn from_lines(key: impl Into<String>, path: SplitPath, lines: &[String]) -> Self {
        Self {
            key: key.into(),
            path,
            line_count: lines.len(),
            sha256: content_fingerprint(lines),
        }
    }
}

/// Digest of the shard text exactly as the codec writes it.
pub fn content_fingerprint(lines: &[String]) -> String {
    let mut hasher = Sha256::new();
    for line in lines {
        hasher.update(line.as_bytes());
        hasher.update(b"\n");
    }
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn divide_payload_uses_engine_keys() {
        let input = json!({"filename": "dictionary"});
        let mut response = DivideResponse::new(input.clone(), SplitPath::root());
        let [left, right] = SplitPath::root().children();
        response.add_divide_task(input.clone(), left);
        response.add_divide_task(input.clone(), right);

        let payload = serde_json::to_value(response.to_payload()).expect("payload should serialize");
        let mut keys: Vec<&str> = payload
            .as_object()
            .expect("payload should be an object")
            .keys()
            .map(String::as_str)
            .collect();
        keys.sort_unstable();

        assert_eq!(
            keys,
            vec![
                "divide_inputs",
                "divide_paths",
                "divide_task_ids",
                "merge_input",
                "merge_path",
                "merge_task_id",
            ]
        );
        assert_eq!(payload["divide_paths"], json!(["0", "1"]));
        assert_eq!(payload["merge_path"], json!(""));
        assert_eq!(payload["divide_inputs"][1], input);
    }

    #[test]
    fn generated_task_ids_are_unique() {
        let input = json!({"filename": "dictionary"});
        let mut response = DivideResponse::new(input.clone(), SplitPath::root());
        let first = response.add_divide_task(input.clone(), SplitPath::root()).task_id.clone();
        let second = response.add_divide_task(input, SplitPath::root()).task_id.clone();

        assert_ne!(first, second);
        assert_ne!(first, response.merge_task().task_id);
        assert!(!response.is_leaf());
    }

    #[test]
    fn registry_resolves_roles_and_names() {
        let registry = TaskRegistry::with_version("2.1");
        assert_eq!(registry.get(TaskRole::Build).name, "build");
        assert_eq!(
            registry.resolve("merge").map(|config| config.role),
            Some(TaskRole::Merge)
        );
        assert!(registry.resolve("shuffle").is_none());
        assert_eq!(registry.iter().count(), 3);
    }

    #[test]
    fn registry_rejects_unknown_versions() {
        let registry = TaskRegistry::default();
        assert!(registry.ensure_registered(TaskRole::Divide, None).is_ok());
        assert!(registry
            .ensure_registered(TaskRole::Divide, Some(DEFAULT_TASK_VERSION))
            .is_ok());

        let error = registry
            .ensure_registered(TaskRole::Divide, Some("9.9"))
            .expect_err("unknown version should fail");
        assert_eq!(
            error.message(),
            "Task 'divide' version '9.9' is not registered (expected '1.0')"
        );
    }

    #[test]
    fn parse_shard_input_trims_and_validates_filename() {
        let parsed = parse_shard_input(&json!({"filename": " dictionary "}))
            .expect("input should parse");
        assert_eq!(parsed.filename, "dictionary");

        let error = parse_shard_input(&json!({"filename": "  "})).expect_err("empty should fail");
        assert_eq!(error.message(), "filename cannot be empty");

        let error =
            parse_shard_input(&json!({"filename": "a/b"})).expect_err("slash should fail");
        assert_eq!(error.message(), "filename 'a/b' must not contain '/'");

        assert!(parse_shard_input(&json!({"name": "dictionary"})).is_err());
    }

    #[test]
    fn activity_request_defaults_to_root_path() {
        let request: ActivityRequest = serde_json::from_value(json!({
            "role": "divide",
            "task_input": {"filename": "dictionary"}
        }))
        .expect("request should parse");

        assert_eq!(request.role, TaskRole::Divide);
        assert_eq!(request.path, SplitPath::root());
        assert_eq!(request.task_version, None);
    }

    #[test]
    fn summary_fingerprint_tracks_content() {
        let lines = vec!["Apple".to_string(), "banana".to_string()];
        let summary = ShardSummary::from_lines("k", SplitPath::root(), &lines);
        assert_eq!(summary.line_count, 2);
        assert_eq!(summary.sha256, content_fingerprint(&lines));
        assert_ne!(
            summary.sha256,
            content_fingerprint(&["banana".to_string(), "Apple".to_string()])
        );
    }
}
