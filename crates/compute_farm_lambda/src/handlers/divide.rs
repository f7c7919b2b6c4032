use std::time::Instant;

use compute_farm_core::contract::{parse_shard_input, DivideResponse};
use compute_farm_core::paths::SplitPath;
use compute_farm_core::splitting::{compute_split_plan, should_split};
use compute_farm_core::storage_keys::{shard_entry_name, shard_object_key};
use serde_json::Value;
use tracing::info;

use super::{load_shard_lines, store_shard_lines, HandlerConfig, HandlerError};
use crate::adapters::object_store::ShardStore;

/// Splits the shard at `path` in half and queues both halves for further
/// division. At the leaf level only the merge task is queued.
pub fn handle_divide(
    task_input: &Value,
    path: &SplitPath,
    config: &HandlerConfig,
    store: &impl ShardStore,
) -> Result<DivideResponse, HandlerError> {
    let started_at = Instant::now();
    let input = parse_shard_input(task_input)?;
    path.ensure_within(config.max_level)?;

    let key = shard_object_key(&config.prefix, &input.filename, path);
    let lines = load_shard_lines(store, &key)?;
    let mut response = DivideResponse::new(task_input.clone(), path.clone());

    if !should_split(path, config.max_level) {
        info!(
            component = "divide_handler",
            filename = %input.filename,
            path = %path,
            line_count = lines.len(),
            "shard_reached_leaf"
        );
        return Ok(response);
    }

    let plan = compute_split_plan(path, lines.len())?;
    for assignment in &plan {
        let child_key = shard_object_key(&config.prefix, &input.filename, &assignment.path);
        let entry_name = shard_entry_name(&input.filename, &assignment.path);
        store_shard_lines(store, &child_key, &entry_name, assignment.slice(&lines))?;
        response.add_divide_task(task_input.clone(), assignment.path.clone());
    }

    info!(
        component = "divide_handler",
        filename = %input.filename,
        path = %path,
        line_count = lines.len(),
        left_lines = plan[0].len(),
        right_lines = plan[1].len(),
        duration_ms = started_at.elapsed().as_millis() as u64,
        "shard_divided"
    );
    Ok(response)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::handlers::test_support::{owned, RecordingStore};

    fn config(max_level: usize) -> HandlerConfig {
        HandlerConfig {
            prefix: "compute-farm/shards".to_string(),
            max_level,
        }
    }

    fn input() -> Value {
        json!({"filename": "dictionary"})
    }

    #[test]
    fn divide_writes_two_halves_and_queues_children() {
        let store = RecordingStore::new();
        store.seed_lines(
            "compute-farm/shards/dictionary.zip",
            &["e", "d", "c", "b", "a"],
        );

        let response = handle_divide(&input(), &SplitPath::root(), &config(2), &store)
            .expect("divide should succeed");

        assert_eq!(
            store.lines("compute-farm/shards/dictionary0.zip"),
            Some(owned(&["e", "d"]))
        );
        assert_eq!(
            store.lines("compute-farm/shards/dictionary1.zip"),
            Some(owned(&["c", "b", "a"]))
        );

        let paths: Vec<&str> = response
            .divide_tasks()
            .iter()
            .map(|task| task.path_leaf.as_str())
            .collect();
        assert_eq!(paths, vec!["0", "1"]);
        assert!(response
            .divide_tasks()
            .iter()
            .all(|task| task.task_input == input()));
        assert_eq!(response.merge_task().path_leaf, SplitPath::root());
        assert_eq!(response.merge_task().task_input, input());
    }

    #[test]
    fn divide_appends_digit_to_existing_path() {
        let store = RecordingStore::new();
        store.seed_lines("compute-farm/shards/dictionary10.zip", &["x", "y"]);
        let path = SplitPath::parse("10").expect("path");

        let response =
            handle_divide(&input(), &path, &config(3), &store).expect("divide should succeed");

        assert_eq!(
            store.written_keys(),
            vec![
                "compute-farm/shards/dictionary100.zip".to_string(),
                "compute-farm/shards/dictionary101.zip".to_string(),
            ]
        );
        assert_eq!(response.to_payload().divide_paths[1].as_str(), "101");
    }

    #[test]
    fn divide_at_leaf_level_only_queues_merge() {
        let store = RecordingStore::new();
        store.seed_lines("compute-farm/shards/dictionary01.zip", &["b", "a"]);
        let path = SplitPath::parse("01").expect("path");

        let response =
            handle_divide(&input(), &path, &config(2), &store).expect("divide should succeed");

        assert!(response.is_leaf());
        assert_eq!(response.merge_task().path_leaf, path);
        assert!(store.written_keys().is_empty());
    }

    #[test]
    fn divide_rejects_paths_below_leaf_level_before_reading() {
        let store = RecordingStore::new();
        let path = SplitPath::parse("011").expect("path");

        let error = handle_divide(&input(), &path, &config(2), &store)
            .expect_err("deep path should fail");

        assert!(matches!(error, HandlerError::Validation(_)));
    }

    #[test]
    fn divide_rejects_malformed_task_input() {
        let store = RecordingStore::new();
        let error = handle_divide(&json!({"file": 3}), &SplitPath::root(), &config(2), &store)
            .expect_err("malformed input should fail");

        assert!(error.to_string().starts_with("invalid task input"));
    }
}
