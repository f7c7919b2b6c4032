use std::time::Instant;

use compute_farm_core::contract::{parse_shard_input, ShardSummary};
use compute_farm_core::ordering::sort_lines;
use compute_farm_core::paths::SplitPath;
use compute_farm_core::storage_keys::{shard_entry_name, shard_object_key};
use serde_json::Value;
use tracing::info;

use super::{load_shard_lines, store_shard_lines, HandlerConfig, HandlerError};
use crate::adapters::object_store::ShardStore;

pub fn handle_build(
    task_input: &Value,
    path: &SplitPath,
    config: &HandlerConfig,
    store: &impl ShardStore,
) -> Result<ShardSummary, HandlerError> {
    let started_at = Instant::now();
    let input = parse_shard_input(task_input)?;
    path.ensure_within(config.max_level)?;

    let key = shard_object_key(&config.prefix, &input.filename, path);
    let mut lines = load_shard_lines(store, &key)?;
    sort_lines(&mut lines);
    store_shard_lines(
        store,
        &key,
        &shard_entry_name(&input.filename, path),
        &lines,
    )?;

    let summary = ShardSummary::from_lines(key, path.clone(), &lines);
    info!(
        component = "build_handler",
        filename = %input.filename,
        path = %path,
        line_count = summary.line_count,
        sha256 = %summary.sha256,
        duration_ms = started_at.elapsed().as_millis() as u64,
        "shard_built"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::handlers::test_support::{owned, RecordingStore};

    fn config() -> HandlerConfig {
        HandlerConfig {
            prefix: "shards".to_string(),
            max_level: 2,
        }
    }

    #[test]
    fn build_sorts_shard_case_insensitively_in_place() {
        let store = RecordingStore::new();
        store.seed_lines("shards/dictionary01.zip", &["banana", "Apple", "cherry"]);
        let path = SplitPath::parse("01").expect("path");

        let summary = handle_build(&json!({"filename": "dictionary"}), &path, &config(), &store)
            .expect("build should succeed");

        assert_eq!(
            store.lines("shards/dictionary01.zip"),
            Some(owned(&["Apple", "banana", "cherry"]))
        );
        assert_eq!(summary.key, "shards/dictionary01.zip");
        assert_eq!(summary.line_count, 3);
        assert_eq!(store.written_keys(), vec!["shards/dictionary01.zip".to_string()]);
    }

    #[test]
    fn build_is_idempotent() {
        let store = RecordingStore::new();
        store.seed_lines("shards/words.zip", &["b", "B", "a", "A", "c"]);
        let input = json!({"filename": "words"});

        let first = handle_build(&input, &SplitPath::root(), &config(), &store).expect("build");
        let sorted_once = store.lines("shards/words.zip");
        let second = handle_build(&input, &SplitPath::root(), &config(), &store).expect("build");

        assert_eq!(store.lines("shards/words.zip"), sorted_once);
        assert_eq!(first.sha256, second.sha256);
        assert_eq!(sorted_once, Some(owned(&["a", "A", "b", "B", "c"])));
    }

    #[test]
    fn build_keeps_every_line() {
        let store = RecordingStore::new();
        let raw = ["delta", "Alpha", "charlie", "alpha", "", "Bravo"];
        store.seed_lines("shards/w.zip", &raw);

        handle_build(&json!({"filename": "w"}), &SplitPath::root(), &config(), &store)
            .expect("build should succeed");

        let mut built = store.lines("shards/w.zip").expect("shard should exist");
        let mut original = owned(&raw);
        built.sort();
        original.sort();
        assert_eq!(built, original);
    }
}
