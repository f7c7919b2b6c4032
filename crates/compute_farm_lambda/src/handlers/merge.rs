use std::time::Instant;

use compute_farm_core::contract::{parse_shard_input, ShardSummary};
use compute_farm_core::ordering::merge_sorted;
use compute_farm_core::paths::SplitPath;
use compute_farm_core::splitting::should_split;
use compute_farm_core::storage_keys::{shard_entry_name, shard_object_key};
use serde_json::Value;
use tracing::info;

use super::{load_shard_lines, store_shard_lines, HandlerConfig, HandlerError};
use crate::adapters::object_store::ShardStore;

/// Combines the two sorted children of `path` into the shard at `path`.
///
/// Leaves have no children: build already sorted them in place, so the merge
/// only reports on the existing shard.
pub fn handle_merge(
    task_input: &Value,
    path: &SplitPath,
    config: &HandlerConfig,
    store: &impl ShardStore,
) -> Result<ShardSummary, HandlerError> {
    let started_at = Instant::now();
    let input = parse_shard_input(task_input)?;
    path.ensure_within(config.max_level)?;

    let key = shard_object_key(&config.prefix, &input.filename, path);
    if !should_split(path, config.max_level) {
        let lines = load_shard_lines(store, &key)?;
        return Ok(ShardSummary::from_lines(key, path.clone(), &lines));
    }

    let [left_path, right_path] = path.children();
    let left = load_shard_lines(
        store,
        &shard_object_key(&config.prefix, &input.filename, &left_path),
    )?;
    let right = load_shard_lines(
        store,
        &shard_object_key(&config.prefix, &input.filename, &right_path),
    )?;
    let (left_lines, right_lines) = (left.len(), right.len());

    let merged = merge_sorted(left, right);
    store_shard_lines(
        store,
        &key,
        &shard_entry_name(&input.filename, path),
        &merged,
    )?;

    let summary = ShardSummary::from_lines(key, path.clone(), &merged);
    info!(
        component = "merge_handler",
        filename = %input.filename,
        path = %path,
        left_lines,
        right_lines,
        line_count = summary.line_count,
        duration_ms = started_at.elapsed().as_millis() as u64,
        "shards_merged"
    );
    Ok(summary)
}
