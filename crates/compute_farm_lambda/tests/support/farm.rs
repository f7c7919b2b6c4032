#![allow(dead_code)]

use std::sync::Arc;

use compute_farm_core::archive::{decode_shard, encode_shard};
use compute_farm_core::paths::SplitPath;
use compute_farm_core::storage_keys::{shard_entry_name, shard_object_key};
use compute_farm_lambda::adapters::fs_store::FsShardStore;
use compute_farm_lambda::adapters::object_store::ShardStore;
use compute_farm_lambda::handlers::HandlerConfig;
use compute_farm_lambda::workflow::LocalWorkflow;
use tempfile::TempDir;

pub const PREFIX: &str = "farm/shards";

/// Filesystem-backed store rooted in a temp dir that lives as long as the fixture.
pub struct FarmFixture {
    pub dir: TempDir,
    pub store: Arc<FsShardStore>,
    pub max_level: usize,
}

impl FarmFixture {
    pub fn new(max_level: usize) -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = Arc::new(FsShardStore::new(dir.path()));
        Self {
            dir,
            store,
            max_level,
        }
    }

    pub fn handler_config(&self) -> HandlerConfig {
        HandlerConfig {
            prefix: PREFIX.to_string(),
            max_level: self.max_level,
        }
    }

    pub fn workflow(&self) -> LocalWorkflow<FsShardStore> {
        LocalWorkflow::new(self.handler_config(), Arc::clone(&self.store), 2)
    }

    pub fn write_lines(&self, key: &str, lines: &[String]) {
        let body = encode_shard("fixture.txt", lines).expect("fixture shard should encode");
        self.store
            .write_object(key, &body)
            .expect("fixture shard should write");
    }

    pub fn seed_root(&self, filename: &str, lines: &[String]) {
        let key = shard_object_key(PREFIX, filename, &SplitPath::root());
        let body = encode_shard(&shard_entry_name(filename, &SplitPath::root()), lines)
            .expect("root shard should encode");
        self.store
            .write_object(&key, &body)
            .expect("root shard should write");
    }

    pub fn read_lines(&self, key: &str) -> Vec<String> {
        let body = self.store.read_object(key).expect("shard should exist");
        decode_shard(&body).expect("shard should decode")
    }

    pub fn read_shard(&self, filename: &str, path: &str) -> Vec<String> {
        let path = SplitPath::parse(path).expect("fixture path should parse");
        self.read_lines(&shard_object_key(PREFIX, filename, &path))
    }
}

/// Deterministic mixed-case word list with duplicates and case-only variants.
pub fn dictionary_words(count: usize) -> Vec<String> {
    const SYLLABLES: [&str; 8] = ["ka", "Lo", "mi", "ZU", "re", "Ta", "no", "pi"];
    let mut state: u64 = 0x2545_f491_4f6c_dd1d;
    (0..count)
        .map(|_| {
            state = state
                .wrapping_mul(6_364_136_223_846_793_005)
                .wrapping_add(1_442_695_040_888_963_407);
            let mut word = String::new();
            let mut bits = state >> 16;
            for _ in 0..(1 + (bits % 3) as usize) {
                bits /= 3;
                word.push_str(SYLLABLES[(bits % 8) as usize]);
                bits /= 8;
            }
            word
        })
        .collect()
}

pub fn lowercase_sorted(lines: &[String]) -> Vec<String> {
    let mut expected = lines.to_vec();
    expected.sort_by_key(|line| line.to_lowercase());
    expected
}

pub fn owned(lines: &[&str]) -> Vec<String> {
    lines.iter().map(|line| line.to_string()).collect()
}
