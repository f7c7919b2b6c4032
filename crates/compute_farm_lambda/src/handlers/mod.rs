pub mod build;
pub mod divide;
pub mod merge;

use compute_farm_core::archive::{decode_shard, encode_shard, ShardCodecError};
use compute_farm_core::contract::{ActivityRequest, TaskRole, ValidationError};
use serde_json::Value;

use crate::adapters::object_store::{ShardStore, StoreError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerConfig {
    pub prefix: String,
    pub max_level: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    #[error("invalid task input: {0}")]
    Validation(#[from] ValidationError),
    #[error("shard store failure for '{key}': {source}")]
    Store {
        key: String,
        #[source]
        source: StoreError,
    },
    #[error("shard codec failure for '{key}': {source}")]
    Codec {
        key: String,
        #[source]
        source: ShardCodecError,
    },
    #[error("failed to serialize activity response: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Runs one activity and returns the JSON the workflow engine expects back.
pub fn dispatch_activity(
    request: &ActivityRequest,
    config: &HandlerConfig,
    store: &impl ShardStore,
) -> Result<Value, HandlerError> {
    match request.role {
        TaskRole::Divide => {
            let response =
                divide::handle_divide(&request.task_input, &request.path, config, store)?;
            Ok(serde_json::to_value(response.to_payload())?)
        }
        TaskRole::Build => {
            let summary = build::handle_build(&request.task_input, &request.path, config, store)?;
            Ok(serde_json::to_value(summary)?)
        }
        TaskRole::Merge => {
            let summary = merge::handle_merge(&request.task_input, &request.path, config, store)?;
            Ok(serde_json::to_value(summary)?)
        }
    }
}

pub(crate) fn load_shard_lines(
    store: &impl ShardStore,
    key: &str,
) -> Result<Vec<String>, HandlerError> {
    let body = store.read_object(key).map_err(|source| HandlerError::Store {
        key: key.to_string(),
        source,
    })?;
    decode_shard(&body).map_err(|source| HandlerError::Codec {
        key: key.to_string(),
        source,
    })
}

pub(crate) fn store_shard_lines(
    store: &impl ShardStore,
    key: &str,
    entry_name: &str,
    lines: &[String],
) -> Result<(), HandlerError> {
    let body = encode_shard(entry_name, lines).map_err(|source| HandlerError::Codec {
        key: key.to_string(),
        source,
    })?;
    store
        .write_object(key, &body)
        .map_err(|source| HandlerError::Store {
            key: key.to_string(),
            source,
        })
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use compute_farm_core::archive::{decode_shard, encode_shard};

    use crate::adapters::object_store::{ShardStore, StoreError};

    pub(crate) struct RecordingStore {
        objects: Mutex<HashMap<String, Vec<u8>>>,
        writes: Mutex<Vec<String>>,
    }

    impl RecordingStore {
        pub(crate) fn new() -> Self {
            Self {
                objects: Mutex::new(HashMap::new()),
                writes: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn seed_lines(&self, key: &str, lines: &[&str]) {
            let owned: Vec<String> = lines.iter().map(|line| line.to_string()).collect();
            let body = encode_shard("seed.txt", &owned).expect("seed shard should encode");
            self.objects
                .lock()
                .expect("poisoned mutex")
                .insert(key.to_string(), body);
        }

        pub(crate) fn lines(&self, key: &str) -> Option<Vec<String>> {
            self.objects
                .lock()
                .expect("poisoned mutex")
                .get(key)
                .map(|body| decode_shard(body).expect("stored shard should decode"))
        }

        pub(crate) fn written_keys(&self) -> Vec<String> {
            self.writes.lock().expect("poisoned mutex").clone()
        }
    }

    impl ShardStore for RecordingStore {
        fn read_object(&self, key: &str) -> Result<Vec<u8>, StoreError> {
            self.objects
                .lock()
                .expect("poisoned mutex")
                .get(key)
                .cloned()
                .ok_or_else(|| StoreError::NotFound {
                    key: key.to_string(),
                })
        }

        fn write_object(&self, key: &str, body: &[u8]) -> Result<(), StoreError> {
            self.writes
                .lock()
                .expect("poisoned mutex")
                .push(key.to_string());
            self.objects
                .lock()
                .expect("poisoned mutex")
                .insert(key.to_string(), body.to_vec());
            Ok(())
        }
    }

    pub(crate) fn owned(lines: &[&str]) -> Vec<String> {
        lines.iter().map(|line| line.to_string()).collect()
    }
}
