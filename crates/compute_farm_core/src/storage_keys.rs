use crate::paths::SplitPath;

const SHARD_ARCHIVE_EXTENSION: &str = "zip";
const SHARD_ENTRY_EXTENSION: &str = "txt";

pub fn shard_stem(filename: &str, path: &SplitPath) -> String {
    format!("{filename}{path}")
}

fn prefixed(base_prefix: &str, object_name: String) -> String {
    let trimmed = base_prefix.trim_matches('/');
    if trimmed.is_empty() {
        object_name
    } else {
        format!("{trimmed}/{object_name}")
    }
}

pub fn shard_object_key(base_prefix: &str, filename: &str, path: &SplitPath) -> String {
    prefixed(
        base_prefix,
        format!("{}.{SHARD_ARCHIVE_EXTENSION}", shard_stem(filename, path)),
    )
}

/// Name of the single text entry stored inside a shard archive.
pub fn shard_entry_name(filename: &str, path: &SplitPath) -> String {
    format!("{}.{SHARD_ENTRY_EXTENSION}", shard_stem(filename, path))
}

pub fn input_object_key(base_prefix: &str, filename: &str) -> String {
    prefixed(
        base_prefix,
        format!("inputs/{filename}.{SHARD_ARCHIVE_EXTENSION}"),
    )
}

pub fn sorted_object_key(base_prefix: &str, filename: &str) -> String {
    prefixed(
        base_prefix,
        format!("sorted/{filename}.{SHARD_ARCHIVE_EXTENSION}"),
    )
}
