//! Shared compute farm domain primitives.
//!
//! This crate owns the divide/build/merge task contract, split-tree paths,
//! shard storage keys, line ordering and the zipped shard codec. It
//! intentionally excludes AWS SDK and Lambda runtime concerns.

pub mod archive;
pub mod contract;
pub mod ordering;
pub mod paths;
pub mod splitting;
pub mod storage_keys;
