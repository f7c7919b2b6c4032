pub mod activity_service;
pub mod fs_store;
pub mod object_store;
pub mod s3_store;
pub mod sdk_runtime;
