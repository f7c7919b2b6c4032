use aws_sdk_s3::error::ProvideErrorMetadata;
use aws_sdk_s3::primitives::ByteStream;
use tokio::runtime::Handle;

use super::object_store::{ShardStore, StoreError};
use super::sdk_runtime::block_on_sdk;

/// S3-backed shard store.
///
/// Calls block on the runtime captured at construction, so the store works
/// from Tokio workers and from plain threads such as the transfer pool.
#[derive(Debug, Clone)]
pub struct S3ShardStore {
    bucket: String,
    s3_client: aws_sdk_s3::Client,
    runtime: Handle,
}

impl S3ShardStore {
    pub fn new(bucket: impl Into<String>, s3_client: aws_sdk_s3::Client, runtime: Handle) -> Self {
        Self {
            bucket: bucket.into(),
            s3_client,
            runtime,
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    fn block_on<T>(
        &self,
        future: impl std::future::Future<Output = Result<T, StoreError>>,
    ) -> Result<T, StoreError> {
        block_on_sdk(&self.runtime, future)
            .map_err(|error| StoreError::Backend(error.to_string()))?
    }
}

/// `x-amz-copy-source` value: bucket plus the URL-encoded key, keeping `/`.
fn copy_source(bucket: &str, key: &str) -> String {
    let encoded: Vec<String> = key
        .split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect();
    format!("{bucket}/{}", encoded.join("/"))
}

impl ShardStore for S3ShardStore {
    fn read_object(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        let bucket = self.bucket.clone();
        let object_key = key.to_string();
        let client = self.s3_client.clone();

        self.block_on(async move {
            let output = client
                .get_object()
                .bucket(bucket)
                .key(&object_key)
                .send()
                .await
                .map_err(|error| {
                    let missing = error
                        .as_service_error()
                        .map(|service_error| service_error.is_no_such_key())
                        .unwrap_or(false);
                    if missing {
                        StoreError::NotFound {
                            key: object_key.clone(),
                        }
                    } else {
                        StoreError::Backend(format!("failed to read object from s3: {error}"))
                    }
                })?;

            let bytes = output.body.collect().await.map_err(|error| {
                StoreError::Backend(format!("failed to stream object body from s3: {error}"))
            })?;
            Ok::<_, StoreError>(bytes.into_bytes().to_vec())
        })
    }

    fn write_object(&self, key: &str, body: &[u8]) -> Result<(), StoreError> {
        let bucket = self.bucket.clone();
        let object_key = key.to_string();
        let body_bytes = body.to_vec();
        let client = self.s3_client.clone();

        self.block_on(async move {
            client
                .put_object()
                .bucket(bucket)
                .key(object_key)
                .body(ByteStream::from(body_bytes))
                .send()
                .await
                .map(|_| ())
                .map_err(|error| {
                    StoreError::Backend(format!("failed to write object to s3: {error}"))
                })
        })
    }

    fn copy_object(&self, source_key: &str, destination_key: &str) -> Result<(), StoreError> {
        let bucket = self.bucket.clone();
        let source = copy_source(&self.bucket, source_key);
        let missing_key = source_key.to_string();
        let object_key = destination_key.to_string();
        let client = self.s3_client.clone();

        self.block_on(async move {
            client
                .copy_object()
                .bucket(bucket)
                .copy_source(source)
                .key(object_key)
                .send()
                .await
                .map(|_| ())
                .map_err(|error| {
                    let code = error.as_service_error().and_then(|service| service.code());
                    if code == Some("NoSuchKey") {
                        StoreError::NotFound { key: missing_key }
                    } else {
                        StoreError::Backend(format!("failed to copy object in s3: {error}"))
                    }
                })
        })
    }
}
