use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("object not found: {key}")]
    NotFound { key: String },
    #[error("{0}")]
    Backend(String),
}

pub trait ShardStore {
    fn read_object(&self, key: &str) -> Result<Vec<u8>, StoreError>;

    fn write_object(&self, key: &str, body: &[u8]) -> Result<(), StoreError>;

    fn copy_object(&self, source_key: &str, destination_key: &str) -> Result<(), StoreError> {
        let body = self.read_object(source_key)?;
        self.write_object(destination_key, &body)
    }
}

impl<T: ShardStore + ?Sized> ShardStore for Arc<T> {
    fn read_object(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        (**self).read_object(key)
    }

    fn write_object(&self, key: &str, body: &[u8]) -> Result<(), StoreError> {
        (**self).write_object(key, body)
    }

    fn copy_object(&self, source_key: &str, destination_key: &str) -> Result<(), StoreError> {
        (**self).copy_object(source_key, destination_key)
    }
}
