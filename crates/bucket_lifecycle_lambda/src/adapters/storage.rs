use async_trait::async_trait;
use bucket_lifecycle_core::bucket_config::{PublicAccessBlock, WebsiteHosting};
use bucket_lifecycle_core::objects::{DeleteOutcome, ObjectVersionRef, PageCursor, VersionPage};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StorageError {
    /// The remote call itself failed (network, throttling, access denied...).
    #[error("{operation} failed for bucket {bucket}: {message}")]
    Request {
        operation: &'static str,
        bucket: String,
        message: String,
    },

    /// DeleteObjects succeeded as a call but rejected some keys.
    #[error("failed to delete {failed} of {requested} object versions in bucket {bucket} (first: {first_key})")]
    PartialDeletion {
        bucket: String,
        requested: usize,
        failed: usize,
        first_key: String,
    },

    #[error("listing of bucket {bucket} was truncated without a continuation marker")]
    MissingContinuation { bucket: String },
}

impl StorageError {
    pub fn request(
        operation: &'static str,
        bucket: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Request {
            operation,
            bucket: bucket.into(),
            message: message.into(),
        }
    }

    /// Only failed calls are worth repeating; a partial deletion is a
    /// completed call with a definitive answer.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Request { .. })
    }
}

/// Capability set the handlers need from the object store.
#[async_trait]
pub trait StorageClient: Send + Sync {
    async fn list_object_versions(
        &self,
        bucket: &str,
        cursor: &PageCursor,
    ) -> Result<VersionPage, StorageError>;

    async fn delete_objects(
        &self,
        bucket: &str,
        refs: &[ObjectVersionRef],
    ) -> Result<DeleteOutcome, StorageError>;

    async fn put_public_access_block(
        &self,
        bucket: &str,
        config: &PublicAccessBlock,
    ) -> Result<(), StorageError>;

    async fn put_bucket_website(
        &self,
        bucket: &str,
        config: &WebsiteHosting,
    ) -> Result<(), StorageError>;
}
