use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use bucket_lifecycle_core::bucket_config::{PublicAccessBlock, WebsiteHosting};
use bucket_lifecycle_core::objects::{DeleteOutcome, ObjectVersionRef, PageCursor, VersionPage};
use tracing::warn;

use crate::adapters::storage::{StorageClient, StorageError};

pub const DEFAULT_RETRY_BASE_DELAY: Duration = Duration::from_millis(200);
pub const DEFAULT_RETRY_MAX_DELAY: Duration = Duration::from_secs(5);

/// Exponential backoff applied at the storage boundary.
///
/// `max_attempts` counts the first call, so the default of 1 means a failed
/// call is reported immediately.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 1,
            base_delay: DEFAULT_RETRY_BASE_DELAY,
            max_delay: DEFAULT_RETRY_MAX_DELAY,
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `retry` (1-based): `base * 2^(retry - 1)`,
    /// capped at `max_delay`.
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = 1u32
            .checked_shl(retry.saturating_sub(1))
            .unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    pub fn allows_retries(&self) -> bool {
        self.max_attempts > 1
    }
}

/// Wraps any [`StorageClient`] and repeats failed calls according to a
/// [`RetryPolicy`]. Only [`StorageError::is_retryable`] errors are repeated.
#[derive(Debug, Clone)]
pub struct RetryingStorageClient<S> {
    inner: S,
    policy: RetryPolicy,
}

impl<S: StorageClient> RetryingStorageClient<S> {
    pub fn new(inner: S, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    async fn with_retry<T, F, Fut>(
        &self,
        operation: &'static str,
        bucket: &str,
        mut call: F,
    ) -> Result<T, StorageError>
    where
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = Result<T, StorageError>> + Send,
    {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 1u32;
        loop {
            match call().await {
                Ok(value) => return Ok(value),
                Err(error) if error.is_retryable() && attempt < max_attempts => {
                    let delay = self.policy.delay_for(attempt);
                    warn!(
                        operation,
                        bucket,
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "storage call failed, will retry"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(error) => return Err(error),
            }
        }
    }
}

#[async_trait]
impl<S: StorageClient> StorageClient for RetryingStorageClient<S> {
    async fn list_object_versions(
        &self,
        bucket: &str,
        cursor: &PageCursor,
    ) -> Result<VersionPage, StorageError> {
        self.with_retry("ListObjectVersions", bucket, || {
            self.inner.list_object_versions(bucket, cursor)
        })
        .await
    }

    async fn delete_objects(
        &self,
        bucket: &str,
        refs: &[ObjectVersionRef],
    ) -> Result<DeleteOutcome, StorageError> {
        self.with_retry("DeleteObjects", bucket, || {
            self.inner.delete_objects(bucket, refs)
        })
        .await
    }

    async fn put_public_access_block(
        &self,
        bucket: &str,
        config: &PublicAccessBlock,
    ) -> Result<(), StorageError> {
        self.with_retry("PutPublicAccessBlock", bucket, || {
            self.inner.put_public_access_block(bucket, config)
        })
        .await
    }

    async fn put_bucket_website(
        &self,
        bucket: &str,
        config: &WebsiteHosting,
    ) -> Result<(), StorageError> {
        self.with_retry("PutBucketWebsite", bucket, || {
            self.inner.put_bucket_website(bucket, config)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use crate::test_helpers::{FailurePlan, InMemoryBucket, StorageOp};

    use super::*;

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(40),
        }
    }

    #[test]
    fn delay_grows_exponentially_and_caps() {
        let policy = fast_policy(5);
        assert_eq!(policy.delay_for(1), Duration::from_millis(10));
        assert_eq!(policy.delay_for(2), Duration::from_millis(20));
        assert_eq!(policy.delay_for(3), Duration::from_millis(40));
        assert_eq!(policy.delay_for(4), Duration::from_millis(40));
        assert_eq!(policy.delay_for(64), Duration::from_millis(40));
    }

    #[test]
    fn default_policy_makes_a_single_attempt() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 1);
        assert!(!policy.allows_retries());
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failure_is_retried_until_success() {
        let bucket = InMemoryBucket::new("site", 10);
        bucket.fail_on(StorageOp::PutPublicAccessBlock, FailurePlan::Times(2));
        let client = RetryingStorageClient::new(bucket.clone(), fast_policy(3));

        client
            .put_public_access_block("site", &PublicAccessBlock::open())
            .await
            .expect("third attempt should succeed");

        assert_eq!(bucket.call_count(StorageOp::PutPublicAccessBlock), 3);
    }

    #[tokio::test]
    async fn default_policy_surfaces_first_failure() {
        let bucket = InMemoryBucket::new("site", 10);
        bucket.fail_on(StorageOp::ListObjectVersions, FailurePlan::Times(1));
        let client = RetryingStorageClient::new(bucket.clone(), RetryPolicy::default());

        let error = client
            .list_object_versions("site", &PageCursor::default())
            .await
            .expect_err("single attempt should fail");

        assert!(error.is_retryable());
        assert_eq!(bucket.call_count(StorageOp::ListObjectVersions), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_max_attempts() {
        let bucket = InMemoryBucket::new("site", 10);
        bucket.fail_on(StorageOp::PutBucketWebsite, FailurePlan::Always);
        let client = RetryingStorageClient::new(bucket.clone(), fast_policy(4));

        client
            .put_bucket_website("site", &WebsiteHosting::default())
            .await
            .expect_err("persistent failure should surface");

        assert_eq!(bucket.call_count(StorageOp::PutBucketWebsite), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn partial_deletion_is_not_retried() {
        let bucket = InMemoryBucket::new("site", 10);
        bucket.put_versions("locked", 1);
        bucket.reject_key("locked");
        let client = RetryingStorageClient::new(bucket.clone(), fast_policy(3));

        let refs = bucket.all_refs();
        let outcome = client
            .delete_objects("site", &refs)
            .await
            .expect("call itself succeeds");

        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(bucket.call_count(StorageOp::DeleteObjects), 1);
    }
}
