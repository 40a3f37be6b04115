use bucket_lifecycle_core::objects::{delete_batches, PageCursor, MAX_DELETE_BATCH};
use tracing::{debug, info};

use crate::adapters::storage::{StorageClient, StorageError};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainSummary {
    pub pages: usize,
    pub delete_calls: usize,
    pub deleted: usize,
}

/// Empties a versioned bucket: every object version and every delete marker.
pub struct BucketEraser<'a> {
    storage: &'a dyn StorageClient,
    batch_size: usize,
}

impl<'a> BucketEraser<'a> {
    pub fn new(storage: &'a dyn StorageClient) -> Self {
        Self {
            storage,
            batch_size: MAX_DELETE_BATCH,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.clamp(1, MAX_DELETE_BATCH);
        self
    }

    /// Lists one page at a time and deletes it before asking for the next.
    /// Stops when a page is not truncated; there is no verification re-list.
    pub async fn drain(&self, bucket: &str) -> Result<DrainSummary, StorageError> {
        let mut summary = DrainSummary::default();
        let mut cursor = PageCursor::default();

        loop {
            let page = self.storage.list_object_versions(bucket, &cursor).await?;
            summary.pages += 1;

            let (batch, truncated, next_cursor) = page.into_delete_batch();
            debug!(
                bucket,
                page = summary.pages,
                batch_size = batch.len(),
                truncated,
                "listed object versions"
            );

            for chunk in delete_batches(&batch, self.batch_size) {
                let outcome = self.storage.delete_objects(bucket, chunk).await?;
                summary.delete_calls += 1;
                summary.deleted += outcome.deleted;

                if let Some(first) = outcome.errors.first() {
                    return Err(StorageError::PartialDeletion {
                        bucket: bucket.to_string(),
                        requested: chunk.len(),
                        failed: outcome.errors.len(),
                        first_key: first.key.clone(),
                    });
                }
            }

            if !truncated {
                break;
            }
            cursor = match next_cursor {
                Some(next) if !next.is_start() => next,
                _ => {
                    return Err(StorageError::MissingContinuation {
                        bucket: bucket.to_string(),
                    })
                }
            };
        }

        info!(
            bucket,
            pages = summary.pages,
            delete_calls = summary.delete_calls,
            deleted = summary.deleted,
            "bucket drained"
        );
        Ok(summary)
    }
}
