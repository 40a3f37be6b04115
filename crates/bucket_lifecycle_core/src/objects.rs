use serde::{Deserialize, Serialize};

use crate::contract::ValidationError;

/// Upper bound on keys accepted by a single DeleteObjects request.
pub const MAX_DELETE_BATCH: usize = 1_000;

/// A concrete object version or a delete marker.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct ObjectVersionRef {
    pub key: String,
    pub version_id: Option<String>,
}

impl ObjectVersionRef {
    pub fn new(key: impl Into<String>, version_id: Option<String>) -> Self {
        Self {
            key: key.into(),
            version_id,
        }
    }
}

/// Continuation markers for ListObjectVersions. `Default` is the start of the
/// bucket.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageCursor {
    pub key_marker: Option<String>,
    pub version_id_marker: Option<String>,
}

impl PageCursor {
    pub fn is_start(&self) -> bool {
        self.key_marker.is_none() && self.version_id_marker.is_none()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VersionPage {
    pub versions: Vec<ObjectVersionRef>,
    pub delete_markers: Vec<ObjectVersionRef>,
    pub truncated: bool,
    pub next_cursor: Option<PageCursor>,
}

impl VersionPage {
    /// Folds versions and delete markers into one delete batch. Order does not
    /// matter to the storage API.
    pub fn into_delete_batch(self) -> (Vec<ObjectVersionRef>, bool, Option<PageCursor>) {
        let mut batch = self.versions;
        batch.extend(self.delete_markers);
        (batch, self.truncated, self.next_cursor)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteFailure {
    pub key: String,
    pub version_id: Option<String>,
    pub code: Option<String>,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeleteOutcome {
    pub deleted: usize,
    pub errors: Vec<DeleteFailure>,
}

pub fn validate_batch_size(batch_size: usize) -> Result<usize, ValidationError> {
    if batch_size == 0 {
        return Err(ValidationError::new(
            "delete batch size must be a positive integer",
        ));
    }
    if batch_size > MAX_DELETE_BATCH {
        return Err(ValidationError::new(format!(
            "delete batch size {batch_size} exceeds MAX_DELETE_BATCH={MAX_DELETE_BATCH}"
        )));
    }
    Ok(batch_size)
}

/// Splits a page's refs into request-sized chunks. Sizes outside
/// `1..=MAX_DELETE_BATCH` are clamped.
pub fn delete_batches(
    refs: &[ObjectVersionRef],
    batch_size: usize,
) -> std::slice::Chunks<'_, ObjectVersionRef> {
    refs.chunks(batch_size.clamp(1, MAX_DELETE_BATCH))
}
