//! Test helpers shared by unit and integration tests.
//!
//! [`InMemoryBucket`] is a versioned bucket fake implementing
//! [`StorageClient`] with real continuation-marker paging, per-operation
//! failure injection, and a call log. [`CapturingTransport`] records callback
//! PUTs instead of sending them.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bucket_lifecycle_core::bucket_config::{PublicAccessBlock, WebsiteHosting};
use bucket_lifecycle_core::contract::StatusReport;
use bucket_lifecycle_core::objects::{
    DeleteFailure, DeleteOutcome, ObjectVersionRef, PageCursor, VersionPage,
};

use crate::adapters::callback::{CallbackError, CallbackResponse, CallbackTransport};
use crate::adapters::storage::{StorageClient, StorageError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageOp {
    ListObjectVersions,
    DeleteObjects,
    PutPublicAccessBlock,
    PutBucketWebsite,
}

impl StorageOp {
    fn name(self) -> &'static str {
        match self {
            Self::ListObjectVersions => "ListObjectVersions",
            Self::DeleteObjects => "DeleteObjects",
            Self::PutPublicAccessBlock => "PutPublicAccessBlock",
            Self::PutBucketWebsite => "PutBucketWebsite",
        }
    }
}

/// When an injected failure fires for an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePlan {
    /// Fail the next `n` calls, then succeed.
    Times(usize),
    /// Succeed `n` calls, then fail every call after.
    AfterSuccesses(usize),
    Always,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct StoredVersion {
    key: String,
    version_id: String,
    is_delete_marker: bool,
}

#[derive(Debug, Default)]
struct BucketState {
    versions: BTreeSet<StoredVersion>,
    next_version: u64,
    public_access_block: Option<PublicAccessBlock>,
    website: Option<WebsiteHosting>,
    calls: Vec<StorageOp>,
    list_cursors: Vec<PageCursor>,
    delete_batch_sizes: Vec<usize>,
    failures: Vec<(StorageOp, FailurePlan, usize)>,
    rejected_keys: BTreeSet<String>,
}

/// Versioned bucket held in memory. Clones share the same state.
#[derive(Debug, Clone)]
pub struct InMemoryBucket {
    name: String,
    page_size: usize,
    state: Arc<Mutex<BucketState>>,
}

impl InMemoryBucket {
    pub fn new(name: impl Into<String>, page_size: usize) -> Self {
        Self {
            name: name.into(),
            page_size: page_size.max(1),
            state: Arc::new(Mutex::new(BucketState::default())),
        }
    }

    /// Adds `count` object versions under `key`.
    pub fn put_versions(&self, key: &str, count: usize) {
        let mut state = self.lock();
        for _ in 0..count {
            let version_id = next_version_id(&mut state);
            state.versions.insert(StoredVersion {
                key: key.to_string(),
                version_id,
                is_delete_marker: false,
            });
        }
    }

    pub fn put_delete_marker(&self, key: &str) {
        let mut state = self.lock();
        let version_id = next_version_id(&mut state);
        state.versions.insert(StoredVersion {
            key: key.to_string(),
            version_id,
            is_delete_marker: true,
        });
    }

    /// Seeds `objects` distinct keys with one version each.
    pub fn seed_objects(&self, prefix: &str, objects: usize) {
        for idx in 0..objects {
            self.put_versions(&format!("{prefix}/{idx:06}"), 1);
        }
    }

    /// Seeds `markers` distinct keys with one delete marker each.
    pub fn seed_delete_markers(&self, prefix: &str, markers: usize) {
        for idx in 0..markers {
            self.put_delete_marker(&format!("{prefix}/{idx:06}"));
        }
    }

    pub fn fail_on(&self, op: StorageOp, plan: FailurePlan) {
        self.lock().failures.push((op, plan, 0));
    }

    /// DeleteObjects will report every version of `key` as failed.
    pub fn reject_key(&self, key: &str) {
        self.lock().rejected_keys.insert(key.to_string());
    }

    pub fn version_count(&self) -> usize {
        self.lock()
            .versions
            .iter()
            .filter(|version| !version.is_delete_marker)
            .count()
    }

    pub fn delete_marker_count(&self) -> usize {
        self.lock()
            .versions
            .iter()
            .filter(|version| version.is_delete_marker)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().versions.is_empty()
    }

    pub fn all_refs(&self) -> Vec<ObjectVersionRef> {
        self.lock()
            .versions
            .iter()
            .map(|version| {
                ObjectVersionRef::new(version.key.clone(), Some(version.version_id.clone()))
            })
            .collect()
    }

    pub fn calls(&self) -> Vec<StorageOp> {
        self.lock().calls.clone()
    }

    pub fn call_count(&self, op: StorageOp) -> usize {
        self.lock().calls.iter().filter(|call| **call == op).count()
    }

    pub fn list_cursors(&self) -> Vec<PageCursor> {
        self.lock().list_cursors.clone()
    }

    pub fn delete_batch_sizes(&self) -> Vec<usize> {
        self.lock().delete_batch_sizes.clone()
    }

    pub fn public_access_block(&self) -> Option<PublicAccessBlock> {
        self.lock().public_access_block
    }

    pub fn website(&self) -> Option<WebsiteHosting> {
        self.lock().website.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BucketState> {
        self.state.lock().expect("poisoned mutex")
    }

    fn begin_call(&self, op: StorageOp, bucket: &str) -> Result<(), StorageError> {
        let mut state = self.lock();
        state.calls.push(op);

        if bucket != self.name {
            return Err(StorageError::request(
                op.name(),
                bucket,
                "NoSuchBucket: The specified bucket does not exist",
            ));
        }

        for (failure_op, plan, seen) in state.failures.iter_mut() {
            if *failure_op != op {
                continue;
            }
            *seen += 1;
            let fire = match *plan {
                FailurePlan::Times(n) => *seen <= n,
                FailurePlan::AfterSuccesses(n) => *seen > n,
                FailurePlan::Always => true,
            };
            if fire {
                return Err(StorageError::request(
                    op.name(),
                    bucket,
                    "ServiceUnavailable: injected failure",
                ));
            }
        }
        Ok(())
    }
}

fn next_version_id(state: &mut BucketState) -> String {
    state.next_version += 1;
    format!("v{:08}", state.next_version)
}

#[async_trait]
impl StorageClient for InMemoryBucket {
    async fn list_object_versions(
        &self,
        bucket: &str,
        cursor: &PageCursor,
    ) -> Result<VersionPage, StorageError> {
        self.begin_call(StorageOp::ListObjectVersions, bucket)?;
        let mut state = self.lock();
        state.list_cursors.push(cursor.clone());

        let after = cursor.key_marker.as_ref().map(|key| {
            (
                key.clone(),
                cursor.version_id_marker.clone().unwrap_or_default(),
            )
        });
        let mut remaining = state.versions.iter().filter(|version| match &after {
            Some((key, version_id)) => {
                (&version.key, &version.version_id) > (key, version_id)
            }
            None => true,
        });

        let mut page = VersionPage::default();
        let mut last = None;
        for version in remaining.by_ref().take(self.page_size) {
            let entry =
                ObjectVersionRef::new(version.key.clone(), Some(version.version_id.clone()));
            if version.is_delete_marker {
                page.delete_markers.push(entry);
            } else {
                page.versions.push(entry);
            }
            last = Some(version);
        }

        if remaining.next().is_some() {
            page.truncated = true;
            page.next_cursor = last.map(|version| PageCursor {
                key_marker: Some(version.key.clone()),
                version_id_marker: Some(version.version_id.clone()),
            });
        }
        Ok(page)
    }

    async fn delete_objects(
        &self,
        bucket: &str,
        refs: &[ObjectVersionRef],
    ) -> Result<DeleteOutcome, StorageError> {
        self.begin_call(StorageOp::DeleteObjects, bucket)?;
        let mut state = self.lock();
        state.delete_batch_sizes.push(refs.len());

        let mut outcome = DeleteOutcome::default();
        for object in refs {
            if state.rejected_keys.contains(&object.key) {
                outcome.errors.push(DeleteFailure {
                    key: object.key.clone(),
                    version_id: object.version_id.clone(),
                    code: Some("AccessDenied".to_string()),
                    message: Some("Access Denied".to_string()),
                });
                continue;
            }
            let Some(version_id) = object.version_id.clone() else {
                continue;
            };
            let stored = state
                .versions
                .iter()
                .find(|version| version.key == object.key && version.version_id == version_id)
                .cloned();
            if let Some(stored) = stored {
                state.versions.remove(&stored);
            }
            // Deleting a missing version is not an error for the real API either.
            outcome.deleted += 1;
        }
        Ok(outcome)
    }

    async fn put_public_access_block(
        &self,
        bucket: &str,
        config: &PublicAccessBlock,
    ) -> Result<(), StorageError> {
        self.begin_call(StorageOp::PutPublicAccessBlock, bucket)?;
        self.lock().public_access_block = Some(*config);
        Ok(())
    }

    async fn put_bucket_website(
        &self,
        bucket: &str,
        config: &WebsiteHosting,
    ) -> Result<(), StorageError> {
        self.begin_call(StorageOp::PutBucketWebsite, bucket)?;
        self.lock().website = Some(config.clone());
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct CapturedPut {
    pub url: String,
    pub body: Vec<u8>,
}

impl CapturedPut {
    pub fn report(&self) -> StatusReport {
        serde_json::from_slice(&self.body).expect("captured body should be a status report")
    }
}

#[derive(Debug, Clone, Copy)]
enum TransportMode {
    Respond(u16),
    Unreachable,
}

/// Callback transport that records every PUT.
#[derive(Debug, Clone)]
pub struct CapturingTransport {
    mode: TransportMode,
    puts: Arc<Mutex<Vec<CapturedPut>>>,
}

impl CapturingTransport {
    pub fn ok() -> Self {
        Self::responding(200)
    }

    pub fn responding(status_code: u16) -> Self {
        Self {
            mode: TransportMode::Respond(status_code),
            puts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Every PUT fails as if the endpoint could not be reached.
    pub fn unreachable() -> Self {
        Self {
            mode: TransportMode::Unreachable,
            puts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn puts(&self) -> Vec<CapturedPut> {
        self.puts.lock().expect("poisoned mutex").clone()
    }

    pub fn single_report(&self) -> StatusReport {
        let puts = self.puts();
        assert_eq!(puts.len(), 1, "expected exactly one callback PUT");
        puts[0].report()
    }
}

#[async_trait]
impl CallbackTransport for CapturingTransport {
    async fn put(&self, url: &str, body: Vec<u8>) -> Result<CallbackResponse, CallbackError> {
        self.puts.lock().expect("poisoned mutex").push(CapturedPut {
            url: url.to_string(),
            body,
        });
        match self.mode {
            TransportMode::Respond(status_code) => Ok(CallbackResponse {
                status_code,
                status_text: String::new(),
            }),
            TransportMode::Unreachable => Err(CallbackError::Transport(
                "dns error: failed to lookup address information".to_string(),
            )),
        }
    }
}
