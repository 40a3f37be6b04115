use bucket_lifecycle_core::bucket_config::PublicAccessBlock;
use bucket_lifecycle_core::contract::{
    normalize_request, Correlation, CustomResourceRequest, LifecycleAction, LifecycleEvent,
    ReportStatus, StatusReport, ValidationError,
};
use bucket_lifecycle_core::objects::MAX_DELETE_BATCH;
use serde_json::Value;
use tracing::{error, info, Instrument};

use crate::adapters::callback::{CallbackError, CallbackTransport};
use crate::adapters::storage::{StorageClient, StorageError};
use crate::handlers::eraser::BucketEraser;
use crate::handlers::reporter::CallbackReporter;
use crate::observability::{lifecycle_span, unparsed_request_span};

/// Anything that turns an invocation into a FAILED report.
#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error("invalid request: {0}")]
    Invalid(#[from] ValidationError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Failures that leave the control plane without a report.
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    #[error("malformed custom resource request: {0}")]
    MalformedEvent(#[from] serde_json::Error),

    #[error(transparent)]
    Callback(#[from] CallbackError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationOutcome {
    pub status: ReportStatus,
    pub callback_status_code: u16,
}

/// Runs the storage side of a lifecycle event.
pub struct LifecycleDispatcher<'a> {
    storage: &'a dyn StorageClient,
    delete_batch_size: usize,
}

impl<'a> LifecycleDispatcher<'a> {
    pub fn new(storage: &'a dyn StorageClient) -> Self {
        Self {
            storage,
            delete_batch_size: MAX_DELETE_BATCH,
        }
    }

    pub fn with_delete_batch_size(mut self, delete_batch_size: usize) -> Self {
        self.delete_batch_size = delete_batch_size;
        self
    }

    pub async fn run(&self, event: &LifecycleEvent) -> Result<(), LifecycleError> {
        match event.action() {
            LifecycleAction::Teardown => self.teardown(event).await,
            LifecycleAction::Provision => self.provision(event).await,
        }
    }

    async fn teardown(&self, event: &LifecycleEvent) -> Result<(), LifecycleError> {
        BucketEraser::new(self.storage)
            .with_batch_size(self.delete_batch_size)
            .drain(&event.bucket_name)
            .await?;
        info!(bucket = %event.bucket_name, "bucket emptied");
        Ok(())
    }

    async fn provision(&self, event: &LifecycleEvent) -> Result<(), LifecycleError> {
        let bucket = event.bucket_name.as_str();

        self.storage
            .put_public_access_block(bucket, &PublicAccessBlock::open())
            .await?;
        info!(bucket, "public access block configuration set");

        self.storage
            .put_bucket_website(bucket, &event.website)
            .await?;
        info!(
            bucket,
            index_document = %event.website.index_document_suffix,
            error_document = %event.website.error_document_key,
            "static website hosting configured"
        );
        Ok(())
    }
}

/// Handles one custom-resource request end to end.
///
/// Storage and validation failures are logged and reported as FAILED. Exactly
/// one report is sent whenever the event carries a `ResponseURL`, after every
/// storage call for the selected path has been attempted. An event that does
/// not parse is still reported as FAILED when its callback URL can be read.
/// Only an event without one, or a report that cannot be delivered, is
/// returned as an error.
pub async fn handle_lifecycle_event(
    event: Value,
    storage: &dyn StorageClient,
    transport: &dyn CallbackTransport,
    delete_batch_size: usize,
) -> Result<InvocationOutcome, HandlerError> {
    let request = match serde_json::from_value::<CustomResourceRequest>(event.clone()) {
        Ok(request) => request,
        Err(parse_error) => {
            let Some(correlation) = Correlation::from_raw(&event) else {
                return Err(HandlerError::MalformedEvent(parse_error));
            };
            let span = unparsed_request_span(&correlation);
            return report_unparsed(&correlation, &parse_error, transport)
                .instrument(span)
                .await;
        }
    };
    let span = lifecycle_span(&request);

    process_request(&request, storage, transport, delete_batch_size)
        .instrument(span)
        .await
}

async fn process_request(
    request: &CustomResourceRequest,
    storage: &dyn StorageClient,
    transport: &dyn CallbackTransport,
    delete_batch_size: usize,
) -> Result<InvocationOutcome, HandlerError> {
    info!("received lifecycle event");
    let correlation = request.correlation();

    let result = match normalize_request(request) {
        Ok(event) => {
            LifecycleDispatcher::new(storage)
                .with_delete_batch_size(delete_batch_size)
                .run(&event)
                .await
        }
        Err(validation) => Err(LifecycleError::from(validation)),
    };

    let report = match result {
        Ok(()) => StatusReport::success(&correlation),
        Err(failure) => {
            error!(error = %failure, "lifecycle handling failed");
            StatusReport::failed(&correlation)
        }
    };

    deliver(transport, &correlation, report).await
}

async fn report_unparsed(
    correlation: &Correlation,
    parse_error: &serde_json::Error,
    transport: &dyn CallbackTransport,
) -> Result<InvocationOutcome, HandlerError> {
    error!(error = %parse_error, "malformed custom resource request");
    deliver(transport, correlation, StatusReport::failed(correlation)).await
}

async fn deliver(
    transport: &dyn CallbackTransport,
    correlation: &Correlation,
    report: StatusReport,
) -> Result<InvocationOutcome, HandlerError> {
    let response = CallbackReporter::new(transport)
        .send(&correlation.callback_url, &report)
        .await?;

    Ok(InvocationOutcome {
        status: report.status,
        callback_status_code: response.status_code,
    })
}
