use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::operation::delete_objects::DeleteObjectsOutput;
use aws_sdk_s3::operation::list_object_versions::ListObjectVersionsOutput;
use aws_sdk_s3::types::{
    Delete, ErrorDocument, IndexDocument, ObjectIdentifier, PublicAccessBlockConfiguration,
    WebsiteConfiguration,
};
use bucket_lifecycle_core::bucket_config::{PublicAccessBlock, WebsiteHosting};
use bucket_lifecycle_core::objects::{
    DeleteFailure, DeleteOutcome, ObjectVersionRef, PageCursor, VersionPage,
};
use bucket_lifecycle_lambda::adapters::callback::{
    CallbackError, CallbackResponse, CallbackTransport,
};
use bucket_lifecycle_lambda::adapters::retry::RetryingStorageClient;
use bucket_lifecycle_lambda::adapters::storage::{StorageClient, StorageError};
use bucket_lifecycle_lambda::config::HandlerConfig;
use bucket_lifecycle_lambda::handlers::dispatcher::handle_lifecycle_event;
use bucket_lifecycle_lambda::observability::init_logging;
use lambda_runtime::{service_fn, Error, LambdaEvent};
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE};
use serde_json::{json, Value};
use tracing::{error, info};

struct S3StorageClient {
    s3_client: aws_sdk_s3::Client,
}

#[async_trait]
impl StorageClient for S3StorageClient {
    async fn list_object_versions(
        &self,
        bucket: &str,
        cursor: &PageCursor,
    ) -> Result<VersionPage, StorageError> {
        self.s3_client
            .list_object_versions()
            .bucket(bucket)
            .set_key_marker(cursor.key_marker.clone())
            .set_version_id_marker(cursor.version_id_marker.clone())
            .send()
            .await
            .map(version_page)
            .map_err(|error| {
                StorageError::request(
                    "ListObjectVersions",
                    bucket,
                    DisplayErrorContext(&error).to_string(),
                )
            })
    }

    async fn delete_objects(
        &self,
        bucket: &str,
        refs: &[ObjectVersionRef],
    ) -> Result<DeleteOutcome, StorageError> {
        let delete = delete_request(refs)
            .map_err(|message| StorageError::request("DeleteObjects", bucket, message))?;

        self.s3_client
            .delete_objects()
            .bucket(bucket)
            .delete(delete)
            .send()
            .await
            .map(delete_outcome)
            .map_err(|error| {
                StorageError::request(
                    "DeleteObjects",
                    bucket,
                    DisplayErrorContext(&error).to_string(),
                )
            })
    }

    async fn put_public_access_block(
        &self,
        bucket: &str,
        config: &PublicAccessBlock,
    ) -> Result<(), StorageError> {
        let configuration = PublicAccessBlockConfiguration::builder()
            .block_public_acls(config.block_public_acls)
            .ignore_public_acls(config.ignore_public_acls)
            .block_public_policy(config.block_public_policy)
            .restrict_public_buckets(config.restrict_public_buckets)
            .build();

        self.s3_client
            .put_public_access_block()
            .bucket(bucket)
            .public_access_block_configuration(configuration)
            .send()
            .await
            .map(|_| ())
            .map_err(|error| {
                StorageError::request(
                    "PutPublicAccessBlock",
                    bucket,
                    DisplayErrorContext(&error).to_string(),
                )
            })
    }

    async fn put_bucket_website(
        &self,
        bucket: &str,
        config: &WebsiteHosting,
    ) -> Result<(), StorageError> {
        let configuration = website_configuration(config)
            .map_err(|message| StorageError::request("PutBucketWebsite", bucket, message))?;

        self.s3_client
            .put_bucket_website()
            .bucket(bucket)
            .website_configuration(configuration)
            .send()
            .await
            .map(|_| ())
            .map_err(|error| {
                StorageError::request(
                    "PutBucketWebsite",
                    bucket,
                    DisplayErrorContext(&error).to_string(),
                )
            })
    }
}

fn version_page(output: ListObjectVersionsOutput) -> VersionPage {
    let versions = output
        .versions()
        .iter()
        .filter_map(|version| {
            version.key().map(|key| {
                ObjectVersionRef::new(key, version.version_id().map(str::to_string))
            })
        })
        .collect();
    let delete_markers = output
        .delete_markers()
        .iter()
        .filter_map(|marker| {
            marker
                .key()
                .map(|key| ObjectVersionRef::new(key, marker.version_id().map(str::to_string)))
        })
        .collect();

    let truncated = output.is_truncated().unwrap_or(false);
    let next_cursor = truncated.then(|| PageCursor {
        key_marker: output.next_key_marker().map(str::to_string),
        version_id_marker: output.next_version_id_marker().map(str::to_string),
    });

    VersionPage {
        versions,
        delete_markers,
        truncated,
        next_cursor,
    }
}

fn delete_request(refs: &[ObjectVersionRef]) -> Result<Delete, String> {
    let objects = refs
        .iter()
        .map(|object| {
            ObjectIdentifier::builder()
                .key(&object.key)
                .set_version_id(object.version_id.clone())
                .build()
                .map_err(|error| format!("invalid object identifier '{}': {error}", object.key))
        })
        .collect::<Result<Vec<_>, _>>()?;

    Delete::builder()
        .set_objects(Some(objects))
        .build()
        .map_err(|error| format!("invalid delete request: {error}"))
}

fn delete_outcome(output: DeleteObjectsOutput) -> DeleteOutcome {
    DeleteOutcome {
        deleted: output.deleted().len(),
        errors: output
            .errors()
            .iter()
            .map(|failure| DeleteFailure {
                key: failure.key().unwrap_or_default().to_string(),
                version_id: failure.version_id().map(str::to_string),
                code: failure.code().map(str::to_string),
                message: failure.message().map(str::to_string),
            })
            .collect(),
    }
}

fn website_configuration(config: &WebsiteHosting) -> Result<WebsiteConfiguration, String> {
    let index_document = IndexDocument::builder()
        .suffix(&config.index_document_suffix)
        .build()
        .map_err(|error| format!("invalid index document: {error}"))?;
    let error_document = ErrorDocument::builder()
        .key(&config.error_document_key)
        .build()
        .map_err(|error| format!("invalid error document: {error}"))?;

    Ok(WebsiteConfiguration::builder()
        .index_document(index_document)
        .error_document(error_document)
        .build())
}

struct HttpCallbackTransport {
    client: reqwest::Client,
}

impl HttpCallbackTransport {
    fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl CallbackTransport for HttpCallbackTransport {
    async fn put(&self, url: &str, body: Vec<u8>) -> Result<CallbackResponse, CallbackError> {
        // The presigned URL covers an empty content type; anything else breaks
        // the signature.
        let content_length = body.len();
        let response = self
            .client
            .put(url)
            .header(CONTENT_TYPE, "")
            .header(CONTENT_LENGTH, content_length)
            .body(body)
            .send()
            .await
            .map_err(|error| CallbackError::Transport(error.to_string()))?;

        let status = response.status();
        Ok(CallbackResponse {
            status_code: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
        })
    }
}

struct RuntimeDependencies {
    storage: RetryingStorageClient<S3StorageClient>,
    transport: HttpCallbackTransport,
    delete_batch_size: usize,
}

async fn handle_request(
    event: LambdaEvent<Value>,
    deps: &RuntimeDependencies,
) -> Result<Value, Error> {
    let outcome = handle_lifecycle_event(
        event.payload,
        &deps.storage,
        &deps.transport,
        deps.delete_batch_size,
    )
    .await
    .map_err(|failure| {
        error!(error = %failure, "no status report was delivered");
        Error::from(failure)
    })?;

    Ok(json!({
        "status": outcome.status.as_str(),
        "callbackStatusCode": outcome.callback_status_code,
    }))
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    let config = HandlerConfig::from_env()
        .map_err(|error| Error::from(format!("invalid configuration: {error}")))?;
    init_logging(config.log_format);
    info!(
        delete_batch_size = config.delete_batch_size,
        max_attempts = config.retry.max_attempts,
        retries_enabled = config.retry.allows_retries(),
        callback_timeout_secs = config.callback_timeout.as_secs(),
        "bucket lifecycle handler configured"
    );

    let aws_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
    let deps = RuntimeDependencies {
        storage: RetryingStorageClient::new(
            S3StorageClient {
                s3_client: aws_sdk_s3::Client::new(&aws_config),
            },
            config.retry,
        ),
        transport: HttpCallbackTransport::new(config.callback_timeout)
            .map_err(|error| Error::from(format!("failed to build callback client: {error}")))?,
        delete_batch_size: config.delete_batch_size,
    };

    lambda_runtime::run(service_fn(|event| handle_request(event, &deps))).await
}
