use std::time::Duration;

use bucket_lifecycle_core::bucket_config::PublicAccessBlock;
use bucket_lifecycle_core::contract::ReportStatus;
use bucket_lifecycle_core::objects::MAX_DELETE_BATCH;
use bucket_lifecycle_lambda::adapters::retry::{RetryPolicy, RetryingStorageClient};
use bucket_lifecycle_lambda::handlers::dispatcher::handle_lifecycle_event;
use bucket_lifecycle_lambda::test_helpers::{
    CapturingTransport, FailurePlan, InMemoryBucket, StorageOp,
};
use serde_json::{json, Value};

const RESPONSE_URL: &str =
    "https://cloudformation-custom-resource-response-euc1.s3.amazonaws.com/arn%3Aaws/req?X-Amz-Signature=sig";

fn lifecycle_event(request_type: &str, bucket: &str) -> Value {
    json!({
        "RequestType": request_type,
        "ServiceToken": "arn:aws:lambda:eu-central-1:123456789012:function:bucket-lifecycle",
        "ResponseURL": RESPONSE_URL,
        "StackId": "arn:aws:cloudformation:eu-central-1:123456789012:stack/static-site/6f1c",
        "RequestId": "0f6e2a8c-request",
        "LogicalResourceId": "WebsiteBucketSetup",
        "ResourceType": "Custom::WebsiteBucket",
        "ResourceProperties": {
            "ServiceToken": "arn:aws:lambda:eu-central-1:123456789012:function:bucket-lifecycle",
            "BucketName": bucket
        }
    })
}

#[tokio::test]
async fn delete_drains_every_version_and_marker() {
    for (objects, extra_versions, markers, page_size) in
        [(0, 0, 3, 2), (10, 5, 0, 3), (120, 40, 75, 50), (1_200, 0, 300, 1_000)]
    {
        let bucket = InMemoryBucket::new("static-site", page_size);
        bucket.seed_objects("assets", objects);
        bucket.put_versions("assets/000000", extra_versions);
        bucket.seed_delete_markers("removed", markers);
        let transport = CapturingTransport::ok();

        let outcome = handle_lifecycle_event(
            lifecycle_event("Delete", "static-site"),
            &bucket,
            &transport,
            MAX_DELETE_BATCH,
        )
        .await
        .expect("handler should succeed");

        assert_eq!(outcome.status, ReportStatus::Success);
        assert_eq!(bucket.version_count(), 0, "page_size={page_size}");
        assert_eq!(bucket.delete_marker_count(), 0, "page_size={page_size}");
        assert_eq!(transport.single_report().status, ReportStatus::Success);
    }
}

#[tokio::test]
async fn three_pages_take_three_lists_and_consume_each_marker() {
    let bucket = InMemoryBucket::new("static-site", 500);
    bucket.seed_objects("assets", 1_037);
    let transport = CapturingTransport::ok();

    handle_lifecycle_event(
        lifecycle_event("Delete", "static-site"),
        &bucket,
        &transport,
        MAX_DELETE_BATCH,
    )
    .await
    .expect("handler should succeed");

    assert_eq!(bucket.call_count(StorageOp::ListObjectVersions), 3);
    assert!(bucket.call_count(StorageOp::DeleteObjects) <= 3);
    assert_eq!(
        bucket.calls(),
        vec![
            StorageOp::ListObjectVersions,
            StorageOp::DeleteObjects,
            StorageOp::ListObjectVersions,
            StorageOp::DeleteObjects,
            StorageOp::ListObjectVersions,
            StorageOp::DeleteObjects,
        ]
    );

    let cursors = bucket.list_cursors();
    assert!(cursors[0].is_start());
    assert_eq!(cursors[1].key_marker.as_deref(), Some("assets/000499"));
    assert_eq!(cursors[2].key_marker.as_deref(), Some("assets/000999"));
}

#[tokio::test]
async fn empty_bucket_delete_reports_success_with_no_deletes() {
    let bucket = InMemoryBucket::new("static-site", 1_000);
    let transport = CapturingTransport::ok();

    handle_lifecycle_event(
        lifecycle_event("Delete", "static-site"),
        &bucket,
        &transport,
        MAX_DELETE_BATCH,
    )
    .await
    .expect("handler should succeed");

    assert_eq!(bucket.calls(), vec![StorageOp::ListObjectVersions]);
    let puts = transport.puts();
    assert_eq!(puts.len(), 1);
    assert_eq!(puts[0].url, RESPONSE_URL);
    assert_eq!(puts[0].report().status, ReportStatus::Success);
}

#[tokio::test]
async fn create_applies_open_access_and_website_documents() {
    let bucket = InMemoryBucket::new("my-site", 1_000);
    let transport = CapturingTransport::ok();

    handle_lifecycle_event(
        lifecycle_event("Create", "my-site"),
        &bucket,
        &transport,
        MAX_DELETE_BATCH,
    )
    .await
    .expect("handler should succeed");

    assert_eq!(
        bucket.calls(),
        vec![StorageOp::PutPublicAccessBlock, StorageOp::PutBucketWebsite]
    );
    assert_eq!(
        bucket.public_access_block(),
        Some(PublicAccessBlock {
            block_public_acls: false,
            ignore_public_acls: false,
            block_public_policy: false,
            restrict_public_buckets: false,
        })
    );
    let website = bucket.website().expect("website should be configured");
    assert_eq!(website.index_document_suffix, "index.html");
    assert_eq!(website.error_document_key, "error.html");

    let body: Value = serde_json::from_slice(&transport.puts()[0].body).expect("json body");
    assert_eq!(
        body,
        json!({
            "Status": "SUCCESS",
            "Reason": "See the details in CloudWatch Log Stream: WebsiteBucketSetup",
            "PhysicalResourceId": "WebsiteBucketSetup",
            "StackId": "arn:aws:cloudformation:eu-central-1:123456789012:stack/static-site/6f1c",
            "RequestId": "0f6e2a8c-request",
            "LogicalResourceId": "WebsiteBucketSetup",
            "Data": {}
        })
    );
}

#[tokio::test]
async fn provisioning_twice_converges_to_same_configuration() {
    let bucket = InMemoryBucket::new("my-site", 1_000);

    let first = CapturingTransport::ok();
    handle_lifecycle_event(
        lifecycle_event("Create", "my-site"),
        &bucket,
        &first,
        MAX_DELETE_BATCH,
    )
    .await
    .expect("first provision should succeed");
    let access_after_first = bucket.public_access_block();
    let website_after_first = bucket.website();

    let second = CapturingTransport::ok();
    handle_lifecycle_event(
        lifecycle_event("Update", "my-site"),
        &bucket,
        &second,
        MAX_DELETE_BATCH,
    )
    .await
    .expect("second provision should succeed");

    assert_eq!(bucket.public_access_block(), access_after_first);
    assert_eq!(bucket.website(), website_after_first);
    assert_eq!(
        first.single_report().physical_resource_id,
        second.single_report().physical_resource_id
    );
}

#[tokio::test]
async fn list_failure_mid_drain_reports_failed_once() {
    let bucket = InMemoryBucket::new("static-site", 100);
    bucket.seed_objects("assets", 450);
    bucket.fail_on(StorageOp::ListObjectVersions, FailurePlan::AfterSuccesses(2));
    let transport = CapturingTransport::ok();

    let outcome = handle_lifecycle_event(
        lifecycle_event("Delete", "static-site"),
        &bucket,
        &transport,
        MAX_DELETE_BATCH,
    )
    .await
    .expect("storage failure is reported, not returned");

    assert_eq!(outcome.status, ReportStatus::Failed);
    assert_eq!(bucket.call_count(StorageOp::ListObjectVersions), 3);
    assert_eq!(bucket.version_count(), 250);

    let report = transport.single_report();
    assert_eq!(report.status, ReportStatus::Failed);
    assert!(report.reason.contains("WebsiteBucketSetup"));
    assert_eq!(report.logical_resource_id, "WebsiteBucketSetup");
}

#[tokio::test]
async fn exactly_one_report_whatever_fails() {
    let cases = [
        ("Create", StorageOp::PutPublicAccessBlock),
        ("Create", StorageOp::PutBucketWebsite),
        ("Delete", StorageOp::ListObjectVersions),
        ("Delete", StorageOp::DeleteObjects),
    ];

    for (request_type, failing_op) in cases {
        let bucket = InMemoryBucket::new("static-site", 10);
        bucket.seed_objects("assets", 25);
        bucket.fail_on(failing_op, FailurePlan::Always);
        let transport = CapturingTransport::ok();

        let outcome = handle_lifecycle_event(
            lifecycle_event(request_type, "static-site"),
            &bucket,
            &transport,
            MAX_DELETE_BATCH,
        )
        .await
        .expect("storage failures are reported");

        assert_eq!(outcome.status, ReportStatus::Failed, "{failing_op:?}");
        assert_eq!(transport.puts().len(), 1, "{failing_op:?}");
    }
}

#[tokio::test]
async fn rejected_keys_fail_the_teardown() {
    let bucket = InMemoryBucket::new("static-site", 100);
    bucket.seed_objects("assets", 20);
    bucket.reject_key("assets/000007");
    let transport = CapturingTransport::ok();

    let outcome = handle_lifecycle_event(
        lifecycle_event("Delete", "static-site"),
        &bucket,
        &transport,
        MAX_DELETE_BATCH,
    )
    .await
    .expect("partial deletion is reported");

    assert_eq!(outcome.status, ReportStatus::Failed);
    assert_eq!(bucket.version_count(), 1);
    assert_eq!(transport.single_report().status, ReportStatus::Failed);
}

#[tokio::test]
async fn wrong_bucket_reports_failed() {
    let bucket = InMemoryBucket::new("static-site", 100);
    let transport = CapturingTransport::ok();

    let outcome = handle_lifecycle_event(
        lifecycle_event("Create", "someone-elses-site"),
        &bucket,
        &transport,
        MAX_DELETE_BATCH,
    )
    .await
    .expect("missing bucket is reported");

    assert_eq!(outcome.status, ReportStatus::Failed);
    assert_eq!(bucket.call_count(StorageOp::PutBucketWebsite), 0);
}

#[tokio::test]
async fn rejected_callback_still_counts_as_delivered() {
    let bucket = InMemoryBucket::new("static-site", 100);
    let transport = CapturingTransport::responding(403);

    let outcome = handle_lifecycle_event(
        lifecycle_event("Create", "static-site"),
        &bucket,
        &transport,
        MAX_DELETE_BATCH,
    )
    .await
    .expect("non-2xx callback is not an invocation error");

    assert_eq!(outcome.status, ReportStatus::Success);
    assert_eq!(outcome.callback_status_code, 403);
}

#[tokio::test]
async fn unreachable_callback_propagates_after_drain() {
    let bucket = InMemoryBucket::new("static-site", 100);
    bucket.seed_objects("assets", 30);
    let transport = CapturingTransport::unreachable();

    let error = handle_lifecycle_event(
        lifecycle_event("Delete", "static-site"),
        &bucket,
        &transport,
        MAX_DELETE_BATCH,
    )
    .await
    .expect_err("callback failure should propagate");

    assert!(error.to_string().contains("failed to deliver status report"));
    assert!(bucket.is_empty());
    assert_eq!(transport.puts().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn retry_policy_rides_out_transient_list_failures() {
    let bucket = InMemoryBucket::new("static-site", 10);
    bucket.seed_objects("assets", 30);
    bucket.fail_on(StorageOp::ListObjectVersions, FailurePlan::Times(2));
    let storage = RetryingStorageClient::new(
        bucket.clone(),
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(1),
        },
    );
    let transport = CapturingTransport::ok();

    let outcome = handle_lifecycle_event(
        lifecycle_event("Delete", "static-site"),
        &storage,
        &transport,
        MAX_DELETE_BATCH,
    )
    .await
    .expect("handler should succeed");

    assert_eq!(outcome.status, ReportStatus::Success);
    assert!(bucket.is_empty());
    assert_eq!(bucket.call_count(StorageOp::ListObjectVersions), 2 + 3);
}
