use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::bucket_config::{validate_website, WebsiteHosting};

pub const LOG_STREAM_REASON_PREFIX: &str = "See the details in CloudWatch Log Stream: ";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum RequestType {
    Create,
    Update,
    Delete,
}

/// Which branch of the handler a request type selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleAction {
    /// Create and Update both (re)apply the bucket configuration.
    Provision,
    /// Delete drains the bucket so the stack can remove it.
    Teardown,
}

impl RequestType {
    pub fn action(self) -> LifecycleAction {
        match self {
            Self::Create | Self::Update => LifecycleAction::Provision,
            Self::Delete => LifecycleAction::Teardown,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Create => "Create",
            Self::Update => "Update",
            Self::Delete => "Delete",
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct ResourceProperties {
    #[serde(default)]
    pub bucket_name: Option<String>,
    #[serde(default)]
    pub index_document: Option<String>,
    #[serde(default)]
    pub error_document: Option<String>,
}

/// Raw CloudFormation custom-resource request as delivered to the function.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct CustomResourceRequest {
    pub request_type: RequestType,
    #[serde(rename = "ResponseURL")]
    pub response_url: String,
    pub stack_id: String,
    pub request_id: String,
    pub logical_resource_id: String,
    #[serde(default)]
    pub resource_type: Option<String>,
    #[serde(default)]
    pub service_token: Option<String>,
    #[serde(default)]
    pub physical_resource_id: Option<String>,
    #[serde(default)]
    pub resource_properties: ResourceProperties,
    #[serde(default)]
    pub old_resource_properties: Option<Value>,
}

impl CustomResourceRequest {
    pub fn correlation(&self) -> Correlation {
        Correlation {
            stack_id: self.stack_id.clone(),
            request_id: self.request_id.clone(),
            logical_id: self.logical_resource_id.clone(),
            callback_url: self.response_url.clone(),
        }
    }
}

/// Identifiers echoed back verbatim in the status report, plus the one-time
/// callback target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Correlation {
    pub stack_id: String,
    pub request_id: String,
    pub logical_id: String,
    pub callback_url: String,
}

impl Correlation {
    /// Lenient extraction for events that fail strict parsing. Missing ids
    /// become empty strings; `None` means there is nowhere to report to.
    pub fn from_raw(event: &Value) -> Option<Self> {
        let field = |name: &str| {
            event
                .get(name)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };

        let callback_url = field("ResponseURL");
        if callback_url.trim().is_empty() {
            return None;
        }
        Some(Self {
            stack_id: field("StackId"),
            request_id: field("RequestId"),
            logical_id: field("LogicalResourceId"),
            callback_url,
        })
    }
}

/// A validated request. Owned by a single invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecycleEvent {
    pub request_type: RequestType,
    pub bucket_name: String,
    pub website: WebsiteHosting,
    pub correlation: Correlation,
}

impl LifecycleEvent {
    pub fn action(&self) -> LifecycleAction {
        self.request_type.action()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReportStatus {
    Success,
    Failed,
}

impl ReportStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "SUCCESS",
            Self::Failed => "FAILED",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct StatusReport {
    pub status: ReportStatus,
    pub reason: String,
    pub physical_resource_id: String,
    pub stack_id: String,
    pub request_id: String,
    pub logical_resource_id: String,
    pub data: BTreeMap<String, Value>,
}

impl StatusReport {
    /// Builds the terminal report for a request. The physical id is pinned to
    /// the logical id so it never changes between Create, Update and Delete.
    pub fn new(status: ReportStatus, correlation: &Correlation) -> Self {
        Self {
            status,
            reason: format!("{LOG_STREAM_REASON_PREFIX}{}", correlation.logical_id),
            physical_resource_id: correlation.logical_id.clone(),
            stack_id: correlation.stack_id.clone(),
            request_id: correlation.request_id.clone(),
            logical_resource_id: correlation.logical_id.clone(),
            data: BTreeMap::new(),
        }
    }

    pub fn success(correlation: &Correlation) -> Self {
        Self::new(ReportStatus::Success, correlation)
    }

    pub fn failed(correlation: &Correlation) -> Self {
        Self::new(ReportStatus::Failed, correlation)
    }

    pub fn to_body(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    message: String,
}

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ValidationError {}

pub fn normalize_request(request: &CustomResourceRequest) -> Result<LifecycleEvent, ValidationError> {
    if request.response_url.trim().is_empty() {
        return Err(ValidationError::new("ResponseURL cannot be empty"));
    }

    let bucket_name = request
        .resource_properties
        .bucket_name
        .as_deref()
        .map(str::trim)
        .unwrap_or_default();
    if bucket_name.is_empty() {
        return Err(ValidationError::new(
            "ResourceProperties.BucketName is required",
        ));
    }

    let defaults = WebsiteHosting::default();
    let website = WebsiteHosting {
        index_document_suffix: request
            .resource_properties
            .index_document
            .clone()
            .unwrap_or(defaults.index_document_suffix),
        error_document_key: request
            .resource_properties
            .error_document
            .clone()
            .unwrap_or(defaults.error_document_key),
    };
    // Website overrides are only applied on provision.
    if request.request_type.action() == LifecycleAction::Provision {
        validate_website(&website)?;
    }

    Ok(LifecycleEvent {
        request_type: request.request_type,
        bucket_name: bucket_name.to_string(),
        website,
        correlation: request.correlation(),
    })
}
