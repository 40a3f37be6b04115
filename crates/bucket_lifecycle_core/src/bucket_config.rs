use serde::{Deserialize, Serialize};

use crate::contract::ValidationError;

pub const DEFAULT_INDEX_DOCUMENT: &str = "index.html";
pub const DEFAULT_ERROR_DOCUMENT: &str = "error.html";

/// The four public-access-block flags. Provision clears all of them so the
/// website endpoint can serve objects publicly.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PublicAccessBlock {
    pub block_public_acls: bool,
    pub ignore_public_acls: bool,
    pub block_public_policy: bool,
    pub restrict_public_buckets: bool,
}

impl PublicAccessBlock {
    pub fn open() -> Self {
        Self {
            block_public_acls: false,
            ignore_public_acls: false,
            block_public_policy: false,
            restrict_public_buckets: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WebsiteHosting {
    pub index_document_suffix: String,
    pub error_document_key: String,
}

impl Default for WebsiteHosting {
    fn default() -> Self {
        Self {
            index_document_suffix: DEFAULT_INDEX_DOCUMENT.to_string(),
            error_document_key: DEFAULT_ERROR_DOCUMENT.to_string(),
        }
    }
}

pub fn validate_website(website: &WebsiteHosting) -> Result<(), ValidationError> {
    let suffix = website.index_document_suffix.as_str();
    if suffix.trim().is_empty() {
        return Err(ValidationError::new("IndexDocument cannot be empty"));
    }
    // The suffix is appended to every directory request, so it cannot be a path.
    if suffix.contains('/') {
        return Err(ValidationError::new(format!(
            "IndexDocument '{suffix}' must not contain a slash"
        )));
    }
    if website.error_document_key.trim().is_empty() {
        return Err(ValidationError::new("ErrorDocument cannot be empty"));
    }
    Ok(())
}
