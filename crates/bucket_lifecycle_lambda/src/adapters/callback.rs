use async_trait::async_trait;

#[derive(Debug, thiserror::Error)]
pub enum CallbackError {
    #[error("failed to serialize status report: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to deliver status report: {0}")]
    Transport(String),
}

/// What came back from the callback endpoint. Only the status code is kept;
/// it is informational.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackResponse {
    pub status_code: u16,
    pub status_text: String,
}

impl CallbackResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }
}

/// One PUT of a prepared body to a presigned URL.
#[async_trait]
pub trait CallbackTransport: Send + Sync {
    async fn put(&self, url: &str, body: Vec<u8>) -> Result<CallbackResponse, CallbackError>;
}
