use bucket_lifecycle_core::contract::StatusReport;
use tracing::{info, warn};

use crate::adapters::callback::{CallbackError, CallbackResponse, CallbackTransport};

/// Delivers the terminal status of an invocation to the presigned
/// callback URL.
pub struct CallbackReporter<'a> {
    transport: &'a dyn CallbackTransport,
}

impl<'a> CallbackReporter<'a> {
    pub fn new(transport: &'a dyn CallbackTransport) -> Self {
        Self { transport }
    }

    /// Sends `report` with exactly one PUT.
    ///
    /// Transport failures are returned to the caller. A completed exchange is
    /// `Ok` whatever the status code; non-2xx responses are only logged.
    pub async fn send(
        &self,
        url: &str,
        report: &StatusReport,
    ) -> Result<CallbackResponse, CallbackError> {
        let body = report.to_body()?;
        info!(
            status = report.status.as_str(),
            body = %String::from_utf8_lossy(&body),
            "sending status report"
        );

        let response = self.transport.put(url, body).await?;
        if response.is_success() {
            info!(
                status_code = response.status_code,
                status_text = %response.status_text,
                "status report delivered"
            );
        } else {
            warn!(
                status_code = response.status_code,
                status_text = %response.status_text,
                "callback endpoint rejected status report"
            );
        }
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use bucket_lifecycle_core::contract::{Correlation, ReportStatus};

    use crate::test_helpers::CapturingTransport;

    use super::*;

    fn correlation() -> Correlation {
        Correlation {
            stack_id: "stack-1".to_string(),
            request_id: "req-1".to_string(),
            logical_id: "SiteBucketConfig".to_string(),
            callback_url: "https://callback.example/signed?X-Amz-Signature=abc".to_string(),
        }
    }

    #[tokio::test]
    async fn sends_one_put_to_callback_url() {
        let transport = CapturingTransport::ok();
        let correlation = correlation();

        CallbackReporter::new(&transport)
            .send(&correlation.callback_url, &StatusReport::success(&correlation))
            .await
            .expect("delivery should succeed");

        let puts = transport.puts();
        assert_eq!(puts.len(), 1);
        assert_eq!(puts[0].url, correlation.callback_url);
        assert_eq!(puts[0].report().status, ReportStatus::Success);
    }

    #[tokio::test]
    async fn non_success_status_does_not_fail_delivery() {
        let transport = CapturingTransport::responding(403);
        let correlation = correlation();

        let response = CallbackReporter::new(&transport)
            .send(&correlation.callback_url, &StatusReport::success(&correlation))
            .await
            .expect("completed exchange is not an error");

        assert_eq!(response.status_code, 403);
        assert!(!response.is_success());
    }

    #[tokio::test]
    async fn transport_failure_is_propagated() {
        let transport = CapturingTransport::unreachable();
        let correlation = correlation();

        let error = CallbackReporter::new(&transport)
            .send(&correlation.callback_url, &StatusReport::failed(&correlation))
            .await
            .expect_err("unreachable endpoint should fail");

        assert!(matches!(error, CallbackError::Transport(_)));
        assert_eq!(transport.puts().len(), 1);
    }
}
