//! Logging setup and the per-invocation spans.

use std::sync::Once;

use bucket_lifecycle_core::contract::{Correlation, CustomResourceRequest};
use tracing::Span;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static INIT: Once = Once::new();

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// One JSON object per line, for CloudWatch.
    #[default]
    Json,
    /// Human-readable output for local runs.
    Pretty,
}

impl LogFormat {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "json" => Some(Self::Json),
            "pretty" | "text" => Some(Self::Pretty),
            _ => None,
        }
    }
}

/// Installs the global subscriber. `RUST_LOG` controls levels (default
/// `info`). Subsequent calls are no-ops.
pub fn init_logging(format: LogFormat) {
    INIT.call_once(|| {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        match format {
            LogFormat::Json => {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(fmt::layer().json().with_current_span(true))
                    .init();
            }
            LogFormat::Pretty => {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(fmt::layer().pretty())
                    .init();
            }
        }
    });
}

#[must_use]
pub fn lifecycle_span(request: &CustomResourceRequest) -> Span {
    tracing::info_span!(
        "lifecycle",
        request_type = request.request_type.as_str(),
        request_id = %request.request_id,
        logical_id = %request.logical_resource_id,
        bucket = request.resource_properties.bucket_name.as_deref().unwrap_or(""),
    )
}

/// Span for an event that failed to parse but still names a callback URL.
pub fn unparsed_request_span(correlation: &Correlation) -> Span {
    tracing::info_span!(
        "lifecycle",
        request_type = "unparsed",
        request_id = %correlation.request_id,
        logical_id = %correlation.logical_id,
    )
}
