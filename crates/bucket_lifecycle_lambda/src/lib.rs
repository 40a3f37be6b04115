//! AWS-oriented adapters and handlers for the bucket lifecycle custom resource.
//!
//! This crate owns runtime integration details (storage and callback seams,
//! retry policy, the drain loop, and the request dispatcher) on top of the
//! contract primitives in `bucket_lifecycle_core`. Concrete AWS SDK and HTTP
//! clients live in the `bucket_lifecycle` binary.

pub mod adapters;
pub mod config;
pub mod handlers;
pub mod observability;
#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;
