//! Shared bucket lifecycle domain primitives.
//!
//! This crate owns the custom-resource request/response contracts, object
//! version references, delete batching rules, and the fixed bucket
//! configuration applied on provision. It intentionally excludes AWS SDK and
//! Lambda runtime concerns.

pub mod bucket_config;
pub mod contract;
pub mod objects;
