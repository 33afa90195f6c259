//! The network seen from inside the worker.

use async_trait::async_trait;

use crate::request::{FetchResponse, Request};
use crate::ServiceWorkerError;

/// Performs the real request behind a cache strategy.
///
/// An `Err` is a rejected fetch: offline, aborted, DNS failure. HTTP error
/// statuses are `Ok` responses.
#[async_trait]
pub trait Network: Send + Sync {
    async fn fetch(&self, request: &Request) -> Result<FetchResponse, ServiceWorkerError>;
}
