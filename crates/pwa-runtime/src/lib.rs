//! # PWA Runtime
//!
//! The request-interception half of the LinkNest offline support: the
//! cache policy a generated worker executes, the worker lifecycle as the
//! browser drives it, and the page-side registration client.
//!
//! ## Features
//!
//! - **Versioned stores**: six purpose-specific caches named after the build
//! - **Lifecycle**: all-or-nothing install, stale store purge on activate
//! - **Fetch dispatch**: network-first and stale-while-revalidate routes
//! - **Registration**: `register_sw` with update/offline-ready notifications
//! - **Harness**: a simulated browser and network for exercising all of the above
//!
//! ## Architecture
//!
//! ```text
//! ServiceWorkerContainer (navigator.serviceWorker)
//!     │
//!     └── ServiceWorkerRegistration
//!             ├── installing (ServiceWorker)
//!             ├── waiting (ServiceWorker)
//!             └── active (ServiceWorker) ──► CacheRuntime
//!                                               ├── install / activate
//!                                               └── handle_fetch ──► Route ──► Strategy
//!
//! CacheStorage (caches)
//!     └── Cache (precache-<v>, runtime-<v>, static-<v>, images-<v>, api-<v>, remote-api-<v>)
//!             └── URL → CacheEntry
//! ```

use thiserror::Error;

pub mod cache;
pub mod config;
pub mod container;
pub mod harness;
pub mod network;
pub mod register;
pub mod request;
pub mod route;
pub mod runtime;
pub mod signals;
pub mod strategy;
pub mod worker;

pub use cache::{Cache, CacheEntry, CacheNames, CacheStorage};
pub use config::{RemoteApiRoute, WorkerConfig};
pub use container::{ServiceWorkerContainer, ServiceWorkerEvent};
pub use harness::{SimulatedBrowser, SimulatedNetwork};
pub use network::Network;
pub use register::{register_sw, RegisterOptions, SwUpdater};
pub use request::{Destination, FetchResponse, Request, RequestMode};
pub use route::{classify, Route, Strategy};
pub use runtime::CacheRuntime;
pub use signals::{HostSignal, HostSignals};
pub use strategy::FetchResult;
pub use worker::{
    ServiceWorker, ServiceWorkerId, ServiceWorkerRegistration, ServiceWorkerState, UpdateFound,
};

/// Errors that can occur in service worker operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ServiceWorkerError {
    #[error("Registration failed: {0}")]
    RegistrationFailed(String),

    #[error("Security error: {0}")]
    SecurityError(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("State error: {0}")]
    StateError(String),

    #[error("Cache error: {0}")]
    CacheError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Install failed at {url}: {reason}")]
    InstallFailed { url: String, reason: String },
}

pub(crate) fn lock<T>(mutex: &std::sync::Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}
