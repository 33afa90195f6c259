//! Per-build worker configuration.
//!
//! Everything a synthesized worker closes over: its version, the precache
//! URLs, the store names and the routes that depend on the deployment.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::cache::CacheNames;
use crate::ServiceWorkerError;

/// Matcher for the third-party data API whose reads are kept available offline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RemoteApiRoute {
    /// Hostname suffix, e.g. `supabase.co`.
    pub host_suffix: String,
    /// Path prefix, e.g. `/rest/v1/`.
    pub path_prefix: String,
}

impl Default for RemoteApiRoute {
    fn default() -> Self {
        Self {
            host_suffix: "supabase.co".to_string(),
            path_prefix: "/rest/v1/".to_string(),
        }
    }
}

impl RemoteApiRoute {
    pub fn matches(&self, url: &Url) -> bool {
        let Some(host) = url.host_str() else {
            return false;
        };
        !self.host_suffix.is_empty()
            && host.ends_with(&self.host_suffix)
            && url.path().starts_with(&self.path_prefix)
    }
}

/// Configuration baked into one generated worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerConfig {
    /// Origin the worker is served from.
    pub origin: Url,
    /// Normalized base path, always ending in `/`.
    pub base: String,
    /// Content-derived build version.
    pub version: String,
    /// Worker script path.
    pub script_url: String,
    /// Paths fetched and stored during install, root document first.
    pub precache_urls: Vec<String>,
    /// Document served for navigations that fail with nothing cached.
    pub offline_url: String,
    pub cache_names: CacheNames,
    pub remote_api: RemoteApiRoute,
    /// Activate as soon as install completes instead of waiting.
    pub skip_waiting: bool,
}

impl WorkerConfig {
    /// Resolve a precache path (or any URL) against the worker origin.
    pub fn resolve(&self, path: &str) -> Result<Url, ServiceWorkerError> {
        self.origin
            .join(path)
            .map_err(|e| ServiceWorkerError::NotFound(format!("{path}: {e}")))
    }

    /// Path prefix of first-party API calls.
    pub fn api_prefix(&self) -> String {
        format!("{}api/", self.base)
    }

    pub fn is_same_origin(&self, url: &Url) -> bool {
        url.origin() == self.origin.origin()
    }
}
