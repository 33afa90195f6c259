//! Fetch dispatch: which requests the worker answers, and how.

use tracing::trace;

use crate::cache::CacheNames;
use crate::config::WorkerConfig;
use crate::request::Request;

/// Caching strategy applied to a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Try the network, fall back to cache.
    NetworkFirst,
    /// Serve from cache, refresh in the background.
    StaleWhileRevalidate,
}

/// A class of intercepted request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Full document loads.
    Navigation,
    /// Scripts, styles and workers.
    StaticAsset,
    /// Images and fonts.
    Media,
    /// Same-origin calls under `<base>api/`.
    FirstPartyApi,
    /// Reads from the configured third-party data API.
    RemoteApi,
}

impl Route {
    pub fn strategy(&self) -> Strategy {
        match self {
            Route::StaticAsset | Route::Media => Strategy::StaleWhileRevalidate,
            Route::Navigation | Route::FirstPartyApi | Route::RemoteApi => Strategy::NetworkFirst,
        }
    }

    /// Store this route reads from and writes to.
    pub fn cache_name<'a>(&self, names: &'a CacheNames) -> &'a str {
        match self {
            Route::Navigation => &names.runtime,
            Route::StaticAsset => &names.static_assets,
            Route::Media => &names.images,
            Route::FirstPartyApi => &names.api,
            Route::RemoteApi => &names.remote_api,
        }
    }

    /// Only navigations may be answered with the offline document; data
    /// routes degrade to stale data or an error, never to a placeholder page.
    pub fn uses_offline_fallback(&self) -> bool {
        matches!(self, Route::Navigation)
    }
}

/// Classify a request. `None` means the request passes through untouched.
pub fn classify(request: &Request, config: &WorkerConfig) -> Option<Route> {
    if request.method != http::Method::GET {
        trace!(url = %request.url, method = %request.method, "Not intercepting non-GET request");
        return None;
    }

    if request.is_navigation() {
        return Some(Route::Navigation);
    }
    if request.destination.is_static() {
        return Some(Route::StaticAsset);
    }
    if request.destination.is_media() {
        return Some(Route::Media);
    }
    if config.is_same_origin(&request.url) && request.url.path().starts_with(&config.api_prefix()) {
        return Some(Route::FirstPartyApi);
    }
    if config.remote_api.matches(&request.url) {
        return Some(Route::RemoteApi);
    }

    trace!(url = %request.url, "No route matched");
    None
}
