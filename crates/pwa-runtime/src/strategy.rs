//! Caching strategies.
//!
//! Neither strategy ever surfaces a rejected fetch to the page: every path
//! ends in a network response, a cached response or [`FetchResponse::offline`].

use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::cache::{CacheEntry, CacheStorage};
use crate::network::Network;
use crate::request::{FetchResponse, Request};

/// What the fetch handler answered with.
#[derive(Debug)]
pub struct FetchResult {
    /// Response handed to the page.
    pub response: FetchResponse,
    /// Background refresh still running after the response was served.
    pub revalidation: Option<JoinHandle<()>>,
}

impl FetchResult {
    pub fn immediate(response: FetchResponse) -> Self {
        Self {
            response,
            revalidation: None,
        }
    }
}

/// Document to fall back to when a navigation has neither network nor cache.
#[derive(Debug, Clone, Copy)]
pub struct OfflineFallback<'a> {
    /// Store holding the document.
    pub cache_name: &'a str,
    /// Cache key of the document.
    pub url: &'a str,
}

/// Network-first: fresh when possible, cached when not.
///
/// Successful (200) responses are written to `cache_name`. On a rejected
/// fetch the same store is consulted, then the offline document if one is
/// given, then the synthesized 503.
pub async fn network_first(
    caches: &RwLock<CacheStorage>,
    network: &dyn Network,
    request: &Request,
    cache_name: &str,
    offline: Option<OfflineFallback<'_>>,
) -> FetchResponse {
    let error = match network.fetch(request).await {
        Ok(response) => {
            store(caches, cache_name, request, &response).await;
            return response;
        }
        Err(error) => error,
    };

    warn!(url = %request.url, error = %error, "Network request failed, trying cache");
    let caches = caches.read().await;

    if let Some(entry) = caches
        .get(cache_name)
        .and_then(|cache| cache.match_request(request.cache_key()))
    {
        debug!(url = %request.url, cache = cache_name, "Serving cached response");
        return FetchResponse::from_cache(entry);
    }

    if let Some(fallback) = offline {
        if let Some(entry) = caches
            .get(fallback.cache_name)
            .and_then(|cache| cache.match_request(fallback.url))
        {
            debug!(url = %request.url, offline = fallback.url, "Serving offline document");
            return FetchResponse::from_cache(entry);
        }
    }

    warn!(url = %request.url, "Nothing cached, answering 503");
    FetchResponse::offline()
}

/// Stale-while-revalidate: cached hits are served at once while a refresh
/// runs in the background; misses wait for the network.
pub async fn stale_while_revalidate(
    caches: Arc<RwLock<CacheStorage>>,
    network: Arc<dyn Network>,
    request: Request,
    cache_name: String,
) -> FetchResult {
    let cached = caches
        .read()
        .await
        .get(&cache_name)
        .and_then(|cache| cache.match_request(request.cache_key()))
        .map(FetchResponse::from_cache);

    if let Some(hit) = cached {
        debug!(url = %request.url, cache = %cache_name, "Serving stale response, revalidating");
        let revalidation = tokio::spawn(async move {
            revalidate(&caches, network.as_ref(), &request, &cache_name).await;
        });
        return FetchResult {
            response: hit,
            revalidation: Some(revalidation),
        };
    }

    if let Some(response) = revalidate(&caches, network.as_ref(), &request, &cache_name).await {
        return FetchResult::immediate(response);
    }

    // Precached copies live in another store; any store will do.
    let fallback = caches
        .read()
        .await
        .match_request(request.cache_key())
        .map(FetchResponse::from_cache);
    match fallback {
        Some(response) => FetchResult::immediate(response),
        None => {
            warn!(url = %request.url, "Nothing cached, answering 503");
            FetchResult::immediate(FetchResponse::offline())
        }
    }
}

async fn revalidate(
    caches: &RwLock<CacheStorage>,
    network: &dyn Network,
    request: &Request,
    cache_name: &str,
) -> Option<FetchResponse> {
    match network.fetch(request).await {
        Ok(response) => {
            store(caches, cache_name, request, &response).await;
            Some(response)
        }
        Err(error) => {
            debug!(url = %request.url, error = %error, "Revalidation failed");
            None
        }
    }
}

async fn store(
    caches: &RwLock<CacheStorage>,
    cache_name: &str,
    request: &Request,
    response: &FetchResponse,
) {
    if response.status != 200 {
        debug!(url = %request.url, status = response.status, "Not caching response");
        return;
    }
    let entry = CacheEntry::from_response(request, response);
    caches.write().await.open(cache_name).put(entry);
    debug!(url = %request.url, cache = cache_name, "Cached response");
}
