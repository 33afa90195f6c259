//! The worker's event handlers: install, activate, fetch.

use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::cache::{CacheEntry, CacheStorage};
use crate::config::WorkerConfig;
use crate::network::Network;
use crate::request::Request;
use crate::route::{classify, Route, Strategy};
use crate::strategy::{self, FetchResult, OfflineFallback};
use crate::ServiceWorkerError;

/// One instance of a generated worker, bound to the origin's cache storage.
pub struct CacheRuntime {
    config: Arc<WorkerConfig>,
    caches: Arc<RwLock<CacheStorage>>,
    network: Arc<dyn Network>,
}

impl CacheRuntime {
    pub fn new(
        config: WorkerConfig,
        caches: Arc<RwLock<CacheStorage>>,
        network: Arc<dyn Network>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            caches,
            network,
        }
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    pub fn caches(&self) -> &Arc<RwLock<CacheStorage>> {
        &self.caches
    }

    /// Install handler: fetch the whole precache set, then store it.
    ///
    /// Nothing is written unless every URL answered with an OK status, so a
    /// failed install leaves the storage exactly as it was.
    pub async fn install(&self) -> Result<usize, ServiceWorkerError> {
        info!(
            version = %self.config.version,
            urls = self.config.precache_urls.len(),
            "Installing worker"
        );

        let mut fetched = Vec::with_capacity(self.config.precache_urls.len());
        for path in &self.config.precache_urls {
            let request = Request::get(self.config.resolve(path)?);
            let response = self.network.fetch(&request).await.map_err(|e| {
                ServiceWorkerError::InstallFailed {
                    url: path.clone(),
                    reason: e.to_string(),
                }
            })?;
            if !response.ok() {
                warn!(url = %path, status = response.status, "Precache fetch failed");
                return Err(ServiceWorkerError::InstallFailed {
                    url: path.clone(),
                    reason: format!("status {}", response.status),
                });
            }
            fetched.push(CacheEntry::from_response(&request, &response));
        }

        let count = fetched.len();
        let mut caches = self.caches.write().await;
        let precache = caches.open(&self.config.cache_names.precache);
        for entry in fetched {
            precache.put(entry);
        }

        info!(version = %self.config.version, count, "Precache populated");
        Ok(count)
    }

    /// Activate handler: drop every store that does not belong to this build.
    ///
    /// Returns the names of the deleted stores.
    pub async fn activate(&self) -> Vec<String> {
        let mut caches = self.caches.write().await;
        let stale: Vec<String> = caches
            .keys()
            .into_iter()
            .filter(|name| !self.config.cache_names.contains(name))
            .map(str::to_string)
            .collect();

        for name in &stale {
            caches.delete(name);
            info!(cache = %name, "Deleted outdated cache");
        }

        info!(version = %self.config.version, deleted = stale.len(), "Worker activated");
        stale
    }

    /// Fetch handler. `None` means the request is not intercepted and goes
    /// to the network as if no worker were installed.
    pub async fn handle_fetch(&self, request: Request) -> Option<FetchResult> {
        let route = classify(&request, &self.config)?;
        debug!(url = %request.url, ?route, "Intercepted request");

        let cache_name = route.cache_name(&self.config.cache_names).to_string();
        let result = match route.strategy() {
            Strategy::NetworkFirst => {
                let offline_url = match route {
                    Route::Navigation => self.config.resolve(&self.config.offline_url).ok(),
                    _ => None,
                };
                let offline = offline_url.as_ref().map(|url| OfflineFallback {
                    cache_name: &self.config.cache_names.precache,
                    url: url.as_str(),
                });
                let response = strategy::network_first(
                    &self.caches,
                    self.network.as_ref(),
                    &request,
                    &cache_name,
                    offline,
                )
                .await;
                FetchResult::immediate(response)
            }
            Strategy::StaleWhileRevalidate => {
                strategy::stale_while_revalidate(
                    self.caches.clone(),
                    self.network.clone(),
                    request,
                    cache_name,
                )
                .await
            }
        };
        Some(result)
    }
}

impl std::fmt::Debug for CacheRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheRuntime")
            .field("version", &self.config.version)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheNames;
    use crate::config::RemoteApiRoute;
    use crate::harness::SimulatedNetwork;
    use crate::request::{Destination, FetchResponse};
    use http::Method;
    use url::Url;

    const ORIGIN: &str = "https://app.test";

    fn config(version: &str) -> WorkerConfig {
        WorkerConfig {
            origin: Url::parse(ORIGIN).unwrap(),
            base: "/".to_string(),
            version: version.to_string(),
            script_url: "/sw.js".to_string(),
            precache_urls: vec![
                "/".to_string(),
                "/index.js".to_string(),
                "/offline.html".to_string(),
                "/manifest.webmanifest".to_string(),
            ],
            offline_url: "/offline.html".to_string(),
            cache_names: CacheNames::versioned(None, version),
            remote_api: RemoteApiRoute::default(),
            skip_waiting: true,
        }
    }

    fn serve_app(network: &SimulatedNetwork) {
        network.serve("https://app.test/", 200, "<html>shell</html>");
        network.serve("https://app.test/index.js", 200, "console.log(1)");
        network.serve("https://app.test/offline.html", 200, "<html>offline</html>");
        network.serve("https://app.test/manifest.webmanifest", 200, "{}");
    }

    fn runtime(version: &str) -> (CacheRuntime, Arc<SimulatedNetwork>) {
        let network = Arc::new(SimulatedNetwork::new());
        serve_app(&network);
        let caches = Arc::new(RwLock::new(CacheStorage::new()));
        (
            CacheRuntime::new(config(version), caches, network.clone()),
            network,
        )
    }

    fn url(path: &str) -> Url {
        Url::parse(ORIGIN).unwrap().join(path).unwrap()
    }

    #[tokio::test]
    async fn test_install_stores_every_precache_url() {
        let (runtime, _network) = runtime("v1");

        assert_eq!(runtime.install().await.unwrap(), 4);

        let caches = runtime.caches().read().await;
        let precache = caches.get("precache-v1").unwrap();
        assert_eq!(precache.len(), 4);
        assert!(precache.match_request("https://app.test/offline.html").is_some());
    }

    #[tokio::test]
    async fn test_install_is_all_or_nothing() {
        let network = Arc::new(SimulatedNetwork::new());
        network.serve("https://app.test/", 200, "shell");
        network.serve("https://app.test/index.js", 200, "js");
        // offline.html and the manifest are missing: 404
        let caches = Arc::new(RwLock::new(CacheStorage::new()));
        let runtime = CacheRuntime::new(config("v1"), caches.clone(), network);

        let err = runtime.install().await.unwrap_err();

        assert!(matches!(err, ServiceWorkerError::InstallFailed { ref url, .. } if url == "/offline.html"));
        assert!(caches.read().await.keys().is_empty());
    }

    #[tokio::test]
    async fn test_install_fails_when_offline() {
        let (runtime, network) = runtime("v1");
        network.set_online(false);

        assert!(runtime.install().await.is_err());
        assert!(!runtime.caches().read().await.has("precache-v1"));
    }

    #[tokio::test]
    async fn test_activate_removes_other_versions() {
        let (runtime, _network) = runtime("v2");
        {
            let mut caches = runtime.caches().write().await;
            for name in CacheNames::versioned(None, "v1").all() {
                caches.open(name);
            }
            caches.open("unrelated");
            caches.open("runtime-v2");
        }

        let mut deleted = runtime.activate().await;
        deleted.sort();

        assert_eq!(deleted.len(), 7);
        assert!(deleted.contains(&"precache-v1".to_string()));
        let caches = runtime.caches().read().await;
        assert_eq!(caches.keys(), vec!["runtime-v2"]);
        for name in caches.keys() {
            assert!(runtime.config().cache_names.contains(name));
        }
    }

    #[tokio::test]
    async fn test_navigation_online_returns_and_caches_live_response() {
        let (runtime, _network) = runtime("v1");

        let result = runtime
            .handle_fetch(Request::navigate(url("/")))
            .await
            .unwrap();

        assert_eq!(result.response.text(), "<html>shell</html>");
        assert!(!result.response.from_cache);
        let caches = runtime.caches().read().await;
        assert!(caches
            .get("runtime-v1")
            .unwrap()
            .match_request("https://app.test/")
            .is_some());
    }

    #[tokio::test]
    async fn test_navigation_offline_prefers_runtime_cache() {
        let (runtime, network) = runtime("v1");
        runtime.install().await.unwrap();
        network.serve("https://app.test/links", 200, "links page");
        runtime.handle_fetch(Request::navigate(url("/links"))).await;

        network.set_online(false);
        let result = runtime
            .handle_fetch(Request::navigate(url("/links")))
            .await
            .unwrap();

        assert_eq!(result.response.text(), "links page");
        assert!(result.response.from_cache);
    }

    #[tokio::test]
    async fn test_navigation_offline_ignores_fragment() {
        let (runtime, network) = runtime("v1");
        runtime.install().await.unwrap();
        network.serve("https://app.test/links", 200, "links page");
        runtime.handle_fetch(Request::navigate(url("/links"))).await;

        network.set_online(false);
        let result = runtime
            .handle_fetch(Request::navigate(url("/links#top")))
            .await
            .unwrap();

        assert_eq!(result.response.text(), "links page");
        assert!(result.response.from_cache);
    }

    #[tokio::test]
    async fn test_navigation_offline_without_copy_serves_offline_document() {
        let (runtime, network) = runtime("v1");
        runtime.install().await.unwrap();
        network.set_online(false);

        let result = runtime
            .handle_fetch(Request::navigate(url("/threads/42")))
            .await
            .unwrap();

        assert_eq!(result.response.text(), "<html>offline</html>");
    }

    #[tokio::test]
    async fn test_navigation_offline_before_install_is_503() {
        let (runtime, network) = runtime("v1");
        network.set_online(false);

        let result = runtime
            .handle_fetch(Request::navigate(url("/")))
            .await
            .unwrap();

        assert_eq!(result.response.status, 503);
    }

    #[tokio::test]
    async fn test_api_offline_never_gets_offline_document() {
        let (runtime, network) = runtime("v1");
        runtime.install().await.unwrap();
        network.set_online(false);

        let result = runtime
            .handle_fetch(Request::get(url("/api/links")))
            .await
            .unwrap();

        assert_eq!(result.response.status, 503);
        assert_eq!(result.response.text(), "Offline");
    }

    #[tokio::test]
    async fn test_remote_api_serves_stale_data_offline() {
        let (runtime, network) = runtime("v1");
        let endpoint = "https://abc.supabase.co/rest/v1/links?select=*";
        network.serve(endpoint, 200, "[{\"id\":1}]");
        let request = Request::get(Url::parse(endpoint).unwrap());
        runtime.handle_fetch(request.clone()).await.unwrap();

        network.set_online(false);
        let result = runtime.handle_fetch(request).await.unwrap();

        assert!(result.response.from_cache);
        assert_eq!(result.response.text(), "[{\"id\":1}]");
        let caches = runtime.caches().read().await;
        assert!(caches.get("remote-api-v1").unwrap().match_request(endpoint).is_some());
    }

    #[tokio::test]
    async fn test_images_use_image_store() {
        let (runtime, network) = runtime("v1");
        network.serve("https://app.test/icons/icon-192x192.png", 200, "png");

        let request = Request::subresource(url("/icons/icon-192x192.png"), Destination::Image);
        runtime.handle_fetch(request).await.unwrap();

        assert!(runtime.caches().read().await.has("images-v1"));
    }

    #[tokio::test]
    async fn test_non_get_passes_through() {
        let (runtime, network) = runtime("v1");

        let request = Request::get(url("/api/links")).with_method(Method::POST);
        assert!(runtime.handle_fetch(request).await.is_none());
        assert!(network.requests().is_empty());
    }

    #[tokio::test]
    async fn test_other_origins_pass_through() {
        let (runtime, _network) = runtime("v1");
        let request = Request::get(Url::parse("https://analytics.test/collect").unwrap());
        assert!(runtime.handle_fetch(request).await.is_none());
    }

    #[tokio::test]
    async fn test_network_error_response_is_not_cached() {
        let (runtime, network) = runtime("v1");
        network.serve_response("https://app.test/api/links", FetchResponse::new(404, ""));

        let result = runtime
            .handle_fetch(Request::get(url("/api/links")))
            .await
            .unwrap();

        assert_eq!(result.response.status, 404);
        assert!(!runtime.caches().read().await.has("api-v1"));
    }
}
