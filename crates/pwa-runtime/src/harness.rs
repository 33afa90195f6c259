//! A simulated browser for exercising generated workers outside a browser.
//!
//! [`SimulatedNetwork`] stands in for the origin server and the wire;
//! [`SimulatedBrowser`] plays the browser's part in the worker lifecycle:
//! it runs install and activate handlers, tracks the controller, and sends
//! page requests through the controlling worker.

use async_trait::async_trait;
use hashbrown::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, Notify, RwLock};
use tracing::{debug, warn};
use url::Url;

use crate::cache::CacheStorage;
use crate::config::WorkerConfig;
use crate::container::{scope_for, ServiceWorkerContainer, ServiceWorkerEvent};
use crate::network::Network;
use crate::request::{FetchResponse, Request};
use crate::runtime::CacheRuntime;
use crate::strategy::FetchResult;
use crate::worker::{ServiceWorker, ServiceWorkerId};
use crate::{lock, ServiceWorkerError};

// ==================== Network ====================

/// Programmable network: fixed responses per URL, an online switch, and a
/// request log. Unknown URLs answer 404.
#[derive(Debug)]
pub struct SimulatedNetwork {
    responses: Mutex<HashMap<String, FetchResponse>>,
    online: AtomicBool,
    log: Mutex<Vec<String>>,
    gate: Mutex<Option<Arc<Notify>>>,
}

impl SimulatedNetwork {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(HashMap::new()),
            online: AtomicBool::new(true),
            log: Mutex::new(Vec::new()),
            gate: Mutex::new(None),
        }
    }

    /// Serve `body` with `status` at `url`.
    pub fn serve(&self, url: &str, status: u16, body: &str) {
        self.serve_response(url, FetchResponse::new(status, body));
    }

    pub fn serve_response(&self, url: &str, response: FetchResponse) {
        lock(&self.responses).insert(url.to_string(), response);
    }

    /// Stop serving `url`; it answers 404 afterwards.
    pub fn remove(&self, url: &str) {
        lock(&self.responses).remove(url);
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    /// Hold every subsequent response until the returned gate is notified,
    /// once per request.
    pub fn hold(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *lock(&self.gate) = Some(gate.clone());
        gate
    }

    /// Stop holding responses.
    pub fn release(&self) {
        *lock(&self.gate) = None;
    }

    /// URLs requested so far, in order.
    pub fn requests(&self) -> Vec<String> {
        lock(&self.log).clone()
    }

    pub fn request_count(&self, url: &str) -> usize {
        lock(&self.log).iter().filter(|u| *u == url).count()
    }
}

impl Default for SimulatedNetwork {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Network for SimulatedNetwork {
    async fn fetch(&self, request: &Request) -> Result<FetchResponse, ServiceWorkerError> {
        lock(&self.log).push(request.url.to_string());

        let gate = lock(&self.gate).clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        if !self.is_online() {
            return Err(ServiceWorkerError::NetworkError(format!(
                "offline: {}",
                request.url
            )));
        }

        let response = lock(&self.responses).get(request.cache_key()).cloned();
        Ok(response.unwrap_or_else(|| FetchResponse::new(404, "Not Found")))
    }
}

// ==================== Browser ====================

/// One origin's worker machinery: container, cache storage, network, and
/// the runtime instance behind each installed worker.
pub struct SimulatedBrowser {
    container: ServiceWorkerContainer,
    caches: Arc<RwLock<CacheStorage>>,
    network: Arc<SimulatedNetwork>,
    runtimes: Mutex<HashMap<ServiceWorkerId, Arc<CacheRuntime>>>,
    events: Mutex<mpsc::UnboundedReceiver<ServiceWorkerEvent>>,
}

impl SimulatedBrowser {
    pub fn new(origin: Url) -> Self {
        let (container, events) = ServiceWorkerContainer::new(origin);
        Self {
            container,
            caches: Arc::new(RwLock::new(CacheStorage::new())),
            network: Arc::new(SimulatedNetwork::new()),
            runtimes: Mutex::new(HashMap::new()),
            events: Mutex::new(events),
        }
    }

    pub fn container(&self) -> &ServiceWorkerContainer {
        &self.container
    }

    pub fn network(&self) -> &Arc<SimulatedNetwork> {
        &self.network
    }

    pub fn caches(&self) -> &Arc<RwLock<CacheStorage>> {
        &self.caches
    }

    /// Container events emitted since the last call, oldest first.
    pub fn take_events(&self) -> Vec<ServiceWorkerEvent> {
        let mut events = lock(&self.events);
        std::iter::from_fn(|| events.try_recv().ok()).collect()
    }

    /// Runtime behind the controlling worker.
    pub fn controller_runtime(&self) -> Option<Arc<CacheRuntime>> {
        let controller = self.container.controller()?;
        lock(&self.runtimes).get(&controller.id()).cloned()
    }

    /// A new worker script was published: install it, and activate it
    /// right away when it skips waiting.
    ///
    /// A failed install discards the new worker; whatever controlled the
    /// page before keeps doing so.
    pub async fn deploy(&self, config: WorkerConfig) -> Result<Arc<ServiceWorker>, ServiceWorkerError> {
        let script_url = config.resolve(&config.script_url)?;
        let scope = scope_for(&script_url).to_string();
        let skip_waiting = config.skip_waiting;

        // The page may not have registered yet; registering is idempotent.
        self.container.register(script_url.as_str()).await?;
        let worker = self.container.start_install(&scope).await?;
        let network: Arc<dyn Network> = self.network.clone();
        let runtime = Arc::new(CacheRuntime::new(config, self.caches.clone(), network));

        if let Err(error) = runtime.install().await {
            warn!(scope = %scope, error = %error, "Install handler failed");
            self.container.fail_install(&scope).await?;
            return Err(error);
        }

        lock(&self.runtimes).insert(worker.id(), runtime);
        self.container.finish_install(&scope).await?;

        if skip_waiting {
            self.activate(&scope).await?;
        }
        Ok(worker)
    }

    /// Activate the waiting worker of `scope` and run its activate handler.
    pub async fn activate(&self, scope: &str) -> Result<Arc<ServiceWorker>, ServiceWorkerError> {
        let worker = self.container.activate(scope).await?;
        let runtime = lock(&self.runtimes).get(&worker.id()).cloned();
        if let Some(runtime) = runtime {
            runtime.activate().await;
        }
        Ok(worker)
    }

    /// A request made by a controlled page.
    pub async fn fetch(&self, request: Request) -> FetchResponse {
        self.fetch_with_revalidation(request).await.response
    }

    /// Like [`fetch`](Self::fetch), keeping the handle of any background refresh.
    pub async fn fetch_with_revalidation(&self, request: Request) -> FetchResult {
        if let Some(runtime) = self.controller_runtime() {
            if let Some(result) = runtime.handle_fetch(request.clone()).await {
                return result;
            }
        }

        debug!(url = %request.url, "Request not intercepted");
        let response = match self.network.fetch(&request).await {
            Ok(response) => response,
            Err(_) => FetchResponse::network_error(),
        };
        FetchResult::immediate(response)
    }
}

impl std::fmt::Debug for SimulatedBrowser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulatedBrowser")
            .field("container", &self.container)
            .field("network", &self.network)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheNames;
    use crate::config::RemoteApiRoute;

    #[tokio::test]
    async fn test_simulated_network_serves_and_logs() {
        let network = SimulatedNetwork::new();
        network.serve("https://app.test/a.js", 200, "a");
        let request = Request::get(Url::parse("https://app.test/a.js").unwrap());

        let response = network.fetch(&request).await.unwrap();
        assert_eq!(response.text(), "a");

        let missing = Request::get(Url::parse("https://app.test/b.js").unwrap());
        assert_eq!(network.fetch(&missing).await.unwrap().status, 404);
        assert_eq!(network.request_count("https://app.test/a.js"), 1);
        assert_eq!(network.requests().len(), 2);
    }

    #[tokio::test]
    async fn test_simulated_network_offline_rejects() {
        let network = SimulatedNetwork::new();
        network.serve("https://app.test/a.js", 200, "a");
        network.set_online(false);

        let request = Request::get(Url::parse("https://app.test/a.js").unwrap());
        assert!(matches!(
            network.fetch(&request).await,
            Err(ServiceWorkerError::NetworkError(_))
        ));
    }

    #[tokio::test]
    async fn test_deploy_reports_container_events() {
        let browser = SimulatedBrowser::new(Url::parse("https://app.test").unwrap());
        browser.network().serve("https://app.test/", 200, "shell");
        let config = WorkerConfig {
            origin: Url::parse("https://app.test").unwrap(),
            base: "/".to_string(),
            version: "v1".to_string(),
            script_url: "/sw.js".to_string(),
            precache_urls: vec!["/".to_string()],
            offline_url: "/".to_string(),
            cache_names: CacheNames::versioned(None, "v1"),
            remote_api: RemoteApiRoute::default(),
            skip_waiting: true,
        };

        let worker = browser.deploy(config).await.unwrap();
        let events = browser.take_events();

        assert!(matches!(events.first(), Some(ServiceWorkerEvent::UpdateFound { .. })));
        assert_eq!(
            events.last(),
            Some(&ServiceWorkerEvent::ControllerChange {
                worker_id: worker.id()
            })
        );
        assert!(browser.take_events().is_empty());
    }

    #[tokio::test]
    async fn test_uncontrolled_page_goes_to_network() {
        let browser = SimulatedBrowser::new(Url::parse("https://app.test").unwrap());
        browser.network().set_online(false);

        let response = browser
            .fetch(Request::navigate(Url::parse("https://app.test/").unwrap()))
            .await;

        assert_eq!(response.status, 0);
    }
}
