//! `navigator.serviceWorker`: registrations, the controller, and the
//! browser-driven lifecycle transitions.

use hashbrown::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info, warn};
use url::Url;

use crate::worker::{ServiceWorker, ServiceWorkerId, ServiceWorkerRegistration, ServiceWorkerState};
use crate::{lock, ServiceWorkerError};

/// Service worker events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceWorkerEvent {
    /// State changed.
    StateChange {
        registration_scope: String,
        worker_id: ServiceWorkerId,
        new_state: ServiceWorkerState,
    },
    /// Update found.
    UpdateFound { registration_scope: String },
    /// Controller changed.
    ControllerChange { worker_id: ServiceWorkerId },
}

/// Service worker container (navigator.serviceWorker) for one page origin.
pub struct ServiceWorkerContainer {
    origin: Url,
    supported: bool,
    registrations: RwLock<HashMap<String, Arc<ServiceWorkerRegistration>>>,
    controller: Mutex<Option<Arc<ServiceWorker>>>,
    event_tx: mpsc::UnboundedSender<ServiceWorkerEvent>,
}

impl ServiceWorkerContainer {
    /// Create a new container.
    pub fn new(origin: Url) -> (Self, mpsc::UnboundedReceiver<ServiceWorkerEvent>) {
        Self::with_support(origin, true)
    }

    /// A host without service worker support.
    pub fn unsupported(origin: Url) -> (Self, mpsc::UnboundedReceiver<ServiceWorkerEvent>) {
        Self::with_support(origin, false)
    }

    fn with_support(
        origin: Url,
        supported: bool,
    ) -> (Self, mpsc::UnboundedReceiver<ServiceWorkerEvent>) {
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        (
            Self {
                origin,
                supported,
                registrations: RwLock::new(HashMap::new()),
                controller: Mutex::new(None),
                event_tx,
            },
            event_rx,
        )
    }

    pub fn origin(&self) -> &Url {
        &self.origin
    }

    pub fn is_supported(&self) -> bool {
        self.supported
    }

    /// The worker controlling this page, if any.
    pub fn controller(&self) -> Option<Arc<ServiceWorker>> {
        lock(&self.controller).clone()
    }

    /// Register a service worker script.
    ///
    /// Registering an already registered script returns the existing
    /// registration.
    pub async fn register(
        &self,
        script_url: &str,
    ) -> Result<Arc<ServiceWorkerRegistration>, ServiceWorkerError> {
        if !self.supported {
            return Err(ServiceWorkerError::StateError(
                "Service workers are not supported".to_string(),
            ));
        }

        let script_url = self
            .origin
            .join(script_url)
            .map_err(|e| ServiceWorkerError::RegistrationFailed(e.to_string()))?;
        if script_url.origin() != self.origin.origin() {
            return Err(ServiceWorkerError::SecurityError(format!(
                "Script {script_url} is not same-origin with {}",
                self.origin
            )));
        }

        let scope = scope_for(&script_url);
        let scope_str = scope.to_string();

        let mut registrations = self.registrations.write().await;
        let registration = registrations
            .entry(scope_str.clone())
            .or_insert_with(|| {
                info!(scope = %scope_str, script = %script_url, "Created registration");
                Arc::new(ServiceWorkerRegistration::new(scope, script_url))
            })
            .clone();

        Ok(registration)
    }

    /// Get the registration whose scope covers `url` (longest scope wins).
    pub async fn get_registration(&self, url: &str) -> Option<Arc<ServiceWorkerRegistration>> {
        let url = self.origin.join(url).ok()?;
        let registrations = self.registrations.read().await;

        registrations
            .iter()
            .filter(|(scope, _)| url.as_str().starts_with(scope.as_str()))
            .max_by_key(|(scope, _)| scope.len())
            .map(|(_, registration)| registration.clone())
    }

    /// Get all registration scopes.
    pub async fn get_registrations(&self) -> Vec<String> {
        self.registrations.read().await.keys().cloned().collect()
    }

    async fn registration(
        &self,
        scope: &str,
    ) -> Result<Arc<ServiceWorkerRegistration>, ServiceWorkerError> {
        self.registrations
            .read()
            .await
            .get(scope)
            .cloned()
            .ok_or_else(|| ServiceWorkerError::NotFound(scope.to_string()))
    }

    /// A new script version was found: start installing it.
    pub async fn start_install(&self, scope: &str) -> Result<Arc<ServiceWorker>, ServiceWorkerError> {
        let registration = self.registration(scope).await?;
        let had_controller = self.controller().is_some();

        let worker = registration.begin_install(had_controller);
        debug!(scope, worker = worker.id().raw(), had_controller, "Update found");

        let _ = self.event_tx.send(ServiceWorkerEvent::UpdateFound {
            registration_scope: scope.to_string(),
        });
        self.emit_state(scope, &worker);
        Ok(worker)
    }

    /// The install handler succeeded: the worker moves to waiting.
    pub async fn finish_install(&self, scope: &str) -> Result<Arc<ServiceWorker>, ServiceWorkerError> {
        let registration = self.registration(scope).await?;
        let worker = registration.install_complete().ok_or_else(|| {
            ServiceWorkerError::StateError(format!("No installing worker in {scope}"))
        })?;

        self.emit_state(scope, &worker);
        Ok(worker)
    }

    /// The install handler failed: the worker is discarded and the current
    /// controller keeps serving.
    pub async fn fail_install(&self, scope: &str) -> Result<(), ServiceWorkerError> {
        let registration = self.registration(scope).await?;
        if let Some(worker) = registration.install_failed() {
            warn!(scope, worker = worker.id().raw(), "Install failed, worker discarded");
            self.emit_state(scope, &worker);
        }
        Ok(())
    }

    /// Activate the waiting worker and let it claim the page.
    pub async fn activate(&self, scope: &str) -> Result<Arc<ServiceWorker>, ServiceWorkerError> {
        let registration = self.registration(scope).await?;
        let worker = registration.activate().ok_or_else(|| {
            ServiceWorkerError::StateError(format!("No waiting worker in {scope}"))
        })?;
        self.emit_state(scope, &worker);

        *lock(&self.controller) = Some(worker.clone());
        let _ = self.event_tx.send(ServiceWorkerEvent::ControllerChange {
            worker_id: worker.id(),
        });

        info!(scope, worker = worker.id().raw(), "Worker activated and claimed page");
        Ok(worker)
    }

    fn emit_state(&self, scope: &str, worker: &ServiceWorker) {
        let _ = self.event_tx.send(ServiceWorkerEvent::StateChange {
            registration_scope: scope.to_string(),
            worker_id: worker.id(),
            new_state: worker.state(),
        });
    }
}

impl std::fmt::Debug for ServiceWorkerContainer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceWorkerContainer")
            .field("origin", &self.origin.as_str())
            .field("supported", &self.supported)
            .field("controller", &self.controller().map(|w| w.id()))
            .finish_non_exhaustive()
    }
}

/// Default scope of a script: the directory it is served from.
pub fn scope_for(script_url: &Url) -> Url {
    let mut scope = script_url.clone();
    let dir = match script_url.path().rfind('/') {
        Some(idx) => &script_url.path()[..=idx],
        None => "/",
    };
    scope.set_path(dir);
    scope.set_query(None);
    scope.set_fragment(None);
    scope
}
