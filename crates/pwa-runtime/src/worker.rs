//! Worker instances and their registration, as the page observes them.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::{debug, trace};
use url::Url;

use crate::{lock, ServiceWorkerError};

// ==================== Types ====================

/// Unique identifier for a service worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ServiceWorkerId(u64);

impl ServiceWorkerId {
    fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// Service worker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ServiceWorkerState {
    /// Initial state, script being parsed.
    #[default]
    Parsed,
    /// Installing (install event).
    Installing,
    /// Installed but waiting for activation.
    Installed,
    /// Activating (activate event).
    Activating,
    /// Active and controlling pages.
    Activated,
    /// Redundant (replaced or install failed).
    Redundant,
}

type StateListener = Arc<dyn Fn(ServiceWorkerState) + Send + Sync>;
type UpdateFoundListener = Arc<dyn Fn(&UpdateFound) + Send + Sync>;

// ==================== Service Worker ====================

/// A service worker instance.
pub struct ServiceWorker {
    id: ServiceWorkerId,
    script_url: Url,
    state: Mutex<(ServiceWorkerState, Instant)>,
    listeners: Mutex<Vec<StateListener>>,
}

impl ServiceWorker {
    /// Create a new service worker.
    pub fn new(script_url: Url) -> Self {
        Self {
            id: ServiceWorkerId::new(),
            script_url,
            state: Mutex::new((ServiceWorkerState::Parsed, Instant::now())),
            listeners: Mutex::new(Vec::new()),
        }
    }

    pub fn id(&self) -> ServiceWorkerId {
        self.id
    }

    pub fn script_url(&self) -> &Url {
        &self.script_url
    }

    pub fn state(&self) -> ServiceWorkerState {
        lock(&self.state).0
    }

    /// Time of last state change.
    pub fn state_changed_at(&self) -> Instant {
        lock(&self.state).1
    }

    /// Check if active.
    pub fn is_active(&self) -> bool {
        self.state() == ServiceWorkerState::Activated
    }

    /// Check if redundant.
    pub fn is_redundant(&self) -> bool {
        self.state() == ServiceWorkerState::Redundant
    }

    /// `statechange` listener; called with the new state after each transition.
    pub fn on_state_change(&self, listener: impl Fn(ServiceWorkerState) + Send + Sync + 'static) {
        lock(&self.listeners).push(Arc::new(listener));
    }

    /// Set state and notify listeners. Re-entering the same state is silent.
    pub(crate) fn set_state(&self, state: ServiceWorkerState) {
        {
            let mut current = lock(&self.state);
            if current.0 == state {
                return;
            }
            *current = (state, Instant::now());
        }
        trace!(worker = self.id.0, ?state, "Worker state changed");

        let listeners = lock(&self.listeners).clone();
        for listener in listeners {
            listener(state);
        }
    }
}

impl std::fmt::Debug for ServiceWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceWorker")
            .field("id", &self.id)
            .field("script_url", &self.script_url.as_str())
            .field("state", &self.state())
            .finish()
    }
}

/// Payload of an `updatefound` event.
#[derive(Debug, Clone)]
pub struct UpdateFound {
    /// The newly installing worker.
    pub worker: Arc<ServiceWorker>,
    /// Whether a worker already controlled the page when this install began.
    pub had_controller: bool,
}

// ==================== Registration ====================

#[derive(Default)]
struct Slots {
    installing: Option<Arc<ServiceWorker>>,
    waiting: Option<Arc<ServiceWorker>>,
    active: Option<Arc<ServiceWorker>>,
}

/// A service worker registration.
pub struct ServiceWorkerRegistration {
    scope: Url,
    script_url: Url,
    slots: Mutex<Slots>,
    update_found: Mutex<Vec<UpdateFoundListener>>,
    update_checks: AtomicU32,
    last_update_check: Mutex<Option<Instant>>,
}

impl ServiceWorkerRegistration {
    /// Create a new registration.
    pub fn new(scope: Url, script_url: Url) -> Self {
        Self {
            scope,
            script_url,
            slots: Mutex::new(Slots::default()),
            update_found: Mutex::new(Vec::new()),
            update_checks: AtomicU32::new(0),
            last_update_check: Mutex::new(None),
        }
    }

    pub fn scope(&self) -> &Url {
        &self.scope
    }

    pub fn script_url(&self) -> &Url {
        &self.script_url
    }

    pub fn installing(&self) -> Option<Arc<ServiceWorker>> {
        lock(&self.slots).installing.clone()
    }

    pub fn waiting(&self) -> Option<Arc<ServiceWorker>> {
        lock(&self.slots).waiting.clone()
    }

    pub fn active(&self) -> Option<Arc<ServiceWorker>> {
        lock(&self.slots).active.clone()
    }

    /// `updatefound` listener.
    pub fn on_update_found(&self, listener: impl Fn(&UpdateFound) + Send + Sync + 'static) {
        lock(&self.update_found).push(Arc::new(listener));
    }

    /// Ask the browser to check the script for a newer version.
    pub async fn update(&self) -> Result<(), ServiceWorkerError> {
        let checks = self.update_checks.fetch_add(1, Ordering::Relaxed) + 1;
        *lock(&self.last_update_check) = Some(Instant::now());
        debug!(scope = %self.scope, checks, "Update check requested");
        Ok(())
    }

    /// Number of update checks requested so far.
    pub fn update_checks(&self) -> u32 {
        self.update_checks.load(Ordering::Relaxed)
    }

    pub fn last_update_check(&self) -> Option<Instant> {
        *lock(&self.last_update_check)
    }

    /// Start installing a new worker and fire `updatefound`.
    pub(crate) fn begin_install(&self, had_controller: bool) -> Arc<ServiceWorker> {
        let worker = Arc::new(ServiceWorker::new(self.script_url.clone()));
        let replaced = lock(&self.slots).installing.replace(worker.clone());
        if let Some(old) = replaced {
            old.set_state(ServiceWorkerState::Redundant);
        }
        worker.set_state(ServiceWorkerState::Installing);

        let event = UpdateFound {
            worker: worker.clone(),
            had_controller,
        };
        let listeners = lock(&self.update_found).clone();
        for listener in listeners {
            listener(&event);
        }
        worker
    }

    /// Transition installing to waiting.
    pub(crate) fn install_complete(&self) -> Option<Arc<ServiceWorker>> {
        let (worker, replaced) = {
            let mut slots = lock(&self.slots);
            let worker = slots.installing.take()?;
            let replaced = slots.waiting.replace(worker.clone());
            (worker, replaced)
        };
        if let Some(old) = replaced {
            old.set_state(ServiceWorkerState::Redundant);
        }
        worker.set_state(ServiceWorkerState::Installed);
        Some(worker)
    }

    /// Discard the installing worker.
    pub(crate) fn install_failed(&self) -> Option<Arc<ServiceWorker>> {
        let worker = lock(&self.slots).installing.take()?;
        worker.set_state(ServiceWorkerState::Redundant);
        Some(worker)
    }

    /// Activate waiting worker.
    pub(crate) fn activate(&self) -> Option<Arc<ServiceWorker>> {
        let (worker, old) = {
            let mut slots = lock(&self.slots);
            let worker = slots.waiting.take()?;
            let old = slots.active.replace(worker.clone());
            (worker, old)
        };
        worker.set_state(ServiceWorkerState::Activating);
        if let Some(old) = old {
            old.set_state(ServiceWorkerState::Redundant);
        }
        worker.set_state(ServiceWorkerState::Activated);
        Some(worker)
    }
}

impl std::fmt::Debug for ServiceWorkerRegistration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceWorkerRegistration")
            .field("scope", &self.scope.as_str())
            .field("installing", &self.installing())
            .field("waiting", &self.waiting())
            .field("active", &self.active())
            .finish()
    }
}
