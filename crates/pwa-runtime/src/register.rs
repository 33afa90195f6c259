//! Page-side registration client.
//!
//! [`register_sw`] installs the worker and turns lifecycle transitions into
//! two notifications: a newer version is waiting (`on_need_refresh`), or the
//! first install completed and the app is usable offline (`on_offline_ready`).

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::container::ServiceWorkerContainer;
use crate::signals::{HostSignal, HostSignals};
use crate::worker::{ServiceWorkerRegistration, ServiceWorkerState, UpdateFound};
use crate::ServiceWorkerError;

pub type Callback = Arc<dyn Fn() + Send + Sync>;
pub type RegisteredCallback = Arc<dyn Fn(&Arc<ServiceWorkerRegistration>) + Send + Sync>;
pub type RegisterErrorCallback = Arc<dyn Fn(&ServiceWorkerError) + Send + Sync>;

/// Options for [`register_sw`].
#[derive(Clone)]
pub struct RegisterOptions {
    /// Worker script URL, relative to the page origin.
    pub script_url: String,
    /// Check for an update right after registering.
    pub immediate: bool,
    pub on_need_refresh: Option<Callback>,
    pub on_offline_ready: Option<Callback>,
    pub on_registered: Option<RegisteredCallback>,
    pub on_register_error: Option<RegisterErrorCallback>,
}

impl Default for RegisterOptions {
    fn default() -> Self {
        Self {
            script_url: "/sw.js".to_string(),
            immediate: false,
            on_need_refresh: None,
            on_offline_ready: None,
            on_registered: None,
            on_register_error: None,
        }
    }
}

impl RegisterOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script_url(mut self, script_url: impl Into<String>) -> Self {
        self.script_url = script_url.into();
        self
    }

    pub fn immediate(mut self, immediate: bool) -> Self {
        self.immediate = immediate;
        self
    }

    pub fn on_need_refresh(mut self, callback: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_need_refresh = Some(Arc::new(callback));
        self
    }

    pub fn on_offline_ready(mut self, callback: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_offline_ready = Some(Arc::new(callback));
        self
    }

    pub fn on_registered(
        mut self,
        callback: impl Fn(&Arc<ServiceWorkerRegistration>) + Send + Sync + 'static,
    ) -> Self {
        self.on_registered = Some(Arc::new(callback));
        self
    }

    pub fn on_register_error(
        mut self,
        callback: impl Fn(&ServiceWorkerError) + Send + Sync + 'static,
    ) -> Self {
        self.on_register_error = Some(Arc::new(callback));
        self
    }

    /// Route both notifications to host-level signals.
    pub fn with_signals(self, signals: &HostSignals) -> Self {
        let refresh = signals.clone();
        let ready = signals.clone();
        self.on_need_refresh(move || {
            refresh.dispatch(HostSignal::NeedRefresh);
        })
        .on_offline_ready(move || {
            ready.dispatch(HostSignal::OfflineReady);
        })
    }
}

impl std::fmt::Debug for RegisterOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisterOptions")
            .field("script_url", &self.script_url)
            .field("immediate", &self.immediate)
            .field("on_need_refresh", &self.on_need_refresh.is_some())
            .field("on_offline_ready", &self.on_offline_ready.is_some())
            .field("on_registered", &self.on_registered.is_some())
            .field("on_register_error", &self.on_register_error.is_some())
            .finish()
    }
}

/// Handle returned by [`register_sw`]; asks the browser for update checks.
#[derive(Debug, Clone, Default)]
pub struct SwUpdater {
    registration: Option<Arc<ServiceWorkerRegistration>>,
}

impl SwUpdater {
    /// An updater with nothing to update.
    pub fn noop() -> Self {
        Self::default()
    }

    pub fn registration(&self) -> Option<&Arc<ServiceWorkerRegistration>> {
        self.registration.as_ref()
    }

    pub fn is_registered(&self) -> bool {
        self.registration.is_some()
    }

    /// Check for a newer worker. Does nothing without a registration.
    pub async fn update(&self) -> Result<(), ServiceWorkerError> {
        match &self.registration {
            Some(registration) => registration.update().await,
            None => {
                debug!("No registration, skipping update check");
                Ok(())
            }
        }
    }
}

/// Register the worker and wire lifecycle notifications.
///
/// Never fails: registration errors go to `on_register_error` and yield a
/// no-op updater, as does a host without worker support.
pub async fn register_sw(container: &ServiceWorkerContainer, options: RegisterOptions) -> SwUpdater {
    if !container.is_supported() {
        debug!("Service workers unsupported, registration skipped");
        return SwUpdater::noop();
    }

    let registration = match container.register(&options.script_url).await {
        Ok(registration) => registration,
        Err(error) => {
            warn!(script = %options.script_url, error = %error, "Service worker registration failed");
            if let Some(callback) = &options.on_register_error {
                callback(&error);
            }
            return SwUpdater::noop();
        }
    };
    info!(scope = %registration.scope(), "Service worker registered");

    if let Some(callback) = &options.on_registered {
        callback(&registration);
    }

    if options.immediate {
        if let Err(error) = registration.update().await {
            warn!(error = %error, "Immediate update check failed");
        }
    }

    if registration.waiting().is_some() && container.controller().is_some() {
        if let Some(callback) = &options.on_need_refresh {
            callback();
        }
    }

    let on_need_refresh = options.on_need_refresh.clone();
    let on_offline_ready = options.on_offline_ready.clone();
    registration.on_update_found(move |found: &UpdateFound| {
        let had_controller = found.had_controller;
        let on_need_refresh = on_need_refresh.clone();
        let on_offline_ready = on_offline_ready.clone();
        found.worker.on_state_change(move |state| {
            if state != ServiceWorkerState::Installed {
                return;
            }
            let callback = if had_controller {
                &on_need_refresh
            } else {
                &on_offline_ready
            };
            if let Some(callback) = callback {
                callback();
            }
        });
    });

    SwUpdater {
        registration: Some(registration),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use url::Url;

    const SCOPE: &str = "https://app.test/";

    fn container() -> ServiceWorkerContainer {
        ServiceWorkerContainer::new(Url::parse("https://app.test").unwrap()).0
    }

    fn counter() -> (Arc<AtomicUsize>, impl Fn() + Send + Sync + 'static) {
        let count = Arc::new(AtomicUsize::new(0));
        let handle = count.clone();
        (count, move || {
            handle.fetch_add(1, Ordering::SeqCst);
        })
    }

    async fn install_first_version(container: &ServiceWorkerContainer) {
        container.start_install(SCOPE).await.unwrap();
        container.finish_install(SCOPE).await.unwrap();
        container.activate(SCOPE).await.unwrap();
    }

    #[tokio::test]
    async fn test_unsupported_host_returns_noop_updater() {
        let (container, _rx) =
            ServiceWorkerContainer::unsupported(Url::parse("https://app.test").unwrap());
        let (errors, on_error) = counter();

        let updater = register_sw(
            &container,
            RegisterOptions::new().on_register_error(move |_| on_error()),
        )
        .await;

        assert!(!updater.is_registered());
        assert!(updater.update().await.is_ok());
        assert_eq!(errors.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_registration_error_goes_to_callback() {
        let container = container();
        let (errors, on_error) = counter();

        let updater = register_sw(
            &container,
            RegisterOptions::new()
                .script_url("https://cdn.test/sw.js")
                .on_register_error(move |error| {
                    assert!(matches!(error, ServiceWorkerError::SecurityError(_)));
                    on_error();
                }),
        )
        .await;

        assert_eq!(errors.load(Ordering::SeqCst), 1);
        assert!(!updater.is_registered());
        assert!(updater.update().await.is_ok());
    }

    #[tokio::test]
    async fn test_on_registered_receives_handle() {
        let container = container();
        let (registered, on_registered) = counter();

        let updater = register_sw(
            &container,
            RegisterOptions::new().on_registered(move |registration| {
                assert_eq!(registration.scope().as_str(), SCOPE);
                on_registered();
            }),
        )
        .await;

        assert_eq!(registered.load(Ordering::SeqCst), 1);
        assert!(updater.is_registered());
    }

    #[tokio::test]
    async fn test_immediate_checks_for_update() {
        let container = container();

        let lazy = register_sw(&container, RegisterOptions::new()).await;
        assert_eq!(lazy.registration().unwrap().update_checks(), 0);

        let eager = register_sw(&container, RegisterOptions::new().immediate(true)).await;
        assert_eq!(eager.registration().unwrap().update_checks(), 1);
    }

    #[tokio::test]
    async fn test_updater_asks_registration() {
        let container = container();
        let updater = register_sw(&container, RegisterOptions::new()).await;

        updater.update().await.unwrap();
        updater.update().await.unwrap();

        assert_eq!(updater.registration().unwrap().update_checks(), 2);
    }

    #[tokio::test]
    async fn test_first_install_fires_offline_ready_once() {
        let container = container();
        let (ready, on_ready) = counter();
        let (refresh, on_refresh) = counter();

        register_sw(
            &container,
            RegisterOptions::new()
                .on_offline_ready(on_ready)
                .on_need_refresh(on_refresh),
        )
        .await;
        install_first_version(&container).await;

        assert_eq!(ready.load(Ordering::SeqCst), 1);
        assert_eq!(refresh.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_update_with_controller_fires_need_refresh_once() {
        let container = container();
        container.register("/sw.js").await.unwrap();
        install_first_version(&container).await;

        let (ready, on_ready) = counter();
        let (refresh, on_refresh) = counter();
        register_sw(
            &container,
            RegisterOptions::new()
                .on_offline_ready(on_ready)
                .on_need_refresh(on_refresh),
        )
        .await;

        container.start_install(SCOPE).await.unwrap();
        container.finish_install(SCOPE).await.unwrap();
        container.activate(SCOPE).await.unwrap();

        assert_eq!(refresh.load(Ordering::SeqCst), 1);
        assert_eq!(ready.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_waiting_worker_at_registration_fires_need_refresh() {
        let container = container();
        container.register("/sw.js").await.unwrap();
        install_first_version(&container).await;
        container.start_install(SCOPE).await.unwrap();
        container.finish_install(SCOPE).await.unwrap();

        let (refresh, on_refresh) = counter();
        register_sw(&container, RegisterOptions::new().on_need_refresh(on_refresh)).await;

        assert_eq!(refresh.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_install_notifies_nothing() {
        let container = container();
        let (ready, on_ready) = counter();
        let (refresh, on_refresh) = counter();
        register_sw(
            &container,
            RegisterOptions::new()
                .on_offline_ready(on_ready)
                .on_need_refresh(on_refresh),
        )
        .await;

        container.start_install(SCOPE).await.unwrap();
        container.fail_install(SCOPE).await.unwrap();

        assert_eq!(ready.load(Ordering::SeqCst), 0);
        assert_eq!(refresh.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_with_signals_dispatches_host_events() {
        let container = container();
        let signals = HostSignals::default();
        let mut rx = signals.subscribe();

        register_sw(&container, RegisterOptions::new().with_signals(&signals)).await;
        install_first_version(&container).await;

        assert_eq!(rx.try_recv().unwrap(), HostSignal::OfflineReady);
        assert!(rx.try_recv().is_err());
    }
}
