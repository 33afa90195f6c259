//! Page-level notifications the host UI listens to.

use tokio::sync::broadcast;
use tracing::trace;

/// A notification dispatched to the host page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostSignal {
    /// A new version is installed and waiting for a reload.
    NeedRefresh,
    /// The first install finished; the app now works offline.
    OfflineReady,
}

impl HostSignal {
    /// DOM event name the host dispatches.
    pub fn event_name(&self) -> &'static str {
        match self {
            HostSignal::NeedRefresh => "pwa:need-refresh",
            HostSignal::OfflineReady => "pwa:offline-ready",
        }
    }
}

/// Broadcasts [`HostSignal`]s to any number of UI listeners.
#[derive(Debug, Clone)]
pub struct HostSignals {
    tx: broadcast::Sender<HostSignal>,
}

impl HostSignals {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<HostSignal> {
        self.tx.subscribe()
    }

    /// Dispatch a signal; returns how many listeners received it.
    pub fn dispatch(&self, signal: HostSignal) -> usize {
        trace!(event = signal.event_name(), "Dispatching host signal");
        self.tx.send(signal).unwrap_or(0)
    }
}

impl Default for HostSignals {
    fn default() -> Self {
        Self::new(16)
    }
}
