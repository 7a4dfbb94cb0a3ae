//! Shutdown coordination between the signal handler and the listeners.

use tokio::sync::broadcast;

/// One-shot stop signal shared by everything that serves traffic.
///
/// `HttpServer::run` and `HttpServer::run_tls` each take a receiver from
/// [`subscribe`](Self::subscribe) and begin graceful shutdown when it fires.
/// The binary hands a clone to `spawn_signal_handler`; integration tests keep
/// one per proxy and drop it with the test.
#[derive(Debug, Clone)]
pub struct Shutdown {
    tx: broadcast::Sender<()>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    /// Receiver for one server; subscribe before serving so no trigger is missed.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Stop every subscribed server. A no-op when none are listening.
    pub fn trigger(&self) {
        let _ = self.tx.send(());
    }

    /// Servers that have not yet finished draining.
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}
