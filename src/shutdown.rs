/// Cooperative stop signal shared by the background workers
use log::info;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Process-wide shutdown trigger
///
/// Every stop path (ctrl-c, SIGTERM, server exit) calls `trigger`; only the
/// first call has any effect.
#[derive(Debug, Clone)]
pub struct Shutdown {
    triggered: Arc<AtomicBool>,
    sender: Arc<watch::Sender<bool>>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(false);
        Self {
            triggered: Arc::new(AtomicBool::new(false)),
            sender: Arc::new(sender),
        }
    }

    /// Request shutdown. Returns `true` only for the call that initiated it.
    pub fn trigger(&self, reason: &str) -> bool {
        if self.triggered.swap(true, Ordering::SeqCst) {
            return false;
        }
        info!("Shutting down: {}", reason);
        self.sender.send_replace(true);
        true
    }

    pub fn subscribe(&self) -> StopSignal {
        StopSignal {
            receiver: self.sender.subscribe(),
        }
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// Receiving side of `Shutdown`, checked once per loop iteration
#[derive(Debug, Clone)]
pub struct StopSignal {
    receiver: watch::Receiver<bool>,
}

impl StopSignal {
    pub fn is_stopped(&self) -> bool {
        *self.receiver.borrow()
    }

    /// Wait until shutdown is requested
    pub async fn stopped(&mut self) {
        while !*self.receiver.borrow_and_update() {
            if self.receiver.changed().await.is_err() {
                return;
            }
        }
    }

    /// Sleep for `period`, waking early on shutdown. Returns `true` if stopped.
    pub async fn sleep(&mut self, period: Duration) -> bool {
        tokio::select! {
            _ = tokio::time::sleep(period) => self.is_stopped(),
            _ = self.stopped() => true,
        }
    }
}
