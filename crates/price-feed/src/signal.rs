//! Cooperative run flag shared by the feed loops

use std::time::Duration;
use tokio::sync::watch;

/// Receiving side of the coordinator's run flag.
///
/// Feeds check [`RunSignal::is_running`] once per loop iteration and race
/// their waits against [`RunSignal::stopped`].
#[derive(Debug, Clone)]
pub struct RunSignal {
    rx: watch::Receiver<bool>,
}

impl RunSignal {
    pub fn new(rx: watch::Receiver<bool>) -> Self {
        Self { rx }
    }

    pub fn is_running(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once the flag is cleared or the coordinator is gone
    pub async fn stopped(&mut self) {
        while *self.rx.borrow_and_update() {
            if self.rx.changed().await.is_err() {
                return;
            }
        }
    }

    /// Sleep for `duration`; `false` if stopped first
    pub async fn sleep(&mut self, duration: Duration) -> bool {
        tokio::select! {
            _ = tokio::time::sleep(duration) => true,
            _ = self.stopped() => false,
        }
    }
}
