//! Periodic power polling for buttons that display on/off state.
//!
//! Each poller is one tokio task that ticks at a fixed interval, queries its
//! selection, reconciles against the believed state and reports the
//! outcome. A tick is a single bounded query, so stopping only means not
//! scheduling the next one.

use crate::registry::{Registry, Selector};
use crate::state::PollOutcome;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;

/// Default time between power queries.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Poller configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    pub interval: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

/// Cancellation flag shared between a poller and its owner.
#[derive(Debug, Clone)]
pub struct CancellationToken {
    tx: Arc<watch::Sender<bool>>,
}

impl CancellationToken {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves once [`cancel`](Self::cancel) has been called.
    pub async fn cancelled(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives in `self`, so the channel cannot close here.
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Owner side of a running poller. Dropping it stops the poller.
pub struct PollHandle {
    token: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl PollHandle {
    /// Stop scheduling further ticks.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Cancel and wait for the task to finish.
    pub async fn shutdown(mut self) {
        self.token.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                debug!("Poller task ended abnormally: {e}");
            }
        }
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// Spawns power pollers.
pub struct PowerPoller;

impl PowerPoller {
    /// Start polling `selector` on the current tokio runtime.
    ///
    /// The first query runs immediately. `on_update` receives every outcome;
    /// after a persisted correction the poller's belief follows the new value
    /// so the same correction is not reported twice.
    pub fn spawn<F>(
        registry: Arc<Registry>,
        selector: Selector,
        believed: bool,
        config: PollConfig,
        mut on_update: F,
    ) -> PollHandle
    where
        F: FnMut(PollOutcome) + Send + 'static,
    {
        let token = CancellationToken::new();
        let task_token = token.clone();

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(config.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut believed = believed;

            loop {
                tokio::select! {
                    biased;
                    _ = task_token.cancelled() => break,
                    _ = ticker.tick() => {}
                }

                let outcome = registry.poll(&selector, believed);
                if let PollOutcome::Reconciled(r) = outcome {
                    believed = r.is_on;
                }
                on_update(outcome);
            }
            debug!(?selector, "Poller stopped");
        });

        PollHandle {
            token,
            task: Some(task),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::DeviceType;
    use crate::state::Reconciled;
    use crate::transport::mock::{beam, MockBackend};
    use tokio::sync::mpsc;

    fn off_report() -> Vec<u8> {
        vec![0x11, 0xFF, 0x04, 0x1D, 0x00, 0x00, 0x00, 0x00]
    }

    #[test]
    fn token_starts_uncancelled() {
        let token = CancellationToken::new();
        assert!(!token.is_cancelled());
        token.clone().cancel();
        assert!(token.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn poller_persists_correction_once() {
        let mock = Arc::new(MockBackend::with_endpoints(vec![beam("b1")]));
        mock.on_feature_report("b1", off_report());
        let registry = Arc::new(Registry::new(Arc::clone(&mock)));

        let (tx, mut rx) = mpsc::unbounded_channel();
        let handle = PowerPoller::spawn(
            registry,
            Selector::SingleDevice("b1".into()),
            true,
            PollConfig {
                interval: Duration::from_secs(1),
            },
            move |outcome| {
                let _ = tx.send(outcome);
            },
        );

        assert_eq!(
            rx.recv().await,
            Some(PollOutcome::Reconciled(Reconciled {
                is_on: false,
                persist: true
            }))
        );
        assert_eq!(
            rx.recv().await,
            Some(PollOutcome::Reconciled(Reconciled {
                is_on: false,
                persist: false
            }))
        );

        handle.shutdown().await;
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn poller_reports_no_devices() {
        let registry = Arc::new(Registry::new(MockBackend::new()));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let handle = PowerPoller::spawn(
            registry,
            Selector::AllOfType(DeviceType::All),
            false,
            PollConfig::default(),
            move |outcome| {
                let _ = tx.send(outcome);
            },
        );
        assert_eq!(rx.recv().await, Some(PollOutcome::NoDevices));
        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_handle_stops_poller() {
        let registry = Arc::new(Registry::new(MockBackend::new()));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let handle = PowerPoller::spawn(
            registry,
            Selector::AllOfType(DeviceType::All),
            false,
            PollConfig::default(),
            move |outcome| {
                let _ = tx.send(outcome);
            },
        );
        drop(handle);

        let mut received = 0;
        while rx.recv().await.is_some() {
            received += 1;
        }
        assert!(received <= 1);
    }
}
