//! Periodic re-evaluation while the document store is unlocked.
//!
//! A device can be tampered with after unlock. The monitor re-runs the gate
//! on a fixed interval and publishes each resulting [`GateAction`] on a
//! `watch` channel, so the host can re-lock as soon as the action degrades.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::gate::IntegrityGate;
use crate::types::GateAction;

const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Background task re-evaluating an [`IntegrityGate`].
#[derive(Debug)]
pub struct IntegrityMonitor {
    receiver: watch::Receiver<Option<GateAction>>,
    task: JoinHandle<()>,
}

impl IntegrityMonitor {
    /// Start monitoring on the current tokio runtime. The first evaluation
    /// runs immediately.
    pub fn spawn(gate: Arc<IntegrityGate>, interval: Duration) -> Self {
        let (sender, receiver) = watch::channel(None);
        let period = interval.max(MIN_INTERVAL);

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            info!(interval_ms = period.as_millis() as u64, "Integrity monitor started");

            loop {
                ticker.tick().await;
                let verdict = gate.evaluate_async().await;
                let action = gate.decide(&verdict);

                let previous = sender.send_replace(Some(action));
                match previous {
                    Some(prev) if prev != action => {
                        warn!(from = ?prev, to = ?action, "Gate action changed");
                    },
                    _ => debug!(action = ?action, "Periodic evaluation"),
                }
            }
        });

        Self { receiver, task }
    }

    /// New receiver for published actions. Holds `None` until the first
    /// evaluation completes.
    pub fn subscribe(&self) -> watch::Receiver<Option<GateAction>> {
        self.receiver.clone()
    }

    /// Most recently published action.
    pub fn latest(&self) -> Option<GateAction> {
        *self.receiver.borrow()
    }

    /// Stop monitoring. Subscribers observe the channel closing.
    pub fn shutdown(self) {
        info!("Integrity monitor stopping");
        self.task.abort();
    }
}

impl Drop for IntegrityMonitor {
    fn drop(&mut self) {
        self.task.abort();
    }
}
