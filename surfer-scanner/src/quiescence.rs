use crate::activity::Activity;
use crate::cancel::CancelToken;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

/// Samples the traversal's [`Activity`] on a fixed interval and fires `stop`
/// at the first sample with no pending work.
///
/// The task resolves to `true` only when it was the one to end the traversal,
/// so a later cancel cannot relabel a completed run.
pub struct QuiescenceDetector {
    activity: Arc<Activity>,
    interval: Duration,
}

impl QuiescenceDetector {
    pub fn new(activity: Arc<Activity>, interval: Duration) -> Self {
        Self { activity, interval }
    }

    pub fn spawn(self, stop: CancelToken) -> JoinHandle<bool> {
        tokio::spawn(self.run(stop))
    }

    pub async fn run(self, stop: CancelToken) -> bool {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick completes immediately; skip it so workers get one full period.
        ticker.tick().await;

        let mut samples = 0usize;
        loop {
            tokio::select! {
                biased;
                _ = stop.cancelled() => {
                    debug!("Quiescence detector stopped after {} sample(s)", samples);
                    return false;
                }
                _ = ticker.tick() => {}
            }

            samples += 1;
            let snapshot = self.activity.snapshot();
            trace!(
                "Sample {}: {} active worker(s), {} pending node(s)",
                samples, snapshot.active, snapshot.pending
            );

            if self.activity.is_quiescent() {
                // Interrupted workers also settle, so pending can hit zero after a cancel.
                if stop.is_cancelled() {
                    debug!("Traversal stopped before quiescing ({} sample(s))", samples);
                    return false;
                }
                debug!("Traversal quiescent after {} sample(s)", samples);
                stop.cancel();
                return true;
            }
        }
    }
}
