//! Auto-refresh manager for periodic check runs.

use super::{RunError, RunState, Scheduler};
use crate::probe::Prober;

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Runs [`Scheduler::run_all`] on a fixed period until stopped.
pub struct RefreshManager {
    stop: broadcast::Sender<()>,
    handle: JoinHandle<()>,
}

impl RefreshManager {
    /// Start the auto-refresh background task. The first run starts
    /// immediately.
    pub fn start<P: Prober>(scheduler: Arc<Scheduler<P>>, interval: Duration) -> Self {
        let (stop, mut rx) = broadcast::channel(1);

        tracing::info!("Auto-refresh enabled every {:?}", interval);

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = rx.recv() => break,
                    _ = ticker.tick() => {
                        if scheduler.run_state() == RunState::Running {
                            tracing::debug!("Auto-refresh tick skipped, a run is active");
                            continue;
                        }
                        tokio::select! {
                            _ = rx.recv() => {
                                tracing::info!("Abandoning in-flight check run");
                                break;
                            }
                            result = scheduler.run_all() => match result {
                                Ok(_) => {}
                                Err(RunError::AlreadyRunning) => {
                                    tracing::debug!("Auto-refresh tick skipped");
                                }
                            },
                        }
                    }
                }
            }
        });

        Self { stop, handle }
    }

    /// Stop the background task, abandoning any run in progress.
    pub async fn stop(self) {
        let _ = self.stop.send(());
        if let Err(e) = self.handle.await {
            tracing::error!("Auto-refresh task failed: {}", e);
        }
    }
}
