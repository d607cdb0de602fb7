//! Scheduler module for running checks and owning monitor state.

mod refresh;
mod summary;

pub use refresh::*;
pub use summary::*;

use crate::config::ServerConfig;
use crate::db::{HistoryLog, LatestSnapshot, ProbeOutcome, Store, StoreError, Target};
use crate::probe::{HttpProber, Prober, DEFAULT_TIMEOUT};
use crate::targets::{TargetError, TargetList};

use chrono::Utc;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock, Semaphore};
use tokio::task::JoinSet;

/// Orchestration error types.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum RunError {
    #[error("a check run is already in progress")]
    AlreadyRunning,
}

/// Whether an orchestration run is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Running,
}

/// Returns the state machine to `Idle` when a run completes or is dropped.
struct RunGuard {
    state: Arc<StdMutex<RunState>>,
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = RunState::Idle;
    }
}

/// Tunables for a run.
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub probe_timeout: Duration,
    pub max_concurrency: usize,
    pub persist_timeout: Duration,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            probe_timeout: DEFAULT_TIMEOUT,
            max_concurrency: 8,
            persist_timeout: Duration::from_secs(5),
        }
    }
}

impl From<&ServerConfig> for RunSettings {
    fn from(cfg: &ServerConfig) -> Self {
        Self {
            probe_timeout: cfg.probe_timeout,
            max_concurrency: cfg.max_concurrency.max(1),
            persist_timeout: cfg.persist_timeout,
        }
    }
}

/// Owns the configured targets, the history log and the latest snapshot,
/// and runs checks over them.
///
/// Lock order is targets, then history, then snapshot.
pub struct Scheduler<P = HttpProber> {
    prober: Arc<P>,
    store: Arc<Store>,
    settings: RunSettings,
    targets: Arc<RwLock<TargetList>>,
    history: Arc<Mutex<HistoryLog>>,
    snapshot: RwLock<Arc<LatestSnapshot>>,
    run_state: Arc<StdMutex<RunState>>,
    persist_lock: Arc<Mutex<()>>,
}

impl<P: Prober> Scheduler<P> {
    /// Create a scheduler with state loaded from the store.
    pub fn new(prober: P, store: Store, settings: RunSettings) -> Self {
        let (targets, history) = store.load();
        if history.is_empty() {
            tracing::info!("Loaded {} targets with no history", targets.len());
        } else {
            tracing::info!(
                "Loaded {} targets and history for {} targets",
                targets.len(),
                history.len()
            );
        }
        Self::with_state(prober, store, settings, targets, history)
    }

    /// Create a scheduler over explicit initial state.
    pub fn with_state(
        prober: P,
        store: Store,
        settings: RunSettings,
        targets: TargetList,
        history: HistoryLog,
    ) -> Self {
        Self {
            prober: Arc::new(prober),
            store: Arc::new(store),
            settings,
            targets: Arc::new(RwLock::new(targets)),
            history: Arc::new(Mutex::new(history)),
            snapshot: RwLock::new(Arc::new(LatestSnapshot::default())),
            run_state: Arc::new(StdMutex::new(RunState::Idle)),
            persist_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Whether a run is currently active.
    pub fn run_state(&self) -> RunState {
        *self.run_state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn begin_run(&self) -> Result<RunGuard, RunError> {
        let mut state = self.run_state.lock().unwrap_or_else(PoisonError::into_inner);
        if *state == RunState::Running {
            return Err(RunError::AlreadyRunning);
        }
        *state = RunState::Running;
        Ok(RunGuard {
            state: self.run_state.clone(),
        })
    }

    /// Check every configured target once, record the outcomes and publish
    /// a new snapshot.
    ///
    /// Rejected while another run is active. Dropping the returned future
    /// abandons the run; outcomes already appended stay in the history.
    pub async fn run_all(&self) -> Result<Arc<LatestSnapshot>, RunError> {
        let _guard = match self.begin_run() {
            Ok(guard) => guard,
            Err(e) => {
                tracing::warn!("Rejected check run: {}", e);
                return Err(e);
            }
        };

        let targets: Vec<Target> = self.targets.read().await.iter().cloned().collect();
        tracing::info!("Checking {} targets", targets.len());

        let semaphore = Arc::new(Semaphore::new(self.settings.max_concurrency.max(1)));
        let mut tasks = JoinSet::new();

        for target in targets {
            let prober = self.prober.clone();
            let configured = self.targets.clone();
            let history = self.history.clone();
            let semaphore = semaphore.clone();
            let timeout = self.settings.probe_timeout;

            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                let outcome = prober.check(&target, timeout).await;
                record_outcome(&configured, &history, &outcome).await;
                outcome
            });
        }

        let mut outcomes: HashMap<Target, ProbeOutcome> = HashMap::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => {
                    outcomes.insert(outcome.target.clone(), outcome);
                }
                Err(e) => tracing::error!("Probe task failed: {}", e),
            }
        }

        let snapshot = {
            // Targets removed while the run was in flight are not published.
            let targets = self.targets.read().await;
            outcomes.retain(|target, _| targets.contains(target));

            let snapshot = Arc::new(LatestSnapshot::new(Utc::now(), outcomes));
            *self.snapshot.write().await = snapshot.clone();
            snapshot
        };

        let up = snapshot.outcomes.values().filter(|o| o.is_up()).count();
        tracing::info!(
            "Check run complete: {} up, {} down",
            up,
            snapshot.len() - up
        );

        self.persist().await;

        Ok(snapshot)
    }

    /// Write targets and history to the store. Failures are logged and
    /// reported through the return value, never propagated.
    pub async fn persist(&self) -> bool {
        match tokio::time::timeout(self.settings.persist_timeout, self.save_state()).await {
            Ok(Ok(Ok(()))) => true,
            Ok(Ok(Err(e))) => {
                tracing::warn!("State not fully persisted: {}", e);
                false
            }
            Ok(Err(e)) => {
                tracing::error!("Persist task failed: {}", e);
                false
            }
            Err(_) => {
                tracing::error!(
                    "Persisting state timed out after {:?} (a previous save may still be in progress)",
                    self.settings.persist_timeout
                );
                false
            }
        }
    }

    /// Waits for the save lock, then copies state and writes it on the
    /// blocking pool. The copy is taken under the lock so a later save
    /// never writes an older state than an earlier one.
    async fn save_state(&self) -> Result<Result<(), StoreError>, tokio::task::JoinError> {
        // Held by the blocking task so saves never interleave, even after
        // the caller's wait gives up.
        let permit = self.persist_lock.clone().lock_owned().await;

        let targets = self.targets.read().await.clone();
        let history = self.history.lock().await.clone();
        let store = self.store.clone();

        tokio::task::spawn_blocking(move || {
            let _permit = permit;
            store.save(&targets, &history)
        })
        .await
    }

    // --- Collaborator interface ---

    /// Up/down counts for the configured targets.
    pub async fn summary(&self) -> StatusSummary {
        let targets = self.targets.read().await;
        let snapshot = self.snapshot.read().await.clone();
        summarize(&targets, &snapshot)
    }

    pub async fn latest_snapshot(&self) -> Arc<LatestSnapshot> {
        self.snapshot.read().await.clone()
    }

    /// Retained outcomes for the selected targets.
    pub async fn history(&self, targets: &[Target]) -> BTreeMap<Target, Vec<ProbeOutcome>> {
        self.history
            .lock()
            .await
            .query(targets.iter().map(String::as_str))
    }

    pub async fn targets(&self) -> TargetList {
        self.targets.read().await.clone()
    }

    /// Add a target. It counts as down until the next run checks it.
    pub async fn add_target(&self, url: &str) -> Result<(), TargetError> {
        if let Err(e) = self.targets.write().await.add(url) {
            tracing::warn!("Rejected target: {}", e);
            return Err(e);
        }
        tracing::info!("Added target {}", url);

        self.persist().await;
        Ok(())
    }

    /// Remove a target together with its history and snapshot entry.
    pub async fn remove_target(&self, url: &str) -> Result<(), TargetError> {
        {
            let mut targets = self.targets.write().await;
            targets.remove(url)?;
            self.history.lock().await.remove_target(url);

            let mut snapshot = self.snapshot.write().await;
            if snapshot.get(url).is_some() {
                let mut next = LatestSnapshot::clone(&snapshot);
                next.outcomes.remove(url);
                *snapshot = Arc::new(next);
            }
        }
        tracing::info!("Removed target {}", url);

        self.persist().await;
        Ok(())
    }

    /// Final persist before the process exits.
    pub async fn shutdown(&self) {
        tracing::info!("Saving state before shutdown");
        if !self.persist().await {
            tracing::error!("Final save failed; on-disk state may be stale");
        }
    }
}

/// Append one outcome under the history lock, unless its target was removed
/// while the probe was in flight.
async fn record_outcome(
    configured: &RwLock<TargetList>,
    history: &Mutex<HistoryLog>,
    outcome: &ProbeOutcome,
) {
    let targets = configured.read().await;
    if !targets.contains(&outcome.target) {
        tracing::debug!("Discarding outcome for removed target {}", outcome.target);
        return;
    }
    history
        .lock()
        .await
        .append(&outcome.target, outcome.clone());
}
