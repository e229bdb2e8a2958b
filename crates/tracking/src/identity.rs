//! Identity map between tracking ids and graph nodes
//!
//! A process-wide cache of:
//! - experiment id → workspace
//! - run id → [`RunHandle`], bounded by a capacity
//!
//! The cache is never authoritative. A miss is resolved through a caller
//! supplied fetch closure (a graph query by naming convention) and the result
//! is registered; a fetch that finds nothing is `ResourceDoesNotExist`.
//!
//! [`KeyedLocks`] serializes get-or-create and read-check-write sequences per
//! key (experiment name, run id). A key's entry lives only while some caller
//! holds or waits on it.

use dashmap::DashMap;
use mlmd_core::{Result, TrackingError};
use mlmd_graph::{RunNodeRef, WorkspaceRef};
use parking_lot::{ArcMutexGuard, Mutex, RawMutex};
use std::sync::Arc;
use tracing::debug;

/// Default number of run handles kept in the cache
pub const DEFAULT_RUN_CACHE_CAPACITY: usize = 10_000;

/// Resolved graph location of a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunHandle {
    pub run_id: String,
    pub experiment_id: String,
    pub workspace: WorkspaceRef,
    pub run_node: RunNodeRef,
}

/// Per-key mutual exclusion
#[derive(Debug, Default)]
pub struct KeyedLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Block until the lock for `key` is held
    ///
    /// The entry for `key` is removed when the last guard or waiter lets go.
    pub fn lock(&self, key: &str) -> KeyGuard<'_> {
        let lock = self.shared(key);
        KeyGuard {
            guard: Some(lock.lock_arc()),
            locks: &self.locks,
            key: key.to_string(),
        }
    }

    fn shared(&self, key: &str) -> Arc<Mutex<()>> {
        if let Some(lock) = self.locks.get(key) {
            return Arc::clone(lock.value());
        }
        Arc::clone(
            self.locks
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .value(),
        )
    }

    /// Number of keys currently held or waited on
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

/// Held lock on one key of a [`KeyedLocks`]
pub struct KeyGuard<'a> {
    guard: Option<ArcMutexGuard<RawMutex, ()>>,
    locks: &'a DashMap<String, Arc<Mutex<()>>>,
    key: String,
}

impl Drop for KeyGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        // Clones are only taken under the shard lock, so a count of one
        // means no other caller holds or waits on this key.
        self.locks
            .remove_if(&self.key, |_, lock| Arc::strong_count(lock) == 1);
    }
}

/// Cache of tracking id → graph node mappings
#[derive(Debug)]
pub struct IdentityMap {
    experiments: DashMap<String, WorkspaceRef>,
    runs: DashMap<String, RunHandle>,
    run_capacity: usize,
    locks: KeyedLocks,
}

impl Default for IdentityMap {
    fn default() -> Self {
        Self::with_run_capacity(DEFAULT_RUN_CACHE_CAPACITY)
    }
}

impl IdentityMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map caching at most `run_capacity` run handles
    pub fn with_run_capacity(run_capacity: usize) -> Self {
        IdentityMap {
            experiments: DashMap::new(),
            runs: DashMap::new(),
            run_capacity: run_capacity.max(1),
            locks: KeyedLocks::new(),
        }
    }

    // ========== Experiments ==========

    /// Record an experiment's workspace
    pub fn register_experiment(&self, experiment_id: &str, workspace: WorkspaceRef) {
        self.experiments.insert(experiment_id.to_string(), workspace);
    }

    /// Workspace of an experiment, fetching on a cache miss
    pub fn resolve_experiment(
        &self,
        experiment_id: &str,
        fetch: impl FnOnce() -> Result<Option<WorkspaceRef>>,
    ) -> Result<WorkspaceRef> {
        if let Some(ws) = self.experiments.get(experiment_id) {
            return Ok(ws.value().clone());
        }
        debug!(target: "mlmd::identity", experiment_id, "experiment cache miss");
        match fetch()? {
            Some(ws) => {
                self.register_experiment(experiment_id, ws.clone());
                Ok(ws)
            }
            None => Err(TrackingError::not_found(format!(
                "No Experiment with id={} exists",
                experiment_id
            ))),
        }
    }

    /// Forget an experiment and every cached run belonging to it
    pub fn unregister_experiment(&self, experiment_id: &str) {
        self.experiments.remove(experiment_id);
        self.runs.retain(|_, handle| handle.experiment_id != experiment_id);
        debug!(target: "mlmd::identity", experiment_id, "experiment unregistered");
    }

    // ========== Runs ==========

    /// Record a run's handle, evicting another run when the cache is full
    pub fn register_run(&self, handle: RunHandle) {
        if self.runs.len() >= self.run_capacity && !self.runs.contains_key(&handle.run_id) {
            let victim = self.runs.iter().next().map(|entry| entry.key().clone());
            if let Some(victim) = victim {
                self.runs.remove(&victim);
                debug!(target: "mlmd::identity", run_id = %victim, "evicted run handle");
            }
        }
        self.runs.insert(handle.run_id.clone(), handle);
    }

    /// Handle of a run, fetching on a cache miss
    pub fn resolve_run(
        &self,
        run_id: &str,
        fetch: impl FnOnce() -> Result<Option<RunHandle>>,
    ) -> Result<RunHandle> {
        if let Some(handle) = self.runs.get(run_id) {
            return Ok(handle.value().clone());
        }
        debug!(target: "mlmd::identity", run_id, "run cache miss");
        match fetch()? {
            Some(handle) => {
                self.register_run(handle.clone());
                Ok(handle)
            }
            None => Err(TrackingError::not_found(format!(
                "Run with id={} not found",
                run_id
            ))),
        }
    }

    /// Forget a purged run
    pub fn unregister_run(&self, run_id: &str) {
        self.runs.remove(run_id);
    }

    // ========== Locks ==========

    /// Serialize creation and renames onto experiment `name`
    pub fn experiment_lock(&self, name: &str) -> KeyGuard<'_> {
        self.locks.lock(&format!("experiment:{}", name))
    }

    /// Serialize read-check-write sequences on one run
    pub fn run_lock(&self, run_id: &str) -> KeyGuard<'_> {
        self.locks.lock(&format!("run:{}", run_id))
    }

    /// Number of cached runs
    pub fn cached_runs(&self) -> usize {
        self.runs.len()
    }

    /// Number of lock keys in use
    pub fn active_locks(&self) -> usize {
        self.locks.len()
    }
}
