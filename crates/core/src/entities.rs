//! Tracking entities
//!
//! The tracking-side domain model: experiments, runs, metrics, params and tags.
//! These are the values callers see; how they are laid out in the metadata
//! graph is the translator's business.
//!
//! ## Run Status Transitions
//!
//! Valid transitions:
//! - Running, Scheduled → any status (terminal or not)
//!
//! Invalid transitions (will error):
//! - Finished, Failed, Killed → * (terminal states never change)
//!
//! Lifecycle stage (`Active`/`Deleted`) is orthogonal to status: a run in any
//! status can be deleted and restored.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Id of the experiment used when a run is created without one
pub const DEFAULT_EXPERIMENT_ID: &str = "0";

/// Name of the default experiment
pub const DEFAULT_EXPERIMENT_NAME: &str = "Default";

/// Reserved tag mirroring the run name
pub const RUN_NAME_TAG: &str = "mlflow.runName";

/// Reserved tag holding the JSON list of models logged for a run
pub const LOGGED_MODELS_TAG: &str = "mlflow.log-model.history";

/// Current wall-clock time in milliseconds since the epoch
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Generate a fresh run id (32 lowercase hex chars)
pub fn new_run_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// Generate a fresh experiment id
pub fn new_experiment_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

// ========== LifecycleStage ==========

/// Soft-delete marker shared by experiments and runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleStage {
    /// Visible to readers and writers
    Active,
    /// Soft-deleted; restorable until purged
    Deleted,
}

impl LifecycleStage {
    /// Get string representation (as stored in the graph)
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleStage::Active => "active",
            LifecycleStage::Deleted => "deleted",
        }
    }

    /// Parse the stored representation
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(LifecycleStage::Active),
            "deleted" => Some(LifecycleStage::Deleted),
            _ => None,
        }
    }
}

impl std::fmt::Display for LifecycleStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ========== ViewType ==========

/// Which lifecycle stages a listing or search includes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ViewType {
    /// Only active entities
    #[default]
    ActiveOnly,
    /// Only deleted entities
    DeletedOnly,
    /// Everything
    All,
}

impl ViewType {
    /// Check whether an entity in `stage` is visible under this view
    pub fn includes(&self, stage: LifecycleStage) -> bool {
        match self {
            ViewType::ActiveOnly => stage == LifecycleStage::Active,
            ViewType::DeletedOnly => stage == LifecycleStage::Deleted,
            ViewType::All => true,
        }
    }

    /// The single stage this view selects, if it selects exactly one
    pub fn stage(&self) -> Option<LifecycleStage> {
        match self {
            ViewType::ActiveOnly => Some(LifecycleStage::Active),
            ViewType::DeletedOnly => Some(LifecycleStage::Deleted),
            ViewType::All => None,
        }
    }

    /// Get string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            ViewType::ActiveOnly => "ACTIVE_ONLY",
            ViewType::DeletedOnly => "DELETED_ONLY",
            ViewType::All => "ALL",
        }
    }
}

// ========== RunStatus ==========

/// Run execution status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RunStatus {
    /// Run is logging
    Running,
    /// Run is queued but has not started
    Scheduled,
    /// Run completed successfully (terminal)
    Finished,
    /// Run failed (terminal)
    Failed,
    /// Run was killed (terminal)
    Killed,
}

impl RunStatus {
    /// Check if this is a terminal status
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunStatus::Finished | RunStatus::Failed | RunStatus::Killed
        )
    }

    /// Check if transition from current to target is valid
    ///
    /// Non-terminal states can go anywhere; terminal states are frozen.
    pub fn can_transition_to(&self, _target: RunStatus) -> bool {
        !self.is_terminal()
    }

    /// Get string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Running => "RUNNING",
            RunStatus::Scheduled => "SCHEDULED",
            RunStatus::Finished => "FINISHED",
            RunStatus::Failed => "FAILED",
            RunStatus::Killed => "KILLED",
        }
    }

    /// Parse the stored representation
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "RUNNING" => Some(RunStatus::Running),
            "SCHEDULED" => Some(RunStatus::Scheduled),
            "FINISHED" => Some(RunStatus::Finished),
            "FAILED" => Some(RunStatus::Failed),
            "KILLED" => Some(RunStatus::Killed),
            _ => None,
        }
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ========== Experiment ==========

/// An experiment: a named container of runs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Experiment {
    /// Stable unique id
    pub experiment_id: String,
    /// Unique name (also the workspace name)
    pub name: String,
    /// Base location for run artifacts
    pub artifact_location: String,
    /// Active or deleted
    pub lifecycle_stage: LifecycleStage,
    /// Experiment-level tags
    pub tags: BTreeMap<String, String>,
    /// Creation time (ms since epoch)
    pub creation_time: Option<i64>,
    /// Last update time (ms since epoch)
    pub last_update_time: Option<i64>,
}

/// Experiment tag
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExperimentTag {
    pub key: String,
    pub value: String,
}

impl ExperimentTag {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

// ========== Run ==========

/// Run metadata, reconstructed from the run node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunInfo {
    /// Globally unique, immutable
    pub run_id: String,
    /// Owning experiment, immutable
    pub experiment_id: String,
    /// Human-readable name
    pub run_name: String,
    /// Who launched the run
    pub user_id: String,
    /// Execution status
    pub status: RunStatus,
    /// Start time (ms since epoch)
    pub start_time: i64,
    /// End time, set once on the transition to a terminal status
    pub end_time: Option<i64>,
    /// Active or deleted
    pub lifecycle_stage: LifecycleStage,
    /// Root URI for run artifacts
    pub artifact_uri: String,
}

/// A single metric value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    pub key: String,
    pub value: f64,
    /// Milliseconds since epoch
    pub timestamp: i64,
    pub step: i64,
    /// Client-generated key making a retried write land at most once
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dedup_key: Option<String>,
}

impl Metric {
    pub fn new(key: impl Into<String>, value: f64, timestamp: i64, step: i64) -> Self {
        Self {
            key: key.into(),
            value,
            timestamp,
            step,
            dedup_key: None,
        }
    }

    /// Attach a client dedup key
    pub fn with_dedup_key(mut self, dedup_key: impl Into<String>) -> Self {
        self.dedup_key = Some(dedup_key.into());
        self
    }
}

/// Run parameter; immutable once logged
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Param {
    pub key: String,
    pub value: String,
}

impl Param {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Run tag; last write wins
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunTag {
    pub key: String,
    pub value: String,
}

impl RunTag {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Replayed run data: current metric values, params and tags
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunData {
    /// Current value per metric key
    pub metrics: BTreeMap<String, Metric>,
    pub params: BTreeMap<String, String>,
    pub tags: BTreeMap<String, String>,
}

/// A run: info plus data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Run {
    pub info: RunInfo,
    pub data: RunData,
}

/// Model metadata recorded against a run
///
/// Model files live in artifact storage; only this description is tracked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggedModel {
    pub run_id: String,
    pub artifact_path: String,
    pub utc_time_created: String,
    #[serde(default)]
    pub flavors: BTreeMap<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_uuid: Option<String>,
}
