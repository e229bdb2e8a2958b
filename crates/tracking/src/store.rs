//! Tracking store abstraction
//!
//! [`TrackingStore`] is the experiment-tracking API: experiments, runs and the
//! metrics, params and tags logged against them. [`GraphTrackingStore`]
//! implements it over a metadata graph.
//!
//! Thread safety: all methods may be called concurrently from multiple
//! threads (requires Send + Sync).
//!
//! [`GraphTrackingStore`]: crate::GraphTrackingStore

use mlmd_core::{
    Experiment, ExperimentTag, LoggedModel, Metric, Param, Result, Run, RunInfo, RunStatus, RunTag,
    ViewType,
};

use crate::search::{RunsPage, SearchRequest};

/// Arguments for [`TrackingStore::create_run`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreateRun {
    /// Owning experiment; `None` uses the default experiment
    pub experiment_id: Option<String>,
    pub user_id: String,
    /// Start time in ms; `None` uses the current time
    pub start_time: Option<i64>,
    /// Run name; `None` takes the `mlflow.runName` tag or generates one
    pub run_name: Option<String>,
    pub tags: Vec<RunTag>,
}

impl CreateRun {
    pub fn in_experiment(experiment_id: impl Into<String>) -> Self {
        CreateRun {
            experiment_id: Some(experiment_id.into()),
            ..Self::default()
        }
    }

    pub fn user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = user_id.into();
        self
    }

    pub fn start_time(mut self, start_time: i64) -> Self {
        self.start_time = Some(start_time);
        self
    }

    pub fn named(mut self, run_name: impl Into<String>) -> Self {
        self.run_name = Some(run_name.into());
        self
    }

    pub fn tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.push(RunTag::new(key, value));
        self
    }
}

/// Experiment tracking operations
pub trait TrackingStore: Send + Sync {
    // ========== Experiments ==========

    /// Create an experiment and return its id
    ///
    /// # Errors
    ///
    /// `AlreadyExists` if any experiment (active or deleted) has `name`.
    fn create_experiment(
        &self,
        name: &str,
        artifact_location: Option<&str>,
        tags: &[ExperimentTag],
    ) -> Result<String>;

    /// Fetch an experiment in any lifecycle stage
    fn get_experiment(&self, experiment_id: &str) -> Result<Experiment>;

    /// Look an experiment up by name
    fn get_experiment_by_name(&self, name: &str) -> Result<Option<Experiment>>;

    /// All experiments visible under `view_type`, oldest first
    fn list_experiments(&self, view_type: ViewType) -> Result<Vec<Experiment>>;

    /// Soft-delete an experiment (idempotent)
    fn delete_experiment(&self, experiment_id: &str) -> Result<()>;

    /// Undo a soft delete (idempotent)
    fn restore_experiment(&self, experiment_id: &str) -> Result<()>;

    /// Give an experiment a new, unused name
    fn rename_experiment(&self, experiment_id: &str, new_name: &str) -> Result<()>;

    /// Permanently remove a deleted experiment and all its runs
    fn purge_experiment(&self, experiment_id: &str) -> Result<()>;

    /// Set (or overwrite) an experiment tag
    fn set_experiment_tag(&self, experiment_id: &str, tag: &ExperimentTag) -> Result<()>;

    // ========== Runs ==========

    /// Create a RUNNING, ACTIVE run
    fn create_run(&self, request: CreateRun) -> Result<Run>;

    /// Fetch a run with its current metrics, params and tags
    ///
    /// Deleted runs are still readable until purged.
    fn get_run(&self, run_id: &str) -> Result<Run>;

    /// Change a run's status (and optionally its name)
    ///
    /// Entering a terminal status sets `end_time` to the given value, or now.
    ///
    /// # Errors
    ///
    /// `InvalidState` if the run is already terminal.
    fn update_run_info(
        &self,
        run_id: &str,
        status: RunStatus,
        end_time: Option<i64>,
        run_name: Option<&str>,
    ) -> Result<RunInfo>;

    /// Soft-delete a run (idempotent)
    fn delete_run(&self, run_id: &str) -> Result<()>;

    /// Undo a soft delete (idempotent)
    fn restore_run(&self, run_id: &str) -> Result<()>;

    /// Permanently remove a deleted run
    fn purge_run(&self, run_id: &str) -> Result<()>;

    // ========== Logging ==========

    /// Log metrics, params and tags in one call
    ///
    /// Params are write-once: re-logging the same value is a no-op, a
    /// different value is `InvalidParameter`. Metrics carrying a dedup key are
    /// written at most once per run.
    fn log_batch(
        &self,
        run_id: &str,
        metrics: &[Metric],
        params: &[Param],
        tags: &[RunTag],
    ) -> Result<()>;

    /// Log a single metric point
    fn log_metric(&self, run_id: &str, metric: &Metric) -> Result<()> {
        self.log_batch(run_id, std::slice::from_ref(metric), &[], &[])
    }

    /// Log a single param
    fn log_param(&self, run_id: &str, param: &Param) -> Result<()> {
        self.log_batch(run_id, &[], std::slice::from_ref(param), &[])
    }

    /// Set a run tag; last write wins
    fn set_tag(&self, run_id: &str, tag: &RunTag) -> Result<()> {
        self.log_batch(run_id, &[], &[], std::slice::from_ref(tag))
    }

    /// Remove a run tag
    ///
    /// # Errors
    ///
    /// `ResourceDoesNotExist` if the run has no tag `key`.
    fn delete_tag(&self, run_id: &str, key: &str) -> Result<()>;

    /// Every point logged for `key`, ascending by timestamp
    fn get_metric_history(&self, run_id: &str, key: &str) -> Result<Vec<Metric>>;

    /// Record a model logged by the run
    fn record_logged_model(&self, run_id: &str, model: &LoggedModel) -> Result<()>;

    // ========== Search ==========

    /// Filtered, ordered, paginated run search
    fn search_runs(&self, request: &SearchRequest) -> Result<RunsPage>;

    /// Run infos of one experiment, newest first
    fn list_run_infos(&self, experiment_id: &str, view_type: ViewType) -> Result<Vec<RunInfo>>;
}
