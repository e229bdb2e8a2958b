//! Core types for mlmdstore
//!
//! This crate defines the tracking-side vocabulary shared by every layer:
//! - Entities: Experiment, RunInfo, RunData, Metric, Param, RunTag, LoggedModel
//! - Lifecycle: RunStatus (with its transition table), LifecycleStage, ViewType
//! - Error: TrackingError and its stable ErrorCode
//! - Limits: batch and search-page limits

#![warn(clippy::all)]

pub mod entities;
pub mod error;
pub mod limits;

pub use entities::{
    new_experiment_id, new_run_id, now_millis, Experiment, ExperimentTag, LifecycleStage,
    LoggedModel, Metric, Param, Run, RunData, RunInfo, RunStatus, RunTag, ViewType,
    DEFAULT_EXPERIMENT_ID, DEFAULT_EXPERIMENT_NAME, LOGGED_MODELS_TAG, RUN_NAME_TAG,
};
pub use error::{ErrorCode, Result, TrackingError};
pub use limits::{BatchLimits, SEARCH_MAX_RESULTS_DEFAULT, SEARCH_MAX_RESULTS_THRESHOLD};
