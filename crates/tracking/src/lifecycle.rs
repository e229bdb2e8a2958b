//! Run lifecycle rules
//!
//! Two orthogonal axes:
//! - **status**: RUNNING / SCHEDULED may move to any status; FINISHED, FAILED
//!   and KILLED are terminal and never change again.
//! - **lifecycle stage**: ACTIVE ↔ DELETED via delete/restore, from any status.
//!
//! Write rules:
//! - Any write against a DELETED run is `ResourceDoesNotExist`.
//! - Metrics and params against a terminal run are `InvalidState`.
//! - Tags are accepted in any status while the run is ACTIVE.

use mlmd_core::{now_millis, Experiment, LifecycleStage, Result, RunInfo, RunStatus, TrackingError};

/// A write the run must accept
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteKind {
    Metric,
    Param,
    Tag,
}

impl WriteKind {
    fn as_str(&self) -> &'static str {
        match self {
            WriteKind::Metric => "metric",
            WriteKind::Param => "param",
            WriteKind::Tag => "tag",
        }
    }
}

/// Check that `info` accepts a write of `kind`
pub fn ensure_writable(info: &RunInfo, kind: WriteKind) -> Result<()> {
    if info.lifecycle_stage == LifecycleStage::Deleted {
        return Err(TrackingError::not_found(format!(
            "Run '{}' is deleted",
            info.run_id
        )));
    }
    if kind != WriteKind::Tag && info.status.is_terminal() {
        return Err(TrackingError::invalid_state(format!(
            "Cannot log {} to run '{}' in terminal status {}",
            kind.as_str(),
            info.run_id,
            info.status
        )));
    }
    Ok(())
}

/// Resolved status change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusChange {
    pub status: RunStatus,
    /// Set exactly when entering a terminal status
    pub end_time: Option<i64>,
}

/// Validate a status transition and settle its end time
///
/// A terminal target takes `end_time` if given, else the current time.
pub fn plan_status_change(
    info: &RunInfo,
    target: RunStatus,
    end_time: Option<i64>,
) -> Result<StatusChange> {
    if info.lifecycle_stage == LifecycleStage::Deleted {
        return Err(TrackingError::not_found(format!(
            "Run '{}' is deleted",
            info.run_id
        )));
    }
    if !info.status.can_transition_to(target) {
        return Err(TrackingError::invalid_state(format!(
            "Run '{}' is already {} and cannot move to {}",
            info.run_id, info.status, target
        )));
    }
    let end_time = if target.is_terminal() {
        Some(end_time.unwrap_or_else(now_millis))
    } else {
        None
    };
    Ok(StatusChange {
        status: target,
        end_time,
    })
}

/// Stage to write for a delete/restore, or `None` when already there
pub fn plan_stage_change(current: LifecycleStage, target: LifecycleStage) -> Option<LifecycleStage> {
    (current != target).then_some(target)
}

/// Permanent deletion requires a soft-deleted entity
pub fn ensure_purgeable(what: &str, id: &str, stage: LifecycleStage) -> Result<()> {
    if stage != LifecycleStage::Deleted {
        return Err(TrackingError::invalid_state(format!(
            "{} '{}' must be deleted before it can be purged",
            what, id
        )));
    }
    Ok(())
}

/// New runs need an active experiment
pub fn ensure_experiment_accepts_runs(experiment: &Experiment) -> Result<()> {
    if experiment.lifecycle_stage == LifecycleStage::Deleted {
        return Err(TrackingError::invalid_state(format!(
            "Experiment '{}' is deleted; restore it before creating runs",
            experiment.experiment_id
        )));
    }
    Ok(())
}
