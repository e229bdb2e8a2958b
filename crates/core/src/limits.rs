//! Request size limits
//!
//! Limits enforced before any graph call is issued. Violations return
//! `InvalidParameter` with the offending count in the message.

use crate::entities::{Metric, Param, RunTag};
use crate::error::{Result, TrackingError};

/// Hard upper bound on `max_results` for a single search page
pub const SEARCH_MAX_RESULTS_THRESHOLD: usize = 50_000;

/// Page size used when the caller does not pass one
pub const SEARCH_MAX_RESULTS_DEFAULT: usize = 1_000;

/// Limits for a single `log_batch` call
#[derive(Debug, Clone)]
pub struct BatchLimits {
    /// Maximum metrics per batch (default: 1000)
    pub max_metrics: usize,

    /// Maximum params per batch (default: 100)
    pub max_params: usize,

    /// Maximum tags per batch (default: 100)
    pub max_tags: usize,

    /// Maximum items of any kind per batch (default: 1000)
    pub max_total: usize,
}

impl Default for BatchLimits {
    fn default() -> Self {
        BatchLimits {
            max_metrics: 1000,
            max_params: 100,
            max_tags: 100,
            max_total: 1000,
        }
    }
}

impl BatchLimits {
    /// Validate batch sizes
    pub fn validate(&self, metrics: &[Metric], params: &[Param], tags: &[RunTag]) -> Result<()> {
        if metrics.len() > self.max_metrics {
            return Err(TrackingError::invalid_parameter(format!(
                "a batch may contain at most {} metrics, got {}",
                self.max_metrics,
                metrics.len()
            )));
        }
        if params.len() > self.max_params {
            return Err(TrackingError::invalid_parameter(format!(
                "a batch may contain at most {} params, got {}",
                self.max_params,
                params.len()
            )));
        }
        if tags.len() > self.max_tags {
            return Err(TrackingError::invalid_parameter(format!(
                "a batch may contain at most {} tags, got {}",
                self.max_tags,
                tags.len()
            )));
        }
        let total = metrics.len() + params.len() + tags.len();
        if total > self.max_total {
            return Err(TrackingError::invalid_parameter(format!(
                "a batch may contain at most {} items in total, got {}",
                self.max_total, total
            )));
        }
        Ok(())
    }

    /// Reject a param key repeated with different values inside one batch
    pub fn validate_unique_params(params: &[Param]) -> Result<()> {
        let mut seen = std::collections::HashMap::new();
        for p in params {
            if let Some(prev) = seen.insert(p.key.as_str(), p.value.as_str()) {
                if prev != p.value {
                    return Err(TrackingError::invalid_parameter(format!(
                        "duplicate param key '{}' with different values in one batch",
                        p.key
                    )));
                }
            }
        }
        Ok(())
    }
}
