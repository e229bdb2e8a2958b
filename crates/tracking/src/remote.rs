//! Guarded calls to the metadata graph
//!
//! Every graph call made by the store goes through [`Remote::call`], which
//! attaches the configured [`CallOptions`] and applies the retry policy:
//!
//! - `Retry::Idempotent` calls are re-issued up to `max_retries` times after a
//!   transport failure or timeout.
//! - `Retry::Never` calls (metric appends) are issued exactly once.
//!
//! A retried create that then collides with an existing node is reported with
//! `after_ambiguous = true`, so the caller can recognise its own earlier write.

use mlmd_core::TrackingError;
use mlmd_graph::{CallOptions, GraphClient, GraphError, GraphResult, Node, NodePredicate};
use tracing::warn;

use crate::config::StoreConfig;

/// Retry policy for a single call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Retry {
    /// Safe to re-issue after an ambiguous failure
    Idempotent,
    /// Issued at most once
    Never,
}

/// Failure of a guarded call
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct CallFailure {
    pub error: GraphError,
    /// An earlier attempt failed in a way that may have applied it
    pub after_ambiguous: bool,
}

impl CallFailure {
    /// A create collided with a node an earlier attempt of this call may have made
    pub fn is_own_conflict(&self) -> bool {
        self.after_ambiguous && matches!(self.error, GraphError::AlreadyExists { .. })
    }
}

impl From<CallFailure> for TrackingError {
    fn from(failure: CallFailure) -> Self {
        map_graph_error(failure.error)
    }
}

/// Translate a graph facade error into the tracking taxonomy
pub fn map_graph_error(error: GraphError) -> TrackingError {
    match error {
        GraphError::NotFound { what } => TrackingError::not_found(what),
        GraphError::AlreadyExists { name } => TrackingError::already_exists(name),
        e @ (GraphError::Unavailable { .. } | GraphError::Timeout { .. }) => {
            TrackingError::unavailable(e.to_string())
        }
        GraphError::Unsupported { operation } => TrackingError::not_implemented(operation),
        GraphError::InvalidArgument { reason } => TrackingError::invalid_parameter(reason),
    }
}

/// Graph client plus call policy
pub(crate) struct Remote<G> {
    graph: G,
    opts: CallOptions,
    max_retries: u32,
}

impl<G: GraphClient> Remote<G> {
    pub fn new(graph: G, config: &StoreConfig) -> Self {
        Remote {
            graph,
            opts: config.call_options(),
            max_retries: config.max_retries,
        }
    }

    pub fn graph(&self) -> &G {
        &self.graph
    }

    /// Issue a call under the given retry policy
    pub fn call<T>(
        &self,
        operation: &'static str,
        retry: Retry,
        mut f: impl FnMut(&G, &CallOptions) -> GraphResult<T>,
    ) -> Result<T, CallFailure> {
        let attempts = match retry {
            Retry::Idempotent => self.max_retries.saturating_add(1),
            Retry::Never => 1,
        };
        let mut after_ambiguous = false;
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match f(&self.graph, &self.opts) {
                Ok(value) => return Ok(value),
                Err(error) if error.is_ambiguous() && attempt < attempts => {
                    warn!(
                        target: "mlmd::store",
                        operation,
                        attempt,
                        error = %error,
                        "retrying graph call"
                    );
                    after_ambiguous = true;
                }
                Err(error) => {
                    return Err(CallFailure {
                        error,
                        after_ambiguous,
                    })
                }
            }
        }
    }

    /// Read-only query, retried on transport failure
    pub fn query(&self, predicate: &NodePredicate) -> mlmd_core::Result<Vec<Node>> {
        Ok(self.call("query", Retry::Idempotent, |graph, opts| {
            graph.query(predicate, opts)
        })?)
    }
}
