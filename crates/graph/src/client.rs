//! Graph client facade
//!
//! [`GraphClient`] is the capability surface the tracking layer consumes. A
//! production deployment implements it over the metadata service's RPC API;
//! [`InMemoryGraph`](crate::InMemoryGraph) implements it in-process.
//!
//! # Contract
//!
//! - Names are unique among siblings of the same kind; a collision fails with
//!   `AlreadyExists` and creates nothing.
//! - Node ids increase monotonically in creation order.
//! - Every call honours `CallOptions::timeout`; a timed-out call may or may not
//!   have been applied.
//! - `update_node` and `delete_subtree` are optional capabilities; the default
//!   implementations report `Unsupported`.

use std::sync::Arc;
use std::time::Duration;

use crate::error::{GraphError, GraphResult};
use crate::node::{
    ArtifactRef, ArtifactSpec, ExecutionRef, ExecutionSpec, Node, NodeId, NodeUpdate, RunNodeRef,
    RunNodeSpec, WorkspaceRef, WorkspaceSpec,
};
use crate::predicate::NodePredicate;

/// Default deadline for a single call
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(5);

/// Per-call options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallOptions {
    /// Deadline for the call
    pub timeout: Duration,
}

impl Default for CallOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_CALL_TIMEOUT,
        }
    }
}

impl CallOptions {
    pub fn with_timeout(timeout: Duration) -> Self {
        Self { timeout }
    }
}

/// Metadata graph operations
pub trait GraphClient: Send + Sync {
    /// Create a workspace (name unique across the service)
    fn create_workspace(&self, spec: &WorkspaceSpec, opts: &CallOptions)
        -> GraphResult<WorkspaceRef>;

    /// Create a run node nested under a workspace
    fn create_run_node(
        &self,
        workspace: &WorkspaceRef,
        spec: &RunNodeSpec,
        opts: &CallOptions,
    ) -> GraphResult<RunNodeRef>;

    /// Create an execution nested under a run node
    fn create_execution(
        &self,
        workspace: &WorkspaceRef,
        run: &RunNodeRef,
        spec: &ExecutionSpec,
        opts: &CallOptions,
    ) -> GraphResult<ExecutionRef>;

    /// Attach an artifact to an execution as an input
    fn log_input(
        &self,
        execution: &ExecutionRef,
        artifact: &ArtifactSpec,
        opts: &CallOptions,
    ) -> GraphResult<ArtifactRef>;

    /// Attach an artifact to an execution as an output
    fn log_output(
        &self,
        execution: &ExecutionRef,
        artifact: &ArtifactSpec,
        opts: &CallOptions,
    ) -> GraphResult<ArtifactRef>;

    /// Return all nodes matching `predicate`, ordered by id
    fn query(&self, predicate: &NodePredicate, opts: &CallOptions) -> GraphResult<Vec<Node>>;

    /// Rename a node or overwrite some of its properties and labels
    fn update_node(&self, id: NodeId, update: &NodeUpdate, opts: &CallOptions) -> GraphResult<Node> {
        let _ = (id, update, opts);
        Err(GraphError::Unsupported {
            operation: "update_node".to_string(),
        })
    }

    /// Remove a node and all of its descendants; returns the number removed
    fn delete_subtree(&self, id: NodeId, opts: &CallOptions) -> GraphResult<usize> {
        let _ = (id, opts);
        Err(GraphError::Unsupported {
            operation: "delete_subtree".to_string(),
        })
    }
}

impl<G: GraphClient + ?Sized> GraphClient for Arc<G> {
    fn create_workspace(
        &self,
        spec: &WorkspaceSpec,
        opts: &CallOptions,
    ) -> GraphResult<WorkspaceRef> {
        (**self).create_workspace(spec, opts)
    }

    fn create_run_node(
        &self,
        workspace: &WorkspaceRef,
        spec: &RunNodeSpec,
        opts: &CallOptions,
    ) -> GraphResult<RunNodeRef> {
        (**self).create_run_node(workspace, spec, opts)
    }

    fn create_execution(
        &self,
        workspace: &WorkspaceRef,
        run: &RunNodeRef,
        spec: &ExecutionSpec,
        opts: &CallOptions,
    ) -> GraphResult<ExecutionRef> {
        (**self).create_execution(workspace, run, spec, opts)
    }

    fn log_input(
        &self,
        execution: &ExecutionRef,
        artifact: &ArtifactSpec,
        opts: &CallOptions,
    ) -> GraphResult<ArtifactRef> {
        (**self).log_input(execution, artifact, opts)
    }

    fn log_output(
        &self,
        execution: &ExecutionRef,
        artifact: &ArtifactSpec,
        opts: &CallOptions,
    ) -> GraphResult<ArtifactRef> {
        (**self).log_output(execution, artifact, opts)
    }

    fn query(&self, predicate: &NodePredicate, opts: &CallOptions) -> GraphResult<Vec<Node>> {
        (**self).query(predicate, opts)
    }

    fn update_node(&self, id: NodeId, update: &NodeUpdate, opts: &CallOptions) -> GraphResult<Node> {
        (**self).update_node(id, update, opts)
    }

    fn delete_subtree(&self, id: NodeId, opts: &CallOptions) -> GraphResult<usize> {
        (**self).delete_subtree(id, opts)
    }
}
