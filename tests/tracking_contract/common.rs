//! Shared fixtures for the tracking contract suite.

#![allow(dead_code)]

use mlmd_graph::{
    ArtifactRef, ArtifactSpec, CallOptions, ExecutionRef, ExecutionSpec, GraphClient, GraphError,
    GraphResult, InMemoryGraph, Node, NodeId, NodePredicate, NodeUpdate, RunNodeRef, RunNodeSpec,
    WorkspaceRef, WorkspaceSpec,
};
use mlmdstore::{CreateRun, GraphTrackingStore, Run, StoreConfig, TrackingStore};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::{Arc, Once};

static INIT_TRACING: Once = Once::new();

/// Route store logs through the test harness writer.
pub fn init_tracing() {
    INIT_TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_max_level(tracing::Level::DEBUG)
            .try_init();
    });
}

pub type TestStore = GraphTrackingStore<Arc<InMemoryGraph>>;

/// Store over a fresh in-memory graph; the graph handle is returned for fault injection.
pub fn store() -> (TestStore, Arc<InMemoryGraph>) {
    init_tracing();
    let graph = Arc::new(InMemoryGraph::new());
    (GraphTrackingStore::new(Arc::clone(&graph)), graph)
}

/// Store with a custom configuration.
pub fn store_with(config: StoreConfig) -> (TestStore, Arc<InMemoryGraph>) {
    init_tracing();
    let graph = Arc::new(InMemoryGraph::new());
    let store = GraphTrackingStore::with_config(Arc::clone(&graph), config)
        .unwrap_or_else(|e| panic!("invalid test config: {}", e));
    (store, graph)
}

/// Create an experiment and one RUNNING run in it.
pub fn experiment_with_run(store: &impl TrackingStore, name: &str) -> (String, Run) {
    let experiment_id = store.create_experiment(name, None, &[]).unwrap();
    let run = store
        .create_run(CreateRun::in_experiment(experiment_id.as_str()).user("alice"))
        .unwrap();
    (experiment_id, run)
}

/// Graph deployment offering only the mandatory calls (no update or delete).
pub struct CreateOnlyGraph(pub InMemoryGraph);

impl GraphClient for CreateOnlyGraph {
    fn create_workspace(
        &self,
        spec: &WorkspaceSpec,
        opts: &CallOptions,
    ) -> GraphResult<WorkspaceRef> {
        self.0.create_workspace(spec, opts)
    }

    fn create_run_node(
        &self,
        workspace: &WorkspaceRef,
        spec: &RunNodeSpec,
        opts: &CallOptions,
    ) -> GraphResult<RunNodeRef> {
        self.0.create_run_node(workspace, spec, opts)
    }

    fn create_execution(
        &self,
        workspace: &WorkspaceRef,
        run: &RunNodeRef,
        spec: &ExecutionSpec,
        opts: &CallOptions,
    ) -> GraphResult<ExecutionRef> {
        self.0.create_execution(workspace, run, spec, opts)
    }

    fn log_input(
        &self,
        execution: &ExecutionRef,
        artifact: &ArtifactSpec,
        opts: &CallOptions,
    ) -> GraphResult<ArtifactRef> {
        self.0.log_input(execution, artifact, opts)
    }

    fn log_output(
        &self,
        execution: &ExecutionRef,
        artifact: &ArtifactSpec,
        opts: &CallOptions,
    ) -> GraphResult<ArtifactRef> {
        self.0.log_output(execution, artifact, opts)
    }

    fn query(&self, predicate: &NodePredicate, opts: &CallOptions) -> GraphResult<Vec<Node>> {
        self.0.query(predicate, opts)
    }
}

/// Graph whose chosen operations apply and then report a transport failure.
///
/// Models a timeout that fires after the server committed the write.
#[derive(Default)]
pub struct AmbiguousGraph {
    pub inner: InMemoryGraph,
    pending: Mutex<HashMap<&'static str, u32>>,
}

impl AmbiguousGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `n` calls of `operation` ambiguous.
    pub fn fail_after_apply(&self, operation: &'static str, n: u32) {
        self.pending.lock().insert(operation, n);
    }

    fn finish<T>(&self, operation: &'static str, result: GraphResult<T>) -> GraphResult<T> {
        let mut pending = self.pending.lock();
        match pending.get_mut(operation) {
            Some(n) if *n > 0 && result.is_ok() => {
                *n -= 1;
                Err(GraphError::Unavailable {
                    reason: format!("connection reset after {}", operation),
                })
            }
            _ => result,
        }
    }
}

impl GraphClient for AmbiguousGraph {
    fn create_workspace(
        &self,
        spec: &WorkspaceSpec,
        opts: &CallOptions,
    ) -> GraphResult<WorkspaceRef> {
        self.finish("create_workspace", self.inner.create_workspace(spec, opts))
    }

    fn create_run_node(
        &self,
        workspace: &WorkspaceRef,
        spec: &RunNodeSpec,
        opts: &CallOptions,
    ) -> GraphResult<RunNodeRef> {
        self.finish(
            "create_run_node",
            self.inner.create_run_node(workspace, spec, opts),
        )
    }

    fn create_execution(
        &self,
        workspace: &WorkspaceRef,
        run: &RunNodeRef,
        spec: &ExecutionSpec,
        opts: &CallOptions,
    ) -> GraphResult<ExecutionRef> {
        self.finish(
            "create_execution",
            self.inner.create_execution(workspace, run, spec, opts),
        )
    }

    fn log_input(
        &self,
        execution: &ExecutionRef,
        artifact: &ArtifactSpec,
        opts: &CallOptions,
    ) -> GraphResult<ArtifactRef> {
        self.finish("log_input", self.inner.log_input(execution, artifact, opts))
    }

    fn log_output(
        &self,
        execution: &ExecutionRef,
        artifact: &ArtifactSpec,
        opts: &CallOptions,
    ) -> GraphResult<ArtifactRef> {
        self.finish("log_output", self.inner.log_output(execution, artifact, opts))
    }

    fn query(&self, predicate: &NodePredicate, opts: &CallOptions) -> GraphResult<Vec<Node>> {
        self.inner.query(predicate, opts)
    }

    fn update_node(&self, id: NodeId, update: &NodeUpdate, opts: &CallOptions) -> GraphResult<Node> {
        self.finish("update_node", self.inner.update_node(id, update, opts))
    }

    fn delete_subtree(&self, id: NodeId, opts: &CallOptions) -> GraphResult<usize> {
        self.finish("delete_subtree", self.inner.delete_subtree(id, opts))
    }
}
