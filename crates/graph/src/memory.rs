//! In-process metadata graph
//!
//! `InMemoryGraph` implements the full [`GraphClient`] contract behind a single
//! `RwLock`. It backs embedded use and every test in the workspace.
//!
//! Fault injection lets tests exercise the transport failure paths:
//! - `fail_next_calls(n)`: the next `n` calls fail with `Unavailable` before
//!   touching state
//! - `fail_next_calls_after_apply(n)`: the next `n` calls apply their effect and
//!   then report `Unavailable` (the ambiguous-timeout case)
//! - `set_latency(d)`: calls whose timeout is shorter than `d` fail with
//!   `Timeout`

use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::debug;

use crate::client::{CallOptions, GraphClient};
use crate::error::{GraphError, GraphResult};
use crate::node::{
    ArtifactRef, ArtifactSpec, Direction, ExecutionRef, ExecutionSpec, Node, NodeId, NodeKind,
    NodeUpdate, Properties, RunNodeRef, RunNodeSpec, WorkspaceRef, WorkspaceSpec,
};
use crate::predicate::NodePredicate;

/// Uniqueness scope for node names
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct SiblingKey {
    parent: Option<NodeId>,
    kind: NodeKind,
    name: String,
}

impl SiblingKey {
    fn of(node: &Node) -> Self {
        SiblingKey {
            parent: node.parent,
            kind: node.kind,
            name: node.name.clone(),
        }
    }
}

#[derive(Debug, Default)]
struct GraphState {
    nodes: BTreeMap<NodeId, Node>,
    names: HashMap<SiblingKey, NodeId>,
    next_id: u64,
}

impl GraphState {
    fn insert(&mut self, mut node: Node) -> GraphResult<Node> {
        if let Some(parent) = node.parent {
            if !self.nodes.contains_key(&parent) {
                return Err(GraphError::NotFound {
                    what: format!("parent node {}", parent),
                });
            }
        }
        let key = SiblingKey::of(&node);
        if self.names.contains_key(&key) {
            return Err(GraphError::AlreadyExists {
                name: format!("{} '{}'", node.kind.as_str(), node.name),
            });
        }
        self.next_id += 1;
        node.id = NodeId(self.next_id);
        self.names.insert(key, node.id);
        self.nodes.insert(node.id, node.clone());
        Ok(node)
    }

    fn expect_kind(&self, id: NodeId, kind: NodeKind) -> GraphResult<&Node> {
        match self.nodes.get(&id) {
            Some(node) if node.kind == kind => Ok(node),
            Some(node) => Err(GraphError::InvalidArgument {
                reason: format!(
                    "node {} is a {}, expected a {}",
                    id,
                    node.kind.as_str(),
                    kind.as_str()
                ),
            }),
            None => Err(GraphError::NotFound {
                what: format!("{} {}", kind.as_str(), id),
            }),
        }
    }

    fn is_descendant(&self, node: &Node, ancestor: NodeId) -> bool {
        let mut cursor = node.parent;
        while let Some(id) = cursor {
            if id == ancestor {
                return true;
            }
            cursor = self.nodes.get(&id).and_then(|n| n.parent);
        }
        false
    }
}

#[derive(Debug, Default)]
struct FaultPlan {
    fail_before: u32,
    fail_after: u32,
    latency: Duration,
}

/// Thread-safe in-memory metadata graph
#[derive(Debug, Default)]
pub struct InMemoryGraph {
    state: RwLock<GraphState>,
    faults: Mutex<FaultPlan>,
    calls: AtomicU64,
}

impl InMemoryGraph {
    /// Create an empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `n` calls with `Unavailable` without applying them
    pub fn fail_next_calls(&self, n: u32) {
        self.faults.lock().fail_before = n;
    }

    /// Apply the next `n` calls, then report `Unavailable` for each
    pub fn fail_next_calls_after_apply(&self, n: u32) {
        self.faults.lock().fail_after = n;
    }

    /// Simulated service latency
    pub fn set_latency(&self, latency: Duration) {
        self.faults.lock().latency = latency;
    }

    /// Number of calls received, including failed ones
    pub fn call_count(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }

    /// Number of live nodes of `kind`
    pub fn count(&self, kind: NodeKind) -> usize {
        self.state
            .read()
            .nodes
            .values()
            .filter(|n| n.kind == kind)
            .count()
    }

    fn admit(&self, operation: &str, opts: &CallOptions) -> GraphResult<()> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        let mut faults = self.faults.lock();
        if faults.latency > opts.timeout {
            return Err(GraphError::Timeout {
                operation: operation.to_string(),
                timeout_ms: opts.timeout.as_millis() as u64,
            });
        }
        if faults.fail_before > 0 {
            faults.fail_before -= 1;
            debug!(target: "mlmd::graph", operation, "injected failure before apply");
            return Err(GraphError::Unavailable {
                reason: format!("injected transport failure in {}", operation),
            });
        }
        Ok(())
    }

    fn finish<T>(&self, operation: &str, result: GraphResult<T>) -> GraphResult<T> {
        if result.is_ok() {
            let mut faults = self.faults.lock();
            if faults.fail_after > 0 {
                faults.fail_after -= 1;
                debug!(target: "mlmd::graph", operation, "injected failure after apply");
                return Err(GraphError::Unavailable {
                    reason: format!("injected transport failure after {}", operation),
                });
            }
        }
        result
    }

    fn apply<T>(&self, f: impl FnOnce(&mut GraphState) -> GraphResult<T>) -> GraphResult<T> {
        let mut state = self.state.write();
        f(&mut state)
    }

    fn log_artifact(
        &self,
        operation: &str,
        execution: &ExecutionRef,
        artifact: &ArtifactSpec,
        direction: Direction,
        opts: &CallOptions,
    ) -> GraphResult<ArtifactRef> {
        self.admit(operation, opts)?;
        let result = self.apply(|state| {
            state.expect_kind(execution.id, NodeKind::Execution)?;
            let node = state.insert(Node {
                id: NodeId(0),
                kind: NodeKind::Artifact,
                name: artifact.name.clone(),
                type_name: artifact.artifact_type.type_name().to_string(),
                description: String::new(),
                parent: Some(execution.id),
                direction: Some(direction),
                uri: artifact.uri.clone(),
                labels: BTreeMap::new(),
                properties: artifact.properties.clone(),
            })?;
            Ok(ArtifactRef { id: node.id })
        });
        self.finish(operation, result)
    }
}

fn bare_node(
    kind: NodeKind,
    name: &str,
    description: &str,
    parent: Option<NodeId>,
    properties: &Properties,
) -> Node {
    Node {
        id: NodeId(0),
        kind,
        name: name.to_string(),
        type_name: kind.as_str().to_string(),
        description: description.to_string(),
        parent,
        direction: None,
        uri: None,
        labels: BTreeMap::new(),
        properties: properties.clone(),
    }
}

impl GraphClient for InMemoryGraph {
    fn create_workspace(
        &self,
        spec: &WorkspaceSpec,
        opts: &CallOptions,
    ) -> GraphResult<WorkspaceRef> {
        self.admit("create_workspace", opts)?;
        let result = {
            let mut node = bare_node(
                NodeKind::Workspace,
                &spec.name,
                &spec.description,
                None,
                &spec.properties,
            );
            node.labels = spec.labels.clone();
            self.state.write().insert(node).map(|node| WorkspaceRef {
                id: node.id,
                name: node.name,
            })
        };
        self.finish("create_workspace", result)
    }

    fn create_run_node(
        &self,
        workspace: &WorkspaceRef,
        spec: &RunNodeSpec,
        opts: &CallOptions,
    ) -> GraphResult<RunNodeRef> {
        self.admit("create_run_node", opts)?;
        let result = self.apply(|state| {
            state.expect_kind(workspace.id, NodeKind::Workspace)?;
            let node = state.insert(bare_node(
                NodeKind::Run,
                &spec.name,
                &spec.description,
                Some(workspace.id),
                &spec.properties,
            ))?;
            Ok(RunNodeRef {
                id: node.id,
                name: node.name,
                workspace: workspace.id,
            })
        });
        self.finish("create_run_node", result)
    }

    fn create_execution(
        &self,
        workspace: &WorkspaceRef,
        run: &RunNodeRef,
        spec: &ExecutionSpec,
        opts: &CallOptions,
    ) -> GraphResult<ExecutionRef> {
        self.admit("create_execution", opts)?;
        let result = self.apply(|state| {
            if run.workspace != workspace.id {
                return Err(GraphError::InvalidArgument {
                    reason: format!(
                        "run {} does not belong to workspace {}",
                        run.id, workspace.id
                    ),
                });
            }
            state.expect_kind(run.id, NodeKind::Run)?;
            let node = state.insert(bare_node(
                NodeKind::Execution,
                &spec.name,
                &spec.description,
                Some(run.id),
                &spec.properties,
            ))?;
            Ok(ExecutionRef {
                id: node.id,
                name: node.name,
                run: run.id,
            })
        });
        self.finish("create_execution", result)
    }

    fn log_input(
        &self,
        execution: &ExecutionRef,
        artifact: &ArtifactSpec,
        opts: &CallOptions,
    ) -> GraphResult<ArtifactRef> {
        self.log_artifact("log_input", execution, artifact, Direction::Input, opts)
    }

    fn log_output(
        &self,
        execution: &ExecutionRef,
        artifact: &ArtifactSpec,
        opts: &CallOptions,
    ) -> GraphResult<ArtifactRef> {
        self.log_artifact("log_output", execution, artifact, Direction::Output, opts)
    }

    fn query(&self, predicate: &NodePredicate, opts: &CallOptions) -> GraphResult<Vec<Node>> {
        self.admit("query", opts)?;
        let result = {
            let state = self.state.read();
            Ok(state
                .nodes
                .values()
                .filter(|node| predicate.matches_local(node))
                .filter(|node| {
                    predicate
                        .descendant_of
                        .map_or(true, |ancestor| state.is_descendant(node, ancestor))
                })
                .cloned()
                .collect())
        };
        self.finish("query", result)
    }

    fn update_node(&self, id: NodeId, update: &NodeUpdate, opts: &CallOptions) -> GraphResult<Node> {
        self.admit("update_node", opts)?;
        let result = self.apply(|state| {
            let mut node = state.nodes.get(&id).cloned().ok_or_else(|| GraphError::NotFound {
                what: format!("node {}", id),
            })?;
            let old_key = SiblingKey::of(&node);
            if let Some(new_name) = update.name.as_ref().filter(|n| **n != node.name) {
                let new_key = SiblingKey {
                    name: new_name.clone(),
                    ..old_key.clone()
                };
                if state.names.contains_key(&new_key) {
                    return Err(GraphError::AlreadyExists {
                        name: format!("{} '{}'", node.kind.as_str(), new_name),
                    });
                }
                node.name = new_name.clone();
                state.names.remove(&old_key);
                state.names.insert(new_key, id);
            }
            for (k, v) in &update.set_properties {
                node.properties.insert(k.clone(), v.clone());
            }
            for (k, v) in &update.set_labels {
                node.labels.insert(k.clone(), v.clone());
            }
            state.nodes.insert(id, node.clone());
            Ok(node)
        });
        self.finish("update_node", result)
    }

    fn delete_subtree(&self, id: NodeId, opts: &CallOptions) -> GraphResult<usize> {
        self.admit("delete_subtree", opts)?;
        let result = self.apply(|state| {
            if !state.nodes.contains_key(&id) {
                return Err(GraphError::NotFound {
                    what: format!("node {}", id),
                });
            }
            let doomed: Vec<NodeId> = state
                .nodes
                .values()
                .filter(|n| n.id == id || state.is_descendant(n, id))
                .map(|n| n.id)
                .collect();
            for node_id in &doomed {
                if let Some(node) = state.nodes.remove(node_id) {
                    state.names.remove(&SiblingKey::of(&node));
                }
            }
            debug!(target: "mlmd::graph", root = %id, removed = doomed.len(), "deleted subtree");
            Ok(doomed.len())
        });
        self.finish("delete_subtree", result)
    }
}
