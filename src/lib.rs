//! mlmdstore - experiment tracking backed by an ML metadata graph
//!
//! mlmdstore exposes the familiar experiment-tracking model (experiments,
//! runs, metrics, params and tags) over a metadata graph of workspaces, run
//! nodes, executions and artifacts.
//!
//! # Quick Start
//!
//! ```
//! use mlmdstore::{CreateRun, GraphTrackingStore, InMemoryGraph, Metric, RunStatus, TrackingStore};
//!
//! let store = GraphTrackingStore::new(InMemoryGraph::new());
//! let experiment_id = store.create_experiment("mnist", None, &[]).unwrap();
//! let run = store
//!     .create_run(CreateRun::in_experiment(experiment_id).user("alice"))
//!     .unwrap();
//!
//! store
//!     .log_metric(&run.info.run_id, &Metric::new("loss", 0.3, 1, 0))
//!     .unwrap();
//! store
//!     .update_run_info(&run.info.run_id, RunStatus::Finished, None, None)
//!     .unwrap();
//! ```
//!
//! # Architecture
//!
//! - `mlmd_core`: tracking entities, errors and limits
//! - `mlmd_graph`: the metadata graph facade and an in-memory implementation
//! - `mlmd_tracking`: the [`TrackingStore`] trait and its graph-backed
//!   implementation
//!
//! The graph is the only source of truth; the store holds nothing durable.

pub use mlmd_core::*;
pub use mlmd_graph::{
    CallOptions, GraphClient, GraphError, GraphResult, InMemoryGraph, Node, NodeId, NodeKind,
    NodePredicate,
};
pub use mlmd_tracking::*;
