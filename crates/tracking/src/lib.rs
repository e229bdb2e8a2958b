//! Experiment tracking over an ML metadata graph
//!
//! This crate maps the experiment-tracking model onto the metadata graph:
//! - **Experiments** are workspaces; tags are workspace labels
//! - **Runs** are run nodes named by run id
//! - **Logging calls** each create one execution under the run, carrying
//!   params as inputs and metrics, tags and models as outputs
//!
//! Run data is never stored aggregated: every read replays the run's
//! artifacts in log order.
//!
//! # Example
//!
//! ```
//! use mlmd_graph::InMemoryGraph;
//! use mlmd_tracking::{CreateRun, GraphTrackingStore, TrackingStore};
//! use mlmd_core::{Metric, Param};
//!
//! let store = GraphTrackingStore::new(InMemoryGraph::new());
//! let exp = store.create_experiment("demo", None, &[]).unwrap();
//! let run = store.create_run(CreateRun::in_experiment(exp)).unwrap();
//! let run_id = &run.info.run_id;
//!
//! store.log_param(run_id, &Param::new("lr", "0.01")).unwrap();
//! store.log_metric(run_id, &Metric::new("loss", 0.25, 1, 0)).unwrap();
//! assert_eq!(store.get_run(run_id).unwrap().data.metrics["loss"].value, 0.25);
//! ```

#![warn(clippy::all)]

pub mod config;
pub mod graph_store;
pub mod history;
pub mod identity;
pub mod lifecycle;
mod remote;
pub mod search;
pub mod store;
pub mod translator;

pub use config::{ServiceConfig, StoreConfig, CONFIG_FILE_NAME};
pub use graph_store::GraphTrackingStore;
pub use identity::{IdentityMap, KeyGuard, RunHandle};
pub use remote::map_graph_error;
pub use search::{RunsPage, SearchRequest};
pub use store::{CreateRun, TrackingStore};
pub use translator::RunLog;
