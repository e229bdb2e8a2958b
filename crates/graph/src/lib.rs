//! Metadata graph facade for mlmdstore
//!
//! The tracking layer talks to the metadata service exclusively through the
//! [`GraphClient`] trait defined here:
//! - **Nodes**: Workspace, Run, Execution and Artifact, arranged as a tree
//! - **Predicates**: conjunctive property/name/ancestry filters for `query`
//! - **InMemoryGraph**: a complete in-process implementation of the contract
//!
//! The RPC transport to a remote service is intentionally not part of this
//! crate; any client implementing [`GraphClient`] can be plugged in.

#![warn(clippy::all)]

pub mod client;
pub mod error;
pub mod memory;
pub mod node;
pub mod predicate;

pub use client::{CallOptions, GraphClient, DEFAULT_CALL_TIMEOUT};
pub use error::{GraphError, GraphResult};
pub use memory::InMemoryGraph;
pub use node::{
    ArtifactRef, ArtifactSpec, ArtifactType, Direction, ExecutionRef, ExecutionSpec, Node, NodeId,
    NodeKind, NodeUpdate, Properties, PropertyValue, RunNodeRef, RunNodeSpec, WorkspaceRef,
    WorkspaceSpec,
};
pub use predicate::NodePredicate;
