//! Graph node model
//!
//! The metadata graph has four node kinds arranged as a tree:
//!
//! ```text
//! Workspace ──▶ Run ──▶ Execution ──▶ Artifact (logged as input or output)
//! ```
//!
//! Every node carries a name (unique among its siblings of the same kind),
//! a type name, and a bag of typed properties. Workspaces additionally carry
//! string labels.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Server-assigned node id; monotonically increasing in creation order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u64);

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Node kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    Workspace,
    Run,
    Execution,
    Artifact,
}

impl NodeKind {
    /// Get string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Workspace => "workspace",
            NodeKind::Run => "run",
            NodeKind::Execution => "execution",
            NodeKind::Artifact => "artifact",
        }
    }
}

/// How an artifact is attached to its execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Input,
    Output,
}

/// Artifact types understood by the metadata service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArtifactType {
    Metrics,
    Param,
    Tag,
    Model,
    Dataset,
}

impl ArtifactType {
    /// Type name as registered in the metadata service
    pub fn type_name(&self) -> &'static str {
        match self {
            ArtifactType::Metrics => "metrics",
            ArtifactType::Param => "param",
            ArtifactType::Tag => "tag",
            ArtifactType::Model => "model",
            ArtifactType::Dataset => "dataset",
        }
    }

    /// Parse a registered type name
    pub fn from_type_name(s: &str) -> Option<Self> {
        match s {
            "metrics" => Some(ArtifactType::Metrics),
            "param" => Some(ArtifactType::Param),
            "tag" => Some(ArtifactType::Tag),
            "model" => Some(ArtifactType::Model),
            "dataset" => Some(ArtifactType::Dataset),
            _ => None,
        }
    }
}

/// Typed property value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PropertyValue {
    Int(i64),
    Double(f64),
    String(String),
}

impl PropertyValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            PropertyValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Numeric view; ints widen to f64
    pub fn as_double(&self) -> Option<f64> {
        match self {
            PropertyValue::Double(d) => Some(*d),
            PropertyValue::Int(i) => Some(*i as f64),
            PropertyValue::String(_) => None,
        }
    }
}

impl From<i64> for PropertyValue {
    fn from(i: i64) -> Self {
        PropertyValue::Int(i)
    }
}

impl From<f64> for PropertyValue {
    fn from(d: f64) -> Self {
        PropertyValue::Double(d)
    }
}

impl From<String> for PropertyValue {
    fn from(s: String) -> Self {
        PropertyValue::String(s)
    }
}

impl From<&str> for PropertyValue {
    fn from(s: &str) -> Self {
        PropertyValue::String(s.to_string())
    }
}

/// Property bag
pub type Properties = BTreeMap<String, PropertyValue>;

/// A node as returned by queries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub kind: NodeKind,
    pub name: String,
    pub type_name: String,
    pub description: String,
    /// Owning node (None for workspaces)
    pub parent: Option<NodeId>,
    /// Set for artifacts only
    pub direction: Option<Direction>,
    pub uri: Option<String>,
    pub labels: BTreeMap<String, String>,
    pub properties: Properties,
}

impl Node {
    pub fn property(&self, key: &str) -> Option<&PropertyValue> {
        self.properties.get(key)
    }

    pub fn str_property(&self, key: &str) -> Option<&str> {
        self.property(key).and_then(PropertyValue::as_str)
    }

    pub fn int_property(&self, key: &str) -> Option<i64> {
        self.property(key).and_then(PropertyValue::as_int)
    }

    pub fn double_property(&self, key: &str) -> Option<f64> {
        self.property(key).and_then(PropertyValue::as_double)
    }

    /// Artifact type, if this node is an artifact of a known type
    pub fn artifact_type(&self) -> Option<ArtifactType> {
        if self.kind != NodeKind::Artifact {
            return None;
        }
        ArtifactType::from_type_name(&self.type_name)
    }
}

// ========== References ==========

/// Handle to a workspace node
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkspaceRef {
    pub id: NodeId,
    pub name: String,
}

/// Handle to a run node
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunNodeRef {
    pub id: NodeId,
    pub name: String,
    pub workspace: NodeId,
}

/// Handle to an execution node
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExecutionRef {
    pub id: NodeId,
    pub name: String,
    pub run: NodeId,
}

/// Handle to a logged artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArtifactRef {
    pub id: NodeId,
}

// ========== Creation Specs ==========

/// Workspace creation request
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkspaceSpec {
    pub name: String,
    pub description: String,
    pub labels: BTreeMap<String, String>,
    pub properties: Properties,
}

/// Run node creation request
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunNodeSpec {
    pub name: String,
    pub description: String,
    pub properties: Properties,
}

/// Execution creation request
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecutionSpec {
    pub name: String,
    pub description: String,
    pub properties: Properties,
}

/// Artifact logging request
#[derive(Debug, Clone, PartialEq)]
pub struct ArtifactSpec {
    pub artifact_type: ArtifactType,
    /// Unique among the execution's artifacts
    pub name: String,
    pub uri: Option<String>,
    pub properties: Properties,
}

/// In-place node update
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeUpdate {
    /// New name; must stay unique among siblings
    pub name: Option<String>,
    pub set_properties: Properties,
    pub set_labels: BTreeMap<String, String>,
}

impl NodeUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rename(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn set(mut self, key: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.set_properties.insert(key.into(), value.into());
        self
    }

    pub fn label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_labels.insert(key.into(), value.into());
        self
    }
}
