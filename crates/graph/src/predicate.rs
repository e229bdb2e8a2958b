//! Node query predicates
//!
//! A predicate is a conjunction: a node matches when every set field matches.
//! An empty predicate matches every node.

use crate::node::{Node, NodeId, NodeKind, PropertyValue};

/// Conjunctive node filter understood by the metadata service
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodePredicate {
    pub kind: Option<NodeKind>,
    pub id: Option<NodeId>,
    pub name: Option<String>,
    pub type_name: Option<String>,
    /// Direct parent
    pub parent: Option<NodeId>,
    /// Any ancestor (transitively)
    pub descendant_of: Option<NodeId>,
    /// Property equality conditions
    pub properties: Vec<(String, PropertyValue)>,
}

impl NodePredicate {
    /// Match everything
    pub fn new() -> Self {
        Self::default()
    }

    /// Match nodes of one kind
    pub fn kind(kind: NodeKind) -> Self {
        NodePredicate {
            kind: Some(kind),
            ..Self::default()
        }
    }

    pub fn with_id(mut self, id: NodeId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_type_name(mut self, type_name: impl Into<String>) -> Self {
        self.type_name = Some(type_name.into());
        self
    }

    pub fn with_parent(mut self, parent: NodeId) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn descendant_of(mut self, ancestor: NodeId) -> Self {
        self.descendant_of = Some(ancestor);
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.properties.push((key.into(), value.into()));
        self
    }

    /// Check every condition that can be decided from the node alone
    ///
    /// `descendant_of` needs the node's ancestry and is not checked here.
    pub fn matches_local(&self, node: &Node) -> bool {
        if self.kind.is_some_and(|k| k != node.kind) {
            return false;
        }
        if self.id.is_some_and(|id| id != node.id) {
            return false;
        }
        if self.name.as_ref().is_some_and(|n| *n != node.name) {
            return false;
        }
        if self.type_name.as_ref().is_some_and(|t| *t != node.type_name) {
            return false;
        }
        if self.parent.is_some() && self.parent != node.parent {
            return false;
        }
        self.properties
            .iter()
            .all(|(key, expected)| node.properties.get(key) == Some(expected))
    }
}
