//! Graph vertices and their identifiers.

use crate::operation::Operation;
use smallvec::SmallVec;
use std::fmt;

/// Unique identifier for a node in a [`Graph`](crate::Graph).
///
/// Identifiers are never reused: once a node is removed its id stays invalid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    /// Get the internal index.
    pub fn index(&self) -> usize {
        self.0
    }

    /// Rebuild an id from an index previously obtained with [`index`](Self::index).
    ///
    /// The id is checked against the graph whenever it is used, so an index
    /// that does not name a live node yields `GraphError::UnknownNode`.
    pub fn from_index(index: usize) -> Self {
        Self(index)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Parent list; most nodes have one or two operands.
pub(crate) type Parents = SmallVec<[NodeId; 2]>;

/// A vertex in the computation graph.
#[derive(Debug, Clone)]
pub struct Node {
    /// Transform applied to the parents (None for leaf/input nodes).
    pub(crate) operation: Option<Operation>,
    /// Operand nodes, in operand order.
    pub(crate) parents: Parents,
    /// Nodes that list this node as a parent, one entry per edge.
    pub(crate) children: Vec<NodeId>,
    /// Last forward result.
    pub(crate) value: f64,
    /// Accumulated reverse-mode partial.
    pub(crate) derivative: f64,
    pub(crate) evaluated: bool,
    /// Set once this node has pushed its contribution to its parents.
    pub(crate) differentiated_parents: bool,
    /// Created by an expression constructor rather than declared by the caller.
    pub(crate) anonymous: bool,
}

impl Node {
    pub(crate) fn leaf() -> Self {
        Self {
            operation: None,
            parents: Parents::new(),
            children: Vec::new(),
            value: 0.0,
            derivative: 0.0,
            evaluated: false,
            differentiated_parents: false,
            anonymous: false,
        }
    }

    pub(crate) fn computed(operation: Operation, anonymous: bool) -> Self {
        Self {
            operation: Some(operation),
            anonymous,
            ..Self::leaf()
        }
    }

    /// Operation of this node, if it is computed.
    pub fn operation(&self) -> Option<&Operation> {
        self.operation.as_ref()
    }

    /// Operand nodes.
    pub fn parents(&self) -> &[NodeId] {
        &self.parents
    }

    /// Dependent nodes.
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Last computed value.
    pub fn value(&self) -> f64 {
        self.value
    }

    /// Derivative accumulated by the last backward pass.
    pub fn derivative(&self) -> f64 {
        self.derivative
    }

    /// Whether the current forward pass has reached this node.
    pub fn is_evaluated(&self) -> bool {
        self.evaluated
    }

    /// Whether the current backward pass has propagated through this node.
    pub fn has_differentiated_parents(&self) -> bool {
        self.differentiated_parents
    }

    /// Whether this node was created implicitly by an expression.
    pub fn is_anonymous(&self) -> bool {
        self.anonymous
    }

    /// Whether this node has no parents.
    pub fn is_origin(&self) -> bool {
        self.parents.is_empty()
    }

    /// Whether this node has no children.
    pub fn is_terminal(&self) -> bool {
        self.children.is_empty()
    }

    /// Replace every occurrence of `from` in the parent list, keeping order.
    pub(crate) fn replace_parent(&mut self, from: NodeId, to: NodeId) {
        for parent in self.parents.iter_mut().filter(|p| **p == from) {
            *parent = to;
        }
    }

    /// Replace every occurrence of `from` in the child list, keeping order.
    pub(crate) fn replace_child(&mut self, from: NodeId, to: NodeId) {
        for child in self.children.iter_mut().filter(|c| **c == from) {
            *child = to;
        }
    }

    pub(crate) fn drop_child(&mut self, child: NodeId) {
        self.children.retain(|c| *c != child);
    }

    pub(crate) fn drop_parent(&mut self, parent: NodeId) {
        self.parents.retain(|p| *p != parent);
    }
}
