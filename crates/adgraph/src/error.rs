//! Error types for adgraph.

use crate::node::NodeId;
use thiserror::Error;

/// Broad classification of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// The graph is not a valid single-output DAG for the requested use.
    GraphShape,
    /// An argument or operand list has the wrong length.
    Arity,
    /// A value fell outside the domain of an operation.
    NumericDomain,
}

/// Errors raised by a single [`Operation`](crate::Operation).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OperationError {
    /// Operation invoked with the wrong number of operands.
    #[error("{operation} expects {expected} operand(s), got {actual}")]
    OperandCount {
        operation: &'static str,
        expected: &'static str,
        actual: usize,
    },

    /// Denominator is zero.
    #[error("division by zero")]
    DivisionByZero,

    /// Logarithm of a non-positive value.
    #[error("logarithm of non-positive value {value}")]
    LogOfNonPositive { value: f64 },

    /// Logarithm base must be positive and different from one.
    #[error("invalid logarithm base {base}: must be positive and not equal to 1")]
    InvalidLogBase { base: f64 },

    /// Constant base of an exponential must be positive.
    #[error("invalid constant base {base} for power: must be positive")]
    InvalidPowerBase { base: f64 },

    /// Derivative of x^y with respect to y needs ln(x).
    #[error("power with non-positive base {value} is not differentiable in the exponent")]
    PowerOfNonPositive { value: f64 },

    /// Square root outside its domain.
    #[error("square root of {value} is outside the domain")]
    SqrtOfNegative { value: f64 },

    /// The operation has no derivative at this point.
    #[error("{operation} is not differentiable at {value}")]
    NotDifferentiable { operation: &'static str, value: f64 },
}

impl OperationError {
    /// Classify this error.
    pub fn category(&self) -> ErrorCategory {
        match self {
            OperationError::OperandCount { .. } => ErrorCategory::Arity,
            _ => ErrorCategory::NumericDomain,
        }
    }
}

/// Mismatch between the designated inputs and the origin nodes of a graph.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InputMismatch {
    /// The graph has origin nodes that were not passed as inputs.
    #[error("graph has {origins} origin nodes but only {inputs} inputs were provided")]
    MoreOrigins { origins: usize, inputs: usize },

    /// More inputs were passed than the graph has origin nodes.
    #[error("graph has {origins} origin nodes but {inputs} inputs were provided")]
    FewerOrigins { origins: usize, inputs: usize },

    /// The same node was passed as input more than once.
    #[error("input {node} is listed more than once")]
    DuplicateInput { node: NodeId },

    /// An origin node of the graph is missing from the inputs.
    #[error("origin node {node} is not among the inputs")]
    UnlistedOrigin { node: NodeId },
}

/// Errors that can occur while building, validating or running a graph.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GraphError {
    /// Node id does not refer to a live node.
    #[error("unknown node {node}")]
    UnknownNode { node: NodeId },

    /// The requested wiring would make a node its own ancestor.
    #[error("invalid graph: node {node} would be an ancestor of itself")]
    SelfAncestor { node: NodeId },

    /// A function needs at least one input.
    #[error("no inputs to function")]
    EmptyInputs,

    /// Inputs must be leaves: no operands and no operation.
    #[error("input {node} is not a leaf; function inputs must be origin nodes without an operation")]
    InputNotOrigin { node: NodeId },

    /// An input reaches no terminal node.
    #[error("input {node} reaches no terminal node")]
    NoTerminalNode { node: NodeId },

    /// The inputs reach more than one terminal node.
    #[error("more than one terminal node ({first} and {second}); there must be exactly one")]
    MultipleTerminalNodes { first: NodeId, second: NodeId },

    /// Inputs do not match the graph's origin nodes.
    #[error("input mismatch: {0}")]
    InputMismatch(#[from] InputMismatch),

    /// Argument vector length differs from the number of inputs.
    #[error("expected {expected} arguments, got {actual}")]
    ArgumentCount { expected: usize, actual: usize },

    /// The graph changed structurally after the function was built.
    #[error("graph changed since the function was built (revision {built}, now {current})")]
    StaleFunction { built: u64, current: u64 },

    /// An operation failed while evaluating or differentiating a node.
    #[error("node {node}: {source}")]
    Operation {
        node: NodeId,
        #[source]
        source: OperationError,
    },

    /// An operation could not be constructed.
    #[error(transparent)]
    InvalidOperation(#[from] OperationError),
}

impl GraphError {
    /// Classify this error.
    pub fn category(&self) -> ErrorCategory {
        match self {
            GraphError::ArgumentCount { .. } => ErrorCategory::Arity,
            GraphError::Operation { source, .. } | GraphError::InvalidOperation(source) => {
                source.category()
            }
            _ => ErrorCategory::GraphShape,
        }
    }

    pub(crate) fn at(node: NodeId, source: OperationError) -> Self {
        GraphError::Operation { node, source }
    }
}
