//! Validated single-output functions over a [`Graph`].
//!
//! A [`Function`] fixes an ordered list of input nodes, checks that they
//! form a well-formed graph with exactly one output, and then evaluates and
//! differentiates that graph for concrete argument vectors.
//!
//! # Example
//!
//! ```
//! use adgraph::{Function, Graph};
//! use approx::assert_relative_eq;
//!
//! let mut g = Graph::new();
//! let x = g.input();
//! let y = g.input();
//! let xy = g.mul(x, y).unwrap();
//! let _out = g.sin(xy).unwrap();
//!
//! let f = Function::new(&g, &[x, y]).unwrap();
//! let grad = f.differentiate(&mut g, &[2.0, 0.5]).unwrap();
//! assert_relative_eq!(grad[0], 0.5 * 1.0_f64.cos());
//! assert_relative_eq!(grad[1], 2.0 * 1.0_f64.cos());
//! ```

use crate::error::{GraphError, InputMismatch};
use crate::graph::Graph;
use crate::node::NodeId;
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::{HashMap, HashSet};

/// Order in which forward and backward passes visit nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Traversal {
    /// Seed the inputs (forward) or the output (backward) and let each node
    /// wait until all its dependencies are done before passing the pass on.
    #[default]
    Propagate,
    /// Walk a topological order precomputed when the function is built.
    Topological,
}

/// A graph restricted to one set of inputs and its single output.
///
/// The function does not borrow the graph. It records the graph revision it
/// was validated against and refuses to run once the graph has changed
/// structurally.
#[derive(Debug, Clone)]
pub struct Function {
    inputs: Vec<NodeId>,
    output: NodeId,
    /// Inputs and all their descendants, deduplicated.
    nodes: Vec<NodeId>,
    /// `nodes` in topological (parents first) order.
    order: Vec<NodeId>,
    traversal: Traversal,
    revision: u64,
}

impl Function {
    /// Validate `inputs` and build a function with the default traversal.
    pub fn new(graph: &Graph, inputs: &[NodeId]) -> Result<Self, GraphError> {
        Self::with_traversal(graph, inputs, Traversal::default())
    }

    /// Validate `inputs` and build a function with the given traversal.
    ///
    /// # Errors
    ///
    /// - [`GraphError::EmptyInputs`] when `inputs` is empty.
    /// - [`GraphError::UnknownNode`] / [`GraphError::InputNotOrigin`] when an
    ///   input is not a live leaf (no parents and no operation).
    /// - [`GraphError::MultipleTerminalNodes`] when the inputs do not all
    ///   lead to one and the same output.
    /// - [`GraphError::InputMismatch`] when the origins of the output differ
    ///   from the inputs.
    pub fn with_traversal(
        graph: &Graph,
        inputs: &[NodeId],
        traversal: Traversal,
    ) -> Result<Self, GraphError> {
        if inputs.is_empty() {
            return Err(GraphError::EmptyInputs);
        }
        for &input in inputs {
            let node = graph.node(input)?;
            if !node.is_origin() || node.operation().is_some() {
                return Err(GraphError::InputNotOrigin { node: input });
            }
        }

        let output = find_output(graph, inputs)?;
        check_origins(&graph.origin_nodes(output)?, inputs)?;

        let nodes = collect_nodes(graph, inputs)?;
        let order = topological_order(graph, &nodes)?;
        log::debug!(
            "function over {} input(s): output {}, {} node(s), {:?} traversal",
            inputs.len(),
            output,
            nodes.len(),
            traversal
        );

        Ok(Self {
            inputs: inputs.to_vec(),
            output,
            nodes,
            order,
            traversal,
            revision: graph.revision(),
        })
    }

    /// Input nodes, in argument order.
    pub fn inputs(&self) -> &[NodeId] {
        &self.inputs
    }

    /// The single output node.
    pub fn output(&self) -> NodeId {
        self.output
    }

    /// Number of nodes reachable from the inputs, inputs included.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Traversal used by the forward and backward passes.
    pub fn traversal(&self) -> Traversal {
        self.traversal
    }

    /// Evaluate the function at `args` and return the output value.
    ///
    /// `args[i]` is assigned to `inputs()[i]`. Intermediate values are left in
    /// the graph and can be read with [`Graph::value`].
    pub fn evaluate(&self, graph: &mut Graph, args: &[f64]) -> Result<f64, GraphError> {
        self.check_call(graph, args)?;

        for &id in &self.nodes {
            graph.node_mut(id)?.evaluated = false;
        }
        for (&input, &arg) in self.inputs.iter().zip(args) {
            graph.node_mut(input)?.value = arg;
        }

        match self.traversal {
            Traversal::Propagate => {
                for &input in &self.inputs {
                    graph.evaluate_node(input)?;
                }
            }
            Traversal::Topological => {
                for &id in &self.order {
                    graph.compute_value(id)?;
                    graph.node_mut(id)?.evaluated = true;
                }
            }
        }
        graph.value(self.output)
    }

    /// Gradient of the output with respect to each input at `args`.
    ///
    /// Runs a forward pass first, then propagates derivatives back from the
    /// output. Derivatives of intermediate nodes are left in the graph and
    /// can be read with [`Graph::derivative`].
    pub fn differentiate(&self, graph: &mut Graph, args: &[f64]) -> Result<Vec<f64>, GraphError> {
        self.evaluate(graph, args)?;

        for &id in &self.nodes {
            let node = graph.node_mut(id)?;
            node.derivative = 0.0;
            node.differentiated_parents = false;
        }
        graph.node_mut(self.output)?.derivative = 1.0;

        match self.traversal {
            Traversal::Propagate => graph.differentiate_node(self.output)?,
            Traversal::Topological => {
                for &id in self.order.iter().rev() {
                    graph.push_partials(id)?;
                    graph.node_mut(id)?.differentiated_parents = true;
                }
            }
        }

        self.inputs
            .iter()
            .map(|&input| graph.derivative(input))
            .collect()
    }

    fn check_call(&self, graph: &Graph, args: &[f64]) -> Result<(), GraphError> {
        if graph.revision() != self.revision {
            return Err(GraphError::StaleFunction {
                built: self.revision,
                current: graph.revision(),
            });
        }
        if args.len() != self.inputs.len() {
            return Err(GraphError::ArgumentCount {
                expected: self.inputs.len(),
                actual: args.len(),
            });
        }
        Ok(())
    }
}

/// The one terminal node every input leads to.
fn find_output(graph: &Graph, inputs: &[NodeId]) -> Result<NodeId, GraphError> {
    let mut output: Option<NodeId> = None;
    for &input in inputs {
        let terminals = graph.terminal_nodes(input)?;
        let (first, rest) = terminals
            .split_first()
            .ok_or(GraphError::NoTerminalNode { node: input })?;
        if let Some(&second) = rest.first() {
            return Err(GraphError::MultipleTerminalNodes {
                first: *first,
                second,
            });
        }
        match output {
            None => output = Some(*first),
            Some(existing) if existing != *first => {
                return Err(GraphError::MultipleTerminalNodes {
                    first: existing,
                    second: *first,
                });
            }
            Some(_) => {}
        }
    }
    output.ok_or(GraphError::EmptyInputs)
}

/// The origins of the output must be exactly the inputs.
fn check_origins(origins: &[NodeId], inputs: &[NodeId]) -> Result<(), InputMismatch> {
    if origins.len() > inputs.len() {
        return Err(InputMismatch::MoreOrigins {
            origins: origins.len(),
            inputs: inputs.len(),
        });
    }
    if origins.len() < inputs.len() {
        return Err(InputMismatch::FewerOrigins {
            origins: origins.len(),
            inputs: inputs.len(),
        });
    }

    let mut seen = HashSet::new();
    for &input in inputs {
        if !seen.insert(input) {
            return Err(InputMismatch::DuplicateInput { node: input });
        }
    }
    match origins.iter().find(|origin| !seen.contains(*origin)) {
        Some(&node) => Err(InputMismatch::UnlistedOrigin { node }),
        None => Ok(()),
    }
}

/// Inputs followed by their descendants, without duplicates.
fn collect_nodes(graph: &Graph, inputs: &[NodeId]) -> Result<Vec<NodeId>, GraphError> {
    let mut nodes: Vec<NodeId> = inputs.to_vec();
    let mut seen: HashSet<NodeId> = inputs.iter().copied().collect();
    for &input in inputs {
        for descendant in graph.descendants(input)? {
            if seen.insert(descendant) {
                nodes.push(descendant);
            }
        }
    }
    Ok(nodes)
}

/// Parents-first order of `nodes`.
fn topological_order(graph: &Graph, nodes: &[NodeId]) -> Result<Vec<NodeId>, GraphError> {
    let mut dag: DiGraph<NodeId, ()> = DiGraph::with_capacity(nodes.len(), nodes.len());
    let indices: HashMap<NodeId, NodeIndex> =
        nodes.iter().map(|&id| (id, dag.add_node(id))).collect();

    for &id in nodes {
        let child = indices[&id];
        for parent in graph.node(id)?.parents() {
            if let Some(&parent) = indices.get(parent) {
                dag.add_edge(parent, child, ());
            }
        }
    }

    let order = toposort(&dag, None).map_err(|cycle| GraphError::SelfAncestor {
        node: dag[cycle.node_id()],
    })?;
    Ok(order.into_iter().map(|index| dag[index]).collect())
}
