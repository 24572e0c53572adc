//! adgraph - reverse-mode automatic differentiation over a scalar graph
//!
//! Build a directed acyclic graph of scalar operations, evaluate it for given
//! input values, and compute the gradient of its single output with respect
//! to every input.
//!
//! # Architecture
//!
//! ```text
//! Operation   stateless forward value + local partials
//!     ↑
//! Graph       arena of nodes (NodeId), constructors, rebinding,
//!             forward/backward propagation per node
//!     ↑
//! Function    validated inputs → single output, evaluate / differentiate
//! ```
//!
//! # Example
//!
//! ```
//! use adgraph::{Function, Graph};
//! use approx::assert_relative_eq;
//!
//! let mut g = Graph::new();
//! let x1 = g.input();
//! let x2 = g.input();
//!
//! // n = x1 * x2, out = ln(n) + x1
//! let prod = g.mul(x1, x2).unwrap();
//! let n = g.bind(prod).unwrap();
//! let log_n = g.ln(n).unwrap();
//! let _out = g.add(log_n, x1).unwrap();
//!
//! let f = Function::new(&g, &[x1, x2]).unwrap();
//! assert_relative_eq!(f.evaluate(&mut g, &[2.0, 3.0]).unwrap(), 6.0_f64.ln() + 2.0);
//!
//! let grad = f.differentiate(&mut g, &[2.0, 3.0]).unwrap();
//! assert_relative_eq!(grad[0], 0.5 + 1.0);
//! assert_relative_eq!(grad[1], 1.0 / 3.0);
//!
//! // Rebinding n changes every expression built on it.
//! let diff = g.sub(x1, x2).unwrap();
//! g.rebind(n, diff).unwrap();
//! let f = Function::new(&g, &[x1, x2]).unwrap();
//! assert_relative_eq!(f.evaluate(&mut g, &[5.0, 3.0]).unwrap(), 2.0_f64.ln() + 5.0);
//! ```

pub mod error;
pub mod function;
pub mod graph;
pub mod node;
pub mod operation;
mod ops;

pub use error::{ErrorCategory, GraphError, InputMismatch, OperationError};
pub use function::{Function, Traversal};
pub use graph::Graph;
pub use node::{Node, NodeId};
pub use operation::{Arity, ConstantSide, Operation};
