//! Expression constructors.
//!
//! Every constructor allocates a new anonymous node applying one
//! [`Operation`] to existing nodes, and returns its id. Constants are folded
//! into the operation rather than materialized as nodes.
//!
//! # Example
//!
//! ```
//! use adgraph::{Function, Graph};
//!
//! let mut g = Graph::new();
//! let x = g.input();
//! let y = g.input();
//! let sum = g.add(x, y).unwrap();
//! let out = g.mul_constant(sum, 3.0).unwrap();
//!
//! let f = Function::new(&g, &[x, y]).unwrap();
//! assert_eq!(f.evaluate(&mut g, &[1.0, 2.0]).unwrap(), 9.0);
//! assert_eq!(g.value(out).unwrap(), 9.0);
//! ```

use crate::error::GraphError;
use crate::graph::Graph;
use crate::node::NodeId;
use crate::operation::{ConstantSide, Operation};

impl Graph {
    /// `a + b`
    pub fn add(&mut self, a: NodeId, b: NodeId) -> Result<NodeId, GraphError> {
        self.apply(Operation::add(0.0), &[a, b])
    }

    /// `constant + Σ terms`
    ///
    /// A single flat sum node rather than a chain of binary additions.
    pub fn add_all(&mut self, terms: &[NodeId], constant: f64) -> Result<NodeId, GraphError> {
        self.apply(Operation::add(constant), terms)
    }

    /// `a + constant`
    pub fn add_constant(&mut self, a: NodeId, constant: f64) -> Result<NodeId, GraphError> {
        self.apply(Operation::add(constant), &[a])
    }

    /// `a - b`
    pub fn sub(&mut self, a: NodeId, b: NodeId) -> Result<NodeId, GraphError> {
        self.apply(Operation::Subtract, &[a, b])
    }

    /// `a - constant`
    pub fn sub_constant(&mut self, a: NodeId, constant: f64) -> Result<NodeId, GraphError> {
        self.apply(
            Operation::subtract_constant(constant, ConstantSide::Right),
            &[a],
        )
    }

    /// `constant - a`
    pub fn constant_sub(&mut self, constant: f64, a: NodeId) -> Result<NodeId, GraphError> {
        self.apply(
            Operation::subtract_constant(constant, ConstantSide::Left),
            &[a],
        )
    }

    /// `a · b`
    pub fn mul(&mut self, a: NodeId, b: NodeId) -> Result<NodeId, GraphError> {
        self.apply(Operation::multiply(1.0), &[a, b])
    }

    /// `constant · Π factors`
    pub fn mul_all(&mut self, factors: &[NodeId], constant: f64) -> Result<NodeId, GraphError> {
        self.apply(Operation::multiply(constant), factors)
    }

    /// `constant · a`
    pub fn mul_constant(&mut self, a: NodeId, constant: f64) -> Result<NodeId, GraphError> {
        self.apply(Operation::multiply(constant), &[a])
    }

    /// `a / b`
    ///
    /// A zero denominator is only detected when the graph is evaluated.
    pub fn div(&mut self, a: NodeId, b: NodeId) -> Result<NodeId, GraphError> {
        self.apply(Operation::Divide, &[a, b])
    }

    /// `a / constant`; a zero constant is rejected immediately.
    ///
    /// ```
    /// use adgraph::{Graph, GraphError, OperationError};
    ///
    /// let mut g = Graph::new();
    /// let x = g.input();
    /// assert_eq!(
    ///     g.div_constant(x, 0.0),
    ///     Err(GraphError::InvalidOperation(OperationError::DivisionByZero))
    /// );
    /// ```
    pub fn div_constant(&mut self, a: NodeId, constant: f64) -> Result<NodeId, GraphError> {
        let operation = Operation::divide_constant(constant, ConstantSide::Right)?;
        self.apply(operation, &[a])
    }

    /// `constant / a`
    pub fn constant_div(&mut self, constant: f64, a: NodeId) -> Result<NodeId, GraphError> {
        let operation = Operation::divide_constant(constant, ConstantSide::Left)?;
        self.apply(operation, &[a])
    }

    /// Natural logarithm.
    pub fn ln(&mut self, a: NodeId) -> Result<NodeId, GraphError> {
        self.apply(Operation::ln(), &[a])
    }

    /// Logarithm in `base`.
    pub fn log(&mut self, a: NodeId, base: f64) -> Result<NodeId, GraphError> {
        let operation = Operation::log(base)?;
        self.apply(operation, &[a])
    }

    /// `e^a`
    pub fn exp(&mut self, a: NodeId) -> Result<NodeId, GraphError> {
        self.apply(Operation::Exp, &[a])
    }

    /// `base ^ exponent`, both nodes.
    pub fn pow(&mut self, base: NodeId, exponent: NodeId) -> Result<NodeId, GraphError> {
        self.apply(Operation::Power, &[base, exponent])
    }

    /// `a ^ exponent` for a constant exponent.
    pub fn powf(&mut self, a: NodeId, exponent: f64) -> Result<NodeId, GraphError> {
        self.apply(Operation::power_constant(exponent), &[a])
    }

    /// `base ^ a` for a positive constant base.
    pub fn constant_pow(&mut self, base: f64, a: NodeId) -> Result<NodeId, GraphError> {
        let operation = Operation::exp_constant_base(base)?;
        self.apply(operation, &[a])
    }

    /// `√a`
    pub fn sqrt(&mut self, a: NodeId) -> Result<NodeId, GraphError> {
        self.apply(Operation::Sqrt, &[a])
    }

    /// `sin(a)`
    pub fn sin(&mut self, a: NodeId) -> Result<NodeId, GraphError> {
        self.apply(Operation::Sin, &[a])
    }

    /// `cos(a)`
    pub fn cos(&mut self, a: NodeId) -> Result<NodeId, GraphError> {
        self.apply(Operation::Cos, &[a])
    }

    /// `-a`
    pub fn neg(&mut self, a: NodeId) -> Result<NodeId, GraphError> {
        self.apply(Operation::multiply(-1.0), &[a])
    }

    /// `node = node + rhs`
    pub fn add_assign(&mut self, node: NodeId, rhs: NodeId) -> Result<(), GraphError> {
        self.rebind_with(node, |g, prev| g.add(prev, rhs))
    }

    /// `node = node + constant`
    pub fn add_assign_constant(&mut self, node: NodeId, constant: f64) -> Result<(), GraphError> {
        self.rebind_with(node, |g, prev| g.add_constant(prev, constant))
    }

    /// `node = node - rhs`
    pub fn sub_assign(&mut self, node: NodeId, rhs: NodeId) -> Result<(), GraphError> {
        self.rebind_with(node, |g, prev| g.sub(prev, rhs))
    }

    /// `node = node - constant`
    pub fn sub_assign_constant(&mut self, node: NodeId, constant: f64) -> Result<(), GraphError> {
        self.rebind_with(node, |g, prev| g.sub_constant(prev, constant))
    }

    /// `node = node · rhs`
    pub fn mul_assign(&mut self, node: NodeId, rhs: NodeId) -> Result<(), GraphError> {
        self.rebind_with(node, |g, prev| g.mul(prev, rhs))
    }

    /// `node = node · constant`
    pub fn mul_assign_constant(&mut self, node: NodeId, constant: f64) -> Result<(), GraphError> {
        self.rebind_with(node, |g, prev| g.mul_constant(prev, constant))
    }

    /// `node = node / rhs`
    pub fn div_assign(&mut self, node: NodeId, rhs: NodeId) -> Result<(), GraphError> {
        self.rebind_with(node, |g, prev| g.div(prev, rhs))
    }

    /// `node = node / constant`
    pub fn div_assign_constant(&mut self, node: NodeId, constant: f64) -> Result<(), GraphError> {
        self.rebind_with(node, |g, prev| g.div_constant(prev, constant))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OperationError;

    #[test]
    fn test_constructors_pick_operations() {
        let mut g = Graph::new();
        let x = g.input();
        let y = g.input();

        let cases = [
            (g.add(x, y).unwrap(), Operation::add(0.0)),
            (g.sub_constant(x, 2.0).unwrap(), Operation::subtract_constant(2.0, ConstantSide::Right)),
            (g.constant_sub(2.0, x).unwrap(), Operation::subtract_constant(2.0, ConstantSide::Left)),
            (g.mul_constant(x, 3.0).unwrap(), Operation::multiply(3.0)),
            (g.neg(x).unwrap(), Operation::multiply(-1.0)),
            (g.powf(x, 2.5).unwrap(), Operation::power_constant(2.5)),
            (g.ln(x).unwrap(), Operation::Log { base: None }),
            (g.log(x, 10.0).unwrap(), Operation::Log { base: Some(10.0) }),
        ];
        for (id, expected) in cases {
            assert_eq!(g.node(id).unwrap().operation(), Some(&expected));
            assert!(g.node(id).unwrap().is_anonymous());
        }
    }

    #[test]
    fn test_variadic_constructors() {
        let mut g = Graph::new();
        let xs: Vec<NodeId> = (0..4).map(|_| g.input()).collect();
        let sum = g.add_all(&xs, 1.0).unwrap();
        assert_eq!(g.node(sum).unwrap().parents(), xs.as_slice());
        let prod = g.mul_all(&xs[..2], 2.0).unwrap();
        assert_eq!(g.node(prod).unwrap().parents(), &xs[..2]);

        assert!(matches!(
            g.add_all(&[], 0.0),
            Err(GraphError::InvalidOperation(OperationError::OperandCount { actual: 0, .. }))
        ));
    }

    #[test]
    fn test_invalid_constants_rejected() {
        let mut g = Graph::new();
        let x = g.input();
        assert_eq!(
            g.div_constant(x, 0.0).unwrap_err(),
            GraphError::InvalidOperation(OperationError::DivisionByZero)
        );
        assert!(matches!(
            g.log(x, 1.0),
            Err(GraphError::InvalidOperation(OperationError::InvalidLogBase { .. }))
        ));
        assert!(matches!(
            g.constant_pow(-2.0, x),
            Err(GraphError::InvalidOperation(OperationError::InvalidPowerBase { .. }))
        ));
        // constant / x is fine to build even though x may be zero later
        assert!(g.constant_div(0.0, x).is_ok());
        assert_eq!(g.len(), 2);
    }

    #[test]
    fn test_compound_assign_uses_previous_definition() {
        let mut g = Graph::new();
        let x = g.input();
        let y = g.input();
        let s = g.add(x, y).unwrap();
        let n = g.bind(s).unwrap();

        g.mul_assign_constant(n, 2.0).unwrap();
        assert_eq!(g.node(n).unwrap().operation(), Some(&Operation::multiply(2.0)));
        let prev = g.node(n).unwrap().parents()[0];
        assert_eq!(g.node(prev).unwrap().operation(), Some(&Operation::add(0.0)));
        assert_eq!(g.node(prev).unwrap().parents(), &[x, y]);

        g.sub_assign(n, x).unwrap();
        assert_eq!(g.node(n).unwrap().operation(), Some(&Operation::Subtract));
        assert_eq!(g.node(n).unwrap().parents()[1], x);
    }

    #[test]
    fn test_div_assign_constant_zero_leaves_node() {
        let mut g = Graph::new();
        let x = g.input();
        let e = g.exp(x).unwrap();
        let n = g.bind(e).unwrap();
        let len = g.len();
        assert!(g.div_assign_constant(n, 0.0).is_err());
        assert_eq!(g.len(), len);
        assert_eq!(g.node(n).unwrap().operation(), Some(&Operation::Exp));
    }
}
