//! Integration tests for rebinding and removal.

use adgraph::{Function, Graph, GraphError, NodeId, Operation, OperationError, Traversal};
use approx::assert_relative_eq;

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[test]
fn test_rebind_preserves_downstream_users() {
    init_logger();
    let mut g = Graph::new();
    let x1 = g.input();
    let x2 = g.input();
    let x3 = g.input();

    let prod = g.mul(x1, x2).unwrap();
    let n1 = g.bind(prod).unwrap();
    let out = g.add(n1, x3).unwrap();

    let f = Function::new(&g, &[x1, x2, x3]).unwrap();
    assert_relative_eq!(f.evaluate(&mut g, &[2.0, 5.0, 1.0]).unwrap(), 11.0);

    let diff = g.sub(x1, x3).unwrap();
    g.rebind(n1, diff).unwrap();
    assert_eq!(g.node(out).unwrap().parents(), &[n1, x3]);
    assert_eq!(g.node(n1).unwrap().operation(), Some(&Operation::Subtract));
    // x2 only fed the old product; it is now a free leaf.
    assert!(g.node(x2).unwrap().is_terminal());
    assert_eq!(g.len(), 5);

    let f = Function::new(&g, &[x1, x3]).unwrap();
    assert_eq!(f.output(), out);
    assert_relative_eq!(f.evaluate(&mut g, &[2.0, 1.0]).unwrap(), 2.0);
    let grad = f.differentiate(&mut g, &[2.0, 1.0]).unwrap();
    assert_relative_eq!(grad[0], 1.0);
    assert_relative_eq!(grad[1], 0.0);
}

#[test]
fn test_cycle_rejected_and_graph_intact() {
    let mut g = Graph::new();
    let x = g.input();
    let y = g.input();
    let s = g.add(x, y).unwrap();
    let n = g.bind(s).unwrap();
    let sq = g.mul(n, n).unwrap();
    let out = g.bind(sq).unwrap();

    let f = Function::new(&g, &[x, y]).unwrap();
    let before = f.evaluate(&mut g, &[1.0, 2.0]).unwrap();

    let back = g.add_constant(out, 1.0).unwrap();
    assert_eq!(
        g.rebind(n, back).unwrap_err(),
        GraphError::SelfAncestor { node: n }
    );
    assert_eq!(g.rebind(n, out), Err(GraphError::SelfAncestor { node: n }));

    // Only the dangling `back` was added; dropping it restores the old graph.
    assert_eq!(g.remove(back).unwrap(), 1);
    let f = Function::new(&g, &[x, y]).unwrap();
    assert_eq!(f.evaluate(&mut g, &[1.0, 2.0]).unwrap(), before);
}

#[test]
fn test_compound_assignment_cycle_keeps_graph_and_function() {
    init_logger();
    let mut g = Graph::new();
    let x = g.input();
    let e = g.exp(x).unwrap();
    let n = g.bind(e).unwrap();
    let out = g.sin(n).unwrap();

    let f = Function::new(&g, &[x]).unwrap();
    let before = f.evaluate(&mut g, &[0.5]).unwrap();
    let (len, revision) = (g.len(), g.revision());

    let attempts: [fn(&mut Graph, NodeId, NodeId) -> Result<(), GraphError>; 4] = [
        Graph::add_assign,
        Graph::sub_assign,
        Graph::mul_assign,
        Graph::div_assign,
    ];
    for assign in attempts {
        assert_eq!(assign(&mut g, n, out), Err(GraphError::SelfAncestor { node: n }));
        assert_eq!(g.len(), len);
        assert_eq!(g.revision(), revision);
        assert!(g.contains(out));
        assert_eq!(g.node(n).unwrap().children(), &[out]);
        assert_eq!(g.node(x).unwrap().children(), &[n]);
    }

    // The function built before the failed calls is still valid.
    assert_eq!(f.output(), out);
    assert_eq!(f.evaluate(&mut g, &[0.5]).unwrap(), before);
    let grad = f.differentiate(&mut g, &[0.5]).unwrap();
    assert_relative_eq!(grad[0], 0.5_f64.exp().cos() * 0.5_f64.exp(), epsilon = 1e-12);
}

#[test]
fn test_failed_rebind_with_keeps_existing_operands() {
    let mut g = Graph::new();
    let x = g.input();
    let y = g.input();
    let e = g.exp(x).unwrap();
    let n = g.bind(e).unwrap();
    let t = g.sin(y).unwrap();
    let (len, revision) = (g.len(), g.revision());

    let err = g
        .rebind_with(n, |g, prev| {
            let s = g.add(prev, t)?;
            g.div_constant(s, 0.0)
        })
        .unwrap_err();
    assert_eq!(
        err,
        GraphError::InvalidOperation(OperationError::DivisionByZero)
    );
    assert_eq!(
        g.div_assign_constant(n, 0.0),
        Err(GraphError::InvalidOperation(OperationError::DivisionByZero))
    );

    assert_eq!(g.len(), len);
    assert_eq!(g.revision(), revision);
    assert!(g.contains(t));
    assert!(g.node(t).unwrap().is_terminal());
    assert_eq!(g.node(n).unwrap().operation(), Some(&Operation::Exp));

    let out = g.mul(n, t).unwrap();
    let f = Function::new(&g, &[x, y]).unwrap();
    assert_eq!(f.output(), out);
    assert_relative_eq!(
        f.evaluate(&mut g, &[1.0, 2.0]).unwrap(),
        1.0_f64.exp() * 2.0_f64.sin()
    );
}

#[test]
fn test_compound_assignment_accumulates() {
    let mut g = Graph::new();
    let x = g.input();
    let y = g.input();

    // acc = x; acc += y; acc *= x; acc -= 1; acc /= 2
    let acc = g.bind(x).unwrap();
    g.add_assign(acc, y).unwrap();
    g.mul_assign(acc, x).unwrap();
    g.sub_assign_constant(acc, 1.0).unwrap();
    g.div_assign_constant(acc, 2.0).unwrap();

    let f = Function::new(&g, &[x, y]).unwrap();
    assert_eq!(f.output(), acc);
    let (xv, yv) = (3.0, 4.0);
    assert_relative_eq!(
        f.evaluate(&mut g, &[xv, yv]).unwrap(),
        ((xv + yv) * xv - 1.0) / 2.0
    );
    let grad = f.differentiate(&mut g, &[xv, yv]).unwrap();
    assert_relative_eq!(grad[0], (2.0 * xv + yv) / 2.0);
    assert_relative_eq!(grad[1], xv / 2.0);
}

#[test]
fn test_compound_assignment_in_loop() {
    let mut g = Graph::new();
    let x = g.input();
    let total = g.mul_constant(x, 0.0).unwrap();
    let total = g.bind(total).unwrap();
    for k in 1..=4 {
        let term = g.powf(x, f64::from(k)).unwrap();
        g.add_assign(total, term).unwrap();
    }
    g.div_assign(total, x).unwrap();

    for traversal in [Traversal::Propagate, Traversal::Topological] {
        let f = Function::with_traversal(&g, &[x], traversal).unwrap();
        let xv: f64 = 1.5;
        let expected = 1.0 + xv + xv.powi(2) + xv.powi(3);
        assert_relative_eq!(f.evaluate(&mut g, &[xv]).unwrap(), expected, epsilon = 1e-12);
        let grad = f.differentiate(&mut g, &[xv]).unwrap();
        assert_relative_eq!(grad[0], 1.0 + 2.0 * xv + 3.0 * xv.powi(2), epsilon = 1e-12);
    }
}

#[test]
fn test_rebind_anonymous_operand_keeps_captured_value() {
    let mut g = Graph::new();
    let x = g.input();
    let y = g.input();
    let p = g.mul(x, y).unwrap();
    let out = g.add(p, y).unwrap();

    // p is anonymous and already used by `out`: out keeps x·y.
    let e = g.exp(x).unwrap();
    g.rebind(p, e).unwrap();
    assert!(g.node(out).unwrap().parents()[0] != p);

    // p is now a second terminal next to out.
    let err = Function::new(&g, &[x, y]).unwrap_err();
    assert!(matches!(err, GraphError::MultipleTerminalNodes { .. }));

    let named = g.bind(p).unwrap();
    assert_eq!(named, p);
    let sum = g.add(out, p).unwrap();
    let f = Function::new(&g, &[x, y]).unwrap();
    assert_eq!(f.output(), sum);
    assert_relative_eq!(
        f.evaluate(&mut g, &[1.0, 2.0]).unwrap(),
        1.0 * 2.0 + 2.0 + 1.0_f64.exp()
    );
}

#[test]
fn test_remove_detaches_and_collects() {
    let mut g = Graph::new();
    let x = g.input();
    let y = g.input();
    let ex = g.exp(x).unwrap();
    let branch = g.sin(ex).unwrap();
    let branch = g.bind(branch).unwrap();
    let other = g.mul(x, y).unwrap();
    let out = g.add(branch, other).unwrap();
    assert_eq!(g.len(), 6);

    assert_eq!(g.remove(branch).unwrap(), 2);
    assert!(!g.contains(branch));
    assert!(!g.contains(ex));
    assert_eq!(g.node(out).unwrap().parents(), &[other]);

    let f = Function::new(&g, &[x, y]).unwrap();
    assert_relative_eq!(f.evaluate(&mut g, &[2.0, 3.0]).unwrap(), 6.0);
    assert!(matches!(
        g.node(branch),
        Err(GraphError::UnknownNode { .. })
    ));
}

#[test]
fn test_function_goes_stale() {
    let mut g = Graph::new();
    let x = g.input();
    let e = g.exp(x).unwrap();
    let f = Function::new(&g, &[x]).unwrap();
    f.evaluate(&mut g, &[0.0]).unwrap();

    g.sin(e).unwrap();
    assert!(matches!(
        f.differentiate(&mut g, &[0.0]),
        Err(GraphError::StaleFunction { .. })
    ));
}
