//! C API for adgraph
//!
//! This crate provides a C-compatible interface to the adgraph library, so
//! graphs can be built and differentiated from C, Julia, Python and other
//! languages.
//!
//! Graphs and functions are opaque heap handles. Nodes are plain indices
//! (`adg_node`) into their graph. Every entry point returns or writes a
//! status code and catches panics at the boundary.
//!
//! All extern "C" functions work with raw pointers from foreign code. The
//! `#[unsafe(no_mangle)]` attribute marks the entire function signature as
//! unsafe at the FFI boundary.

#![allow(clippy::not_unsafe_ptr_arg_deref)]
#![allow(non_camel_case_types)]

use adgraph::{ErrorCategory, Function, Graph, GraphError, NodeId, Traversal};
use libc::{c_double, c_int, size_t};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::ptr;

// Status codes
pub type StatusCode = c_int;

pub const ADG_SUCCESS: StatusCode = 0;
pub const ADG_INVALID_ARGUMENT: StatusCode = -1;
pub const ADG_GRAPH_SHAPE: StatusCode = -2;
pub const ADG_ARITY: StatusCode = -3;
pub const ADG_DOMAIN: StatusCode = -4;
pub const ADG_STALE_FUNCTION: StatusCode = -5;
pub const ADG_INTERNAL_ERROR: StatusCode = -6;

// Traversal selectors for `adg_function_new`
pub const ADG_TRAVERSAL_PROPAGATE: c_int = 0;
pub const ADG_TRAVERSAL_TOPOLOGICAL: c_int = 1;

/// Node index within a graph.
pub type adg_node = size_t;

/// Opaque computation graph.
pub struct adg_graph {
    inner: Graph,
}

/// Opaque validated function over a graph.
pub struct adg_function {
    inner: Function,
}

fn status_of(err: &GraphError) -> StatusCode {
    match err {
        GraphError::UnknownNode { .. } => ADG_INVALID_ARGUMENT,
        GraphError::StaleFunction { .. } => ADG_STALE_FUNCTION,
        _ => match err.category() {
            ErrorCategory::GraphShape => ADG_GRAPH_SHAPE,
            ErrorCategory::Arity => ADG_ARITY,
            ErrorCategory::NumericDomain => ADG_DOMAIN,
        },
    }
}

fn guard<F>(body: F) -> StatusCode
where
    F: FnOnce() -> StatusCode,
{
    catch_unwind(AssertUnwindSafe(body)).unwrap_or(ADG_INTERNAL_ERROR)
}

/// Run a node constructor and write the new node index to `out`.
fn build_node<F>(graph: *mut adg_graph, out: *mut adg_node, build: F) -> StatusCode
where
    F: FnOnce(&mut Graph) -> Result<NodeId, GraphError>,
{
    if graph.is_null() || out.is_null() {
        return ADG_INVALID_ARGUMENT;
    }
    guard(|| {
        let graph = unsafe { &mut (*graph).inner };
        match build(graph) {
            Ok(id) => {
                unsafe {
                    *out = id.index();
                }
                ADG_SUCCESS
            }
            Err(err) => status_of(&err),
        }
    })
}

/// Run a graph mutation that produces no node.
fn update_graph<F>(graph: *mut adg_graph, update: F) -> StatusCode
where
    F: FnOnce(&mut Graph) -> Result<(), GraphError>,
{
    if graph.is_null() {
        return ADG_INVALID_ARGUMENT;
    }
    guard(|| {
        let graph = unsafe { &mut (*graph).inner };
        match update(graph) {
            Ok(()) => ADG_SUCCESS,
            Err(err) => status_of(&err),
        }
    })
}

fn node(index: adg_node) -> NodeId {
    NodeId::from_index(index)
}

// ============================================================================
// Graph lifecycle functions
// ============================================================================

/// Create an empty graph.
///
/// # Returns
/// Pointer to the new graph, or null if allocation panicked
#[unsafe(no_mangle)]
pub extern "C" fn adg_graph_new() -> *mut adg_graph {
    catch_unwind(|| Box::into_raw(Box::new(adg_graph { inner: Graph::new() })))
        .unwrap_or(ptr::null_mut())
}

/// Release (free) a graph.
///
/// Functions built on the graph stay allocated and must be released
/// separately.
#[unsafe(no_mangle)]
pub extern "C" fn adg_graph_release(graph: *mut adg_graph) {
    if !graph.is_null() {
        unsafe {
            let _ = Box::from_raw(graph);
        }
    }
}

/// Number of live nodes.
#[unsafe(no_mangle)]
pub extern "C" fn adg_graph_len(graph: *const adg_graph) -> size_t {
    if graph.is_null() {
        return 0;
    }
    catch_unwind(AssertUnwindSafe(|| unsafe { (*graph).inner.len() })).unwrap_or(0)
}

// ============================================================================
// Node construction
// ============================================================================

/// Create an input node.
#[unsafe(no_mangle)]
pub extern "C" fn adg_graph_input(graph: *mut adg_graph, out: *mut adg_node) -> StatusCode {
    build_node(graph, out, |g| Ok(g.input()))
}

/// `out = a + b`
#[unsafe(no_mangle)]
pub extern "C" fn adg_graph_add(
    graph: *mut adg_graph,
    a: adg_node,
    b: adg_node,
    out: *mut adg_node,
) -> StatusCode {
    build_node(graph, out, |g| g.add(node(a), node(b)))
}

/// `out = constant + Σ terms`
///
/// # Arguments
/// * `terms` - Pointer to `len` node indices
#[unsafe(no_mangle)]
pub extern "C" fn adg_graph_add_all(
    graph: *mut adg_graph,
    terms: *const adg_node,
    len: size_t,
    constant: c_double,
    out: *mut adg_node,
) -> StatusCode {
    if terms.is_null() && len > 0 {
        return ADG_INVALID_ARGUMENT;
    }
    build_node(graph, out, |g| {
        let terms: Vec<NodeId> = if len == 0 {
            Vec::new()
        } else {
            unsafe { std::slice::from_raw_parts(terms, len) }
                .iter()
                .map(|&index| node(index))
                .collect()
        };
        g.add_all(&terms, constant)
    })
}

/// `out = a + constant`
#[unsafe(no_mangle)]
pub extern "C" fn adg_graph_add_constant(
    graph: *mut adg_graph,
    a: adg_node,
    constant: c_double,
    out: *mut adg_node,
) -> StatusCode {
    build_node(graph, out, |g| g.add_constant(node(a), constant))
}

/// `out = a - b`
#[unsafe(no_mangle)]
pub extern "C" fn adg_graph_sub(
    graph: *mut adg_graph,
    a: adg_node,
    b: adg_node,
    out: *mut adg_node,
) -> StatusCode {
    build_node(graph, out, |g| g.sub(node(a), node(b)))
}

/// `out = a - constant`
#[unsafe(no_mangle)]
pub extern "C" fn adg_graph_sub_constant(
    graph: *mut adg_graph,
    a: adg_node,
    constant: c_double,
    out: *mut adg_node,
) -> StatusCode {
    build_node(graph, out, |g| g.sub_constant(node(a), constant))
}

/// `out = constant - a`
#[unsafe(no_mangle)]
pub extern "C" fn adg_graph_constant_sub(
    graph: *mut adg_graph,
    constant: c_double,
    a: adg_node,
    out: *mut adg_node,
) -> StatusCode {
    build_node(graph, out, |g| g.constant_sub(constant, node(a)))
}

/// `out = a · b`
#[unsafe(no_mangle)]
pub extern "C" fn adg_graph_mul(
    graph: *mut adg_graph,
    a: adg_node,
    b: adg_node,
    out: *mut adg_node,
) -> StatusCode {
    build_node(graph, out, |g| g.mul(node(a), node(b)))
}

/// `out = constant · a`
#[unsafe(no_mangle)]
pub extern "C" fn adg_graph_mul_constant(
    graph: *mut adg_graph,
    a: adg_node,
    constant: c_double,
    out: *mut adg_node,
) -> StatusCode {
    build_node(graph, out, |g| g.mul_constant(node(a), constant))
}

/// `out = a / b`
#[unsafe(no_mangle)]
pub extern "C" fn adg_graph_div(
    graph: *mut adg_graph,
    a: adg_node,
    b: adg_node,
    out: *mut adg_node,
) -> StatusCode {
    build_node(graph, out, |g| g.div(node(a), node(b)))
}

/// `out = a / constant`; a zero constant yields `ADG_DOMAIN`.
#[unsafe(no_mangle)]
pub extern "C" fn adg_graph_div_constant(
    graph: *mut adg_graph,
    a: adg_node,
    constant: c_double,
    out: *mut adg_node,
) -> StatusCode {
    build_node(graph, out, |g| g.div_constant(node(a), constant))
}

/// `out = constant / a`
#[unsafe(no_mangle)]
pub extern "C" fn adg_graph_constant_div(
    graph: *mut adg_graph,
    constant: c_double,
    a: adg_node,
    out: *mut adg_node,
) -> StatusCode {
    build_node(graph, out, |g| g.constant_div(constant, node(a)))
}

/// `out = base ^ exponent`
#[unsafe(no_mangle)]
pub extern "C" fn adg_graph_pow(
    graph: *mut adg_graph,
    base: adg_node,
    exponent: adg_node,
    out: *mut adg_node,
) -> StatusCode {
    build_node(graph, out, |g| g.pow(node(base), node(exponent)))
}

/// `out = a ^ exponent`
#[unsafe(no_mangle)]
pub extern "C" fn adg_graph_powf(
    graph: *mut adg_graph,
    a: adg_node,
    exponent: c_double,
    out: *mut adg_node,
) -> StatusCode {
    build_node(graph, out, |g| g.powf(node(a), exponent))
}

/// `out = base ^ a`
#[unsafe(no_mangle)]
pub extern "C" fn adg_graph_constant_pow(
    graph: *mut adg_graph,
    base: c_double,
    a: adg_node,
    out: *mut adg_node,
) -> StatusCode {
    build_node(graph, out, |g| g.constant_pow(base, node(a)))
}

/// `out = log_base(a)`
#[unsafe(no_mangle)]
pub extern "C" fn adg_graph_log(
    graph: *mut adg_graph,
    a: adg_node,
    base: c_double,
    out: *mut adg_node,
) -> StatusCode {
    build_node(graph, out, |g| g.log(node(a), base))
}

#[unsafe(no_mangle)]
pub extern "C" fn adg_graph_ln(graph: *mut adg_graph, a: adg_node, out: *mut adg_node) -> StatusCode {
    build_node(graph, out, |g| g.ln(node(a)))
}

#[unsafe(no_mangle)]
pub extern "C" fn adg_graph_exp(graph: *mut adg_graph, a: adg_node, out: *mut adg_node) -> StatusCode {
    build_node(graph, out, |g| g.exp(node(a)))
}

#[unsafe(no_mangle)]
pub extern "C" fn adg_graph_sqrt(graph: *mut adg_graph, a: adg_node, out: *mut adg_node) -> StatusCode {
    build_node(graph, out, |g| g.sqrt(node(a)))
}

#[unsafe(no_mangle)]
pub extern "C" fn adg_graph_sin(graph: *mut adg_graph, a: adg_node, out: *mut adg_node) -> StatusCode {
    build_node(graph, out, |g| g.sin(node(a)))
}

#[unsafe(no_mangle)]
pub extern "C" fn adg_graph_cos(graph: *mut adg_graph, a: adg_node, out: *mut adg_node) -> StatusCode {
    build_node(graph, out, |g| g.cos(node(a)))
}

#[unsafe(no_mangle)]
pub extern "C" fn adg_graph_neg(graph: *mut adg_graph, a: adg_node, out: *mut adg_node) -> StatusCode {
    build_node(graph, out, |g| g.neg(node(a)))
}

// ============================================================================
// Naming, rebinding and removal
// ============================================================================

/// Give `expr` a caller-owned name; the named node is written to `out`.
#[unsafe(no_mangle)]
pub extern "C" fn adg_graph_bind(
    graph: *mut adg_graph,
    expr: adg_node,
    out: *mut adg_node,
) -> StatusCode {
    build_node(graph, out, |g| g.bind(node(expr)))
}

/// Redirect `target` to denote `expr`.
///
/// # Returns
/// `ADG_GRAPH_SHAPE` if `expr` depends on `target`; the graph is unchanged
#[unsafe(no_mangle)]
pub extern "C" fn adg_graph_rebind(
    graph: *mut adg_graph,
    target: adg_node,
    expr: adg_node,
) -> StatusCode {
    update_graph(graph, |g| g.rebind(node(target), node(expr)))
}

/// Remove a node and any anonymous operands left unused.
///
/// # Arguments
/// * `removed` - Optional pointer receiving the number of removed nodes
#[unsafe(no_mangle)]
pub extern "C" fn adg_graph_remove(
    graph: *mut adg_graph,
    target: adg_node,
    removed: *mut size_t,
) -> StatusCode {
    update_graph(graph, |g| {
        let count = g.remove(node(target))?;
        if !removed.is_null() {
            unsafe {
                *removed = count;
            }
        }
        Ok(())
    })
}

// ============================================================================
// Node queries
// ============================================================================

/// Last computed value of a node.
#[unsafe(no_mangle)]
pub extern "C" fn adg_graph_value(
    graph: *const adg_graph,
    target: adg_node,
    out: *mut c_double,
) -> StatusCode {
    if graph.is_null() || out.is_null() {
        return ADG_INVALID_ARGUMENT;
    }
    guard(|| match unsafe { (*graph).inner.value(node(target)) } {
        Ok(value) => {
            unsafe {
                *out = value;
            }
            ADG_SUCCESS
        }
        Err(err) => status_of(&err),
    })
}

/// Derivative accumulated in a node by the last differentiation.
#[unsafe(no_mangle)]
pub extern "C" fn adg_graph_derivative(
    graph: *const adg_graph,
    target: adg_node,
    out: *mut c_double,
) -> StatusCode {
    if graph.is_null() || out.is_null() {
        return ADG_INVALID_ARGUMENT;
    }
    guard(|| match unsafe { (*graph).inner.derivative(node(target)) } {
        Ok(derivative) => {
            unsafe {
                *out = derivative;
            }
            ADG_SUCCESS
        }
        Err(err) => status_of(&err),
    })
}

// ============================================================================
// Functions
// ============================================================================

/// Validate `inputs` and build a function over `graph`.
///
/// # Arguments
/// * `graph` - Graph the inputs belong to
/// * `inputs` - Pointer to `len` input node indices, in argument order
/// * `traversal` - `ADG_TRAVERSAL_PROPAGATE` or `ADG_TRAVERSAL_TOPOLOGICAL`
/// * `status` - Pointer to receive status code
///
/// # Returns
/// Pointer to new function, or null on error
#[unsafe(no_mangle)]
pub extern "C" fn adg_function_new(
    graph: *const adg_graph,
    inputs: *const adg_node,
    len: size_t,
    traversal: c_int,
    status: *mut StatusCode,
) -> *mut adg_function {
    if status.is_null() {
        return ptr::null_mut();
    }

    let traversal = match traversal {
        ADG_TRAVERSAL_PROPAGATE => Some(Traversal::Propagate),
        ADG_TRAVERSAL_TOPOLOGICAL => Some(Traversal::Topological),
        _ => None,
    };
    let Some(traversal) = traversal.filter(|_| !graph.is_null() && (!inputs.is_null() || len == 0))
    else {
        unsafe {
            *status = ADG_INVALID_ARGUMENT;
        }
        return ptr::null_mut();
    };

    let result = catch_unwind(AssertUnwindSafe(|| {
        let inputs: Vec<NodeId> = if len == 0 {
            Vec::new()
        } else {
            unsafe { std::slice::from_raw_parts(inputs, len) }
                .iter()
                .map(|&index| node(index))
                .collect()
        };
        let graph = unsafe { &(*graph).inner };
        match Function::with_traversal(graph, &inputs, traversal) {
            Ok(function) => (
                Box::into_raw(Box::new(adg_function { inner: function })),
                ADG_SUCCESS,
            ),
            Err(err) => (ptr::null_mut(), status_of(&err)),
        }
    }));

    let (function, code) = result.unwrap_or((ptr::null_mut(), ADG_INTERNAL_ERROR));
    unsafe {
        *status = code;
    }
    function
}

/// Release (free) a function.
#[unsafe(no_mangle)]
pub extern "C" fn adg_function_release(function: *mut adg_function) {
    if !function.is_null() {
        unsafe {
            let _ = Box::from_raw(function);
        }
    }
}

/// Number of nodes reachable from the function's inputs.
#[unsafe(no_mangle)]
pub extern "C" fn adg_function_node_count(function: *const adg_function) -> size_t {
    if function.is_null() {
        return 0;
    }
    catch_unwind(AssertUnwindSafe(|| unsafe { (*function).inner.node_count() })).unwrap_or(0)
}

/// Evaluate a function.
///
/// # Arguments
/// * `args` - Pointer to `nargs` argument values
/// * `out` - Pointer receiving the output value
#[unsafe(no_mangle)]
pub extern "C" fn adg_function_evaluate(
    function: *const adg_function,
    graph: *mut adg_graph,
    args: *const c_double,
    nargs: size_t,
    out: *mut c_double,
) -> StatusCode {
    if function.is_null() || graph.is_null() || out.is_null() || (args.is_null() && nargs > 0) {
        return ADG_INVALID_ARGUMENT;
    }
    guard(|| {
        let function = unsafe { &(*function).inner };
        let graph = unsafe { &mut (*graph).inner };
        let args: &[f64] = if nargs == 0 {
            &[]
        } else {
            unsafe { std::slice::from_raw_parts(args, nargs) }
        };
        match function.evaluate(graph, args) {
            Ok(value) => {
                unsafe {
                    *out = value;
                }
                ADG_SUCCESS
            }
            Err(err) => status_of(&err),
        }
    })
}

/// Differentiate a function.
///
/// # Arguments
/// * `args` - Pointer to `nargs` argument values
/// * `gradient` - Output array with space for `nargs` values
#[unsafe(no_mangle)]
pub extern "C" fn adg_function_differentiate(
    function: *const adg_function,
    graph: *mut adg_graph,
    args: *const c_double,
    nargs: size_t,
    gradient: *mut c_double,
) -> StatusCode {
    if function.is_null()
        || graph.is_null()
        || ((args.is_null() || gradient.is_null()) && nargs > 0)
    {
        return ADG_INVALID_ARGUMENT;
    }
    guard(|| {
        let function = unsafe { &(*function).inner };
        let graph = unsafe { &mut (*graph).inner };
        let args: &[f64] = if nargs == 0 {
            &[]
        } else {
            unsafe { std::slice::from_raw_parts(args, nargs) }
        };
        match function.differentiate(graph, args) {
            Ok(values) => {
                for (i, value) in values.into_iter().enumerate() {
                    unsafe {
                        *gradient.add(i) = value;
                    }
                }
                ADG_SUCCESS
            }
            Err(err) => status_of(&err),
        }
    })
}
