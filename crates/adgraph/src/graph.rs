//! Arena-backed computation graph.
//!
//! Nodes are stored in a `Vec` of slots and addressed by [`NodeId`]. Edges are
//! kept on both ends: a node lists its operands as `parents` and every node
//! that consumes it as `children`. Slots are never reused, so a removed id
//! stays invalid instead of aliasing a newer node.
//!
//! # Ownership
//!
//! Nodes created by expression constructors (`add`, `mul`, ...) are
//! *anonymous*. Nodes created with [`Graph::input`] or named with
//! [`Graph::bind`] are owned by the caller. An anonymous node lives as long
//! as something consumes it; once it has no children left (after a
//! [`rebind`](Graph::rebind) or [`remove`](Graph::remove)) it is collected,
//! and the collection cascades to its own anonymous parents.

use crate::error::GraphError;
use crate::node::{Node, NodeId, Parents};
use crate::operation::Operation;
use smallvec::SmallVec;
use std::collections::HashSet;
use std::fmt;

/// A computation graph of scalar operations.
#[derive(Clone, Default)]
pub struct Graph {
    nodes: Vec<Option<Node>>,
    live: usize,
    revision: u64,
}

impl Graph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live nodes.
    pub fn len(&self) -> usize {
        self.live
    }

    /// Check if the graph has no live nodes.
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Structural revision; bumped by every node creation, rebind and removal.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Whether `id` refers to a live node.
    pub fn contains(&self, id: NodeId) -> bool {
        self.slot(id).is_some()
    }

    /// Get node by ID.
    pub fn node(&self, id: NodeId) -> Result<&Node, GraphError> {
        self.slot(id).ok_or(GraphError::UnknownNode { node: id })
    }

    /// Ids of all live nodes, in creation order.
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.is_some())
            .map(|(index, _)| NodeId::from_index(index))
    }

    /// Last computed value of a node.
    pub fn value(&self, id: NodeId) -> Result<f64, GraphError> {
        Ok(self.node(id)?.value)
    }

    /// Derivative accumulated in a node by the last backward pass.
    pub fn derivative(&self, id: NodeId) -> Result<f64, GraphError> {
        Ok(self.node(id)?.derivative)
    }

    /// Create an input (leaf) node owned by the caller.
    pub fn input(&mut self) -> NodeId {
        self.push(Node::leaf())
    }

    /// Create an anonymous node applying `operation` to `parents`.
    ///
    /// The operand count is checked against the operation's arity.
    pub fn apply(&mut self, operation: Operation, parents: &[NodeId]) -> Result<NodeId, GraphError> {
        for &parent in parents {
            self.node(parent)?;
        }
        operation.check_operands(parents.len())?;

        let id = self.push(Node::computed(operation, true));
        for &parent in parents {
            self.link(id, parent);
        }
        log::trace!("{} = {}{:?}", id, operation.name(), parents);
        Ok(id)
    }

    /// Give `expr` a caller-owned name.
    ///
    /// An anonymous intermediate that nothing else consumes is adopted and
    /// returned as is. Otherwise a new named node inheriting from `expr` is
    /// created.
    pub fn bind(&mut self, expr: NodeId) -> Result<NodeId, GraphError> {
        let node = self.node(expr)?;
        if node.anonymous && node.children.is_empty() {
            self.node_mut(expr)?.anonymous = false;
            self.revision += 1;
            return Ok(expr);
        }
        let id = self.push(Node::computed(Operation::Inherit, false));
        self.link(id, expr);
        Ok(id)
    }

    /// Redirect `node` to denote `expr` while keeping its id.
    ///
    /// - A named node keeps its children, so downstream expressions see the
    ///   new definition. If `expr` depends on `node` this would close a
    ///   cycle and fails with [`GraphError::SelfAncestor`] without touching
    ///   the graph.
    /// - An anonymous node that is already consumed elsewhere first hands its
    ///   old definition and all its edges to a fresh anonymous copy, so those
    ///   consumers keep the value they captured.
    /// - If `expr` is an anonymous intermediate with no other consumer, its
    ///   operation and operands are absorbed into `node`; otherwise `node`
    ///   becomes an `Inherit` of `expr`.
    /// - Anonymous operands left without consumers are collected.
    pub fn rebind(&mut self, node: NodeId, expr: NodeId) -> Result<(), GraphError> {
        let target = self.node(node)?;
        self.node(expr)?;
        if node == expr {
            return Ok(());
        }

        let detach = target.anonymous && !target.children.is_empty();
        if !detach && self.is_ancestor(expr, node)? {
            return Err(GraphError::SelfAncestor { node });
        }

        if detach {
            let copy = self.split_off(node)?;
            log::debug!("rebind {}: previous definition moved to {}", node, copy);
        }
        let old_parents = self.unlink_parents(node)?;

        let source = self.node(expr)?;
        if source.anonymous && source.children.is_empty() {
            let absorbed = self.vacate(expr)?;
            for &parent in unique(&absorbed.parents).iter() {
                self.node_mut(parent)?.replace_child(expr, node);
            }
            let target = self.node_mut(node)?;
            target.operation = absorbed.operation;
            target.parents = absorbed.parents;
            log::debug!("rebind {}: absorbed {}", node, expr);
        } else {
            self.node_mut(node)?.operation = Some(Operation::Inherit);
            self.link(node, expr);
            log::debug!("rebind {}: inherits from {}", node, expr);
        }

        let collected = self.collect(old_parents.into_vec());
        if collected > 0 {
            log::debug!("rebind {}: collected {} orphaned node(s)", node, collected);
        }
        self.revision += 1;
        debug_assert!(!matches!(self.is_ancestor(node, node), Ok(true)));
        Ok(())
    }

    /// Rebind `node` to an expression built from its own previous definition.
    ///
    /// `build` receives an anonymous snapshot of the node's current
    /// definition and returns the replacement expression. This is the
    /// `n = n + expr` idiom: the snapshot, not `node`, must be used on the
    /// right-hand side. On failure the node is left unchanged and the
    /// snapshot and any orphaned nodes `build` created are collected. Nodes
    /// that existed before the call are never collected, and the revision is
    /// restored when nothing created by the call survives.
    pub fn rebind_with<F>(&mut self, node: NodeId, build: F) -> Result<(), GraphError>
    where
        F: FnOnce(&mut Graph, NodeId) -> Result<NodeId, GraphError>,
    {
        let first_new = self.nodes.len();
        let revision = self.revision;
        let previous = self.snapshot(node)?;
        let result = build(self, previous).and_then(|expr| self.rebind(node, expr));
        if let Err(err) = &result {
            let created: Vec<NodeId> = (first_new..self.nodes.len())
                .map(NodeId::from_index)
                .filter(|id| self.contains(*id))
                .collect();
            let collected = self.collect_above(created, first_new);
            if self.nodes[first_new..].iter().all(Option::is_none) {
                self.revision = revision;
            }
            log::debug!("rebind {} failed ({}): rolled back {} node(s)", node, err, collected);
        }
        result
    }

    /// Remove a node from the graph.
    ///
    /// The node is unlinked from all parents and children. Surviving
    /// children lose that operand. Anonymous parents left without consumers
    /// are removed too, recursively. Returns the number of removed nodes.
    pub fn remove(&mut self, node: NodeId) -> Result<usize, GraphError> {
        let removed = self.vacate(node)?;
        for &child in unique(&removed.children).iter() {
            self.node_mut(child)?.drop_parent(node);
        }
        for &parent in unique(&removed.parents).iter() {
            self.node_mut(parent)?.drop_child(node);
        }
        let count = 1 + self.collect(removed.parents.into_vec());
        self.revision += 1;
        log::debug!("removed {} and {} orphaned node(s)", node, count - 1);
        Ok(count)
    }

    /// All nodes reachable from `id` through children, without duplicates.
    pub fn descendants(&self, id: NodeId) -> Result<Vec<NodeId>, GraphError> {
        let mut found = Vec::new();
        let mut seen = HashSet::new();
        let mut stack: Vec<NodeId> = self.node(id)?.children.iter().rev().copied().collect();
        while let Some(current) = stack.pop() {
            if !seen.insert(current) {
                continue;
            }
            found.push(current);
            stack.extend(self.node(current)?.children.iter().rev());
        }
        Ok(found)
    }

    /// Childless nodes reachable from `id` (`[id]` itself if it has no children).
    pub fn terminal_nodes(&self, id: NodeId) -> Result<Vec<NodeId>, GraphError> {
        self.reachable_ends(id, |node| node.children.as_slice())
    }

    /// Parentless nodes reachable from `id` (`[id]` itself if it has no parents).
    pub fn origin_nodes(&self, id: NodeId) -> Result<Vec<NodeId>, GraphError> {
        self.reachable_ends(id, |node| node.parents.as_slice())
    }

    /// Whether `target` can be reached from `id` by following parent edges.
    pub fn is_ancestor(&self, id: NodeId, target: NodeId) -> Result<bool, GraphError> {
        self.node(target)?;
        let mut seen = HashSet::new();
        let mut stack: Vec<NodeId> = self.node(id)?.parents.to_vec();
        while let Some(current) = stack.pop() {
            if current == target {
                return Ok(true);
            }
            if seen.insert(current) {
                stack.extend(self.node(current)?.parents.iter());
            }
        }
        Ok(false)
    }

    /// Forward step seeded at `start`.
    ///
    /// A node is computed only once all its parents are evaluated; after
    /// computing it every child is visited. Nodes whose parents are not
    /// ready are skipped and picked up again when the last parent finishes,
    /// so seeding every input evaluates the whole reachable graph.
    pub fn evaluate_node(&mut self, start: NodeId) -> Result<(), GraphError> {
        let mut stack = vec![start];
        while let Some(id) = stack.pop() {
            let node = self.node(id)?;
            if node.evaluated || !self.all_evaluated(&node.parents) {
                continue;
            }
            self.compute_value(id)?;
            let node = self.node_mut(id)?;
            node.evaluated = true;
            stack.extend(node.children.iter().rev());
        }
        Ok(())
    }

    /// Backward step seeded at `start`.
    ///
    /// A node pushes `partial × derivative` into its parents only after every
    /// child has done the same for it, so contributions from all downstream
    /// paths are summed before they travel further up.
    pub fn differentiate_node(&mut self, start: NodeId) -> Result<(), GraphError> {
        let mut stack = vec![start];
        while let Some(id) = stack.pop() {
            let node = self.node(id)?;
            if node.differentiated_parents || !self.all_differentiated(&node.children) {
                continue;
            }
            self.push_partials(id)?;
            let node = self.node_mut(id)?;
            node.differentiated_parents = true;
            stack.extend(node.parents.iter().rev());
        }
        Ok(())
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> Result<&mut Node, GraphError> {
        self.nodes
            .get_mut(id.index())
            .and_then(Option::as_mut)
            .ok_or(GraphError::UnknownNode { node: id })
    }

    /// Compute a node's value from its parents (leaves keep their value).
    pub(crate) fn compute_value(&mut self, id: NodeId) -> Result<(), GraphError> {
        let node = self.node(id)?;
        let Some(operation) = node.operation else {
            return Ok(());
        };
        let operands = self.operand_values(&node.parents)?;
        let value = operation
            .evaluate(&operands)
            .map_err(|err| GraphError::at(id, err))?;
        self.node_mut(id)?.value = value;
        Ok(())
    }

    /// Add this node's contribution to each parent's derivative.
    pub(crate) fn push_partials(&mut self, id: NodeId) -> Result<(), GraphError> {
        let node = self.node(id)?;
        let Some(operation) = node.operation else {
            return Ok(());
        };
        let derivative = node.derivative;
        let parents = node.parents.clone();
        let operands = self.operand_values(&parents)?;
        let partials = operation
            .differentiate(&operands)
            .map_err(|err| GraphError::at(id, err))?;
        for (&parent, partial) in parents.iter().zip(partials) {
            self.node_mut(parent)?.derivative += partial * derivative;
        }
        Ok(())
    }

    fn slot(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index()).and_then(Option::as_ref)
    }

    fn push(&mut self, node: Node) -> NodeId {
        let id = NodeId::from_index(self.nodes.len());
        self.nodes.push(Some(node));
        self.live += 1;
        self.revision += 1;
        id
    }

    /// Take a node out of its slot. Edges pointing at it are left to the caller.
    fn vacate(&mut self, id: NodeId) -> Result<Node, GraphError> {
        let node = self
            .nodes
            .get_mut(id.index())
            .and_then(Option::take)
            .ok_or(GraphError::UnknownNode { node: id })?;
        self.live -= 1;
        Ok(node)
    }

    /// Record `parent` as the next operand of `child`, on both ends.
    fn link(&mut self, child: NodeId, parent: NodeId) {
        if let Some(node) = self.nodes[child.index()].as_mut() {
            node.parents.push(parent);
        }
        if let Some(node) = self.nodes[parent.index()].as_mut() {
            node.children.push(child);
        }
    }

    /// Detach `id` from its operands and clear its operation.
    fn unlink_parents(&mut self, id: NodeId) -> Result<Parents, GraphError> {
        let node = self.node_mut(id)?;
        node.operation = None;
        let parents = std::mem::take(&mut node.parents);
        for &parent in unique(&parents).iter() {
            self.node_mut(parent)?.drop_child(id);
        }
        Ok(parents)
    }

    /// Move the definition and every edge of `id` onto a new anonymous node.
    fn split_off(&mut self, id: NodeId) -> Result<NodeId, GraphError> {
        let node = self.node_mut(id)?;
        let mut copy = Node::leaf();
        copy.operation = node.operation.take();
        copy.parents = std::mem::take(&mut node.parents);
        copy.children = std::mem::take(&mut node.children);
        copy.value = node.value;
        copy.anonymous = true;

        let parents = unique(&copy.parents);
        let children = unique(&copy.children);
        let copy_id = self.push(copy);
        for &parent in parents.iter() {
            self.node_mut(parent)?.replace_child(id, copy_id);
        }
        for &child in children.iter() {
            self.node_mut(child)?.replace_parent(id, copy_id);
        }
        Ok(copy_id)
    }

    /// New anonymous node with the same definition as `id` and no children.
    fn snapshot(&mut self, id: NodeId) -> Result<NodeId, GraphError> {
        let node = self.node(id)?;
        let mut copy = Node::leaf();
        copy.operation = node.operation;
        copy.value = node.value;
        copy.anonymous = true;
        let parents = node.parents.clone();

        let copy_id = self.push(copy);
        for parent in parents {
            self.link(copy_id, parent);
        }
        Ok(copy_id)
    }

    /// Remove anonymous nodes without consumers, starting from `candidates`
    /// and cascading to their parents. Returns the number removed.
    fn collect(&mut self, candidates: Vec<NodeId>) -> usize {
        self.collect_above(candidates, 0)
    }

    /// Like [`collect`](Self::collect), but slots below `floor` are kept.
    fn collect_above(&mut self, candidates: Vec<NodeId>, floor: usize) -> usize {
        let mut stack = candidates;
        let mut removed = 0;
        while let Some(id) = stack.pop() {
            let orphaned = id.index() >= floor
                && self
                    .slot(id)
                    .is_some_and(|node| node.anonymous && node.children.is_empty());
            if !orphaned {
                continue;
            }
            let Ok(node) = self.vacate(id) else {
                continue;
            };
            removed += 1;
            for &parent in unique(&node.parents).iter() {
                if let Ok(parent_node) = self.node_mut(parent) {
                    parent_node.drop_child(id);
                }
            }
            stack.extend(node.parents);
        }
        if removed > 0 {
            self.revision += 1;
        }
        removed
    }

    fn reachable_ends(
        &self,
        id: NodeId,
        next: impl Fn(&Node) -> &[NodeId],
    ) -> Result<Vec<NodeId>, GraphError> {
        let mut ends = Vec::new();
        let mut seen = HashSet::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if !seen.insert(current) {
                continue;
            }
            let following = next(self.node(current)?);
            if following.is_empty() {
                ends.push(current);
            } else {
                stack.extend(following.iter().rev());
            }
        }
        Ok(ends)
    }

    fn operand_values(&self, parents: &[NodeId]) -> Result<SmallVec<[f64; 4]>, GraphError> {
        parents
            .iter()
            .map(|&parent| self.node(parent).map(|node| node.value))
            .collect()
    }

    fn all_evaluated(&self, ids: &[NodeId]) -> bool {
        ids.iter()
            .all(|&id| self.slot(id).is_some_and(|node| node.evaluated))
    }

    fn all_differentiated(&self, ids: &[NodeId]) -> bool {
        ids.iter()
            .all(|&id| self.slot(id).is_some_and(|node| node.differentiated_parents))
    }
}

impl fmt::Debug for Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Graph")
            .field("num_nodes", &self.live)
            .field("num_slots", &self.nodes.len())
            .field("revision", &self.revision)
            .finish()
    }
}

/// Distinct ids in first-occurrence order.
fn unique(ids: &[NodeId]) -> SmallVec<[NodeId; 4]> {
    let mut out = SmallVec::new();
    for &id in ids {
        if !out.contains(&id) {
            out.push(id);
        }
    }
    out
}
