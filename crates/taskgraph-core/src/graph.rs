//! The node list: insertion-ordered storage for a graph's nodes, plus
//! topological/depth/priority sorting and cycle detection (C2).
//!
//! A [`NodeList`] owns `Arc<dyn AnyNode>` handles in two orders: the
//! order nodes were `add`ed (stable, used for iteration when no sort
//! has run yet) and a derived sorted order produced by `sort`/`try_sort`.
//! Sorting always walks the whole list with a DFS coloring pass
//! (`visited`/`active` flags on each node) to both detect cycles and
//! compute each node's depth (longest path from any root), then
//! orders the sorted view per [`SortType`].

use std::cmp::Ordering as CmpOrdering;
use std::sync::Arc;

use crate::error::{TaskGraphError, TaskGraphResult};
use crate::node::AnyNode;

/// How `sort`/`try_sort` should order the node list after the
/// cycle-detecting DFS pass has computed each node's depth.
pub enum SortType {
    /// Dependency order: a node never precedes one of its dependencies.
    Topological,
    /// Ascending by computed depth (root-most nodes first).
    Depth,
    /// Descending by user-assigned priority, ignoring dependencies.
    Priority,
    /// By depth ascending, breaking ties by priority descending.
    DepthOrPriority,
    /// Caller-supplied total order.
    CustomPriority(Box<dyn Fn(&Arc<dyn AnyNode>, &Arc<dyn AnyNode>) -> CmpOrdering>),
}

impl std::fmt::Debug for SortType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SortType::Topological => write!(f, "Topological"),
            SortType::Depth => write!(f, "Depth"),
            SortType::Priority => write!(f, "Priority"),
            SortType::DepthOrPriority => write!(f, "DepthOrPriority"),
            SortType::CustomPriority(_) => write!(f, "CustomPriority(..)"),
        }
    }
}

/// Fixed-capacity, insertion-ordered collection of a graph's nodes.
///
/// Capacity is fixed at construction (mirroring the source material's
/// preallocated node array) so `add` past it is a caller error rather
/// than silent reallocation.
pub struct NodeList {
    capacity: usize,
    nodes: Vec<Arc<dyn AnyNode>>,
    sorted: Vec<Arc<dyn AnyNode>>,
}

impl NodeList {
    pub fn new(capacity: usize) -> Self {
        NodeList { capacity, nodes: Vec::with_capacity(capacity), sorted: Vec::new() }
    }

    /// Number of nodes currently held.
    pub fn size(&self) -> usize {
        self.nodes.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append a node in insertion order.
    ///
    /// # Panics
    /// Panics if the list is already at capacity.
    pub fn add(&mut self, node: Arc<dyn AnyNode>) {
        if self.nodes.len() == self.capacity {
            panic!("{}", TaskGraphError::CapacityExceeded { capacity: self.capacity });
        }
        self.nodes.push(node);
    }

    /// The node at insertion-order index `i`.
    pub fn get_at(&self, i: usize) -> Arc<dyn AnyNode> {
        self.nodes[i].clone()
    }

    /// Nodes in insertion order.
    pub fn iter_insertion_order(&self) -> impl Iterator<Item = &Arc<dyn AnyNode>> {
        self.nodes.iter()
    }

    /// Nodes in the order produced by the most recent `sort`/`try_sort`
    /// call. Empty until a sort has run.
    pub fn sorted(&self) -> &[Arc<dyn AnyNode>] {
        &self.sorted
    }

    /// Sort the list per `sort_type`, panicking on a detected cycle.
    pub fn sort(&mut self, sort_type: SortType) {
        if let Err(e) = self.try_sort(sort_type) {
            panic!("{}", e);
        }
    }

    /// Sort the list per `sort_type`, returning a `CycleDetected` error
    /// instead of panicking if the graph is not a DAG.
    pub fn try_sort(&mut self, sort_type: SortType) -> TaskGraphResult<()> {
        for node in &self.nodes {
            node.set_visited(false);
            node.set_active(false);
        }

        let mut order: Vec<Arc<dyn AnyNode>> = Vec::with_capacity(self.nodes.len());
        for node in &self.nodes {
            if !node.is_visited() {
                visit(node, &mut order)?;
            }
        }

        // `order` is post-order (dependencies before dependents), which
        // is already a valid topological order.
        match sort_type {
            SortType::Topological => {}
            SortType::Depth => {
                order.sort_by_key(|n| n.depth());
            }
            SortType::Priority => {
                order.sort_by(|a, b| b.priority().cmp(&a.priority()));
            }
            SortType::DepthOrPriority => {
                order.sort_by(|a, b| {
                    a.depth().cmp(&b.depth()).then_with(|| b.priority().cmp(&a.priority()))
                });
            }
            SortType::CustomPriority(cmp) => {
                order.sort_by(|a, b| cmp(a, b));
            }
        }

        self.sorted = order;
        Ok(())
    }
}

/// DFS visit computing depth (longest path from a root) and post-order
/// position, detecting back-edges (active-but-not-yet-finished nodes)
/// as cycles.
fn visit(node: &Arc<dyn AnyNode>, order: &mut Vec<Arc<dyn AnyNode>>) -> TaskGraphResult<usize> {
    if node.is_active() {
        return Err(TaskGraphError::CycleDetected { at: node.id() });
    }
    if node.is_visited() {
        return Ok(node.depth());
    }

    node.set_active(true);
    let mut max_dep_depth: isize = -1;
    for slot in 0..node.arity() {
        let dep = node.dependency(slot);
        let dep_depth = visit(&dep, order)? as isize;
        max_dep_depth = max_dep_depth.max(dep_depth);
    }
    node.set_active(false);
    node.set_visited(true);
    node.set_depth((max_dep_depth + 1) as usize);
    order.push(node.clone());
    Ok(node.depth())
}
