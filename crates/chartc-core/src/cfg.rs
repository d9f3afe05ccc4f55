//! The control-flow graph: nodes carrying IR bodies and an optional
//! branch test, edges carrying an optional taken-value, and the φ-nodes
//! that merge SSA values at join points.
//!
//! Backed by [`petgraph::stable_graph::StableGraph`] rather than plain
//! `Graph`: node removal (dead-node elimination, flow coalescing) is
//! routine here, and `StableGraph` keeps existing `NodeIndex`es valid
//! across a `remove_node`, which a plain `Graph` does not guarantee.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;

use petgraph::stable_graph::{NodeIndex, StableGraph};
use petgraph::Direction;
use serde::{Deserialize, Serialize};

use crate::ir::{IrNode, SsaRef};

/// Stable node identifier. Wraps a petgraph `NodeIndex`; stable across
/// any number of `remove_node` calls on the owning [`Cfg`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CfgNodeId(pub(crate) NodeIndex);

impl fmt::Display for CfgNodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "b{}", self.0.index())
    }
}

impl From<NodeIndex> for CfgNodeId {
    fn from(idx: NodeIndex) -> Self {
        CfgNodeId(idx)
    }
}

impl From<CfgNodeId> for NodeIndex {
    fn from(id: CfgNodeId) -> Self {
        id.0
    }
}

/// A merge point for an SSA-valued temporary, recording the incoming
/// value contributed by each predecessor. Present only in the
/// φ-bearing lowering stage; gone by the time `AllocateTransformer` runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Phi {
    pub target: SsaRef,
    pub values: HashMap<CfgNodeId, SsaRef>,
}

impl fmt::Display for Phi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let values: Vec<String> = self.values.values().map(|v| v.to_string()).collect();
        write!(f, "{} <- PHI({})", self.target, values.join(", "))
    }
}

/// A single basic block: a straight-line body, an optional test
/// expression deciding which outgoing edge is taken, and the φ-nodes
/// merging values flowing in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CfgNodeData {
    pub body: Vec<IrNode>,
    pub test: Option<IrNode>,
    pub phi: Vec<Phi>,
    #[serde(default)]
    pub annotations: HashMap<String, serde_json::Value>,
    pub is_entry: bool,
    pub is_exit: bool,
}

impl CfgNodeData {
    pub fn new(body: Vec<IrNode>, test: Option<IrNode>) -> Self {
        CfgNodeData {
            body,
            test,
            phi: Vec::new(),
            annotations: HashMap::new(),
            is_entry: false,
            is_exit: false,
        }
    }
}

/// An edge's taken-value: `None` for an unconditional edge, `Some(v)` for
/// the edge taken when the source node's `test` evaluates to `v`.
///
/// Ordering matches the taken-value ordering used for deterministic
/// traversal: unconditional edges sort before conditional ones, and
/// among conditional edges by the condition's own `IrNode` ordering.
/// Both orderings only ever compare constant IR nodes in practice
/// (finalized branch values), so `partial_cmp` on non-constant operands
/// falling back to `Ordering::Equal` is not reachable in well-formed
/// graphs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CfgEdgeData {
    pub condition: Option<IrNode>,
}

impl CfgEdgeData {
    pub fn unconditional() -> Self {
        CfgEdgeData { condition: None }
    }

    pub fn on(condition: IrNode) -> Self {
        CfgEdgeData {
            condition: Some(condition),
        }
    }
}

fn ir_node_order(a: &IrNode, b: &IrNode) -> Ordering {
    match (a.constant(), b.constant()) {
        (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
        _ => Ordering::Equal,
    }
}

impl Eq for CfgEdgeData {}

impl PartialOrd for CfgEdgeData {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for CfgEdgeData {
    fn cmp(&self, other: &Self) -> Ordering {
        match (&self.condition, &other.condition) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
            (Some(a), Some(b)) => ir_node_order(a, b),
        }
    }
}

/// The control-flow graph itself: a graph of [`CfgNodeData`] joined by
/// [`CfgEdgeData`], with distinguished entry and exit nodes.
#[derive(Debug, Clone, Default)]
pub struct Cfg {
    graph: StableGraph<CfgNodeData, CfgEdgeData>,
    entry: Option<CfgNodeId>,
    exit: Option<CfgNodeId>,
}

impl Cfg {
    pub fn new() -> Self {
        Cfg {
            graph: StableGraph::new(),
            entry: None,
            exit: None,
        }
    }

    pub fn entry_node(&self) -> Option<CfgNodeId> {
        self.entry
    }

    pub fn exit_node(&self) -> Option<CfgNodeId> {
        self.exit
    }

    pub fn set_entry_node(&mut self, id: CfgNodeId) {
        if let Some(old) = self.entry.take() {
            if let Some(data) = self.graph.node_weight_mut(old.0) {
                data.is_entry = false;
            }
        }
        if let Some(data) = self.graph.node_weight_mut(id.0) {
            data.is_entry = true;
        }
        self.entry = Some(id);
    }

    pub fn set_exit_node(&mut self, id: CfgNodeId) {
        if let Some(old) = self.exit.take() {
            if let Some(data) = self.graph.node_weight_mut(old.0) {
                data.is_exit = false;
            }
        }
        if let Some(data) = self.graph.node_weight_mut(id.0) {
            data.is_exit = true;
        }
        self.exit = Some(id);
    }

    pub fn add_node(&mut self, data: CfgNodeData) -> CfgNodeId {
        CfgNodeId(self.graph.add_node(data))
    }

    pub fn node(&self, id: CfgNodeId) -> &CfgNodeData {
        &self.graph[id.0]
    }

    pub fn node_mut(&mut self, id: CfgNodeId) -> &mut CfgNodeData {
        &mut self.graph[id.0]
    }

    pub fn nodes(&self) -> impl Iterator<Item = CfgNodeId> + '_ {
        self.graph.node_indices().map(CfgNodeId)
    }

    pub fn add_edge(&mut self, from: CfgNodeId, to: CfgNodeId, data: CfgEdgeData) {
        self.graph.add_edge(from.0, to.0, data);
    }

    /// Removes a single edge between two nodes carrying the given
    /// condition, if present.
    pub fn remove_edge(&mut self, from: CfgNodeId, to: CfgNodeId, condition: &Option<IrNode>) {
        if let Some(edge_idx) = self
            .graph
            .edges_connecting(from.0, to.0)
            .find(|e| &e.weight().condition == condition)
            .map(|e| e.id())
        {
            self.graph.remove_edge(edge_idx);
        }
    }

    pub fn clear_from_edges(&mut self, node: CfgNodeId) {
        while let Some(edge) = self
            .graph
            .edges_directed(node.0, Direction::Outgoing)
            .next()
            .map(|e| e.id())
        {
            self.graph.remove_edge(edge);
        }
    }

    pub fn clear_to_edges(&mut self, node: CfgNodeId) {
        while let Some(edge) = self
            .graph
            .edges_directed(node.0, Direction::Incoming)
            .next()
            .map(|e| e.id())
        {
            self.graph.remove_edge(edge);
        }
    }

    /// Disconnects a node from the graph without removing it; the node
    /// itself is left as an island until a later `remove_dead_nodes`
    /// collects it.
    pub fn remove_node(&mut self, node: CfgNodeId) {
        self.clear_from_edges(node);
        self.clear_to_edges(node);
    }

    /// Outgoing edges from `node`, in deterministic (`CfgEdgeData`)
    /// order: unconditional first, then conditional edges ordered by
    /// their condition.
    pub fn edges_from(&self, node: CfgNodeId) -> Vec<(CfgNodeId, CfgEdgeData)> {
        let mut out: Vec<(CfgNodeId, CfgEdgeData)> = self
            .graph
            .edges_directed(node.0, Direction::Outgoing)
            .map(|e| (CfgNodeId(e.target()), e.weight().clone()))
            .collect();
        out.sort_by(|a, b| a.1.cmp(&b.1));
        out
    }

    pub fn edges_to(&self, node: CfgNodeId) -> Vec<(CfgNodeId, CfgEdgeData)> {
        let mut into: Vec<(CfgNodeId, CfgEdgeData)> = self
            .graph
            .edges_directed(node.0, Direction::Incoming)
            .map(|e| (CfgNodeId(e.source()), e.weight().clone()))
            .collect();
        into.sort_by(|a, b| a.1.cmp(&b.1));
        into
    }

    pub fn predecessor_count(&self, node: CfgNodeId) -> usize {
        self.graph.edges_directed(node.0, Direction::Incoming).count()
    }

    pub fn successor_count(&self, node: CfgNodeId) -> usize {
        self.graph.edges_directed(node.0, Direction::Outgoing).count()
    }

    /// Rewires every edge and φ-reference from `old` onto `new`, and
    /// moves the entry/exit markers if `old` held them. `old` is left
    /// edgeless (still present in the graph as a dangling node) for a
    /// caller to clean up with `remove_dead_nodes` or explicit removal.
    pub fn replace_node(&mut self, old: CfgNodeId, new: CfgNodeId) {
        for (to, data) in self.edges_from(old) {
            self.graph.add_edge(new.0, to.0, data.clone());
            for phi in &mut self.graph[to.0].phi {
                if let Some(value) = phi.values.remove(&old) {
                    phi.values.insert(new, value);
                }
            }
        }
        for (from, data) in self.edges_to(old) {
            self.graph.add_edge(from.0, new.0, data);
        }
        self.clear_from_edges(old);
        self.clear_to_edges(old);
        if self.entry == Some(old) {
            self.set_entry_node(new);
        }
        if self.exit == Some(old) {
            self.set_exit_node(new);
        }
    }

    /// Drops every node unreachable from the entry node, except the
    /// entry and exit nodes themselves (which are kept even if
    /// otherwise unreachable, e.g. an exit node with no predecessors
    /// during incremental construction).
    pub fn remove_dead_nodes(&mut self) {
        let Some(entry) = self.entry else { return };
        let mut live = std::collections::HashSet::new();
        let mut stack = vec![entry];
        while let Some(node) = stack.pop() {
            if !live.insert(node) {
                continue;
            }
            for (to, _) in self.edges_from(node) {
                stack.push(to);
            }
        }
        let dead: Vec<CfgNodeId> = self
            .nodes()
            .filter(|n| !live.contains(n) && !self.node(*n).is_entry && !self.node(*n).is_exit)
            .collect();
        for node in dead {
            self.remove_node(node);
            self.graph.remove_node(node.0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_node() -> CfgNodeData {
        CfgNodeData::new(Vec::new(), None)
    }

    #[test]
    fn edge_ordering_puts_unconditional_first() {
        let unconditional = CfgEdgeData::unconditional();
        let conditional = CfgEdgeData::on(IrNode::Const(1.0));
        assert!(unconditional < conditional);
    }

    #[test]
    fn edges_from_are_returned_in_deterministic_order() {
        let mut cfg = Cfg::new();
        let a = cfg.add_node(empty_node());
        let b = cfg.add_node(empty_node());
        let c = cfg.add_node(empty_node());
        cfg.add_edge(a, c, CfgEdgeData::on(IrNode::Const(1.0)));
        cfg.add_edge(a, b, CfgEdgeData::unconditional());
        let edges = cfg.edges_from(a);
        assert_eq!(edges[0].0, b);
        assert_eq!(edges[1].0, c);
    }

    #[test]
    fn remove_dead_nodes_keeps_only_reachable_blocks() {
        let mut cfg = Cfg::new();
        let entry = cfg.add_node(empty_node());
        let reachable = cfg.add_node(empty_node());
        let unreachable = cfg.add_node(empty_node());
        cfg.set_entry_node(entry);
        cfg.set_exit_node(reachable);
        cfg.add_edge(entry, reachable, CfgEdgeData::unconditional());
        let _ = unreachable;
        cfg.remove_dead_nodes();
        assert!(cfg.nodes().any(|n| n == entry));
        assert!(cfg.nodes().any(|n| n == reachable));
        assert!(!cfg.nodes().any(|n| n == unreachable));
    }

    #[test]
    fn replace_node_rewires_phis() {
        let mut cfg = Cfg::new();
        let pred = cfg.add_node(empty_node());
        let join = cfg.add_node(empty_node());
        cfg.add_edge(pred, join, CfgEdgeData::unconditional());
        cfg.node_mut(join).phi.push(Phi {
            target: SsaRef("x.2".into()),
            values: HashMap::from([(pred, SsaRef("x.1".into()))]),
        });
        let replacement = cfg.add_node(empty_node());
        cfg.replace_node(pred, replacement);
        assert_eq!(
            cfg.node(join).phi[0].values.get(&replacement),
            Some(&SsaRef("x.1".into()))
        );
        assert!(!cfg.node(join).phi[0].values.contains_key(&pred));
    }
}
