//! Deterministic node orders over a [`Cfg`], built from `entry_node`
//! outward. Passes that need a fixed visitation order (CCP's worklist
//! seeding, the flat-CFG layout) use `traverse_preorder`/
//! `traverse_postorder`; passes that don't care use the cheaper
//! `traverse_unordered`.

use std::collections::HashSet;

use crate::cfg::{Cfg, CfgNodeId};

/// Visits every node reachable from the entry node, in arbitrary
/// (stack-popping) order. Cheapest traversal; use when order doesn't
/// matter, e.g. seeding a fixpoint worklist.
pub fn traverse_unordered(cfg: &Cfg) -> Vec<CfgNodeId> {
    let Some(entry) = cfg.entry_node() else {
        return Vec::new();
    };
    let mut visited = HashSet::new();
    let mut stack = vec![entry];
    let mut order = Vec::new();
    while let Some(node) = stack.pop() {
        if !visited.insert(node) {
            continue;
        }
        order.push(node);
        for (to, _) in cfg.edges_from(node) {
            stack.push(to);
        }
    }
    order
}

/// Postorder over the reachable subgraph from `start` (or the entry
/// node if `start` is `None`), visiting successors in `CfgEdgeData`
/// order at each node.
pub fn traverse_postorder(cfg: &Cfg, start: Option<CfgNodeId>) -> Vec<CfgNodeId> {
    let Some(root) = start.or_else(|| cfg.entry_node()) else {
        return Vec::new();
    };
    let mut visited = HashSet::new();
    let mut order = Vec::new();
    postorder_visit(cfg, root, &mut visited, &mut order);
    order
}

fn postorder_visit(
    cfg: &Cfg,
    node: CfgNodeId,
    visited: &mut HashSet<CfgNodeId>,
    order: &mut Vec<CfgNodeId>,
) {
    if !visited.insert(node) {
        return;
    }
    for (to, _) in cfg.edges_from(node) {
        postorder_visit(cfg, to, visited, order);
    }
    order.push(node);
}

/// Preorder over the reachable subgraph from `start` (or the entry node
/// if `start` is `None`), visiting successors in `CfgEdgeData` order at
/// each node.
pub fn traverse_preorder(cfg: &Cfg, start: Option<CfgNodeId>) -> Vec<CfgNodeId> {
    let Some(root) = start.or_else(|| cfg.entry_node()) else {
        return Vec::new();
    };
    let mut visited = HashSet::new();
    let mut order = Vec::new();
    preorder_visit(cfg, root, &mut visited, &mut order);
    order
}

fn preorder_visit(
    cfg: &Cfg,
    node: CfgNodeId,
    visited: &mut HashSet<CfgNodeId>,
    order: &mut Vec<CfgNodeId>,
) {
    if !visited.insert(node) {
        return;
    }
    order.push(node);
    for (to, _) in cfg.edges_from(node) {
        preorder_visit(cfg, to, visited, order);
    }
}
