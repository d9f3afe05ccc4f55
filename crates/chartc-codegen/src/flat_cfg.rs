//! Flat CFG lowering (spec §4.10): assigns every reachable block a
//! preorder index from the entry and rewrites each block's successors
//! into an index-addressed `target` field, ready for engine-node
//! finalization.

use std::collections::HashMap;

use chartc_core::{Cfg, CfgEdgeData, CfgNodeId, IrNode};

use crate::error::CompileError;

/// How a flattened block selects its successor.
#[derive(Debug, Clone, PartialEq)]
pub enum FlatTarget {
    /// No successors; the block's `test` (or a fallback) is the return value.
    None,
    /// Exactly one successor, reached unconditionally.
    Single(usize),
    /// A branch or switch: each arm pairs a condition (`None` is the
    /// default/true arm) with the index it jumps to.
    Switch(Vec<(Option<f64>, usize)>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FlatCfgNode {
    pub body: Vec<IrNode>,
    pub test: Option<IrNode>,
    pub target: FlatTarget,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FlatCfg {
    pub nodes: Vec<FlatCfgNode>,
}

fn unencodable(block: CfgNodeId, reason: &str) -> CompileError {
    CompileError::UnencodableEdgeSet {
        block: block.to_string(),
        reason: reason.into(),
    }
}

fn build_target(
    block: CfgNodeId,
    edges: &[(CfgNodeId, CfgEdgeData)],
    index_of: &HashMap<CfgNodeId, usize>,
) -> Result<FlatTarget, CompileError> {
    if edges.is_empty() {
        return Ok(FlatTarget::None);
    }
    if edges.len() == 1 {
        let idx = *index_of
            .get(&edges[0].0)
            .ok_or_else(|| unencodable(block, "successor missing from flat order"))?;
        return Ok(FlatTarget::Single(idx));
    }
    let mut arms = Vec::with_capacity(edges.len());
    for (to, data) in edges {
        let idx = *index_of
            .get(to)
            .ok_or_else(|| unencodable(block, "successor missing from flat order"))?;
        match &data.condition {
            None => arms.push((None, idx)),
            Some(cond) => {
                let value = cond
                    .constant()
                    .ok_or_else(|| unencodable(block, "branch condition did not fold to a constant"))?;
                arms.push((Some(value), idx));
            }
        }
    }
    Ok(FlatTarget::Switch(arms))
}

/// Preorder-numbers `cfg` from its entry, placing the exit block last if
/// reachable or appending a sentinel empty block otherwise, and encodes
/// every block's outgoing edges as a [`FlatTarget`].
pub fn flatten(cfg: &Cfg) -> Result<FlatCfg, CompileError> {
    let mut order = chartc_core::traversal::traverse_preorder(cfg, cfg.entry_node());
    let exit = cfg.exit_node();
    let exit_reachable = exit.is_some_and(|e| order.contains(&e));
    if let Some(exit_id) = exit {
        if exit_reachable {
            order.retain(|n| *n != exit_id);
            order.push(exit_id);
        }
    }

    let index_of: HashMap<CfgNodeId, usize> = order.iter().enumerate().map(|(i, n)| (*n, i)).collect();

    let mut nodes = Vec::with_capacity(order.len() + 1);
    for node_id in &order {
        let data = cfg.node(*node_id);
        let edges = cfg.edges_from(*node_id);
        let target = build_target(*node_id, &edges, &index_of)?;
        nodes.push(FlatCfgNode {
            body: data.body.clone(),
            test: data.test.clone(),
            target,
        });
    }
    if exit.is_some() && !exit_reachable {
        nodes.push(FlatCfgNode {
            body: Vec::new(),
            test: None,
            target: FlatTarget::None,
        });
    }
    Ok(FlatCfg { nodes })
}

/// Property 2: flattening the same CFG twice must produce the same
/// preorder numbering. `traverse_preorder` is already deterministic, so
/// this is a cheap sanity check rather than a search.
pub fn check_preorder_stability(cfg: &Cfg) -> bool {
    let (Ok(a), Ok(b)) = (flatten(cfg), flatten(cfg)) else {
        return true;
    };
    a == b
}

#[cfg(test)]
mod tests {
    use super::*;
    use chartc_core::CfgNodeData;

    #[test]
    fn single_block_has_no_target() {
        let mut cfg = Cfg::new();
        let entry = cfg.add_node(CfgNodeData::new(Vec::new(), Some(IrNode::Const(1.0))));
        cfg.set_entry_node(entry);
        cfg.set_exit_node(entry);
        let flat = flatten(&cfg).unwrap();
        assert_eq!(flat.nodes.len(), 1);
        assert_eq!(flat.nodes[0].target, FlatTarget::None);
    }

    #[test]
    fn exit_block_is_placed_last() {
        let mut cfg = Cfg::new();
        let a = cfg.add_node(CfgNodeData::new(Vec::new(), None));
        let b = cfg.add_node(CfgNodeData::new(Vec::new(), None));
        cfg.set_entry_node(a);
        cfg.set_exit_node(b);
        cfg.add_edge(a, b, CfgEdgeData::unconditional());
        let flat = flatten(&cfg).unwrap();
        assert_eq!(flat.nodes.len(), 2);
        assert_eq!(flat.nodes[0].target, FlatTarget::Single(1));
        assert_eq!(flat.nodes[1].target, FlatTarget::None);
    }

    #[test]
    fn an_unreachable_exit_gets_a_sentinel_block_appended() {
        let mut cfg = Cfg::new();
        let entry = cfg.add_node(CfgNodeData::new(Vec::new(), None));
        let exit = cfg.add_node(CfgNodeData::new(Vec::new(), None));
        cfg.set_entry_node(entry);
        cfg.set_exit_node(exit);
        let flat = flatten(&cfg).unwrap();
        assert_eq!(flat.nodes.len(), 2);
        assert_eq!(flat.nodes[1].target, FlatTarget::None);
        assert!(flat.nodes[1].body.is_empty());
    }

    #[test]
    fn a_two_way_branch_becomes_a_switch_target() {
        let mut cfg = Cfg::new();
        let a = cfg.add_node(CfgNodeData::new(Vec::new(), Some(IrNode::Const(1.0))));
        let t = cfg.add_node(CfgNodeData::new(Vec::new(), None));
        let f = cfg.add_node(CfgNodeData::new(Vec::new(), None));
        cfg.set_entry_node(a);
        cfg.set_exit_node(f);
        cfg.add_edge(a, t, CfgEdgeData::unconditional());
        cfg.add_edge(a, f, CfgEdgeData::on(IrNode::Const(0.0)));
        let flat = flatten(&cfg).unwrap();
        match &flat.nodes[0].target {
            FlatTarget::Switch(arms) => {
                assert_eq!(arms.len(), 2);
                assert!(arms.iter().any(|(c, _)| c.is_none()));
                assert!(arms.iter().any(|(c, _)| *c == Some(0.0)));
            }
            other => panic!("expected a Switch target, got {other:?}"),
        }
    }

    #[test]
    fn preorder_numbering_is_stable_across_runs() {
        let mut cfg = Cfg::new();
        let a = cfg.add_node(CfgNodeData::new(Vec::new(), Some(IrNode::Const(1.0))));
        let b = cfg.add_node(CfgNodeData::new(Vec::new(), None));
        let c = cfg.add_node(CfgNodeData::new(Vec::new(), None));
        cfg.set_entry_node(a);
        cfg.set_exit_node(c);
        cfg.add_edge(a, b, CfgEdgeData::unconditional());
        cfg.add_edge(a, c, CfgEdgeData::on(IrNode::Const(0.0)));
        cfg.add_edge(b, c, CfgEdgeData::unconditional());
        assert!(check_preorder_stability(&cfg));
    }
}
