//! Flow coalescing (spec §4.7): iteratively merges straight-line edges
//! and bypasses empty blocks, shrinking the CFG before later passes have
//! to reason about it.

use chartc_core::{Cfg, CfgNodeId};

use crate::error::CompileError;
use crate::passes::OptimizationPass;

/// Fuses `s` into `b` when `b`'s only successor is `s` and `s`'s only
/// predecessor is `b`: concatenates bodies, takes `s`'s test, and rewires
/// `s`'s outgoing edges (and any φ-reference to `s`) onto `b`.
fn fuse(cfg: &mut Cfg, b: CfgNodeId, s: CfgNodeId) {
    let s_body = cfg.node(s).body.clone();
    let s_test = cfg.node(s).test.clone();
    let s_phi = cfg.node(s).phi.clone();
    let s_is_exit = cfg.node(s).is_exit;
    let s_outgoing = cfg.edges_from(s);

    {
        let b_data = cfg.node_mut(b);
        b_data.body.extend(s_body);
        b_data.test = s_test;
        b_data.phi.extend(s_phi);
        b_data.is_exit = b_data.is_exit || s_is_exit;
    }

    for (to, data) in &s_outgoing {
        cfg.add_edge(b, *to, data.clone());
    }
    for (to, _) in &s_outgoing {
        for phi in cfg.node_mut(*to).phi.iter_mut() {
            if let Some(value) = phi.values.remove(&s) {
                phi.values.insert(b, value);
            }
        }
    }

    if cfg.exit_node() == Some(s) {
        cfg.set_exit_node(b);
    }
    cfg.remove_node(s);
}

/// Redirects every predecessor of the empty block `b` straight to `s`,
/// without routing through `b`'s now-vacuous edge.
fn bypass_empty_block(cfg: &mut Cfg, b: CfgNodeId, s: CfgNodeId) {
    let preds = cfg.edges_to(b);
    for (from, data) in &preds {
        cfg.add_edge(*from, s, data.clone());
    }
    // A φ contribution keyed on `b` applies identically to every one of
    // `b`'s former predecessors: `b` had an empty body, so the value
    // reaching `s` from `b` was whatever each predecessor forwarded
    // unchanged.
    let carried = cfg.node_mut(s).phi.iter_mut().find_map(|phi| phi.values.remove(&b));
    if let Some(value) = carried {
        for (from, _) in &preds {
            for phi in cfg.node_mut(s).phi.iter_mut() {
                phi.values.entry(*from).or_insert_with(|| value.clone());
            }
        }
    }
    if cfg.entry_node() == Some(b) {
        cfg.set_entry_node(s);
    }
    if cfg.exit_node() == Some(b) {
        cfg.set_exit_node(s);
    }
    cfg.remove_node(b);
}

pub fn run_coalesce_flow(cfg: &mut Cfg) -> Result<(), CompileError> {
    loop {
        let mut changed = false;
        let node_ids: Vec<CfgNodeId> = cfg.nodes().collect();
        for b in node_ids {
            if !cfg.nodes().any(|n| n == b) {
                continue;
            }
            let succs = cfg.edges_from(b);
            let Some((s, _)) = succs.first().copied() else {
                continue;
            };
            if succs.len() != 1 || s == b {
                continue;
            }
            if cfg.node(b).body.is_empty() {
                bypass_empty_block(cfg, b, s);
                changed = true;
            } else if cfg.predecessor_count(s) == 1 {
                fuse(cfg, b, s);
                changed = true;
            }
        }
        if changed {
            cfg.remove_dead_nodes();
        } else {
            break;
        }
    }
    Ok(())
}

pub struct CoalesceFlow;

impl OptimizationPass for CoalesceFlow {
    fn name(&self) -> &'static str {
        "CoalesceFlow"
    }

    fn run(&self, cfg: &mut Cfg) -> Result<(), CompileError> {
        run_coalesce_flow(cfg)
    }
}

pub static COALESCE_FLOW: CoalesceFlow = CoalesceFlow;

#[cfg(test)]
mod tests {
    use super::*;
    use chartc_core::{CfgEdgeData, CfgNodeData, IrNode};

    #[test]
    fn fuses_a_straight_line_chain() {
        let mut cfg = Cfg::new();
        let a = cfg.add_node(CfgNodeData::new(vec![IrNode::Comment("a".into())], None));
        let b = cfg.add_node(CfgNodeData::new(vec![IrNode::Comment("b".into())], Some(IrNode::Const(7.0))));
        cfg.set_entry_node(a);
        cfg.set_exit_node(b);
        cfg.add_edge(a, b, CfgEdgeData::unconditional());

        run_coalesce_flow(&mut cfg).unwrap();
        let nodes: Vec<_> = cfg.nodes().collect();
        assert_eq!(nodes.len(), 1);
        assert_eq!(cfg.node(nodes[0]).body.len(), 2);
        assert_eq!(cfg.node(nodes[0]).test, Some(IrNode::Const(7.0)));
    }

    #[test]
    fn bypasses_an_empty_block() {
        let mut cfg = Cfg::new();
        let a = cfg.add_node(CfgNodeData::new(Vec::new(), None));
        let b = cfg.add_node(CfgNodeData::new(Vec::new(), None));
        let c = cfg.add_node(CfgNodeData::new(vec![IrNode::Comment("c".into())], Some(IrNode::Const(1.0))));
        cfg.set_entry_node(a);
        cfg.set_exit_node(c);
        cfg.add_edge(a, b, CfgEdgeData::unconditional());
        cfg.add_edge(b, c, CfgEdgeData::unconditional());

        run_coalesce_flow(&mut cfg).unwrap();
        assert_eq!(cfg.nodes().count(), 1);
    }

    #[test]
    fn does_not_fuse_when_successor_has_other_predecessors() {
        let mut cfg = Cfg::new();
        let a = cfg.add_node(CfgNodeData::new(vec![IrNode::Comment("a".into())], None));
        let other = cfg.add_node(CfgNodeData::new(vec![IrNode::Comment("other".into())], None));
        let join = cfg.add_node(CfgNodeData::new(vec![IrNode::Comment("join".into())], None));
        cfg.set_entry_node(a);
        cfg.set_exit_node(join);
        cfg.add_edge(a, join, CfgEdgeData::unconditional());
        cfg.add_edge(other, join, CfgEdgeData::unconditional());

        run_coalesce_flow(&mut cfg).unwrap();
        assert_eq!(cfg.nodes().count(), 3);
    }
}
