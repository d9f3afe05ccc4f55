//! Conditional constant propagation (spec §4.4): a sparse-conditional
//! lattice analysis over temp-ref slots, fixed-point iterated over the
//! CFG, followed by a rewrite pass that substitutes known constants and
//! prunes statically-disproved edges.
//!
//! The lattice element per `(temp, absolute slot index)` is
//! `Undef ⊑ Const(v) ⊑ Nac`: unvisited, a single known value, or "not a
//! constant". Unlike the teacher's single-shot LLVM lowering, this
//! analysis iterates to a fixed point because `Cfg` can be cyclic.

use std::collections::{HashMap, HashSet};

use chartc_core::{Cfg, CfgNodeData, CfgNodeId, FuncCall, IrNode, LocRef, Location, TempRef};

use crate::error::CompileError;
use crate::passes::{AnalysisPass, OptimizationPass, TEMP_REF_SIZING};
use chartc_check::{PartialEvalConfig, PartialEvaluator};

type SlotKey = (TempRef, i64);

#[derive(Debug, Clone, PartialEq)]
enum Lattice {
    Undef,
    Const(f64),
    Nac,
}

fn meet(a: &Lattice, b: &Lattice) -> Lattice {
    match (a, b) {
        (Lattice::Undef, x) | (x, Lattice::Undef) => x.clone(),
        (Lattice::Const(x), Lattice::Const(y)) if x == y => Lattice::Const(*x),
        (Lattice::Const(_), Lattice::Const(_)) => Lattice::Nac,
        _ => Lattice::Nac,
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
struct SlotMap(HashMap<SlotKey, Lattice>);

impl SlotMap {
    fn get(&self, key: &SlotKey) -> Lattice {
        self.0.get(key).cloned().unwrap_or(Lattice::Undef)
    }

    fn set(&mut self, key: SlotKey, value: Lattice) {
        self.0.insert(key, value);
    }
}

fn meet_slot_maps(maps: &[&SlotMap]) -> SlotMap {
    let mut keys: HashSet<SlotKey> = HashSet::new();
    for m in maps {
        keys.extend(m.0.keys().cloned());
    }
    let mut result = SlotMap::default();
    for key in keys {
        let mut acc = Lattice::Undef;
        for m in maps {
            acc = meet(&acc, &m.get(&key));
        }
        result.set(key, acc);
    }
    result
}

/// Substitutes known-constant temp slots into `node` and folds any
/// subexpression that becomes fully constant as a result. Everything
/// outside `LocRef::Temp` is left untouched: CCP only tracks temps, not
/// fixed memory blocks (that's the partial evaluator's `allow_vars` path,
/// used elsewhere for ROM-backed constants).
fn substitute(node: &IrNode, slots: &SlotMap) -> IrNode {
    match node {
        IrNode::Const(_) | IrNode::Comment(_) => node.clone(),
        IrNode::Func(call) => substitute_func(call, slots),
        IrNode::Get(loc) => substitute_get(loc, slots),
        IrNode::Set(loc, value) => {
            let new_value = substitute(value, slots);
            let new_loc = substitute_location(loc, slots);
            IrNode::Set(new_loc, Box::new(new_value))
        }
    }
}

fn substitute_func(call: &FuncCall, slots: &SlotMap) -> IrNode {
    let new_args: Vec<IrNode> = call.args.iter().map(|a| substitute(a, slots)).collect();
    // Short-circuits even when a sibling argument is still unknown.
    if call.name == "Multiply" && new_args.iter().any(|a| a.constant() == Some(0.0)) {
        return IrNode::Const(0.0);
    }
    let candidate = IrNode::func(call.name.clone(), new_args);
    let default_cfg = PartialEvalConfig::default();
    let evaluator = PartialEvaluator::new(&default_cfg);
    match evaluator.fold(&candidate) {
        Some(v) => IrNode::Const(v),
        None => candidate,
    }
}

fn substitute_location(loc: &Location, slots: &SlotMap) -> Location {
    if loc.span == Some(1) {
        // Only one offset value is legal; collapse it into `base` so
        // later passes never have to re-derive that it's always zero.
        return Location::new(loc.r#ref.clone(), IrNode::Const(0.0), loc.base, Some(1));
    }
    let new_offset = substitute(&loc.offset, slots);
    Location::new(loc.r#ref.clone(), new_offset, loc.base, loc.span)
}

fn substitute_get(loc: &Location, slots: &SlotMap) -> IrNode {
    let LocRef::Temp(t) = &loc.r#ref else {
        let new_offset = substitute(&loc.offset, slots);
        return IrNode::Get(Location::new(loc.r#ref.clone(), new_offset, loc.base, loc.span));
    };
    if loc.span == Some(1) {
        if let Lattice::Const(v) = slots.get(&(t.clone(), loc.base)) {
            return IrNode::Const(v);
        }
        return IrNode::Get(Location::new(
            LocRef::Temp(t.clone()),
            IrNode::Const(0.0),
            loc.base,
            Some(1),
        ));
    }
    let new_offset = substitute(&loc.offset, slots);
    if let Some(off) = new_offset.constant() {
        let idx = loc.base + off as i64;
        if let Lattice::Const(v) = slots.get(&(t.clone(), idx)) {
            return IrNode::Const(v);
        }
    }
    IrNode::Get(Location::new(LocRef::Temp(t.clone()), new_offset, loc.base, loc.span))
}

/// Applies a block's transfer function against `in_slots`, returning its
/// out-lattice, the locally rewritten body and test, and the test's
/// folded value (if it collapsed to a constant).
fn transfer(
    node: &CfgNodeData,
    in_slots: &SlotMap,
) -> (SlotMap, Vec<IrNode>, Option<IrNode>, Option<f64>) {
    let mut local = in_slots.clone();
    let mut new_body = Vec::with_capacity(node.body.len());

    for stmt in &node.body {
        let rewritten = if let IrNode::Set(loc, value) = stmt {
            let new_value = substitute(value, &local);
            let folded_value = new_value.constant();
            let new_loc = substitute_location(loc, &local);
            if let LocRef::Temp(t) = &loc.r#ref {
                let span = loc.span.unwrap_or(1) as i64;
                if span == 1 {
                    local.set((t.clone(), loc.base), folded_value.map_or(Lattice::Nac, Lattice::Const));
                } else if let Some(off) = new_loc.offset.constant() {
                    let idx = loc.base + off as i64;
                    local.set((t.clone(), idx), folded_value.map_or(Lattice::Nac, Lattice::Const));
                } else {
                    // Weak update: the write may or may not land on any
                    // given slot, so only a slot whose known constant
                    // provably differs from the stored value is downgraded.
                    for idx in loc.base..loc.base + span {
                        let key = (t.clone(), idx);
                        if let Lattice::Const(c) = local.get(&key) {
                            if folded_value != Some(c) {
                                local.set(key, Lattice::Nac);
                            }
                        }
                    }
                }
            }
            IrNode::Set(new_loc, Box::new(new_value))
        } else {
            substitute(stmt, &local)
        };
        new_body.push(rewritten);
    }

    let new_test = node.test.as_ref().map(|t| substitute(t, &local));
    let folded_test = new_test.as_ref().and_then(|t| t.constant());
    (local, new_body, new_test, folded_test)
}

/// Runs CCP to a fixed point, rewrites every block's IR in place, and
/// prunes edges whose condition is provably not taken.
pub fn run_ccp(cfg: &mut Cfg) -> Result<(), CompileError> {
    let Some(entry) = cfg.entry_node() else {
        return Ok(());
    };
    let node_ids: Vec<CfgNodeId> = cfg.nodes().collect();
    let mut in_map: HashMap<CfgNodeId, SlotMap> =
        node_ids.iter().map(|&n| (n, SlotMap::default())).collect();
    let mut out_map: HashMap<CfgNodeId, SlotMap> =
        node_ids.iter().map(|&n| (n, SlotMap::default())).collect();
    let mut taken: HashMap<CfgNodeId, Option<f64>> = node_ids.iter().map(|&n| (n, None)).collect();
    let mut rewritten: HashMap<CfgNodeId, (Vec<IrNode>, Option<IrNode>)> = HashMap::new();

    // The lattice has height 2 per slot, so this is guaranteed to reach a
    // fixed point well inside this bound; it's a termination backstop,
    // not a tuned heuristic.
    let max_iters = node_ids.len() * 4 + 16;
    for _ in 0..max_iters {
        let mut changed = false;
        for &node_id in &node_ids {
            let new_in = if node_id == entry {
                SlotMap::default()
            } else {
                let preds = cfg.edges_to(node_id);
                let mut contributions: Vec<SlotMap> = Vec::new();
                for (from, edge) in &preds {
                    let from_taken = taken.get(from).copied().flatten();
                    let cond_val = edge.condition.as_ref().and_then(|c| c.constant());
                    let include = match from_taken {
                        None => true,
                        Some(c) => cond_val.is_none() || cond_val == Some(c),
                    };
                    if include {
                        contributions.push(out_map[from].clone());
                    }
                }
                let refs: Vec<&SlotMap> = contributions.iter().collect();
                meet_slot_maps(&refs)
            };
            if new_in != in_map[&node_id] {
                in_map.insert(node_id, new_in);
                changed = true;
            }

            let node = cfg.node(node_id).clone();
            let (out, body, test, folded) = transfer(&node, &in_map[&node_id]);
            if out != out_map[&node_id] {
                out_map.insert(node_id, out);
                changed = true;
            }
            if taken.get(&node_id).copied() != Some(folded) {
                taken.insert(node_id, folded);
                changed = true;
            }
            rewritten.insert(node_id, (body, test));
        }
        if !changed {
            break;
        }
    }

    for &node_id in &node_ids {
        if let Some((body, test)) = rewritten.remove(&node_id) {
            let data = cfg.node_mut(node_id);
            data.body = body;
            data.test = test;
        }
    }

    for &node_id in &node_ids {
        if let Some(Some(c)) = taken.get(&node_id).copied() {
            let edges = cfg.edges_from(node_id);
            let some_edge_matches = edges.iter().any(|(_, edge)| {
                edge.condition.as_ref().and_then(|cc| cc.constant()) == Some(c)
            });
            for (to, edge) in edges {
                let cond_val = edge.condition.as_ref().and_then(|cc| cc.constant());
                let disproved = match cond_val {
                    Some(v) => v != c,
                    // The `None`/default arm is only taken when no concrete
                    // sibling matches; once one does, the folded test
                    // statically never falls through to it.
                    None => some_edge_matches,
                };
                if disproved {
                    cfg.remove_edge(node_id, to, &edge.condition);
                }
            }
        }
    }

    cfg.remove_dead_nodes();
    Ok(())
}

pub struct ConditionalConstantPropagation;

impl OptimizationPass for ConditionalConstantPropagation {
    fn name(&self) -> &'static str {
        "ConditionalConstantPropagation"
    }

    fn requires(&self) -> &[&'static dyn AnalysisPass] {
        static DEPS: [&dyn AnalysisPass; 1] = [&TEMP_REF_SIZING];
        &DEPS
    }

    fn run(&self, cfg: &mut Cfg) -> Result<(), CompileError> {
        run_ccp(cfg)
    }
}

pub static CONDITIONAL_CONSTANT_PROPAGATION: ConditionalConstantPropagation =
    ConditionalConstantPropagation;
