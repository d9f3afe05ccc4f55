//! Dead-code and dead-store elimination (spec §4.8).
//!
//! Two distinct passes, run in sequence by the default preset: basic DCE
//! drops non-effectual top-level statements and vacuous tests; basic DSE
//! removes stores to temps with no remaining live reads, cascading
//! through a reverse walk so a store that's only read by another
//! now-dead store goes dead too.

use std::collections::HashMap;

use chartc_core::{is_effectful_builtin, Cfg, CfgNodeId, IrNode, IrVisitor, LocRef, TempRef};

use crate::error::CompileError;
use crate::passes::OptimizationPass;

fn is_effectual(stmt: &IrNode) -> bool {
    match stmt {
        IrNode::Set(_, _) => true,
        IrNode::Func(call) => is_effectful_builtin(&call.name),
        _ => false,
    }
}

pub fn run_basic_dce(cfg: &mut Cfg) -> Result<(), CompileError> {
    let node_ids: Vec<CfgNodeId> = cfg.nodes().collect();
    for node in node_ids {
        let drop_test = cfg.successor_count(node) == 1 && cfg.exit_node() != Some(node);
        let data = cfg.node_mut(node);
        data.body.retain(is_effectual);
        if drop_test {
            data.test = None;
        }
    }
    Ok(())
}

pub struct BasicDeadCodeElimination;

impl OptimizationPass for BasicDeadCodeElimination {
    fn name(&self) -> &'static str {
        "BasicDeadCodeElimination"
    }

    fn run(&self, cfg: &mut Cfg) -> Result<(), CompileError> {
        run_basic_dce(cfg)
    }
}

pub static BASIC_DEAD_CODE_ELIMINATION: BasicDeadCodeElimination = BasicDeadCodeElimination;

struct TempGetCollector {
    found: Vec<TempRef>,
}

impl IrVisitor for TempGetCollector {
    // Overriding `visit_ir` directly (rather than `visit_location`) matters
    // here: a `Set`'s own location is a write target, not a read, and the
    // default dispatch visits both a `Get`'s and a `Set`'s location the
    // same way. Only a `Get`'s location counts as a temp access; a `Set`'s
    // location only contributes the reads nested in its dynamic offset or
    // inline ref.
    fn visit_ir(&mut self, node: &IrNode) {
        match node {
            IrNode::Get(loc) => {
                self.visit_ir(&loc.offset);
                match &loc.r#ref {
                    LocRef::Temp(t) => self.found.push(t.clone()),
                    LocRef::Inline(inner) => self.visit_ir(inner),
                    _ => {}
                }
            }
            IrNode::Set(loc, value) => {
                self.visit_ir(&loc.offset);
                if let LocRef::Inline(inner) = &loc.r#ref {
                    self.visit_ir(inner);
                }
                self.visit_ir(value);
            }
            IrNode::Func(call) => self.visit_func(call),
            IrNode::Const(_) | IrNode::Comment(_) => {}
        }
    }
}

fn collect_temp_gets(node: &IrNode) -> Vec<TempRef> {
    let mut collector = TempGetCollector { found: Vec::new() };
    collector.visit_ir(node);
    collector.found
}

fn count_temp_gets(cfg: &Cfg) -> HashMap<TempRef, u32> {
    let mut counts = HashMap::new();
    for node in cfg.nodes() {
        let data = cfg.node(node);
        for stmt in &data.body {
            for t in collect_temp_gets(stmt) {
                *counts.entry(t).or_insert(0) += 1;
            }
        }
        if let Some(test) = &data.test {
            for t in collect_temp_gets(test) {
                *counts.entry(t).or_insert(0) += 1;
            }
        }
    }
    counts
}

fn decrement_gets(node: &IrNode, remaining: &mut HashMap<TempRef, u32>) {
    for t in collect_temp_gets(node) {
        if let Some(count) = remaining.get_mut(&t) {
            *count = count.saturating_sub(1);
        }
    }
}

/// Walks every block's body in reverse, removing a `Set` to a temp-ref
/// with no remaining live reads. Processing in reverse and decrementing
/// `remaining` for whatever a removed store's value (and dynamic write
/// offset) itself read means a store whose only reader was another store
/// that just went dead correctly goes dead too, in one pass.
pub fn run_basic_dse(cfg: &mut Cfg) -> Result<(), CompileError> {
    let mut remaining = count_temp_gets(cfg);
    let node_ids: Vec<CfgNodeId> = cfg.nodes().collect();

    for node in node_ids.into_iter().rev() {
        let body = std::mem::take(&mut cfg.node_mut(node).body);
        let mut new_body = Vec::with_capacity(body.len());

        for stmt in body.into_iter().rev() {
            match stmt {
                IrNode::Set(loc, value) => {
                    let is_dead = match &loc.r#ref {
                        LocRef::Temp(t) => remaining.get(t).copied().unwrap_or(0) == 0,
                        _ => false,
                    };
                    if is_dead {
                        if let IrNode::Func(call) = value.as_ref() {
                            if is_effectful_builtin(&call.name) {
                                new_body.push(*value);
                                continue;
                            }
                        }
                        decrement_gets(&loc.offset, &mut remaining);
                        decrement_gets(&value, &mut remaining);
                        continue;
                    }
                    new_body.push(IrNode::Set(loc, value));
                }
                other => new_body.push(other),
            }
        }

        new_body.reverse();
        cfg.node_mut(node).body = new_body;
    }

    Ok(())
}

pub struct BasicDeadStoreElimination;

impl OptimizationPass for BasicDeadStoreElimination {
    fn name(&self) -> &'static str {
        "BasicDeadStoreElimination"
    }

    fn run(&self, cfg: &mut Cfg) -> Result<(), CompileError> {
        run_basic_dse(cfg)
    }
}

pub static BASIC_DEAD_STORE_ELIMINATION: BasicDeadStoreElimination = BasicDeadStoreElimination;
