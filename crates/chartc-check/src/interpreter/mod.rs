//! Total runtime interpreter over a [`Cfg`], used as the oracle for
//! semantic-preservation testing (spec §8 property 1) and for the literal
//! end-to-end scenarios in `chartc-codegen/tests`.
//!
//! Threads a `(block, test_value)` state machine: each block's body is
//! executed for effect, its `test` (if any) is evaluated, and the next
//! block is picked by exact match on the test value, falling back to the
//! `None`-condition edge, and finally halting with `0.0` if neither
//! exists. A block with no outgoing edges is an exit: its `test` (or
//! `0.0` if it has none) is the program's return value.

mod builtins;
mod rng;

pub use builtins::call_builtin;
pub use rng::Rng;

use chartc_core::{Cfg, CfgNodeId, FuncCall, IrNode, LocRef, Location};

use crate::error::{RuntimeError, Warning};
use crate::memory::Memory;

/// Tuning knobs for one interpreter run.
#[derive(Debug, Clone)]
pub struct InterpreterConfig {
    /// Seed for the `Random`/`RandomInteger` builtins; `None` seeds from
    /// entropy (non-deterministic — only appropriate outside tests).
    pub seed: Option<u64>,
    /// Whether an uninitialized memory read returns `0.0` (the default,
    /// matching engine semantics) or fails with `UninitializedRead`.
    pub allow_uninitialized_reads: bool,
    /// A hard cap on interpreted blocks, guarding against a miscompiled
    /// CFG that loops forever (e.g. a broken back-edge after a bad pass).
    pub max_steps: usize,
}

impl Default for InterpreterConfig {
    fn default() -> Self {
        InterpreterConfig {
            seed: Some(0),
            allow_uninitialized_reads: true,
            max_steps: 1_000_000,
        }
    }
}

/// Owns the PRNG and memory for one interpretation session.
pub struct Interpreter {
    memory: Memory,
    rng: Rng,
    max_steps: usize,
}

impl Interpreter {
    pub fn new(config: InterpreterConfig) -> Self {
        let mut memory = Memory::new();
        memory.allow_uninitialized_reads = config.allow_uninitialized_reads;
        Interpreter {
            memory,
            rng: Rng::new(config.seed),
            max_steps: config.max_steps,
        }
    }

    pub fn warnings(&self) -> &[Warning] {
        self.memory.warnings()
    }

    pub fn take_warnings(&mut self) -> Vec<Warning> {
        self.memory.take_warnings()
    }

    pub fn memory(&self) -> &Memory {
        &self.memory
    }

    pub fn memory_mut(&mut self) -> &mut Memory {
        &mut self.memory
    }

    /// Interprets `cfg` from its entry node, returning the final exit
    /// block's test value (or `0.0` if it has none).
    pub fn interpret(&mut self, cfg: &Cfg) -> Result<f64, RuntimeError> {
        let Some(mut current) = cfg.entry_node() else {
            return Ok(0.0);
        };
        for _ in 0..self.max_steps {
            let node = cfg.node(current);
            for stmt in &node.body {
                self.eval_ir(stmt)?;
            }
            let test_value = match &node.test {
                Some(test) => Some(self.eval_ir(test)?),
                None => None,
            };
            let edges = cfg.edges_from(current);
            if edges.is_empty() {
                return Ok(test_value.unwrap_or(0.0));
            }
            let next = pick_successor(&edges, test_value, current);
            match next {
                Some(to) => current = to,
                None => return Ok(0.0),
            }
        }
        Ok(0.0)
    }

    /// Evaluates a single IR node for its value, applying any side effect.
    pub fn eval_ir(&mut self, node: &IrNode) -> Result<f64, RuntimeError> {
        match node {
            IrNode::Const(v) => Ok(*v),
            IrNode::Comment(_) => Ok(0.0),
            IrNode::Func(call) => self.eval_func(call),
            IrNode::Get(loc) => self.eval_get(loc),
            IrNode::Set(loc, value) => self.eval_set(loc, value),
        }
    }

    fn eval_func(&mut self, call: &FuncCall) -> Result<f64, RuntimeError> {
        let mut args = Vec::with_capacity(call.args.len());
        for arg in &call.args {
            args.push(self.eval_ir(arg)?);
        }
        builtins::call_builtin(&call.name, &args, &mut self.rng)
    }

    fn resolve_location(&mut self, loc: &Location) -> Result<(i64, i64), RuntimeError> {
        let offset = self.eval_ir(&loc.offset)? as i64;
        let block = match &loc.r#ref {
            LocRef::Block(id) => *id,
            LocRef::Inline(inner) => self.eval_ir(inner)? as i64,
            LocRef::Temp(_) | LocRef::Ssa(_) => {
                return Err(RuntimeError::Core(chartc_core::CoreError::MalformedEdgeSet {
                    reason: "temp/ssa location reached the runtime interpreter unallocated".into(),
                }))
            }
        };
        Ok((block, offset))
    }

    fn eval_get(&mut self, loc: &Location) -> Result<f64, RuntimeError> {
        let (block, offset) = self.resolve_location(loc)?;
        self.memory.read(block, loc.base, offset, loc.span)
    }

    fn eval_set(&mut self, loc: &Location, value: &IrNode) -> Result<f64, RuntimeError> {
        let result = self.eval_ir(value)?;
        let (block, offset) = self.resolve_location(loc)?;
        self.memory.write(block, loc.base, offset, result);
        Ok(result)
    }
}

/// Picks the outgoing edge whose condition exactly matches `test_value`,
/// falling back to the unconditional (`None`-condition) edge. `block` is
/// only used to label a `NoMatchingEdge` error, which this function never
/// itself returns — the caller treats "no match" as halting at `0.0` per
/// §4.11, not as a hard failure.
fn pick_successor(
    edges: &[(CfgNodeId, chartc_core::CfgEdgeData)],
    test_value: Option<f64>,
    _block: CfgNodeId,
) -> Option<CfgNodeId> {
    if let Some(value) = test_value {
        if let Some((to, _)) = edges
            .iter()
            .find(|(_, e)| e.condition.as_ref().and_then(|c| c.constant()) == Some(value))
        {
            return Some(*to);
        }
    }
    edges
        .iter()
        .find(|(_, e)| e.condition.is_none())
        .map(|(to, _)| *to)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chartc_core::{CfgEdgeData, CfgNodeData};

    #[test]
    fn straight_line_cfg_returns_exit_test() {
        let mut cfg = Cfg::new();
        let entry = cfg.add_node(CfgNodeData::new(Vec::new(), None));
        let exit = cfg.add_node(CfgNodeData::new(Vec::new(), Some(IrNode::Const(19.0))));
        cfg.set_entry_node(entry);
        cfg.set_exit_node(exit);
        cfg.add_edge(entry, exit, CfgEdgeData::unconditional());

        let mut interp = Interpreter::new(InterpreterConfig::default());
        assert_eq!(interp.interpret(&cfg).unwrap(), 19.0);
    }

    #[test]
    fn binary_branch_picks_true_arm() {
        let mut cfg = Cfg::new();
        let entry = cfg.add_node(CfgNodeData::new(Vec::new(), Some(IrNode::Const(1.0))));
        let left = cfg.add_node(CfgNodeData::new(Vec::new(), Some(IrNode::Const(1.0))));
        let right = cfg.add_node(CfgNodeData::new(Vec::new(), Some(IrNode::Const(2.0))));
        cfg.set_entry_node(entry);
        cfg.add_edge(entry, left, CfgEdgeData::unconditional());
        cfg.add_edge(entry, right, CfgEdgeData::on(IrNode::Const(0.0)));

        let mut interp = Interpreter::new(InterpreterConfig::default());
        assert_eq!(interp.interpret(&cfg).unwrap(), 1.0);
    }

    #[test]
    fn set_then_get_round_trips_through_memory() {
        let loc = Location::new(LocRef::Block(1), IrNode::Const(0.0), 10, Some(1));
        let mut cfg = Cfg::new();
        let entry = cfg.add_node(CfgNodeData::new(
            vec![IrNode::set(loc.clone(), IrNode::Const(7.0))],
            Some(IrNode::get(loc)),
        ));
        cfg.set_entry_node(entry);

        let mut interp = Interpreter::new(InterpreterConfig::default());
        assert_eq!(interp.interpret(&cfg).unwrap(), 7.0);
    }

    #[test]
    fn unmatched_switch_with_no_default_halts_at_zero() {
        let mut cfg = Cfg::new();
        let entry = cfg.add_node(CfgNodeData::new(Vec::new(), Some(IrNode::Const(99.0))));
        let a = cfg.add_node(CfgNodeData::new(Vec::new(), Some(IrNode::Const(1.0))));
        cfg.set_entry_node(entry);
        cfg.add_edge(entry, a, CfgEdgeData::on(IrNode::Const(1.0)));

        let mut interp = Interpreter::new(InterpreterConfig::default());
        assert_eq!(interp.interpret(&cfg).unwrap(), 0.0);
    }

    #[test]
    fn loop_sum_zero_to_ten_interprets_to_forty_five() {
        // s = 0; i = 0; while i < 10 { s += i; i += 1 }; return s
        let s = Location::new(LocRef::Block(100), IrNode::Const(0.0), 0, Some(1));
        let i_loc = Location::new(LocRef::Block(100), IrNode::Const(0.0), 1, Some(1));

        let mut cfg = Cfg::new();
        let entry = cfg.add_node(CfgNodeData::new(
            vec![
                IrNode::set(s.clone(), IrNode::Const(0.0)),
                IrNode::set(i_loc.clone(), IrNode::Const(0.0)),
            ],
            None,
        ));
        let head = cfg.add_node(CfgNodeData::new(
            Vec::new(),
            Some(IrNode::func(
                "LessThan",
                [IrNode::get(i_loc.clone()), IrNode::Const(10.0)],
            )),
        ));
        let body = cfg.add_node(CfgNodeData::new(
            vec![
                IrNode::set(
                    s.clone(),
                    IrNode::func("Add", [IrNode::get(s.clone()), IrNode::get(i_loc.clone())]),
                ),
                IrNode::set(
                    i_loc.clone(),
                    IrNode::func("Add", [IrNode::get(i_loc.clone()), IrNode::Const(1.0)]),
                ),
            ],
            None,
        ));
        let exit = cfg.add_node(CfgNodeData::new(Vec::new(), Some(IrNode::get(s))));

        cfg.set_entry_node(entry);
        cfg.set_exit_node(exit);
        cfg.add_edge(entry, head, CfgEdgeData::unconditional());
        cfg.add_edge(head, body, CfgEdgeData::on(IrNode::Const(1.0)));
        cfg.add_edge(head, exit, CfgEdgeData::on(IrNode::Const(0.0)));
        cfg.add_edge(body, head, CfgEdgeData::unconditional());

        let mut interp = Interpreter::new(InterpreterConfig::default());
        assert_eq!(interp.interpret(&cfg).unwrap(), 45.0);
    }
}
