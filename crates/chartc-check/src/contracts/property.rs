//! Property-based testing harness for the semantic-preservation property
//! (spec §8 property 1).
//!
//! Generates small, well-formed, randomized CFGs using a deterministic
//! PRNG and runs each through a caller-supplied pass function, checking
//! [`check_semantic_preservation`] on the result. Reproducibility: the
//! same `random_seed` always generates the same sequence of CFGs.

use rand::Rng;
use rand_chacha::ChaCha8Rng;
use rand::SeedableRng;

use chartc_core::{Cfg, CfgEdgeData, CfgNodeData, IrNode, LocRef, Location, TempRef};

use crate::contracts::check::check_semantic_preservation;
use crate::contracts::ContractViolation;

/// Configuration for a property test run.
#[derive(Debug, Clone)]
pub struct PropertyTestConfig {
    /// Number of randomized CFGs to generate and check.
    pub iterations: u32,
    /// Random seed for reproducibility.
    pub random_seed: u64,
}

/// Result of a property test run.
#[derive(Debug, Clone)]
pub struct PropertyTestResult {
    pub total_run: u32,
    pub passed: u32,
    pub failures: Vec<PropertyTestFailure>,
}

/// A single property test failure: the generated CFG and the violation
/// it produced.
#[derive(Debug, Clone)]
pub struct PropertyTestFailure {
    pub cfg: Cfg,
    pub violation: ContractViolation,
}

/// Generates a small random straight-line CFG: a single block computing
/// a random arithmetic expression over `Const`s and a temp accumulator,
/// returning the accumulator.
pub fn arbitrary_straight_line_cfg(rng: &mut ChaCha8Rng) -> Cfg {
    let acc = Location::new(LocRef::Temp(TempRef("acc".into())), IrNode::Const(0.0), 0, Some(1));
    let op_count = rng.gen_range(1..6);
    let mut body = vec![IrNode::set(acc.clone(), IrNode::Const(rng.gen_range(-50..50) as f64))];
    for _ in 0..op_count {
        let op = ["Add", "Subtract", "Multiply"][rng.gen_range(0..3)];
        let operand = rng.gen_range(-10..10) as f64;
        body.push(IrNode::set(
            acc.clone(),
            IrNode::func(op, [IrNode::get(acc.clone()), IrNode::Const(operand)]),
        ));
    }
    let mut cfg = Cfg::new();
    let entry = cfg.add_node(CfgNodeData::new(body, Some(IrNode::get(acc))));
    cfg.set_entry_node(entry);
    cfg.set_exit_node(entry);
    cfg
}

/// Generates a small random diamond-shaped CFG: entry branches on a
/// random boolean constant into two arms writing different constants to
/// an accumulator, rejoining at an exit that returns it.
pub fn arbitrary_branching_cfg(rng: &mut ChaCha8Rng) -> Cfg {
    let acc = Location::new(LocRef::Temp(TempRef("acc".into())), IrNode::Const(0.0), 0, Some(1));
    let cond = if rng.gen_bool(0.5) { 1.0 } else { 0.0 };

    let mut cfg = Cfg::new();
    let entry = cfg.add_node(CfgNodeData::new(Vec::new(), Some(IrNode::Const(cond))));
    let left = cfg.add_node(CfgNodeData::new(
        vec![IrNode::set(acc.clone(), IrNode::Const(rng.gen_range(0..100) as f64))],
        None,
    ));
    let right = cfg.add_node(CfgNodeData::new(
        vec![IrNode::set(acc.clone(), IrNode::Const(rng.gen_range(0..100) as f64))],
        None,
    ));
    let exit = cfg.add_node(CfgNodeData::new(Vec::new(), Some(IrNode::get(acc))));

    cfg.set_entry_node(entry);
    cfg.set_exit_node(exit);
    cfg.add_edge(entry, left, CfgEdgeData::unconditional());
    cfg.add_edge(entry, right, CfgEdgeData::on(IrNode::Const(0.0)));
    cfg.add_edge(left, exit, CfgEdgeData::unconditional());
    cfg.add_edge(right, exit, CfgEdgeData::unconditional());
    cfg
}

/// Runs `pass` over `config.iterations` randomly generated CFGs (half
/// straight-line, half branching), checking semantic preservation on
/// each.
pub fn run_semantic_preservation_property(
    config: PropertyTestConfig,
    pass: impl Fn(&Cfg) -> Cfg,
) -> PropertyTestResult {
    let mut rng = ChaCha8Rng::seed_from_u64(config.random_seed);
    let mut failures = Vec::new();
    let mut passed = 0;

    for i in 0..config.iterations {
        let cfg = if i % 2 == 0 {
            arbitrary_straight_line_cfg(&mut rng)
        } else {
            arbitrary_branching_cfg(&mut rng)
        };
        let after = pass(&cfg);
        let violations = check_semantic_preservation(&cfg, &after);
        match violations.into_iter().next() {
            None => passed += 1,
            Some(violation) => failures.push(PropertyTestFailure { cfg, violation }),
        }
    }

    PropertyTestResult {
        total_run: config.iterations,
        passed,
        failures,
    }
}
