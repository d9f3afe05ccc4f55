//! The partial evaluator backing conditional constant propagation
//! (spec §4.4, §4.11): a pure function from an [`IrNode`] to `Option<f64>`,
//! `None` meaning "not known at compile time". Unlike the runtime
//! interpreter, this evaluator never owns mutable state across calls --
//! CCP drives it once per rewrite with the current lattice already
//! substituted into the tree (temp `Get`s are replaced by `Const` before
//! reaching here, a `Location` is only ever resolved through `Get`/`Set`
//! when reading a fixed, pre-seeded backing block).

use std::collections::HashMap;

use chartc_core::{FuncCall, IrNode, LocRef, Location};

/// Tuning knobs for one partial-evaluation pass.
#[derive(Debug, Clone, Default)]
pub struct PartialEvalConfig {
    /// Whether `Get`/`Set` against a block in `backing_blocks` may be
    /// folded at all. `false` means every `Get`/`Set` is unknown,
    /// matching CCP's default stance before a slot has entered the
    /// lattice.
    pub allow_vars: bool,
    /// Known compile-time values for fixed memory blocks (e.g. engine
    /// ROM constants), keyed by `(block_id, absolute_index)`. Only
    /// consulted when `allow_vars` is set.
    pub backing_blocks: HashMap<(i64, i64), f64>,
}

/// A pure, non-owning partial evaluator. Reused across many `fold` calls
/// within one pass invocation; carries no interior mutability.
pub struct PartialEvaluator<'a> {
    config: &'a PartialEvalConfig,
}

impl<'a> PartialEvaluator<'a> {
    pub fn new(config: &'a PartialEvalConfig) -> Self {
        PartialEvaluator { config }
    }

    /// Folds `node` to a compile-time value, or `None` if any
    /// contributing subexpression is unknown.
    pub fn fold(&self, node: &IrNode) -> Option<f64> {
        match node {
            IrNode::Const(v) => Some(*v),
            IrNode::Comment(_) => Some(0.0),
            IrNode::Func(call) => self.fold_func(call),
            IrNode::Get(loc) => self.fold_get(loc),
            // A `Set`'s folded value is the folded value being stored;
            // the write itself has no compile-time result to read back
            // without lattice tracking, which is CCP's job, not this
            // evaluator's.
            IrNode::Set(_, value) => self.fold(value),
        }
    }

    fn fold_get(&self, loc: &Location) -> Option<f64> {
        if !self.config.allow_vars {
            return None;
        }
        let offset = self.fold(&loc.offset)? as i64;
        let block = match &loc.r#ref {
            LocRef::Block(id) => *id,
            LocRef::Inline(inner) => self.fold(inner)? as i64,
            LocRef::Temp(_) | LocRef::Ssa(_) => return None,
        };
        self.config
            .backing_blocks
            .get(&(block, loc.base + offset))
            .copied()
    }

    fn fold_func(&self, call: &FuncCall) -> Option<f64> {
        match call.name.as_str() {
            "If" => {
                let [cond, then, otherwise] = three(&call.args)?;
                match self.fold(cond)? {
                    c if c != 0.0 => self.fold(then),
                    _ => self.fold(otherwise),
                }
            }
            "And" => {
                for arg in &call.args {
                    match self.fold(arg) {
                        Some(v) if v == 0.0 => return Some(0.0),
                        Some(_) => continue,
                        None => return None,
                    }
                }
                Some(1.0)
            }
            "Or" => {
                for arg in &call.args {
                    match self.fold(arg) {
                        Some(v) if v != 0.0 => return Some(1.0),
                        Some(_) => continue,
                        None => return None,
                    }
                }
                Some(0.0)
            }
            "Not" => {
                let v = self.fold(one(&call.args)?)?;
                Some(if v == 0.0 { 1.0 } else { 0.0 })
            }
            "Multiply" => {
                // Short-circuits to 0 if any argument folds to 0, even
                // if another argument is unknown (spec §4.4 step 2).
                let mut unknown = false;
                let mut acc = 1.0;
                for arg in &call.args {
                    match self.fold(arg) {
                        Some(v) if v == 0.0 => return Some(0.0),
                        Some(v) => acc *= v,
                        None => unknown = true,
                    }
                }
                if unknown {
                    None
                } else {
                    Some(acc)
                }
            }
            "Add" => fold_all(&call.args, self, 0.0, |a, b| a + b),
            "Subtract" => fold_left_assoc(&call.args, self, |a, b| a - b),
            "Divide" => fold_left_assoc(&call.args, self, |a, b| if b == 0.0 { f64::NAN } else { a / b }),
            "Negate" => self.fold(one(&call.args)?).map(|v| -v),
            "Min" => fold_left_assoc(&call.args, self, f64::min),
            "Max" => fold_left_assoc(&call.args, self, f64::max),
            "Floor" => self.fold(one(&call.args)?).map(f64::floor),
            "Ceil" => self.fold(one(&call.args)?).map(f64::ceil),
            "Round" => self.fold(one(&call.args)?).map(f64::round),
            "Equal" => self.fold_cmp(&call.args, |a, b| a == b),
            "NotEqual" => self.fold_cmp(&call.args, |a, b| a != b),
            "LessThan" => self.fold_cmp(&call.args, |a, b| a < b),
            "LessEqual" => self.fold_cmp(&call.args, |a, b| a <= b),
            "GreaterThan" => self.fold_cmp(&call.args, |a, b| a > b),
            "GreaterEqual" => self.fold_cmp(&call.args, |a, b| a >= b),
            _ => None,
        }
    }

    fn fold_cmp(&self, args: &[IrNode], cmp: impl Fn(f64, f64) -> bool) -> Option<f64> {
        let [a, b] = two(args)?;
        let a = self.fold(a)?;
        let b = self.fold(b)?;
        Some(if cmp(a, b) { 1.0 } else { 0.0 })
    }
}

fn fold_all(
    args: &[IrNode],
    ev: &PartialEvaluator,
    init: f64,
    op: impl Fn(f64, f64) -> f64,
) -> Option<f64> {
    let mut acc = init;
    for arg in args {
        acc = op(acc, ev.fold(arg)?);
    }
    Some(acc)
}

fn fold_left_assoc(
    args: &[IrNode],
    ev: &PartialEvaluator,
    op: impl Fn(f64, f64) -> f64,
) -> Option<f64> {
    let mut iter = args.iter();
    let mut acc = ev.fold(iter.next()?)?;
    for arg in iter {
        acc = op(acc, ev.fold(arg)?);
    }
    Some(acc)
}

fn one(args: &[IrNode]) -> Option<&IrNode> {
    match args {
        [a] => Some(a),
        _ => None,
    }
}

fn two(args: &[IrNode]) -> Option<[&IrNode; 2]> {
    match args {
        [a, b] => Some([a, b]),
        _ => None,
    }
}

fn three(args: &[IrNode]) -> Option<[&IrNode; 3]> {
    match args {
        [a, b, c] => Some([a, b, c]),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folds_pure_arithmetic() {
        let cfg = PartialEvalConfig::default();
        let ev = PartialEvaluator::new(&cfg);
        let node = IrNode::func(
            "Subtract",
            [IrNode::func("Multiply", [IrNode::func("Add", [IrNode::Const(2.0), IrNode::Const(3.0)]), IrNode::Const(4.0)]), IrNode::Const(1.0)],
        );
        assert_eq!(ev.fold(&node), Some(19.0));
    }

    #[test]
    fn multiply_short_circuits_on_zero_even_with_unknown_sibling() {
        let cfg = PartialEvalConfig::default();
        let ev = PartialEvaluator::new(&cfg);
        let unknown_get = IrNode::get(Location::new(
            chartc_core::LocRef::Block(5),
            IrNode::Const(0.0),
            0,
            Some(1),
        ));
        let node = IrNode::func("Multiply", [IrNode::Const(0.0), unknown_get]);
        assert_eq!(ev.fold(&node), Some(0.0));
    }

    #[test]
    fn if_only_evaluates_the_taken_branch() {
        let cfg = PartialEvalConfig::default();
        let ev = PartialEvaluator::new(&cfg);
        let unknown_get = IrNode::get(Location::new(
            chartc_core::LocRef::Block(5),
            IrNode::Const(0.0),
            0,
            Some(1),
        ));
        let node = IrNode::func("If", [IrNode::Const(1.0), IrNode::Const(42.0), unknown_get]);
        assert_eq!(ev.fold(&node), Some(42.0));
    }

    #[test]
    fn get_is_unknown_unless_allow_vars_with_a_seeded_block() {
        let loc = Location::new(chartc_core::LocRef::Block(5), IrNode::Const(0.0), 10, Some(1));
        let node = IrNode::get(loc);

        let cfg = PartialEvalConfig::default();
        let ev = PartialEvaluator::new(&cfg);
        assert_eq!(ev.fold(&node), None);

        let mut cfg2 = PartialEvalConfig {
            allow_vars: true,
            ..Default::default()
        };
        cfg2.backing_blocks.insert((5, 10), 7.0);
        let ev2 = PartialEvaluator::new(&cfg2);
        assert_eq!(ev2.fold(&node), Some(7.0));
    }

    #[test]
    fn unknown_comparison_operand_yields_none() {
        let cfg = PartialEvalConfig::default();
        let ev = PartialEvaluator::new(&cfg);
        let unknown_get = IrNode::get(Location::new(
            chartc_core::LocRef::Block(5),
            IrNode::Const(0.0),
            0,
            Some(1),
        ));
        let node = IrNode::func("LessThan", [unknown_get, IrNode::Const(1.0)]);
        assert_eq!(ev.fold(&node), None);
    }
}
