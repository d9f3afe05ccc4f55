//! The check functions backing [`super::ContractViolation`].

use std::collections::HashMap;

use chartc_core::{Cfg, LocRef, TempRef};

use crate::contracts::ContractViolation;
use crate::interpreter::{Interpreter, InterpreterConfig};

/// Property 1 (semantic preservation): interpreting `before` and `after`
/// under the same deterministic configuration must produce the same
/// return value. Returns a single-element `Vec` on drift, empty on match.
pub fn check_semantic_preservation(before: &Cfg, after: &Cfg) -> Vec<ContractViolation> {
    let mut interp_before = Interpreter::new(InterpreterConfig::default());
    let mut interp_after = Interpreter::new(InterpreterConfig::default());
    let (Ok(b), Ok(a)) = (interp_before.interpret(before), interp_after.interpret(after)) else {
        // A pass that turns a terminating program into a non-terminating
        // or erroring one is itself a correctness bug, but not one this
        // property (stated only over inputs where both terminate) covers.
        return Vec::new();
    };
    if b == a {
        Vec::new()
    } else {
        vec![ContractViolation::SemanticDrift {
            block: None,
            before: b,
            after: a,
        }]
    }
}

/// Property 3 (edge-condition normal form): no block has two outgoing
/// edges sharing a condition; a two-armed conditional uses exactly
/// `{None, Some(0)}`; a switch has at most one default (`None`) edge.
pub fn check_edge_condition_normal_form(cfg: &Cfg) -> Vec<ContractViolation> {
    let mut violations = Vec::new();
    for node in cfg.nodes() {
        let edges = cfg.edges_from(node);
        let mut seen: Vec<Option<f64>> = Vec::new();
        let mut none_count = 0;
        for (_, edge) in &edges {
            let cond = edge.condition.as_ref().and_then(|c| c.constant());
            if cond.is_none() {
                none_count += 1;
            }
            if seen.contains(&cond) {
                violations.push(ContractViolation::DuplicateEdgeCondition { block: node });
            } else {
                seen.push(cond);
            }
        }
        if none_count > 1 {
            violations.push(ContractViolation::MultipleSwitchDefaults { block: node });
        }
        if edges.len() == 2 {
            let conditions: Vec<Option<f64>> = edges
                .iter()
                .map(|(_, e)| e.condition.as_ref().and_then(|c| c.constant()))
                .collect();
            let is_canonical = conditions.contains(&None) && conditions.contains(&Some(0.0));
            if !is_canonical {
                violations.push(ContractViolation::NonCanonicalBinaryBranch { block: node });
            }
        }
    }
    violations
}

/// Property 4 (temp-ref coverage): after allocation, no `Location` in
/// `cfg` still addresses a [`LocRef::Temp`].
pub fn check_temp_ref_coverage(cfg: &Cfg) -> Vec<ContractViolation> {
    use chartc_core::{IrNode, IrVisitor};

    struct TempFinder {
        found: Vec<TempRef>,
    }
    impl IrVisitor for TempFinder {
        fn visit_location(&mut self, loc: &chartc_core::Location) {
            self.visit_ir(&loc.offset);
            match &loc.r#ref {
                LocRef::Temp(t) => self.found.push(t.clone()),
                LocRef::Inline(inner) => self.visit_ir(inner),
                _ => {}
            }
        }
    }

    let mut finder = TempFinder { found: Vec::new() };
    for node in cfg.nodes() {
        let data = cfg.node(node);
        for stmt in &data.body {
            finder.visit_ir(stmt);
        }
        if let Some(test) = &data.test {
            finder.visit_ir(test);
        }
    }
    finder
        .found
        .into_iter()
        .map(|temp| ContractViolation::UnallocatedTempRef { temp })
        .collect()
}

/// Property 6 (CCP soundness): every `(temp, folded-constant)` CCP
/// claimed must match the value actually observed in `memory` for that
/// temp's resolved `(block, index)` slot.
pub fn check_ccp_soundness(
    folded: &HashMap<TempRef, f64>,
    resolved_slots: &HashMap<TempRef, (i64, i64)>,
    memory: &crate::memory::Memory,
) -> Vec<ContractViolation> {
    let mut violations = Vec::new();
    for (temp, &expected) in folded {
        let Some(&(block, index)) = resolved_slots.get(temp) else {
            continue;
        };
        if let Some(observed) = memory.peek(block, index) {
            if observed != expected {
                violations.push(ContractViolation::CcpUnsoundFold {
                    temp: temp.clone(),
                    folded: expected,
                    observed,
                });
            }
        }
    }
    violations
}
