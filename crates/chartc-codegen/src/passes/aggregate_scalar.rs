//! Aggregate → scalar splitting (spec §4.6).
//!
//! For each temp-ref wider than one slot, a slot is **splittable** unless
//! some access with a non-constant offset and a declared span other than
//! one could land on it — such an access needs its whole covered range
//! kept as one physically contiguous unit, so that slot and its
//! non-splittable neighbors become a single **grouped** temp instead.
//! Splittable slots each get their own single-slot temp. Rewriting this
//! early (before allocation) lets CCP-style per-slot reasoning apply to
//! anything that survives as a true scalar.

use std::collections::HashMap;

use chartc_core::{get_temp_ref_sizes, Cfg, IrNode, IrTransformer, IrVisitor, LocRef, Location, TempRef};

use crate::error::CompileError;
use crate::passes::{AnalysisPass, OptimizationPass, TEMP_REF_SIZING};

struct Access {
    base: i64,
    span: u32,
    offset_const: bool,
}

struct AccessCollector<'a> {
    target: &'a TempRef,
    accesses: Vec<Access>,
}

impl<'a> IrVisitor for AccessCollector<'a> {
    fn visit_location(&mut self, loc: &Location) {
        self.visit_ir(&loc.offset);
        if let LocRef::Temp(t) = &loc.r#ref {
            if t == self.target {
                self.accesses.push(Access {
                    base: loc.base,
                    span: loc.span.unwrap_or(1),
                    offset_const: loc.offset.constant().is_some(),
                });
            }
        }
    }
}

#[derive(Clone)]
struct SlotAssignment {
    new_ref: TempRef,
    group_start: i64,
}

/// Classifies every slot of `target` (sized `size`) and returns the new
/// ref each slot has been assigned to.
fn classify_slots(target: &TempRef, size: i64, accesses: &[Access]) -> Vec<SlotAssignment> {
    let size = size.max(0) as usize;
    let mut grouped = vec![false; size];
    for access in accesses {
        if access.span != 1 && !access.offset_const {
            let start = access.base.max(0) as usize;
            let end = ((access.base + access.span as i64).max(0) as usize).min(size);
            for slot in grouped.iter_mut().take(end).skip(start) {
                *slot = true;
            }
        }
    }

    let mut assignment = Vec::with_capacity(size);
    let mut i = 0;
    while i < size {
        if grouped[i] {
            let start = i;
            let mut end = i + 1;
            while end < size && grouped[end] {
                end += 1;
            }
            let new_ref = TempRef(format!("{}${start}_{end}", target.0));
            for _ in start..end {
                assignment.push(SlotAssignment {
                    new_ref: new_ref.clone(),
                    group_start: start as i64,
                });
            }
            i = end;
        } else {
            assignment.push(SlotAssignment {
                new_ref: TempRef(format!("{}${i}", target.0)),
                group_start: i as i64,
            });
            i += 1;
        }
    }
    assignment
}

struct AggregateRewriter<'a> {
    target: &'a TempRef,
    assignment: &'a [SlotAssignment],
}

impl<'a> IrTransformer for AggregateRewriter<'a> {
    fn transform_location(&mut self, loc: Location) -> Location {
        let Location { r#ref, offset, base, span } = loc;
        let new_offset = self.transform_ir(*offset);
        match &r#ref {
            LocRef::Temp(t) if t == self.target => {
                if let Some(off) = new_offset.constant() {
                    let idx = (base + off as i64).clamp(0, self.assignment.len() as i64 - 1);
                    let a = &self.assignment[idx as usize];
                    Location::new(
                        LocRef::Temp(a.new_ref.clone()),
                        IrNode::Const(0.0),
                        idx - a.group_start,
                        Some(1),
                    )
                } else {
                    let idx = base.clamp(0, self.assignment.len() as i64 - 1);
                    let a = &self.assignment[idx as usize];
                    Location::new(
                        LocRef::Temp(a.new_ref.clone()),
                        new_offset,
                        base - a.group_start,
                        Some(span.unwrap_or(1)),
                    )
                }
            }
            _ => Location::new(r#ref, new_offset, base, span),
        }
    }
}

pub fn run_aggregate_scalar(cfg: &mut Cfg) -> Result<(), CompileError> {
    let sizes = get_temp_ref_sizes(cfg)?;
    let mut targets: Vec<(TempRef, u32)> = sizes.into_iter().filter(|(_, size)| *size > 1).collect();
    targets.sort_by(|a, b| a.0 .0.cmp(&b.0 .0));

    for (target, size) in &targets {
        let mut collector = AccessCollector {
            target,
            accesses: Vec::new(),
        };
        for node in cfg.nodes().collect::<Vec<_>>() {
            let data = cfg.node(node);
            for stmt in &data.body {
                collector.visit_ir(stmt);
            }
            if let Some(test) = &data.test {
                collector.visit_ir(test);
            }
        }

        let assignment = classify_slots(target, *size as i64, &collector.accesses);
        let mut rewriter = AggregateRewriter {
            target,
            assignment: &assignment,
        };
        for node in cfg.nodes().collect::<Vec<_>>() {
            let data = cfg.node_mut(node);
            data.body = std::mem::take(&mut data.body)
                .into_iter()
                .map(|stmt| rewriter.transform_ir(stmt))
                .collect();
            data.test = data.test.take().map(|t| rewriter.transform_ir(t));
        }
    }

    Ok(())
}

pub struct AggregateToScalar;

impl OptimizationPass for AggregateToScalar {
    fn name(&self) -> &'static str {
        "AggregateToScalar"
    }

    fn requires(&self) -> &[&'static dyn AnalysisPass] {
        static DEPS: [&dyn AnalysisPass; 1] = [&TEMP_REF_SIZING];
        &DEPS
    }

    fn run(&self, cfg: &mut Cfg) -> Result<(), CompileError> {
        run_aggregate_scalar(cfg)
    }
}

pub static AGGREGATE_TO_SCALAR: AggregateToScalar = AggregateToScalar;

#[cfg(test)]
mod tests {
    use super::*;
    use chartc_core::CfgNodeData;

    fn temp_loc(base: i64, offset: IrNode, span: u32) -> Location {
        Location::new(LocRef::Temp(TempRef("arr".into())), offset, base, Some(span))
    }

    #[test]
    fn constant_offset_slots_each_get_a_singleton_ref() {
        let mut cfg = Cfg::new();
        let body = vec![
            IrNode::set(temp_loc(0, IrNode::Const(0.0), 1), IrNode::Const(1.0)),
            IrNode::set(temp_loc(0, IrNode::Const(1.0), 1), IrNode::Const(2.0)),
        ];
        let entry = cfg.add_node(CfgNodeData::new(body, Some(IrNode::get(temp_loc(0, IrNode::Const(0.0), 1)))));
        cfg.set_entry_node(entry);

        run_aggregate_scalar(&mut cfg).unwrap();
        for stmt in &cfg.node(entry).body {
            if let IrNode::Set(loc, _) = stmt {
                match &loc.r#ref {
                    LocRef::Temp(t) => assert!(t.0.starts_with("arr$") && !t.0.contains('_')),
                    other => panic!("expected rewritten temp ref, got {other:?}"),
                }
            }
        }
    }

    #[test]
    fn dynamic_offset_access_groups_its_covered_range() {
        let mut cfg = Cfg::new();
        let dynamic_offset = IrNode::get(Location::new(chartc_core::LocRef::Block(0), IrNode::Const(0.0), 0, Some(1)));
        let body = vec![IrNode::set(temp_loc(0, dynamic_offset, 3), IrNode::Const(9.0))];
        let entry = cfg.add_node(CfgNodeData::new(body, None));
        cfg.set_entry_node(entry);

        run_aggregate_scalar(&mut cfg).unwrap();
        match &cfg.node(entry).body[0] {
            IrNode::Set(loc, _) => match &loc.r#ref {
                LocRef::Temp(t) => assert_eq!(t.0, "arr$0_3"),
                other => panic!("expected grouped ref, got {other:?}"),
            },
            other => panic!("expected Set, got {other:?}"),
        }
    }
}
