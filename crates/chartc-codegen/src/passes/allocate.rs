//! Temporary allocation (spec §4.9): packs every temp-ref into the
//! `TemporaryMemory` block, descending from a fixed upper index, and
//! rewrites all `Location`s accordingly. The last pass before flattening.

use std::collections::HashMap;

use chartc_core::{get_temp_ref_sizes, Cfg, IrTransformer, LocRef, Location, MemoryBlock, TempRef};

use crate::error::CompileError;
use crate::passes::{AnalysisPass, OptimizationPass, TEMP_REF_SIZING};

/// The top of `TemporaryMemory`; temp-refs pack downward from here.
pub const BASE_INDEX: i64 = 4095;

/// Assigns each temp-ref the base of its packed region, largest names
/// first so allocation is deterministic across runs.
fn assign_bases(sizes: &HashMap<TempRef, u32>) -> HashMap<TempRef, i64> {
    let mut refs: Vec<(&TempRef, u32)> = sizes.iter().map(|(r, s)| (r, *s)).collect();
    refs.sort_by(|a, b| a.0 .0.cmp(&b.0 .0));

    let mut mapping = HashMap::with_capacity(refs.len());
    let mut cursor = BASE_INDEX;
    for (r, size) in refs {
        cursor -= size as i64;
        mapping.insert(r.clone(), cursor);
    }
    mapping
}

struct AllocateRewriter<'a> {
    mapping: &'a HashMap<TempRef, i64>,
}

impl<'a> IrTransformer for AllocateRewriter<'a> {
    fn transform_location(&mut self, loc: Location) -> Location {
        let Location { r#ref, offset, base, span } = loc;
        let offset = self.transform_ir(*offset);
        match &r#ref {
            LocRef::Temp(t) => {
                let allocated_base = self.mapping.get(t).copied().unwrap_or(0);
                Location::new(LocRef::Block(MemoryBlock::TemporaryMemory.id()), offset, allocated_base + base, span)
            }
            _ => Location::new(r#ref, offset, base, span),
        }
    }
}

pub fn run_allocate(cfg: &mut Cfg) -> Result<(), CompileError> {
    let sizes = get_temp_ref_sizes(cfg)?;
    let mapping = assign_bases(&sizes);
    let mut rewriter = AllocateRewriter { mapping: &mapping };

    for node in cfg.nodes().collect::<Vec<_>>() {
        let data = cfg.node_mut(node);
        data.body = std::mem::take(&mut data.body)
            .into_iter()
            .map(|stmt| rewriter.transform_ir(stmt))
            .collect();
        data.test = data.test.take().map(|t| rewriter.transform_ir(t));
    }
    Ok(())
}

pub struct Allocate;

impl OptimizationPass for Allocate {
    fn name(&self) -> &'static str {
        "Allocate"
    }

    fn requires(&self) -> &[&'static dyn AnalysisPass] {
        static DEPS: [&dyn AnalysisPass; 1] = [&TEMP_REF_SIZING];
        &DEPS
    }

    fn run(&self, cfg: &mut Cfg) -> Result<(), CompileError> {
        run_allocate(cfg)
    }
}

pub static ALLOCATE: Allocate = Allocate;

#[cfg(test)]
mod tests {
    use super::*;
    use chartc_core::{CfgNodeData, IrNode};

    fn temp_loc(name: &str, base: i64, span: u32) -> Location {
        Location::new(LocRef::Temp(TempRef(name.into())), IrNode::Const(0.0), base, Some(span))
    }

    #[test]
    fn packs_two_temps_downward_from_base_index_without_overlap() {
        let mut cfg = Cfg::new();
        let body = vec![
            IrNode::set(temp_loc("a", 0, 2), IrNode::Const(1.0)),
            IrNode::set(temp_loc("b", 0, 3), IrNode::Const(2.0)),
        ];
        let entry = cfg.add_node(CfgNodeData::new(body, None));
        cfg.set_entry_node(entry);

        run_allocate(&mut cfg).unwrap();

        let mut bases = Vec::new();
        let mut spans = Vec::new();
        for stmt in &cfg.node(entry).body {
            if let IrNode::Set(loc, _) = stmt {
                assert_eq!(loc.r#ref, LocRef::Block(MemoryBlock::TemporaryMemory.id()));
                bases.push(loc.base);
                spans.push(loc.span.unwrap());
            }
        }
        assert_eq!(bases.len(), 2);
        assert!(bases[0] <= BASE_INDEX && bases[1] <= BASE_INDEX);
        let (lo, hi) = if bases[0] < bases[1] { (0, 1) } else { (1, 0) };
        assert_eq!(bases[lo] + spans[lo] as i64, bases[hi]);
    }

    #[test]
    fn preserves_a_nonzero_base_offset_within_its_temp() {
        let mut cfg = Cfg::new();
        let body = vec![IrNode::set(temp_loc("arr", 2, 1), IrNode::Const(5.0))];
        let entry = cfg.add_node(CfgNodeData::new(body, None));
        cfg.set_entry_node(entry);

        run_allocate(&mut cfg).unwrap();
        match &cfg.node(entry).body[0] {
            // "arr" at base 2 span 1 sizes to 3 (base + span), so it packs
            // at cursor BASE_INDEX - 3 = 4092; rewritten with its own base
            // back in, the access lands at 4092 + 2 = BASE_INDEX - 1, still
            // inside the temp's own 3-wide region.
            IrNode::Set(loc, _) => assert_eq!(loc.base, BASE_INDEX - 1),
            other => panic!("expected Set, got {other:?}"),
        }
    }
}
