//! Computes each temporary's required size by scanning every `Location`
//! that addresses it across a CFG (spec §4.3).
//!
//! Walks every node's body and test with [`IrVisitor`], recording the
//! largest `base + span` reached by any occurrence of each `TempRef` --
//! a location accessed at a nonzero base needs its slot sized past that
//! base, not just by its own span. A `Location` addressing a
//! [`LocRef::Temp`] with no `span` set is a hard error: the allocator has
//! nothing to size the slot from.

use std::collections::HashMap;

use crate::cfg::Cfg;
use crate::error::CoreError;
use crate::ir::{IrNode, LocRef, Location, TempRef};
use crate::ir_visitor::IrVisitor;

struct SizeCollector {
    sizes: HashMap<TempRef, u32>,
    error: Option<CoreError>,
}

impl IrVisitor for SizeCollector {
    fn visit_location(&mut self, loc: &Location) {
        self.visit_ir(&loc.offset);
        if let LocRef::Temp(temp) = &loc.r#ref {
            match loc.span {
                Some(span) => {
                    let extent = (loc.base + span as i64).max(0) as u32;
                    let entry = self.sizes.entry(temp.clone()).or_insert(0);
                    *entry = (*entry).max(extent);
                }
                None => {
                    if self.error.is_none() {
                        self.error = Some(CoreError::MissingSpan(temp.clone()));
                    }
                }
            }
        }
        if let LocRef::Inline(inner) = &loc.r#ref {
            self.visit_ir(inner);
        }
    }
}

/// Computes the required span of every temporary referenced in `cfg`.
///
/// Errors with `CoreError::MissingSpan` on the first temp-valued
/// `Location` found without a `span`, since such a location gives the
/// allocator no way to size the slot.
pub fn get_temp_ref_sizes(cfg: &Cfg) -> Result<HashMap<TempRef, u32>, CoreError> {
    let mut collector = SizeCollector {
        sizes: HashMap::new(),
        error: None,
    };
    for node_id in cfg.nodes() {
        let node = cfg.node(node_id);
        for stmt in &node.body {
            collector.visit_ir(stmt);
        }
        if let Some(test) = &node.test {
            collector.visit_ir(test);
        }
    }
    if let Some(err) = collector.error {
        return Err(err);
    }
    Ok(collector.sizes)
}
