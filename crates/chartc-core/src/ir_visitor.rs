//! Structural traversal over [`IrNode`] trees.
//!
//! `IrVisitor` walks read-only; `IrTransformer` rebuilds the tree,
//! letting a pass override just the node kinds it cares about while
//! falling through to structural recursion everywhere else.

use crate::ir::{FuncCall, IrNode, LocRef, Location};

/// Read-only walk over an IR tree.
///
/// Default method bodies recurse into children; override only the node
/// kinds a given pass needs to inspect.
pub trait IrVisitor {
    fn visit_ir(&mut self, node: &IrNode) {
        match node {
            IrNode::Const(_) => {}
            IrNode::Comment(_) => {}
            IrNode::Func(call) => self.visit_func(call),
            IrNode::Get(loc) => self.visit_location(loc),
            IrNode::Set(loc, value) => {
                self.visit_location(loc);
                self.visit_ir(value);
            }
        }
    }

    fn visit_func(&mut self, call: &FuncCall) {
        for arg in &call.args {
            self.visit_ir(arg);
        }
    }

    /// Only the offset is recursed into; a [`crate::ir::LocRef::Inline`]
    /// ref is never walked (matching the behavior it was ported from:
    /// a computed ref addresses a block by value, and its own internal
    /// structure is not part of the IR tree shape passes reason about).
    fn visit_location(&mut self, loc: &Location) {
        self.visit_ir(&loc.offset);
    }
}

/// Structural-recursion rewrite over an IR tree.
///
/// Default method bodies rebuild each node from its transformed
/// children; override a node kind to replace it (calling the default
/// recursion first, to transform children, is usually what you want).
pub trait IrTransformer {
    fn transform_ir(&mut self, node: IrNode) -> IrNode {
        match node {
            IrNode::Const(v) => IrNode::Const(v),
            IrNode::Comment(msg) => IrNode::Comment(msg),
            IrNode::Func(call) => IrNode::Func(self.transform_func(call)),
            IrNode::Get(loc) => IrNode::Get(self.transform_location(loc)),
            IrNode::Set(loc, value) => {
                let loc = self.transform_location(loc);
                let value = self.transform_ir(*value);
                IrNode::Set(loc, Box::new(value))
            }
        }
    }

    fn transform_func(&mut self, call: FuncCall) -> FuncCall {
        FuncCall {
            name: call.name,
            args: call
                .args
                .into_iter()
                .map(|arg| self.transform_ir(arg))
                .collect(),
        }
    }

    fn transform_location(&mut self, loc: Location) -> Location {
        let r#ref = match loc.r#ref {
            LocRef::Inline(inner) => LocRef::Inline(Box::new(self.transform_ir(*inner))),
            other => other,
        };
        Location {
            r#ref,
            offset: Box::new(self.transform_ir(*loc.offset)),
            base: loc.base,
            span: loc.span,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::TempRef;

    struct ConstCounter {
        count: usize,
    }

    impl IrVisitor for ConstCounter {
        fn visit_ir(&mut self, node: &IrNode) {
            if let IrNode::Const(_) = node {
                self.count += 1;
            }
            match node {
                IrNode::Func(call) => self.visit_func(call),
                IrNode::Get(loc) | IrNode::Set(loc, _) => self.visit_location(loc),
                _ => {}
            }
            if let IrNode::Set(_, value) = node {
                self.visit_ir(value);
            }
        }
    }

    #[test]
    fn visitor_counts_nested_constants() {
        let node = IrNode::func(
            "Add",
            [IrNode::Const(1.0), IrNode::func("Negate", [IrNode::Const(2.0)])],
        );
        let mut counter = ConstCounter { count: 0 };
        counter.visit_ir(&node);
        assert_eq!(counter.count, 2);
    }

    struct ZeroOutConsts;

    impl IrTransformer for ZeroOutConsts {
        fn transform_ir(&mut self, node: IrNode) -> IrNode {
            match node {
                IrNode::Const(_) => IrNode::Const(0.0),
                other => {
                    let default = IrTransformer::transform_ir(&mut Passthrough, other);
                    default
                }
            }
        }
    }

    struct Passthrough;
    impl IrTransformer for Passthrough {}

    #[test]
    fn transformer_rewrites_every_constant() {
        let node = IrNode::func("Add", [IrNode::Const(1.0), IrNode::Const(2.0)]);
        let rewritten = ZeroOutConsts.transform_ir(node);
        match rewritten {
            IrNode::Func(call) => {
                for arg in call.args {
                    assert_eq!(arg, IrNode::Const(0.0));
                }
            }
            _ => panic!("expected func"),
        }
    }

    #[test]
    fn transformer_preserves_location_fields() {
        let loc = Location::new(
            LocRef::Temp(TempRef("t".into())),
            IrNode::Const(3.0),
            5,
            Some(2),
        );
        let transformed = Passthrough.transform_location(loc.clone());
        assert_eq!(transformed, loc);
    }
}
