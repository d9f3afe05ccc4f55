//! The IR node algebra: constants, comments, function calls, memory reads
//! and writes, and the `Location` they address.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A compiler-synthesized local. Physical placement is decided by the
/// allocation pass; until then it is just a name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TempRef(pub String);

impl fmt::Display for TempRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single-assignment name, used only in φ-bearing lowering stages and
/// never emitted to the engine.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SsaRef(pub String);

impl fmt::Display for SsaRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What a [`Location`] addresses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LocRef {
    /// A compiler temporary, not yet physically placed.
    Temp(TempRef),
    /// A fixed memory block of the runtime, by numeric ID.
    Block(i64),
    /// Used only during φ-bearing lowering; never emitted.
    Ssa(SsaRef),
    /// The block itself is the result of a computed (pure) expression.
    Inline(Box<IrNode>),
}

impl fmt::Display for LocRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LocRef::Temp(t) => write!(f, "@{t}"),
            LocRef::Block(id) => write!(f, "Block${id}"),
            LocRef::Ssa(s) => write!(f, "%{s}"),
            LocRef::Inline(ir) => write!(f, "{ir}"),
        }
    }
}

/// A memory location: a block reference, a base offset, a dynamic offset
/// expression, and (for temporaries) a declared span.
///
/// `0 <= offset < span` must hold whenever `span` is set; `span` is
/// mandatory for [`LocRef::Temp`] locations (required for sizing) and may
/// be omitted for locations whose extent is fixed externally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub r#ref: LocRef,
    pub offset: Box<IrNode>,
    pub base: i64,
    pub span: Option<u32>,
}

impl Location {
    pub fn new(r#ref: LocRef, offset: IrNode, base: i64, span: Option<u32>) -> Self {
        Location {
            r#ref,
            offset: Box::new(offset),
            base,
            span,
        }
    }

    /// A single-slot location at a constant offset, as produced once an
    /// access has been proven to land on exactly one slot.
    pub fn single_slot(r#ref: LocRef, base: i64) -> Self {
        Location::new(r#ref, IrNode::Const(0.0), base, Some(1))
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(c) = self.offset.constant() {
            write!(f, "{}[{}]", self.r#ref, c as i64 + self.base)
        } else {
            match self.span {
                Some(span) => write!(
                    f,
                    "{}[{}:{}#{}]",
                    self.r#ref,
                    self.base,
                    self.base + span as i64,
                    self.offset
                ),
                None => write!(f, "{}[{}:?#{}]", self.r#ref, self.base, self.offset),
            }
        }
    }
}

/// A function call's name and ordered, side-effect-free argument list.
///
/// Only a top-level `Func` (the head of a block's body statement, or the
/// value of a `Set`) may have side effects; arguments themselves must be
/// pure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FuncCall {
    pub name: String,
    pub args: Vec<IrNode>,
}

/// A single IR node. Arguments of a `Func` and the `offset` of a
/// `Location` must themselves be pure (no nested `Set`, no effectful
/// `Func`); the only permitted effectful positions are the top of a
/// block's body and the right-hand side of a `Set`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum IrNode {
    /// A numeric literal.
    Const(f64),
    /// A no-op carrying a diagnostic message; folds to 0.
    Comment(String),
    /// A function call.
    Func(FuncCall),
    /// A memory read.
    Get(Location),
    /// A memory write; `value` may be an effectful `Func` at its top level.
    Set(Location, Box<IrNode>),
}

impl IrNode {
    pub fn func(name: impl Into<String>, args: impl IntoIterator<Item = IrNode>) -> Self {
        IrNode::Func(FuncCall {
            name: name.into(),
            args: args.into_iter().collect(),
        })
    }

    pub fn get(location: Location) -> Self {
        IrNode::Get(location)
    }

    pub fn set(location: Location, value: IrNode) -> Self {
        IrNode::Set(location, Box::new(value))
    }

    /// Returns a numeric value if this node is a literal constant, a
    /// no-op comment, or otherwise structurally foldable to one.
    /// Otherwise `None`. This is a structural check only: it never
    /// inspects memory state, so a `Get` is never "constant" by itself
    /// (constant-folding `Get`s is the job of the CCP pass, which tracks
    /// memory state explicitly).
    pub fn constant(&self) -> Option<f64> {
        match self {
            IrNode::Const(v) => Some(*v),
            IrNode::Comment(_) => Some(0.0),
            _ => None,
        }
    }
}

impl fmt::Display for IrNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IrNode::Const(v) => {
                if v.fract() == 0.0 {
                    write!(f, "{}", *v as i64)
                } else {
                    write!(f, "{v}")
                }
            }
            IrNode::Comment(msg) => write!(f, "/* {msg} */"),
            IrNode::Func(call) => {
                let args: Vec<String> = call.args.iter().map(|a| a.to_string()).collect();
                write!(f, "{}({})", call.name, args.join(", "))
            }
            IrNode::Get(loc) => write!(f, "{loc}"),
            IrNode::Set(loc, value) => write!(f, "{loc} <- {value}"),
        }
    }
}
