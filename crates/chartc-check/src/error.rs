//! Runtime error types for the two IR evaluators (spec §7).

use chartc_core::CoreError;
use thiserror::Error;

/// Errors produced while interpreting or partially evaluating IR.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RuntimeError {
    /// An emitted builtin name has no matching interpreter implementation.
    #[error("unknown builtin function: {0}")]
    UnknownBuiltin(String),

    /// Division by zero during numeric evaluation.
    #[error("division by zero")]
    DivideByZero,

    /// A read or write offset resolved to a slot outside its declared span;
    /// a hard error during partial evaluation (folding it could be wrong).
    #[error("access at block {block} offset {offset} is outside its declared span {span}")]
    OutOfRangeAccess { block: i64, offset: i64, span: u32 },

    /// An uninitialized memory slot was read with `allow_uninitialized_reads`
    /// disabled.
    #[error("read of uninitialized slot at block {block} index {index}")]
    UninitializedRead { block: i64, index: i64 },

    /// A builtin was called with the wrong argument count.
    #[error("builtin '{name}' expects {expected} args, got {got}")]
    ArityMismatch {
        name: String,
        expected: usize,
        got: usize,
    },

    /// A CFG had no edges matching the current test value and no default
    /// edge to fall back to, at a node that was not an exit node.
    #[error("no matching successor edge and no default at block {block}")]
    NoMatchingEdge { block: String },

    /// A failure surfaced by the core (shape/scope errors reaching the
    /// interpreter, e.g. a missing span discovered while walking `Location`s).
    #[error(transparent)]
    Core(#[from] CoreError),
}

/// A non-fatal condition surfaced alongside a successful evaluation (spec
/// §7's Warning row): writes/reads outside a callback's declared block set,
/// or an out-of-range read tolerated by the runtime interpreter.
#[derive(Debug, Clone, PartialEq)]
pub enum Warning {
    /// A read landed outside its `Location`'s declared `[base, base+span)`
    /// range; the runtime interpreter still serves the read (rather than
    /// aborting, per §9), but the access is logged.
    OutOfRangeRead { block: i64, offset: i64, span: u32 },
    /// A write targeted a block outside the running callback's declared
    /// writable set.
    WriteOutsideWritableSet { block: i64 },
    /// A read targeted a block outside the running callback's declared
    /// readable set.
    ReadOutsideReadableSet { block: i64 },
}

impl std::fmt::Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Warning::OutOfRangeRead { block, offset, span } => write!(
                f,
                "read at block {block} offset {offset} is outside declared span {span}"
            ),
            Warning::WriteOutsideWritableSet { block } => {
                write!(f, "write to block {block} outside writable set")
            }
            Warning::ReadOutsideReadableSet { block } => {
                write!(f, "read from block {block} outside readable set")
            }
        }
    }
}
