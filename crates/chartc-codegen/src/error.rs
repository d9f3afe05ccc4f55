//! Codegen error types covering the optimization pipeline, flat-CFG
//! lowering, and engine-node finalization (spec §7).

use thiserror::Error;

use chartc_check::RuntimeError;
use chartc_core::CoreError;

/// Errors that can occur while compiling a statement tree to an
/// engine-node array.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CompileError {
    /// A failure surfaced by the core (scope lowering, shape validation).
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A failure surfaced by one of the two evaluators (CCP's partial
    /// evaluator, or the interpreter used by a test/property check).
    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    /// A pass declared an analysis dependency that never ran, or two
    /// passes disagreed about the shape of the CFG they share.
    #[error("pass scheduling error: {0}")]
    PassScheduling(String),

    /// Flat-CFG lowering found a block whose outgoing edges didn't match
    /// any of the three recognized shapes (none / single / branch-or-switch).
    #[error("block {block} has an edge set flat-CFG lowering cannot encode: {reason}")]
    UnencodableEdgeSet { block: String, reason: String },

    /// Engine-node finalization produced a node graph with an argument
    /// index that doesn't precede the node referencing it (would break
    /// property 5, acyclicity).
    #[error("engine-node finalization produced a forward reference at index {0}")]
    NonAcyclicEngineNodes(usize),

    /// A concrete end-to-end check (the §8 "E"-series contract checks)
    /// found a violation.
    #[error("contract violation: {0}")]
    ContractViolation(String),
}
