//! Runnable checks for the testable properties of spec §8.
//!
//! These are not `#[test]` functions: they're plain functions returning a
//! `Vec<ContractViolation>`, callable both from `proptest` property tests
//! in `chartc-codegen` and ad hoc from a debug build of the optimization
//! pipeline (`debug_assert_properties`, run after every pass in
//! non-release builds). Only the properties expressible purely in terms
//! of [`chartc_core::Cfg`] live here (properties 1, 3, 4, 6); preorder
//! stability (2) and engine-node acyclicity (5) need the `FlatCfg`/
//! `EngineNode` types owned by `chartc-codegen` and are checked there.

pub mod check;
pub mod property;

use std::fmt;

use chartc_core::{CfgNodeId, TempRef};

/// A single violated property, carrying enough detail to locate it.
#[derive(Debug, Clone, PartialEq)]
pub enum ContractViolation {
    /// Property 1: a pass changed observable interpreter behavior.
    SemanticDrift {
        block: Option<String>,
        before: f64,
        after: f64,
    },
    /// Property 3: two outgoing edges of one block share a condition.
    DuplicateEdgeCondition { block: CfgNodeId },
    /// Property 3: a two-armed conditional didn't use exactly
    /// `{None, Some(0)}`.
    NonCanonicalBinaryBranch { block: CfgNodeId },
    /// Property 3: a switch carried more than one `None` (default) edge.
    MultipleSwitchDefaults { block: CfgNodeId },
    /// Property 4: a temp-ref location survived past allocation.
    UnallocatedTempRef { temp: TempRef },
    /// Property 6: a slot CCP folded to a constant didn't match the
    /// interpreter's observed value on a concrete execution.
    CcpUnsoundFold {
        temp: TempRef,
        folded: f64,
        observed: f64,
    },
}

impl fmt::Display for ContractViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContractViolation::SemanticDrift { block, before, after } => write!(
                f,
                "semantic drift{}: interpreted {before} before the pass, {after} after",
                block.as_ref().map(|b| format!(" at {b}")).unwrap_or_default()
            ),
            ContractViolation::DuplicateEdgeCondition { block } => {
                write!(f, "block {block} has two outgoing edges with the same condition")
            }
            ContractViolation::NonCanonicalBinaryBranch { block } => write!(
                f,
                "block {block}'s two-armed conditional doesn't use conditions {{None, Some(0)}}"
            ),
            ContractViolation::MultipleSwitchDefaults { block } => {
                write!(f, "block {block} has more than one default (None) edge")
            }
            ContractViolation::UnallocatedTempRef { temp } => {
                write!(f, "temp ref '{temp}' survived past allocation")
            }
            ContractViolation::CcpUnsoundFold {
                temp,
                folded,
                observed,
            } => write!(
                f,
                "CCP folded '{temp}' to {folded}, but the interpreter observed {observed}"
            ),
        }
    }
}
