//! Optimizing compiler backend: lowers a [`chartc_core::Flattenable`]
//! statement tree into the finalized, interned engine-node array a host
//! runtime executes (spec §4.7-§4.12).
//!
//! # Modules
//!
//! - [`passes`] -- the optimization pipeline (CCP, flow coalescing,
//!   arithmetic simplification, aggregate-to-scalar, DCE/DSE, allocation)
//! - [`flat_cfg`] -- preorder flattening of the optimized CFG
//! - [`finalize`] -- engine-node lowering and interning
//! - [`compiler`] -- top-level orchestration ([`compile`])
//! - [`error`] -- [`CompileError`], the single error type this crate returns

pub mod compiler;
pub mod error;
pub mod finalize;
pub mod flat_cfg;
pub mod passes;

pub use compiler::compile;
pub use error::CompileError;
pub use finalize::EngineNode;
pub use flat_cfg::{FlatCfg, FlatCfgNode, FlatTarget};

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Which built-in pass sequence [`compile`] runs (spec §4.12's Open
/// Question resolution: a fixed choice of preset, not a freely composable
/// pass list, keeps a compiled artifact reproducible from its options alone).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OptimizationPreset {
    /// CCP, flow coalescing, arithmetic simplification, aggregate-to-scalar,
    /// DCE/DSE, allocation. Every scenario in spec §8 holds under this preset.
    Default,
    /// CCP and DCE/DSE only, for fast iterative frontend development.
    Fast,
}

impl Default for OptimizationPreset {
    fn default() -> Self {
        OptimizationPreset::Default
    }
}

/// Options controlling a single [`compile`] call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompileOptions {
    /// Which pass sequence to run.
    pub preset: OptimizationPreset,

    /// Whether to emit a `tracing` span per analysis and optimization pass.
    pub trace: bool,

    /// Name under which the compiled statement tree's entry index is
    /// recorded in [`CompileResult::script_table`].
    pub script_name: String,
}

impl Default for CompileOptions {
    fn default() -> Self {
        CompileOptions {
            preset: OptimizationPreset::Default,
            trace: false,
            script_name: "main".to_string(),
        }
    }
}

/// Result of a successful [`compile`] call: the finalized, interned
/// engine-node array, and the bijection from script name to that array's
/// entry index for every script compiled into it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompileResult {
    pub engine_nodes: Vec<EngineNode>,
    pub script_table: HashMap<String, usize>,
}
