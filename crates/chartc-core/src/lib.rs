//! Core data model for the compiler backend: the IR node algebra, the
//! control-flow graph it lives in, scope-based lowering from a statement
//! tree into that graph, and the traversal orders every later pass relies
//! on.
//!
//! Layering (leaves first): [`ir`] < [`cfg`] < [`scope`] < [`traversal`].
//! [`temp_sizes`] is a small cross-cutting analysis used by passes and by
//! the interpreter crate, kept here to avoid a dependency cycle.

pub mod cfg;
pub mod effects;
pub mod error;
pub mod ir;
pub mod ir_visitor;
pub mod memory_block;
pub mod scope;
pub mod temp_sizes;
pub mod traversal;

pub use cfg::{Cfg, CfgEdgeData, CfgNodeData, CfgNodeId, Phi};
pub use effects::{is_effectful_builtin, EFFECTFUL_BUILTINS};
pub use error::CoreError;
pub use ir::{FuncCall, IrNode, LocRef, Location, SsaRef, TempRef};
pub use ir_visitor::{IrTransformer, IrVisitor};
pub use memory_block::MemoryBlock;
pub use scope::{
    CompilationContext, CompilationGuard, Flattenable, Scope, ScopeGraph, ScopeId, StatementId,
};
pub use temp_sizes::get_temp_ref_sizes;
