//! Core error types.
//!
//! Uses `thiserror` for structured, matchable error variants covering the
//! failure modes of IR shape validation and scope lowering.

use thiserror::Error;

use crate::ir::TempRef;

/// Errors produced while lowering a statement tree or validating IR shape.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CoreError {
    /// A temporary location was missing its required `span`.
    #[error("temp ref '{0}' has a location with no span")]
    MissingSpan(TempRef),

    /// A CFG node's outgoing edge set did not match any recognized shape
    /// (unconditional / binary branch / switch).
    #[error("malformed edge set on block: {reason}")]
    MalformedEdgeSet { reason: String },

    /// An emitted builtin name has no matching interpreter implementation.
    #[error("unknown builtin function: {0}")]
    UnknownBuiltin(String),

    /// A `Scope` was activated more than once.
    #[error("scope is already activated")]
    ScopeAlreadyActivated,

    /// A `Scope` was given a target (via `jump`/`jump_cond`) more than once.
    #[error("scope already has a target")]
    ScopeAlreadyEnded,

    /// A hard jump targeted a scope that was already activated.
    #[error("jump target is already activated")]
    TargetAlreadyActivated,

    /// A live jump targeted a scope that was already proven dead.
    #[error("scope is unreachable and cannot be a jump target")]
    DeadScopeSourced,

    /// A statement was evaluated after the scope region that defines it
    /// had already ended (its value "expired").
    #[error("statement used when potentially expired")]
    PotentiallyExpired,

    /// `continue_`/`break_` referenced a label with no enclosing scope.
    #[error("no enclosing scope with label '{0}' found")]
    NoEnclosingLabel(String),

    /// A statement-expansion function was re-entered while already
    /// expanding, indicating unbounded recursive macro expansion.
    #[error("recursive expansion of statement during lowering")]
    RecursiveExpansion,

    /// A literal constant was required where a dynamic value was supplied.
    #[error("constant value required: {0}")]
    ConstantRequired(String),

    /// The "active compilation" context was entered while already active.
    #[error("a compilation is already active")]
    CompilationAlreadyActive,

    /// An API requiring an active compilation context was called outside one.
    #[error("no compilation is currently active")]
    NoActiveCompilation,
}
