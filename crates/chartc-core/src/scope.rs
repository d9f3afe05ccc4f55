//! Scope → CFG lowering (spec §4.2).
//!
//! A [`ScopeGraph`] is the arena that owns every [`ScopeNode`] for one
//! lowering session; it is local to a single `lower_statements` call and
//! discarded once the [`Cfg`] has been snapshot out of it. `Scope` is the
//! handle a statement's [`Flattenable::evaluate`] hook mutates: it can push
//! IR onto the scope's body, set its branch test, and record how control
//! leaves the scope (`jump`, `jump_back`, `jump_cond`).

use std::collections::{HashMap, HashSet};

use crate::cfg::{Cfg, CfgEdgeData, CfgNodeData, CfgNodeId};
use crate::error::CoreError;
use crate::ir::IrNode;

/// Identity of a statement in the frontend's statement tree, used to track
/// which statements a scope has already evaluated or has let expire.
/// Assigned by the frontend; the core never interprets it beyond equality.
pub type StatementId = u64;

/// Arena index of a [`ScopeNode`] within its owning [`ScopeGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(usize);

/// How control leaves a scope once its target has been set.
#[derive(Debug, Clone, PartialEq)]
enum ScopeTarget {
    /// No successor has been recorded yet.
    Unset,
    /// `jump`/`jump_back`: a single unconditional (or back-edge) successor.
    Jump(ScopeId),
    /// `jump_cond`: a condition → target mapping, `None` is the default arm.
    Cond(Vec<(Option<f64>, ScopeId)>),
    /// This scope is the program exit; it has no successor.
    Exit,
}

struct ScopeNode {
    label: Option<String>,
    body: Vec<IrNode>,
    test: Option<IrNode>,
    hard_preds: Vec<ScopeId>,
    soft_preds: Vec<ScopeId>,
    target: ScopeTarget,
    evaluated: HashSet<StatementId>,
    expired: HashSet<StatementId>,
    parent: Option<ScopeId>,
    next: Option<ScopeId>,
    /// Self-target for `continue`, set by the loop construct that owns
    /// this scope as its head.
    continue_target: Option<ScopeId>,
    /// Target for `break`, set by the loop construct that owns this scope.
    break_target: Option<ScopeId>,
    activated: bool,
    dead: bool,
    is_entry: bool,
    is_exit: bool,
}

impl ScopeNode {
    fn fresh(parent: Option<ScopeId>, label: Option<String>) -> Self {
        ScopeNode {
            label,
            body: Vec::new(),
            test: None,
            hard_preds: Vec::new(),
            soft_preds: Vec::new(),
            target: ScopeTarget::Unset,
            evaluated: HashSet::new(),
            expired: HashSet::new(),
            parent,
            next: None,
            continue_target: None,
            break_target: None,
            activated: false,
            dead: false,
            is_entry: false,
            is_exit: false,
        }
    }
}

/// The arena owning every scope of one lowering session.
///
/// Scopes are owned by the lowering session only (spec §3, "Ownership");
/// once [`ScopeGraph::finalize`] has snapshot reachable scopes into a
/// [`Cfg`], the graph itself is dropped.
pub struct ScopeGraph {
    nodes: Vec<ScopeNode>,
    entry: Option<ScopeId>,
}

impl ScopeGraph {
    pub fn new() -> Self {
        ScopeGraph {
            nodes: Vec::new(),
            entry: None,
        }
    }

    /// Allocates a new, unactivated scope under `parent`.
    pub fn new_scope(&mut self, parent: Option<ScopeId>, label: Option<String>) -> ScopeId {
        let id = ScopeId(self.nodes.len());
        self.nodes.push(ScopeNode::fresh(parent, label));
        id
    }

    /// Allocates the entry scope and activates it immediately with an
    /// empty live set (it has no predecessors of its own).
    pub fn new_entry(&mut self) -> ScopeId {
        let id = self.new_scope(None, None);
        self.nodes[id.0].is_entry = true;
        self.nodes[id.0].activated = true;
        self.entry = Some(id);
        id
    }

    pub fn entry(&self) -> Option<ScopeId> {
        self.entry
    }

    pub fn set_next(&mut self, scope: ScopeId, next: ScopeId) {
        self.nodes[scope.0].next = Some(next);
    }

    pub fn next_of(&self, scope: ScopeId) -> Option<ScopeId> {
        self.nodes[scope.0].next
    }

    pub fn mark_exit(&mut self, scope: ScopeId) {
        self.nodes[scope.0].is_exit = true;
    }

    /// Registers `scope` as a labeled loop head: `continue` within its
    /// subtree back-edges to `scope` itself, `break` forward-edges to
    /// `break_target` (conventionally the loop's `next`).
    pub fn set_loop_targets(&mut self, scope: ScopeId, label: Option<String>, break_target: ScopeId) {
        self.nodes[scope.0].label = label;
        self.nodes[scope.0].continue_target = Some(scope);
        self.nodes[scope.0].break_target = Some(break_target);
    }

    pub fn is_dead(&self, scope: ScopeId) -> bool {
        self.nodes[scope.0].dead
    }

    pub fn is_activated(&self, scope: ScopeId) -> bool {
        self.nodes[scope.0].activated
    }

    /// Marks `stmt` as evaluated within `scope`'s live set.
    pub fn mark_evaluated(&mut self, scope: ScopeId, stmt: StatementId) {
        self.nodes[scope.0].evaluated.insert(stmt);
    }

    /// Marks `stmt` as expired (its defining region has been left) within
    /// `scope`.
    pub fn mark_expired(&mut self, scope: ScopeId, stmt: StatementId) {
        self.nodes[scope.0].expired.insert(stmt);
    }

    /// Fails with `PotentiallyExpired` if `stmt` is in `scope`'s expired set.
    pub fn check_not_expired(&self, scope: ScopeId, stmt: StatementId) -> Result<(), CoreError> {
        if self.nodes[scope.0].expired.contains(&stmt) {
            Err(CoreError::PotentiallyExpired)
        } else {
            Ok(())
        }
    }

    /// Activates `scope`: locks in its live `evaluated`/`expired` sets from
    /// hard predecessors only (soft, back-edge, predecessors don't
    /// contribute — their definitions aren't visible on first entry). A
    /// non-entry scope with no hard predecessors becomes a `DeadScope`: it
    /// silently absorbs every later operation.
    pub fn activate(&mut self, scope: ScopeId) -> Result<(), CoreError> {
        if self.nodes[scope.0].activated {
            return Err(CoreError::ScopeAlreadyActivated);
        }
        let hard_preds = self.nodes[scope.0].hard_preds.clone();
        if hard_preds.is_empty() {
            self.nodes[scope.0].dead = true;
            self.nodes[scope.0].activated = true;
            return Ok(());
        }
        let mut evaluated: Option<HashSet<StatementId>> = None;
        let mut expired = HashSet::new();
        for pred in &hard_preds {
            let pred_node = &self.nodes[pred.0];
            expired.extend(pred_node.expired.iter().copied());
            evaluated = Some(match evaluated {
                None => pred_node.evaluated.clone(),
                Some(acc) => acc.intersection(&pred_node.evaluated).copied().collect(),
            });
        }
        self.nodes[scope.0].evaluated = evaluated.unwrap_or_default();
        self.nodes[scope.0].expired = expired;
        self.nodes[scope.0].activated = true;
        Ok(())
    }

    fn set_target(&mut self, from: ScopeId, target: ScopeTarget) -> Result<(), CoreError> {
        if self.nodes[from.0].target != ScopeTarget::Unset {
            return Err(CoreError::ScopeAlreadyEnded);
        }
        self.nodes[from.0].target = target;
        Ok(())
    }

    /// Unconditional successor. `target` must not already be activated
    /// (reuse a forward jump, not a second `jump`, to re-enter a scope
    /// already visited by the walker).
    pub fn jump(&mut self, from: ScopeId, target: ScopeId) -> Result<(), CoreError> {
        if self.nodes[from.0].dead {
            return Ok(());
        }
        if self.nodes[target.0].activated && self.nodes[target.0].dead {
            return Err(CoreError::DeadScopeSourced);
        }
        if self.nodes[target.0].activated {
            return Err(CoreError::TargetAlreadyActivated);
        }
        self.set_target(from, ScopeTarget::Jump(target))?;
        self.nodes[target.0].hard_preds.push(from);
        Ok(())
    }

    /// Back-edge successor: `target` may already be activated (the common
    /// case — it's the loop head visited earlier). Registered as a soft
    /// predecessor so `activate` never assumes the back-edge's definitions
    /// are visible at the head.
    pub fn jump_back(&mut self, from: ScopeId, target: ScopeId) -> Result<(), CoreError> {
        if self.nodes[from.0].dead {
            return Ok(());
        }
        if self.nodes[target.0].activated && self.nodes[target.0].dead {
            return Err(CoreError::DeadScopeSourced);
        }
        self.set_target(from, ScopeTarget::Jump(target))?;
        self.nodes[target.0].soft_preds.push(from);
        Ok(())
    }

    /// Multi-way successor; every branch becomes a hard predecessor of its
    /// target, which (as with `jump`) must not already be activated.
    pub fn jump_cond(
        &mut self,
        from: ScopeId,
        test: IrNode,
        branches: Vec<(Option<f64>, ScopeId)>,
    ) -> Result<(), CoreError> {
        if self.nodes[from.0].dead {
            return Ok(());
        }
        for (_, target) in &branches {
            if self.nodes[target.0].activated && self.nodes[target.0].dead {
                return Err(CoreError::DeadScopeSourced);
            }
            if self.nodes[target.0].activated {
                return Err(CoreError::TargetAlreadyActivated);
            }
        }
        self.nodes[from.0].test = Some(test);
        self.set_target(from, ScopeTarget::Cond(branches.clone()))?;
        for (_, target) in branches {
            self.nodes[target.0].hard_preds.push(from);
        }
        Ok(())
    }

    /// Walks the parent chain from `from` for the nearest scope bearing
    /// `label` (or, if `label` is `None`, the nearest loop at all) and
    /// back-edges to it.
    pub fn continue_(&mut self, from: ScopeId, label: Option<&str>) -> Result<(), CoreError> {
        let target = self.find_loop(from, label)?;
        let continue_target = self.nodes[target.0]
            .continue_target
            .expect("loop-labeled scope always has a continue target");
        self.jump_back(from, continue_target)
    }

    /// Walks the parent chain from `from` for the nearest scope bearing
    /// `label` and forward-edges to its `break_target`.
    pub fn break_(&mut self, from: ScopeId, label: Option<&str>) -> Result<(), CoreError> {
        let target = self.find_loop(from, label)?;
        let break_target = self.nodes[target.0]
            .break_target
            .expect("loop-labeled scope always has a break target");
        self.jump(from, break_target)
    }

    fn find_loop(&self, from: ScopeId, label: Option<&str>) -> Result<ScopeId, CoreError> {
        let mut cursor = Some(from);
        while let Some(id) = cursor {
            let node = &self.nodes[id.0];
            let is_loop = node.continue_target.is_some();
            let matches = match label {
                Some(l) => node.label.as_deref() == Some(l),
                None => is_loop,
            };
            if is_loop && matches {
                return Ok(id);
            }
            cursor = node.parent;
        }
        Err(CoreError::NoEnclosingLabel(
            label.unwrap_or("<nearest loop>").to_string(),
        ))
    }

    /// Pushes an IR node onto `scope`'s body; silently dropped if `scope`
    /// is a `DeadScope`.
    pub fn add(&mut self, scope: ScopeId, ir: IrNode) {
        if self.nodes[scope.0].dead {
            return;
        }
        self.nodes[scope.0].body.push(ir);
    }

    /// Sets `scope`'s branch test; silently dropped if `scope` is a
    /// `DeadScope`.
    pub fn set_test(&mut self, scope: ScopeId, test: IrNode) {
        if self.nodes[scope.0].dead {
            return;
        }
        self.nodes[scope.0].test = Some(test);
    }

    /// Snapshots every reachable scope into a fresh [`Cfg`], installing
    /// edges from each scope's recorded target.
    pub fn finalize(&self) -> Result<Cfg, CoreError> {
        let entry = self.entry.ok_or_else(|| CoreError::MalformedEdgeSet {
            reason: "scope graph has no entry scope".into(),
        })?;
        let mut cfg = Cfg::new();
        let mut cfg_id: HashMap<ScopeId, CfgNodeId> = HashMap::new();
        for (idx, node) in self.nodes.iter().enumerate() {
            let scope_id = ScopeId(idx);
            if !node.activated || node.dead {
                continue;
            }
            let mut data = CfgNodeData::new(node.body.clone(), node.test.clone());
            data.is_entry = node.is_entry;
            data.is_exit = node.is_exit;
            let id = cfg.add_node(data);
            cfg_id.insert(scope_id, id);
        }
        cfg.set_entry_node(cfg_id[&entry]);
        let exit_scope = self
            .nodes
            .iter()
            .enumerate()
            .find(|(_, n)| n.is_exit)
            .map(|(i, _)| ScopeId(i));
        if let Some(exit_scope) = exit_scope {
            if let Some(&exit_id) = cfg_id.get(&exit_scope) {
                cfg.set_exit_node(exit_id);
            }
        }
        for (idx, node) in self.nodes.iter().enumerate() {
            let scope_id = ScopeId(idx);
            let Some(&from) = cfg_id.get(&scope_id) else {
                continue;
            };
            match &node.target {
                ScopeTarget::Unset | ScopeTarget::Exit => {}
                ScopeTarget::Jump(target) => {
                    let Some(&to) = cfg_id.get(target) else {
                        continue;
                    };
                    cfg.add_edge(from, to, CfgEdgeData::unconditional());
                }
                ScopeTarget::Cond(branches) => {
                    for (cond, target) in branches {
                        let Some(&to) = cfg_id.get(target) else {
                            continue;
                        };
                        let edge = match cond {
                            None => CfgEdgeData::unconditional(),
                            Some(v) => CfgEdgeData::on(IrNode::Const(*v)),
                        };
                        cfg.add_edge(from, to, edge);
                    }
                }
            }
        }
        Ok(cfg)
    }
}

impl Default for ScopeGraph {
    fn default() -> Self {
        Self::new()
    }
}

/// The handle a statement's [`Flattenable::evaluate`] hook receives: the
/// current scope plus the graph that owns it.
pub struct Scope<'g> {
    id: ScopeId,
    graph: &'g mut ScopeGraph,
}

impl<'g> Scope<'g> {
    pub fn new(id: ScopeId, graph: &'g mut ScopeGraph) -> Self {
        Scope { id, graph }
    }

    pub fn id(&self) -> ScopeId {
        self.id
    }

    pub fn graph(&mut self) -> &mut ScopeGraph {
        self.graph
    }

    pub fn is_dead(&self) -> bool {
        self.graph.is_dead(self.id)
    }

    pub fn add(&mut self, ir: IrNode) {
        self.graph.add(self.id, ir);
    }

    pub fn set_test(&mut self, test: IrNode) {
        self.graph.set_test(self.id, test);
    }

    pub fn jump(&mut self, target: ScopeId) -> Result<(), CoreError> {
        self.graph.jump(self.id, target)
    }

    pub fn jump_back(&mut self, target: ScopeId) -> Result<(), CoreError> {
        self.graph.jump_back(self.id, target)
    }

    pub fn jump_cond(
        &mut self,
        test: IrNode,
        branches: Vec<(Option<f64>, ScopeId)>,
    ) -> Result<(), CoreError> {
        self.graph.jump_cond(self.id, test, branches)
    }

    pub fn continue_(&mut self, label: Option<&str>) -> Result<(), CoreError> {
        self.graph.continue_(self.id, label)
    }

    pub fn break_(&mut self, label: Option<&str>) -> Result<(), CoreError> {
        self.graph.break_(self.id, label)
    }

    pub fn mark_evaluated(&mut self, stmt: StatementId) {
        self.graph.mark_evaluated(self.id, stmt);
    }

    pub fn mark_expired(&mut self, stmt: StatementId) {
        self.graph.mark_expired(self.id, stmt);
    }

    pub fn check_not_expired(&self, stmt: StatementId) -> Result<(), CoreError> {
        self.graph.check_not_expired(self.id, stmt)
    }

    /// Enters a fresh child scope and hands it to `f`; this is how a
    /// statement builds a nested region (an `if` arm, a loop body) without
    /// the caller juggling `ScopeId`s directly.
    pub fn with_child<R>(&mut self, label: Option<String>, f: impl FnOnce(&mut Scope) -> R) -> R {
        let child_id = self.graph.new_scope(Some(self.id), label);
        let mut child = Scope::new(child_id, self.graph);
        f(&mut child)
    }
}

/// The one-way interface the core consumes from the embedded-language
/// frontend (spec §6): a tree of statement objects that know how to
/// advance a [`Scope`] and, for value-bearing nodes, flatten themselves
/// into an IR argument list.
pub trait Flattenable {
    /// Stable identity used by the core's live/expired tracking.
    fn id(&self) -> StatementId;

    /// Whether this statement is a compile-time-static declaration (not
    /// subject to live/expired tracking).
    fn is_static(&self) -> bool {
        false
    }

    /// The enclosing statement, if any (used for diagnostics).
    fn parent(&self) -> Option<StatementId> {
        None
    }

    /// Advances `scope` by adding IR to its body and/or setting its target.
    fn evaluate(&self, scope: &mut Scope) -> Result<(), CoreError>;

    /// For value-bearing nodes: the ordered IR sequence materializing this
    /// node as a function-call argument.
    fn flatten(&self) -> Vec<IrNode> {
        Vec::new()
    }
}

/// The single, explicitly-scoped "active compilation" context (spec §5,
/// §9): carries the fresh-temporary-name counter. Entered via
/// [`CompilationContext::enter`], which returns an RAII guard and errors if
/// a compilation is already active — there is exactly one at a time, never
/// a process-wide global.
pub struct CompilationContext {
    next_temp: std::cell::RefCell<u64>,
}

thread_local! {
    static ACTIVE_COMPILATION: std::cell::Cell<bool> = const { std::cell::Cell::new(false) };
}

/// RAII guard returned by [`CompilationContext::enter`]; dropping it marks
/// the context inactive again.
pub struct CompilationGuard<'a> {
    ctx: &'a CompilationContext,
}

impl<'a> CompilationGuard<'a> {
    pub fn context(&self) -> &'a CompilationContext {
        self.ctx
    }
}

impl Drop for CompilationGuard<'_> {
    fn drop(&mut self) {
        ACTIVE_COMPILATION.with(|active| active.set(false));
    }
}

impl CompilationContext {
    pub fn new() -> Self {
        CompilationContext {
            next_temp: std::cell::RefCell::new(0),
        }
    }

    /// Enters the context. Errors with `CompilationAlreadyActive` if a
    /// compilation is already active on this thread.
    pub fn enter(&self) -> Result<CompilationGuard<'_>, CoreError> {
        let already = ACTIVE_COMPILATION.with(|active| active.replace(true));
        if already {
            return Err(CoreError::CompilationAlreadyActive);
        }
        Ok(CompilationGuard { ctx: self })
    }

    /// Synthesizes a fresh, unique temporary name.
    pub fn fresh_temp(&self, hint: &str) -> crate::ir::TempRef {
        let mut counter = self.next_temp.borrow_mut();
        let name = format!("{hint}${}", *counter);
        *counter += 1;
        crate::ir::TempRef(name)
    }
}

impl Default for CompilationContext {
    fn default() -> Self {
        Self::new()
    }
}
