//! Top-level orchestration (spec §4.12): statement tree → CFG → optimized
//! CFG → flat CFG → finalized engine-node array.

use std::collections::HashMap;

use chartc_core::{CompilationContext, Flattenable, Scope, ScopeGraph};

use crate::error::CompileError;
use crate::finalize;
use crate::flat_cfg;
use crate::passes::{self, OptimizationPass};
use crate::{CompileOptions, CompileResult, OptimizationPreset};

/// Compiles `statement` under `options`, producing the finalized
/// engine-node array and the entry index for `options.script_name`.
///
/// 1. Opens the single active [`CompilationContext`] for this call.
/// 2. Lowers `statement` into a [`chartc_core::Cfg`] via a fresh
///    [`ScopeGraph`]: an entry and exit scope are allocated up front and
///    linked with `set_next` so the statement's own `evaluate` can fall
///    through to the exit without knowing about it directly.
/// 3. Runs the chosen optimization preset over the CFG in place.
/// 4. Flattens the optimized CFG into preorder-indexed blocks.
/// 5. Finalizes the flattened blocks into an interned engine-node array.
pub fn compile(statement: &dyn Flattenable, options: &CompileOptions) -> Result<CompileResult, CompileError> {
    let ctx = CompilationContext::new();
    let _guard = ctx.enter()?;

    // 1.
    let mut graph = ScopeGraph::new();
    let entry = graph.new_entry();
    let exit = graph.new_scope(None, None);
    graph.mark_exit(exit);
    graph.set_next(entry, exit);

    {
        let mut scope = Scope::new(entry, &mut graph);
        statement.evaluate(&mut scope)?;
    }
    graph.activate(exit)?;
    let mut cfg = graph.finalize()?;

    // 2.
    let preset: Vec<&dyn OptimizationPass> = match options.preset {
        OptimizationPreset::Default => passes::default_preset(),
        OptimizationPreset::Fast => passes::fast_preset(),
    };
    passes::run_optimization_passes(&mut cfg, &preset, options.trace)?;

    // 3.
    let flat = flat_cfg::flatten(&cfg)?;

    // 4.
    let engine_nodes = finalize::finalize(&flat)?;

    // The interner always pushes a block's wrapping `Execute`/`JumpLoop`
    // node last among its own children, and the whole tree's root last of
    // all — so the root is always the final index of the finalized array.
    let root_index = engine_nodes.len().saturating_sub(1);
    let mut script_table = HashMap::new();
    script_table.insert(options.script_name.clone(), root_index);

    Ok(CompileResult {
        engine_nodes,
        script_table,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chartc_core::{IrNode, StatementId};

    struct ConstStatement {
        id: StatementId,
        value: f64,
    }

    impl Flattenable for ConstStatement {
        fn id(&self) -> StatementId {
            self.id
        }

        fn evaluate(&self, scope: &mut Scope<'_>) -> Result<(), chartc_core::CoreError> {
            scope.add(IrNode::Const(self.value));
            let next = scope.graph().next_of(scope.id()).expect("entry has a next");
            scope.jump(next)
        }
    }

    #[test]
    fn compiles_a_single_constant_statement_to_an_entry_in_the_script_table() {
        let statement = ConstStatement { id: 1, value: 42.0 };
        let options = CompileOptions::default();
        let result = compile(&statement, &options).unwrap();
        assert!(!result.engine_nodes.is_empty());
        let root = result.script_table[&options.script_name];
        assert_eq!(root, result.engine_nodes.len() - 1);
    }

    #[test]
    fn a_second_compile_call_does_not_see_a_stale_active_compilation() {
        let a = ConstStatement { id: 1, value: 1.0 };
        let b = ConstStatement { id: 2, value: 2.0 };
        let options = CompileOptions::default();
        compile(&a, &options).unwrap();
        compile(&b, &options).unwrap();
    }
}
