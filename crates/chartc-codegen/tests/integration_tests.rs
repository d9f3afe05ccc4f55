//! The concrete end-to-end scenarios of spec §8, each exercised against
//! a hand-built CFG (no frontend lives in this workspace) and checked
//! either against the finalized engine-node array or the runtime
//! interpreter, as the scenario calls for.

use chartc_check::{Interpreter, InterpreterConfig};
use chartc_core::{Cfg, CfgEdgeData, CfgNodeData, IrNode, LocRef, Location, TempRef};
use chartc_codegen::finalize::EngineNode;
use chartc_codegen::passes::{self, OptimizationPass};
use chartc_codegen::{finalize, flat_cfg};

fn temp(name: &str) -> Location {
    Location::new(LocRef::Temp(TempRef(name.into())), IrNode::Const(0.0), 0, Some(1))
}

fn run_default_preset(cfg: &mut Cfg) {
    let preset = passes::default_preset();
    passes::run_optimization_passes(cfg, &preset, false).unwrap();
}

/// E1: `((2 + 3) * 4) - 1` folds to a single block whose test is
/// `Const(19)` with an empty body.
#[test]
fn e1_constant_fold() {
    let mut cfg = Cfg::new();
    let expr = IrNode::func(
        "Subtract",
        [
            IrNode::func(
                "Multiply",
                [
                    IrNode::func("Add", [IrNode::Const(2.0), IrNode::Const(3.0)]),
                    IrNode::Const(4.0),
                ],
            ),
            IrNode::Const(1.0),
        ],
    );
    let entry = cfg.add_node(CfgNodeData::new(Vec::new(), Some(expr)));
    cfg.set_entry_node(entry);
    cfg.set_exit_node(entry);

    run_default_preset(&mut cfg);

    assert!(cfg.node(entry).body.is_empty());
    assert_eq!(cfg.node(entry).test, Some(IrNode::Const(19.0)));

    let flat = flat_cfg::flatten(&cfg).unwrap();
    assert_eq!(flat.nodes.len(), 1);
    assert_eq!(flat.nodes[0].test, Some(IrNode::Const(19.0)));
    assert_eq!(flat.nodes[0].target, flat_cfg::FlatTarget::None);
}

/// E2: `if True: t=1 else: t=2; return t` reduces to straight-line code
/// returning `Const(1)` once the statically-disproved branch is pruned.
#[test]
fn e2_branch_prune() {
    let mut cfg = Cfg::new();
    let a = cfg.add_node(CfgNodeData::new(vec![IrNode::set(temp("t"), IrNode::Const(1.0))], None));
    let b = cfg.add_node(CfgNodeData::new(vec![IrNode::set(temp("t"), IrNode::Const(2.0))], None));
    let join = cfg.add_node(CfgNodeData::new(Vec::new(), Some(IrNode::get(temp("t")))));
    let head = cfg.add_node(CfgNodeData::new(Vec::new(), Some(IrNode::Const(1.0))));

    cfg.set_entry_node(head);
    cfg.set_exit_node(join);
    cfg.add_edge(head, a, CfgEdgeData::unconditional());
    cfg.add_edge(head, b, CfgEdgeData::on(IrNode::Const(0.0)));
    cfg.add_edge(a, join, CfgEdgeData::unconditional());
    cfg.add_edge(b, join, CfgEdgeData::unconditional());

    run_default_preset(&mut cfg);

    let nodes: Vec<_> = cfg.nodes().collect();
    assert_eq!(nodes.len(), 1, "branch prune + flow coalescing should leave one block");
    let only = nodes[0];
    assert_eq!(cfg.node(only).test, Some(IrNode::Const(1.0)));
    assert!(cfg.node(only).body.is_empty(), "the store to t is dead once CCP folds its only read");
}

/// E3: `t @= 5; t @= 7; return t` keeps both stores under basic DSE alone
/// (it tracks whole-temp liveness, not same-temp redefinition order, so a
/// live read of `t` anywhere keeps every store to `t`), and reduces to
/// zero stores under the full default preset once CCP folds `t`'s value
/// into the test directly and DSE finds no reads of `t` left at all.
#[test]
fn e3_dead_store() {
    let mut cfg = Cfg::new();
    let body = vec![
        IrNode::set(temp("t"), IrNode::Const(5.0)),
        IrNode::set(temp("t"), IrNode::Const(7.0)),
    ];
    let entry = cfg.add_node(CfgNodeData::new(body, Some(IrNode::get(temp("t")))));
    cfg.set_entry_node(entry);
    cfg.set_exit_node(entry);

    let mut dse_only = cfg.clone();
    passes::dce::run_basic_dse(&mut dse_only).unwrap();
    assert_eq!(dse_only.node(entry).body.len(), 2);

    run_default_preset(&mut cfg);
    assert!(cfg.node(entry).body.is_empty());
    assert_eq!(cfg.node(entry).test, Some(IrNode::Const(7.0)));
}

/// E4: a `while` loop summing `0..10` into accumulator `s` interprets to
/// `45` under the runtime interpreter, with or without optimization.
fn build_loop_sum_cfg() -> Cfg {
    let mut cfg = Cfg::new();
    let init = cfg.add_node(CfgNodeData::new(
        vec![
            IrNode::set(temp("i"), IrNode::Const(0.0)),
            IrNode::set(temp("s"), IrNode::Const(0.0)),
        ],
        None,
    ));
    let head = cfg.add_node(CfgNodeData::new(
        Vec::new(),
        Some(IrNode::func("LessThan", [IrNode::get(temp("i")), IrNode::Const(10.0)])),
    ));
    let body = cfg.add_node(CfgNodeData::new(
        vec![
            IrNode::set(temp("s"), IrNode::func("Add", [IrNode::get(temp("s")), IrNode::get(temp("i"))])),
            IrNode::set(temp("i"), IrNode::func("Add", [IrNode::get(temp("i")), IrNode::Const(1.0)])),
        ],
        None,
    ));
    let exit = cfg.add_node(CfgNodeData::new(Vec::new(), Some(IrNode::get(temp("s")))));

    cfg.set_entry_node(init);
    cfg.set_exit_node(exit);
    cfg.add_edge(init, head, CfgEdgeData::unconditional());
    cfg.add_edge(head, body, CfgEdgeData::on(IrNode::Const(1.0)));
    cfg.add_edge(head, exit, CfgEdgeData::unconditional());
    cfg.add_edge(body, head, CfgEdgeData::unconditional());
    cfg
}

#[test]
fn e4_loop_sum_interprets_to_45_unoptimized() {
    let cfg = build_loop_sum_cfg();
    let mut interp = Interpreter::new(InterpreterConfig::default());
    assert_eq!(interp.interpret(&cfg).unwrap(), 45.0);
}

#[test]
fn e4_loop_sum_interprets_to_45_under_every_preset() {
    for preset in [passes::default_preset(), passes::fast_preset()] {
        let mut cfg = build_loop_sum_cfg();
        passes::run_optimization_passes(&mut cfg, &preset, false).unwrap();
        let mut interp = Interpreter::new(InterpreterConfig::default());
        assert_eq!(interp.interpret(&cfg).unwrap(), 45.0);
    }
}

/// E5: `Switch(Const(2), 1, A, 2, B, 3, C)` with distinct side-effecting
/// `A`/`B`/`C` executes only `B`; after arithmetic simplification folds
/// the switch's constant test, the flattened single-successor block
/// emits exactly `Execute(B)`.
#[test]
fn e5_switch_select() {
    let mut cfg = Cfg::new();
    let a = cfg.add_node(CfgNodeData::new(vec![IrNode::func("Draw", [IrNode::Const(1.0)])], None));
    let b = cfg.add_node(CfgNodeData::new(vec![IrNode::func("Draw", [IrNode::Const(2.0)])], None));
    let c = cfg.add_node(CfgNodeData::new(vec![IrNode::func("Draw", [IrNode::Const(3.0)])], None));
    let join = cfg.add_node(CfgNodeData::new(Vec::new(), None));
    let head = cfg.add_node(CfgNodeData::new(
        Vec::new(),
        Some(IrNode::func("Add", [IrNode::Const(1.0), IrNode::Const(1.0)])),
    ));

    cfg.set_entry_node(head);
    cfg.set_exit_node(join);
    cfg.add_edge(head, a, CfgEdgeData::on(IrNode::Const(1.0)));
    cfg.add_edge(head, b, CfgEdgeData::on(IrNode::Const(2.0)));
    cfg.add_edge(head, c, CfgEdgeData::on(IrNode::Const(3.0)));
    cfg.add_edge(a, join, CfgEdgeData::unconditional());
    cfg.add_edge(b, join, CfgEdgeData::unconditional());
    cfg.add_edge(c, join, CfgEdgeData::unconditional());

    // Before any pass runs, the head's test isn't foldable by inspection
    // alone (it's a `Func`, not a literal) -- CCP is what resolves it.
    let head_test = cfg.node(head).test.clone().unwrap();
    assert_eq!(head_test.constant(), None);

    // CCP alone folds the test to 2.0 and prunes the 1.0/3.0 edges (and
    // with them, the now-unreachable A/C blocks); one edge survives, so
    // flattening already treats it as an unconditional `Single` target.
    passes::ccp::run_ccp(&mut cfg).unwrap();
    assert_eq!(cfg.nodes().count(), 3, "only head, B, and join should survive edge pruning");
    let flat = flat_cfg::flatten(&cfg).unwrap();
    assert!(matches!(flat.nodes[0].target, flat_cfg::FlatTarget::Single(_)));

    // The full default preset then coalesces the straight-line chain and
    // keeps B's effectful `Draw` call, producing a single `Execute(B)`.
    run_default_preset(&mut cfg);
    assert_eq!(cfg.nodes().count(), 1);
    let only = cfg.nodes().next().unwrap();
    assert_eq!(cfg.node(only).body, vec![IrNode::func("Draw", [IrNode::Const(2.0)])]);

    let flat = flat_cfg::flatten(&cfg).unwrap();
    assert_eq!(flat.nodes.len(), 1);
    let nodes = finalize::finalize(&flat).unwrap();
    assert!(nodes.iter().any(|n| matches!(n, EngineNode::Function { func, .. } if func == "Execute")));
    assert!(nodes.iter().any(|n| matches!(n, EngineNode::Function { func, .. } if func == "Draw")));
}

/// E6: two structurally identical subtrees compiled separately each
/// intern their shared subtree exactly once.
#[test]
fn e6_interning() {
    let shared = || IrNode::func("Add", [IrNode::Const(1.0), IrNode::Const(2.0)]);
    let make_flat = |value: IrNode| {
        let mut cfg = Cfg::new();
        let entry = cfg.add_node(CfgNodeData::new(Vec::new(), Some(value)));
        cfg.set_entry_node(entry);
        cfg.set_exit_node(entry);
        flat_cfg::flatten(&cfg).unwrap()
    };

    let flat_a = make_flat(IrNode::func("Add", [shared(), shared()]));
    let nodes_a = finalize::finalize(&flat_a).unwrap();
    let three_count = nodes_a
        .iter()
        .filter(|n| matches!(n, EngineNode::Function { func, .. } if func == "Add"))
        .count();
    // The inner `Add(1, 2)` interns once; the outer `Add(inner, inner)` is
    // a second, distinct `Add` node — two `Add`s total, not three.
    assert_eq!(three_count, 2);

    let flat_b = make_flat(shared());
    let nodes_b = finalize::finalize(&flat_b).unwrap();
    assert_eq!(
        nodes_b
            .iter()
            .filter(|n| matches!(n, EngineNode::Function { func, .. } if func == "Add"))
            .count(),
        1
    );
}
