//! Arithmetic simplification (spec §4.5): a local, per-node normalization
//! of `Add`/`Subtract`/`Multiply`/`Divide` that doesn't need CCP to have
//! run first (though the two compose well — CCP's constant substitution
//! gives this pass more to fold).

use chartc_core::{Cfg, FuncCall, IrNode, IrTransformer};

use crate::error::CompileError;
use crate::passes::OptimizationPass;

struct ArithSimplifyTransformer;

impl IrTransformer for ArithSimplifyTransformer {
    fn transform_ir(&mut self, node: IrNode) -> IrNode {
        match node {
            IrNode::Func(call) => {
                let call = FuncCall {
                    name: call.name,
                    args: call.args.into_iter().map(|a| self.transform_ir(a)).collect(),
                };
                simplify_call(&call).unwrap_or(IrNode::Func(call))
            }
            IrNode::Get(loc) => IrNode::Get(self.transform_location(loc)),
            IrNode::Set(loc, value) => {
                let loc = self.transform_location(loc);
                let value = self.transform_ir(*value);
                IrNode::Set(loc, Box::new(value))
            }
            other => other,
        }
    }
}

fn simplify_call(call: &FuncCall) -> Option<IrNode> {
    match call.name.as_str() {
        "Add" => Some(simplify_flattened(call, "Add", 0.0, |a, b| a + b, false)),
        "Multiply" => Some(simplify_flattened(call, "Multiply", 1.0, |a, b| a * b, true)),
        "Subtract" => Some(simplify_left_assoc(call, "Subtract", 0.0, |a, b| a - b)),
        "Divide" => Some(simplify_left_assoc(call, "Divide", 1.0, |a, b| a / b)),
        _ => None,
    }
}

/// Flattens nested same-name calls, folds the constant operands into one,
/// and drops it entirely if it's the identity (or, for `Multiply`,
/// collapses the whole expression to zero).
fn simplify_flattened(
    call: &FuncCall,
    name: &str,
    identity: f64,
    fold: impl Fn(f64, f64) -> f64,
    is_multiply: bool,
) -> IrNode {
    let mut flat = Vec::new();
    flatten(call, name, &mut flat);

    let mut constant_acc = identity;
    let mut non_constant = Vec::new();
    for arg in flat {
        match arg.constant() {
            Some(v) => constant_acc = fold(constant_acc, v),
            None => non_constant.push(arg),
        }
    }

    if is_multiply && constant_acc == 0.0 {
        return IrNode::Const(0.0);
    }

    let mut operands = Vec::new();
    if constant_acc != identity || non_constant.is_empty() {
        operands.push(IrNode::Const(constant_acc));
    }
    operands.extend(non_constant);

    unwrap_singleton(name, operands)
}

fn flatten(call: &FuncCall, name: &str, out: &mut Vec<IrNode>) {
    for arg in &call.args {
        match arg {
            IrNode::Func(inner) if inner.name == name => flatten(inner, name, out),
            other => out.push(other.clone()),
        }
    }
}

/// `Subtract`/`Divide` keep the first operand as a non-commutative base
/// and fold the (commutative-among-themselves) tail of constants.
fn simplify_left_assoc(call: &FuncCall, name: &str, identity: f64, fold: impl Fn(f64, f64) -> f64) -> IrNode {
    let Some((head, tail)) = call.args.split_first() else {
        return IrNode::func(name, call.args.clone());
    };

    let mut constant_acc = identity;
    let mut non_constant = Vec::new();
    for arg in tail {
        match arg.constant() {
            Some(v) => constant_acc = fold(constant_acc, v),
            None => non_constant.push(arg.clone()),
        }
    }

    let mut operands = vec![head.clone()];
    if constant_acc != identity {
        operands.push(IrNode::Const(constant_acc));
    }
    operands.extend(non_constant);

    unwrap_singleton(name, operands)
}

fn unwrap_singleton(name: &str, mut operands: Vec<IrNode>) -> IrNode {
    if operands.len() == 1 {
        operands.pop().unwrap()
    } else {
        IrNode::func(name, operands)
    }
}

pub fn run_arith_simplify(cfg: &mut Cfg) -> Result<(), CompileError> {
    let mut transformer = ArithSimplifyTransformer;
    for node in cfg.nodes().collect::<Vec<_>>() {
        let data = cfg.node_mut(node);
        data.body = std::mem::take(&mut data.body)
            .into_iter()
            .map(|stmt| transformer.transform_ir(stmt))
            .collect();
        data.test = data.test.take().map(|t| transformer.transform_ir(t));
    }
    Ok(())
}

pub struct ArithmeticSimplification;

impl OptimizationPass for ArithmeticSimplification {
    fn name(&self) -> &'static str {
        "ArithmeticSimplification"
    }

    fn run(&self, cfg: &mut Cfg) -> Result<(), CompileError> {
        run_arith_simplify(cfg)
    }
}

pub static ARITHMETIC_SIMPLIFICATION: ArithmeticSimplification = ArithmeticSimplification;
