//! The runtime interpreter's builtin function table (spec §4.11, §6).
//!
//! Total over arithmetic, transcendentals, comparisons, the `Switch*`
//! family, clamping/interpolation kernels, seeded randomness, and the
//! `Judge`/`JudgeSimple` scoring kernels. Any name reaching [`call_builtin`]
//! that isn't in this table is `RuntimeError::UnknownBuiltin` -- finalization
//! never emits a name the interpreter doesn't also recognize, so this is
//! reached only by a miscompiled or hand-built IR tree.
//!
//! `Execute`/`Execute0`, `While`, and `JumpLoop` are not dispatched here:
//! those are control operators of the finalized engine-node array (the
//! external host engine's representation), not names a `Cfg`'s `Func`
//! nodes ever carry. [`crate::interpreter::Interpreter`] interprets a
//! `Cfg` directly through its own block/edge structure, which is how it
//! serves as the property-1 oracle across every CFG-to-CFG pass; it
//! never re-parses the engine-node array finalization produces, so those
//! three names have no call site that would reach this table.

use crate::error::RuntimeError;
use crate::interpreter::Rng;

/// Dispatches a builtin call by name over already-evaluated `args`.
pub fn call_builtin(name: &str, args: &[f64], rng: &mut Rng) -> Result<f64, RuntimeError> {
    match name {
        // Arithmetic. `Add`/`Multiply` are variadic (arithmetic
        // simplification flattens nested calls into one n-ary call);
        // `Subtract`/`Divide`/`Negate` are fixed-arity.
        "Add" => Ok(args.iter().sum()),
        "Multiply" => Ok(args.iter().product()),
        "Subtract" => {
            let (first, rest) = arity_at_least(name, args, 1)?;
            Ok(rest.iter().fold(*first, |acc, v| acc - v))
        }
        "Divide" => {
            let (first, rest) = arity_at_least(name, args, 1)?;
            let mut acc = *first;
            for v in rest {
                if *v == 0.0 {
                    return Err(RuntimeError::DivideByZero);
                }
                acc /= v;
            }
            Ok(acc)
        }
        "Negate" => Ok(-arity1(name, args)?),
        "Modulo" => {
            let [a, b] = arity2(name, args)?;
            if b == 0.0 {
                return Err(RuntimeError::DivideByZero);
            }
            Ok(a.rem_euclid(b))
        }
        "Power" => {
            let [a, b] = arity2(name, args)?;
            Ok(a.powf(b))
        }
        "Sqrt" => Ok(arity1(name, args)?.sqrt()),
        "Abs" => Ok(arity1(name, args)?.abs()),
        "Sin" => Ok(arity1(name, args)?.sin()),
        "Cos" => Ok(arity1(name, args)?.cos()),
        "Tan" => Ok(arity1(name, args)?.tan()),
        "Atan2" => {
            let [y, x] = arity2(name, args)?;
            Ok(y.atan2(x))
        }

        // Rounding.
        "Floor" => Ok(arity1(name, args)?.floor()),
        "Ceil" => Ok(arity1(name, args)?.ceil()),
        "Round" => Ok(arity1(name, args)?.round()),

        // Variadic min/max.
        "Min" => arity_at_least(name, args, 1)
            .map(|(first, rest)| rest.iter().fold(*first, |a, b| a.min(*b))),
        "Max" => arity_at_least(name, args, 1)
            .map(|(first, rest)| rest.iter().fold(*first, |a, b| a.max(*b))),

        // Comparisons; boolean results are `1.0`/`0.0`.
        "Equal" => {
            let [a, b] = arity2(name, args)?;
            Ok(bool_f64(a == b))
        }
        "NotEqual" => {
            let [a, b] = arity2(name, args)?;
            Ok(bool_f64(a != b))
        }
        "LessThan" => {
            let [a, b] = arity2(name, args)?;
            Ok(bool_f64(a < b))
        }
        "LessEqual" => {
            let [a, b] = arity2(name, args)?;
            Ok(bool_f64(a <= b))
        }
        "GreaterThan" => {
            let [a, b] = arity2(name, args)?;
            Ok(bool_f64(a > b))
        }
        "GreaterEqual" => {
            let [a, b] = arity2(name, args)?;
            Ok(bool_f64(a >= b))
        }

        // Logic. `And`/`Or` are non-short-circuiting here because `args`
        // is already fully evaluated by the caller; short-circuit
        // semantics are the partial evaluator's concern (it controls
        // whether an argument is evaluated at all).
        "And" => Ok(bool_f64(args.iter().all(|v| *v != 0.0))),
        "Or" => Ok(bool_f64(args.iter().any(|v| *v != 0.0))),
        "Not" => Ok(bool_f64(arity1(name, args)? == 0.0)),

        // `If(cond, then, else)`.
        "If" => {
            let [cond, then, otherwise] = arity3(name, args)?;
            Ok(if cond != 0.0 { then } else { otherwise })
        }

        // Clamping / interpolation kernels.
        "Clamp" => {
            let [v, lo, hi] = arity3(name, args)?;
            Ok(v.clamp(lo.min(hi), lo.max(hi)))
        }
        "Lerp" => {
            let [a, b, t] = arity3(name, args)?;
            Ok(a + (b - a) * t)
        }
        "LerpClamped" => {
            let [a, b, t] = arity3(name, args)?;
            let t = t.clamp(0.0, 1.0);
            Ok(a + (b - a) * t)
        }
        "Unlerp" => {
            let [a, b, v] = arity3(name, args)?;
            if a == b {
                return Err(RuntimeError::DivideByZero);
            }
            Ok((v - a) / (b - a))
        }
        "UnlerpClamped" => {
            let [a, b, v] = arity3(name, args)?;
            if a == b {
                return Err(RuntimeError::DivideByZero);
            }
            Ok(((v - a) / (b - a)).clamp(0.0, 1.0))
        }
        "Remap" => {
            let [v, in_lo, in_hi, out_lo, out_hi] = arity5(name, args)?;
            if in_lo == in_hi {
                return Err(RuntimeError::DivideByZero);
            }
            let t = (v - in_lo) / (in_hi - in_lo);
            Ok(out_lo + (out_hi - out_lo) * t)
        }
        "RemapClamped" => {
            let [v, in_lo, in_hi, out_lo, out_hi] = arity5(name, args)?;
            if in_lo == in_hi {
                return Err(RuntimeError::DivideByZero);
            }
            let t = ((v - in_lo) / (in_hi - in_lo)).clamp(0.0, 1.0);
            Ok(out_lo + (out_hi - out_lo) * t)
        }
        "Smoothstep" => {
            let [lo, hi, v] = arity3(name, args)?;
            if lo == hi {
                return Err(RuntimeError::DivideByZero);
            }
            let t = ((v - lo) / (hi - lo)).clamp(0.0, 1.0);
            Ok(t * t * (3.0 - 2.0 * t))
        }

        // Randomness.
        "Random" => {
            let [lo, hi] = arity2(name, args)?;
            Ok(rng.random(lo, hi))
        }
        "RandomInteger" => {
            let [lo, hi] = arity2(name, args)?;
            Ok(rng.random_integer(lo as i64, hi as i64))
        }

        // Timing-judge scoring kernels: given a signed offset from the
        // ideal hit time, `Judge` returns a window index (0 = best) and
        // `JudgeSimple` collapses to a hit/miss boolean.
        "Judge" => {
            let (offset, windows) = arity_at_least(name, args, 1)?;
            Ok(judge_window(offset.abs(), windows))
        }
        "JudgeSimple" => {
            let [offset, window] = arity2(name, args)?;
            Ok(bool_f64(offset.abs() <= window))
        }

        // Multi-way select, as it appears when a frontend materializes a
        // switch expression directly into IR rather than via CFG edges
        // (spec §6's builtin-name contract: any name finalization can
        // emit must be recognized here too).
        "Switch" => switch(args, false, false),
        "SwitchWithDefault" => switch(args, true, false),
        "SwitchInteger" => switch(args, false, true),
        "SwitchIntegerWithDefault" => switch(args, true, true),

        other => Err(RuntimeError::UnknownBuiltin(other.to_string())),
    }
}

fn bool_f64(b: bool) -> f64 {
    if b {
        1.0
    } else {
        0.0
    }
}

/// `windows` is a list of ascending window widths; returns the index of
/// the first window `offset` falls within, or `windows.len()` (a miss)
/// if it falls outside all of them.
fn judge_window(offset: f64, windows: &[f64]) -> f64 {
    for (i, w) in windows.iter().enumerate() {
        if offset <= *w {
            return i as f64;
        }
    }
    windows.len() as f64
}

/// `Switch(test, c1, v1, c2, v2, ..., [default])`: with `has_default`,
/// a trailing unpaired argument is the value returned when no `c_i`
/// matches `test`; otherwise an unmatched test returns `0.0` (§4.11's
/// "deliberate semantic choice" for unmatched switch arms).
fn switch(args: &[f64], has_default: bool, integer: bool) -> Result<f64, RuntimeError> {
    if args.is_empty() {
        return Err(RuntimeError::ArityMismatch {
            name: "Switch".into(),
            expected: 1,
            got: 0,
        });
    }
    let test = args[0];
    let test = if integer { test.trunc() } else { test };
    let rest = &args[1..];
    let (pairs, default) = if has_default && rest.len() % 2 == 1 {
        (&rest[..rest.len() - 1], rest.last().copied())
    } else {
        (rest, None)
    };
    for chunk in pairs.chunks(2) {
        if chunk.len() < 2 {
            break;
        }
        let cond = if integer { chunk[0].trunc() } else { chunk[0] };
        if cond == test {
            return Ok(chunk[1]);
        }
    }
    Ok(default.unwrap_or(0.0))
}

fn arity1(name: &str, args: &[f64]) -> Result<f64, RuntimeError> {
    match args {
        [a] => Ok(*a),
        _ => Err(RuntimeError::ArityMismatch {
            name: name.to_string(),
            expected: 1,
            got: args.len(),
        }),
    }
}

fn arity2(name: &str, args: &[f64]) -> Result<[f64; 2], RuntimeError> {
    match args {
        [a, b] => Ok([*a, *b]),
        _ => Err(RuntimeError::ArityMismatch {
            name: name.to_string(),
            expected: 2,
            got: args.len(),
        }),
    }
}

fn arity3(name: &str, args: &[f64]) -> Result<[f64; 3], RuntimeError> {
    match args {
        [a, b, c] => Ok([*a, *b, *c]),
        _ => Err(RuntimeError::ArityMismatch {
            name: name.to_string(),
            expected: 3,
            got: args.len(),
        }),
    }
}

fn arity5(name: &str, args: &[f64]) -> Result<[f64; 5], RuntimeError> {
    match args {
        [a, b, c, d, e] => Ok([*a, *b, *c, *d, *e]),
        _ => Err(RuntimeError::ArityMismatch {
            name: name.to_string(),
            expected: 5,
            got: args.len(),
        }),
    }
}

fn arity_at_least(name: &str, args: &[f64], min: usize) -> Result<(&f64, &[f64]), RuntimeError> {
    if args.len() < min {
        return Err(RuntimeError::ArityMismatch {
            name: name.to_string(),
            expected: min,
            got: args.len(),
        });
    }
    Ok((&args[0], &args[1..]))
}
