//! Built-in variables and functions.
//!
//! Every function receives its evaluated arguments and `out`, the result it
//! produced at the same call site on the previous evaluation. Series results
//! extend that previous result from its watermark instead of starting over.
//!
//! Leaving `out` untouched means "not enough data yet". An `Err` means the call
//! itself is malformed; `out` is never modified in that case.

use crate::ast::BinOp;
use crate::error::CallError;
use crate::quote::Quote;
use crate::value::{self, Series, Value};
use crate::Field;

type CallResult = Result<(), CallError>;

// ===== variables =====

fn field(q: &Quote, f: Field) -> Value {
    Value::Series(q.series(f).clone())
}

pub fn open(q: &Quote) -> Value {
    field(q, Field::Open)
}

pub fn high(q: &Quote) -> Value {
    field(q, Field::High)
}

pub fn low(q: &Quote) -> Value {
    field(q, Field::Low)
}

pub fn close(q: &Quote) -> Value {
    field(q, Field::Close)
}

// ===== arithmetic =====

fn arith(op: BinOp, args: &[Value], out: &mut Option<Value>) -> CallResult {
    expect_arity(args, 2)?;
    *out = value::combine(&args[0], &args[1], out.take(), |x, y| op.apply(x, y));
    Ok(())
}

pub fn add(args: &[Value], out: &mut Option<Value>) -> CallResult {
    arith(BinOp::Add, args, out)
}

pub fn sub(args: &[Value], out: &mut Option<Value>) -> CallResult {
    arith(BinOp::Sub, args, out)
}

pub fn mul(args: &[Value], out: &mut Option<Value>) -> CallResult {
    arith(BinOp::Mul, args, out)
}

pub fn div(args: &[Value], out: &mut Option<Value>) -> CallResult {
    arith(BinOp::Div, args, out)
}

// ===== references and elementwise =====

/// `REF(X,N)`: X shifted back by N bars, as a view over X's buffer.
/// A negative whole N leaves `out` as it was.
pub fn ref_(args: &[Value], out: &mut Option<Value>) -> CallResult {
    expect_arity(args, 2)?;
    let n = match args[1] {
        Value::Int(v) if v < 0 => return Ok(()),
        Value::Double(v) if v < 0.0 && v.fract() == 0.0 => return Ok(()),
        _ => count_arg(args, 1)?,
    };
    match &args[0] {
        Value::Series(x) => {
            if let Some(view) = x.view(n) {
                *out = Some(Value::Series(view));
            }
        }
        scalar => *out = Some(scalar.clone()),
    }
    Ok(())
}

/// `MAX(X,M)`: elementwise `max(X, M)`.
pub fn max(args: &[Value], out: &mut Option<Value>) -> CallResult {
    expect_arity(args, 2)?;
    let m = number_arg(args, 1)?;
    *out = match &args[0] {
        Value::Series(x) => value::map(x, out.take(), |v| if v > m { v } else { m }),
        scalar => scalar.as_scalar().map(|v| Value::Double(v.max(m))),
    };
    Ok(())
}

/// `ABS(X)`.
pub fn abs(args: &[Value], out: &mut Option<Value>) -> CallResult {
    expect_arity(args, 1)?;
    *out = match &args[0] {
        Value::Series(x) => value::map(x, out.take(), f64::abs),
        scalar => scalar.as_scalar().map(|v| Value::Double(v.abs())),
    };
    Ok(())
}

// ===== windows =====

/// `HHV(X,N)`: highest value of the last N bars.
pub fn hhv(args: &[Value], out: &mut Option<Value>) -> CallResult {
    expect_arity(args, 2)?;
    let (x, n) = (series_arg(args, 0)?, window_arg(args, 1)?);
    *out = window(x, n, out.take(), |w| extreme(w, f64::max));
    Ok(())
}

/// `LLV(X,N)`: lowest value of the last N bars.
pub fn llv(args: &[Value], out: &mut Option<Value>) -> CallResult {
    expect_arity(args, 2)?;
    let (x, n) = (series_arg(args, 0)?, window_arg(args, 1)?);
    *out = window(x, n, out.take(), |w| extreme(w, f64::min));
    Ok(())
}

/// `MA(X,N)`: simple moving average of the last N bars.
pub fn ma(args: &[Value], out: &mut Option<Value>) -> CallResult {
    expect_arity(args, 2)?;
    let (x, n) = (series_arg(args, 0)?, window_arg(args, 1)?);
    *out = window(x, n, out.take(), |w| w.iter().sum::<f64>() / w.len() as f64);
    Ok(())
}

/// Evaluates `reduce` over every trailing window of `n` elements not yet computed.
/// The result is `n - 1` elements shorter than `x`.
fn window<F>(x: &Series, n: usize, prev: Option<Value>, reduce: F) -> Option<Value>
where
    F: Fn(&[f64]) -> f64,
{
    debug_assert!(n > 0);
    if x.is_empty() || x.len() < n {
        return prev;
    }
    let (len, seq) = (x.len() - n + 1, x.seq());
    let (mut out, start) = value::resume(prev, len, seq);
    let src = x.as_slice();
    let dst = out.values_mut();
    for g in start..=seq {
        let k = (seq - g) as usize;
        let end = src.len() - k;
        dst[len - 1 - k] = reduce(&src[end - n..end]);
    }
    Some(Value::Series(out))
}

/// Folds with `pick`; a NaN anywhere in the window makes the result NaN.
fn extreme(w: &[f64], pick: fn(f64, f64) -> f64) -> f64 {
    let mut acc = w[0];
    for &v in w {
        if v.is_nan() {
            return f64::NAN;
        }
        acc = pick(acc, v);
    }
    acc
}

// ===== recursive smoothing =====

/// `EMA(X,M)`: `Y = (2*X + (M-1)*Y') / (M+1)`.
pub fn ema(args: &[Value], out: &mut Option<Value>) -> CallResult {
    expect_arity(args, 2)?;
    let x = series_arg(args, 0)?;
    let m = window_arg(args, 1)? as f64;
    *out = smooth(x, out.take(), |v, y| (2.0 * v + (m - 1.0) * y) / (m + 1.0));
    Ok(())
}

/// `SMA(X,N,M)`: `Y = (M*X + (N-M)*Y') / N`.
pub fn sma(args: &[Value], out: &mut Option<Value>) -> CallResult {
    expect_arity(args, 3)?;
    let x = series_arg(args, 0)?;
    let n = window_arg(args, 1)? as f64;
    let m = count_arg(args, 2)? as f64;
    *out = smooth(x, out.take(), |v, y| (m * v + (n - m) * y) / n);
    Ok(())
}

/// Runs oldest to newest because each output depends on the previous output.
/// The oldest element of `x` seeds the recursion with `Y = X`.
fn smooth<F>(x: &Series, prev: Option<Value>, step: F) -> Option<Value>
where
    F: Fn(f64, f64) -> f64,
{
    if x.is_empty() {
        return prev;
    }
    let (len, seq) = (x.len(), x.seq());
    let (mut out, start) = value::resume(prev, len, seq);
    let src = x.as_slice();
    let dst = out.values_mut();
    for g in start..=seq {
        let i = len - 1 - (seq - g) as usize;
        dst[i] = if i == 0 { src[0] } else { step(src[i], dst[i - 1]) };
    }
    Some(Value::Series(out))
}

// ===== argument checks =====

fn expect_arity(args: &[Value], expected: usize) -> Result<(), CallError> {
    if args.len() != expected {
        return Err(CallError::arity(expected, args.len()));
    }
    Ok(())
}

fn series_arg(args: &[Value], i: usize) -> Result<&Series, CallError> {
    args[i].as_series().ok_or(CallError::ty(i + 1, "a series"))
}

fn number_arg(args: &[Value], i: usize) -> Result<f64, CallError> {
    args[i].as_scalar().ok_or(CallError::ty(i + 1, "a number"))
}

fn count_arg(args: &[Value], i: usize) -> Result<usize, CallError> {
    args[i]
        .as_count()
        .ok_or(CallError::ty(i + 1, "a non-negative integer"))
}

fn window_arg(args: &[Value], i: usize) -> Result<usize, CallError> {
    match args[i].as_count() {
        Some(n) if n > 0 => Ok(n),
        _ => Err(CallError::ty(i + 1, "a positive integer")),
    }
}
