//! Alignment of series operands and incremental output buffers.
//!
//! Operands are lined up on their newest element: position `k` from the end of
//! one operand pairs with position `k` from the end of the other. The result is
//! numbered in the frame of the primary operand (the left series, or the only
//! series) and covers only the overlap, so it is as long as the shortest series.

use super::{Series, Value};

#[derive(Debug, Clone, Copy)]
pub(crate) enum Operand<'a> {
    Scalar(f64),
    Series(&'a Series),
}

impl Operand<'_> {
    /// Element `k` from the newest; scalars broadcast.
    #[inline]
    fn from_end(&self, k: usize) -> f64 {
        match self {
            Operand::Scalar(v) => *v,
            Operand::Series(s) => {
                let xs = s.as_slice();
                xs[xs.len() - 1 - k]
            }
        }
    }
}

/// Prepares the output for a result of `len` elements ending at `seq`.
///
/// Returns the buffer to write into and the first global index that still
/// needs computing. `prev` is extended in place when it describes the same
/// frame; its last element (the watermark) is recomputed so an updated last
/// bar is picked up. Anything else starts from scratch.
pub(crate) fn resume(prev: Option<Value>, len: usize, seq: u64) -> (Series, u64) {
    debug_assert!(len > 0 && seq >= len as u64);
    let first = seq + 1 - len as u64;
    if let Some(Value::Series(mut out)) = prev {
        if !out.is_empty() && out.first_index() == first && out.seq() <= seq {
            let watermark = out.seq();
            out.resize_frame(len, seq);
            return (out, watermark);
        }
    }
    (Series::filled(f64::NAN, len, seq), first)
}

/// Applies `op` elementwise over two values.
///
/// Scalar with scalar gives a `Double`. Any empty series operand leaves `prev`
/// untouched.
pub(crate) fn combine<F>(x: &Value, y: &Value, prev: Option<Value>, op: F) -> Option<Value>
where
    F: Fn(f64, f64) -> f64,
{
    let (xo, yo) = (x.operand(), y.operand());
    let (primary, len) = match (xo, yo) {
        (Operand::Scalar(a), Operand::Scalar(b)) => return Some(Value::Double(op(a, b))),
        (Operand::Series(a), Operand::Series(b)) => (a, a.len().min(b.len())),
        (Operand::Series(s), Operand::Scalar(_)) | (Operand::Scalar(_), Operand::Series(s)) => {
            (s, s.len())
        }
    };
    if len == 0 {
        return prev;
    }

    let seq = primary.seq();
    let (mut out, start) = resume(prev, len, seq);
    let dst = out.values_mut();
    for g in start..=seq {
        let k = (seq - g) as usize;
        dst[len - 1 - k] = op(xo.from_end(k), yo.from_end(k));
    }
    Some(Value::Series(out))
}

/// Applies `f` to every element of `x`, keeping its frame.
pub(crate) fn map<F>(x: &Series, prev: Option<Value>, f: F) -> Option<Value>
where
    F: Fn(f64) -> f64,
{
    if x.is_empty() {
        return prev;
    }
    let (len, seq) = (x.len(), x.seq());
    let (mut out, start) = resume(prev, len, seq);
    let src = x.as_slice();
    let dst = out.values_mut();
    for g in start..=seq {
        let i = len - 1 - (seq - g) as usize;
        dst[i] = f(src[i]);
    }
    Some(Value::Series(out))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::BinOp;

    fn s(values: &[f64]) -> Value {
        Value::Series(Series::from_values(values.to_vec()))
    }

    fn s_at(values: &[f64], seq: u64) -> Value {
        Value::Series(Series::from_values_at(values.to_vec(), seq))
    }

    fn vals(v: &Option<Value>) -> Vec<f64> {
        v.as_ref().and_then(Value::as_series).unwrap().to_vec()
    }

    #[test]
    fn division_by_zero_is_nan_only_there() {
        let r = combine(&s(&[1.0, 4.0]), &s(&[0.0, 2.0]), None, |a, b| BinOp::Div.apply(a, b));
        let v = vals(&r);
        assert!(v[0].is_nan());
        assert_eq!(v[1], 2.0);
    }

    #[test]
    fn shorter_right_operand_aligns_on_the_newest_bar() {
        let x = s(&[1.0, 2.0, 3.0, 4.0]);
        let y = s_at(&[10.0, 20.0], 3);
        let r = combine(&x, &y, None, |a, b| a + b);
        assert_eq!(vals(&r), vec![13.0, 24.0]);
        let out = r.unwrap();
        let out = out.as_series().unwrap();
        assert_eq!(out.seq(), 4);
        assert_eq!(out.first_index(), 3);
    }

    #[test]
    fn shorter_left_operand_is_symmetric() {
        let x = s_at(&[10.0, 20.0], 3);
        let y = s(&[1.0, 2.0, 3.0, 4.0]);
        let r = combine(&x, &y, None, |a, b| a - b);
        assert_eq!(vals(&r), vec![7.0, 16.0]);
        assert_eq!(r.unwrap().as_series().unwrap().seq(), 3);
    }

    #[test]
    fn scalars_broadcast_and_fold() {
        let x = s(&[1.0, 2.0]);
        assert_eq!(vals(&combine(&x, &Value::Int(3), None, |a, b| a * b)), vec![3.0, 6.0]);
        assert_eq!(vals(&combine(&Value::Double(1.0), &x, None, |a, b| a - b)), vec![0.0, -1.0]);
        assert_eq!(
            combine(&Value::Int(6), &Value::Int(4), None, |a, b| a / b),
            Some(Value::Double(1.5))
        );
    }

    #[test]
    fn empty_operand_returns_previous() {
        let prev = Some(Value::Double(7.0));
        let r = combine(&s(&[]), &s(&[1.0]), prev.clone(), |a, b| a + b);
        assert_eq!(r, prev);
    }

    #[test]
    fn resumes_from_watermark_and_extends_in_place() {
        let mut x = Series::from_values(vec![1.0, 2.0, 3.0]);
        let r1 = combine(&Value::Series(x.clone()), &Value::Int(1), None, |a, b| a + b);
        x.push(4.0);
        x.push(5.0);
        let r2 = combine(&Value::Series(x.clone()), &Value::Int(1), r1, |a, b| a + b);
        assert_eq!(vals(&r2), vec![2.0, 3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn resume_keeps_computed_prefix() {
        let prev = Some(Value::Series(Series::from_values(vec![-1.0, -2.0])));
        let (out, start) = resume(prev, 4, 4);
        assert_eq!(start, 2);
        assert_eq!(out.get(0), Some(-1.0));
        assert!(out.get(3).unwrap().is_nan());

        let unrelated = Some(Value::Series(Series::from_values_at(vec![0.0], 9)));
        let (_, start) = resume(unrelated, 4, 4);
        assert_eq!(start, 1);
    }

    #[test]
    fn map_keeps_frame() {
        let x = Series::from_values_at(vec![-1.0, 2.0, -3.0], 7);
        let r = map(&x, None, f64::abs);
        assert_eq!(vals(&r), vec![1.0, 2.0, 3.0]);
        assert_eq!(r.unwrap().as_series().unwrap().seq(), 7);
    }
}
