//! Values produced by formula evaluation.

mod arith;
mod series;

pub use series::Series;

pub(crate) use arith::{combine, map, resume, Operand};

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    Double(f64),
    Series(Series),
}

impl Value {
    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            Value::Int(v) => Some(*v as f64),
            Value::Double(v) => Some(*v),
            Value::Series(_) => None,
        }
    }

    pub fn as_series(&self) -> Option<&Series> {
        match self {
            Value::Series(s) => Some(s),
            _ => None,
        }
    }

    /// The scalar itself, or the newest element of a series.
    pub fn last(&self) -> Option<f64> {
        match self {
            Value::Series(s) => s.last(),
            other => other.as_scalar(),
        }
    }

    /// An empty series carries no information and is treated as no value.
    pub fn is_empty_series(&self) -> bool {
        matches!(self, Value::Series(s) if s.is_empty())
    }

    /// A window length or count: a non-negative integral scalar.
    pub fn as_count(&self) -> Option<usize> {
        match self {
            Value::Int(v) => usize::try_from(*v).ok(),
            Value::Double(v) => {
                if v.is_finite() && *v >= 0.0 && v.fract() == 0.0 {
                    Some(*v as usize)
                } else {
                    None
                }
            }
            Value::Series(_) => None,
        }
    }

    pub(crate) fn operand(&self) -> Operand<'_> {
        match self {
            Value::Series(s) => Operand::Series(s),
            Value::Int(v) => Operand::Scalar(*v as f64),
            Value::Double(v) => Operand::Scalar(*v),
        }
    }
}

impl From<Series> for Value {
    fn from(s: Series) -> Self {
        Value::Series(s)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_must_be_integral_and_non_negative() {
        assert_eq!(Value::Int(5).as_count(), Some(5));
        assert_eq!(Value::Double(3.0).as_count(), Some(3));
        assert_eq!(Value::Double(2.5).as_count(), None);
        assert_eq!(Value::Int(-1).as_count(), None);
        assert_eq!(Value::Double(f64::NAN).as_count(), None);
        assert_eq!(Value::Series(Series::from_values(vec![1.0])).as_count(), None);
    }

    #[test]
    fn last_of_scalar_and_series() {
        assert_eq!(Value::Int(2).last(), Some(2.0));
        assert_eq!(Value::from(Series::from_values(vec![1.0, 4.0])).last(), Some(4.0));
        assert_eq!(Value::from(Series::new()).last(), None);
        assert!(Value::from(Series::new()).is_empty_series());
    }
}
