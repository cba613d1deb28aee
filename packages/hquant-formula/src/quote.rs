use crate::{value::Series, Bar, Field};

/// Columnar OHLC series owned by the caller and advanced between evaluations.
#[derive(Debug, Clone, Default)]
pub struct Quote {
    open: Series,
    high: Series,
    low: Series,
    close: Series,
}

impl Quote {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            open: Series::with_capacity(capacity),
            high: Series::with_capacity(capacity),
            low: Series::with_capacity(capacity),
            close: Series::with_capacity(capacity),
        }
    }

    pub fn from_bars(bars: impl IntoIterator<Item = Bar>) -> Self {
        let mut q = Self::new();
        for bar in bars {
            q.push(bar);
        }
        q
    }

    /// Loads bars from a JSON array of `{"open":..,"high":..,"low":..,"close":..}`.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let bars: Vec<Bar> = serde_json::from_str(json)?;
        Ok(Self::from_bars(bars))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.close.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Global index of the newest bar (0 when empty).
    #[inline]
    pub fn seq(&self) -> u64 {
        self.close.seq()
    }

    pub fn push(&mut self, bar: Bar) {
        for field in Field::ALL {
            self.series_mut(field).push(field.of(bar));
        }
    }

    /// Replaces the newest bar and returns the previous one (if any).
    pub fn update_last(&mut self, bar: Bar) -> Option<Bar> {
        let old = self.last()?;
        for field in Field::ALL {
            self.series_mut(field).update_last(field.of(bar));
        }
        Some(old)
    }

    pub fn get(&self, i: usize) -> Option<Bar> {
        Some(Bar {
            open: self.open.get(i)?,
            high: self.high.get(i)?,
            low: self.low.get(i)?,
            close: self.close.get(i)?,
        })
    }

    pub fn last(&self) -> Option<Bar> {
        if self.is_empty() {
            return None;
        }
        self.get(self.len() - 1)
    }

    pub fn series(&self, field: Field) -> &Series {
        match field {
            Field::Open => &self.open,
            Field::High => &self.high,
            Field::Low => &self.low,
            Field::Close => &self.close,
        }
    }

    fn series_mut(&mut self, field: Field) -> &mut Series {
        match field {
            Field::Open => &mut self.open,
            Field::High => &mut self.high,
            Field::Low => &mut self.low,
            Field::Close => &mut self.close,
        }
    }

    #[inline]
    pub fn open(&self) -> &Series {
        &self.open
    }
    #[inline]
    pub fn high(&self) -> &Series {
        &self.high
    }
    #[inline]
    pub fn low(&self) -> &Series {
        &self.low
    }
    #[inline]
    pub fn close(&self) -> &Series {
        &self.close
    }
}

impl Extend<Bar> for Quote {
    fn extend<T: IntoIterator<Item = Bar>>(&mut self, iter: T) {
        for bar in iter {
            self.push(bar);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_and_update_last() {
        let mut q = Quote::new();
        assert!(q.update_last(Bar::flat(1.0)).is_none());
        q.push(Bar::new(1.0, 2.0, 0.5, 1.5));
        q.push(Bar::flat(3.0));
        assert_eq!(q.len(), 2);
        assert_eq!(q.seq(), 2);
        let old = q.update_last(Bar::flat(4.0)).unwrap();
        assert_eq!(old, Bar::flat(3.0));
        assert_eq!(q.close().to_vec(), vec![1.5, 4.0]);
        assert_eq!(q.series(Field::Low).to_vec(), vec![0.5, 4.0]);
        assert_eq!(q.get(0).unwrap().high, 2.0);
        for field in Field::ALL {
            assert_eq!(q.series(field).last(), Some(field.of(Bar::flat(4.0))));
        }
        assert_eq!(q.series(Field::High).get(0), Some(Field::High.of(Bar::new(1.0, 2.0, 0.5, 1.5))));
    }

    #[test]
    fn loads_json_bars() {
        let q = Quote::from_json(
            r#"[{"open":1,"high":2,"low":0.5,"close":1.5},{"open":2,"high":3,"low":1,"close":2.5}]"#,
        )
        .unwrap();
        assert_eq!(q.len(), 2);
        assert_eq!(q.last().unwrap().close, 2.5);
        assert!(Quote::from_json(r#"[{"open":1}]"#).is_err());
    }
}
