use serde::Deserialize;

/// One OHLC quote.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[repr(C)]
pub struct Bar {
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

impl Bar {
    pub fn new(open: f64, high: f64, low: f64, close: f64) -> Self {
        Self {
            open,
            high,
            low,
            close,
        }
    }

    /// A bar whose four prices are all `price`.
    pub fn flat(price: f64) -> Self {
        Self::new(price, price, price, price)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Field {
    Open = 0,
    High = 1,
    Low = 2,
    Close = 3,
}

impl Field {
    pub const ALL: [Field; 4] = [Field::Open, Field::High, Field::Low, Field::Close];

    pub fn of(self, bar: Bar) -> f64 {
        match self {
            Field::Open => bar.open,
            Field::High => bar.high,
            Field::Low => bar.low,
            Field::Close => bar.close,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Severity {
    Warning = 1,
    Error = 2,
}
