use core::fmt;
use std::sync::Arc;

/// The most recent `len` bars of a series, ending at global bar `seq`.
///
/// Element `i` is global bar `seq - len + 1 + i`; global bars start at 1 and
/// `seq == 0` means nothing was ever pushed.
///
/// The backing buffer is reference counted. A view (see [`Series::view`]) clones
/// the handle instead of copying values. Growing or writing a series whose buffer
/// is still shared copies it first, so a view always keeps reading the values it
/// was created from.
#[derive(Clone)]
pub struct Series {
    buf: Arc<Vec<f64>>,
    offset: usize,
    len: usize,
    seq: u64,
}

impl fmt::Debug for Series {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Series")
            .field("len", &self.len)
            .field("seq", &self.seq)
            .field("offset", &self.offset)
            .field("last", &self.last())
            .finish_non_exhaustive()
    }
}

impl PartialEq for Series {
    fn eq(&self, other: &Self) -> bool {
        self.seq == other.seq && self.as_slice() == other.as_slice()
    }
}

impl Default for Series {
    fn default() -> Self {
        Self::new()
    }
}

impl Series {
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Arc::new(Vec::with_capacity(capacity)),
            offset: 0,
            len: 0,
            seq: 0,
        }
    }

    /// A series whose last element is global bar `values.len()`.
    pub fn from_values(values: Vec<f64>) -> Self {
        let seq = values.len() as u64;
        Self::from_values_at(values, seq)
    }

    /// A series whose last element is global bar `seq`; `seq` is raised to
    /// `values.len()` if smaller.
    pub fn from_values_at(values: Vec<f64>, seq: u64) -> Self {
        let len = values.len();
        Self {
            buf: Arc::new(values),
            offset: 0,
            len,
            seq: seq.max(len as u64),
        }
    }

    pub(crate) fn filled(v: f64, len: usize, seq: u64) -> Self {
        debug_assert!(seq >= len as u64);
        Self::from_values_at(vec![v; len], seq)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Global index of the most recent element.
    #[inline]
    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// Global index of the oldest element.
    #[inline]
    pub fn first_index(&self) -> u64 {
        self.seq + 1 - self.len as u64
    }

    #[inline]
    pub fn as_slice(&self) -> &[f64] {
        &self.buf[self.offset..self.offset + self.len]
    }

    /// Element by position from the oldest (0 = oldest).
    #[inline]
    pub fn get(&self, i: usize) -> Option<f64> {
        self.as_slice().get(i).copied()
    }

    /// Element by position from the newest (0 = newest).
    #[inline]
    pub fn get_from_end(&self, i: usize) -> Option<f64> {
        if i >= self.len {
            return None;
        }
        self.get(self.len - 1 - i)
    }

    #[inline]
    pub fn last(&self) -> Option<f64> {
        self.get_from_end(0)
    }

    /// Element for global bar `index`, if it is inside the window.
    pub fn at(&self, index: u64) -> Option<f64> {
        if self.is_empty() || index < self.first_index() || index > self.seq {
            return None;
        }
        self.get((index - self.first_index()) as usize)
    }

    pub fn to_vec(&self) -> Vec<f64> {
        self.as_slice().to_vec()
    }

    pub fn iter(&self) -> impl Iterator<Item = f64> + '_ {
        self.as_slice().iter().copied()
    }

    /// True when both series read from the same allocation.
    pub fn shares_buffer(&self, other: &Series) -> bool {
        Arc::ptr_eq(&self.buf, &other.buf)
    }

    /// True while another series reads from the same allocation.
    pub(crate) fn is_shared(&self) -> bool {
        Arc::strong_count(&self.buf) > 1
    }

    /// A view without the `n` newest elements, sharing this buffer.
    pub fn view(&self, n: usize) -> Option<Series> {
        if n > self.len {
            return None;
        }
        Some(Series {
            buf: Arc::clone(&self.buf),
            offset: self.offset,
            len: self.len - n,
            seq: self.seq - n as u64,
        })
    }

    /// Appends the value of the next global bar.
    pub fn push(&mut self, v: f64) {
        let (len, seq) = (self.len + 1, self.seq + 1);
        self.resize_frame(len, seq);
        self.values_mut()[len - 1] = v;
    }

    /// Replaces the most recent element.
    pub fn update_last(&mut self, v: f64) {
        if let Some(last) = self.values_mut().last_mut() {
            *last = v;
        }
    }

    /// Moves the window to `len` elements ending at `seq`, keeping the values at
    /// the positions that survive and filling new positions with NaN.
    pub(crate) fn resize_frame(&mut self, len: usize, seq: u64) {
        debug_assert!(seq >= len as u64);
        self.own_window();
        Arc::make_mut(&mut self.buf).resize(len, f64::NAN);
        self.len = len;
        self.seq = seq;
    }

    pub(crate) fn values_mut(&mut self) -> &mut [f64] {
        self.own_window();
        let len = self.len;
        &mut Arc::make_mut(&mut self.buf)[..len]
    }

    /// Makes the visible window start at offset 0 of a buffer holding exactly it.
    fn own_window(&mut self) {
        if self.offset != 0 || self.buf.len() != self.len {
            self.buf = Arc::new(self.as_slice().to_vec());
            self.offset = 0;
        }
    }
}
