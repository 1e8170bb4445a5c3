//! Ring-Buffer Deque
//!
//! The backing store for list values. Elements live in a growable circular
//! buffer; logical index `i` maps to physical slot `(head + i) % capacity`.
//!
//! ```text
//!            head              tail
//!             │                 │
//!             ▼                 ▼
//! ┌─────┬─────┬─────┬─────┬─────┬─────┐
//! │  -  │  a  │  b  │  c  │  d  │  -  │   len = 4, capacity = 6
//! └─────┴─────┴─────┴─────┴─────┴─────┘
//! ```
//!
//! Pushes and pops at either end are O(1) amortized. Insertion and removal
//! in the middle shift whichever side of the index is shorter, so the worst
//! case touches half the elements.

use std::fmt;

/// Smallest backing capacity ever allocated.
const MIN_CAPACITY: usize = 4;

/// A double-ended queue over a circular buffer.
pub struct Deque<T> {
    buf: Vec<Option<T>>,
    head: usize,
    tail: usize,
    len: usize,
}

impl<T> Deque<T> {
    /// Creates an empty deque with the minimum capacity.
    pub fn new() -> Self {
        Self::with_capacity(MIN_CAPACITY)
    }

    /// Creates an empty deque able to hold `capacity` elements before growing.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(MIN_CAPACITY);
        let mut buf = Vec::with_capacity(capacity);
        buf.resize_with(capacity, || None);
        Self {
            buf,
            head: 0,
            tail: 0,
            len: 0,
        }
    }

    /// Number of stored elements.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Size of the backing buffer.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Maps a logical index to its physical slot.
    #[inline]
    fn slot(&self, index: usize) -> usize {
        (self.head + index) % self.buf.len()
    }

    /// Moves the element at logical index `from` into logical index `to`.
    #[inline]
    fn shift(&mut self, from: usize, to: usize) {
        let (from, to) = (self.slot(from), self.slot(to));
        self.buf[to] = self.buf[from].take();
    }

    /// Doubles the backing buffer, laying elements out from slot 0.
    fn grow(&mut self) {
        let capacity = self.buf.len() * 2;
        let mut buf = Vec::with_capacity(capacity);
        for i in 0..self.len {
            let slot = self.slot(i);
            buf.push(self.buf[slot].take());
        }
        buf.resize_with(capacity, || None);

        self.buf = buf;
        self.head = 0;
        self.tail = self.len;
    }

    #[inline]
    fn grow_if_full(&mut self) {
        if self.len == self.buf.len() {
            self.grow();
        }
    }

    /// Adds an element before the first one.
    pub fn push_front(&mut self, value: T) {
        self.grow_if_full();
        let capacity = self.buf.len();
        self.head = (self.head + capacity - 1) % capacity;
        self.buf[self.head] = Some(value);
        self.len += 1;
    }

    /// Adds an element after the last one.
    pub fn push_back(&mut self, value: T) {
        self.grow_if_full();
        self.buf[self.tail] = Some(value);
        self.tail = (self.tail + 1) % self.buf.len();
        self.len += 1;
    }

    /// Removes and returns the first element.
    pub fn pop_front(&mut self) -> Option<T> {
        if self.len == 0 {
            return None;
        }
        let value = self.buf[self.head].take();
        self.head = (self.head + 1) % self.buf.len();
        self.len -= 1;
        value
    }

    /// Removes and returns the last element.
    pub fn pop_back(&mut self) -> Option<T> {
        if self.len == 0 {
            return None;
        }
        let capacity = self.buf.len();
        self.tail = (self.tail + capacity - 1) % capacity;
        self.len -= 1;
        self.buf[self.tail].take()
    }

    /// Returns the element at `index`, if in range.
    pub fn get(&self, index: usize) -> Option<&T> {
        if index >= self.len {
            return None;
        }
        self.buf[self.slot(index)].as_ref()
    }

    /// Replaces the element at `index`.
    ///
    /// # Returns
    ///
    /// `false` if `index` is out of range.
    pub fn set(&mut self, index: usize, value: T) -> bool {
        if index >= self.len {
            return false;
        }
        let slot = self.slot(index);
        self.buf[slot] = Some(value);
        true
    }

    /// Inserts `value` so that it ends up at logical position `index`.
    ///
    /// `index == 0` is a push to the front and `index == len` a push to the
    /// back. Anything beyond `len` is rejected.
    ///
    /// # Returns
    ///
    /// `false` if `index > len`.
    pub fn insert(&mut self, index: usize, value: T) -> bool {
        if index > self.len {
            return false;
        }
        if index == 0 {
            self.push_front(value);
            return true;
        }
        if index == self.len {
            self.push_back(value);
            return true;
        }

        self.grow_if_full();
        let capacity = self.buf.len();

        if index < self.len / 2 {
            // Open a gap by moving the front part one slot to the left.
            self.head = (self.head + capacity - 1) % capacity;
            for i in 0..index {
                self.shift(i + 1, i);
            }
        } else {
            for i in (index + 1..=self.len).rev() {
                self.shift(i - 1, i);
            }
            self.tail = (self.tail + 1) % capacity;
        }

        let slot = self.slot(index);
        self.buf[slot] = Some(value);
        self.len += 1;
        true
    }

    /// Removes and returns the element at `index`, closing the gap from the
    /// shorter side.
    pub fn remove(&mut self, index: usize) -> Option<T> {
        if index >= self.len {
            return None;
        }
        let capacity = self.buf.len();
        let slot = self.slot(index);
        let value = self.buf[slot].take();

        if index < self.len / 2 {
            for i in (1..=index).rev() {
                self.shift(i - 1, i);
            }
            self.head = (self.head + 1) % capacity;
        } else {
            for i in index..self.len - 1 {
                self.shift(i + 1, i);
            }
            self.tail = (self.tail + capacity - 1) % capacity;
        }

        self.len -= 1;
        value
    }

    /// Iterates from front to back.
    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        (0..self.len).filter_map(move |i| self.buf[self.slot(i)].as_ref())
    }

    /// Drops every element, keeping the current capacity.
    pub fn clear(&mut self) {
        for slot in &mut self.buf {
            *slot = None;
        }
        self.head = 0;
        self.tail = 0;
        self.len = 0;
    }
}

impl<T: Clone> Deque<T> {
    /// Copies the inclusive logical range `start..=end`.
    ///
    /// `end` is clamped to the last element. Returns an empty vector when the
    /// deque is empty or `start > end` after clamping. Negative Redis-style
    /// indices must be normalised by the caller.
    pub fn slice_range(&self, start: usize, end: usize) -> Vec<T> {
        if self.len == 0 {
            return Vec::new();
        }
        let end = end.min(self.len - 1);
        if start > end {
            return Vec::new();
        }
        (start..=end)
            .filter_map(|i| self.get(i).cloned())
            .collect()
    }

    /// Copies every element, front to back.
    pub fn to_vec(&self) -> Vec<T> {
        self.iter().cloned().collect()
    }
}

impl<T> Default for Deque<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> Clone for Deque<T> {
    fn clone(&self) -> Self {
        self.iter().cloned().collect()
    }
}

impl<T: PartialEq> PartialEq for Deque<T> {
    fn eq(&self, other: &Self) -> bool {
        self.len == other.len && self.iter().eq(other.iter())
    }
}

impl<T: Eq> Eq for Deque<T> {}

impl<T: fmt::Debug> fmt::Debug for Deque<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl<T> FromIterator<T> for Deque<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let iter = iter.into_iter();
        let mut deque = Self::with_capacity(iter.size_hint().0);
        for value in iter {
            deque.push_back(value);
        }
        deque
    }
}

impl<T> Extend<T> for Deque<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for value in iter {
            self.push_back(value);
        }
    }
}
