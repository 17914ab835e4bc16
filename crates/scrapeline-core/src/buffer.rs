//! Append-only growable text buffer.
//!
//! Capacity starts at [`INITIAL_CAPACITY`] bytes and doubles until the
//! pending append fits with one spare byte. Growth goes through
//! `try_reserve` so an allocation failure surfaces as
//! [`MetricsError::Alloc`] instead of aborting.

use std::fmt;

use crate::error::{MetricsError, Result};

/// Initial capacity of a fresh or cleared buffer.
pub const INITIAL_CAPACITY: usize = 32;

#[derive(Debug)]
pub struct GrowableBuffer {
    text: String,
    /// Logical capacity; always >= text.len() + 1.
    capacity: usize,
}

impl Default for GrowableBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl GrowableBuffer {
    pub fn new() -> Self {
        Self {
            text: String::with_capacity(INITIAL_CAPACITY),
            capacity: INITIAL_CAPACITY,
        }
    }

    fn ensure_space(&mut self, add_len: usize) -> Result<()> {
        let needed = self
            .text
            .len()
            .checked_add(add_len)
            .and_then(|n| n.checked_add(1))
            .ok_or_else(|| MetricsError::Alloc("buffer length overflow".into()))?;
        if add_len == 0 || self.capacity >= needed {
            return Ok(());
        }

        let mut capacity = self.capacity;
        while capacity < needed {
            capacity = capacity
                .checked_mul(2)
                .ok_or_else(|| MetricsError::Alloc("buffer capacity overflow".into()))?;
        }
        self.text
            .try_reserve_exact(capacity - self.text.len())
            .map_err(|e| MetricsError::Alloc(format!("buffer growth to {capacity}: {e}")))?;
        self.capacity = capacity;
        Ok(())
    }

    /// Append a string slice. Empty input is a no-op.
    pub fn push_str(&mut self, s: &str) -> Result<()> {
        if s.is_empty() {
            return Ok(());
        }
        self.ensure_space(s.len())?;
        self.text.push_str(s);
        Ok(())
    }

    /// Append a single character.
    pub fn push(&mut self, c: char) -> Result<()> {
        self.ensure_space(c.len_utf8())?;
        self.text.push(c);
        Ok(())
    }

    /// Shorten to `len` bytes; longer lengths and non-char boundaries are ignored.
    pub fn truncate(&mut self, len: usize) {
        if len < self.text.len() && self.text.is_char_boundary(len) {
            self.text.truncate(len);
        }
    }

    /// Drop the contents and shrink back to the initial capacity.
    pub fn clear(&mut self) {
        self.text = String::with_capacity(INITIAL_CAPACITY);
        self.capacity = INITIAL_CAPACITY;
    }

    /// Hand the accumulated text to the caller and reset for reuse.
    pub fn dump(&mut self) -> String {
        let out = std::mem::take(&mut self.text);
        self.clear();
        out
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl fmt::Write for GrowableBuffer {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.push_str(s).map_err(|_| fmt::Error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capacity_doubles_past_initial() {
        let mut b = GrowableBuffer::new();
        assert_eq!(b.capacity(), 32);
        b.push_str(&"x".repeat(31)).unwrap();
        assert_eq!(b.capacity(), 32);
        b.push('y').unwrap();
        assert_eq!(b.capacity(), 64);
        b.push_str(&"z".repeat(100)).unwrap();
        assert_eq!(b.capacity(), 256);
        assert!(b.capacity() >= b.len() + 1);
    }

    #[test]
    fn dump_hands_over_and_resets() {
        let mut b = GrowableBuffer::new();
        b.push_str("# HELP ").unwrap();
        b.push_str(&"a".repeat(64)).unwrap();
        let out = b.dump();
        assert!(out.starts_with("# HELP a"));
        assert!(b.is_empty());
        assert_eq!(b.capacity(), INITIAL_CAPACITY);

        b.push_str("again").unwrap();
        assert_eq!(b.as_str(), "again");
    }

    #[test]
    fn truncate_ignores_longer_lengths() {
        let mut b = GrowableBuffer::new();
        b.push_str("abcdef").unwrap();
        b.truncate(10);
        assert_eq!(b.as_str(), "abcdef");
        b.truncate(3);
        assert_eq!(b.as_str(), "abc");
    }

    #[test]
    fn write_macro_appends() {
        use std::fmt::Write;
        let mut b = GrowableBuffer::new();
        write!(b, "{:.6}", 1.5).unwrap();
        assert_eq!(b.as_str(), "1.500000");
    }
}
