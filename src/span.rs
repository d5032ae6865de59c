//! # Span
//!
//! Addressable byte spans. Everything that touches raw process memory goes through a [`Span`] so the
//! bounds checks live in one place instead of at every call site.

use std::{ptr, slice};

use thiserror::Error;

/// Errors when accessing a span
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SpanError {
    /// Access would leave the span
    #[error("access of {len} bytes at offset {offset:#x} is outside a span of {span:#x} bytes")]
    OutOfBounds {
        /// Offset of the access
        offset: usize,
        /// Length of the access
        len: usize,
        /// Length of the span
        span: usize,
    },
}

/// A run of bytes in the address space of the current process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    /// First byte of the span
    start: *mut u8,
    /// Number of bytes in the span
    len: usize,
}
impl Span {
    /// Creates a span over `len` bytes starting at `start`.
    ///
    /// # Safety
    ///
    /// `start` must be [https://doc.rust-lang.org/stable/std/ptr/index.html#safety](valid) for reads of `len` bytes
    /// for as long as the span is used. Writes through the span additionally require the memory to be writable at
    /// the time of the write.
    pub unsafe fn from_raw(start: *mut u8, len: usize) -> Self {
        Self { start, len }
    }

    /// Creates a span over `len` bytes starting at the absolute address `address`.
    ///
    /// # Safety
    ///
    /// See [`Span::from_raw`].
    pub unsafe fn from_address(address: usize, len: usize) -> Self {
        Self::from_raw(address as *mut u8, len)
    }

    /// A span that covers nothing. Scanning it yields no matches.
    pub fn empty() -> Self {
        Self {
            start: ptr::null_mut(),
            len: 0,
        }
    }

    /// Absolute address of the first byte
    pub fn start(&self) -> usize {
        self.start as usize
    }

    /// Pointer to the first byte
    pub fn as_ptr(&self) -> *mut u8 {
        self.start
    }

    /// Length of the span in bytes
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the span has no bytes
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Checks that `len` bytes at `offset` are inside the span
    fn check(&self, offset: usize, len: usize) -> Result<(), SpanError> {
        match offset.checked_add(len) {
            Some(end) if end <= self.len => Ok(()),
            _ => Err(SpanError::OutOfBounds {
                offset,
                len,
                span: self.len,
            }),
        }
    }

    /// Narrows the span to `len` bytes at `offset`
    pub fn subspan(&self, offset: usize, len: usize) -> Result<Span, SpanError> {
        self.check(offset, len)?;
        // Safety: the sub-range was checked to be inside our own valid range
        Ok(unsafe { Self::from_raw(self.start.add(offset), len) })
    }

    /// Borrows `len` bytes at `offset`.
    ///
    /// # Safety
    ///
    /// The returned slice must not outlive a write to the same bytes through this or any other span.
    pub unsafe fn bytes(&self, offset: usize, len: usize) -> Result<&[u8], SpanError> {
        self.check(offset, len)?;
        if len == 0 {
            return Ok(&[]);
        }
        Ok(slice::from_raw_parts(self.start.add(offset), len))
    }

    /// Copies `data` into the span at `offset`.
    ///
    /// # Safety
    ///
    /// The destination bytes must currently be writable.
    pub unsafe fn write(&self, offset: usize, data: &[u8]) -> Result<(), SpanError> {
        self.check(offset, data.len())?;
        ptr::copy_nonoverlapping(data.as_ptr(), self.start.add(offset), data.len());
        Ok(())
    }

    /// Writes a single byte at `offset`.
    ///
    /// # Safety
    ///
    /// The destination byte must currently be writable.
    pub unsafe fn write_byte(&self, offset: usize, value: u8) -> Result<(), SpanError> {
        self.check(offset, 1)?;
        ptr::write_volatile(self.start.add(offset), value);
        Ok(())
    }
}
