//! This module contains a patcher that only rewrites individual bytes of a match

use super::Patcher;
use crate::span::{Span, SpanError};

/// Patcher for rewriting a few known offsets inside a match.
///
/// Used when the original and replacement encodings share everything except an immediate operand: the shared bytes
/// are never written.
pub struct DeltaPatcher<'a> {
    /// `(offset, byte)` pairs to write
    deltas: &'a [(usize, u8)],
    /// Length of the match the offsets refer to
    len: usize,
}
impl<'a> DeltaPatcher<'a> {
    /// Creates a new [`DeltaPatcher`] for matches of `len` bytes
    pub fn new(deltas: &'a [(usize, u8)], len: usize) -> Self {
        Self { deltas, len }
    }
}
unsafe impl<'a> Patcher for DeltaPatcher<'a> {
    type Error = SpanError;

    fn len(&self) -> usize {
        self.len
    }

    unsafe fn patch(&self, site: Span) -> Result<(), Self::Error> {
        let site = site.subspan(0, self.len)?;
        // Check every offset before the first write so a bad table leaves the site untouched
        for &(offset, _) in self.deltas {
            site.subspan(offset, 1)?;
        }
        for &(offset, value) in self.deltas {
            site.write_byte(offset, value)?;
        }
        Ok(())
    }
}
