//! # Patch
//!
//! This module covers patchers, which overwrite a matched signature in place.
//!
//! Patches are one-way: there is nothing to restore, and the patched bytes stay for the lifetime of the process.

pub mod byte;
pub mod delta;
pub mod mem;

use crate::signature::{Replacement, Signature};
use crate::span::{Span, SpanError};

use self::byte::BytePatcher;
use self::delta::DeltaPatcher;

/// Writes a replacement encoding over a match
///
/// # Safety
///
/// Patchers are inherently unsafe. The implementor must never write outside the first [`Patcher::len`] bytes of the
/// site it was handed, since wrappers rely on that length to decide which pages to make writable
pub unsafe trait Patcher {
    /// Error type that can occur when patching
    type Error;

    /// Number of bytes at the start of a site that this patcher may touch
    fn len(&self) -> usize;

    /// Returns `true` if the patcher touches nothing
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Patches the start of `site`.
    ///
    /// # Safety
    ///
    /// The first [`Patcher::len`] bytes of `site` must be writable
    unsafe fn patch(&self, site: Span) -> Result<(), Self::Error>;
}

unsafe impl<P: Patcher + ?Sized> Patcher for &P {
    type Error = P::Error;

    fn len(&self) -> usize {
        (**self).len()
    }

    unsafe fn patch(&self, site: Span) -> Result<(), Self::Error> {
        (**self).patch(site)
    }
}

/// A signature patches with whichever variant its replacement calls for
unsafe impl Patcher for Signature {
    type Error = SpanError;

    fn len(&self) -> usize {
        self.original().len()
    }

    unsafe fn patch(&self, site: Span) -> Result<(), Self::Error> {
        match self.replacement() {
            Replacement::Full(bytes) => BytePatcher::new(bytes).patch(site),
            Replacement::Delta(deltas) => {
                DeltaPatcher::new(deltas, self.original().len()).patch(site)
            }
        }
    }
}
