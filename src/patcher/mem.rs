//! This module contains a patcher which adjusts memory permissions to patch read-only code

use region::Protection;
use thiserror::Error;

use super::Patcher;
use crate::span::Span;

/// Errors when using permission patching
#[derive(Debug, Error)]
pub enum PermissionError<E> {
    /// Error when setting memory protections
    #[error("Error setting memory protections: {0}")]
    ProtectionError(#[from] region::Error),
    /// Error from the underlying patcher
    #[error("{0}")]
    CustomError(E),
}

/// The whole pages covering a byte range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageSpan {
    /// Address of the first page
    pub start: usize,
    /// Number of pages
    pub count: usize,
    /// Size of one page
    pub page_size: usize,
}
impl PageSpan {
    /// Pages covering `len` bytes at `address`, using the system page size
    pub fn containing(address: usize, len: usize) -> Self {
        Self::with_page_size(address, len, region::page::size())
    }

    /// Pages covering `len` bytes at `address`. A range that straddles a boundary covers both pages.
    pub fn with_page_size(address: usize, len: usize, page_size: usize) -> Self {
        let start = address & !(page_size - 1);
        let count = (address - start + len + page_size - 1) / page_size;
        Self {
            start,
            count,
            page_size,
        }
    }

    /// Length of the covered range in bytes
    pub fn len(&self) -> usize {
        self.count * self.page_size
    }

    /// Returns `true` if no page is covered
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

/// Temporarily makes pages writable
pub trait Protector {
    /// Restores the protection that was in force before [`Protector::unprotect`] when dropped
    type Guard;

    /// Makes `pages` readable, writable and executable, remembering what they were before.
    ///
    /// # Safety
    ///
    /// Code in `pages` must not run concurrently with writes into it
    unsafe fn unprotect(&self, pages: PageSpan) -> Result<Self::Guard, region::Error>;
}

impl<M: Protector + ?Sized> Protector for &M {
    type Guard = M::Guard;

    unsafe fn unprotect(&self, pages: PageSpan) -> Result<Self::Guard, region::Error> {
        (**self).unprotect(pages)
    }
}

/// [`Protector`] on top of the OS protection calls.
///
/// The previous protection of every region inside the range is queried before anything changes, and put back
/// exactly when the guard drops, so pages never end up more permissive than they were.
#[derive(Default)]
pub struct RegionProtector;

impl Protector for RegionProtector {
    type Guard = region::ProtectGuard;

    unsafe fn unprotect(&self, pages: PageSpan) -> Result<Self::Guard, region::Error> {
        // The pages hold code, so they have to stay executable while they're writable
        region::protect_with_handle(
            pages.start as *const u8,
            pages.len(),
            Protection::READ_WRITE_EXECUTE,
        )
    }
}

/// This struct wraps patchers to allow them to write to memory that's normally unwritable.
/// It achieves this result by changing the memory permissions of the target memory, triggering the patch, and then reverting the permissions.
///
/// If the permissions can't be changed, nothing is written.
pub struct PermissionWrapper<P: Patcher, M: Protector = RegionProtector> {
    /// Underlying patcher.
    patcher: P,
    /// Changes the page permissions around the write
    protector: M,
}
impl<P: Patcher> PermissionWrapper<P> {
    /// Creates a new PermissionWrapper using the OS protection calls
    pub fn new(patcher: P) -> Self {
        Self::with_protector(patcher, RegionProtector)
    }
}
impl<P: Patcher, M: Protector> PermissionWrapper<P, M> {
    /// Creates a new PermissionWrapper using `protector`
    pub fn with_protector(patcher: P, protector: M) -> Self {
        Self { patcher, protector }
    }
}

unsafe impl<P, M> Patcher for PermissionWrapper<P, M>
where
    P: Patcher,
    M: Protector,
{
    type Error = PermissionError<P::Error>;

    fn len(&self) -> usize {
        self.patcher.len()
    }

    unsafe fn patch(&self, site: Span) -> Result<(), Self::Error> {
        let pages = PageSpan::containing(site.start(), self.patcher.len());
        let _guard = self.protector.unprotect(pages)?;
        self.patcher.patch(site).map_err(PermissionError::CustomError)
        // `_guard` restores the previous protection here
    }
}
