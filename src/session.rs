//! # Session
//!
//! One complete patch run: locate the image, scan its code region, patch every match.
//!
//! Nothing in here fails towards the caller. Every problem ends up as a [`Status`] and a log line, and the worst
//! outcome is a process that keeps running with the original limit.

use std::fmt::Display;

use log::{error, info, warn};

use crate::image::ImageLocator;
use crate::patcher::Patcher;
use crate::scan::matches;

/// Which matches a run patches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchPolicy {
    /// Stop after the first match, whether or not it could be patched
    First,
    /// Patch every match in the code region
    All,
}

/// Outcome of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// This many matches were patched (at least one)
    Patched(usize),
    /// The image couldn't be located, so nothing was scanned or written
    LocatorFailure,
    /// Matches were found but none of them could be patched
    Unpatched,
    /// The code region holds no match
    NoMatchFound,
}
impl Status {
    /// Status as a plain integer: the patch count on success, a distinct negative value otherwise
    pub fn code(&self) -> i32 {
        match self {
            Status::Patched(count) => i32::try_from(*count).unwrap_or(i32::MAX),
            Status::LocatorFailure => -1,
            Status::Unpatched => -2,
            Status::NoMatchFound => -3,
        }
    }

    /// Returns `true` if at least one match was patched
    pub fn is_success(&self) -> bool {
        matches!(self, Status::Patched(_))
    }
}

/// Finds `pattern` in the code region reported by `locator` and hands each match to `patcher`.
///
/// A failure on one match is logged and the next match is still attempted.
///
/// # Safety
///
/// The code region returned by `locator` must be readable, and the patcher must be able to write the matches it is
/// handed (normally by wrapping it in a [`PermissionWrapper`](crate::patcher::mem::PermissionWrapper)). No other
/// thread may be executing the code being patched.
pub unsafe fn apply<L, P>(locator: &L, pattern: &[u8], patcher: &P, policy: MatchPolicy) -> Status
where
    L: ImageLocator + ?Sized,
    P: Patcher + ?Sized,
    P::Error: Display,
{
    let image = match locator.locate() {
        Ok(image) => image,
        Err(err) => {
            error!("ERROR: {}", err);
            return Status::LocatorFailure;
        }
    };
    info!("Image: {:#x}, Slide: {:#x}", image.base, image.slide);
    info!(
        "Code: base={:#x}, size={:#x}",
        image.code.start(),
        image.code.len()
    );

    let mut found = 0usize;
    let mut patched = 0usize;

    for offset in matches(image.code, pattern) {
        found += 1;
        info!("Pattern found at offset {:#x}", offset);

        let result = image
            .code
            .subspan(offset, pattern.len())
            .map_err(|err| err.to_string())
            .and_then(|site| patcher.patch(site).map_err(|err| err.to_string()));
        match result {
            Ok(()) => {
                patched += 1;
                info!("  -> Patched (#{})", patched);
            }
            Err(err) => warn!("  -> Not patched: {}", err),
        }

        if policy == MatchPolicy::First {
            break;
        }
    }

    info!("Total patches applied: {}", patched);
    match (found, patched) {
        (0, _) => Status::NoMatchFound,
        (_, 0) => Status::Unpatched,
        (_, n) => Status::Patched(n),
    }
}
