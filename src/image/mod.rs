//! # Image
//!
//! Locates the main executable image of the current process and the part of it that holds code.

use std::io;

use thiserror::Error;

use crate::span::{Span, SpanError};

pub mod macho;
#[cfg(windows)]
pub mod module;

#[cfg(target_os = "macos")]
pub use macho::DyldImage;
pub use macho::MachImage;
#[cfg(windows)]
pub use module::CurrentModule;

/// Errors while locating the image. All of them are fatal for a patch run.
#[derive(Debug, Error)]
pub enum LocateError {
    /// The loader returned no header for the main image
    #[error("no image header")]
    NoHeader,
    /// The header doesn't describe an image we understand
    #[error("unexpected image magic {0:#x}")]
    BadMagic(u32),
    /// The image header couldn't be read
    #[error("image header is truncated: {0}")]
    Truncated(#[from] SpanError),
    /// The image header couldn't be decoded
    #[error("malformed image header: {0}")]
    Malformed(#[from] scroll::Error),
    /// The loader refused to describe the main module
    #[error("could not query module information: {0}")]
    ModuleInfo(#[source] io::Error),
}

/// Descriptor of the loaded image, computed once right before scanning
#[derive(Debug, Clone, Copy)]
pub struct Image {
    /// Runtime load address of the image
    pub base: usize,
    /// Displacement between the link-time and runtime addresses
    pub slide: isize,
    /// Region holding the executable code. Empty if the image has none we can find.
    pub code: Span,
}

/// Something that knows where the running image lives
pub trait ImageLocator {
    /// Finds the image and its code region
    fn locate(&self) -> Result<Image, LocateError>;
}

impl<L: ImageLocator + ?Sized> ImageLocator for &L {
    fn locate(&self) -> Result<Image, LocateError> {
        (**self).locate()
    }
}
