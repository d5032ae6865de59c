//! # Mach-O
//!
//! Walks the load commands of a 64-bit Mach-O header that is already mapped into memory, looking for the `__TEXT`
//! segment.
//!
//! Addresses recorded in the segment commands are link-time addresses. The loader slides the whole image, so the
//! runtime address of a segment is `vmaddr + slide`.

use goblin::mach::header::{Header64, MH_MAGIC_64, SIZEOF_HEADER_64};
use goblin::mach::load_command::{CommandVariant, LoadCommand, SegmentCommand64};
use log::debug;
use scroll::{Pread, LE};

use super::{Image, ImageLocator, LocateError};
use crate::span::Span;

/// Conventional name of the code segment
pub const TEXT_SEGMENT: &str = "__TEXT";

/// Smallest `cmdsize` that still covers the `load_command` header itself
const MIN_CMDSIZE: usize = 8;

/// A segment as recorded in the load commands
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    /// Segment name, without the NUL padding
    pub name: String,
    /// Link-time address
    pub vmaddr: u64,
    /// In-memory size
    pub vmsize: u64,
}
impl Segment {
    /// Runtime address of the segment once the image has been slid
    pub fn runtime_address(&self, slide: isize) -> usize {
        (self.vmaddr as usize).wrapping_add_signed(slide)
    }
}
impl From<&SegmentCommand64> for Segment {
    fn from(command: &SegmentCommand64) -> Self {
        let end = command
            .segname
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(command.segname.len());
        Self {
            name: String::from_utf8_lossy(&command.segname[..end]).into_owned(),
            vmaddr: command.vmaddr,
            vmsize: command.vmsize,
        }
    }
}

/// Load commands of a mapped Mach-O header
pub struct LoadCommands {
    /// Header plus all of its load commands
    header: Span,
    /// Number of commands the header claims
    count: u32,
}
impl LoadCommands {
    /// Reads the header at `header`.
    ///
    /// # Safety
    ///
    /// `header` must point at a mapped Mach-O header whose load commands are mapped right behind it, and nothing may
    /// write to them while the returned value is alive.
    pub unsafe fn new(header: *const u8) -> Result<Self, LocateError> {
        if header.is_null() {
            return Err(LocateError::NoHeader);
        }
        let fixed = Span::from_raw(header as *mut u8, SIZEOF_HEADER_64);
        let parsed: Header64 = fixed.bytes(0, SIZEOF_HEADER_64)?.pread_with(0, LE)?;
        if parsed.magic != MH_MAGIC_64 {
            return Err(LocateError::BadMagic(parsed.magic));
        }

        Ok(Self {
            header: Span::from_raw(
                header as *mut u8,
                SIZEOF_HEADER_64 + parsed.sizeofcmds as usize,
            ),
            count: parsed.ncmds,
        })
    }

    /// Iterates over the load commands in header order.
    ///
    /// The walk stops early at a record that can't be decoded, is too small to hold its own header, or would run
    /// past `sizeofcmds`, since nothing after it can be located reliably.
    pub fn iter(&self) -> impl Iterator<Item = LoadCommand> + '_ {
        // Safety: the constructor's contract keeps these bytes mapped and unchanged
        let bytes = unsafe { self.header.bytes(0, self.header.len()) }.unwrap_or(&[]);
        let mut offset = SIZEOF_HEADER_64;
        let mut remaining = self.count;

        std::iter::from_fn(move || {
            if remaining == 0 {
                return None;
            }
            remaining -= 1;

            let start = offset;
            let command = LoadCommand::parse(bytes, &mut offset, LE).ok()?;
            let size = command.command.cmdsize();
            if size < MIN_CMDSIZE || start + size > bytes.len() {
                return None;
            }
            Some(command)
        })
    }

    /// All `LC_SEGMENT_64` records
    pub fn segments(&self) -> impl Iterator<Item = Segment> + '_ {
        self.iter().filter_map(|command| match command.command {
            CommandVariant::Segment64(ref segment) => Some(Segment::from(segment)),
            _ => None,
        })
    }

    /// First segment called `name`
    pub fn find_segment(&self, name: &str) -> Option<Segment> {
        self.segments().find(|segment| segment.name == name)
    }
}

/// Locator over an explicit header address and slide
pub struct MachImage {
    /// Address of `mach_header_64`
    header: *const u8,
    /// Load-time slide of the image
    slide: isize,
}
impl MachImage {
    /// Creates a locator for the image whose header sits at `header`.
    ///
    /// # Safety
    ///
    /// See [`LoadCommands::new`]. If a `__TEXT` segment is found, `vmaddr + slide` must be readable for `vmsize`
    /// bytes.
    pub unsafe fn new(header: *const u8, slide: isize) -> Self {
        Self { header, slide }
    }
}

impl ImageLocator for MachImage {
    fn locate(&self) -> Result<Image, LocateError> {
        // Safety: guaranteed by the constructor
        let commands = unsafe { LoadCommands::new(self.header)? };

        let code = match commands.find_segment(TEXT_SEGMENT) {
            Some(segment) => {
                debug!(
                    "{} vmaddr={:#x} vmsize={:#x}",
                    segment.name, segment.vmaddr, segment.vmsize
                );
                // Safety: guaranteed by the constructor
                unsafe {
                    Span::from_address(segment.runtime_address(self.slide), segment.vmsize as usize)
                }
            }
            None => Span::empty(),
        };

        Ok(Image {
            base: self.header as usize,
            slide: self.slide,
            code,
        })
    }
}

/// dyld's image list
#[cfg(target_os = "macos")]
mod dyld {
    extern "C" {
        /// Address of the `mach_header` of image `image_index`, or null
        pub fn _dyld_get_image_header(image_index: u32) -> *const u8;
        /// Load-time slide of image `image_index`
        pub fn _dyld_get_image_vmaddr_slide(image_index: u32) -> isize;
    }
}

/// Locator for the main executable, as reported by dyld (image index 0)
#[cfg(target_os = "macos")]
#[derive(Default)]
pub struct DyldImage;

#[cfg(target_os = "macos")]
impl ImageLocator for DyldImage {
    fn locate(&self) -> Result<Image, LocateError> {
        // Safety: both calls only read dyld's image list
        let (header, slide) = unsafe {
            (
                dyld::_dyld_get_image_header(0),
                dyld::_dyld_get_image_vmaddr_slide(0),
            )
        };
        if header.is_null() {
            return Err(LocateError::NoHeader);
        }
        // Safety: dyld hands out the header of a mapped image, and its segments are mapped at vmaddr + slide
        unsafe { MachImage::new(header, slide) }.locate()
    }
}
