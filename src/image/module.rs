//! # Module
//!
//! Locator for the main module of a Windows process. PE images have no single code segment we need to pick out, so
//! the code region is the whole module as reported by the loader.

use std::{io, mem, ptr};

use windows_sys::Win32::System::{
    LibraryLoader::GetModuleHandleW,
    ProcessStatus::{GetModuleInformation, MODULEINFO},
    Threading::GetCurrentProcess,
};

use super::{Image, ImageLocator, LocateError};
use crate::span::Span;

/// The executable that started the current process
#[derive(Default)]
pub struct CurrentModule;

impl ImageLocator for CurrentModule {
    fn locate(&self) -> Result<Image, LocateError> {
        unsafe {
            // Safety: a null name asks for the process executable, which is never unloaded
            let module = GetModuleHandleW(ptr::null());
            if module.is_null() {
                return Err(LocateError::NoHeader);
            }

            let mut info: MODULEINFO = mem::zeroed();
            if GetModuleInformation(
                GetCurrentProcess(),
                module,
                &mut info,
                mem::size_of::<MODULEINFO>() as u32,
            ) == 0
            {
                return Err(LocateError::ModuleInfo(io::Error::last_os_error()));
            }

            let base = info.lpBaseOfDll as usize;
            Ok(Image {
                base,
                // PE images are mapped at their runtime base directly, all offsets are relative to it
                slide: 0,
                // Safety: the loader maps the full image for the lifetime of the process
                code: Span::from_address(base, info.SizeOfImage as usize),
            })
        }
    }
}
