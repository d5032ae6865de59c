//! # Entry
//!
//! Runs the patch once, as soon as the library is mapped into the game and before the game's own entry point.
//!
//! - macOS: a pointer in `__DATA,__mod_init_func`, which dyld calls while loading the image.
//! - Windows: `DllMain` on `DLL_PROCESS_ATTACH`.

use lazy_static::lazy_static;
use log::{info, warn};

use crate::profile::{self, Profile};
use crate::session::Status;

lazy_static! {
    /// Outcome of the one and only run. Forcing it runs the patch, later accesses just read it.
    static ref OUTCOME: Status = run();
}

/// Runs the patch if it hasn't run yet and returns its outcome. Calls after the first are no-ops that return the
/// recorded status.
pub fn on_load() -> Status {
    *OUTCOME
}

/// Runs the patch for this build's profile
fn run() -> Status {
    #[cfg(not(test))]
    crate::logger::init();
    info!("=== FontPatch started ===");

    let status = match profile::CURRENT {
        Some(profile) => run_profile(&profile),
        None => {
            info!("No patch for this platform");
            Status::NoMatchFound
        }
    };

    if status.is_success() {
        info!("Status: {:?} ({})", status, status.code());
    } else {
        warn!("Status: {:?} ({}), the game keeps its original limit", status, status.code());
    }
    info!("=== FontPatch complete ===");
    log::logger().flush();
    status
}

/// Applies `profile` to the main image of the process
#[cfg(any(target_os = "macos", windows))]
fn run_profile(profile: &Profile) -> Status {
    use crate::patcher::mem::PermissionWrapper;

    info!("Architecture: {}", profile.arch);
    #[cfg(target_arch = "x86_64")]
    info!(
        "Looking for:\n{}",
        crate::signature::describe(profile.signature.original(), 0)
    );

    #[cfg(target_os = "macos")]
    let locator = crate::image::DyldImage;
    #[cfg(windows)]
    let locator = crate::image::CurrentModule;

    let patcher = PermissionWrapper::new(profile.signature);
    // Safety: the locator only reports mapped code, the wrapper makes it writable for each write, and the game
    // hasn't started any threads of its own yet
    unsafe {
        crate::session::apply(
            &locator,
            profile.signature.original(),
            &patcher,
            profile.policy,
        )
    }
}

/// No loader integration exists here, so there is nothing to locate
#[cfg(not(any(target_os = "macos", windows)))]
fn run_profile(profile: &Profile) -> Status {
    info!("Architecture: {}", profile.arch);
    Status::LocatorFailure
}

/// dyld entry
#[cfg(all(target_os = "macos", not(test)))]
extern "C" fn font_patch_init() {
    on_load();
}

/// Initializer pointer dyld runs before the game's own entry point
#[cfg(all(target_os = "macos", not(test)))]
#[used]
#[link_section = "__DATA,__mod_init_func"]
static FONT_PATCH_INIT: extern "C" fn() = font_patch_init;

/// Windows loader entry
#[cfg(all(windows, not(test)))]
#[no_mangle]
#[allow(non_snake_case)]
pub extern "system" fn DllMain(
    module: windows_sys::Win32::Foundation::HMODULE,
    reason: u32,
    _reserved: *mut core::ffi::c_void,
) -> i32 {
    use windows_sys::Win32::System::{
        LibraryLoader::DisableThreadLibraryCalls, SystemServices::DLL_PROCESS_ATTACH,
    };

    if reason == DLL_PROCESS_ATTACH {
        // Safety: `module` is our own handle, straight from the loader
        unsafe { DisableThreadLibraryCalls(module) };
        on_load();
    }
    1
}
