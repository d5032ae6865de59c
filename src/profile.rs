//! # Profile
//!
//! Everything that differs between platform builds, picked at compile time. Exactly one profile exists per build
//! artifact, so there is no runtime branching on the platform.

use crate::session::MatchPolicy;
use crate::signature::{self, Signature};

/// Signature and match handling for one platform/architecture
#[derive(Debug, Clone, Copy)]
pub struct Profile {
    /// Architecture name, for the log
    pub arch: &'static str,
    /// Pattern pair to apply
    pub signature: Signature,
    /// Which matches to patch
    pub policy: MatchPolicy,
}

/// macOS on Apple silicon
pub const MACOS_ARM64: Profile = Profile {
    arch: "arm64",
    signature: signature::MACOS_ARM64,
    policy: MatchPolicy::All,
};

/// macOS on Intel
pub const MACOS_X86_64: Profile = Profile {
    arch: "x86_64",
    signature: signature::MACOS_X86_64,
    policy: MatchPolicy::All,
};

/// Windows on x86_64. The DLL build has always stopped at the first match.
pub const WINDOWS_X86_64: Profile = Profile {
    arch: "x86_64",
    signature: signature::WINDOWS_X86_64,
    policy: MatchPolicy::First,
};

/// Profile of this build
#[cfg(all(target_os = "macos", target_arch = "aarch64"))]
pub const CURRENT: Option<Profile> = Some(MACOS_ARM64);
/// Profile of this build
#[cfg(all(target_os = "macos", target_arch = "x86_64"))]
pub const CURRENT: Option<Profile> = Some(MACOS_X86_64);
/// Profile of this build
#[cfg(all(windows, target_arch = "x86_64"))]
pub const CURRENT: Option<Profile> = Some(WINDOWS_X86_64);
/// No patch exists for this platform
#[cfg(not(any(
    all(target_os = "macos", any(target_arch = "aarch64", target_arch = "x86_64")),
    all(windows, target_arch = "x86_64")
)))]
pub const CURRENT: Option<Profile> = None;
