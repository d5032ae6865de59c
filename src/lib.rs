#![warn(clippy::missing_docs_in_private_items)]
#![warn(rustdoc::missing_crate_level_docs)]
#![doc = include_str!("../README.md")]

pub mod entry;
pub mod image;
pub mod logger;
pub mod patcher;
pub mod profile;
pub mod scan;
pub mod session;
pub mod signature;
pub mod span;
