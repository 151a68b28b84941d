//! Boot handoff and program loading.
//!
//! This crate provides:
//! - `Bootloader`, which turns a `BootConfig` into the `BootInfo` the kernel
//!   starts from and brings the kernel up,
//! - `ProgramImage`, a loadable image parsed from a 32-bit ELF executable,
//! - `RamImageLoader`, which places images into process address spaces.

pub mod bootloader;
pub mod image;
pub mod loader;

pub use bootloader::{BootConfig, Bootloader};
pub use image::{ImageError, ProgramImage, Segment};
pub use loader::RamImageLoader;
