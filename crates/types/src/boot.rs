//! Boot-time handoff structures shared between bootloader and kernel.
//!
//! These types live in `types` so both sides agree on layout without
//! introducing circular dependencies.

use core::str::FromStr;

use crate::layout::KERNEL_START_ADDR;

/// Minimal boot information passed from the bootloader to the kernel.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BootInfo {
    /// First byte of the kernel image.
    pub kernel_start: u32,
    /// One past the last byte of the kernel image (the `end` symbol).
    pub kernel_end: u32,
    /// Physical page reserved inside the image for the kernel page directory.
    pub kernel_pagedir: u32,
}

impl BootInfo {
    pub const fn new(kernel_start: u32, kernel_end: u32, kernel_pagedir: u32) -> Self {
        Self {
            kernel_start,
            kernel_end,
            kernel_pagedir,
        }
    }
}

impl Default for BootInfo {
    fn default() -> Self {
        Self::new(KERNEL_START_ADDR, 0x5_0000, 0x4_f000)
    }
}

/// Which set of user programs the kernel starts with.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BootCommand {
    /// Four independent allocator processes.
    #[default]
    Allocators,
    /// One process that forks twice, then allocates.
    Fork,
    /// One process that forks and exits at random.
    ForkExit,
}

impl BootCommand {
    pub fn as_str(self) -> &'static str {
        match self {
            BootCommand::Allocators => "allocators",
            BootCommand::Fork => "fork",
            BootCommand::ForkExit => "forkexit",
        }
    }
}

impl FromStr for BootCommand {
    type Err = core::convert::Infallible;

    /// Unknown commands fall back to the allocators, like a bare boot.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "fork" => BootCommand::Fork,
            "forkexit" => BootCommand::ForkExit,
            _ => BootCommand::Allocators,
        })
    }
}
