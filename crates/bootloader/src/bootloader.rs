use kernel::{Kernel, KernelConfig, KernelError};
use log::info;
use types::BootInfo;

/// Boot configuration options consumed by the loader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BootConfig {
    /// One past the last byte of the kernel image.
    pub kernel_end: u32,
    /// Page inside the kernel image holding the kernel page directory.
    pub kernel_pagedir: u32,
    pub kernel: KernelConfig,
}

impl Default for BootConfig {
    fn default() -> Self {
        let boot = BootInfo::default();
        Self {
            kernel_end: boot.kernel_end,
            kernel_pagedir: boot.kernel_pagedir,
            kernel: KernelConfig::default(),
        }
    }
}

/// Hands a freshly classified machine to the kernel.
#[derive(Debug, Default)]
pub struct Bootloader {
    pub config: BootConfig,
}

impl Bootloader {
    pub fn new(config: BootConfig) -> Self {
        Self { config }
    }

    pub fn boot_info(&self) -> BootInfo {
        BootInfo {
            kernel_end: self.config.kernel_end,
            kernel_pagedir: self.config.kernel_pagedir,
            ..BootInfo::default()
        }
    }

    /// Build the boot handoff and bring the kernel up on it.
    pub fn boot(&self) -> Result<Kernel, KernelError> {
        let boot = self.boot_info();
        info!(
            "boot: kernel image {:#x}..{:#x}, directory at {:#x}",
            boot.kernel_start, boot.kernel_end, boot.kernel_pagedir
        );
        Kernel::new(boot, self.config.kernel)
    }
}
