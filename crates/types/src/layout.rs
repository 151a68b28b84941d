//! Physical and virtual memory layout shared by the kernel, the loader and
//! the simulated hardware.
//!
//! Physical memory below `PROC_START_ADDR` holds the kernel image, the
//! kernel stack and the legacy hardware hole. Every process sees the same
//! layout: kernel mappings below the boundary, its own pages above it.

/// Page size in bytes (4 KiB).
pub const PAGE_SIZE: usize = 4096;
pub const PAGE_SHIFT: u32 = 12;
pub const PAGE_OFFSET_MASK: u32 = 0xfff;

/// Entries per page directory or page table.
pub const PAGETABLE_NENTRIES: usize = 1024;

/// Bytes of simulated physical memory.
pub const MEMSIZE_PHYSICAL: usize = 0x20_0000;
/// Number of physical pages.
pub const NPAGES: usize = MEMSIZE_PHYSICAL / PAGE_SIZE;
/// Size of every process's virtual address space.
pub const MEMSIZE_VIRTUAL: usize = 0x30_0000;

pub const KERNEL_START_ADDR: u32 = 0x4_0000;
pub const KERNEL_STACK_TOP: u32 = 0x8_0000;
/// Lowest user-space virtual address.
pub const PROC_START_ADDR: u32 = 0x10_0000;
/// Stride between per-process stacks and program images.
pub const PROC_SIZE: u32 = 0x4_0000;
/// Video memory page; the only user-visible page below `PROC_START_ADDR`.
pub const CONSOLE_ADDR: u32 = 0xb_8000;

/// Legacy I/O hole `[IOPHYSMEM, EXTPHYSMEM)`.
pub const IOPHYSMEM: u32 = 0xa_0000;
pub const EXTPHYSMEM: u32 = 0x10_0000;

/// Size of the process table.
pub const NPROC: usize = 16;

pub const fn page_address(pn: usize) -> u32 {
    (pn as u32) << PAGE_SHIFT
}

pub const fn round_down(value: u32) -> u32 {
    value & !PAGE_OFFSET_MASK
}

pub const fn round_up(value: u32) -> u32 {
    round_down(value.wrapping_add(PAGE_OFFSET_MASK))
}
