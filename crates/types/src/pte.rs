//! x86 page-table entry bits and page-fault error codes.

bitflags::bitflags! {
    /// Permission bits of a 32-bit page directory or page table entry.
    pub struct PteFlags: u32 {
        /// Present; the entry references a frame (or a page table).
        const P = 1 << 0;
        /// Writable from user mode.
        const W = 1 << 1;
        /// Accessible from user mode.
        const U = 1 << 2;
    }
}

bitflags::bitflags! {
    /// Error code pushed by the CPU on a page fault.
    pub struct FaultCode: u32 {
        /// Protection violation on a present page (clear: page not present).
        const PRESENT = 1 << 0;
        /// The faulting access was a write.
        const WRITE = 1 << 1;
        /// The fault happened in user mode.
        const USER = 1 << 2;
    }
}

/// Mask selecting the frame address of an entry.
pub const PTE_ADDR_MASK: u32 = !0xfff;
/// Mask selecting the flag bits of an entry.
pub const PTE_FLAGS_MASK: u32 = 0xfff;

impl PteFlags {
    /// Kernel-only read/write mapping.
    pub const KERNEL_RW: PteFlags = PteFlags::from_bits_truncate(0b011);
    /// User read/write mapping.
    pub const USER_RW: PteFlags = PteFlags::from_bits_truncate(0b111);
    /// User read-only mapping.
    pub const USER_RO: PteFlags = PteFlags::from_bits_truncate(0b101);
}
