use core::fmt;

use crate::layout::{PAGE_OFFSET_MASK, PAGE_SHIFT};

/// Physical address inside simulated RAM.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct PhysAddr(pub u32);

/// Virtual address as seen through a page directory.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct VirtAddr(pub u32);

impl PhysAddr {
    pub const fn as_u32(self) -> u32 {
        self.0
    }

    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }

    pub const fn page_number(self) -> usize {
        (self.0 >> PAGE_SHIFT) as usize
    }

    pub const fn from_page_number(pn: usize) -> Self {
        PhysAddr((pn as u32) << PAGE_SHIFT)
    }

    pub const fn is_page_aligned(self) -> bool {
        self.0 & PAGE_OFFSET_MASK == 0
    }

    pub const fn wrapping_add(self, value: u32) -> Self {
        PhysAddr(self.0.wrapping_add(value))
    }
}

impl VirtAddr {
    pub const fn as_u32(self) -> u32 {
        self.0
    }

    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }

    /// Page-directory index (bits 31:22).
    pub const fn pdx(self) -> usize {
        (self.0 >> 22) as usize
    }

    /// Page-table index (bits 21:12).
    pub const fn ptx(self) -> usize {
        ((self.0 >> PAGE_SHIFT) & 0x3ff) as usize
    }

    pub const fn offset(self) -> u32 {
        self.0 & PAGE_OFFSET_MASK
    }

    pub const fn align_down(self) -> Self {
        VirtAddr(self.0 & !PAGE_OFFSET_MASK)
    }

    pub const fn is_page_aligned(self) -> bool {
        self.0 & PAGE_OFFSET_MASK == 0
    }

    pub const fn wrapping_add(self, value: u32) -> Self {
        VirtAddr(self.0.wrapping_add(value))
    }

    pub fn checked_add(self, value: u32) -> Option<Self> {
        self.0.checked_add(value).map(VirtAddr)
    }
}

impl From<u32> for PhysAddr {
    fn from(value: u32) -> Self {
        PhysAddr(value)
    }
}

impl From<u32> for VirtAddr {
    fn from(value: u32) -> Self {
        VirtAddr(value)
    }
}

impl fmt::Debug for PhysAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pa:{:#07x}", self.0)
    }
}

impl fmt::Display for PhysAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#07x}", self.0)
    }
}

impl fmt::Debug for VirtAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "va:{:#07x}", self.0)
    }
}

impl fmt::Display for VirtAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#07x}", self.0)
    }
}
