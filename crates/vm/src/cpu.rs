use types::{PhysAddr, VirtAddr};

/// The control registers the kernel reads and writes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Cpu {
    /// Faulting address of the most recent page fault.
    cr2: VirtAddr,
    /// Active page directory.
    cr3: PhysAddr,
}

impl Cpu {
    pub fn new(pagedir: PhysAddr) -> Self {
        Self {
            cr2: VirtAddr(0),
            cr3: pagedir,
        }
    }

    pub fn lcr3(&mut self, pagedir: PhysAddr) {
        self.cr3 = pagedir;
    }

    pub fn rcr3(&self) -> PhysAddr {
        self.cr3
    }

    /// Written by the hardware when a page fault is delivered.
    pub fn set_cr2(&mut self, addr: VirtAddr) {
        self.cr2 = addr;
    }

    pub fn rcr2(&self) -> VirtAddr {
        self.cr2
    }
}
