use types::{PhysAddr, Registers, VirtAddr};

use crate::memory::PhysicalMemory;
use crate::mmu::{translate, Access, PageFault, Privilege};

/// A process executing in user mode: its registers plus memory as seen
/// through its page directory. Every access is checked by the MMU.
#[derive(Debug)]
pub struct UserContext<'a> {
    pub regs: Registers,
    mem: &'a mut PhysicalMemory,
    pagedir: PhysAddr,
}

impl<'a> UserContext<'a> {
    pub fn new(regs: Registers, mem: &'a mut PhysicalMemory, pagedir: PhysAddr) -> Self {
        Self { regs, mem, pagedir }
    }

    pub fn pagedir(&self) -> PhysAddr {
        self.pagedir
    }

    pub fn jump(&mut self, eip: u32) {
        self.regs.eip = eip;
    }

    pub fn load_u8(&self, va: u32) -> Result<u8, PageFault> {
        let pa = translate(self.mem, self.pagedir, VirtAddr(va), Access::Read, Privilege::User)?;
        Ok(self.mem.read_u8(pa))
    }

    pub fn store_u8(&mut self, va: u32, value: u8) -> Result<(), PageFault> {
        let pa = translate(self.mem, self.pagedir, VirtAddr(va), Access::Write, Privilege::User)?;
        self.mem.write_u8(pa, value);
        Ok(())
    }

    /// Little-endian word load; may straddle a page boundary.
    pub fn load_u32(&self, va: u32) -> Result<u32, PageFault> {
        let mut raw = [0u8; 4];
        for (i, byte) in raw.iter_mut().enumerate() {
            *byte = self.load_u8(va.wrapping_add(i as u32))?;
        }
        Ok(u32::from_le_bytes(raw))
    }

    /// Little-endian word store. Every byte is checked before any is written.
    pub fn store_u32(&mut self, va: u32, value: u32) -> Result<(), PageFault> {
        let mut targets = [PhysAddr(0); 4];
        for (i, target) in targets.iter_mut().enumerate() {
            *target = translate(
                self.mem,
                self.pagedir,
                VirtAddr(va.wrapping_add(i as u32)),
                Access::Write,
                Privilege::User,
            )?;
        }
        for (pa, byte) in targets.into_iter().zip(value.to_le_bytes()) {
            self.mem.write_u8(pa, byte);
        }
        Ok(())
    }
}
