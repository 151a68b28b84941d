//! Two-level x86 address translation.
//!
//! The walk reads the directory entry at `pdx(va)`, then the table entry at
//! `ptx(va)`. A user access needs `U` at both levels and a user write needs
//! `W` at both levels. Supervisor accesses ignore `U`/`W` (CR0.WP clear).
//! A denied access reports a fault whose code has `PRESENT` set; a missing
//! entry at either level reports `PRESENT` clear.

use thiserror::Error;
use types::pte::PTE_ADDR_MASK;
use types::{FaultCode, PhysAddr, PteFlags, VirtAddr};

use crate::memory::PhysicalMemory;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Access {
    Read,
    Write,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Privilege {
    User,
    Kernel,
}

/// A failed translation, as the CPU reports it through `cr2` and the error code.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
#[error("page fault at {addr} ({code:?})")]
pub struct PageFault {
    pub addr: VirtAddr,
    pub code: FaultCode,
}

impl PageFault {
    fn new(addr: VirtAddr, access: Access, privilege: Privilege, present: bool) -> Self {
        let mut code = FaultCode::empty();
        code.set(FaultCode::PRESENT, present);
        code.set(FaultCode::WRITE, access == Access::Write);
        code.set(FaultCode::USER, privilege == Privilege::User);
        Self { addr, code }
    }
}

/// Translate `va` through the directory at `pagedir`.
pub fn translate(
    mem: &PhysicalMemory,
    pagedir: PhysAddr,
    va: VirtAddr,
    access: Access,
    privilege: Privilege,
) -> Result<PhysAddr, PageFault> {
    let missing = || PageFault::new(va, access, privilege, false);
    let denied = || PageFault::new(va, access, privilege, true);

    let pde_addr = pagedir.wrapping_add((va.pdx() * 4) as u32);
    if !mem.contains(pde_addr, 4) {
        return Err(missing());
    }
    let pde = mem.read_u32(pde_addr);
    let pde_flags = PteFlags::from_bits_truncate(pde);
    if !pde_flags.contains(PteFlags::P) {
        return Err(missing());
    }

    let pte_addr = PhysAddr(pde & PTE_ADDR_MASK).wrapping_add((va.ptx() * 4) as u32);
    if !mem.contains(pte_addr, 4) {
        return Err(missing());
    }
    let pte = mem.read_u32(pte_addr);
    let pte_flags = PteFlags::from_bits_truncate(pte);
    if !pte_flags.contains(PteFlags::P) {
        return Err(missing());
    }

    if privilege == Privilege::User {
        let effective = pde_flags & pte_flags;
        if !effective.contains(PteFlags::U) {
            return Err(denied());
        }
        if access == Access::Write && !effective.contains(PteFlags::W) {
            return Err(denied());
        }
    }

    let pa = PhysAddr((pte & PTE_ADDR_MASK) | va.offset());
    if !mem.contains(pa, 1) {
        return Err(missing());
    }
    Ok(pa)
}
