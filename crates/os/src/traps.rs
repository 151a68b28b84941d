use types::regs::vector::INT_PAGEFAULT;
use types::{Interrupt, Registers};
use vm::PageFault;

/// How a user step ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trap {
    /// `int` instruction for a system call, or a timer tick.
    Interrupt(Interrupt),
    PageFault(PageFault),
}

impl Trap {
    /// Stamp `regs` the way the CPU would on entry to the kernel.
    pub fn frame(self, regs: Registers) -> Registers {
        match self {
            Trap::Interrupt(interrupt) => regs.with_trap(interrupt.number(), 0),
            Trap::PageFault(fault) => regs.with_trap(INT_PAGEFAULT, fault.code.bits()),
        }
    }
}

impl From<PageFault> for Trap {
    fn from(fault: PageFault) -> Self {
        Trap::PageFault(fault)
    }
}

impl From<Interrupt> for Trap {
    fn from(interrupt: Interrupt) -> Self {
        Trap::Interrupt(interrupt)
    }
}
