#![no_std]

pub mod address;
pub use address::{PhysAddr, VirtAddr};

pub mod layout;

pub mod pte;
pub use pte::{FaultCode, PteFlags};

pub mod regs;
pub use regs::{Interrupt, Registers};

pub mod boot;
pub use boot::{BootCommand, BootInfo};

/// Process identifier; doubles as the index into the process table.
pub type Pid = usize;
