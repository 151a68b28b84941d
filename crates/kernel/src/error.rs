use thiserror::Error;
use types::{BootCommand, Pid, VirtAddr};

use crate::check::InvariantViolation;

/// Recoverable failures. At the system-call boundary these become `-1`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KernelError {
    #[error("out of physical memory")]
    OutOfMemory,
    #[error("no free process slot")]
    NoFreeProcessSlot,
    #[error("address {0:#x} is not page aligned")]
    Misaligned(u32),
    #[error("address {0:#x} is out of range")]
    OutOfRange(u32),
    #[error("physical page {0:#x} is already owned")]
    AlreadyOwned(u32),
    #[error("virtual address {0} is not mapped")]
    Unmapped(VirtAddr),
    #[error("cannot load program {program}: {reason}")]
    Load { program: usize, reason: String },
}

/// Fatal conditions. The machine stops after reporting one of these.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KernelPanic {
    #[error("kernel page fault for {addr} ({operation} {problem}, eip={eip:#x})")]
    KernelFault {
        addr: VirtAddr,
        operation: &'static str,
        problem: &'static str,
        eip: u32,
    },
    #[error("unexpected interrupt {0}")]
    UnexpectedInterrupt(u32),
    #[error("process {pid} asked for a page at privileged address {addr:#x}")]
    PrivilegedAllocation { pid: Pid, addr: u32 },
    #[error("process {pid} panicked: {message}")]
    UserPanic { pid: Pid, message: String },
    #[error("invariant violated: {0}")]
    Invariant(#[from] InvariantViolation),
}

/// Why the kernel gave up control of the machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Halt {
    Panic(KernelPanic),
    PowerOff,
    Reboot(BootCommand),
}

impl From<KernelPanic> for Halt {
    fn from(panic: KernelPanic) -> Self {
        Halt::Panic(panic)
    }
}
