use log::trace;
use types::{Pid, PhysAddr, Registers};

use crate::process::ProcState;
use crate::Kernel;

/// Permission to continue a process in user mode.
///
/// Only the kernel creates these. The machine consumes one by running the
/// process from `registers()` under `pagedir()` until its next trap, which
/// it reports back through `Kernel::interrupt`.
#[must_use = "the process only runs when the machine consumes the Resume"]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resume {
    pid: Pid,
    regs: Registers,
    pagedir: PhysAddr,
}

impl Resume {
    pub fn pid(&self) -> Pid {
        self.pid
    }

    pub fn registers(&self) -> &Registers {
        &self.regs
    }

    pub fn pagedir(&self) -> PhysAddr {
        self.pagedir
    }

    pub fn into_registers(self) -> Registers {
        self.regs
    }
}

impl Kernel {
    /// Switch to `pid`: make it current, load its directory, hand back its
    /// saved registers.
    ///
    /// # Panics
    /// If `pid` is not RUNNABLE.
    pub fn run(&mut self, pid: Pid) -> Resume {
        let process = *self.procs.get(pid);
        assert_eq!(process.state, ProcState::Runnable, "run: process {pid} is not runnable");
        self.current = pid;
        self.cpu.lcr3(process.pagedir);
        trace!("run: process {pid} eip={:#x}", process.regs.eip);
        Resume {
            pid,
            regs: process.regs,
            pagedir: process.pagedir,
        }
    }
}
