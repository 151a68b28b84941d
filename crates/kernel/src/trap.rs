use log::{error, warn};
use types::{FaultCode, Interrupt, Pid, Registers};

use crate::check::check_virtual_memory;
use crate::devices::Devices;
use crate::error::{Halt, KernelPanic};
use crate::run::Resume;
use crate::syscall;
use crate::Kernel;

impl Kernel {
    /// Kernel entry for every trap taken while a process ran.
    ///
    /// `regs` is the interrupted process's state, stamped with the trap
    /// number and error code. Every path ends by resuming a process or by
    /// halting the machine.
    pub fn interrupt(&mut self, regs: &Registers, devices: &mut dyn Devices) -> Result<Resume, Halt> {
        let pid = self.current;
        self.procs.get_mut(pid).regs = *regs;
        self.cpu.lcr3(self.kernel_pagedir);

        if self.config.check_invariants {
            check_virtual_memory(self).map_err(|violation| {
                error!("{violation}");
                KernelPanic::from(violation)
            })?;
        }
        devices.refresh(self);
        self.poll_keyboard(devices)?;

        let Some(interrupt) = Interrupt::from_number(regs.intno) else {
            error!("unexpected interrupt {} from process {pid}", regs.intno);
            return Err(KernelPanic::UnexpectedInterrupt(regs.intno).into());
        };
        match interrupt {
            Interrupt::Panic => Err(syscall::sys_panic(self, pid).into()),
            Interrupt::GetPid => {
                syscall::sys_getpid(self, pid);
                Ok(self.run(pid))
            }
            Interrupt::Yield => self.schedule(devices),
            Interrupt::PageAlloc => {
                syscall::sys_page_alloc(self, pid)?;
                Ok(self.run(pid))
            }
            Interrupt::Fork => {
                syscall::sys_fork(self, pid);
                self.schedule(devices)
            }
            Interrupt::Exit => {
                self.exit(pid);
                self.schedule(devices)
            }
            Interrupt::Timer => {
                self.ticks += 1;
                self.schedule(devices)
            }
            Interrupt::PageFault => {
                self.page_fault(pid, regs, devices)?;
                self.schedule(devices)
            }
        }
    }

    fn page_fault(&mut self, pid: Pid, regs: &Registers, devices: &mut dyn Devices) -> Result<(), KernelPanic> {
        let addr = self.cpu.rcr2();
        let code = FaultCode::from_bits_truncate(regs.err);
        let operation = if code.contains(FaultCode::WRITE) { "write" } else { "read" };
        let problem = if code.contains(FaultCode::PRESENT) {
            "protection problem"
        } else {
            "missing page"
        };

        if !code.contains(FaultCode::USER) {
            error!("kernel page fault for {addr} ({operation} {problem}, eip={:#x})", regs.eip);
            return Err(KernelPanic::KernelFault {
                addr,
                operation,
                problem,
                eip: regs.eip,
            });
        }

        let message = format!(
            "Process {pid} page fault for {addr} ({operation} {problem}, eip={:#x})!",
            regs.eip
        );
        warn!("{message}");
        devices.console_print(&message);
        self.procs.set_broken(pid);
        Ok(())
    }
}
