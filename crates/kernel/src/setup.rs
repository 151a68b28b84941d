use log::{info, warn};
use types::layout::{MEMSIZE_VIRTUAL, NPROC, PAGE_SIZE, PROC_SIZE};
use types::{Pid, PhysAddr, Registers, VirtAddr};

use crate::error::KernelError;
use crate::process::ProcState;
use crate::vmm::{AddressSpace, PageMapper};
use crate::Kernel;

/// Places a program image into a new address space.
pub trait ProgramLoader {
    /// Load `program` into `space` and return its entry point.
    fn load(&mut self, space: &mut AddressSpace<'_>, program: usize) -> Result<u32, KernelError>;
}

impl Kernel {
    /// Create process `pid` running `program`: fresh registers, a copy of the
    /// kernel directory, the program image and one stack page.
    ///
    /// On failure everything built so far is released and the slot stays FREE.
    pub fn process_setup(
        &mut self,
        pid: Pid,
        program: usize,
        loader: &mut dyn ProgramLoader,
    ) -> Result<(), KernelError> {
        assert!(pid != 0 && pid < NPROC, "process_setup: invalid pid {pid}");
        assert_eq!(
            self.procs.get(pid).state,
            ProcState::Free,
            "process_setup: slot {pid} is in use"
        );

        let pagedir = PageMapper::new(&mut self.mem, &mut self.pages).copy(self.kernel_pagedir, pid)?;
        match self.populate(pid, pagedir, program, loader) {
            Ok(regs) => {
                let process = self.procs.get_mut(pid);
                process.regs = regs;
                process.pagedir = pagedir;
                self.procs.set_runnable(pid);
                info!("process {pid}: program {program} loaded, entry {:#x}", regs.eip);
                Ok(())
            }
            Err(err) => {
                warn!("process {pid}: setup failed: {err}");
                self.release_process_memory(pid, pagedir);
                Err(err)
            }
        }
    }

    fn populate(
        &mut self,
        pid: Pid,
        pagedir: PhysAddr,
        program: usize,
        loader: &mut dyn ProgramLoader,
    ) -> Result<Registers, KernelError> {
        let mut regs = Registers::user();
        let mut space = AddressSpace::new(PageMapper::new(&mut self.mem, &mut self.pages), pagedir, pid);
        regs.eip = loader.load(&mut space, program)?;

        let stack_top = (MEMSIZE_VIRTUAL as u32)
            .checked_sub(PROC_SIZE * pid as u32)
            .filter(|top| *top >= PAGE_SIZE as u32)
            .ok_or(KernelError::OutOfRange(PROC_SIZE * pid as u32))?;
        regs.esp = stack_top;
        PageMapper::new(&mut self.mem, &mut self.pages).page_alloc_virtual(
            pagedir,
            VirtAddr(stack_top - PAGE_SIZE as u32),
            pid,
        )?;
        Ok(regs)
    }
}
