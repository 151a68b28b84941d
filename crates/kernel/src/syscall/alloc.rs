use log::{error, warn};
use types::layout::{CONSOLE_ADDR, PROC_START_ADDR};
use types::{Pid, VirtAddr};

use crate::config::Config;
use crate::error::{KernelError, KernelPanic};
use crate::Kernel;

/// SYS_PAGE_ALLOC: map a fresh zeroed page at the address in `eax`.
///
/// Addresses below user space, other than the console page, are fatal.
/// Misalignment and memory exhaustion answer `-1`; success answers `0`.
pub(crate) fn sys_page_alloc(kernel: &mut Kernel, pid: Pid) -> Result<(), KernelPanic> {
    let addr = kernel.procs.get(pid).regs.eax;
    if addr < PROC_START_ADDR && addr != CONSOLE_ADDR {
        error!("sys_page_alloc: process {pid} asked for {addr:#x}");
        return Err(KernelPanic::PrivilegedAllocation { pid, addr });
    }
    let result = match kernel.page_alloc(pid, VirtAddr(addr)) {
        Ok(()) => 0,
        Err(err) => {
            warn!("sys_page_alloc: process {pid} at {addr:#x}: {err}");
            Config::SYSCALL_FAILED
        }
    };
    kernel.procs.get_mut(pid).regs.eax = result;
    Ok(())
}

impl Kernel {
    /// Back `va` in `pid`'s address space with a new page, replacing any
    /// user page mapped there.
    pub fn page_alloc(&mut self, pid: Pid, va: VirtAddr) -> Result<(), KernelError> {
        let pagedir = self.procs.get(pid).pagedir;
        let mut mapper = self.mapper();
        let previous = mapper.lookup(pagedir, va);
        let replaced = mapper.is_user_page(previous);
        mapper.page_alloc_virtual(pagedir, va, pid)?;
        if replaced {
            self.drop_user_page(pid, previous.frame());
        }
        Ok(())
    }
}
