//! System-call bodies invoked by the interrupt dispatcher. Each one reads its
//! argument from the caller's saved `eax` and writes its result back there.
use log::warn;
use types::Pid;

use crate::config::Config;
use crate::Kernel;

pub mod alloc;
pub mod panic;

pub(crate) use alloc::sys_page_alloc;
pub(crate) use panic::sys_panic;

pub(crate) fn sys_getpid(kernel: &mut Kernel, pid: Pid) {
    kernel.procs.get_mut(pid).regs.eax = pid as u32;
}

/// Fork the caller. Failure is reported to the parent as `-1`.
pub(crate) fn sys_fork(kernel: &mut Kernel, pid: Pid) {
    if let Err(err) = kernel.fork(pid) {
        warn!("sys_fork: process {pid}: {err}");
        kernel.procs.get_mut(pid).regs.eax = Config::SYSCALL_FAILED;
    }
}
