use log::error;
use types::{Pid, PhysAddr, VirtAddr};
use vm::mmu::{Access, Privilege, translate};
use vm::PhysicalMemory;

use crate::config::Config;
use crate::error::KernelPanic;
use crate::Kernel;

/// SYS_PANIC: the caller passes a NUL-terminated message in `eax`. Always fatal.
pub(crate) fn sys_panic(kernel: &Kernel, pid: Pid) -> KernelPanic {
    let process = kernel.procs.get(pid);
    let message = read_user_string(
        &kernel.mem,
        process.pagedir,
        VirtAddr(process.regs.eax),
        Config::PANIC_MESSAGE_MAX,
    );
    error!("process {pid} panicked: {message}");
    KernelPanic::UserPanic { pid, message }
}

/// Read at most `max` bytes up to a NUL through the user's view of memory.
/// Stops early at the first unreadable byte.
fn read_user_string(mem: &PhysicalMemory, pagedir: PhysAddr, va: VirtAddr, max: usize) -> String {
    let mut bytes = Vec::new();
    for i in 0..max {
        let Ok(pa) = translate(mem, pagedir, va.wrapping_add(i as u32), Access::Read, Privilege::User) else {
            break;
        };
        match mem.read_u8(pa) {
            0 => break,
            byte => bytes.push(byte),
        }
    }
    String::from_utf8_lossy(&bytes).into_owned()
}
