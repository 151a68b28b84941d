#![allow(dead_code)]

use kernel::{Devices, Halt, Hotkey, Kernel, KernelConfig, KernelError, NoDevices, ProgramLoader, Resume};
use kernel::AddressSpace;
use types::layout::{PAGE_SIZE, PROC_SIZE, PROC_START_ADDR};
use types::{BootInfo, Pid, PhysAddr, Registers, VirtAddr};
use vm::mmu::{translate, Access, Privilege};
use vm::UserContext;

/// Program N: one read-only code page at `PROC_START_ADDR + N * PROC_SIZE`
/// followed by one writable data page.
pub struct TestLoader;

pub fn code_page(program: usize) -> u32 {
    PROC_START_ADDR + program as u32 * PROC_SIZE
}

pub fn data_page(program: usize) -> u32 {
    code_page(program) + PAGE_SIZE as u32
}

impl ProgramLoader for TestLoader {
    fn load(&mut self, space: &mut AddressSpace<'_>, program: usize) -> Result<u32, KernelError> {
        if program > 3 {
            return Err(KernelError::Load {
                program,
                reason: "no such test program".into(),
            });
        }
        let code = VirtAddr(code_page(program));
        space.page_alloc(code)?;
        space.write(code, b"test program\0")?;
        space.protect_read_only(code, PAGE_SIZE)?;
        space.page_alloc(VirtAddr(data_page(program)))?;
        Ok(code.as_u32())
    }
}

pub fn boot() -> Kernel {
    Kernel::new(BootInfo::default(), KernelConfig::default()).unwrap()
}

/// Boot with processes `1..=count` running test programs `0..count`.
pub fn boot_with(count: usize) -> Kernel {
    let mut kernel = boot();
    for pid in 1..=count {
        kernel.process_setup(pid, pid - 1, &mut TestLoader).unwrap();
    }
    kernel
}

pub fn trap(kernel: &mut Kernel, intno: u32) -> Result<Resume, Halt> {
    syscall_with(kernel, intno, None, &mut NoDevices)
}

pub fn syscall(kernel: &mut Kernel, intno: u32, eax: u32) -> Result<Resume, Halt> {
    syscall_with(kernel, intno, Some(eax), &mut NoDevices)
}

pub fn syscall_with(
    kernel: &mut Kernel,
    intno: u32,
    eax: Option<u32>,
    devices: &mut dyn Devices,
) -> Result<Resume, Halt> {
    let mut regs = kernel.process(kernel.current()).regs.with_trap(intno, 0);
    if let Some(eax) = eax {
        regs.eax = eax;
    }
    kernel.interrupt(&regs, devices)
}

/// Deliver a page fault at `addr` with error code `err` for the current process.
pub fn fault(kernel: &mut Kernel, addr: u32, err: u32, devices: &mut dyn Devices) -> Result<Resume, Halt> {
    kernel.cpu_mut().set_cr2(VirtAddr(addr));
    let regs = kernel
        .process(kernel.current())
        .regs
        .with_trap(types::regs::vector::INT_PAGEFAULT, err);
    kernel.interrupt(&regs, devices)
}

pub fn write_user(kernel: &mut Kernel, pid: Pid, va: u32, bytes: &[u8]) {
    let pagedir = kernel.process(pid).pagedir;
    let mut ctx = UserContext::new(Registers::default(), kernel.memory_mut(), pagedir);
    for (i, byte) in bytes.iter().enumerate() {
        ctx.store_u8(va + i as u32, *byte).unwrap();
    }
}

pub fn read_user(kernel: &Kernel, pid: Pid, va: u32, len: usize) -> Vec<u8> {
    let pagedir = kernel.process(pid).pagedir;
    (0..len)
        .map(|i| {
            let pa = translate(kernel.memory(), pagedir, VirtAddr(va + i as u32), Access::Read, Privilege::User)
                .unwrap();
            kernel.memory().read_u8(pa)
        })
        .collect()
}

pub fn frame_of(kernel: &Kernel, pid: Pid, va: u32) -> PhysAddr {
    kernel.lookup(kernel.process(pid).pagedir, VirtAddr(va)).frame()
}

/// Keyboard and console stand-in: records console lines, counts polls and
/// powers off after `limit` polls or delivers one scripted hotkey.
#[derive(Default)]
pub struct Recorder {
    pub lines: Vec<String>,
    pub polls: usize,
    pub limit: Option<usize>,
    pub hotkey: Option<Hotkey>,
}

impl Recorder {
    pub fn power_off_after(limit: usize) -> Self {
        Self {
            limit: Some(limit),
            ..Self::default()
        }
    }
}

impl Devices for Recorder {
    fn check_keyboard(&mut self) -> Option<Hotkey> {
        self.polls += 1;
        if let Some(hotkey) = self.hotkey.take() {
            return Some(hotkey);
        }
        match self.limit {
            Some(limit) if self.polls >= limit => Some(Hotkey::PowerOff),
            _ => None,
        }
    }

    fn console_print(&mut self, line: &str) {
        self.lines.push(line.to_string());
    }
}
