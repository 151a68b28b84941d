//! A small paging kernel: physical page ownership, per-process page
//! directories, eager fork, round-robin scheduling and a trap dispatcher,
//! running on the simulated hardware in `vm`.
//!
//! All kernel state lives in one `Kernel` value. The machine drives it by
//! resuming the process named in a `Resume` and reporting the next trap to
//! `Kernel::interrupt`.

pub mod check;
pub mod config;
pub mod devices;
pub mod error;
pub mod fork;
pub mod memshow;
pub mod pageinfo;
pub mod process;
pub mod run;
pub mod scheduler;
pub mod setup;
pub mod syscall;
pub mod trap;
pub mod vmm;

pub use check::InvariantViolation;
pub use config::{Config, KernelConfig};
pub use devices::{Devices, Hotkey, NoDevices};
pub use error::{Halt, KernelError, KernelPanic};
pub use pageinfo::{PageInfo, PageInfoTable, PageOwner};
pub use process::{ProcState, Process, ProcessTable};
pub use run::Resume;
pub use setup::ProgramLoader;
pub use vmm::{AddressSpace, PageEntry, PageMapper};

use log::info;
use types::layout::{CONSOLE_ADDR, MEMSIZE_PHYSICAL, PAGE_SIZE, PROC_START_ADDR};
use types::{BootInfo, Pid, PhysAddr, PteFlags, VirtAddr};
use vm::{Cpu, PhysicalMemory};

#[derive(Debug)]
pub struct Kernel {
    pub(crate) mem: PhysicalMemory,
    pub(crate) cpu: Cpu,
    pub(crate) pages: PageInfoTable,
    pub(crate) procs: ProcessTable,
    pub(crate) kernel_pagedir: PhysAddr,
    pub(crate) current: Pid,
    pub(crate) ticks: u64,
    pub(crate) config: KernelConfig,
}

impl Kernel {
    /// Bring the kernel up on fresh hardware: classify physical pages and
    /// build the kernel directory at `boot.kernel_pagedir`.
    ///
    /// The kernel directory identity-maps physical memory. Below
    /// `PROC_START_ADDR` mappings are kernel-only except the console page;
    /// above it they are user-accessible.
    pub fn new(boot: BootInfo, config: KernelConfig) -> Result<Self, KernelError> {
        let kernel_pagedir = PhysAddr(boot.kernel_pagedir);
        if !kernel_pagedir.is_page_aligned() {
            return Err(KernelError::Misaligned(boot.kernel_pagedir));
        }
        if !(boot.kernel_start..boot.kernel_end).contains(&boot.kernel_pagedir) {
            return Err(KernelError::OutOfRange(boot.kernel_pagedir));
        }

        let mut mem = PhysicalMemory::new(MEMSIZE_PHYSICAL);
        let mut pages = PageInfoTable::init(&boot);
        mem.zero_page(kernel_pagedir);

        let mut mapper = PageMapper::new(&mut mem, &mut pages);
        for addr in (0..MEMSIZE_PHYSICAL as u32).step_by(PAGE_SIZE) {
            let perm = if addr >= PROC_START_ADDR || addr == CONSOLE_ADDR {
                PteFlags::USER_RW
            } else {
                PteFlags::KERNEL_RW
            };
            mapper.map(kernel_pagedir, VirtAddr(addr), PhysAddr(addr), PAGE_SIZE, perm)?;
        }
        info!(
            "kernel: directory at {kernel_pagedir}, {} of {} pages free",
            pages.free_count(),
            pages.len()
        );

        Ok(Self {
            mem,
            cpu: Cpu::new(kernel_pagedir),
            pages,
            procs: ProcessTable::new(),
            kernel_pagedir,
            current: 0,
            ticks: 0,
            config,
        })
    }

    pub(crate) fn mapper(&mut self) -> PageMapper<'_> {
        PageMapper::new(&mut self.mem, &mut self.pages)
    }

    pub fn memory(&self) -> &PhysicalMemory {
        &self.mem
    }

    /// Physical memory as the machine sees it while a process runs.
    pub fn memory_mut(&mut self) -> &mut PhysicalMemory {
        &mut self.mem
    }

    pub fn cpu(&self) -> &Cpu {
        &self.cpu
    }

    pub fn cpu_mut(&mut self) -> &mut Cpu {
        &mut self.cpu
    }

    pub fn pages(&self) -> &PageInfoTable {
        &self.pages
    }

    pub fn processes(&self) -> &ProcessTable {
        &self.procs
    }

    pub fn process(&self, pid: Pid) -> &Process {
        self.procs.get(pid)
    }

    pub fn kernel_pagedir(&self) -> PhysAddr {
        self.kernel_pagedir
    }

    pub fn current(&self) -> Pid {
        self.current
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn config(&self) -> &KernelConfig {
        &self.config
    }

    /// Raw entry for `va` in the directory at `pagedir`.
    pub fn lookup(&self, pagedir: PhysAddr, va: VirtAddr) -> PageEntry {
        vmm::lookup(&self.mem, pagedir, va)
    }

    pub fn check_invariants(&self) -> Result<(), InvariantViolation> {
        check::check_virtual_memory(self)
    }
}
