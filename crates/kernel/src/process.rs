//! The process table and process teardown.

use log::{debug, error, info};
use types::layout::NPROC;
use types::{Pid, PhysAddr, Registers};

use crate::pageinfo::PageOwner;
use crate::vmm::{self, PageMapper};
use crate::Kernel;

/// Lifecycle state of a process slot.
///
/// FREE -> RUNNABLE on setup or fork; RUNNABLE -> BROKEN on a user fault;
/// RUNNABLE -> FREE on exit. BROKEN is terminal. Nothing enters BLOCKED yet.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ProcState {
    #[default]
    Free,
    Runnable,
    Blocked,
    Broken,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Process {
    pub pid: Pid,
    pub state: ProcState,
    pub regs: Registers,
    pub pagedir: PhysAddr,
}

impl Process {
    fn empty(pid: Pid) -> Self {
        Self {
            pid,
            state: ProcState::Free,
            regs: Registers::default(),
            pagedir: PhysAddr(0),
        }
    }

    pub fn is_live(&self) -> bool {
        self.state != ProcState::Free
    }
}

/// Fixed table of `NPROC` slots. Slot 0 is never handed out.
#[derive(Debug, Clone)]
pub struct ProcessTable {
    slots: [Process; NPROC],
}

impl Default for ProcessTable {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessTable {
    pub fn new() -> Self {
        Self {
            slots: core::array::from_fn(Process::empty),
        }
    }

    pub fn get(&self, pid: Pid) -> &Process {
        &self.slots[pid]
    }

    pub(crate) fn get_mut(&mut self, pid: Pid) -> &mut Process {
        &mut self.slots[pid]
    }

    pub fn iter(&self) -> impl Iterator<Item = &Process> {
        self.slots.iter()
    }

    /// Processes in any state but FREE.
    pub fn live(&self) -> impl Iterator<Item = &Process> {
        self.slots.iter().filter(|process| process.is_live())
    }

    pub fn find_free_slot(&self) -> Option<Pid> {
        (1..NPROC).find(|&pid| self.slots[pid].state == ProcState::Free)
    }

    pub(crate) fn set_runnable(&mut self, pid: Pid) {
        self.transition(pid, ProcState::Free, ProcState::Runnable);
    }

    pub(crate) fn set_broken(&mut self, pid: Pid) {
        self.transition(pid, ProcState::Runnable, ProcState::Broken);
    }

    pub(crate) fn set_free(&mut self, pid: Pid) {
        self.transition(pid, ProcState::Runnable, ProcState::Free);
    }

    fn transition(&mut self, pid: Pid, from: ProcState, to: ProcState) {
        assert!(pid != 0, "process slot 0 is reserved");
        let slot = &mut self.slots[pid];
        assert_eq!(
            slot.state, from,
            "process {pid}: illegal transition {:?} -> {to:?}",
            slot.state
        );
        slot.state = to;
    }
}

impl Kernel {
    /// Terminate `pid` and give back everything it references.
    pub fn exit(&mut self, pid: Pid) {
        let pagedir = self.procs.get(pid).pagedir;
        self.procs.set_free(pid);
        self.release_process_memory(pid, pagedir);
        info!("process {pid} exited, {} pages free", self.pages.free_count());
    }

    /// Drop the references held by `pid`'s directory and re-home frames it
    /// still owns but others map.
    pub(crate) fn release_process_memory(&mut self, pid: Pid, pagedir: PhysAddr) {
        if pagedir == self.kernel_pagedir {
            self.pages.release(pagedir.page_number());
            return;
        }
        let orphans = PageMapper::new(&mut self.mem, &mut self.pages).release_address_space(pagedir, pid);
        for frame in orphans {
            self.adopt(frame);
        }
    }

    /// Drop one user mapping of `frame` that `pid` no longer holds.
    pub(crate) fn drop_user_page(&mut self, pid: Pid, frame: PhysAddr) {
        let pn = frame.page_number();
        let remaining = self.pages.release(pn);
        if remaining > 0 && self.pages.info(pn).owner == PageOwner::Process(pid) {
            self.adopt(frame);
        }
    }

    /// Hand a still-shared frame to a live process that maps it.
    fn adopt(&mut self, frame: PhysAddr) {
        let heir = self
            .procs
            .live()
            .filter(|process| process.pagedir != self.kernel_pagedir)
            .find(|process| vmm::maps_frame(&self.mem, process.pagedir, frame))
            .map(|process| process.pid);
        match heir {
            Some(pid) => {
                debug!("adopt: {frame} now owned by process {pid}");
                self.pages.set_owner(frame.page_number(), PageOwner::Process(pid));
            }
            None => error!("adopt: shared frame {frame} has no live mapping"),
        }
    }
}
