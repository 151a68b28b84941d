//! Eager fork: writable pages are copied, read-only pages are shared.

use log::{debug, warn};
use types::layout::PAGE_SIZE;
use types::{Pid, PhysAddr, PteFlags};

use crate::error::KernelError;
use crate::pageinfo::PageOwner;
use crate::vmm::{self, PageMapper};
use crate::Kernel;

impl Kernel {
    /// Duplicate `parent` into the lowest free slot.
    ///
    /// On success the child is RUNNABLE with the parent's registers and
    /// `eax = 0`, and the parent's `eax` holds the child's pid. On failure
    /// nothing is left allocated and neither process is touched.
    pub fn fork(&mut self, parent: Pid) -> Result<Pid, KernelError> {
        let child = self.procs.find_free_slot().ok_or(KernelError::NoFreeProcessSlot)?;
        let parent_dir = self.procs.get(parent).pagedir;

        let mut mapper = PageMapper::new(&mut self.mem, &mut self.pages);
        let child_dir = mapper.copy(parent_dir, child)?;
        if let Err(err) = duplicate_user_pages(&mut mapper, parent_dir, child_dir, child) {
            warn!("fork: process {parent} -> {child} rolled back: {err}");
            self.release_process_memory(child, child_dir);
            return Err(err);
        }

        let mut regs = self.procs.get(parent).regs;
        regs.eax = 0;
        let slot = self.procs.get_mut(child);
        slot.regs = regs;
        slot.pagedir = child_dir;
        self.procs.set_runnable(child);
        self.procs.get_mut(parent).regs.eax = child as u32;
        debug!("fork: process {parent} -> {child}, {} pages free", self.pages.free_count());
        Ok(child)
    }
}

fn duplicate_user_pages(
    mapper: &mut PageMapper<'_>,
    parent_dir: PhysAddr,
    child_dir: PhysAddr,
    child: Pid,
) -> Result<(), KernelError> {
    // Every present leaf, including tables above the process region.
    for (va, entry) in vmm::leaf_entries(mapper.mem, parent_dir) {
        if !mapper.is_user_page(entry) {
            continue;
        }
        if entry.is_writable() {
            let frame = mapper.pages.allocate_any(PageOwner::Process(child))?;
            mapper.mem.copy_page(frame, entry.frame());
            if let Err(err) = mapper.map(child_dir, va, frame, PAGE_SIZE, PteFlags::USER_RW) {
                mapper.pages.release(frame.page_number());
                return Err(err);
            }
        } else {
            mapper.map(child_dir, va, entry.frame(), PAGE_SIZE, PteFlags::USER_RO)?;
            mapper.pages.share(entry.frame().page_number());
        }
    }
    Ok(())
}
