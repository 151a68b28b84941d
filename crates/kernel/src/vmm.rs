//! Two-level x86 page directories.
//!
//! Directories and tables are ordinary physical frames holding 1024
//! little-endian entries each. Directory entries always carry `P|W|U`; the
//! leaf entry alone decides what a mapping allows. Only this module builds or
//! decodes raw entry bits; everyone else sees `PageEntry`.
//!
//! A "user page" of a process directory is a present, user-accessible leaf
//! entry whose frame is owned by a process. Each such entry is one counted
//! reference on its frame. Kernel-only mirrors and placeholders are not.

use core::fmt;

use log::debug;
use types::layout::{MEMSIZE_VIRTUAL, PAGE_SIZE, PAGETABLE_NENTRIES, PROC_START_ADDR, round_down, round_up};
use types::pte::{PTE_ADDR_MASK, PTE_FLAGS_MASK};
use types::{Pid, PhysAddr, PteFlags, VirtAddr};
use vm::mmu::{Access, Privilege, translate};
use vm::PhysicalMemory;

use crate::error::KernelError;
use crate::pageinfo::{PageInfoTable, PageOwner};

/// Opaque page-table entry.
#[derive(Clone, Copy, PartialEq, Eq, Default)]
pub struct PageEntry(u32);

impl PageEntry {
    /// Returned by `lookup` for addresses with no entry at all.
    pub const EMPTY: PageEntry = PageEntry(0);

    pub(crate) fn new(frame: PhysAddr, flags: PteFlags) -> Self {
        PageEntry((frame.as_u32() & PTE_ADDR_MASK) | flags.bits())
    }

    pub fn raw(self) -> u32 {
        self.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn flags(self) -> PteFlags {
        PteFlags::from_bits_truncate(self.0 & PTE_FLAGS_MASK)
    }

    pub fn frame(self) -> PhysAddr {
        PhysAddr(self.0 & PTE_ADDR_MASK)
    }

    pub fn is_present(self) -> bool {
        self.flags().contains(PteFlags::P)
    }

    pub fn is_writable(self) -> bool {
        self.flags().contains(PteFlags::W)
    }

    pub fn is_user(self) -> bool {
        self.flags().contains(PteFlags::U)
    }
}

impl fmt::Debug for PageEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PageEntry({} {:?})", self.frame(), self.flags())
    }
}

/// Present page tables of `pagedir`, as `(directory index, table frame)`.
pub(crate) fn page_tables(mem: &PhysicalMemory, pagedir: PhysAddr) -> Vec<(usize, PhysAddr)> {
    (0..PAGETABLE_NENTRIES)
        .filter_map(|pdx| {
            let entry = PageEntry(mem.read_u32(pagedir.wrapping_add(pdx as u32 * 4)));
            entry.is_present().then(|| (pdx, entry.frame()))
        })
        .collect()
}

/// Every non-empty leaf entry reachable from `pagedir`, with its address.
pub(crate) fn leaf_entries(mem: &PhysicalMemory, pagedir: PhysAddr) -> Vec<(VirtAddr, PageEntry)> {
    let mut leaves = Vec::new();
    for (pdx, table) in page_tables(mem, pagedir) {
        for ptx in 0..PAGETABLE_NENTRIES {
            let entry = PageEntry(mem.read_u32(table.wrapping_add(ptx as u32 * 4)));
            if !entry.is_empty() {
                let va = VirtAddr(((pdx << 22) | (ptx << 12)) as u32);
                leaves.push((va, entry));
            }
        }
    }
    leaves
}

/// Raw entry for `va` in `pagedir`, or `PageEntry::EMPTY`.
pub fn lookup(mem: &PhysicalMemory, pagedir: PhysAddr, va: VirtAddr) -> PageEntry {
    slot(mem, pagedir, va).map_or(PageEntry::EMPTY, |slot| PageEntry(mem.read_u32(slot)))
}

/// Address of the table slot for `va`, if its page table exists.
fn slot(mem: &PhysicalMemory, pagedir: PhysAddr, va: VirtAddr) -> Option<PhysAddr> {
    let pde = PageEntry(mem.read_u32(pagedir.wrapping_add(va.pdx() as u32 * 4)));
    pde.is_present()
        .then(|| pde.frame().wrapping_add(va.ptx() as u32 * 4))
}

/// Whether `pagedir` maps `frame` as a user page anywhere.
pub(crate) fn maps_frame(mem: &PhysicalMemory, pagedir: PhysAddr, frame: PhysAddr) -> bool {
    leaf_entries(mem, pagedir)
        .into_iter()
        .any(|(_, entry)| entry.is_present() && entry.is_user() && entry.frame() == frame)
}

/// Directory manipulation over physical memory and the page-info table.
#[derive(Debug)]
pub struct PageMapper<'a> {
    pub(crate) mem: &'a mut PhysicalMemory,
    pub(crate) pages: &'a mut PageInfoTable,
}

impl<'a> PageMapper<'a> {
    pub fn new(mem: &'a mut PhysicalMemory, pages: &'a mut PageInfoTable) -> Self {
        Self { mem, pages }
    }

    /// Install `size / PAGE_SIZE` consecutive entries `va -> pa` with `perm`.
    ///
    /// A missing page table is allocated for the directory's owner. `perm`
    /// without `P` installs a placeholder. Misaligned arguments are a bug in
    /// the caller and panic.
    pub fn map(
        &mut self,
        pagedir: PhysAddr,
        va: VirtAddr,
        pa: PhysAddr,
        size: usize,
        perm: PteFlags,
    ) -> Result<(), KernelError> {
        assert!(va.is_page_aligned(), "map: {va:?} is not page aligned");
        assert!(pa.is_page_aligned(), "map: {pa:?} is not page aligned");
        assert!(size % PAGE_SIZE == 0, "map: size {size:#x} is not a multiple of the page size");

        for offset in (0..size).step_by(PAGE_SIZE) {
            let va = va.wrapping_add(offset as u32);
            let slot = self.slot_or_create(pagedir, va)?;
            let frame = pa.wrapping_add(offset as u32);
            self.mem.write_u32(slot, PageEntry::new(frame, perm).raw());
        }
        Ok(())
    }

    /// Raw entry for `va`, or `PageEntry::EMPTY` when nothing is installed.
    pub fn lookup(&self, pagedir: PhysAddr, va: VirtAddr) -> PageEntry {
        lookup(self.mem, pagedir, va)
    }

    /// Whether `entry` is a counted reference on a process-owned frame.
    pub fn is_user_page(&self, entry: PageEntry) -> bool {
        entry.is_present() && entry.is_user() && self.pages.is_process_owned(entry.frame())
    }

    /// Build a directory for process `owner` from `pagedir`.
    ///
    /// Kernel mappings below `PROC_START_ADDR` are mirrored with the same
    /// frame and permission. Every other entry of `pagedir` becomes a
    /// placeholder (`W|U`, not present, frame 0), so the new directory
    /// references no process frame yet. On failure nothing stays allocated.
    pub fn copy(&mut self, pagedir: PhysAddr, owner: Pid) -> Result<PhysAddr, KernelError> {
        let new_dir = self.pages.allocate_any(PageOwner::Process(owner))?;
        let table = match self.pages.allocate_any(PageOwner::Process(owner)) {
            Ok(table) => table,
            Err(err) => {
                self.pages.release(new_dir.page_number());
                return Err(err);
            }
        };
        self.mem.zero_page(new_dir);
        self.mem.zero_page(table);
        self.mem
            .write_u32(new_dir, PageEntry::new(table, PteFlags::USER_RW).raw());

        // The single table covers the whole process address space.
        for va in (0..MEMSIZE_VIRTUAL as u32).step_by(PAGE_SIZE) {
            let va = VirtAddr(va);
            let entry = self.lookup(pagedir, va);
            if entry.is_empty() {
                continue;
            }
            let kernel_mapping = va.as_u32() < PROC_START_ADDR
                && entry.is_present()
                && !self.pages.is_process_owned(entry.frame());
            if kernel_mapping {
                self.map(new_dir, va, entry.frame(), PAGE_SIZE, entry.flags())?;
            } else {
                self.map(new_dir, va, PhysAddr(0), PAGE_SIZE, PteFlags::W | PteFlags::U)?;
            }
        }
        debug!("copy: {pagedir} -> {new_dir} for process {owner}");
        Ok(new_dir)
    }

    /// Map a fresh zeroed frame at `va` for `owner`. Whatever was mapped
    /// there before is overwritten, not released.
    pub fn page_alloc_virtual(
        &mut self,
        pagedir: PhysAddr,
        va: VirtAddr,
        owner: Pid,
    ) -> Result<PhysAddr, KernelError> {
        if !va.is_page_aligned() {
            return Err(KernelError::Misaligned(va.as_u32()));
        }
        let frame = self.pages.allocate_any(PageOwner::Process(owner))?;
        self.mem.zero_page(frame);
        if let Err(err) = self.map(pagedir, va, frame, PAGE_SIZE, PteFlags::USER_RW) {
            self.pages.release(frame.page_number());
            return Err(err);
        }
        Ok(frame)
    }

    /// Drop every reference held by the process directory `pagedir`: its
    /// user pages, its page tables and the directory itself.
    ///
    /// Returns frames that are still referenced elsewhere but remain owned by
    /// `owner`; the caller must hand them to a live process.
    pub fn release_address_space(&mut self, pagedir: PhysAddr, owner: Pid) -> Vec<PhysAddr> {
        let mut orphans = Vec::new();
        for (_, entry) in leaf_entries(self.mem, pagedir) {
            if !self.is_user_page(entry) {
                continue;
            }
            let pn = entry.frame().page_number();
            let remaining = self.pages.release(pn);
            if remaining > 0 && self.pages.info(pn).owner == PageOwner::Process(owner) {
                orphans.push(entry.frame());
            }
        }
        for (_, table) in page_tables(self.mem, pagedir) {
            self.pages.release(table.page_number());
        }
        self.pages.release(pagedir.page_number());
        debug!("release_address_space: {pagedir} of process {owner}, {} orphans", orphans.len());
        orphans
    }

    fn slot_or_create(&mut self, pagedir: PhysAddr, va: VirtAddr) -> Result<PhysAddr, KernelError> {
        if let Some(slot) = slot(self.mem, pagedir, va) {
            return Ok(slot);
        }
        let owner = self.pages.info(pagedir.page_number()).owner;
        let table = self.pages.allocate_any(owner)?;
        self.mem.zero_page(table);
        self.mem.write_u32(
            pagedir.wrapping_add(va.pdx() as u32 * 4),
            PageEntry::new(table, PteFlags::USER_RW).raw(),
        );
        debug!("map: new page table {table} in {pagedir} for {va}");
        Ok(table.wrapping_add(va.ptx() as u32 * 4))
    }
}

/// A process address space under construction, handed to program loaders.
#[derive(Debug)]
pub struct AddressSpace<'a> {
    mapper: PageMapper<'a>,
    pagedir: PhysAddr,
    owner: Pid,
}

impl<'a> AddressSpace<'a> {
    pub(crate) fn new(mapper: PageMapper<'a>, pagedir: PhysAddr, owner: Pid) -> Self {
        Self {
            mapper,
            pagedir,
            owner,
        }
    }

    pub fn owner(&self) -> Pid {
        self.owner
    }

    pub fn pagedir(&self) -> PhysAddr {
        self.pagedir
    }

    pub fn lookup(&self, va: VirtAddr) -> PageEntry {
        self.mapper.lookup(self.pagedir, va)
    }

    /// Claim the physical page at the same address as `va` and map it
    /// user-writable. Program images are identity mapped.
    pub fn page_alloc(&mut self, va: VirtAddr) -> Result<(), KernelError> {
        let frame = PhysAddr(va.as_u32());
        self.mapper
            .pages
            .allocate_fixed(frame, PageOwner::Process(self.owner))?;
        self.mapper.mem.zero_page(frame);
        if let Err(err) = self
            .mapper
            .map(self.pagedir, va, frame, PAGE_SIZE, PteFlags::USER_RW)
        {
            self.mapper.pages.release(frame.page_number());
            return Err(err);
        }
        Ok(())
    }

    /// Copy `data` to `va` through this address space.
    pub fn write(&mut self, va: VirtAddr, data: &[u8]) -> Result<(), KernelError> {
        let mut written = 0usize;
        while written < data.len() {
            let cursor = va.wrapping_add(written as u32);
            let pa = translate(self.mapper.mem, self.pagedir, cursor, Access::Write, Privilege::Kernel)
                .map_err(|fault| KernelError::Unmapped(fault.addr))?;
            let chunk = (PAGE_SIZE - cursor.offset() as usize).min(data.len() - written);
            self.mapper.mem.write_bytes(pa, &data[written..written + chunk]);
            written += chunk;
        }
        Ok(())
    }

    pub fn zero(&mut self, va: VirtAddr, len: usize) -> Result<(), KernelError> {
        let mut cleared = 0usize;
        while cleared < len {
            let cursor = va.wrapping_add(cleared as u32);
            let pa = translate(self.mapper.mem, self.pagedir, cursor, Access::Write, Privilege::Kernel)
                .map_err(|fault| KernelError::Unmapped(fault.addr))?;
            let chunk = (PAGE_SIZE - cursor.offset() as usize).min(len - cleared);
            self.mapper.mem.fill(pa, chunk, 0);
            cleared += chunk;
        }
        Ok(())
    }

    /// Remap every present page overlapping `[va, va + len)` as user read-only.
    pub fn protect_read_only(&mut self, va: VirtAddr, len: usize) -> Result<(), KernelError> {
        let start = round_down(va.as_u32());
        let end = round_up(va.as_u32().wrapping_add(len as u32));
        for page in (start..end).step_by(PAGE_SIZE) {
            let page = VirtAddr(page);
            let entry = self.lookup(page);
            if !entry.is_present() {
                return Err(KernelError::Unmapped(page));
            }
            self.mapper
                .map(self.pagedir, page, entry.frame(), PAGE_SIZE, PteFlags::USER_RO)?;
        }
        Ok(())
    }
}
