//! Physical page ownership and reference counts.
//!
//! Every physical page has exactly one `PageInfo`. A page is free iff its
//! refcount is zero; free pages always carry `PageOwner::Free`. Reserved and
//! kernel pages are classified once at boot and never released.

use log::trace;
use types::layout::{KERNEL_STACK_TOP, NPAGES, PAGE_SIZE, page_address};
use types::{BootInfo, Pid, PhysAddr};
use vm::memory::is_reserved;

use crate::error::KernelError;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PageOwner {
    #[default]
    Free,
    Reserved,
    Kernel,
    Process(Pid),
}

impl PageOwner {
    pub fn pid(self) -> Option<Pid> {
        match self {
            PageOwner::Process(pid) => Some(pid),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PageInfo {
    pub owner: PageOwner,
    pub refcount: u32,
}

impl PageInfo {
    pub fn is_free(&self) -> bool {
        self.refcount == 0
    }
}

#[derive(Debug, Clone)]
pub struct PageInfoTable {
    pages: Vec<PageInfo>,
}

impl PageInfoTable {
    /// Classify every physical page: hardware-reserved, kernel image and
    /// kernel stack, or free.
    pub fn init(boot: &BootInfo) -> Self {
        let pages = (0..NPAGES)
            .map(|pn| {
                let addr = page_address(pn);
                let owner = if is_reserved(PhysAddr(addr)) {
                    PageOwner::Reserved
                } else if (boot.kernel_start..boot.kernel_end).contains(&addr)
                    || addr == KERNEL_STACK_TOP - PAGE_SIZE as u32
                {
                    PageOwner::Kernel
                } else {
                    PageOwner::Free
                };
                let refcount = if owner == PageOwner::Free { 0 } else { 1 };
                PageInfo { owner, refcount }
            })
            .collect();
        Self { pages }
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn info(&self, pn: usize) -> PageInfo {
        self.pages[pn]
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, PageInfo)> + '_ {
        self.pages.iter().copied().enumerate()
    }

    pub fn free_count(&self) -> usize {
        self.pages.iter().filter(|info| info.is_free()).count()
    }

    /// A live page owned by some process.
    pub fn is_process_owned(&self, pa: PhysAddr) -> bool {
        self.pages
            .get(pa.page_number())
            .map_or(false, |info| info.refcount > 0 && info.owner.pid().is_some())
    }

    /// Claim the page at exactly `addr`. Fails without side effects.
    pub fn allocate_fixed(&mut self, addr: PhysAddr, owner: PageOwner) -> Result<(), KernelError> {
        assert_claimable(owner);
        if !addr.is_page_aligned() {
            return Err(KernelError::Misaligned(addr.as_u32()));
        }
        let pn = addr.page_number();
        let info = self
            .pages
            .get_mut(pn)
            .ok_or(KernelError::OutOfRange(addr.as_u32()))?;
        if !info.is_free() {
            return Err(KernelError::AlreadyOwned(addr.as_u32()));
        }
        *info = PageInfo { owner, refcount: 1 };
        trace!("allocate_fixed: {addr} -> {owner:?}");
        Ok(())
    }

    /// Claim the lowest-numbered free page.
    pub fn allocate_any(&mut self, owner: PageOwner) -> Result<PhysAddr, KernelError> {
        assert_claimable(owner);
        let pn = self
            .pages
            .iter()
            .position(PageInfo::is_free)
            .ok_or(KernelError::OutOfMemory)?;
        self.pages[pn] = PageInfo { owner, refcount: 1 };
        let addr = PhysAddr::from_page_number(pn);
        trace!("allocate_any: {addr} -> {owner:?}");
        Ok(addr)
    }

    /// One more mapping references a live page.
    pub fn share(&mut self, pn: usize) {
        let info = &mut self.pages[pn];
        assert!(info.refcount > 0, "share: page {pn:#x} is free");
        info.refcount += 1;
    }

    /// Drop one reference; the page becomes free at zero. Returns the
    /// remaining count.
    pub fn release(&mut self, pn: usize) -> u32 {
        let info = &mut self.pages[pn];
        assert!(info.refcount > 0, "release: page {pn:#x} is already free");
        info.refcount -= 1;
        if info.refcount == 0 {
            info.owner = PageOwner::Free;
        }
        info.refcount
    }

    pub fn set_owner(&mut self, pn: usize, owner: PageOwner) {
        let info = &mut self.pages[pn];
        assert!(info.refcount > 0, "set_owner: page {pn:#x} is free");
        assert_claimable(owner);
        info.owner = owner;
    }
}

fn assert_claimable(owner: PageOwner) {
    assert!(
        matches!(owner, PageOwner::Kernel | PageOwner::Process(_)),
        "pages can only be handed to the kernel or a process, not {owner:?}"
    );
}
