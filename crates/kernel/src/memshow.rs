//! Snapshots of physical and virtual memory for display.

use types::layout::{MEMSIZE_VIRTUAL, PAGE_SIZE};
use types::{Pid, VirtAddr};

use crate::pageinfo::{PageInfo, PageOwner};
use crate::Kernel;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MapCell {
    pub owner: PageOwner,
    /// More than one reference to the frame.
    pub shared: bool,
}

impl MapCell {
    fn from_info(info: PageInfo) -> Self {
        Self {
            owner: info.owner,
            shared: info.refcount > 1,
        }
    }

    /// `.` free, `R` reserved, `K` kernel, hex digit for a process.
    pub fn glyph(self) -> char {
        match self.owner {
            PageOwner::Free => '.',
            PageOwner::Reserved => 'R',
            PageOwner::Kernel => 'K',
            PageOwner::Process(pid) => char::from_digit(pid as u32 % 16, 16)
                .map_or('?', |digit| digit.to_ascii_uppercase()),
        }
    }
}

/// One cell per physical page.
pub fn physical_map(kernel: &Kernel) -> Vec<MapCell> {
    kernel.pages.iter().map(|(_, info)| MapCell::from_info(info)).collect()
}

/// One cell per virtual page of `pid`; `None` where the process has no
/// user-accessible mapping.
pub fn virtual_map(kernel: &Kernel, pid: Pid) -> Vec<Option<MapCell>> {
    let pagedir = kernel.procs.get(pid).pagedir;
    (0..MEMSIZE_VIRTUAL as u32)
        .step_by(PAGE_SIZE)
        .map(|va| {
            let entry = kernel.lookup(pagedir, VirtAddr(va));
            let pn = entry.frame().page_number();
            (entry.is_present() && entry.is_user() && pn < kernel.pages.len())
                .then(|| MapCell::from_info(kernel.pages.info(pn)))
        })
        .collect()
}
