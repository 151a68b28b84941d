//! Consistency checks between the page-info table, the page directories and
//! the process table. Run on every interrupt entry when enabled.

use thiserror::Error;
use types::layout::NPROC;
use types::{Pid, PhysAddr};

use crate::pageinfo::PageOwner;
use crate::process::ProcState;
use crate::vmm;
use crate::Kernel;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvariantViolation {
    #[error("process slot 0 is not free")]
    SlotZeroInUse,
    #[error("page directory {pagedir} is owned by {actual:?}, expected {expected:?}")]
    DirectoryOwner {
        pagedir: PhysAddr,
        expected: PageOwner,
        actual: PageOwner,
    },
    #[error("page directory {pagedir} has refcount {actual}, expected {expected}")]
    DirectoryRefcount {
        pagedir: PhysAddr,
        expected: u32,
        actual: u32,
    },
    #[error("page table {table} is owned by {actual:?}, expected {expected:?}")]
    TableOwner {
        table: PhysAddr,
        expected: PageOwner,
        actual: PageOwner,
    },
    #[error("page table {table} has refcount {actual}, expected 1")]
    TableRefcount { table: PhysAddr, actual: u32 },
    #[error("page {pn:#x} belongs to process {pid}, which is not running")]
    OrphanPage { pn: usize, pid: Pid },
    #[error("page {pn:#x} has refcount {actual}, but {expected} references exist")]
    RefcountMismatch { pn: usize, expected: u32, actual: u32 },
    #[error("free page {pn:#x} is mapped by a process")]
    FreePageMapped { pn: usize },
}

pub fn check_virtual_memory(kernel: &Kernel) -> Result<(), InvariantViolation> {
    if kernel.procs.get(0).state != ProcState::Free {
        return Err(InvariantViolation::SlotZeroInUse);
    }

    let sharers = kernel
        .procs
        .live()
        .filter(|process| process.pagedir == kernel.kernel_pagedir)
        .count() as u32;
    check_directory(kernel, kernel.kernel_pagedir, PageOwner::Kernel, 1 + sharers)?;
    for process in own_directories(kernel) {
        check_directory(kernel, process.pagedir, PageOwner::Process(process.pid), 1)?;
    }

    for (pn, info) in kernel.pages.iter() {
        if let PageOwner::Process(pid) = info.owner {
            if info.refcount > 0 && (pid >= NPROC || kernel.procs.get(pid).state == ProcState::Free) {
                return Err(InvariantViolation::OrphanPage { pn, pid });
            }
        }
    }

    check_refcounts(kernel)
}

/// Live processes with a directory of their own.
fn own_directories(kernel: &Kernel) -> impl Iterator<Item = &crate::process::Process> {
    kernel
        .procs
        .live()
        .filter(move |process| process.pagedir != kernel.kernel_pagedir)
}

fn check_directory(
    kernel: &Kernel,
    pagedir: PhysAddr,
    owner: PageOwner,
    refcount: u32,
) -> Result<(), InvariantViolation> {
    let info = kernel.pages.info(pagedir.page_number());
    if info.owner != owner {
        return Err(InvariantViolation::DirectoryOwner {
            pagedir,
            expected: owner,
            actual: info.owner,
        });
    }
    if info.refcount != refcount {
        return Err(InvariantViolation::DirectoryRefcount {
            pagedir,
            expected: refcount,
            actual: info.refcount,
        });
    }
    for (_, table) in vmm::page_tables(&kernel.mem, pagedir) {
        let info = kernel.pages.info(table.page_number());
        if info.owner != owner {
            return Err(InvariantViolation::TableOwner {
                table,
                expected: owner,
                actual: info.owner,
            });
        }
        if info.refcount != 1 {
            return Err(InvariantViolation::TableRefcount {
                table,
                actual: info.refcount,
            });
        }
    }
    Ok(())
}

/// Recount every reference held by process directories and compare with
/// the page-info table.
fn check_refcounts(kernel: &Kernel) -> Result<(), InvariantViolation> {
    let mut expected = vec![0u32; kernel.pages.len()];
    for process in own_directories(kernel) {
        expected[process.pagedir.page_number()] += 1;
        for (_, table) in vmm::page_tables(&kernel.mem, process.pagedir) {
            expected[table.page_number()] += 1;
        }
        for (_, entry) in vmm::leaf_entries(&kernel.mem, process.pagedir) {
            if entry.is_present() && entry.is_user() {
                if let Some(count) = expected.get_mut(entry.frame().page_number()) {
                    *count += 1;
                }
            }
        }
    }

    for (pn, info) in kernel.pages.iter() {
        match info.owner {
            PageOwner::Process(_) if info.refcount != expected[pn] => {
                return Err(InvariantViolation::RefcountMismatch {
                    pn,
                    expected: expected[pn],
                    actual: info.refcount,
                });
            }
            PageOwner::Free if expected[pn] > 0 => {
                return Err(InvariantViolation::FreePageMapped { pn });
            }
            _ => {}
        }
    }
    Ok(())
}
