mod common;

use kernel::{KernelError, PageEntry, PageInfoTable, PageMapper, PageOwner};
use types::layout::{CONSOLE_ADDR, MEMSIZE_PHYSICAL, PAGE_SIZE};
use types::{BootInfo, PhysAddr, PteFlags, VirtAddr};
use vm::PhysicalMemory;

use common::{boot, boot_with, code_page, data_page};

fn fresh() -> (PhysicalMemory, PageInfoTable) {
    (PhysicalMemory::new(MEMSIZE_PHYSICAL), PageInfoTable::init(&BootInfo::default()))
}

#[test]
fn test_map_then_lookup() {
    let (mut mem, mut pages) = fresh();
    let mut mapper = PageMapper::new(&mut mem, &mut pages);
    let dir = PhysAddr(0x4f000);
    mapper
        .map(dir, VirtAddr(0x10_0000), PhysAddr(0x12_0000), 2 * PAGE_SIZE, PteFlags::USER_RW)
        .unwrap();

    let entry = mapper.lookup(dir, VirtAddr(0x10_1000));
    assert!(entry.is_present() && entry.is_writable() && entry.is_user());
    assert_eq!(entry.frame(), PhysAddr(0x12_1000));
    assert_eq!(mapper.lookup(dir, VirtAddr(0x10_2000)), PageEntry::EMPTY);
    assert_eq!(mapper.lookup(dir, VirtAddr(0x40_0000)), PageEntry::EMPTY);
}

#[test]
fn test_map_allocates_table_for_directory_owner() {
    let (mut mem, mut pages) = fresh();
    let dir = pages.allocate_any(PageOwner::Process(5)).unwrap();
    let mut mapper = PageMapper::new(&mut mem, &mut pages);
    mapper
        .map(dir, VirtAddr(0x80_0000), PhysAddr(0x10_0000), PAGE_SIZE, PteFlags::USER_RO)
        .unwrap();
    let table = PhysAddr(mem.read_u32(dir.wrapping_add(2 * 4)) & !0xfff);
    assert_eq!(pages.info(table.page_number()).owner, PageOwner::Process(5));
    assert_eq!(pages.info(table.page_number()).refcount, 1);
}

#[test]
fn test_map_placeholder_is_not_present() {
    let (mut mem, mut pages) = fresh();
    let mut mapper = PageMapper::new(&mut mem, &mut pages);
    let dir = PhysAddr(0x4f000);
    mapper
        .map(dir, VirtAddr(0x10_0000), PhysAddr(0), PAGE_SIZE, PteFlags::W | PteFlags::U)
        .unwrap();
    let entry = mapper.lookup(dir, VirtAddr(0x10_0000));
    assert!(!entry.is_empty());
    assert!(!entry.is_present());
    assert_eq!(entry.flags(), PteFlags::W | PteFlags::U);
}

#[test]
#[should_panic(expected = "not page aligned")]
fn test_map_misaligned_panics() {
    let (mut mem, mut pages) = fresh();
    let mut mapper = PageMapper::new(&mut mem, &mut pages);
    let _ = mapper.map(PhysAddr(0x4f000), VirtAddr(0x10_0010), PhysAddr(0x10_0000), PAGE_SIZE, PteFlags::USER_RW);
}

#[test]
fn test_map_out_of_memory_for_table() {
    let (mut mem, mut pages) = fresh();
    while pages.allocate_any(PageOwner::Kernel).is_ok() {}
    let mut mapper = PageMapper::new(&mut mem, &mut pages);
    assert_eq!(
        mapper.map(PhysAddr(0x4f000), VirtAddr(0), PhysAddr(0x1000), PAGE_SIZE, PteFlags::KERNEL_RW),
        Err(KernelError::OutOfMemory)
    );
}

#[test]
fn test_kernel_directory_layout() {
    let kernel = boot();
    let dir = kernel.kernel_pagedir();
    let low = kernel.lookup(dir, VirtAddr(0x4_0000));
    assert_eq!(low.flags(), PteFlags::KERNEL_RW);
    assert_eq!(low.frame(), PhysAddr(0x4_0000));
    assert_eq!(kernel.lookup(dir, VirtAddr(CONSOLE_ADDR)).flags(), PteFlags::USER_RW);
    assert_eq!(kernel.lookup(dir, VirtAddr(0x10_0000)).flags(), PteFlags::USER_RW);
    assert_eq!(kernel.lookup(dir, VirtAddr(0x20_0000)), PageEntry::EMPTY);
    kernel.check_invariants().unwrap();
}

#[test]
fn test_process_directory_mirrors_kernel_and_holds_placeholders() {
    let kernel = boot_with(1);
    let dir = kernel.process(1).pagedir;
    assert_ne!(dir, kernel.kernel_pagedir());

    let low = kernel.lookup(dir, VirtAddr(0x4_0000));
    assert_eq!(low.frame(), PhysAddr(0x4_0000));
    assert_eq!(low.flags(), PteFlags::KERNEL_RW);
    let console = kernel.lookup(dir, VirtAddr(CONSOLE_ADDR));
    assert_eq!(console.frame(), PhysAddr(CONSOLE_ADDR));
    assert_eq!(console.flags(), PteFlags::USER_RW);

    let placeholder = kernel.lookup(dir, VirtAddr(0x18_0000));
    assert!(!placeholder.is_present());
    assert_eq!(placeholder.frame(), PhysAddr(0));
    assert_eq!(placeholder.flags(), PteFlags::W | PteFlags::U);

    let code = kernel.lookup(dir, VirtAddr(code_page(0)));
    assert_eq!(code.flags(), PteFlags::USER_RO);
    assert_eq!(code.frame(), PhysAddr(code_page(0)));
    let data = kernel.lookup(dir, VirtAddr(data_page(0)));
    assert_eq!(data.flags(), PteFlags::USER_RW);
}

#[test]
fn test_copy_leaves_nothing_allocated_when_memory_runs_out() {
    let (mut mem, mut pages) = fresh();
    let dir = PhysAddr(0x4f000);
    PageMapper::new(&mut mem, &mut pages)
        .map(dir, VirtAddr(0), PhysAddr(0), 0x10_0000, PteFlags::KERNEL_RW)
        .unwrap();
    while pages.free_count() > 1 {
        pages.allocate_any(PageOwner::Kernel).unwrap();
    }
    let mut mapper = PageMapper::new(&mut mem, &mut pages);
    assert_eq!(mapper.copy(dir, 1), Err(KernelError::OutOfMemory));
    assert_eq!(pages.free_count(), 1);
}

#[test]
fn test_release_address_space_frees_everything_private() {
    let mut kernel = boot();
    let free = kernel.pages().free_count();
    kernel.process_setup(1, 0, &mut common::TestLoader).unwrap();
    assert_eq!(kernel.pages().free_count(), free - 5);
    let _ = kernel.run(1);
    kernel.exit(1);
    assert_eq!(kernel.pages().free_count(), free);
    kernel.check_invariants().unwrap();
}
