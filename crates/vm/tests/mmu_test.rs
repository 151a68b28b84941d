use types::{FaultCode, PhysAddr, PteFlags, Registers, VirtAddr};
use vm::mmu::translate;
use vm::{Access, PhysicalMemory, Privilege, UserContext};

const DIR: PhysAddr = PhysAddr(0x1000);
const TABLE: PhysAddr = PhysAddr(0x2000);

/// One directory, one table, covering the first 4 MiB.
fn memory_with_table() -> PhysicalMemory {
    let mut mem = PhysicalMemory::new(0x10_0000);
    mem.write_u32(DIR, TABLE.as_u32() | PteFlags::USER_RW.bits());
    mem
}

fn map(mem: &mut PhysicalMemory, va: u32, pa: u32, flags: PteFlags) {
    let slot = TABLE.wrapping_add(VirtAddr(va).ptx() as u32 * 4);
    mem.write_u32(slot, pa | flags.bits());
}

#[test]
fn test_translate_present_user_page() {
    let mut mem = memory_with_table();
    map(&mut mem, 0x5000, 0x9000, PteFlags::USER_RW);
    let pa = translate(&mem, DIR, VirtAddr(0x5123), Access::Write, Privilege::User).unwrap();
    assert_eq!(pa, PhysAddr(0x9123));
}

#[test]
fn test_missing_directory_entry_faults_not_present() {
    let mem = PhysicalMemory::new(0x10_0000);
    let fault = translate(&mem, DIR, VirtAddr(0x5000), Access::Read, Privilege::User).unwrap_err();
    assert_eq!(fault.addr, VirtAddr(0x5000));
    assert_eq!(fault.code, FaultCode::USER);
}

#[test]
fn test_placeholder_entry_is_not_present() {
    let mut mem = memory_with_table();
    map(&mut mem, 0x6000, 0, PteFlags::W | PteFlags::U);
    let fault = translate(&mem, DIR, VirtAddr(0x6000), Access::Write, Privilege::User).unwrap_err();
    assert_eq!(fault.code, FaultCode::USER | FaultCode::WRITE);
}

#[test]
fn test_user_write_to_read_only_page_is_protection_fault() {
    let mut mem = memory_with_table();
    map(&mut mem, 0x7000, 0x9000, PteFlags::USER_RO);
    assert!(translate(&mem, DIR, VirtAddr(0x7000), Access::Read, Privilege::User).is_ok());
    let fault = translate(&mem, DIR, VirtAddr(0x7004), Access::Write, Privilege::User).unwrap_err();
    assert_eq!(fault.code, FaultCode::PRESENT | FaultCode::WRITE | FaultCode::USER);
}

#[test]
fn test_kernel_only_page_denies_user_but_not_kernel() {
    let mut mem = memory_with_table();
    map(&mut mem, 0x8000, 0x8000, PteFlags::KERNEL_RW);
    let fault = translate(&mem, DIR, VirtAddr(0x8000), Access::Read, Privilege::User).unwrap_err();
    assert!(fault.code.contains(FaultCode::PRESENT));
    let pa = translate(&mem, DIR, VirtAddr(0x8000), Access::Write, Privilege::Kernel).unwrap();
    assert_eq!(pa, PhysAddr(0x8000));
}

#[test]
fn test_user_context_word_access() {
    let mut mem = memory_with_table();
    map(&mut mem, 0x5000, 0x9000, PteFlags::USER_RW);
    let mut ctx = UserContext::new(Registers::user(), &mut mem, DIR);
    ctx.store_u32(0x5010, 0xdead_beef).unwrap();
    assert_eq!(ctx.load_u32(0x5010).unwrap(), 0xdead_beef);
    assert_eq!(ctx.load_u8(0x5010).unwrap(), 0xef);
    assert_eq!(mem.read_u32(PhysAddr(0x9010)), 0xdead_beef);
}

#[test]
fn test_straddling_store_is_all_or_nothing() {
    let mut mem = memory_with_table();
    map(&mut mem, 0x5000, 0x9000, PteFlags::USER_RW);
    let mut ctx = UserContext::new(Registers::user(), &mut mem, DIR);
    let fault = ctx.store_u32(0x5ffe, 0x1122_3344).unwrap_err();
    assert_eq!(fault.addr, VirtAddr(0x6000));
    assert_eq!(mem.read_u8(PhysAddr(0x9ffe)), 0);
}

#[test]
fn test_copy_and_zero_page() {
    let mut mem = PhysicalMemory::new(0x4000);
    mem.write_bytes(PhysAddr(0x1000), b"weensy");
    mem.copy_page(PhysAddr(0x3000), PhysAddr(0x1000));
    assert_eq!(mem.bytes(PhysAddr(0x3000), 6), b"weensy");
    mem.zero_page(PhysAddr(0x1000));
    assert!(mem.page(PhysAddr(0x1000)).iter().all(|b| *b == 0));
}

#[test]
fn test_reserved_ranges() {
    assert!(vm::memory::is_reserved(PhysAddr(0)));
    assert!(vm::memory::is_reserved(PhysAddr(0xb8000)));
    assert!(!vm::memory::is_reserved(PhysAddr(0x1000)));
    assert!(!vm::memory::is_reserved(PhysAddr(0x10_0000)));
}
