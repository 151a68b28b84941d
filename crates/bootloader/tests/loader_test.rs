use bootloader::{BootConfig, Bootloader, ImageError, ProgramImage, RamImageLoader, Segment};
use kernel::{KernelError, ProcState};
use types::layout::{PAGE_SIZE, PROC_START_ADDR};
use types::{PhysAddr, PteFlags, VirtAddr};

const PF_X: u32 = 1;
const PF_W: u32 = 2;
const PF_R: u32 = 4;

struct Phdr {
    vaddr: u32,
    data: Vec<u8>,
    mem_size: u32,
    flags: u32,
}

/// Little-endian ELF32 executable with one `PT_LOAD` header per `Phdr`.
fn elf32(entry: u32, phdrs: &[Phdr]) -> Vec<u8> {
    let phoff = 52u32;
    let mut offset = phoff + 32 * phdrs.len() as u32;

    let mut out = vec![0x7f, b'E', b'L', b'F', 1, 1, 1, 0];
    out.extend_from_slice(&[0; 8]);
    out.extend_from_slice(&2u16.to_le_bytes()); // ET_EXEC
    out.extend_from_slice(&3u16.to_le_bytes()); // EM_386
    out.extend_from_slice(&1u32.to_le_bytes());
    out.extend_from_slice(&entry.to_le_bytes());
    out.extend_from_slice(&phoff.to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes());
    out.extend_from_slice(&52u16.to_le_bytes());
    out.extend_from_slice(&32u16.to_le_bytes());
    out.extend_from_slice(&(phdrs.len() as u16).to_le_bytes());
    out.extend_from_slice(&40u16.to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes());
    assert_eq!(out.len(), 52);

    for ph in phdrs {
        for word in [
            1, // PT_LOAD
            offset,
            ph.vaddr,
            ph.vaddr,
            ph.data.len() as u32,
            ph.mem_size,
            ph.flags,
            PAGE_SIZE as u32,
        ] {
            out.extend_from_slice(&word.to_le_bytes());
        }
        offset += ph.data.len() as u32;
    }
    for ph in phdrs {
        out.extend_from_slice(&ph.data);
    }
    out
}

fn sample_elf() -> Vec<u8> {
    elf32(
        PROC_START_ADDR + 0x10,
        &[
            Phdr {
                vaddr: PROC_START_ADDR,
                data: b"\x90\x90\x90\x90text".to_vec(),
                mem_size: 8,
                flags: PF_R | PF_X,
            },
            Phdr {
                vaddr: PROC_START_ADDR + 0x1000,
                data: vec![0xaa; 4],
                mem_size: 0x1800,
                flags: PF_R | PF_W,
            },
        ],
    )
}

fn read(kernel: &kernel::Kernel, pid: usize, va: u32, len: usize) -> Vec<u8> {
    let pagedir = kernel.process(pid).pagedir;
    (0..len as u32)
        .map(|i| {
            let entry = kernel.lookup(pagedir, VirtAddr(va + i));
            let pa = PhysAddr(entry.frame().as_u32() + ((va + i) & 0xfff));
            kernel.memory().read_u8(pa)
        })
        .collect()
}

#[test]
fn test_from_elf_reads_load_segments() {
    let image = ProgramImage::from_elf(&sample_elf()).unwrap();
    assert_eq!(image.entry, PROC_START_ADDR + 0x10);
    assert_eq!(image.segments.len(), 2);

    let text = &image.segments[0];
    assert_eq!(text.va, VirtAddr(PROC_START_ADDR));
    assert_eq!(text.data, b"\x90\x90\x90\x90text");
    assert!(!text.writable);

    let data = &image.segments[1];
    assert_eq!(data.mem_size, 0x1800);
    assert!(data.writable);
    assert_eq!(image.end(), PROC_START_ADDR + 0x2800);
}

#[test]
fn test_from_elf_rejects_garbage() {
    let err = ProgramImage::from_elf(b"not an executable at all, just some bytes").unwrap_err();
    assert!(matches!(err, ImageError::Parse(_)));
}

#[test]
fn test_from_elf_rejects_oversized_file_data() {
    let bytes = elf32(
        PROC_START_ADDR,
        &[Phdr {
            vaddr: PROC_START_ADDR,
            data: vec![1; 16],
            mem_size: 8,
            flags: PF_R,
        }],
    );
    let err = ProgramImage::from_elf(&bytes).unwrap_err();
    assert!(matches!(err, ImageError::SegmentSize { file_size: 16, mem_size: 8, .. }));
}

#[test]
fn test_from_elf_requires_a_load_segment() {
    let err = ProgramImage::from_elf(&elf32(PROC_START_ADDR, &[])).unwrap_err();
    assert!(matches!(err, ImageError::NoSegments));
}

#[test]
fn test_boot_classifies_memory() {
    let kernel = Bootloader::new(BootConfig::default()).boot().unwrap();
    assert_eq!(kernel.pages().free_count(), 397);
    kernel.check_invariants().unwrap();
}

#[test]
fn test_boot_rejects_directory_outside_image() {
    let config = BootConfig {
        kernel_pagedir: 0x6_0000,
        ..BootConfig::default()
    };
    let err = Bootloader::new(config).boot().unwrap_err();
    assert_eq!(err, KernelError::OutOfRange(0x6_0000));
}

#[test]
fn test_load_places_segments_with_permissions() {
    let mut kernel = Bootloader::default().boot().unwrap();
    let mut loader = RamImageLoader::new().with_image(1, ProgramImage::from_elf(&sample_elf()).unwrap());
    kernel.process_setup(1, 1, &mut loader).unwrap();

    let process = kernel.process(1);
    assert_eq!(process.state, ProcState::Runnable);
    assert_eq!(process.regs.eip, PROC_START_ADDR + 0x10);

    let text = kernel.lookup(process.pagedir, VirtAddr(PROC_START_ADDR));
    assert_eq!(text.flags(), PteFlags::USER_RO);
    assert_eq!(text.frame(), PhysAddr(PROC_START_ADDR));
    for page in [0x1000, 0x2000] {
        let entry = kernel.lookup(process.pagedir, VirtAddr(PROC_START_ADDR + page));
        assert_eq!(entry.flags(), PteFlags::USER_RW);
    }

    assert_eq!(read(&kernel, 1, PROC_START_ADDR, 8), b"\x90\x90\x90\x90text");
    assert_eq!(read(&kernel, 1, PROC_START_ADDR + 0x1000, 6), [0xaa, 0xaa, 0xaa, 0xaa, 0, 0]);
    assert!(read(&kernel, 1, PROC_START_ADDR + 0x2000, 0x800).iter().all(|b| *b == 0));
    kernel.check_invariants().unwrap();
}

#[test]
fn test_segments_sharing_a_page_load_once() {
    let image = ProgramImage::new(
        PROC_START_ADDR,
        vec![
            Segment {
                va: VirtAddr(PROC_START_ADDR),
                data: b"code".to_vec(),
                mem_size: 4,
                writable: true,
            },
            Segment {
                va: VirtAddr(PROC_START_ADDR + 0x100),
                data: b"data".to_vec(),
                mem_size: 4,
                writable: true,
            },
        ],
    );
    let mut kernel = Bootloader::default().boot().unwrap();
    let free = kernel.pages().free_count();
    let mut loader = RamImageLoader::new().with_image(1, image);
    kernel.process_setup(1, 1, &mut loader).unwrap();

    // directory, table, stack and the single image page
    assert_eq!(kernel.pages().free_count(), free - 4);
    assert_eq!(read(&kernel, 1, PROC_START_ADDR + 0x100, 4), b"data");
    kernel.check_invariants().unwrap();
}

#[test]
fn test_unknown_program_fails_cleanly() {
    let mut kernel = Bootloader::default().boot().unwrap();
    let free = kernel.pages().free_count();
    let err = kernel.process_setup(1, 7, &mut RamImageLoader::new()).unwrap_err();
    assert!(matches!(err, KernelError::Load { program: 7, .. }));
    assert_eq!(kernel.process(1).state, ProcState::Free);
    assert_eq!(kernel.pages().free_count(), free);
}

#[test]
fn test_image_below_process_memory_is_refused() {
    let image = ProgramImage::new(
        0x8_0000,
        vec![Segment {
            va: VirtAddr(0x8_0000),
            data: vec![0xcc; 4],
            mem_size: 4,
            writable: false,
        }],
    );
    let mut kernel = Bootloader::default().boot().unwrap();
    let free = kernel.pages().free_count();
    let mut loader = RamImageLoader::new().with_image(1, image);
    let err = kernel.process_setup(1, 1, &mut loader).unwrap_err();
    assert!(matches!(err, KernelError::Load { program: 1, .. }));
    assert_eq!(kernel.pages().free_count(), free);
    assert_eq!(kernel.memory().read_u8(PhysAddr(0x8_0000)), 0);
    kernel.check_invariants().unwrap();
}
