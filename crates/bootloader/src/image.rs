use goblin::elf::program_header::{PF_W, PT_LOAD};
use goblin::elf::Elf;
use thiserror::Error;
use types::VirtAddr;

#[derive(Debug, Error)]
pub enum ImageError {
    #[error("malformed ELF: {0}")]
    Parse(#[from] goblin::error::Error),
    #[error("ELF has no loadable segments")]
    NoSegments,
    #[error("segment at {vaddr:#x} does not fit in 32 bits")]
    AddressRange { vaddr: u64 },
    #[error("segment at {vaddr:#x}: file size {file_size:#x} exceeds memory size {mem_size:#x}")]
    SegmentSize {
        vaddr: u64,
        file_size: u64,
        mem_size: u64,
    },
    #[error("segment at {vaddr:#x} reaches past the end of the file")]
    Truncated { vaddr: u64 },
}

/// One loadable region: `data` is copied to `va`, the rest of `mem_size`
/// is zero-filled.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Segment {
    pub va: VirtAddr,
    pub data: Vec<u8>,
    pub mem_size: u32,
    pub writable: bool,
}

impl Segment {
    pub fn end(&self) -> u32 {
        self.va.as_u32().saturating_add(self.mem_size)
    }
}

/// A program ready to be placed into an address space.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProgramImage {
    pub entry: u32,
    pub segments: Vec<Segment>,
}

impl ProgramImage {
    pub fn new(entry: u32, segments: Vec<Segment>) -> Self {
        Self { entry, segments }
    }

    /// Parse the `PT_LOAD` program headers of an ELF executable.
    pub fn from_elf(bytes: &[u8]) -> Result<Self, ImageError> {
        let elf = Elf::parse(bytes)?;
        let mut segments = Vec::new();
        for ph in elf.program_headers.iter().filter(|ph| ph.p_type == PT_LOAD) {
            let vaddr = ph.p_vaddr;
            let end = vaddr
                .checked_add(ph.p_memsz)
                .filter(|end| *end <= u64::from(u32::MAX))
                .ok_or(ImageError::AddressRange { vaddr })?;
            if ph.p_filesz > ph.p_memsz {
                return Err(ImageError::SegmentSize {
                    vaddr,
                    file_size: ph.p_filesz,
                    mem_size: ph.p_memsz,
                });
            }
            let data = usize::try_from(ph.p_offset)
                .ok()
                .zip(usize::try_from(ph.p_filesz).ok())
                .and_then(|(off, len)| bytes.get(off..off.checked_add(len)?))
                .ok_or(ImageError::Truncated { vaddr })?;
            segments.push(Segment {
                va: VirtAddr(vaddr as u32),
                data: data.to_vec(),
                mem_size: (end - vaddr) as u32,
                writable: ph.p_flags & PF_W != 0,
            });
        }
        if segments.is_empty() {
            return Err(ImageError::NoSegments);
        }
        let entry = u32::try_from(elf.entry).map_err(|_| ImageError::AddressRange { vaddr: elf.entry })?;
        Ok(Self { entry, segments })
    }

    /// One past the highest byte any segment occupies.
    pub fn end(&self) -> u32 {
        self.segments.iter().map(Segment::end).max().unwrap_or(0)
    }
}
