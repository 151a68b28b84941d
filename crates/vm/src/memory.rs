use types::layout::{EXTPHYSMEM, IOPHYSMEM, PAGE_SIZE};
use types::PhysAddr;

/// Flat physical RAM.
///
/// Design at a glance:
/// - One contiguous `Vec<u8>`; frame N is the 4 KiB slice starting at `N << 12`.
/// - Page directories and page tables are ordinary frames holding
///   little-endian 32-bit entries, exactly as the hardware would see them.
/// - Accesses outside the buffer are bugs in the caller and panic.
#[derive(Debug, Clone)]
pub struct PhysicalMemory {
    backing: Vec<u8>,
}

impl PhysicalMemory {
    pub fn new(size: usize) -> Self {
        assert!(size != 0, "physical memory size must be > 0");
        assert!(size % PAGE_SIZE == 0, "physical memory must be a whole number of pages");
        Self {
            backing: vec![0u8; size],
        }
    }

    pub fn size(&self) -> usize {
        self.backing.len()
    }

    pub fn contains(&self, pa: PhysAddr, len: usize) -> bool {
        pa.as_usize()
            .checked_add(len)
            .map_or(false, |end| end <= self.backing.len())
    }

    pub fn read_u8(&self, pa: PhysAddr) -> u8 {
        self.backing[pa.as_usize()]
    }

    pub fn write_u8(&mut self, pa: PhysAddr, value: u8) {
        self.backing[pa.as_usize()] = value;
    }

    pub fn read_u32(&self, pa: PhysAddr) -> u32 {
        let start = pa.as_usize();
        let mut raw = [0u8; 4];
        raw.copy_from_slice(&self.backing[start..start + 4]);
        u32::from_le_bytes(raw)
    }

    pub fn write_u32(&mut self, pa: PhysAddr, value: u32) {
        let start = pa.as_usize();
        self.backing[start..start + 4].copy_from_slice(&value.to_le_bytes());
    }

    pub fn bytes(&self, pa: PhysAddr, len: usize) -> &[u8] {
        let start = pa.as_usize();
        &self.backing[start..start + len]
    }

    pub fn write_bytes(&mut self, pa: PhysAddr, data: &[u8]) {
        let start = pa.as_usize();
        self.backing[start..start + data.len()].copy_from_slice(data);
    }

    pub fn fill(&mut self, pa: PhysAddr, len: usize, value: u8) {
        let start = pa.as_usize();
        self.backing[start..start + len].fill(value);
    }

    /// The whole frame containing `pa`.
    pub fn page(&self, pa: PhysAddr) -> &[u8] {
        let start = pa.as_usize() & !(PAGE_SIZE - 1);
        &self.backing[start..start + PAGE_SIZE]
    }

    pub fn zero_page(&mut self, pa: PhysAddr) {
        assert!(pa.is_page_aligned(), "zero_page: {pa:?} is not page aligned");
        self.fill(pa, PAGE_SIZE, 0);
    }

    pub fn copy_page(&mut self, dst: PhysAddr, src: PhysAddr) {
        assert!(dst.is_page_aligned() && src.is_page_aligned(), "copy_page: unaligned frame");
        let src = src.as_usize();
        self.backing.copy_within(src..src + PAGE_SIZE, dst.as_usize());
    }
}

/// Hardware-reserved physical memory: the null page and the legacy I/O hole.
pub fn is_reserved(pa: PhysAddr) -> bool {
    pa.as_u32() == 0 || (IOPHYSMEM..EXTPHYSMEM).contains(&pa.as_u32())
}
