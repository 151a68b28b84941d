use std::collections::{BTreeMap, BTreeSet};

use kernel::{AddressSpace, KernelError, ProgramLoader};
use log::debug;
use types::layout::{round_down, round_up, MEMSIZE_PHYSICAL, PAGE_SIZE, PROC_START_ADDR};
use types::VirtAddr;

use crate::image::{ProgramImage, Segment};

/// Program images kept in host memory, keyed by program number.
#[derive(Clone, Debug, Default)]
pub struct RamImageLoader {
    images: BTreeMap<usize, ProgramImage>,
}

impl RamImageLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, program: usize, image: ProgramImage) -> Option<ProgramImage> {
        self.images.insert(program, image)
    }

    pub fn with_image(mut self, program: usize, image: ProgramImage) -> Self {
        self.insert(program, image);
        self
    }

    pub fn image(&self, program: usize) -> Option<&ProgramImage> {
        self.images.get(&program)
    }

    pub fn images(&self) -> impl Iterator<Item = (usize, &ProgramImage)> {
        self.images.iter().map(|(program, image)| (*program, image))
    }
}

fn load_error(program: usize, reason: impl Into<String>) -> KernelError {
    KernelError::Load {
        program,
        reason: reason.into(),
    }
}

fn segment_pages(segment: &Segment) -> impl Iterator<Item = VirtAddr> {
    let start = round_down(segment.va.as_u32());
    let end = round_up(segment.end());
    (start..end).step_by(PAGE_SIZE).map(VirtAddr)
}

impl ProgramLoader for RamImageLoader {
    fn load(&mut self, space: &mut AddressSpace<'_>, program: usize) -> Result<u32, KernelError> {
        let image = self
            .images
            .get(&program)
            .ok_or_else(|| load_error(program, "no such program"))?;

        let mut claimed = BTreeSet::new();
        for segment in &image.segments {
            if segment.va.as_u32() < PROC_START_ADDR {
                return Err(load_error(
                    program,
                    format!("segment at {} overlaps kernel memory", segment.va),
                ));
            }
            let fits = segment
                .va
                .checked_add(segment.mem_size)
                .is_some_and(|end| end.as_usize() <= MEMSIZE_PHYSICAL);
            if !fits {
                return Err(load_error(
                    program,
                    format!("segment at {} extends past physical memory", segment.va),
                ));
            }
            if segment.data.len() > segment.mem_size as usize {
                return Err(load_error(
                    program,
                    format!("segment at {} holds more data than memory", segment.va),
                ));
            }
            for page in segment_pages(segment) {
                if claimed.insert(page) {
                    space.page_alloc(page)?;
                }
            }
            space.write(segment.va, &segment.data)?;
            let tail = segment.mem_size as usize - segment.data.len();
            space.zero(segment.va.wrapping_add(segment.data.len() as u32), tail)?;
            debug!(
                "process {}: segment {}..{:#x} ({})",
                space.owner(),
                segment.va,
                segment.end(),
                if segment.writable { "rw" } else { "ro" }
            );
        }

        // Protect only after every segment is written; segments may share a page.
        for segment in image.segments.iter().filter(|s| !s.writable && s.mem_size > 0) {
            space.protect_read_only(segment.va, segment.mem_size as usize)?;
        }
        Ok(image.entry)
    }
}
