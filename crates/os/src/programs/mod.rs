//! User programs.
//!
//! A program is an image plus a step function. The step function runs the
//! process from its saved `eip` until the next trap, keeping every piece of
//! state in registers or in the process's own memory, so a forked child
//! simply continues where its parent trapped. `eip` is the program's base
//! address plus a phase number; phases sit inside the read-only text page.

pub mod allocator;
pub mod fork;
pub mod forkexit;

use bootloader::{ProgramImage, RamImageLoader, Segment};
use types::layout::{round_up, PAGE_SIZE, PROC_SIZE, PROC_START_ADDR};
use types::{BootCommand, FaultCode, Interrupt, Registers, VirtAddr};
use vm::{PageFault, UserContext};

use crate::traps::Trap;

pub use allocator::Allocator;
pub use fork::Fork;
pub use forkexit::ForkExit;

/// Allocation attempts happen on roughly `pid` of every `ALLOC_SLOWDOWN` turns.
pub const ALLOC_SLOWDOWN: u32 = 10;

pub trait UserProgram {
    fn name(&self) -> &str;

    /// Link address of the image; also the entry point.
    fn base(&self) -> u32;

    fn image(&self) -> ProgramImage;

    /// Run until the next trap. `ctx.regs.eip` lies inside the image.
    fn step(&self, ctx: &mut UserContext<'_>) -> Trap;
}

/// libc-style linear congruential generator whose state lives in `edi`.
pub(crate) fn rand(regs: &mut Registers) -> u32 {
    regs.edi = regs.edi.wrapping_mul(1_103_515_245).wrapping_add(12_345);
    (regs.edi >> 16) & 0x7fff
}

pub(crate) fn srand(regs: &mut Registers, seed: u32) {
    regs.edi = seed;
}

/// Build an image linked at `base`: a read-only text page holding
/// NUL-terminated `strings`, then a writable data segment of `data_size`
/// bytes starting one page later, initialized from `data`.
pub(crate) fn build_image(base: u32, strings: &[&str], data: Vec<u8>, data_size: u32) -> ProgramImage {
    let mut text = Vec::new();
    for s in strings {
        text.extend_from_slice(s.as_bytes());
        text.push(0);
    }
    let text_size = text.len() as u32;
    ProgramImage::new(
        base,
        vec![
            Segment {
                va: VirtAddr(base),
                data: text,
                mem_size: text_size,
                writable: false,
            },
            Segment {
                va: VirtAddr(base + PAGE_SIZE as u32),
                data,
                mem_size: data_size,
                writable: true,
            },
        ],
    )
}

/// Address of `strings[index]` inside a text page built by `build_image`.
pub(crate) fn string_addr(base: u32, strings: &[&str], index: usize) -> u32 {
    base + strings[..index].iter().map(|s| s.len() as u32 + 1).sum::<u32>()
}

/// First heap page: the page after the image.
pub(crate) fn heap_start(image: &ProgramImage) -> u32 {
    round_up(image.end())
}

/// `sys_panic(message)`; the kernel never returns from it.
pub(crate) fn panic(ctx: &mut UserContext<'_>, message: u32) -> Trap {
    ctx.regs.eax = message;
    Interrupt::Panic.into()
}

/// Execution reached an address with no instruction behind it.
pub(crate) fn bad_eip(ctx: &UserContext<'_>) -> Trap {
    Trap::PageFault(PageFault {
        addr: VirtAddr(ctx.regs.eip),
        code: FaultCode::PRESENT | FaultCode::USER,
    })
}

struct Loaded {
    program: Box<dyn UserProgram>,
    image: ProgramImage,
}

/// The programs one boot starts with. Program `n` is loaded into process
/// `n + 1`.
pub struct ProgramSet {
    loaded: Vec<Loaded>,
}

impl ProgramSet {
    pub fn new(programs: Vec<Box<dyn UserProgram>>) -> Self {
        let loaded = programs
            .into_iter()
            .map(|program| {
                let image = program.image();
                Loaded { program, image }
            })
            .collect();
        Self { loaded }
    }

    pub fn for_command(command: BootCommand) -> Self {
        let programs: Vec<Box<dyn UserProgram>> = match command {
            BootCommand::Allocators => (0..4u32)
                .map(|i| Box::new(Allocator::new(PROC_START_ADDR + i * PROC_SIZE)) as Box<dyn UserProgram>)
                .collect(),
            BootCommand::Fork => vec![Box::new(Fork::new(PROC_START_ADDR))],
            BootCommand::ForkExit => vec![Box::new(ForkExit::new(PROC_START_ADDR))],
        };
        Self::new(programs)
    }

    pub fn len(&self) -> usize {
        self.loaded.len()
    }

    pub fn is_empty(&self) -> bool {
        self.loaded.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn UserProgram> {
        self.loaded.iter().map(|loaded| loaded.program.as_ref())
    }

    /// The program whose image contains `eip`.
    pub fn find(&self, eip: u32) -> Option<&dyn UserProgram> {
        self.loaded
            .iter()
            .find(|loaded| (loaded.program.base()..loaded.image.end()).contains(&eip))
            .map(|loaded| loaded.program.as_ref())
    }

    pub fn loader(&self) -> RamImageLoader {
        self.loaded
            .iter()
            .enumerate()
            .fold(RamImageLoader::new(), |loader, (number, loaded)| {
                loader.with_image(number, loaded.image.clone())
            })
    }
}
