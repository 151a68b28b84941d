//! Grab heap pages one at a time until memory or address space runs out,
//! writing the pid into each new page. Yields between attempts.

use bootloader::ProgramImage;
use types::layout::{round_down, PAGE_SIZE};
use types::Interrupt;
use vm::UserContext;

use super::{bad_eip, build_image, heap_start, rand, srand, UserProgram, ALLOC_SLOWDOWN};
use crate::traps::Trap;

// Phases of the allocation loop, relative to the eip where the loop starts.
// Registers: ebx = pid, esi = heap top, ebp = stack bottom, edi = rng.
const START: u32 = 0;
const SEEDED: u32 = 1;
const LOOP: u32 = 2;
const ALLOCATED: u32 = 3;
const DONE: u32 = 4;

/// Number of phases `allocate_step` occupies.
pub(crate) const PHASES: u32 = 5;

/// One step of the allocation loop placed at `origin`.
pub(crate) fn allocate_step(ctx: &mut UserContext<'_>, origin: u32, heap_start: u32) -> Trap {
    let mut phase = ctx.regs.eip.wrapping_sub(origin);
    loop {
        match phase {
            START => {
                ctx.jump(origin + SEEDED);
                return Interrupt::GetPid.into();
            }
            SEEDED => {
                let pid = ctx.regs.eax;
                ctx.regs.ebx = pid;
                srand(&mut ctx.regs, pid);
                ctx.regs.esi = heap_start;
                ctx.regs.ebp = round_down(ctx.regs.esp.wrapping_sub(1));
                phase = LOOP;
            }
            LOOP => {
                if rand(&mut ctx.regs) % ALLOC_SLOWDOWN >= ctx.regs.ebx {
                    ctx.jump(origin + LOOP);
                    return Interrupt::Yield.into();
                }
                if ctx.regs.esi == ctx.regs.ebp {
                    phase = DONE;
                    continue;
                }
                ctx.regs.eax = ctx.regs.esi;
                ctx.jump(origin + ALLOCATED);
                return Interrupt::PageAlloc.into();
            }
            ALLOCATED => {
                if (ctx.regs.eax as i32) < 0 {
                    phase = DONE;
                    continue;
                }
                // touch the new page
                if let Err(fault) = ctx.store_u8(ctx.regs.esi, ctx.regs.ebx as u8) {
                    return fault.into();
                }
                ctx.regs.esi += PAGE_SIZE as u32;
                ctx.jump(origin + LOOP);
                return Interrupt::Yield.into();
            }
            DONE => {
                ctx.jump(origin + DONE);
                return Interrupt::Yield.into();
            }
            _ => return bad_eip(ctx),
        }
    }
}

const STRINGS: &[&str] = &["allocator"];

#[derive(Debug, Clone, Copy)]
pub struct Allocator {
    base: u32,
}

impl Allocator {
    pub fn new(base: u32) -> Self {
        Self { base }
    }
}

impl UserProgram for Allocator {
    fn name(&self) -> &str {
        STRINGS[0]
    }

    fn base(&self) -> u32 {
        self.base
    }

    fn image(&self) -> ProgramImage {
        build_image(self.base, STRINGS, Vec::new(), 4)
    }

    fn step(&self, ctx: &mut UserContext<'_>) -> Trap {
        let heap = heap_start(&self.image());
        allocate_step(ctx, self.base, heap)
    }
}
