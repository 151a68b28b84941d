//! Fork twice, checking the return values and pids along the way, then
//! check the data segment and continue as an allocator.

use bootloader::ProgramImage;
use types::layout::PAGE_SIZE;
use types::Interrupt;
use vm::UserContext;

use super::allocator::{self, allocate_step};
use super::{bad_eip, build_image, heap_start, panic, string_addr, UserProgram};
use crate::traps::Trap;

// Registers: ebx = initial pid, ecx = first fork result, edx = pid after the
// first fork, esi = second fork result.
const START: u32 = 0;
const FIRST_FORK: u32 = 1;
const FIRST_GETPID: u32 = 2;
const SECOND_FORK: u32 = 3;
const SECOND_GETPID: u32 = 4;
const CHECKED: u32 = 5;
const ALLOCATE: u32 = 6;

const STRINGS: &[&str] = &[
    "fork",
    "fork failed",
    "bad pids after first fork",
    "bad pids after second fork",
    "data segment not loaded",
];
const MSG_FORK_FAILED: usize = 1;
const MSG_FIRST: usize = 2;
const MSG_SECOND: usize = 3;
const MSG_DATA: usize = 4;

/// Data spans two pages so loading a multi-page segment is exercised.
const DATA_SIZE: u32 = PAGE_SIZE as u32 + 16;

fn data_byte(offset: u32) -> u8 {
    (offset % 251) as u8
}

#[derive(Debug, Clone, Copy)]
pub struct Fork {
    base: u32,
}

impl Fork {
    pub fn new(base: u32) -> Self {
        Self { base }
    }

    fn message(&self, index: usize) -> u32 {
        string_addr(self.base, STRINGS, index)
    }

    fn data_va(&self) -> u32 {
        self.base + PAGE_SIZE as u32
    }
}

impl UserProgram for Fork {
    fn name(&self) -> &str {
        STRINGS[0]
    }

    fn base(&self) -> u32 {
        self.base
    }

    fn image(&self) -> ProgramImage {
        let data = (0..DATA_SIZE).map(data_byte).collect();
        build_image(self.base, STRINGS, data, DATA_SIZE)
    }

    fn step(&self, ctx: &mut UserContext<'_>) -> Trap {
        let phase = ctx.regs.eip.wrapping_sub(self.base);
        match phase {
            START => {
                ctx.jump(self.base + FIRST_FORK);
                Interrupt::GetPid.into()
            }
            FIRST_FORK => {
                ctx.regs.ebx = ctx.regs.eax;
                ctx.jump(self.base + FIRST_GETPID);
                Interrupt::Fork.into()
            }
            FIRST_GETPID => {
                if (ctx.regs.eax as i32) < 0 {
                    return panic(ctx, self.message(MSG_FORK_FAILED));
                }
                ctx.regs.ecx = ctx.regs.eax;
                ctx.jump(self.base + SECOND_FORK);
                Interrupt::GetPid.into()
            }
            SECOND_FORK => {
                let (initial, p1, intermediate) = (ctx.regs.ebx, ctx.regs.ecx, ctx.regs.eax);
                let ok = if p1 == 0 {
                    intermediate != initial
                } else {
                    intermediate == initial && p1 != initial
                };
                if !ok {
                    return panic(ctx, self.message(MSG_FIRST));
                }
                ctx.regs.edx = intermediate;
                ctx.jump(self.base + SECOND_GETPID);
                Interrupt::Fork.into()
            }
            SECOND_GETPID => {
                if (ctx.regs.eax as i32) < 0 {
                    return panic(ctx, self.message(MSG_FORK_FAILED));
                }
                ctx.regs.esi = ctx.regs.eax;
                ctx.jump(self.base + CHECKED);
                Interrupt::GetPid.into()
            }
            CHECKED => {
                let (p1, intermediate, p2, last) = (ctx.regs.ecx, ctx.regs.edx, ctx.regs.esi, ctx.regs.eax);
                let ok = if p2 == 0 {
                    last != intermediate
                } else {
                    p2 != p1 && p2 != intermediate && last == intermediate
                };
                if !ok {
                    return panic(ctx, self.message(MSG_SECOND));
                }
                for offset in [0, DATA_SIZE - 1] {
                    match ctx.load_u8(self.data_va() + offset) {
                        Ok(byte) if byte == data_byte(offset) => {}
                        Ok(_) => return panic(ctx, self.message(MSG_DATA)),
                        Err(fault) => return fault.into(),
                    }
                }
                ctx.jump(self.base + ALLOCATE);
                allocate_step(ctx, self.base + ALLOCATE, heap_start(&self.image()))
            }
            phase if phase < ALLOCATE + allocator::PHASES => {
                allocate_step(ctx, self.base + ALLOCATE, heap_start(&self.image()))
            }
            _ => bad_eip(ctx),
        }
    }
}
