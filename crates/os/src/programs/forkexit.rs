//! Fork at random until a child breaks away, then allocate pages while
//! forking and exiting at random. Once memory runs out, exit eventually.

use bootloader::ProgramImage;
use types::layout::{round_down, PAGE_SIZE};
use types::Interrupt;
use vm::UserContext;

use super::{bad_eip, build_image, heap_start, panic, rand, srand, string_addr, UserProgram, ALLOC_SLOWDOWN};
use crate::traps::Trap;

// Registers: ebx = pid, esi = heap top, ebp = stack bottom, edi = rng.
const SPAWN: u32 = 0;
const SPAWNED: u32 = 1;
const SEEDED: u32 = 2;
const LOOP: u32 = 3;
const ALLOCATED: u32 = 4;
const FORKED: u32 = 5;
const EXHAUSTED: u32 = 6;
const EXITED: u32 = 7;
const CHILD_PID: u32 = 8;

const STRINGS: &[&str] = &["forkexit", "sys_exit failed!"];
const MSG_EXIT_FAILED: usize = 1;

#[derive(Debug, Clone, Copy)]
pub struct ForkExit {
    base: u32,
}

impl ForkExit {
    pub fn new(base: u32) -> Self {
        Self { base }
    }
}

impl UserProgram for ForkExit {
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
        let base = self.base;
        let mut phase = ctx.regs.eip.wrapping_sub(base);
        loop {
            match phase {
                SPAWN => {
                    if rand(&mut ctx.regs) % ALLOC_SLOWDOWN == 0 {
                        ctx.jump(base + SPAWNED);
                        return Interrupt::Fork.into();
                    }
                    ctx.jump(base + SPAWN);
                    return Interrupt::Yield.into();
                }
                SPAWNED => {
                    if ctx.regs.eax != 0 {
                        phase = SPAWN;
                        continue;
                    }
                    ctx.jump(base + SEEDED);
                    return Interrupt::GetPid.into();
                }
                SEEDED => {
                    let pid = ctx.regs.eax;
                    ctx.regs.ebx = pid;
                    srand(&mut ctx.regs, pid);
                    ctx.regs.esi = heap_start(&self.image());
                    ctx.regs.ebp = round_down(ctx.regs.esp.wrapping_sub(1));
                    phase = LOOP;
                }
                LOOP => {
                    let x = rand(&mut ctx.regs) % (8 * ALLOC_SLOWDOWN);
                    let p = 8 * ctx.regs.ebx;
                    if x < p {
                        if ctx.regs.esi == ctx.regs.ebp {
                            phase = EXHAUSTED;
                            continue;
                        }
                        ctx.regs.eax = ctx.regs.esi;
                        ctx.jump(base + ALLOCATED);
                        return Interrupt::PageAlloc.into();
                    } else if x == p {
                        ctx.jump(base + FORKED);
                        return Interrupt::Fork.into();
                    } else if x == p + 1 {
                        ctx.jump(base + EXITED);
                        return Interrupt::Exit.into();
                    }
                    ctx.jump(base + LOOP);
                    return Interrupt::Yield.into();
                }
                ALLOCATED => {
                    if (ctx.regs.eax as i32) < 0 {
                        phase = EXHAUSTED;
                        continue;
                    }
                    if let Err(fault) = ctx.store_u8(ctx.regs.esi, ctx.regs.ebx as u8) {
                        return fault.into();
                    }
                    ctx.regs.esi += PAGE_SIZE as u32;
                    phase = LOOP;
                }
                FORKED => {
                    if ctx.regs.eax != 0 {
                        phase = LOOP;
                        continue;
                    }
                    ctx.jump(base + CHILD_PID);
                    return Interrupt::GetPid.into();
                }
                CHILD_PID => {
                    ctx.regs.ebx = ctx.regs.eax;
                    phase = LOOP;
                }
                EXHAUSTED => {
                    if rand(&mut ctx.regs) % (2 * ALLOC_SLOWDOWN) == 0 {
                        ctx.jump(base + EXITED);
                        return Interrupt::Exit.into();
                    }
                    ctx.jump(base + EXHAUSTED);
                    return Interrupt::Yield.into();
                }
                EXITED => return panic(ctx, string_addr(base, STRINGS, MSG_EXIT_FAILED)),
                _ => return bad_eip(ctx),
            }
        }
    }
}
