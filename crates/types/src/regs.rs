//! Register snapshot saved on every trap and interrupt numbers.

/// Interrupt vector numbers understood by the kernel.
pub mod vector {
    pub const INT_PAGEFAULT: u32 = 14;
    pub const INT_TIMER: u32 = 32;
    pub const INT_SYS: u32 = 48;
    pub const INT_SYS_PANIC: u32 = INT_SYS;
    pub const INT_SYS_GETPID: u32 = INT_SYS + 1;
    pub const INT_SYS_YIELD: u32 = INT_SYS + 2;
    pub const INT_SYS_PAGE_ALLOC: u32 = INT_SYS + 3;
    pub const INT_SYS_FORK: u32 = INT_SYS + 4;
    pub const INT_SYS_EXIT: u32 = INT_SYS + 5;
}

/// Segment selectors and flags loaded into a fresh user context.
pub const SEGSEL_APP_CODE: u32 = 0x1b;
pub const SEGSEL_APP_DATA: u32 = 0x23;
pub const EFLAGS_IF: u32 = 0x200;

/// x86 register state at the moment a process trapped into the kernel.
///
/// The kernel stores one of these per process and hands a copy back to the
/// machine when it resumes the process. `intno` and `err` describe the trap
/// that produced the snapshot.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Registers {
    pub edi: u32,
    pub esi: u32,
    pub ebp: u32,
    pub ebx: u32,
    pub edx: u32,
    pub ecx: u32,
    pub eax: u32,
    pub es: u32,
    pub ds: u32,
    pub intno: u32,
    pub err: u32,
    pub eip: u32,
    pub cs: u32,
    pub eflags: u32,
    pub esp: u32,
    pub ss: u32,
}

impl Registers {
    /// Initial state of a user process: user segments, interrupts enabled.
    pub fn user() -> Self {
        Self {
            es: SEGSEL_APP_DATA,
            ds: SEGSEL_APP_DATA,
            ss: SEGSEL_APP_DATA,
            cs: SEGSEL_APP_CODE,
            eflags: EFLAGS_IF,
            ..Self::default()
        }
    }

    /// Same registers, stamped with the trap that interrupted them.
    pub fn with_trap(mut self, intno: u32, err: u32) -> Self {
        self.intno = intno;
        self.err = err;
        self
    }
}

/// Decoded interrupt vector.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Interrupt {
    PageFault,
    Timer,
    Panic,
    GetPid,
    Yield,
    PageAlloc,
    Fork,
    Exit,
}

impl Interrupt {
    pub fn from_number(intno: u32) -> Option<Self> {
        use vector::*;
        Some(match intno {
            INT_PAGEFAULT => Interrupt::PageFault,
            INT_TIMER => Interrupt::Timer,
            INT_SYS_PANIC => Interrupt::Panic,
            INT_SYS_GETPID => Interrupt::GetPid,
            INT_SYS_YIELD => Interrupt::Yield,
            INT_SYS_PAGE_ALLOC => Interrupt::PageAlloc,
            INT_SYS_FORK => Interrupt::Fork,
            INT_SYS_EXIT => Interrupt::Exit,
            _ => return None,
        })
    }

    pub fn number(self) -> u32 {
        use vector::*;
        match self {
            Interrupt::PageFault => INT_PAGEFAULT,
            Interrupt::Timer => INT_TIMER,
            Interrupt::Panic => INT_SYS_PANIC,
            Interrupt::GetPid => INT_SYS_GETPID,
            Interrupt::Yield => INT_SYS_YIELD,
            Interrupt::PageAlloc => INT_SYS_PAGE_ALLOC,
            Interrupt::Fork => INT_SYS_FORK,
            Interrupt::Exit => INT_SYS_EXIT,
        }
    }
}
