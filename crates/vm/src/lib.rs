//! Simulated x86 hardware the kernel runs on: physical RAM, the control
//! registers the kernel touches, and a two-level MMU that raises page faults.

pub mod context;
pub mod cpu;
pub mod memory;
pub mod mmu;

pub use context::UserContext;
pub use cpu::Cpu;
pub use memory::PhysicalMemory;
pub use mmu::{Access, PageFault, Privilege};
