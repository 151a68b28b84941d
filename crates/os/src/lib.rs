//! Host side of the simulated machine.
//!
//! This crate provides:
//! - the user programs the kernel boots with, written as register-driven
//!   state machines that trap into the kernel like real processes,
//! - `Machine`, which runs resumed processes until their next trap and
//!   feeds the trap back to the kernel,
//! - a console that stands in for keyboard and screen, and a logger.

pub mod console;
pub mod logger;
pub mod machine;
pub mod programs;
pub mod traps;

pub use console::Console;
pub use machine::{Machine, MachineConfig, RunOutcome};
pub use traps::Trap;
