/// Fixed kernel parameters.
pub struct Config;

impl Config {
    /// Timer interrupts per simulated second.
    pub const HZ: u64 = 100;
    /// Longest message SYS_PANIC reads out of user memory.
    pub const PANIC_MESSAGE_MAX: usize = 160;
    /// `-1` as seen in `eax` after a failed system call.
    pub const SYSCALL_FAILED: u32 = u32::MAX;
}

/// Runtime switches chosen at boot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KernelConfig {
    /// Run the virtual-memory invariant checker on every interrupt entry.
    pub check_invariants: bool,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            check_invariants: true,
        }
    }
}
