use kernel::{Halt, Hotkey, KernelPanic, ProcState};
use os::{Console, Machine, MachineConfig, RunOutcome};
use types::layout::{PAGE_SIZE, PROC_SIZE, PROC_START_ADDR};
use types::{BootCommand, VirtAddr};

fn boot(command: BootCommand) -> Machine {
    Machine::boot(command, MachineConfig::default()).unwrap()
}

fn runnable(machine: &Machine) -> Vec<usize> {
    machine
        .kernel()
        .processes()
        .iter()
        .filter(|p| p.state == ProcState::Runnable)
        .map(|p| p.pid)
        .collect()
}

#[test]
fn test_allocators_fill_memory() {
    let mut machine = boot(BootCommand::Allocators);
    assert_eq!(machine.run(10_000), RunOutcome::SliceLimit);

    let kernel = machine.kernel();
    assert_eq!(runnable(&machine), vec![1, 2, 3, 4]);
    assert_eq!(kernel.pages().free_count(), 0);
    assert!(machine.console().lines().is_empty());
    kernel.check_invariants().unwrap();

    // the first heap page of each allocator holds its pid
    for pid in 1..=4usize {
        let heap = PROC_START_ADDR + (pid as u32 - 1) * PROC_SIZE + 2 * PAGE_SIZE as u32;
        let entry = kernel.lookup(kernel.process(pid).pagedir, VirtAddr(heap));
        assert!(entry.is_present() && entry.is_user() && entry.is_writable());
        assert_eq!(kernel.memory().read_u8(entry.frame()), pid as u8);
    }
}

#[test]
fn test_fork_program_passes_its_checks() {
    let mut machine = boot(BootCommand::Fork);
    assert_eq!(machine.run(10_000), RunOutcome::SliceLimit);

    let kernel = machine.kernel();
    assert_eq!(runnable(&machine), vec![1, 2, 3, 4]);
    assert!(machine.console().lines().is_empty());

    // the text page is shared read-only, the data pages are private copies
    let text = VirtAddr(PROC_START_ADDR);
    let data = VirtAddr(PROC_START_ADDR + PAGE_SIZE as u32);
    let parent = kernel.process(1).pagedir;
    for pid in 2..=4 {
        let child = kernel.process(pid).pagedir;
        assert_eq!(kernel.lookup(child, text).frame(), kernel.lookup(parent, text).frame());
        assert!(!kernel.lookup(child, text).is_writable());
        assert_ne!(kernel.lookup(child, data).frame(), kernel.lookup(parent, data).frame());
    }
    kernel.check_invariants().unwrap();
}

#[test]
fn test_forkexit_never_panics() {
    let mut machine = boot(BootCommand::ForkExit);
    let outcome = machine.run(20_000);
    assert!(
        matches!(outcome, RunOutcome::SliceLimit | RunOutcome::Halted(Halt::PowerOff)),
        "unexpected outcome {outcome:?}"
    );
    assert!(machine.console().lines().is_empty());
    machine.kernel().check_invariants().unwrap();
}

#[test]
fn test_timer_interrupts_are_counted() {
    let config = MachineConfig {
        timer_interval: 2,
        ..MachineConfig::default()
    };
    let mut machine = Machine::boot(BootCommand::Allocators, config).unwrap();
    assert_eq!(machine.run(100), RunOutcome::SliceLimit);
    assert_eq!(machine.kernel().ticks(), 50);
    assert_eq!(machine.slices(), 100);
}

#[test]
fn test_hotkey_reboots() {
    let console = Console::new(0).with_hotkey(50, Hotkey::Reboot(BootCommand::Fork));
    let mut machine =
        Machine::boot_with_console(BootCommand::Allocators, MachineConfig::default(), console).unwrap();
    assert_eq!(machine.run(1_000), RunOutcome::Halted(Halt::Reboot(BootCommand::Fork)));

    // a halted machine stays halted
    let slices = machine.slices();
    assert_eq!(machine.run(10), RunOutcome::Halted(Halt::Reboot(BootCommand::Fork)));
    assert_eq!(machine.slices(), slices);
}

#[test]
fn test_boot_starts_process_one() {
    let machine = boot(BootCommand::Fork);
    let kernel = machine.kernel();
    assert_eq!(kernel.current(), 1);
    assert_eq!(runnable(&machine), vec![1]);
    assert_eq!(machine.command(), BootCommand::Fork);
    assert_eq!(kernel.process(1).regs.eip, PROC_START_ADDR);
}

#[test]
fn test_disabled_checks_still_run() {
    let config = MachineConfig {
        kernel: kernel::KernelConfig {
            check_invariants: false,
        },
        ..MachineConfig::default()
    };
    let mut machine = Machine::boot(BootCommand::Fork, config).unwrap();
    let outcome = machine.run(2_000);
    assert!(!matches!(outcome, RunOutcome::Halted(Halt::Panic(KernelPanic::Invariant(_)))));
}
