use anyhow::{bail, Context, Result};
use clap::Parser;
use colored::*;
use kernel::{Config, Halt, KernelConfig};
use log::LevelFilter;
use os::console::{parse_key, render_physical, render_virtual};
use os::logger;
use os::{Console, Machine, MachineConfig, RunOutcome};
use types::layout::PAGE_SIZE;
use types::{BootCommand, Pid, VirtAddr};

/// Run the paging kernel on a simulated x86 machine
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Programs to boot: allocators, fork or forkexit
    #[arg(default_value = "allocators")]
    command: String,

    /// Stop after this many slices
    #[arg(short, long, default_value_t = 20_000)]
    slices: u64,

    /// Deliver a timer interrupt every N slices (0 disables the timer)
    #[arg(short, long, default_value_t = MachineConfig::default().timer_interval)]
    timer_interval: u64,

    /// Power off after N idle keyboard polls (0 never)
    #[arg(long, default_value_t = MachineConfig::default().idle_poweroff)]
    idle_poweroff: u64,

    /// Skip the memory invariant checks on kernel entry
    #[arg(long)]
    no_check: bool,

    /// Press a key after N keyboard polls, as POLL:KEY (keys: a, f, e, q)
    #[arg(short, long = "key", value_parser = parse_keypress)]
    keys: Vec<(u64, char)>,

    /// Print memory maps every N interrupts while running
    #[arg(long, default_value_t = 0)]
    display: u64,

    /// Print this process's virtual memory map when the run ends
    #[arg(long)]
    show: Option<Pid>,

    /// Hex-dump the page containing this virtual address (hex) in the shown process
    #[arg(long, value_parser = parse_hex)]
    dump: Option<u32>,

    /// More logging (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn parse_hex(s: &str) -> Result<u32, String> {
    let digits = s.trim_start_matches("0x");
    u32::from_str_radix(digits, 16).map_err(|e| format!("{s}: {e}"))
}

fn parse_keypress(s: &str) -> Result<(u64, char), String> {
    let (poll, key) = s.split_once(':').ok_or_else(|| format!("{s}: expected POLL:KEY"))?;
    let poll = poll.parse().map_err(|e| format!("{poll}: {e}"))?;
    let mut chars = key.chars();
    match (chars.next(), chars.next()) {
        (Some(key), None) if parse_key(key).is_some() => Ok((poll, key)),
        _ => Err(format!("{key}: unknown key")),
    }
}

fn main() {
    if let Err(e) = run() {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let args = Args::parse();
    let level = match args.verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    logger::init(level).context("failed to install logger")?;

    let config = MachineConfig {
        timer_interval: args.timer_interval,
        idle_poweroff: args.idle_poweroff,
        kernel: KernelConfig {
            check_invariants: !args.no_check,
        },
    };
    let mut command: BootCommand = args.command.parse().unwrap_or_default();
    let mut first_boot = true;

    loop {
        println!("{} {}", "Booting".bold().blue(), command.as_str().yellow());
        let mut console = Console::new(config.idle_poweroff)
            .with_echo(true)
            .with_display(args.display);
        if first_boot {
            for (poll, key) in &args.keys {
                if let Some(hotkey) = parse_key(*key) {
                    console = console.with_hotkey(*poll, hotkey);
                }
            }
        }
        first_boot = false;

        let mut machine = Machine::boot_with_console(command, config, console)
            .with_context(|| format!("failed to boot {}", command.as_str()))?;
        let outcome = machine.run(args.slices);
        report(&machine, &args)?;

        match outcome {
            RunOutcome::Halted(Halt::Reboot(next)) => {
                println!("{} {}", "Rebooting into".bold(), next.as_str().yellow());
                command = next;
            }
            RunOutcome::Halted(Halt::PowerOff) => {
                println!("{}", "Powered off".green());
                return Ok(());
            }
            RunOutcome::Halted(Halt::Panic(panic)) => bail!("kernel panic: {panic}"),
            RunOutcome::SliceLimit => {
                println!("Stopped after {} slices", machine.slices());
                return Ok(());
            }
        }
    }
}

fn report(machine: &Machine, args: &Args) -> Result<()> {
    let kernel = machine.kernel();
    println!(
        "{} slices, {} timer ticks ({:.2}s), {} free pages",
        machine.slices(),
        kernel.ticks(),
        kernel.ticks() as f64 / Config::HZ as f64,
        kernel.pages().free_count()
    );
    for process in kernel.processes().live() {
        println!("  process {:>2}: {:?} eip={:#x}", process.pid, process.state, process.regs.eip);
    }
    for line in machine.console().lines() {
        println!("  {}", line.red());
    }
    if args.show.is_none() && args.dump.is_none() {
        return Ok(());
    }

    let pid = args.show.unwrap_or(1);
    if pid >= kernel.processes().iter().count() || !kernel.process(pid).is_live() {
        bail!("process {pid} is not running");
    }
    println!("{}", render_physical(kernel));
    println!("{}", render_virtual(kernel, pid));

    if let Some(va) = args.dump {
        let va = VirtAddr(va).align_down();
        let entry = kernel.lookup(kernel.process(pid).pagedir, va);
        if !entry.is_present() {
            bail!("{va} is not mapped in process {pid}");
        }
        let page = kernel.memory().bytes(entry.frame(), PAGE_SIZE);
        println!("{} {va} -> {} ({:?})", "Page".bold(), entry.frame(), entry.flags());
        for (row, bytes) in page.chunks(16).enumerate() {
            println!("{:#010x}  {}", va.as_u32() + row as u32 * 16, hex::encode(bytes));
        }
    }
    Ok(())
}
