use bootloader::{BootConfig, Bootloader};
use kernel::{Halt, Kernel, KernelConfig, KernelError, Resume};
use log::{error, info};
use types::{BootCommand, FaultCode, Interrupt, Registers, VirtAddr};
use vm::{PageFault, UserContext};

use crate::console::Console;
use crate::programs::ProgramSet;
use crate::traps::Trap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MachineConfig {
    /// A timer interrupt replaces every `timer_interval`-th slice; zero
    /// disables the timer.
    pub timer_interval: u64,
    /// Consecutive idle keyboard polls before the console powers off.
    pub idle_poweroff: u64,
    pub kernel: KernelConfig,
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            timer_interval: 8,
            idle_poweroff: 1000,
            kernel: KernelConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Halted(Halt),
    SliceLimit,
}

/// The simulated computer: kernel, user programs and devices.
///
/// A slice runs the resumed process until it traps, then enters the kernel
/// with the trap frame. The kernel answers with the next process to resume
/// or halts the machine.
pub struct Machine {
    kernel: Kernel,
    programs: ProgramSet,
    console: Console,
    config: MachineConfig,
    command: BootCommand,
    state: Result<Resume, Halt>,
    slices: u64,
}

impl Machine {
    pub fn boot(command: BootCommand, config: MachineConfig) -> Result<Self, KernelError> {
        Self::boot_with_console(command, config, Console::new(config.idle_poweroff))
    }

    /// Boot the kernel, load the programs `command` names into processes
    /// 1.. and resume process 1.
    pub fn boot_with_console(
        command: BootCommand,
        config: MachineConfig,
        console: Console,
    ) -> Result<Self, KernelError> {
        let bootloader = Bootloader::new(BootConfig {
            kernel: config.kernel,
            ..BootConfig::default()
        });
        let mut kernel = bootloader.boot()?;
        let programs = ProgramSet::for_command(command);
        let mut loader = programs.loader();
        for (number, program) in programs.iter().enumerate() {
            kernel.process_setup(number + 1, number, &mut loader)?;
            info!("boot: process {} runs {}", number + 1, program.name());
        }
        let state = Ok(kernel.run(1));
        Ok(Self {
            kernel,
            programs,
            console,
            config,
            command,
            state,
            slices: 0,
        })
    }

    pub fn kernel(&self) -> &Kernel {
        &self.kernel
    }

    pub fn console(&self) -> &Console {
        &self.console
    }

    pub fn command(&self) -> BootCommand {
        self.command
    }

    pub fn config(&self) -> &MachineConfig {
        &self.config
    }

    pub fn slices(&self) -> u64 {
        self.slices
    }

    /// Run up to `max_slices` slices. A halted machine stays halted.
    pub fn run(&mut self, max_slices: u64) -> RunOutcome {
        for _ in 0..max_slices {
            let resume = match &self.state {
                Ok(resume) => resume.clone(),
                Err(halt) => return RunOutcome::Halted(halt.clone()),
            };
            self.slices += 1;
            let timer = self.config.timer_interval > 0 && self.slices % self.config.timer_interval == 0;
            let (regs, trap) = if timer {
                (*resume.registers(), Trap::Interrupt(Interrupt::Timer))
            } else {
                self.execute(&resume)
            };
            if let Trap::PageFault(fault) = trap {
                self.kernel.cpu_mut().set_cr2(fault.addr);
            }
            self.state = self.kernel.interrupt(&trap.frame(regs), &mut self.console);
            if let Err(halt) = &self.state {
                match halt {
                    Halt::Panic(panic) => error!("machine: kernel panic: {panic}"),
                    other => info!("machine: halted: {other:?}"),
                }
            }
        }
        match &self.state {
            Ok(_) => RunOutcome::SliceLimit,
            Err(halt) => RunOutcome::Halted(halt.clone()),
        }
    }

    /// Run `resume` in user mode until its next trap.
    fn execute(&mut self, resume: &Resume) -> (Registers, Trap) {
        let regs = *resume.registers();
        let program = self.programs.find(regs.eip);
        let mut ctx = UserContext::new(regs, self.kernel.memory_mut(), resume.pagedir());
        let trap = match program {
            // instruction fetch goes through the MMU like any other read
            Some(program) => match ctx.load_u8(regs.eip) {
                Ok(_) => program.step(&mut ctx),
                Err(fault) => fault.into(),
            },
            None => Trap::PageFault(PageFault {
                addr: VirtAddr(regs.eip),
                code: FaultCode::USER,
            }),
        };
        (ctx.regs, trap)
    }
}
