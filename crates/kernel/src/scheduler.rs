use types::layout::NPROC;

use crate::devices::Devices;
use crate::error::Halt;
use crate::process::ProcState;
use crate::run::Resume;
use crate::Kernel;

impl Kernel {
    /// Round-robin: run the next RUNNABLE process after `current`.
    ///
    /// With nothing runnable this spins, polling the keyboard between
    /// probes; only a power-off or reboot hotkey ends the spin.
    pub fn schedule(&mut self, devices: &mut dyn Devices) -> Result<Resume, Halt> {
        let mut pid = self.current;
        loop {
            pid = (pid + 1) % NPROC;
            if self.procs.get(pid).state == ProcState::Runnable {
                return Ok(self.run(pid));
            }
            self.poll_keyboard(devices)?;
        }
    }
}
