//! Console and keyboard, as seen by the kernel.

use types::BootCommand;

use crate::error::Halt;
use crate::Kernel;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Hotkey {
    PowerOff,
    Reboot(BootCommand),
}

pub trait Devices {
    /// Next pending hotkey, if any. Called on every interrupt and on every
    /// idle probe of the scheduler.
    fn check_keyboard(&mut self) -> Option<Hotkey> {
        None
    }

    /// Print one line on the console.
    fn console_print(&mut self, line: &str) {
        let _ = line;
    }

    /// Redraw whatever the console shows about kernel state.
    fn refresh(&mut self, kernel: &Kernel) {
        let _ = kernel;
    }
}

/// No console, no keyboard.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoDevices;

impl Devices for NoDevices {}

impl Kernel {
    pub(crate) fn poll_keyboard(&mut self, devices: &mut dyn Devices) -> Result<(), Halt> {
        match devices.check_keyboard() {
            None => Ok(()),
            Some(Hotkey::PowerOff) => Err(Halt::PowerOff),
            Some(Hotkey::Reboot(command)) => Err(Halt::Reboot(command)),
        }
    }
}
