//! Keyboard and screen for the simulated machine.

use std::collections::VecDeque;

use colored::{Color, ColoredString, Colorize};
use kernel::memshow::{physical_map, virtual_map, MapCell};
use kernel::{Devices, Hotkey, Kernel, PageOwner};
use log::info;
use types::layout::PAGE_SIZE;
use types::{BootCommand, Pid};

const CELLS_PER_ROW: usize = 64;

const PROCESS_COLORS: [Color; 8] = [
    Color::Red,
    Color::Green,
    Color::Yellow,
    Color::Blue,
    Color::Magenta,
    Color::Cyan,
    Color::BrightRed,
    Color::BrightGreen,
];

/// Keys the console understands: `a`, `f` and `e` reboot into the
/// allocators, fork and forkexit programs; `q` powers off.
pub fn parse_key(key: char) -> Option<Hotkey> {
    Some(match key {
        'a' => Hotkey::Reboot(BootCommand::Allocators),
        'f' => Hotkey::Reboot(BootCommand::Fork),
        'e' => Hotkey::Reboot(BootCommand::ForkExit),
        'q' => Hotkey::PowerOff,
        _ => return None,
    })
}

fn paint(cell: MapCell) -> ColoredString {
    let glyph = cell.glyph().to_string();
    let glyph = glyph.as_str();
    let painted = match cell.owner {
        PageOwner::Free => glyph.dimmed(),
        PageOwner::Reserved => glyph.bright_black(),
        PageOwner::Kernel => glyph.white().bold(),
        PageOwner::Process(pid) => glyph.color(PROCESS_COLORS[pid % PROCESS_COLORS.len()]),
    };
    if cell.shared { painted.reversed() } else { painted }
}

fn render_rows<I>(title: &str, cells: I) -> String
where
    I: IntoIterator<Item = Option<MapCell>>,
{
    let mut out = format!("{title}\n");
    let cells: Vec<_> = cells.into_iter().collect();
    for (row, chunk) in cells.chunks(CELLS_PER_ROW).enumerate() {
        out.push_str(&format!("{:#08x} ", row * CELLS_PER_ROW * PAGE_SIZE));
        for cell in chunk {
            match cell {
                Some(cell) => out.push_str(&paint(*cell).to_string()),
                None => out.push(' '),
            }
        }
        out.push('\n');
    }
    out
}

/// Owner of every physical page, one glyph per page.
pub fn render_physical(kernel: &Kernel) -> String {
    render_rows("PHYSICAL MEMORY", physical_map(kernel).into_iter().map(Some))
}

/// What `pid` can reach from user mode, one glyph per virtual page.
pub fn render_virtual(kernel: &Kernel, pid: Pid) -> String {
    render_rows(&format!("VIRTUAL ADDRESS SPACE FOR {pid}"), virtual_map(kernel, pid))
}

#[derive(Debug, Clone, Copy)]
struct Display {
    every: u64,
    refreshes: u64,
    showing: Pid,
}

/// Console and keyboard devices.
///
/// Keys come from a script of `(poll, hotkey)` pairs: a key is delivered on
/// the first poll at or after its poll number. With nothing else to do the
/// console presses power-off after `idle_poweroff` consecutive polls without
/// an interrupt in between; zero disables that.
#[derive(Debug, Default)]
pub struct Console {
    script: VecDeque<(u64, Hotkey)>,
    polls: u64,
    idle: u64,
    idle_poweroff: u64,
    lines: Vec<String>,
    echo: bool,
    display: Option<Display>,
}

impl Console {
    pub fn new(idle_poweroff: u64) -> Self {
        Self {
            idle_poweroff,
            ..Self::default()
        }
    }

    pub fn with_hotkey(mut self, poll: u64, hotkey: Hotkey) -> Self {
        self.script.push_back((poll, hotkey));
        self.script.make_contiguous().sort_by_key(|(poll, _)| *poll);
        self
    }

    /// Print console lines on stdout as well as recording them.
    pub fn with_echo(mut self, echo: bool) -> Self {
        self.echo = echo;
        self
    }

    /// Print memory maps every `every` interrupts, cycling through the
    /// live processes' address spaces.
    pub fn with_display(mut self, every: u64) -> Self {
        self.display = (every > 0).then_some(Display {
            every,
            refreshes: 0,
            showing: 1,
        });
        self
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn polls(&self) -> u64 {
        self.polls
    }

    pub fn showing(&self) -> Option<Pid> {
        self.display.map(|display| display.showing)
    }
}

impl Devices for Console {
    fn check_keyboard(&mut self) -> Option<Hotkey> {
        self.polls += 1;
        self.idle += 1;
        if let Some((at, _)) = self.script.front() {
            if *at <= self.polls {
                return self.script.pop_front().map(|(_, hotkey)| hotkey);
            }
        }
        if self.idle_poweroff > 0 && self.idle >= self.idle_poweroff {
            info!("console: idle for {} polls, powering off", self.idle);
            return Some(Hotkey::PowerOff);
        }
        None
    }

    fn console_print(&mut self, line: &str) {
        if self.echo {
            println!("{}", line.red());
        }
        self.lines.push(line.to_owned());
    }

    fn refresh(&mut self, kernel: &Kernel) {
        self.idle = 0;
        let Some(display) = self.display.as_mut() else {
            return;
        };
        display.refreshes += 1;
        if display.refreshes % display.every != 0 {
            return;
        }
        let live: Vec<Pid> = kernel.processes().live().map(|p| p.pid).collect();
        if let Some(next) = live.iter().copied().find(|pid| *pid > display.showing).or(live.first().copied()) {
            display.showing = next;
        }
        if self.echo {
            println!("{}", render_physical(kernel));
            if kernel.process(display.showing).is_live() {
                println!("{}", render_virtual(kernel, display.showing));
            }
        }
    }
}
