//! Terminal session guard.
//!
//! [`Tui::enter`] switches to raw mode on the alternate screen; dropping
//! the guard (or a panic anywhere) puts the terminal back.

use std::io::{Stdout, stdout};

use color_eyre::eyre::Result;
use crossterm::{
    cursor,
    event::{DisableFocusChange, EnableFocusChange},
    execute,
    terminal::{self, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{Frame, Terminal, backend::CrosstermBackend};

/// Raw-mode terminal owned for the lifetime of the panel.
pub struct Tui {
    terminal: Terminal<CrosstermBackend<Stdout>>,
}

impl Tui {
    /// Take over the terminal. Focus reports are enabled so a regained
    /// window repaints.
    pub fn enter() -> Result<Self> {
        terminal::enable_raw_mode()?;
        execute!(stdout(), EnterAlternateScreen, EnableFocusChange, cursor::Hide)?;

        let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;
        terminal.clear()?;
        Ok(Self { terminal })
    }

    pub fn draw(&mut self, render: impl FnOnce(&mut Frame)) -> Result<()> {
        self.terminal.draw(render)?;
        Ok(())
    }
}

impl Drop for Tui {
    fn drop(&mut self) {
        restore();
    }
}

/// Undo [`Tui::enter`]. Errors are ignored: this also runs from the panic
/// hook, where nothing can be reported.
fn restore() {
    let _ = execute!(stdout(), DisableFocusChange, LeaveAlternateScreen, cursor::Show);
    let _ = terminal::disable_raw_mode();
}

/// Route panics and error reports through color-eyre, restoring the
/// terminal first so the report is readable. Call before [`Tui::enter`].
pub fn install_hooks() -> Result<()> {
    let (panic_hook, eyre_hook) = color_eyre::config::HookBuilder::default()
        .display_env_section(false)
        .into_hooks();
    eyre_hook.install()?;

    let panic_hook = panic_hook.into_panic_hook();
    std::panic::set_hook(Box::new(move |info| {
        restore();
        panic_hook(info);
    }));
    Ok(())
}
