use crate::error::{Error, Result};
use crossterm::{
    event::{DisableMouseCapture, EnableMouseCapture},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{Terminal, backend::CrosstermBackend};
use std::io::{self, Stdout};

pub mod loss_chart;
pub mod sketch;

// Puts the terminal into raw mode on the alternate screen with mouse reporting, and restores it
// when dropped, whether the window closed normally or through an error.
struct TerminalGuard;

impl TerminalGuard {
    fn enter() -> Result<Self> {
        enable_raw_mode().map_err(Error::Terminal)?;
        // From here on the guard owns the cleanup, so a failing execute! still gets undone.
        let guard = TerminalGuard;
        execute!(io::stdout(), EnterAlternateScreen, EnableMouseCapture)
            .map_err(Error::Terminal)?;
        Ok(guard)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = execute!(io::stdout(), DisableMouseCapture, LeaveAlternateScreen);
        let _ = disable_raw_mode();
    }
}

fn open_terminal() -> Result<(TerminalGuard, Terminal<CrosstermBackend<Stdout>>)> {
    let guard = TerminalGuard::enter()?;
    let mut terminal =
        Terminal::new(CrosstermBackend::new(io::stdout())).map_err(Error::Terminal)?;
    terminal.clear().map_err(Error::Terminal)?;
    Ok((guard, terminal))
}
