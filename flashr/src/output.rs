//! The reporting context a run writes to.
//!
//! Everything a run prints goes through an [`Output`], which is handed down
//! explicitly instead of reaching for the process-wide streams. Closing it
//! flushes both streams and the logger; it closes itself when dropped, so
//! this happens on every exit path once the report has been written.
use crate::robot::RobotMessage;
use indicatif::ProgressDrawTarget;
use log::warn;
use std::fmt::Display;
use std::io::{self, IsTerminal, Stderr, Stdout, Write};

/// How results are presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Progress bars and plain sentences for a person at a terminal.
    Interactive,
    /// One JSON object per line for another program.
    Robot,
}

pub struct Output<O: Write = Stdout, E: Write = Stderr> {
    mode: Mode,
    out: O,
    err: E,
    draw_bars: bool,
    closed: bool,
}

impl Output {
    /// Reports to the process's stdout and stderr. Bars are only drawn when
    /// stderr is a terminal.
    pub fn stdio(mode: Mode) -> Self {
        let draw_bars = io::stderr().is_terminal();
        let mut output = Self::new(mode, io::stdout(), io::stderr());
        output.draw_bars = draw_bars;
        output
    }
}

impl<O: Write, E: Write> Output<O, E> {
    /// Reports to arbitrary writers. Progress bars are never drawn.
    pub fn new(mode: Mode, out: O, err: E) -> Self {
        Self {
            mode,
            out,
            err,
            draw_bars: false,
            closed: false,
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Where progress bars should be drawn.
    pub fn bar_target(&self) -> ProgressDrawTarget {
        if self.draw_bars {
            ProgressDrawTarget::stderr()
        } else {
            ProgressDrawTarget::hidden()
        }
    }

    /// Writes a line to stdout.
    pub fn say(&mut self, line: impl Display) {
        if let Err(e) = writeln!(self.out, "{line}").and_then(|()| self.out.flush()) {
            warn!("Could not write to stdout: {e}");
        }
    }

    /// Writes a line to stderr.
    pub fn complain(&mut self, line: impl Display) {
        if let Err(e) = writeln!(self.err, "{line}").and_then(|()| self.err.flush()) {
            warn!("Could not write to stderr: {e}");
        }
    }

    /// Writes a robot message as a single line. Errors go to stderr,
    /// everything else to stdout. Each line is flushed immediately so lines
    /// reach the reader in the order they were emitted.
    pub fn robot(&mut self, message: &RobotMessage) {
        let line = match serde_json::to_string(message) {
            Ok(line) => line,
            Err(e) => {
                warn!("Could not serialize {message:?}: {e}");
                return;
            }
        };

        if message.is_error() {
            self.complain(line);
        } else {
            self.say(line);
        }
    }

    /// Flushes both streams and the logger. Safe to call more than once.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.out.flush().ok();
        self.err.flush().ok();
        log::logger().flush();
    }
}

impl<O: Write, E: Write> Drop for Output<O, E> {
    fn drop(&mut self) {
        self.close();
    }
}

/// An [`Output`] that captures everything in memory.
#[cfg(test)]
pub type Captured = Output<Vec<u8>, Vec<u8>>;

#[cfg(test)]
impl Captured {
    pub fn out(&self) -> String {
        String::from_utf8_lossy(&self.out).to_string()
    }

    pub fn err(&self) -> String {
        String::from_utf8_lossy(&self.err).to_string()
    }
}

#[cfg(test)]
pub fn captured(mode: Mode) -> Captured {
    Output::new(mode, Vec::new(), Vec::new())
}
