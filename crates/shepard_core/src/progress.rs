use std::io::{self, Stderr, Write};

use crossterm::{
    cursor::MoveToColumn,
    queue,
    style::Print,
    terminal::{Clear, ClearType},
};

pub const FILLED_GLYPH: char = '▣';
pub const UNFILLED_GLYPH: char = '_';

/// Sink for per-tick progress of a polling session.
pub trait ProgressReport {
    fn report(&mut self, label: &str, current: usize, total: usize) -> io::Result<()>;
    /// Called once after the session converged.
    fn finish(&mut self) -> io::Result<()>;
    /// Called instead of `finish` when the session failed or was cancelled.
    fn abandon(&mut self) -> io::Result<()>;
}

/// `label  [ ▣▣__ ]`. A `current` above `total` renders a full bar of
/// `current` glyphs and no unfilled ones.
pub fn render_bar(label: &str, current: usize, total: usize) -> String {
    let unfilled = total.saturating_sub(current);
    let mut line = String::with_capacity(label.len() + current + unfilled + 6);
    line.push_str(label);
    line.push_str("  [ ");
    line.extend(std::iter::repeat(FILLED_GLYPH).take(current));
    line.extend(std::iter::repeat(UNFILLED_GLYPH).take(unfilled));
    line.push_str(" ]");
    line
}

/// Redraws a single terminal line in place on every report.
pub struct TerminalProgress<W: Write> {
    out: W,
    drawn: bool,
}

impl TerminalProgress<Stderr> {
    pub fn stderr() -> Self {
        Self::new(io::stderr())
    }
}

impl<W: Write> TerminalProgress<W> {
    pub fn new(out: W) -> Self {
        Self { out, drawn: false }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> ProgressReport for TerminalProgress<W> {
    fn report(&mut self, label: &str, current: usize, total: usize) -> io::Result<()> {
        queue!(
            self.out,
            Clear(ClearType::CurrentLine),
            MoveToColumn(0),
            Print(render_bar(label, current, total))
        )?;
        self.drawn = true;
        self.out.flush()
    }

    fn finish(&mut self) -> io::Result<()> {
        if self.drawn {
            writeln!(self.out)?;
            self.drawn = false;
        }
        writeln!(self.out, "Done")?;
        self.out.flush()
    }

    fn abandon(&mut self) -> io::Result<()> {
        if self.drawn {
            writeln!(self.out)?;
            self.drawn = false;
        }
        self.out.flush()
    }
}
