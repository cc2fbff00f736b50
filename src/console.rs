use std::fmt::Display;
use std::io::{self, BufRead, Stderr, Stdout, Write};

use crossterm::style::{Stylize, style};

/// The only answer that lets a destructive step go ahead.
pub const CONFIRMATION: &str = "Yes";

/// User-facing narration. Progress goes to `out`, problems to `err`.
pub struct Console<O: Write, E: Write> {
    out: O,
    err: E,
}

impl Console<Stdout, Stderr> {
    pub fn stdio() -> Self {
        Self::new(io::stdout(), io::stderr())
    }
}

impl<O: Write, E: Write> Console<O, E> {
    pub fn new(out: O, err: E) -> Self {
        Self { out, err }
    }

    pub fn heading(&mut self, message: impl Display) {
        let _ = writeln!(self.out, "{}", style(message).bold().cyan());
    }

    pub fn info(&mut self, message: impl Display) {
        let _ = writeln!(self.out, "{}", style(message).cyan());
    }

    pub fn success(&mut self, message: impl Display) {
        let _ = writeln!(self.out, "{} {}", style("✓").green(), message);
    }

    pub fn preview(&mut self, from: impl Display, to: impl Display) {
        let _ = writeln!(self.out, "  {} {} {}", from, style("->").dark_grey(), style(to).green());
    }

    pub fn warn(&mut self, message: impl Display) {
        let _ = writeln!(self.err, "{} {}", style("⚠").yellow(), style(message).yellow());
    }

    pub fn error(&mut self, message: impl Display) {
        let _ = writeln!(self.err, "{} {}", style("✗").red(), style(message).red());
    }

    /// Asks `question` and reads one line from `input`.
    ///
    /// Only the exact text `Yes` confirms; end of input counts as a refusal.
    pub fn confirm<R: BufRead>(&mut self, question: &str, input: &mut R) -> io::Result<bool> {
        write!(
            self.out,
            "{} {} ",
            style(question).bold(),
            style(format!("(type {CONFIRMATION} to continue)")).dark_grey()
        )?;
        self.out.flush()?;

        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            let _ = writeln!(self.out);
            return Ok(false);
        }
        Ok(line.trim_end_matches(['\r', '\n']) == CONFIRMATION)
    }

    pub fn into_inner(self) -> (O, E) {
        (self.out, self.err)
    }
}
