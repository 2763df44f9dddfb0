//! Operator selection
//!
//! The orchestrator asks a [`Selector`] to pick one entry from a list. The
//! interactive implementation prints a numbered menu and reads a line from
//! stdin; tests and non-interactive callers provide their own.

use crate::error::{SelectionError, TwinError};
use crate::shutdown::Shutdown;
use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::time::Duration;

/// Picks one option by index.
pub trait Selector {
    /// Returns a 0-based index into `options`.
    ///
    /// # Errors
    ///
    /// - `TwinError::Selection` for an unusable answer
    /// - `TwinError::Interrupted` if input was closed or shutdown was requested
    fn select(&mut self, prompt: &str, options: &[String]) -> Result<usize, TwinError>;
}

/// Parse a 1-based menu answer into a 0-based index.
pub fn parse_selection(input: &str, len: usize) -> Result<usize, SelectionError> {
    if len == 0 {
        return Err(SelectionError::NoOptions);
    }
    let trimmed = input.trim();
    let choice: usize = trimmed.parse().map_err(|_| SelectionError::NotANumber {
        input: trimmed.to_string(),
    })?;
    if choice == 0 || choice > len {
        return Err(SelectionError::OutOfRange { choice, len });
    }
    Ok(choice - 1)
}

/// How often a waiting selector checks for a shutdown request.
const INPUT_POLL: Duration = Duration::from_millis(50);

/// Numbered menu on stdout, answer from a line reader (stdin by default).
///
/// Lines are read on a helper thread so a pending prompt gives up as soon as
/// shutdown is requested instead of sitting in a blocking read.
pub struct StdinSelector {
    lines: Receiver<io::Result<String>>,
    shutdown: Arc<Shutdown>,
}

impl StdinSelector {
    pub fn new(shutdown: Arc<Shutdown>) -> Self {
        Self::with_reader(io::BufReader::new(io::stdin()), shutdown)
    }

    pub fn with_reader<R: BufRead + Send + 'static>(input: R, shutdown: Arc<Shutdown>) -> Self {
        let (tx, lines) = mpsc::channel();
        thread::spawn(move || forward_lines(input, tx));
        Self { lines, shutdown }
    }

    fn next_line(&self) -> Result<String, TwinError> {
        loop {
            if self.shutdown.is_requested() {
                return Err(TwinError::Interrupted);
            }
            match self.lines.recv_timeout(INPUT_POLL) {
                Ok(Ok(line)) if line.is_empty() => return Err(TwinError::Interrupted),
                Ok(Ok(line)) => return Ok(line),
                Ok(Err(e)) => return Err(e.into()),
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => return Err(TwinError::Interrupted),
            }
        }
    }
}

/// Read lines until EOF or an error; an empty line marks EOF.
fn forward_lines<R: BufRead>(mut input: R, tx: Sender<io::Result<String>>) {
    loop {
        let mut line = String::new();
        let result = input.read_line(&mut line).map(|_| line);
        let last = !matches!(&result, Ok(line) if !line.is_empty());
        if tx.send(result).is_err() || last {
            return;
        }
    }
}

impl Selector for StdinSelector {
    fn select(&mut self, prompt: &str, options: &[String]) -> Result<usize, TwinError> {
        if options.is_empty() {
            return Err(SelectionError::NoOptions.into());
        }

        let mut stdout = io::stdout().lock();
        for (i, option) in options.iter().enumerate() {
            writeln!(stdout, "{}. {}", i + 1, option)?;
        }
        write!(stdout, "[*] {}: ", prompt)?;
        stdout.flush()?;
        drop(stdout);

        let line = self.next_line()?;
        Ok(parse_selection(&line, options.len())?)
    }
}
