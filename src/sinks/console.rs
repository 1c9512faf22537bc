//! Console sink

use std::io::{self, IsTerminal, Write};
use std::sync::LazyLock;

use parking_lot::Mutex;

/// Target standard stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConsoleStream {
    Stdout,
    Stderr,
}

// One mutex per stream, shared by every console sink, so concurrent
// emissions to the same stream keep whole lines atomic.
static STDOUT_LOCK: LazyLock<Mutex<()>> = LazyLock::new(|| Mutex::new(()));
static STDERR_LOCK: LazyLock<Mutex<()>> = LazyLock::new(|| Mutex::new(()));

pub struct ConsoleSink {
    stream: ConsoleStream,
    colorize: bool,
}

impl ConsoleSink {
    /// Create a console sink. `colorize: None` enables color iff the stream
    /// is a terminal; `Some(_)` forces the choice.
    pub fn new(stream: ConsoleStream, colorize: Option<bool>) -> Self {
        let colorize = colorize.unwrap_or_else(|| match stream {
            ConsoleStream::Stdout => io::stdout().is_terminal(),
            ConsoleStream::Stderr => io::stderr().is_terminal(),
        });
        ConsoleSink { stream, colorize }
    }

    /// Whether rendered output should carry ANSI escapes.
    pub fn colorize(&self) -> bool {
        self.colorize
    }

    pub fn stream(&self) -> ConsoleStream {
        self.stream
    }

    /// Write one line, holding the stream mutex for the whole record.
    pub fn write(&self, line: &str) -> io::Result<()> {
        match self.stream {
            ConsoleStream::Stdout => {
                let _guard = STDOUT_LOCK.lock();
                let mut out = io::stdout();
                out.write_all(line.as_bytes())?;
                out.write_all(b"\n")
            }
            ConsoleStream::Stderr => {
                let _guard = STDERR_LOCK.lock();
                let mut out = io::stderr();
                out.write_all(line.as_bytes())?;
                out.write_all(b"\n")
            }
        }
    }

    pub fn flush(&self) -> io::Result<()> {
        match self.stream {
            ConsoleStream::Stdout => io::stdout().flush(),
            ConsoleStream::Stderr => io::stderr().flush(),
        }
    }
}
