//! Terminal writers for rendered records

pub mod callable;
pub mod console;
pub mod file;

use chrono::{DateTime, Local};

use crate::core::error::Result;

pub use callable::{CallableFn, CallableSink};
pub use console::{ConsoleSink, ConsoleStream};
pub use file::{FileSink, FileSinkConfig, Retention, Rotation};

/// A handler's output destination.
pub enum Sink {
    Console(ConsoleSink),
    File(FileSink),
    Callable(CallableSink),
}

impl Sink {
    /// Deliver one rendered line. The line carries no trailing newline;
    /// console and file sinks append one, callables receive the bare line.
    pub fn write(&self, line: &str, timestamp: DateTime<Local>) -> Result<()> {
        match self {
            Sink::Console(sink) => sink.write(line).map_err(Into::into),
            Sink::File(sink) => sink.write(line, timestamp),
            Sink::Callable(sink) => {
                sink.write(line);
                Ok(())
            }
        }
    }

    pub fn flush(&self) -> Result<()> {
        match self {
            Sink::Console(sink) => sink.flush().map_err(Into::into),
            Sink::File(sink) => sink.flush(),
            Sink::Callable(_) => Ok(()),
        }
    }

    /// Whether rendering for this sink should emit ANSI color.
    pub fn colorize(&self) -> bool {
        match self {
            Sink::Console(sink) => sink.colorize(),
            _ => false,
        }
    }
}
