//! # logpipe
//!
//! A high-throughput structured logging engine: records flow from producers
//! through per-handler filtering and formatting into console, file or
//! callable sinks, with size/time file rotation, retention cleanup, optional
//! gzip compression and an asynchronous write path that never blocks the
//! producer on file I/O.
//!
//! ## Quick start
//!
//! ```no_run
//! use logpipe::prelude::*;
//!
//! let engine = Engine::new();
//! engine
//!     .file("app.log")
//!     .level("INFO")
//!     .format("{time} | {level:<8} | {message}")
//!     .rotation("10 MB")
//!     .retention(5usize)
//!     .add()
//!     .unwrap();
//!
//! engine.info("engine up");
//! engine.complete().unwrap();
//! ```

pub mod core;
pub mod macros;
pub mod sinks;

pub mod prelude {
    pub use crate::core::{
        CallerInfo, Collect, CollectMode, CollectionRequirements, EmitOptions, Engine,
        EngineError, FieldValue, LogRecord, Result, DEFAULT_SHUTDOWN_TIMEOUT,
    };
    pub use crate::sinks::{ConsoleStream, Retention, Rotation};
}

pub use crate::core::{
    CallerInfo, Collect, CollectMode, CollectionRequirements, ContextGuard, EmitOptions, Engine,
    EngineError, ExtraMap, FieldValue, FormatPlan, Handler, HandlerBuilder, Level, LevelSpec,
    LogRecord, ProcessInfo, Result, ThreadInfo, DEFAULT_SHUTDOWN_TIMEOUT,
};
pub use crate::sinks::{ConsoleStream, Retention, Rotation, Sink};
