//! Logging macros for ergonomic message formatting.
//!
//! These provide `println!`-style formatting on top of the engine's level
//! methods.
//!
//! # Examples
//!
//! ```
//! use logpipe::prelude::*;
//! use logpipe::info;
//!
//! let engine = Engine::new();
//!
//! let port = 8080;
//! info!(engine, "listening on port {}", port);
//! ```

/// Log a message at any level (name or number) with automatic formatting.
///
/// ```
/// # use logpipe::prelude::*;
/// # let engine = Engine::new();
/// use logpipe::log;
/// log!(engine, "INFO", "simple message");
/// log!(engine, 40u16, "error code: {}", 500);
/// ```
#[macro_export]
macro_rules! log {
    ($engine:expr, $level:expr, $($arg:tt)+) => {
        $engine.emit($level, format!($($arg)+), $crate::EmitOptions::default())
    };
}

/// Log a trace-level message.
#[macro_export]
macro_rules! trace {
    ($engine:expr, $($arg:tt)+) => {
        $engine.trace(format!($($arg)+))
    };
}

/// Log a debug-level message.
#[macro_export]
macro_rules! debug {
    ($engine:expr, $($arg:tt)+) => {
        $engine.debug(format!($($arg)+))
    };
}

/// Log an info-level message.
#[macro_export]
macro_rules! info {
    ($engine:expr, $($arg:tt)+) => {
        $engine.info(format!($($arg)+))
    };
}

/// Log a success-level message.
#[macro_export]
macro_rules! success {
    ($engine:expr, $($arg:tt)+) => {
        $engine.success(format!($($arg)+))
    };
}

/// Log a warning-level message.
#[macro_export]
macro_rules! warn {
    ($engine:expr, $($arg:tt)+) => {
        $engine.warning(format!($($arg)+))
    };
}

/// Log an error-level message.
#[macro_export]
macro_rules! error {
    ($engine:expr, $($arg:tt)+) => {
        $engine.error(format!($($arg)+))
    };
}

/// Log a fail-level message.
#[macro_export]
macro_rules! fail {
    ($engine:expr, $($arg:tt)+) => {
        $engine.fail(format!($($arg)+))
    };
}

/// Log a critical-level message.
#[macro_export]
macro_rules! critical {
    ($engine:expr, $($arg:tt)+) => {
        $engine.critical(format!($($arg)+))
    };
}

#[cfg(test)]
mod tests {
    use crate::core::Engine;
    use std::sync::{Arc, Mutex};

    fn capturing() -> (Engine, Arc<Mutex<Vec<String>>>) {
        let engine = Engine::new();
        let seen: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);
        engine
            .callable(move |line| seen_clone.lock().unwrap().push(line.to_string()))
            .level("TRACE")
            .format("{level}:{message}")
            .add()
            .unwrap();
        (engine, seen)
    }

    #[test]
    fn test_log_macro() {
        let (engine, seen) = capturing();
        log!(engine, "INFO", "value: {}", 42);
        assert_eq!(seen.lock().unwrap().as_slice(), ["INFO:value: 42"]);
    }

    #[test]
    fn test_level_macros() {
        let (engine, seen) = capturing();
        trace!(engine, "t");
        debug!(engine, "d");
        info!(engine, "i {}", 1);
        success!(engine, "s");
        warn!(engine, "w");
        error!(engine, "e");
        fail!(engine, "f");
        critical!(engine, "c");

        let seen = seen.lock().unwrap();
        assert_eq!(
            seen.as_slice(),
            [
                "TRACE:t",
                "DEBUG:d",
                "INFO:i 1",
                "SUCCESS:s",
                "WARNING:w",
                "ERROR:e",
                "FAIL:f",
                "CRITICAL:c",
            ]
        );
    }
}
