//! Callable sink
//!
//! Hands each rendered line to a user-supplied function. The callable
//! receives the line without a trailing newline; what it does with the text
//! is its own business. Panics inside the callable are caught and reported,
//! never propagated to the producer.

use std::panic::{catch_unwind, AssertUnwindSafe};

use crate::core::fallback::{self, Source};

pub type CallableFn = Box<dyn Fn(&str) + Send + Sync>;

pub struct CallableSink {
    f: CallableFn,
    handler_id: u64,
}

impl CallableSink {
    pub fn new(f: CallableFn, handler_id: u64) -> Self {
        CallableSink { f, handler_id }
    }

    /// Invoke the callable with one rendered line.
    pub fn write(&self, line: &str) {
        if catch_unwind(AssertUnwindSafe(|| (self.f)(line))).is_err() {
            fallback::report(
                Source::Handler(self.handler_id),
                "callable panic",
                &"sink callable panicked, record dropped",
            );
        }
    }
}
