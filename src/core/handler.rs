//! Handler: the binding of level gate, filter, format plan and sink

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::fallback::{self, Source};
use super::format::FormatPlan;
use super::record::LogRecord;
use super::requirements::CollectionRequirements;
use crate::sinks::Sink;

static NEXT_HANDLER_ID: AtomicU64 = AtomicU64::new(1);

/// Allocate a unique, monotonic handler id.
#[inline]
pub fn next_handler_id() -> u64 {
    NEXT_HANDLER_ID.fetch_add(1, Ordering::Relaxed)
}

/// Predicate over a record; truthy means the handler takes it.
pub type FilterFn = Arc<dyn Fn(&LogRecord) -> bool + Send + Sync>;

/// Immutable after construction; owned by the registry and shared with
/// in-flight snapshots.
pub struct Handler {
    pub id: u64,
    pub level_no: u16,
    pub filter: Option<FilterFn>,
    pub plan: FormatPlan,
    pub serialize: bool,
    pub sink: Sink,
    pub requirements: CollectionRequirements,
}

impl Handler {
    /// Level gate plus filter. A panicking filter counts as a rejection and
    /// is reported once.
    pub fn accepts(&self, record: &LogRecord) -> bool {
        if record.level_no() < self.level_no {
            return false;
        }
        match &self.filter {
            None => true,
            Some(filter) => match catch_unwind(AssertUnwindSafe(|| filter(record))) {
                Ok(passes) => passes,
                Err(_) => {
                    fallback::report(
                        Source::Handler(self.id),
                        "filter panic",
                        &"record treated as rejected",
                    );
                    false
                }
            },
        }
    }

    /// Filter, render and hand off one record. Failures are reported through
    /// the fallback sink; the producer never sees them.
    pub fn dispatch(&self, record: &LogRecord) {
        if !self.accepts(record) {
            return;
        }

        let line = if self.serialize {
            self.plan.serialize(record)
        } else {
            self.plan.render(record, self.sink.colorize())
        };

        if let Err(e) = self.sink.write(&line, record.timestamp) {
            fallback::report(Source::Handler(self.id), "write", &e);
        }
    }
}
