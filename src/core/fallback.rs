//! Internal error reporting
//!
//! Runtime failures inside sinks, filters and callbacks never reach the
//! producer. They are reported here instead: one stderr line per
//! (handler, kind) pair, with repeats suppressed so a persistently broken
//! sink cannot flood the process's stderr.

use std::collections::HashSet;
use std::fmt::Display;
use std::sync::LazyLock;

use parking_lot::Mutex;

/// Reporting source: a specific handler or the engine itself.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Source {
    Handler(u64),
    Engine,
}

static REPORTED: LazyLock<Mutex<HashSet<(Source, &'static str)>>> =
    LazyLock::new(|| Mutex::new(HashSet::new()));

/// Report an error once per (source, kind). Later occurrences of the same
/// pair are dropped.
pub fn report(source: Source, kind: &'static str, error: &dyn Display) {
    let first = REPORTED.lock().insert((source, kind));
    if !first {
        return;
    }
    match source {
        Source::Handler(id) => {
            eprintln!("[logpipe] handler #{} {}: {} (further reports suppressed)", id, kind, error)
        }
        Source::Engine => {
            eprintln!("[logpipe] {}: {} (further reports suppressed)", kind, error)
        }
    }
}

/// Report dropped enqueued messages. Always printed: this runs at shutdown
/// or periodically, not per record.
pub fn report_dropped(path: &std::path::Path, count: u64) {
    if count > 0 {
        eprintln!(
            "[logpipe] sink '{}' dropped {} messages (queue full or shut down)",
            path.display(),
            count
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_is_deduplicated() {
        // The registry is process-global and other tests report too, so only
        // inspect keys owned by this test's handler id.
        const ID: u64 = 990_001;
        report(Source::Handler(ID), "write", &"disk full");
        report(Source::Handler(ID), "write", &"disk full");
        report(Source::Handler(ID), "filter", &"panicked");

        let reported = REPORTED.lock();
        let mine = reported
            .iter()
            .filter(|(source, _)| *source == Source::Handler(ID))
            .count();
        assert_eq!(mine, 2, "one entry per (handler, kind)");
    }
}
