//! Handler registry
//!
//! Mutations are serialized by a writer mutex and publish a fresh immutable
//! [`HandlerSet`] through an [`ArcSwap`]; the emission hot path grabs the
//! current set with a single atomic load and never takes a lock. The set
//! caches the minimum level and the aggregated collection requirements so
//! admission is one comparison and one copy.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use parking_lot::Mutex;

use super::error::{EngineError, Result};
use super::fallback::{self, Source};
use super::handler::{next_handler_id, Handler};
use super::record::LogRecord;
use super::requirements::CollectionRequirements;
use crate::sinks::Sink;

/// How long removal waits for an enqueued sink's worker to drain.
const REMOVE_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// A registered record callback.
pub struct Callback {
    pub id: u64,
    pub level_no: u16,
    pub f: Arc<dyn Fn(&LogRecord) + Send + Sync>,
}

impl Callback {
    /// Invoke the callback, containing panics.
    pub fn invoke(&self, record: &LogRecord) {
        if record.level_no() < self.level_no {
            return;
        }
        if catch_unwind(AssertUnwindSafe(|| (self.f)(record))).is_err() {
            fallback::report(
                Source::Handler(self.id),
                "callback panic",
                &"record skipped for this callback",
            );
        }
    }
}

/// Immutable view of the live handlers and callbacks, published atomically.
pub struct HandlerSet {
    pub handlers: Vec<Arc<Handler>>,
    pub callbacks: Vec<Arc<Callback>>,
    pub min_level: u16,
    pub requirements: CollectionRequirements,
}

impl HandlerSet {
    fn empty() -> Self {
        HandlerSet {
            handlers: Vec::new(),
            callbacks: Vec::new(),
            min_level: u16::MAX,
            requirements: CollectionRequirements::none(),
        }
    }

    fn rebuild(handlers: Vec<Arc<Handler>>, callbacks: Vec<Arc<Callback>>) -> Self {
        let min_handler = handlers.iter().map(|h| h.level_no).min().unwrap_or(u16::MAX);
        let min_callback = callbacks.iter().map(|c| c.level_no).min().unwrap_or(u16::MAX);

        let mut requirements = handlers
            .iter()
            .fold(CollectionRequirements::none(), |acc, h| {
                acc.merge(h.requirements)
            });
        // Callbacks receive the whole record and may look at anything.
        if !callbacks.is_empty() {
            requirements = CollectionRequirements::all();
        }

        HandlerSet {
            handlers,
            callbacks,
            min_level: min_handler.min(min_callback),
            requirements,
        }
    }
}

pub struct HandlerRegistry {
    current: ArcSwap<HandlerSet>,
    write: Mutex<()>,
    /// Canonical paths of live file sinks, keyed back to their handler id.
    file_paths: Mutex<HashMap<PathBuf, u64>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        HandlerRegistry {
            current: ArcSwap::from_pointee(HandlerSet::empty()),
            write: Mutex::new(()),
            file_paths: Mutex::new(HashMap::new()),
        }
    }

    /// Current set, one atomic load, no lock.
    #[inline]
    pub fn snapshot(&self) -> Arc<HandlerSet> {
        self.current.load_full()
    }

    /// Register a handler. `path_key` is the canonical path for file sinks;
    /// a second handler on the same path is rejected.
    pub fn add(&self, handler: Handler, path_key: Option<PathBuf>) -> Result<u64> {
        let _guard = self.write.lock();

        if let Some(ref path) = path_key {
            let mut paths = self.file_paths.lock();
            if paths.contains_key(path) {
                return Err(EngineError::SinkPathInUse(path.clone()));
            }
            paths.insert(path.clone(), handler.id);
        }

        let id = handler.id;
        let set = self.current.load();
        let mut handlers = set.handlers.clone();
        handlers.push(Arc::new(handler));
        self.current
            .store(Arc::new(HandlerSet::rebuild(handlers, set.callbacks.clone())));
        Ok(id)
    }

    /// Remove a handler. Enqueued file sinks are drained and joined before
    /// this returns; writes racing the removal are discarded by the sink.
    pub fn remove(&self, id: u64) -> bool {
        let removed = {
            let _guard = self.write.lock();
            let set = self.current.load();
            let Some(pos) = set.handlers.iter().position(|h| h.id == id) else {
                return false;
            };
            let mut handlers = set.handlers.clone();
            let removed = handlers.remove(pos);
            self.current
                .store(Arc::new(HandlerSet::rebuild(handlers, set.callbacks.clone())));
            self.file_paths.lock().retain(|_, owner| *owner != id);
            removed
        };

        Self::retire_sink(&removed);
        true
    }

    /// Remove every handler, draining workers.
    pub fn remove_all(&self) {
        let old = {
            let _guard = self.write.lock();
            let set = self.current.load();
            let old = set.handlers.clone();
            self.current
                .store(Arc::new(HandlerSet::rebuild(Vec::new(), set.callbacks.clone())));
            self.file_paths.lock().clear();
            old
        };

        for handler in &old {
            Self::retire_sink(handler);
        }
    }

    fn retire_sink(handler: &Arc<Handler>) {
        if let Sink::File(ref sink) = handler.sink {
            let _ = sink.flush();
            sink.shutdown(REMOVE_DRAIN_TIMEOUT);
        }
    }

    /// Register a callback.
    pub fn add_callback(
        &self,
        level_no: u16,
        f: Arc<dyn Fn(&LogRecord) + Send + Sync>,
    ) -> u64 {
        let _guard = self.write.lock();
        let id = next_handler_id();
        let set = self.current.load();
        let mut callbacks = set.callbacks.clone();
        callbacks.push(Arc::new(Callback { id, level_no, f }));
        self.current
            .store(Arc::new(HandlerSet::rebuild(set.handlers.clone(), callbacks)));
        id
    }

    pub fn remove_callback(&self, id: u64) -> bool {
        let _guard = self.write.lock();
        let set = self.current.load();
        let Some(pos) = set.callbacks.iter().position(|c| c.id == id) else {
            return false;
        };
        let mut callbacks = set.callbacks.clone();
        callbacks.remove(pos);
        self.current
            .store(Arc::new(HandlerSet::rebuild(set.handlers.clone(), callbacks)));
        true
    }

    pub fn min_level(&self) -> u16 {
        self.current.load().min_level
    }

    pub fn requirements(&self) -> CollectionRequirements {
        self.current.load().requirements
    }

    pub fn handler_count(&self) -> usize {
        self.current.load().handlers.len()
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}
