//! The logging engine
//!
//! A process typically owns one `Engine`; `bind` hands out cheap views that
//! share the handler registry but carry extra bound context. The emission
//! hot path performs one atomic snapshot load, one min-level comparison, and
//! only then builds a record.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Local;

use super::builder::{HandlerBuilder, LevelSpec, SinkTarget};
use super::context::{self, ContextGuard};
use super::error::{EngineError, Result};
use super::fallback::{self, Source};
use super::level::{Level, LevelRegistry};
use super::record::{
    current_process_info, current_thread_info, validate_extra_key, CallerInfo, ExtraMap,
    FieldValue, LogRecord, ProcessInfo, ThreadInfo,
};
use super::registry::HandlerRegistry;
use super::requirements::CollectionRequirements;
use crate::sinks::{CallableFn, Sink};

/// Default shutdown timeout for [`Engine::shutdown`] callers that do not
/// need a specific bound.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

struct EngineInner {
    registry: HandlerRegistry,
    levels: LevelRegistry,
    start: Instant,
}

/// The record pipeline: handler registry, level registry and emission path.
#[derive(Clone)]
pub struct Engine {
    inner: Arc<EngineInner>,
    /// Bound context for this view; immutable, shared into records zero-copy.
    context: Arc<ExtraMap>,
}

/// Optional per-emission fields supplied by the producer. The engine never
/// introspects stacks; caller identity is whatever arrives here.
#[derive(Default)]
pub struct EmitOptions {
    pub caller: Option<CallerInfo>,
    pub thread: Option<ThreadInfo>,
    pub process: Option<ProcessInfo>,
    pub exception: Option<String>,
    pub extra: Option<ExtraMap>,
}

impl EmitOptions {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn caller(mut self, caller: CallerInfo) -> Self {
        self.caller = Some(caller);
        self
    }

    #[must_use]
    pub fn thread(mut self, thread: ThreadInfo) -> Self {
        self.thread = Some(thread);
        self
    }

    #[must_use]
    pub fn process(mut self, process: ProcessInfo) -> Self {
        self.process = Some(process);
        self
    }

    #[must_use]
    pub fn exception(mut self, text: impl Into<String>) -> Self {
        self.exception = Some(text.into());
        self
    }

    /// Attach one extra field. Keys shadowing built-in record fields are
    /// dropped and reported.
    #[must_use]
    pub fn field(mut self, key: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        let key = key.into();
        if let Err(e) = validate_extra_key(&key) {
            fallback::report(Source::Engine, "reserved key", &e);
            return self;
        }
        self.extra
            .get_or_insert_with(ExtraMap::new)
            .insert(key, value.into());
        self
    }
}

impl Engine {
    /// Create an engine with no handlers. Until a handler or callback is
    /// added, every emission short-circuits.
    pub fn new() -> Self {
        Engine {
            inner: Arc::new(EngineInner {
                registry: HandlerRegistry::new(),
                levels: LevelRegistry::new(),
                start: Instant::now(),
            }),
            context: super::record::empty_extra(),
        }
    }

    pub(crate) fn registry(&self) -> &HandlerRegistry {
        &self.inner.registry
    }

    // ------------------------------------------------------------------
    // Handler configuration
    // ------------------------------------------------------------------

    /// Configure a file handler.
    pub fn file(&self, path: impl Into<PathBuf>) -> HandlerBuilder<'_> {
        HandlerBuilder::new(self, SinkTarget::File(path.into()))
    }

    /// Configure a stdout handler.
    pub fn stdout(&self) -> HandlerBuilder<'_> {
        HandlerBuilder::new(self, SinkTarget::Stdout)
    }

    /// Configure a stderr handler.
    pub fn stderr(&self) -> HandlerBuilder<'_> {
        HandlerBuilder::new(self, SinkTarget::Stderr)
    }

    /// Configure a handler that hands rendered lines to `f`.
    pub fn callable(&self, f: impl Fn(&str) + Send + Sync + 'static) -> HandlerBuilder<'_> {
        HandlerBuilder::new(self, SinkTarget::Callable(Box::new(f) as CallableFn))
    }

    /// Remove a handler by id. For enqueued file sinks this drains the
    /// worker before returning.
    pub fn remove(&self, handler_id: u64) -> bool {
        self.inner.registry.remove(handler_id)
    }

    /// Remove every handler.
    pub fn remove_all(&self) {
        self.inner.registry.remove_all();
    }

    /// Register a callback that receives a read-only view of every admitted
    /// record at or above `level`.
    pub fn add_callback(
        &self,
        level: impl Into<LevelSpec>,
        f: impl Fn(&LogRecord) + Send + Sync + 'static,
    ) -> Result<u64> {
        let level_no = self.resolve_level_no(&level.into())?;
        Ok(self.inner.registry.add_callback(level_no, Arc::new(f)))
    }

    pub fn remove_callback(&self, callback_id: u64) -> bool {
        self.inner.registry.remove_callback(callback_id)
    }

    // ------------------------------------------------------------------
    // Levels
    // ------------------------------------------------------------------

    /// Register a custom level.
    pub fn level(
        &self,
        name: &str,
        no: u16,
        color: Option<&str>,
        icon: Option<&str>,
    ) -> Result<()> {
        self.inner.levels.register(name, no, color, icon)
    }

    /// Look up a level by name.
    pub fn lookup_level(&self, name: &str) -> Option<Arc<Level>> {
        self.inner.levels.lookup_by_name(name)
    }

    pub(crate) fn resolve_level_no(&self, spec: &LevelSpec) -> Result<u16> {
        match spec {
            LevelSpec::No(no) => Ok(*no),
            LevelSpec::Name(name) => self
                .inner
                .levels
                .lookup_by_name(name)
                .map(|level| level.no)
                .ok_or_else(|| EngineError::UnknownLevel(name.clone())),
        }
    }

    /// Would any handler or callback accept this level?
    pub fn is_level_enabled(&self, level: impl Into<LevelSpec>) -> bool {
        match self.resolve_level_no(&level.into()) {
            Ok(no) => no >= self.inner.registry.min_level(),
            Err(_) => false,
        }
    }

    /// Cached minimum level across handlers and callbacks. `u16::MAX` when
    /// nothing is registered.
    pub fn min_level(&self) -> u16 {
        self.inner.registry.min_level()
    }

    pub fn handler_count(&self) -> usize {
        self.inner.registry.handler_count()
    }

    /// Aggregated collection requirements across handlers and callbacks.
    pub fn requirements(&self) -> CollectionRequirements {
        self.inner.registry.requirements()
    }

    // ------------------------------------------------------------------
    // Context
    // ------------------------------------------------------------------

    /// Return a view of this engine with `key` bound into its context. The
    /// handler registry is shared; only the context differs.
    pub fn bind(&self, key: impl Into<String>, value: impl Into<FieldValue>) -> Result<Engine> {
        let key = key.into();
        validate_extra_key(&key)?;
        let mut context = (*self.context).clone();
        context.insert(key, value.into());
        Ok(Engine {
            inner: Arc::clone(&self.inner),
            context: Arc::new(context),
        })
    }

    /// Push extra fields for the current thread until the guard drops.
    pub fn contextualize<K, V>(
        &self,
        fields: impl IntoIterator<Item = (K, V)>,
    ) -> Result<ContextGuard>
    where
        K: Into<String>,
        V: Into<FieldValue>,
    {
        let mut frame = ExtraMap::new();
        for (key, value) in fields {
            let key = key.into();
            validate_extra_key(&key)?;
            frame.insert(key, value.into());
        }
        Ok(context::push_frame(frame))
    }

    // ------------------------------------------------------------------
    // Emission
    // ------------------------------------------------------------------

    /// Emit one record. `level` may be a name or a number; unknown levels
    /// are reported to the fallback sink and the record is dropped.
    pub fn emit(
        &self,
        level: impl Into<LevelSpec>,
        message: impl Into<String>,
        options: EmitOptions,
    ) {
        self.emit_spec(level.into(), message, options);
    }

    fn emit_spec(&self, spec: LevelSpec, message: impl Into<String>, options: EmitOptions) {
        let set = self.inner.registry.snapshot();

        // Admission: resolve the level and bail before any record work when
        // nothing can accept it.
        let level = match &spec {
            LevelSpec::No(no) => {
                if *no < set.min_level {
                    return;
                }
                self.inner.levels.lookup_by_no(*no)
            }
            LevelSpec::Name(name) => match self.inner.levels.lookup_by_name(name) {
                Some(level) if level.no < set.min_level => return,
                other => other,
            },
        };
        let Some(level) = level else {
            fallback::report(
                Source::Engine,
                "unknown level",
                &match spec {
                    LevelSpec::Name(name) => name,
                    LevelSpec::No(no) => no.to_string(),
                },
            );
            return;
        };
        if level.no < set.min_level {
            return;
        }

        let reqs = set.requirements;
        let timestamp = Local::now();
        let elapsed = reqs.elapsed.then(|| self.inner.start.elapsed());
        let caller = if reqs.caller { options.caller } else { None };
        let thread = if reqs.thread {
            options.thread.or_else(|| Some(current_thread_info()))
        } else {
            None
        };
        let process = if reqs.process {
            options.process.or_else(|| Some(current_process_info()))
        } else {
            None
        };
        let extra = context::merged_extra(&self.context, options.extra);

        let record = LogRecord {
            level,
            message: message.into(),
            timestamp,
            elapsed,
            caller,
            thread,
            process,
            exception: options.exception,
            extra,
        };

        for handler in &set.handlers {
            handler.dispatch(&record);
        }
        for callback in &set.callbacks {
            callback.invoke(&record);
        }
    }

    pub fn trace(&self, message: impl Into<String>) {
        self.emit_spec(
            LevelSpec::No(super::level::builtin::TRACE),
            message,
            EmitOptions::default(),
        );
    }

    pub fn debug(&self, message: impl Into<String>) {
        self.emit_spec(
            LevelSpec::No(super::level::builtin::DEBUG),
            message,
            EmitOptions::default(),
        );
    }

    pub fn info(&self, message: impl Into<String>) {
        self.emit_spec(
            LevelSpec::No(super::level::builtin::INFO),
            message,
            EmitOptions::default(),
        );
    }

    pub fn success(&self, message: impl Into<String>) {
        self.emit_spec(
            LevelSpec::No(super::level::builtin::SUCCESS),
            message,
            EmitOptions::default(),
        );
    }

    pub fn warning(&self, message: impl Into<String>) {
        self.emit_spec(
            LevelSpec::No(super::level::builtin::WARNING),
            message,
            EmitOptions::default(),
        );
    }

    pub fn error(&self, message: impl Into<String>) {
        self.emit_spec(
            LevelSpec::No(super::level::builtin::ERROR),
            message,
            EmitOptions::default(),
        );
    }

    pub fn fail(&self, message: impl Into<String>) {
        self.emit_spec(
            LevelSpec::No(super::level::builtin::FAIL),
            message,
            EmitOptions::default(),
        );
    }

    pub fn critical(&self, message: impl Into<String>) {
        self.emit_spec(
            LevelSpec::No(super::level::builtin::CRITICAL),
            message,
            EmitOptions::default(),
        );
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Flush every sink. For enqueued file sinks this waits (bounded) until
    /// the worker has drained everything queued before the call. Every sink
    /// is flushed even when an earlier one fails; the first error is
    /// returned afterward.
    pub fn complete(&self) -> Result<()> {
        let set = self.inner.registry.snapshot();
        let mut first_err = None;
        for handler in &set.handlers {
            if let Err(e) = handler.sink.flush() {
                first_err.get_or_insert(e);
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Drain and stop every enqueued worker, then flush sync sinks. Returns
    /// `false` if any worker outlived `timeout`.
    pub fn shutdown(&self, timeout: Duration) -> bool {
        let _ = self.complete();

        let deadline = Instant::now() + timeout;
        let set = self.inner.registry.snapshot();
        let mut clean = true;
        for handler in &set.handlers {
            if let Sink::File(ref sink) = handler.sink {
                let remaining = deadline.saturating_duration_since(Instant::now());
                clean &= sink.shutdown(remaining);
            }
        }
        clean
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}
