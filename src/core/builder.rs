//! Handler configuration
//!
//! A [`HandlerBuilder`] collects the options for one handler, validates
//! everything up front and registers the handler atomically. Misconfiguration
//! fails at `add` time; a registered handler never fails for configuration
//! reasons later.

use std::path::PathBuf;
use std::sync::Arc;

use super::engine::Engine;
use super::error::{EngineError, Result};
use super::format::{FormatPlan, DEFAULT_TEMPLATE};
use super::handler::{next_handler_id, FilterFn, Handler};
use super::record::LogRecord;
use super::requirements::{Collect, CollectionRequirements};
use crate::sinks::{
    CallableFn, CallableSink, ConsoleSink, ConsoleStream, FileSink, FileSinkConfig, Retention,
    Rotation, Sink,
};

const KB: u64 = 1024;
const MB: u64 = KB * 1024;
const GB: u64 = MB * 1024;

/// A level given by display name or by number.
#[derive(Clone, Debug)]
pub enum LevelSpec {
    Name(String),
    No(u16),
}

impl From<&str> for LevelSpec {
    fn from(name: &str) -> Self {
        LevelSpec::Name(name.to_string())
    }
}

impl From<String> for LevelSpec {
    fn from(name: String) -> Self {
        LevelSpec::Name(name)
    }
}

impl From<u16> for LevelSpec {
    fn from(no: u16) -> Self {
        LevelSpec::No(no)
    }
}

/// Parse a size string like `"500 KB"` to bytes.
fn parse_size(size_str: &str) -> Option<u64> {
    let size_str = size_str.trim().to_uppercase();
    let (num_part, unit_part): (String, String) = size_str
        .chars()
        .filter(|c| !c.is_whitespace())
        .partition(|c| c.is_ascii_digit() || *c == '.');

    let num: f64 = num_part.parse().ok()?;
    let multiplier = match unit_part.as_str() {
        "" | "B" => 1,
        "KB" => KB,
        "MB" => MB,
        "GB" => GB,
        _ => return None,
    };
    let bytes = (num * multiplier as f64) as u64;
    (bytes > 0).then_some(bytes)
}

/// Parse a rotation spec: `"daily"`, `"hourly"` or a size like `"10 MB"`.
pub(crate) fn parse_rotation(spec: &str) -> Result<Rotation> {
    match spec.trim().to_lowercase().as_str() {
        "daily" => Ok(Rotation::Daily),
        "hourly" => Ok(Rotation::Hourly),
        other => parse_size(other)
            .map(Rotation::Size)
            .ok_or_else(|| EngineError::InvalidRotation(spec.to_string())),
    }
}

/// Parse a retention spec: `"<N> days"` for age-based cleanup.
pub(crate) fn parse_retention(spec: &str) -> Result<Retention> {
    let lowered = spec.trim().to_lowercase();
    if let Some(num_part) = lowered
        .strip_suffix("days")
        .or_else(|| lowered.strip_suffix("day"))
    {
        let days: i64 = num_part
            .trim()
            .parse()
            .map_err(|_| EngineError::InvalidRetention(spec.to_string()))?;
        if days < 0 {
            return Err(EngineError::InvalidRetention(spec.to_string()));
        }
        return Ok(Retention::Age(chrono::Duration::days(days)));
    }
    if let Ok(count) = lowered.parse::<usize>() {
        return Ok(Retention::Count(count));
    }
    Err(EngineError::InvalidRetention(spec.to_string()))
}

/// Retention given as a count or as a textual spec.
#[derive(Clone, Debug)]
pub enum RetentionSpec {
    Count(usize),
    Text(String),
}

impl From<usize> for RetentionSpec {
    fn from(count: usize) -> Self {
        RetentionSpec::Count(count)
    }
}

impl From<&str> for RetentionSpec {
    fn from(spec: &str) -> Self {
        RetentionSpec::Text(spec.to_string())
    }
}

impl RetentionSpec {
    fn resolve(&self) -> Result<Retention> {
        match self {
            RetentionSpec::Count(count) => Ok(Retention::Count(*count)),
            RetentionSpec::Text(spec) => parse_retention(spec),
        }
    }
}

pub(crate) enum SinkTarget {
    File(PathBuf),
    Stdout,
    Stderr,
    Callable(CallableFn),
}

/// Builder for one handler. Obtained from [`Engine::file`],
/// [`Engine::stdout`], [`Engine::stderr`] or [`Engine::callable`].
pub struct HandlerBuilder<'a> {
    engine: &'a Engine,
    target: SinkTarget,
    level: LevelSpec,
    format: Option<String>,
    rotation: Option<String>,
    retention: Option<RetentionSpec>,
    compression: bool,
    serialize: bool,
    filter: Option<FilterFn>,
    enqueue: bool,
    colorize: Option<bool>,
    collect: Option<Collect>,
}

impl<'a> HandlerBuilder<'a> {
    pub(crate) fn new(engine: &'a Engine, target: SinkTarget) -> Self {
        HandlerBuilder {
            engine,
            target,
            level: LevelSpec::No(crate::core::level::builtin::DEBUG),
            format: None,
            rotation: None,
            retention: None,
            compression: false,
            serialize: false,
            filter: None,
            enqueue: false,
            colorize: None,
            collect: None,
        }
    }

    /// Minimum level for this handler, by name or number.
    #[must_use]
    pub fn level(mut self, level: impl Into<LevelSpec>) -> Self {
        self.level = level.into();
        self
    }

    /// Format template, compiled at `add` time.
    #[must_use]
    pub fn format(mut self, template: impl Into<String>) -> Self {
        self.format = Some(template.into());
        self
    }

    /// Rotation spec for file sinks: `"<N> <B|KB|MB|GB>"`, `"daily"` or
    /// `"hourly"`.
    #[must_use]
    pub fn rotation(mut self, spec: impl Into<String>) -> Self {
        self.rotation = Some(spec.into());
        self
    }

    /// Retention for rotated files: a count, or `"<N> days"`.
    #[must_use]
    pub fn retention(mut self, spec: impl Into<RetentionSpec>) -> Self {
        self.retention = Some(spec.into());
        self
    }

    /// Gzip rotated segments.
    #[must_use]
    pub fn compression(mut self, enabled: bool) -> Self {
        self.compression = enabled;
        self
    }

    /// Emit canonical JSON lines instead of the text template.
    #[must_use]
    pub fn serialize(mut self, enabled: bool) -> Self {
        self.serialize = enabled;
        self
    }

    /// Predicate; a record reaches the sink only when it returns true.
    #[must_use]
    pub fn filter(mut self, f: impl Fn(&LogRecord) -> bool + Send + Sync + 'static) -> Self {
        self.filter = Some(Arc::new(f));
        self
    }

    /// Route writes through the sink's background worker (file sinks only).
    #[must_use]
    pub fn enqueue(mut self, enabled: bool) -> Self {
        self.enqueue = enabled;
        self
    }

    /// Force color on or off for console sinks. Unset means auto-detect by
    /// TTY.
    #[must_use]
    pub fn colorize(mut self, enabled: bool) -> Self {
        self.colorize = Some(enabled);
        self
    }

    /// Explicit collection-requirements override.
    #[must_use]
    pub fn collect(mut self, collect: Collect) -> Self {
        self.collect = Some(collect);
        self
    }

    /// Validate the configuration and register the handler. Returns the
    /// handler id used for [`Engine::remove`].
    pub fn add(self) -> Result<u64> {
        let HandlerBuilder {
            engine,
            target,
            level,
            format,
            rotation,
            retention,
            compression,
            serialize,
            filter,
            enqueue,
            colorize,
            collect,
        } = self;

        let level_no = engine.resolve_level_no(&level)?;

        let plan = FormatPlan::compile(format.as_deref().unwrap_or(DEFAULT_TEMPLATE));
        let mut detected = plan.requirements();
        // JSON output and opaque filters can observe every optional field.
        if serialize || filter.is_some() {
            detected = CollectionRequirements::all();
        }
        let requirements = match collect {
            Some(collect) => collect.apply(detected),
            None => detected,
        };

        let reject_file_options = |sink_kind: &str| -> Result<()> {
            if enqueue {
                return Err(EngineError::config(sink_kind, "enqueue requires a file sink"));
            }
            if rotation.is_some() || retention.is_some() || compression {
                return Err(EngineError::config(
                    sink_kind,
                    "rotation, retention and compression require a file sink",
                ));
            }
            Ok(())
        };

        let id = next_handler_id();

        let (sink, path_key) = match target {
            SinkTarget::File(path) => {
                if colorize.is_some() {
                    return Err(EngineError::config(
                        "file sink",
                        "colorize applies to console sinks",
                    ));
                }
                let rotation = match &rotation {
                    Some(spec) => parse_rotation(spec)?,
                    None => Rotation::Never,
                };
                let retention = match &retention {
                    Some(spec) => spec.resolve()?,
                    None => Retention::None,
                };
                let sink = FileSink::new(FileSinkConfig {
                    path: path.clone(),
                    rotation,
                    retention,
                    compression,
                    enqueue,
                    handler_id: id,
                })?;
                // The sink just created the file, so canonicalize resolves.
                let key = std::fs::canonicalize(&path).unwrap_or_else(|_| {
                    std::env::current_dir()
                        .map(|cwd| cwd.join(&path))
                        .unwrap_or(path)
                });
                (Sink::File(sink), Some(key))
            }
            SinkTarget::Stdout => {
                reject_file_options("console sink")?;
                (
                    Sink::Console(ConsoleSink::new(ConsoleStream::Stdout, colorize)),
                    None,
                )
            }
            SinkTarget::Stderr => {
                reject_file_options("console sink")?;
                (
                    Sink::Console(ConsoleSink::new(ConsoleStream::Stderr, colorize)),
                    None,
                )
            }
            SinkTarget::Callable(f) => {
                reject_file_options("callable sink")?;
                if colorize.is_some() {
                    return Err(EngineError::config(
                        "callable sink",
                        "colorize applies to console sinks",
                    ));
                }
                (Sink::Callable(CallableSink::new(f, id)), None)
            }
        };

        let handler = Handler {
            id,
            level_no,
            filter,
            plan,
            serialize,
            sink,
            requirements,
        };

        engine.registry().add(handler, path_key)
    }
}
