//! Core pipeline types: records, levels, formatting, handlers and the engine

pub mod builder;
pub mod context;
pub mod engine;
pub mod error;
pub mod fallback;
pub mod format;
pub mod handler;
pub mod level;
pub mod markup;
pub mod record;
pub mod registry;
pub mod requirements;

pub use builder::{HandlerBuilder, LevelSpec, RetentionSpec};
pub use context::ContextGuard;
pub use engine::{EmitOptions, Engine, DEFAULT_SHUTDOWN_TIMEOUT};
pub use error::{EngineError, Result};
pub use format::{FormatPlan, DEFAULT_TEMPLATE, DEFAULT_TIME_FORMAT};
pub use handler::{FilterFn, Handler};
pub use level::{Level, LevelRegistry};
pub use markup::{render_markup, MarkupMode};
pub use record::{
    CallerInfo, ExtraMap, FieldValue, LogRecord, ProcessInfo, ThreadInfo, RESERVED_KEYS,
};
pub use registry::{Callback, HandlerRegistry, HandlerSet};
pub use requirements::{Collect, CollectMode, CollectionRequirements};
