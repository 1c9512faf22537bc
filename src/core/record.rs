//! Log record: the unit that flows through the pipeline

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use super::error::{EngineError, Result};
use super::level::Level;

/// Source location supplied by the producer. The engine never walks stacks;
/// these fields are whatever the caller captured.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallerInfo {
    pub name: String,
    pub function: String,
    pub line: u32,
    pub file: String,
}

impl CallerInfo {
    pub fn new(
        name: impl Into<String>,
        function: impl Into<String>,
        line: u32,
        file: impl Into<String>,
    ) -> Self {
        CallerInfo {
            name: name.into(),
            function: function.into(),
            line,
            file: file.into(),
        }
    }
}

/// Producer thread identity.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadInfo {
    pub name: String,
    pub id: u64,
}

/// Process identity.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessInfo {
    pub name: String,
    pub id: u32,
}

static NEXT_THREAD_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static THREAD_INFO: ThreadInfo = {
        let id = NEXT_THREAD_ID.fetch_add(1, Ordering::Relaxed);
        let name = std::thread::current()
            .name()
            .map(String::from)
            .unwrap_or_else(|| format!("thread-{}", id));
        ThreadInfo { name, id }
    };
}

/// Identity of the calling thread, cached per thread after first use.
pub fn current_thread_info() -> ThreadInfo {
    THREAD_INFO.with(|info| info.clone())
}

static PROCESS_INFO: LazyLock<ProcessInfo> = LazyLock::new(|| {
    let name = std::env::current_exe()
        .ok()
        .and_then(|p| p.file_stem().map(|s| s.to_string_lossy().into_owned()))
        .unwrap_or_else(|| "unknown".to_string());
    ProcessInfo {
        name,
        id: std::process::id(),
    }
});

/// Identity of this process, computed once.
pub fn current_process_info() -> ProcessInfo {
    PROCESS_INFO.clone()
}

/// Value type for user-supplied context fields.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Null,
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::String(s) => write!(f, "{}", s),
            FieldValue::Int(i) => write!(f, "{}", i),
            FieldValue::Float(fl) => write!(f, "{}", fl),
            FieldValue::Bool(b) => write!(f, "{}", b),
            FieldValue::Null => write!(f, "null"),
        }
    }
}

impl FieldValue {
    /// Convert to a `serde_json::Value` for canonical serialization.
    #[must_use]
    pub fn to_json_value(&self) -> serde_json::Value {
        match self {
            FieldValue::String(s) => serde_json::Value::String(s.clone()),
            FieldValue::Int(i) => serde_json::Value::Number((*i).into()),
            FieldValue::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            FieldValue::Bool(b) => serde_json::Value::Bool(*b),
            FieldValue::Null => serde_json::Value::Null,
        }
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::String(s)
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::String(s.to_string())
    }
}

impl From<i64> for FieldValue {
    fn from(i: i64) -> Self {
        FieldValue::Int(i)
    }
}

impl From<i32> for FieldValue {
    fn from(i: i32) -> Self {
        FieldValue::Int(i64::from(i))
    }
}

impl From<u32> for FieldValue {
    fn from(i: u32) -> Self {
        FieldValue::Int(i64::from(i))
    }
}

impl From<f64> for FieldValue {
    fn from(f: f64) -> Self {
        FieldValue::Float(f)
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        FieldValue::Bool(b)
    }
}

/// User context map attached to a record. `BTreeMap` keeps rendering and
/// serialization order deterministic.
pub type ExtraMap = BTreeMap<String, FieldValue>;

static EMPTY_EXTRA: LazyLock<Arc<ExtraMap>> = LazyLock::new(|| Arc::new(BTreeMap::new()));

/// Shared empty context, cloned for records with no extras.
#[inline]
pub fn empty_extra() -> Arc<ExtraMap> {
    Arc::clone(&EMPTY_EXTRA)
}

/// Record field names that context keys may not shadow.
pub const RESERVED_KEYS: &[&str] = &[
    "time",
    "level",
    "message",
    "name",
    "function",
    "line",
    "file",
    "elapsed",
    "thread_name",
    "thread_id",
    "process_name",
    "process_id",
    "exception",
    "extra",
];

/// Reject context keys that collide with built-in record fields.
pub fn validate_extra_key(key: &str) -> Result<()> {
    if RESERVED_KEYS.contains(&key) {
        return Err(EngineError::ReservedKey(key.to_string()));
    }
    Ok(())
}

/// A normalized log record. Optional fields are populated only when the
/// engine-wide collection requirements demand them.
#[derive(Clone, Debug)]
pub struct LogRecord {
    pub level: Arc<Level>,
    pub message: String,
    pub timestamp: DateTime<Local>,
    pub elapsed: Option<Duration>,
    pub caller: Option<CallerInfo>,
    pub thread: Option<ThreadInfo>,
    pub process: Option<ProcessInfo>,
    pub exception: Option<String>,
    pub extra: Arc<ExtraMap>,
}

impl LogRecord {
    /// Numeric severity.
    #[inline]
    pub fn level_no(&self) -> u16 {
        self.level.no
    }

    /// Display name of the severity.
    #[inline]
    pub fn level_name(&self) -> &str {
        &self.level.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thread_info_cached_per_thread() {
        let a = current_thread_info();
        let b = current_thread_info();
        assert_eq!(a, b);

        let other = std::thread::spawn(current_thread_info).join().unwrap();
        assert_ne!(a.id, other.id);
    }

    #[test]
    fn test_process_info() {
        let info = current_process_info();
        assert_eq!(info.id, std::process::id());
        assert!(!info.name.is_empty());
    }

    #[test]
    fn test_field_value_display() {
        assert_eq!(FieldValue::from("x").to_string(), "x");
        assert_eq!(FieldValue::from(42).to_string(), "42");
        assert_eq!(FieldValue::from(true).to_string(), "true");
        assert_eq!(FieldValue::Null.to_string(), "null");
    }

    #[test]
    fn test_field_value_json() {
        assert_eq!(
            FieldValue::from("x").to_json_value(),
            serde_json::json!("x")
        );
        assert_eq!(FieldValue::from(1.5).to_json_value(), serde_json::json!(1.5));
        assert_eq!(
            FieldValue::Float(f64::NAN).to_json_value(),
            serde_json::Value::Null
        );
    }

    #[test]
    fn test_reserved_keys_rejected() {
        assert!(validate_extra_key("user_id").is_ok());
        assert!(matches!(
            validate_extra_key("message"),
            Err(EngineError::ReservedKey(_))
        ));
        assert!(validate_extra_key("thread_id").is_err());
    }

    #[test]
    fn test_empty_extra_is_shared() {
        let a = empty_extra();
        let b = empty_extra();
        assert!(Arc::ptr_eq(&a, &b));
    }
}
