//! Error types for the logging engine

use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, EngineError>;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// IO error with context
    #[error("IO error while {operation} '{path}': {source}")]
    Io {
        operation: String,
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Generic IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Rotation spec that could not be parsed
    #[error("invalid rotation spec '{0}': expected '<N> <B|KB|MB|GB>', 'daily' or 'hourly'")]
    InvalidRotation(String),

    /// Retention spec that could not be parsed
    #[error("invalid retention spec '{0}': expected '<N> days' or a file count")]
    InvalidRetention(String),

    /// Level name not present in the registry
    #[error("unknown level '{0}'")]
    UnknownLevel(String),

    /// Level name already registered under a different number
    #[error("level '{name}' is already registered as {existing}, refusing {requested}")]
    LevelConflict {
        name: String,
        existing: u16,
        requested: u16,
    },

    /// Level number already owned by a different name
    #[error("level number {no} is already registered as '{existing}', refusing '{requested}'")]
    LevelNumberInUse {
        no: u16,
        existing: String,
        requested: String,
    },

    /// Context key that shadows a built-in record field
    #[error("'{0}' is a reserved record field and cannot be used as a context key")]
    ReservedKey(String),

    /// A file handler already owns this path
    #[error("a handler is already writing to '{}'", .0.display())]
    SinkPathInUse(PathBuf),

    /// Invalid handler configuration
    #[error("invalid configuration for {component}: {message}")]
    InvalidConfiguration { component: String, message: String },

    /// Enqueued sink channel is closed (worker gone)
    #[error("sink worker channel is closed")]
    ChannelClosed,
}

impl EngineError {
    /// Create an IO error with operation and path context
    pub fn io_operation(
        operation: impl Into<String>,
        path: impl Into<String>,
        source: std::io::Error,
    ) -> Self {
        EngineError::Io {
            operation: operation.into(),
            path: path.into(),
            source,
        }
    }

    /// Create an invalid configuration error
    pub fn config(component: impl Into<String>, message: impl Into<String>) -> Self {
        EngineError::InvalidConfiguration {
            component: component.into(),
            message: message.into(),
        }
    }
}
