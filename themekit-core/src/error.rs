//! Error types and result aliases.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("unknown-task: {name}")]
    UnknownTask { name: String },

    #[error("task-cycle: {}", .cycle.join(" -> "))]
    TaskCycle { cycle: Vec<String> },

    #[error("adapter-failed: {tool} failed in task \"{task}\": {}", .diagnostics.join("; "))]
    AdapterFailed {
        task: String,
        tool: String,
        diagnostics: Vec<String>,
    },

    #[error("config-invalid: {0}")]
    ConfigInvalid(String),

    #[error("config-invalid: TOML parse error in {context}: {error}")]
    Toml {
        error: toml::de::Error,
        context: String,
    },

    #[error("io-failed: {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("io-failed: {0}")]
    IoBare(#[from] std::io::Error),

    #[error("io-failed: watcher: {0}")]
    Watch(String),

    #[error("cancelled")]
    Cancelled,
}

impl Error {
    /// Wraps an I/O error with the path it happened on.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Error::ConfigInvalid(message.into())
    }

    /// Stable kind tag, matching the prefix of the `Display` output.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::UnknownTask { .. } => "unknown-task",
            Error::TaskCycle { .. } => "task-cycle",
            Error::AdapterFailed { .. } => "adapter-failed",
            Error::ConfigInvalid(_) | Error::Toml { .. } => "config-invalid",
            Error::Io { .. } | Error::IoBare(_) | Error::Watch(_) => "io-failed",
            Error::Cancelled => "cancelled",
        }
    }
}

impl From<toml::de::Error> for Error {
    fn from(error: toml::de::Error) -> Self {
        Error::Toml {
            error,
            context: "themekit.toml".to_string(),
        }
    }
}

impl From<glob::PatternError> for Error {
    fn from(error: glob::PatternError) -> Self {
        Error::ConfigInvalid(format!("invalid glob pattern: {}", error))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
