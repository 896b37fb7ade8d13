//! Global error handling for codext
//!
//! One error type covers every failure the tree store, the directory
//! sources and the bundle writer can report. Callers decide per variant
//! whether a failure halts the operation, is counted and skipped, or is
//! silently ignored (`UserCancelled`).

use std::io;
use thiserror::Error;

/// Global error type for codext operations
#[derive(Error, Debug)]
pub enum CodextError {
    /// The backend cannot be engaged at all (missing root, permission denied,
    /// unsupported capability)
    #[error("Access error: {0}")]
    Access(String),

    /// A specific directory cannot be listed
    #[error("Cannot list {path}: {reason}")]
    Listing { path: String, reason: String },

    /// A specific file cannot be read for inclusion
    #[error("Cannot read {path}: {reason}")]
    Read { path: String, reason: String },

    /// The root picker was dismissed. Not a failure.
    #[error("Cancelled by user")]
    UserCancelled,

    /// A batch selection is already running
    #[error("A batch update is already in progress")]
    BatchInProgress,

    /// Path key is absolute or escapes the root
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// File system errors
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON processing errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Regular expression errors
    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),

    /// HTTP transport errors
    #[error("HTTP error: {0}")]
    Http(String),

    /// Unexpected error
    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

impl CodextError {
    /// Build a listing error for `path`
    pub fn listing(path: impl ToString, reason: impl ToString) -> Self {
        Self::Listing {
            path: path.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Build a read error for `path`
    pub fn read(path: impl ToString, reason: impl ToString) -> Self {
        Self::Read {
            path: path.to_string(),
            reason: reason.to_string(),
        }
    }
}

impl From<reqwest::Error> for CodextError {
    fn from(error: reqwest::Error) -> Self {
        CodextError::Http(error.to_string())
    }
}

/// Specialized Result type for codext operations
pub type Result<T> = std::result::Result<T, CodextError>;

/// Creates a CodextError with a formatted message
#[macro_export]
macro_rules! error {
    ($error_type:ident, $($arg:tt)*) => {
        $crate::error::CodextError::$error_type(format!($($arg)*))
    };
}

/// Returns an error result with a formatted message
#[macro_export]
macro_rules! bail {
    ($error_type:ident, $($arg:tt)*) => {
        return Err($crate::error!($error_type, $($arg)*))
    };
}

/// Ensures a condition is true, otherwise returns an error
#[macro_export]
macro_rules! ensure {
    ($cond:expr, $error_type:ident, $($arg:tt)*) => {
        if !($cond) {
            $crate::bail!($error_type, $($arg)*)
        }
    };
}

/// Extension trait for adding context to errors
pub trait ResultExt<T, E> {
    /// Add additional context to an error
    fn with_context<C, F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> C,
        C: std::fmt::Display;
}

impl<T, E: std::error::Error + 'static> ResultExt<T, E> for std::result::Result<T, E> {
    fn with_context<C, F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> C,
        C: std::fmt::Display,
    {
        self.map_err(|e| {
            let context = f();
            CodextError::Unexpected(format!("{}: {}", context, e))
        })
    }
}

// Lets the binary return io::Result from main
impl From<CodextError> for io::Error {
    fn from(err: CodextError) -> Self {
        let kind = match &err {
            CodextError::Access(_) => io::ErrorKind::PermissionDenied,
            CodextError::Listing { .. } | CodextError::Read { .. } => io::ErrorKind::NotFound,
            CodextError::InvalidPath(_) | CodextError::Config(_) => io::ErrorKind::InvalidInput,
            _ => io::ErrorKind::Other,
        };
        io::Error::new(kind, err.to_string())
    }
}
