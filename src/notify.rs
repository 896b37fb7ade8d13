/*!
 * Notification side channel
 *
 * The tree store and the bundle writer never report user-facing conditions
 * through their return values alone; they also push a [`Notice`] to an
 * injected [`Notifier`], which a front end can turn into toasts or log lines.
 */

use std::fmt;

use tracing::{info, warn};

use crate::types::PathKey;

/// A user-facing event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// The backend could not be engaged
    AccessDenied(String),
    /// One directory could not be listed
    ListingFailed { path: PathKey, reason: String },
    /// Aggregate of per-file failures in one operation
    ReadFailures { count: usize },
    /// A batch selection started; interaction should be disabled
    BatchStarted { path: PathKey },
    /// A batch selection finished
    BatchFinished { path: PathKey, files: usize },
    /// The bundle was copied to the clipboard
    Copied,
    /// Copying to the clipboard failed
    CopyFailed(String),
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::AccessDenied(reason) => write!(f, "Cannot open directory: {}", reason),
            Notice::ListingFailed { path, reason } => {
                write!(f, "Failed to load {}: {}", path, reason)
            }
            Notice::ReadFailures { count } => {
                write!(f, "{} file(s) could not be read and were skipped", count)
            }
            Notice::BatchStarted { path } => write!(f, "Updating selection under {}", path),
            Notice::BatchFinished { path, files } => {
                write!(f, "Updated {} file(s) under {}", files, path)
            }
            Notice::Copied => f.write_str("Prompt copied to clipboard"),
            Notice::CopyFailed(reason) => write!(f, "Failed to copy to clipboard: {}", reason),
        }
    }
}

/// Sink for notices
pub trait Notifier {
    fn notify(&self, notice: &Notice);
}

impl<F> Notifier for F
where
    F: Fn(&Notice),
{
    fn notify(&self, notice: &Notice) {
        self(notice)
    }
}

/// Forwards notices to `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notice: &Notice) {
        match notice {
            Notice::AccessDenied(_)
            | Notice::ListingFailed { .. }
            | Notice::ReadFailures { .. }
            | Notice::CopyFailed(_) => warn!("{}", notice),
            _ => info!("{}", notice),
        }
    }
}

/// Drops every notice
#[derive(Debug, Default, Clone, Copy)]
pub struct NullNotifier;

impl Notifier for NullNotifier {
    fn notify(&self, _notice: &Notice) {}
}
