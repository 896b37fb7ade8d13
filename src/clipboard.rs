/*!
 * Clipboard support for codext
 *
 * Pipes a finished bundle into whichever clipboard command the system
 * provides.
 */

use std::env;
use std::io::{self, Write};
use std::path::Path;
use std::process::{Command, Stdio};

use once_cell::sync::Lazy;
use thiserror::Error;
use tracing::debug;

use crate::notify::{Notice, Notifier};

/// Error type for clipboard operations
#[derive(Error, Debug)]
pub enum ClipboardError {
    #[error("Command failed: {0}")]
    CommandFailed(String),

    #[error("No suitable clipboard mechanism found")]
    NoClipboardFound,

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, ClipboardError>;

/// Clipboard commands, in order of preference
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClipboardProvider {
    Tmux,
    Wayland,
    Xsel,
    Xclip,
    MacOS,
    Wsl,
    Termux,
}

impl ClipboardProvider {
    /// Program and arguments that read the clipboard text from stdin
    pub fn command(&self) -> (&'static str, &'static [&'static str]) {
        match self {
            Self::Tmux => ("tmux", &["load-buffer", "-w", "-"]),
            Self::Wayland => ("wl-copy", &[]),
            Self::Xsel => ("xsel", &["-b", "-i"]),
            Self::Xclip => ("xclip", &["-selection", "clipboard", "-in"]),
            Self::MacOS => ("pbcopy", &[]),
            Self::Wsl => ("clip.exe", &[]),
            Self::Termux => ("termux-clipboard-set", &[]),
        }
    }

    pub fn copy(&self, text: &str) -> Result<()> {
        let (cmd, args) = self.command();
        execute_clipboard_command(cmd, args, text)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Platform {
    MacOS,
    Wsl,
    Linux,
    Android,
    Other,
}

static PLATFORM: Lazy<Platform> = Lazy::new(|| {
    if cfg!(target_os = "macos") {
        Platform::MacOS
    } else if cfg!(target_os = "windows") || env::var("WSL_DISTRO_NAME").is_ok() {
        Platform::Wsl
    } else if cfg!(target_os = "android") {
        Platform::Android
    } else if cfg!(target_os = "linux") {
        Platform::Linux
    } else {
        Platform::Other
    }
});

/// Copy `text` using the first available provider
pub fn copy_to_clipboard(text: &str) -> Result<ClipboardProvider> {
    let mut last_error = None;
    for provider in detect_providers() {
        match provider.copy(text) {
            Ok(()) => {
                debug!("Copied {} bytes with {:?}", text.len(), provider);
                return Ok(provider);
            }
            Err(e) => last_error = Some(e),
        }
    }
    Err(last_error.unwrap_or(ClipboardError::NoClipboardFound))
}

/// Copy `text` and report the outcome to `notifier`
pub fn copy_and_notify(text: &str, notifier: &dyn Notifier) -> bool {
    match copy_to_clipboard(text) {
        Ok(_) => {
            notifier.notify(&Notice::Copied);
            true
        }
        Err(e) => {
            notifier.notify(&Notice::CopyFailed(e.to_string()));
            false
        }
    }
}

/// Check if a command exists on the PATH
pub fn command_exists(command: &str) -> bool {
    env::var_os("PATH")
        .map(|paths| env::split_paths(&paths).any(|dir| Path::new(&dir).join(command).is_file()))
        .unwrap_or(false)
}

/// Providers usable on this system, most preferred first
pub fn detect_providers() -> Vec<ClipboardProvider> {
    let mut providers = Vec::with_capacity(3);

    if env::var("TMUX").is_ok() && command_exists("tmux") {
        providers.push(ClipboardProvider::Tmux);
    }

    let candidates: &[ClipboardProvider] = match *PLATFORM {
        Platform::MacOS => &[ClipboardProvider::MacOS],
        Platform::Wsl => &[ClipboardProvider::Wsl],
        Platform::Linux => &[
            ClipboardProvider::Wayland,
            ClipboardProvider::Xsel,
            ClipboardProvider::Xclip,
        ],
        Platform::Android => &[ClipboardProvider::Termux],
        Platform::Other => &[],
    };

    providers.extend(
        candidates
            .iter()
            .copied()
            .filter(|p| command_exists(p.command().0)),
    );
    providers
}

fn execute_clipboard_command(cmd: &str, args: &[&str], text: &str) -> Result<()> {
    let mut child = Command::new(cmd)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .spawn()
        .map_err(|e| ClipboardError::CommandFailed(format!("Failed to spawn {}: {}", cmd, e)))?;

    {
        let stdin = child.stdin.as_mut().ok_or_else(|| {
            ClipboardError::CommandFailed(format!("Failed to open stdin for {}", cmd))
        })?;
        stdin.write_all(text.as_bytes())?;
    }

    let status = child.wait()?;
    if status.success() {
        Ok(())
    } else {
        Err(ClipboardError::CommandFailed(format!(
            "{} exited with status: {}",
            cmd, status
        )))
    }
}
