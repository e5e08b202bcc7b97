//! Error types
//!
//! Every failure the backend can report is an [`Error`]. Variants are grouped
//! by [`ErrorKind`] so callers can tell a dead display server apart from a
//! typo in a window name.

use wayland_client::backend::WaylandError;
use wayland_client::{ConnectError, DispatchError};

/// Result alias used throughout the crate
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Broad classification of an [`Error`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bootstrap failed; the backend never becomes available
    Setup,
    /// A system or connection resource failed during an operation
    Resource,
    /// The server sent something unusable; the feature degrades
    Protocol,
    /// The call referred to something that does not exist or cannot run now
    Lookup,
}

/// Backend errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to connect to the display server: {0}")]
    Connect(#[from] ConnectError),
    #[error("display server does not advertise `{0}`")]
    MissingGlobal(&'static str),
    #[error("display server does not support the XRGB8888 shm format")]
    MissingShmFormat,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("event loop error: {0}")]
    EventLoop(#[from] calloop::Error),
    #[error("wayland connection error: {0}")]
    Wayland(#[from] WaylandError),
    #[error("protocol dispatch failed: {0}")]
    Dispatch(#[from] DispatchError),

    #[error("keymap unusable: {0}")]
    Keymap(String),

    #[error("no window named `{0}`")]
    NoSuchWindow(String),
    #[error("invalid image: {0}")]
    InvalidImage(&'static str),
    #[error("window backend is not available")]
    Unavailable,
    #[error("window backend called from inside one of its own callbacks")]
    Reentrant,
}

impl Error {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Connect(_) | Error::MissingGlobal(_) | Error::MissingShmFormat => {
                ErrorKind::Setup
            }
            Error::Io(_) | Error::EventLoop(_) | Error::Wayland(_) | Error::Dispatch(_) => {
                ErrorKind::Resource
            }
            Error::Keymap(_) => ErrorKind::Protocol,
            Error::NoSuchWindow(_)
            | Error::InvalidImage(_)
            | Error::Unavailable
            | Error::Reentrant => ErrorKind::Lookup,
        }
    }
}

impl From<rustix::io::Errno> for Error {
    fn from(errno: rustix::io::Errno) -> Self {
        Error::Io(errno.into())
    }
}
