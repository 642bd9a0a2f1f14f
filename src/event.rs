//! Lifecycle and filesystem event types
//!
//! [`LifecycleEvent`] is the complete vocabulary the server exposes to its
//! event sink; [`FsChange`] is the payload fanned out to connected clients.
//!
//! All serialized forms are JSON with a `type`/`kind` discriminant:
//!
//! ```json
//! {"type":"connect","count":2}
//! {"kind":"create","paths":["/tmp/demo/test.txt"]}
//! ```

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Kind of filesystem change reported by the watcher
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FsChangeKind {
    Create,
    Modify,
    Remove,
    Other,
}

/// One filesystem change event
///
/// Produced by the watcher in the order the OS reports changes and fanned
/// out verbatim: no reordering, no deduplication, no debouncing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FsChange {
    pub kind: FsChangeKind,
    pub paths: Vec<PathBuf>,
}

impl FsChange {
    pub(crate) fn from_notify(event: notify::Event) -> Self {
        use notify::EventKind;

        let kind = match event.kind {
            EventKind::Create(_) => FsChangeKind::Create,
            EventKind::Modify(_) => FsChangeKind::Modify,
            EventKind::Remove(_) => FsChangeKind::Remove,
            _ => FsChangeKind::Other,
        };

        Self {
            kind,
            paths: event.paths,
        }
    }
}

/// Server lifecycle event
///
/// Every event the server produces passes through the dispatcher as one of
/// these variants. Consumers are expected to match exhaustively.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LifecycleEvent {
    /// The watcher and the acceptor are both live.
    Start { url: String },
    /// The server has fully shut down. Always the final event.
    Stop,
    /// A client completed the WebSocket handshake. `count` is the number
    /// of open connections including this one.
    Connect { count: usize },
    /// A client closed its connection cleanly. `count` is the number of
    /// connections still open.
    Disconnect { count: usize },
    /// A filesystem change under the watched root.
    Fs {
        kind: FsChangeKind,
        paths: Vec<PathBuf>,
    },
    /// A recovered failure: handshake error, transport error, or watcher
    /// runtime error. The default sink treats these as fatal.
    Error { message: String },
}

impl LifecycleEvent {
    pub(crate) fn fs(change: &FsChange) -> Self {
        Self::Fs {
            kind: change.kind,
            paths: change.paths.clone(),
        }
    }

    pub(crate) fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }
}
