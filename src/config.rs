//! Server configuration
//!
//! [`ServeOptions`] mirrors the construction contract: every field has a
//! default, and the whole struct is immutable once handed to
//! [`serve`](crate::serve).

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use crate::event::LifecycleEvent;

/// Callback that receives every lifecycle event, in dispatch order.
pub type EventSink = Arc<dyn Fn(LifecycleEvent) + Send + Sync>;

/// What `serve` does when the recursive filesystem watch cannot be
/// established.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WatchFailurePolicy {
    /// `serve` returns the watch error and the server never starts.
    #[default]
    FailFast,
    /// The failure is dispatched as an `error` event and the server runs
    /// without filesystem events; connections still work.
    Degraded,
}

/// Options for [`serve`](crate::serve)
///
/// ```
/// use watchcast::ServeOptions;
///
/// let options = ServeOptions {
///     port: 4321,
///     ..Default::default()
/// };
/// assert_eq!(options.hostname, "localhost");
/// ```
#[derive(Clone)]
pub struct ServeOptions {
    /// The hostname for accepting new connections.
    pub hostname: String,
    /// The port for accepting new connections.
    pub port: u16,
    /// The path that is watched for filesystem events.
    pub path: PathBuf,
    /// Receives every lifecycle event.
    pub on_event: EventSink,
    /// Behavior when the watch cannot be established at start-up.
    pub watch_failure: WatchFailurePolicy,
}

impl Default for ServeOptions {
    fn default() -> Self {
        Self {
            hostname: "localhost".to_string(),
            port: 1234,
            path: PathBuf::from("."),
            on_event: default_sink(),
            watch_failure: WatchFailurePolicy::default(),
        }
    }
}

impl fmt::Debug for ServeOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServeOptions")
            .field("hostname", &self.hostname)
            .field("port", &self.port)
            .field("path", &self.path)
            .field("watch_failure", &self.watch_failure)
            .finish_non_exhaustive()
    }
}

/// The default sink: panics on `error` events, ignores everything else.
///
/// Callers that want to survive per-connection or watcher failures must
/// supply their own sink; silent failure is not an option.
pub fn default_sink() -> EventSink {
    Arc::new(|event| {
        if let LifecycleEvent::Error { message } = event {
            panic!("watchcast server error: {message}");
        }
    })
}
