//! Filesystem watcher adapter
//!
//! Wraps a recursive `notify` watch into a single ordered stream of
//! [`FsChange`] values delivered to a handler.
//!
//! ```text
//! ┌─────────────┐     ┌───────────────┐     ┌─────────────┐
//! │   notify    │────>│ channel drain │────>│   handler   │
//! │   watcher   │     │  (one task)   │     │             │
//! └─────────────┘     └───────────────┘     └─────────────┘
//! ```
//!
//! Events pass through exactly as the OS reports them: no reordering, no
//! deduplication, no debouncing. The single drain task preserves report
//! order.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::{Result, ServeError};
use crate::event::FsChange;

/// Item delivered to the watch handler: a change, or a runtime failure of
/// the underlying notification source.
pub type WatchResult = std::result::Result<FsChange, notify::Error>;

/// Recursive filesystem watcher with an idempotent close
pub struct FsWatcher {
    watcher: Mutex<Option<RecommendedWatcher>>,
    drain: Mutex<Option<JoinHandle<()>>>,
    closed: AtomicBool,
}

impl FsWatcher {
    /// Begin recursive observation of `path`.
    ///
    /// `handler` is invoked once per change, in OS report order. A watch
    /// that cannot be established fails here, at the caller.
    pub fn watch<F>(path: &Path, handler: F) -> Result<Self>
    where
        F: Fn(WatchResult) + Send + 'static,
    {
        let (tx, mut rx) = mpsc::unbounded_channel();

        let mut watcher =
            notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
                let _ = tx.send(res.map(FsChange::from_notify));
            })
            .map_err(|source| ServeError::Watch {
                path: path.to_path_buf(),
                source,
            })?;

        watcher
            .watch(path, RecursiveMode::Recursive)
            .map_err(|source| ServeError::Watch {
                path: path.to_path_buf(),
                source,
            })?;

        let drain = tokio::spawn(async move {
            while let Some(item) = rx.recv().await {
                handler(item);
            }
        });

        Ok(Self {
            watcher: Mutex::new(Some(watcher)),
            drain: Mutex::new(Some(drain)),
            closed: AtomicBool::new(false),
        })
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Stop observation. Idempotent; the underlying OS watch is released
    /// at most once, and once this returns the handler is never invoked
    /// again.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        // Dropping the watcher releases the OS watch and closes the
        // channel feeding the drain task.
        drop(self.watcher.lock().take());

        let drain = self.drain.lock().take();
        if let Some(drain) = drain {
            let _ = drain.await;
        }
    }
}
