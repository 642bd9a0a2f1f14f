//! Server lifecycle coordination
//!
//! [`serve`] owns start-up ordering (open watcher → bind acceptor → emit
//! `start`) and [`Server::close`] owns shutdown ordering (close all live
//! connections → stop accepting → stop watcher → emit `stop`), guarded so
//! the composite shutdown executes at most once.
//!
//! ```text
//! NotStarted → Starting → Running → Stopping → Stopped
//! ```
//!
//! `Stopped` is terminal: no further events are produced and `close`
//! always fails.

use std::sync::{Arc, OnceLock};

use crate::acceptor::WsAcceptor;
use crate::config::{ServeOptions, WatchFailurePolicy};
use crate::dispatcher::Dispatcher;
use crate::error::Result;
use crate::event::LifecycleEvent;
use crate::shutdown::ShutdownGuard;
use crate::watcher::FsWatcher;

/// Handle to a running server
///
/// Cheap to clone; all clones share one server. Exactly one `close` call
/// across all clones ever succeeds.
#[derive(Clone)]
pub struct Server {
    inner: Arc<ServerInner>,
}

struct ServerInner {
    url: String,
    options: ServeOptions,
    dispatcher: Dispatcher,
    guard: Arc<ShutdownGuard>,
    acceptor: Arc<WsAcceptor>,
    watcher: Option<FsWatcher>,
}

/// Start the filesystem watcher and the WebSocket server.
///
/// Returns once the server is running. Bind failures are always fatal; a
/// watch failure is fatal under [`WatchFailurePolicy::FailFast`] and
/// downgraded to an `error` event under [`WatchFailurePolicy::Degraded`].
pub async fn serve(options: ServeOptions) -> Result<Server> {
    let url = format!("ws://{}:{}", options.hostname, options.port);
    let dispatcher = Dispatcher::new(Arc::clone(&options.on_event));
    let guard = Arc::new(ShutdownGuard::new());

    // The watcher opens before the acceptor; its handler reaches the
    // acceptor through this slot once the acceptor is live. No client can
    // connect before the bind, so nothing is lost in between.
    let acceptor_slot: Arc<OnceLock<Arc<WsAcceptor>>> = Arc::new(OnceLock::new());

    let watcher = {
        let dispatcher = dispatcher.clone();
        let slot = Arc::clone(&acceptor_slot);
        FsWatcher::watch(&options.path, move |item| match item {
            Ok(change) => {
                dispatcher.dispatch(LifecycleEvent::fs(&change));
                if let Some(acceptor) = slot.get() {
                    // Broadcast stops once shutdown has begun.
                    let _ = acceptor.send(&change);
                }
            }
            Err(e) => {
                dispatcher.dispatch(LifecycleEvent::error(format!("watch error: {e}")));
            }
        })
    };

    let watcher = match watcher {
        Ok(watcher) => Some(watcher),
        Err(e) => match options.watch_failure {
            WatchFailurePolicy::FailFast => return Err(e),
            WatchFailurePolicy::Degraded => {
                dispatcher.dispatch(LifecycleEvent::error(format!(
                    "running without filesystem events: {e}"
                )));
                None
            }
        },
    };

    let acceptor = match WsAcceptor::bind(
        &options.hostname,
        options.port,
        dispatcher.clone(),
        Arc::clone(&guard),
    )
    .await
    {
        Ok(acceptor) => Arc::new(acceptor),
        Err(e) => {
            // Release the watch before surfacing the bind failure.
            if let Some(watcher) = &watcher {
                watcher.close().await;
            }
            return Err(e);
        }
    };
    let _ = acceptor_slot.set(Arc::clone(&acceptor));

    dispatcher.dispatch(LifecycleEvent::Start { url: url.clone() });
    tracing::debug!("serving on {url}");

    Ok(Server {
        inner: Arc::new(ServerInner {
            url,
            options,
            dispatcher,
            guard,
            acceptor,
            watcher,
        }),
    })
}

impl Server {
    /// The WebSocket URL under which the server accepts connections.
    pub fn url(&self) -> &str {
        &self.inner.url
    }

    /// The complete server options.
    pub fn options(&self) -> &ServeOptions {
        &self.inner.options
    }

    /// Number of currently-open client connections.
    pub fn connection_count(&self) -> usize {
        self.inner.acceptor.connection_count()
    }

    /// Close the server and dispose all resources: every client
    /// connection, then the listener, then the watcher, then a final
    /// `stop` event.
    ///
    /// Exactly one call succeeds for the lifetime of the server; every
    /// later or concurrently racing call fails with
    /// [`ServeError::AlreadyClosed`](crate::ServeError::AlreadyClosed).
    pub async fn close(&self) -> Result<()> {
        self.inner.guard.try_acquire()?;

        self.inner.acceptor.close().await;
        if let Some(watcher) = &self.inner.watcher {
            watcher.close().await;
        }

        self.inner.dispatcher.dispatch(LifecycleEvent::Stop);
        tracing::debug!("server on {} stopped", self.inner.url);
        Ok(())
    }
}
