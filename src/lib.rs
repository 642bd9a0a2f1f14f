//! watchcast: broadcast filesystem change events to WebSocket clients
//!
//! Watches one filesystem root recursively and pushes every change event,
//! as it occurs, to every currently-connected WebSocket client, with no
//! reordering and no debouncing.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                           serve()                            │
//! │                                                              │
//! │  ┌───────────┐  fs events   ┌────────────┐   lifecycle       │
//! │  │ FsWatcher │─────────────>│ Dispatcher │──────────> sink   │
//! │  └───────────┘       │      └────────────┘                   │
//! │                      │             ▲                         │
//! │                      ▼             │ connect/disconnect/err  │
//! │  ┌────────────┐   send()   ┌──────┴─────┐                    │
//! │  │ WsAcceptor │<───────────│ connection │  (one task each)   │
//! │  └────────────┘            │   tasks    │                    │
//! │        │                   └────────────┘                    │
//! │        └──────── ConnectionRegistry ────────┘                │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Shutdown runs at most once, in a fixed order: close all live
//! connections, stop accepting, stop the watcher, emit `stop`.
//!
//! # Example
//!
//! ```ignore
//! use watchcast::{serve, ServeOptions};
//!
//! let server = serve(ServeOptions::default()).await?;
//! assert_eq!(server.url(), "ws://localhost:1234");
//! server.close().await?;
//! ```

pub mod acceptor;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod event;
pub mod registry;
pub mod server;
pub mod shutdown;
pub mod watcher;

// Re-export commonly used types
pub use config::{default_sink, EventSink, ServeOptions, WatchFailurePolicy};
pub use error::{Result, ServeError};
pub use event::{FsChange, FsChangeKind, LifecycleEvent};
pub use registry::{ConnectionId, ConnectionRegistry};
pub use server::{serve, Server};
pub use watcher::FsWatcher;
