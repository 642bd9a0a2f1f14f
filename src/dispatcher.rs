//! Event dispatch
//!
//! The single funnel between event producers (acceptor, per-connection
//! tasks, watcher drain) and the configured sink. Producers on different
//! tasks may interleave their calls; each individual call completes before
//! `dispatch` returns.

use crate::config::EventSink;
use crate::event::LifecycleEvent;

/// Fans every lifecycle event into the configured sink
#[derive(Clone)]
pub struct Dispatcher {
    sink: EventSink,
}

impl Dispatcher {
    pub fn new(sink: EventSink) -> Self {
        Self { sink }
    }

    /// Invoke the sink synchronously with `event`, once, in call order.
    pub fn dispatch(&self, event: LifecycleEvent) {
        (self.sink)(event);
    }
}
