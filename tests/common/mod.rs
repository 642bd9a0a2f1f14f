//! Common test utilities for watchcast integration tests
//!
//! This module provides:
//! - `EventLog`, a sink that records every dispatched lifecycle event
//! - `free_port` for binding test servers without collisions

#![allow(dead_code)]

use std::net::TcpListener;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use watchcast::{EventSink, LifecycleEvent};

/// Records every dispatched lifecycle event for later assertions.
#[derive(Clone, Default)]
pub struct EventLog {
    events: Arc<Mutex<Vec<LifecycleEvent>>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink that appends each event to this log.
    pub fn sink(&self) -> EventSink {
        let events = Arc::clone(&self.events);
        Arc::new(move |event| events.lock().push(event))
    }

    /// Copy of everything recorded so far.
    pub fn events(&self) -> Vec<LifecycleEvent> {
        self.events.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    /// Wait until `pred` holds for the recorded events, up to 5 seconds.
    pub async fn wait_for<F>(&self, pred: F) -> bool
    where
        F: Fn(&[LifecycleEvent]) -> bool,
    {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            if pred(&self.events.lock()) {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }
}

/// A port the OS just handed out and released.
pub fn free_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .expect("bind ephemeral port")
        .local_addr()
        .expect("local addr")
        .port()
}
