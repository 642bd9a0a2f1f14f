//! WebSocket acceptor and broadcast fan-out
//!
//! Owns the listening endpoint and the per-connection tasks.
//!
//! ```text
//! ┌──────────────┐   spawn    ┌──────────────────────────────────┐
//! │ accept loop  │──────────> │ connection task (one per client) │
//! │ (one task)   │            │   handshake → register → select  │
//! └──────────────┘            └──────────────────────────────────┘
//!        │                                   │
//!        └──────────── ConnectionRegistry ───┘
//! ```
//!
//! Every connection runs isolated: a handshake or transport failure tears
//! down that connection only and surfaces as an `error` event. Broadcast
//! frames go through per-connection unbounded queues, so one stalled
//! client never delays the others or the accept loop.
//!
//! Shutdown order is load-bearing: every live connection is closed and
//! settled first, only then does the accept loop stop and release the
//! listener. Closing the listener under open sockets has produced
//! spurious bad-resource failures.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::accept_async;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::dispatcher::Dispatcher;
use crate::error::{Result, ServeError};
use crate::event::{FsChange, LifecycleEvent};
use crate::registry::{ConnectionId, ConnectionRegistry};
use crate::shutdown::ShutdownGuard;

/// How long a closing connection waits for its goodbye frame to flush.
const CLOSE_GRACE: Duration = Duration::from_secs(1);

/// Accepts WebSocket connections and fans events out to them
pub struct WsAcceptor {
    registry: Arc<ConnectionRegistry>,
    guard: Arc<ShutdownGuard>,
    conn_cancel: CancellationToken,
    conn_tasks: TaskTracker,
    accept_cancel: CancellationToken,
    accept_task: Mutex<Option<JoinHandle<()>>>,
}

impl WsAcceptor {
    /// Bind `hostname:port` and start accepting connection upgrades.
    ///
    /// A bind failure is fatal and surfaces here; everything after the
    /// bind runs in background tasks.
    pub async fn bind(
        hostname: &str,
        port: u16,
        dispatcher: Dispatcher,
        guard: Arc<ShutdownGuard>,
    ) -> Result<Self> {
        let addr = format!("{hostname}:{port}");
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| ServeError::Bind { addr, source })?;

        let registry = Arc::new(ConnectionRegistry::new());
        let conn_cancel = CancellationToken::new();
        let conn_tasks = TaskTracker::new();
        let accept_cancel = CancellationToken::new();

        let accept_task = tokio::spawn(accept_loop(
            listener,
            Arc::clone(&registry),
            dispatcher,
            conn_cancel.clone(),
            conn_tasks.clone(),
            accept_cancel.clone(),
        ));

        Ok(Self {
            registry,
            guard,
            conn_cancel,
            conn_tasks,
            accept_cancel,
            accept_task: Mutex::new(Some(accept_task)),
        })
    }

    /// Number of currently-open connections.
    pub fn connection_count(&self) -> usize {
        self.registry.len()
    }

    /// Serialize `change` and push it to every open connection.
    ///
    /// Fails with [`ServeError::ServerClosed`] once the server has been
    /// closed. A queue that is gone mid-broadcast is skipped; its
    /// connection is already tearing down.
    pub fn send(&self, change: &FsChange) -> Result<()> {
        if self.guard.has_run() {
            return Err(ServeError::ServerClosed);
        }

        let payload = serde_json::to_string(change)?;
        for (_, outbound) in self.registry.snapshot() {
            let _ = outbound.send(Message::Text(payload.clone()));
        }
        Ok(())
    }

    /// Close every live connection, wait for all of them to settle, then
    /// stop accepting and release the listener.
    pub async fn close(&self) {
        self.conn_cancel.cancel();
        self.conn_tasks.close();
        self.conn_tasks.wait().await;

        self.accept_cancel.cancel();
        let accept_task = self.accept_task.lock().take();
        if let Some(accept_task) = accept_task {
            let _ = accept_task.await;
        }

        // Connections accepted while the loop was draining saw the
        // cancelled token and are settling now.
        self.conn_tasks.wait().await;
    }
}

async fn accept_loop(
    listener: TcpListener,
    registry: Arc<ConnectionRegistry>,
    dispatcher: Dispatcher,
    conn_cancel: CancellationToken,
    conn_tasks: TaskTracker,
    accept_cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = accept_cancel.cancelled() => break,

            accepted = listener.accept() => match accepted {
                Ok((stream, _addr)) => {
                    conn_tasks.spawn(run_connection(
                        stream,
                        Arc::clone(&registry),
                        dispatcher.clone(),
                        conn_cancel.clone(),
                    ));
                }
                Err(e) => {
                    // An accept failure must never take the loop down.
                    dispatcher.dispatch(LifecycleEvent::error(format!("accept failed: {e}")));
                }
            },
        }
    }
    // The listener drops here, after every connection settled.
}

async fn run_connection(
    stream: TcpStream,
    registry: Arc<ConnectionRegistry>,
    dispatcher: Dispatcher,
    cancel: CancellationToken,
) {
    let peer = stream.peer_addr().ok();

    let ws = tokio::select! {
        _ = cancel.cancelled() => return,

        handshake = accept_async(stream) => match handshake {
            Ok(ws) => ws,
            Err(e) => {
                dispatcher.dispatch(LifecycleEvent::error(format!(
                    "websocket handshake with {peer:?} failed: {e}"
                )));
                return;
            }
        },
    };

    let id = ConnectionId::new();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Message>();
    registry.add(id, outbound_tx);
    dispatcher.dispatch(LifecycleEvent::Connect {
        count: registry.len(),
    });
    tracing::debug!("client {} connected from {:?}", id, peer);

    let (mut sink, mut source) = ws.split();

    loop {
        tokio::select! {
            // Server-initiated close: say goodbye to the peer and leave
            // without a disconnect event. A peer that stopped reading
            // must not be able to stall the shutdown.
            _ = cancel.cancelled() => {
                let _ = tokio::time::timeout(CLOSE_GRACE, async {
                    let _ = sink.send(Message::Close(None)).await;
                    let _ = sink.close().await;
                })
                .await;
                registry.remove(&id);
                return;
            }

            queued = outbound_rx.recv() => match queued {
                Some(frame) => {
                    if let Err(e) = sink.send(frame).await {
                        registry.remove(&id);
                        dispatcher.dispatch(LifecycleEvent::error(format!(
                            "send to {id} failed: {e}"
                        )));
                        return;
                    }
                }
                // The sender lives in the registry until this task
                // removes it; a closed queue means the entry is gone.
                None => {
                    registry.remove(&id);
                    return;
                }
            },

            inbound = source.next() => match inbound {
                Some(Ok(Message::Close(_))) | None => {
                    let _ = sink.send(Message::Close(None)).await;
                    registry.remove(&id);
                    dispatcher.dispatch(LifecycleEvent::Disconnect {
                        count: registry.len(),
                    });
                    tracing::debug!("client {} disconnected", id);
                    return;
                }
                Some(Ok(Message::Ping(data))) => {
                    let _ = sink.send(Message::Pong(data)).await;
                }
                Some(Ok(_)) => {
                    // Inbound payload frames are ignored.
                }
                Some(Err(e)) => {
                    registry.remove(&id);
                    dispatcher.dispatch(LifecycleEvent::error(format!(
                        "connection {id} failed: {e}"
                    )));
                    return;
                }
            },
        }
    }
}
