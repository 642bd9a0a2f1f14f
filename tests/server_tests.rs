//! Integration tests for the server lifecycle and broadcast engine
//!
//! Each test runs a real server on an ephemeral port against a fresh
//! temporary directory, with a collecting sink instead of the fail-loud
//! default.

mod common;

use std::time::Duration;

use futures_util::StreamExt;
use tempfile::tempdir;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

use common::{free_port, EventLog};
use watchcast::{
    serve, FsChange, FsChangeKind, LifecycleEvent, ServeError, ServeOptions, WatchFailurePolicy,
};

fn options(port: u16, path: &std::path::Path, log: &EventLog) -> ServeOptions {
    ServeOptions {
        hostname: "127.0.0.1".to_string(),
        port,
        path: path.to_path_buf(),
        on_event: log.sink(),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_start_then_close_emits_exactly_start_and_stop() {
    let dir = tempdir().unwrap();
    let log = EventLog::new();
    let port = free_port();

    let server = serve(options(port, dir.path(), &log)).await.unwrap();
    server.close().await.unwrap();

    assert_eq!(
        log.events(),
        vec![
            LifecycleEvent::Start {
                url: format!("ws://127.0.0.1:{port}"),
            },
            LifecycleEvent::Stop,
        ]
    );
}

#[tokio::test]
async fn test_url_is_hostname_and_port() {
    let dir = tempdir().unwrap();
    let log = EventLog::new();
    let port = free_port();

    let server = serve(options(port, dir.path(), &log)).await.unwrap();
    assert_eq!(server.url(), format!("ws://127.0.0.1:{port}"));
    assert_eq!(server.options().port, port);

    server.close().await.unwrap();
}

#[tokio::test]
async fn test_close_twice_always_fails() {
    let dir = tempdir().unwrap();
    let log = EventLog::new();

    let server = serve(options(free_port(), dir.path(), &log)).await.unwrap();
    server.close().await.unwrap();

    assert!(matches!(
        server.close().await,
        Err(ServeError::AlreadyClosed)
    ));
    assert!(matches!(
        server.close().await,
        Err(ServeError::AlreadyClosed)
    ));
}

#[tokio::test]
async fn test_disconnect_reports_remaining_count() {
    let dir = tempdir().unwrap();
    let log = EventLog::new();

    let server = serve(options(free_port(), dir.path(), &log)).await.unwrap();
    let url = server.url().to_string();

    let (mut first, _) = connect_async(&url).await.unwrap();
    let (_second, _) = connect_async(&url).await.unwrap();
    let (_third, _) = connect_async(&url).await.unwrap();

    assert!(
        log.wait_for(|events| {
            events
                .iter()
                .filter(|e| matches!(e, LifecycleEvent::Connect { .. }))
                .count()
                == 3
        })
        .await
    );
    assert_eq!(server.connection_count(), 3);

    first.close(None).await.unwrap();

    assert!(
        log.wait_for(|events| {
            events
                .iter()
                .any(|e| matches!(e, LifecycleEvent::Disconnect { .. }))
        })
        .await
    );

    let disconnects: Vec<_> = log
        .events()
        .into_iter()
        .filter(|e| matches!(e, LifecycleEvent::Disconnect { .. }))
        .collect();
    assert_eq!(disconnects, vec![LifecycleEvent::Disconnect { count: 2 }]);
    assert_eq!(server.connection_count(), 2);

    server.close().await.unwrap();
    assert_eq!(server.connection_count(), 0);
}

#[tokio::test]
async fn test_file_creation_reaches_sink_before_close() {
    let dir = tempdir().unwrap();
    let log = EventLog::new();

    let server = serve(options(free_port(), dir.path(), &log)).await.unwrap();

    let file = dir.path().join("test.txt");
    std::fs::write(&file, "foo").unwrap();

    assert!(
        log.wait_for(|events| {
            events.iter().any(|e| {
                matches!(
                    e,
                    LifecycleEvent::Fs {
                        kind: FsChangeKind::Create,
                        ..
                    }
                )
            })
        })
        .await
    );

    let events = log.events();
    let created = events
        .iter()
        .find_map(|e| match e {
            LifecycleEvent::Fs {
                kind: FsChangeKind::Create,
                paths,
            } => Some(paths),
            _ => None,
        })
        .unwrap();
    assert!(created.iter().any(|p| p.ends_with("test.txt")));

    server.close().await.unwrap();
    assert_eq!(log.events().last(), Some(&LifecycleEvent::Stop));
}

#[tokio::test]
async fn test_clients_receive_fs_payload_as_json() {
    let dir = tempdir().unwrap();
    let log = EventLog::new();

    let server = serve(options(free_port(), dir.path(), &log)).await.unwrap();
    let (mut client, _) = connect_async(server.url()).await.unwrap();

    assert!(
        log.wait_for(|events| {
            events
                .iter()
                .any(|e| matches!(e, LifecycleEvent::Connect { .. }))
        })
        .await
    );

    std::fs::write(dir.path().join("payload.txt"), "foo").unwrap();

    let text = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match client.next().await {
                Some(Ok(Message::Text(text))) => break text,
                Some(Ok(_)) => continue,
                other => panic!("connection ended early: {other:?}"),
            }
        }
    })
    .await
    .expect("no frame within 5s");

    let change: FsChange = serde_json::from_str(&text).unwrap();
    assert_eq!(change.kind, FsChangeKind::Create);
    assert!(change.paths.iter().any(|p| p.ends_with("payload.txt")));

    server.close().await.unwrap();
}

#[tokio::test]
async fn test_no_events_after_close() {
    let dir = tempdir().unwrap();
    let log = EventLog::new();

    let server = serve(options(free_port(), dir.path(), &log)).await.unwrap();
    server.close().await.unwrap();

    let settled = log.len();
    assert_eq!(log.events().last(), Some(&LifecycleEvent::Stop));

    std::fs::write(dir.path().join("late.txt"), "too late").unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;

    assert_eq!(log.len(), settled);
}

#[tokio::test]
async fn test_watch_failure_fail_fast() {
    let dir = tempdir().unwrap();
    let log = EventLog::new();
    let missing = dir.path().join("missing");

    let result = serve(options(free_port(), &missing, &log)).await;
    assert!(matches!(result, Err(ServeError::Watch { .. })));
    assert!(log.events().is_empty());
}

#[tokio::test]
async fn test_watch_failure_degraded_still_serves() {
    let dir = tempdir().unwrap();
    let log = EventLog::new();
    let missing = dir.path().join("missing");

    let mut opts = options(free_port(), &missing, &log);
    opts.watch_failure = WatchFailurePolicy::Degraded;

    let server = serve(opts).await.unwrap();

    let events = log.events();
    assert!(matches!(events[0], LifecycleEvent::Error { .. }));
    assert!(matches!(events[1], LifecycleEvent::Start { .. }));

    // Connections still work without a watcher.
    let (_client, _) = connect_async(server.url()).await.unwrap();
    assert!(
        log.wait_for(|events| {
            events
                .iter()
                .any(|e| matches!(e, LifecycleEvent::Connect { count: 1 }))
        })
        .await
    );

    server.close().await.unwrap();
    assert_eq!(log.events().last(), Some(&LifecycleEvent::Stop));
}
