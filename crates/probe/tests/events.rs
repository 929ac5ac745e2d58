//! Integration tests driving the probe against scripted local servers.

use futures::{SinkExt, StreamExt};
use probe::{connect, ProbeConfig, ProbeEvent};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::handshake::server::{Request, Response};
use tokio_tungstenite::tungstenite::Message;

fn test_config(addr: SocketAddr) -> ProbeConfig {
    ProbeConfig {
        url: format!("ws://{}/ws", addr),
        username: None,
        ..ProbeConfig::default()
    }
}

async fn bind() -> (TcpListener, SocketAddr) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    (listener, addr)
}

#[tokio::test]
async fn test_payload_sent_once_after_open() {
    let (listener, addr) = bind().await;

    // Scripted peer: accept, read one frame, reply "ack", close, then count
    // any further data frames until the stream ends.
    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        let first = ws.next().await.unwrap().unwrap();
        ws.send(Message::Text("ack".to_string())).await.unwrap();
        ws.send(Message::Close(None)).await.unwrap();
        let mut extra_data_frames = 0;
        while let Some(Ok(msg)) = ws.next().await {
            if matches!(msg, Message::Text(_) | Message::Binary(_)) {
                extra_data_frames += 1;
            }
        }
        (first, extra_data_frames)
    });

    let mut probe = connect(test_config(addr)).await.unwrap();
    assert!(matches!(
        probe.next_event().await,
        Some(ProbeEvent::Connected)
    ));
    match probe.next_event().await {
        Some(ProbeEvent::Inbound(text)) => assert_eq!(text, "ack"),
        other => panic!("expected inbound ack, got {:?}", other),
    }
    assert!(matches!(probe.next_event().await, Some(ProbeEvent::Closed)));
    assert!(probe.next_event().await.is_none());

    let (first, extra_data_frames) = server.await.unwrap();
    assert_eq!(first, Message::Text("Hello from Node.js!".to_string()));
    assert_eq!(extra_data_frames, 0);
}

#[tokio::test]
async fn test_refused_connection_is_an_error() {
    let (listener, addr) = bind().await;
    drop(listener);

    let mut config = test_config(addr);
    config.connect_timeout = Duration::from_secs(1);
    assert!(connect(config).await.is_err());
}

#[tokio::test]
async fn test_inbound_frames_arrive_in_receipt_order() {
    let (listener, addr) = bind().await;

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        let _ = ws.next().await;
        for text in ["one", "two", "three"] {
            ws.send(Message::Text(text.to_string())).await.unwrap();
        }
        ws.send(Message::Close(None)).await.unwrap();
        while ws.next().await.is_some() {}
    });

    let mut probe = connect(test_config(addr)).await.unwrap();
    assert!(matches!(
        probe.next_event().await,
        Some(ProbeEvent::Connected)
    ));
    for expected in ["one", "two", "three"] {
        match probe.next_event().await {
            Some(ProbeEvent::Inbound(text)) => assert_eq!(text, expected),
            other => panic!("expected inbound {:?}, got {:?}", expected, other),
        }
    }
    assert!(matches!(probe.next_event().await, Some(ProbeEvent::Closed)));
    assert!(probe.next_event().await.is_none());
}

#[tokio::test]
async fn test_server_ping_answered_with_pong_and_not_surfaced() {
    let (listener, addr) = bind().await;

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        let _ = ws.next().await;
        ws.send(Message::Ping(b"hb".to_vec())).await.unwrap();
        // Wait for the pong before closing.
        let mut pong = None;
        while let Some(Ok(msg)) = ws.next().await {
            if let Message::Pong(data) = msg {
                pong = Some(data);
                break;
            }
        }
        ws.send(Message::Close(None)).await.unwrap();
        while ws.next().await.is_some() {}
        pong
    });

    let mut probe = connect(test_config(addr)).await.unwrap();
    assert!(matches!(
        probe.next_event().await,
        Some(ProbeEvent::Connected)
    ));
    // Control frames are protocol plumbing; the next event is the close.
    assert!(matches!(probe.next_event().await, Some(ProbeEvent::Closed)));
    assert!(probe.next_event().await.is_none());

    assert_eq!(server.await.unwrap(), Some(b"hb".to_vec()));
}

#[tokio::test]
async fn test_abrupt_disconnect_yields_one_error() {
    let (listener, addr) = bind().await;

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        let _ = ws.next().await;
        // Drop without a close handshake.
    });

    let mut probe = connect(test_config(addr)).await.unwrap();
    assert!(matches!(
        probe.next_event().await,
        Some(ProbeEvent::Connected)
    ));
    assert!(matches!(
        probe.next_event().await,
        Some(ProbeEvent::Error(_))
    ));
    assert!(probe.next_event().await.is_none());
}

#[tokio::test]
async fn test_username_lands_on_the_request_uri() {
    let (listener, addr) = bind().await;

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut captured_uri = String::new();
        let mut ws = tokio_tungstenite::accept_hdr_async(stream, |req: &Request, resp: Response| {
            captured_uri = req.uri().to_string();
            Ok(resp)
        })
        .await
        .unwrap();
        let _ = ws.next().await;
        ws.send(Message::Close(None)).await.unwrap();
        while ws.next().await.is_some() {}
        captured_uri
    });

    let mut config = test_config(addr);
    config.username = Some("admin".to_string());
    let mut probe = connect(config).await.unwrap();
    while probe.next_event().await.is_some() {}

    let uri = server.await.unwrap();
    assert!(uri.contains("username=admin"), "uri was {}", uri);
}
