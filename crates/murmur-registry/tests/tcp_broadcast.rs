//! Registry and broadcast over real TCP sinks.

use std::sync::Arc;
use std::time::Duration;

use murmur_protocol::{ChatMessage, Codec, Packet, PacketKind, PlainCodec};
use murmur_registry::{DeliveryError, Registry};
use murmur_transport::{
    ConnectionReader, FrameSink, TcpConnection, TcpSink, TcpTransport,
    Transport,
};

/// Opens one loopback connection and returns (server-side sink, client reader).
async fn pair(transport: &mut TcpTransport) -> (TcpSink, ConnectionReader) {
    let addr = transport.local_addr().unwrap().to_string();
    let client = tokio::spawn(async move { TcpConnection::connect(&addr).await });
    let server = transport.accept().await.expect("accept");
    let client = client.await.unwrap().expect("connect");

    let (_server_reader, server_sink) = server.into_split(None);
    let (client_reader, _client_sink) = client.into_split(None);
    (server_sink, client_reader)
}

async fn read_message(reader: &mut ConnectionReader) -> ChatMessage {
    let codec = PlainCodec::default();
    let packet = tokio::time::timeout(
        Duration::from_secs(2),
        codec.decode(reader, PacketKind::Message),
    )
    .await
    .expect("frame should arrive")
    .expect("frame should decode");
    ChatMessage::try_from(packet).unwrap()
}

#[tokio::test]
async fn test_broadcast_over_tcp_skips_closed_peer() {
    let mut transport = TcpTransport::bind("127.0.0.1:0").await.unwrap();
    let registry = Registry::new();

    let (alice_sink, mut alice_reader) = pair(&mut transport).await;
    let (bob_sink, _bob_reader) = pair(&mut transport).await;
    let (carol_sink, mut carol_reader) = pair(&mut transport).await;

    registry.try_register("alice", Arc::new(alice_sink)).await.unwrap();
    let bob_sink = Arc::new(bob_sink);
    registry.try_register("bob", Arc::clone(&bob_sink)).await.unwrap();
    registry.try_register("carol", Arc::new(carol_sink)).await.unwrap();

    // Bob's socket goes away without deregistering.
    bob_sink.close().await.unwrap();

    let codec = PlainCodec::default();
    let packet = Packet::Message(ChatMessage {
        from: "CHAT".into(),
        payload: "hello all".into(),
        timestamp: 42,
    });
    let targets = registry.snapshot_keys().await;
    let report = registry.broadcast(&codec, &packet, &targets).await.unwrap();

    assert_eq!(report.delivered, vec!["alice", "carol"]);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].username, "bob");
    assert!(matches!(report.failed[0].reason, DeliveryError::Send(_)));

    assert_eq!(read_message(&mut alice_reader).await.payload, "hello all");
    assert_eq!(read_message(&mut carol_reader).await.timestamp, 42);
}

#[tokio::test]
async fn test_concurrent_broadcasts_never_interleave_frames() {
    let mut transport = TcpTransport::bind("127.0.0.1:0").await.unwrap();
    let registry = Arc::new(Registry::new());

    let (sink, mut reader) = pair(&mut transport).await;
    registry.try_register("target", Arc::new(sink)).await.unwrap();

    // Several senders hammer the same recipient at once. Large payloads
    // make a torn write likely if the sink didn't serialize writers.
    let payload = "x".repeat(32 * 1024);
    let expected_len = payload.len();

    // Drain concurrently so the senders never block on a full socket.
    let drain = tokio::spawn(async move {
        let mut last_seen = std::collections::HashMap::new();
        for _ in 0..32 {
            let msg = read_message(&mut reader).await;
            assert_eq!(msg.payload.len(), expected_len);
            // Per-sender order is preserved.
            if let Some(prev) = last_seen.insert(msg.from.clone(), msg.timestamp)
            {
                assert!(msg.timestamp > prev);
            }
        }
        last_seen.len()
    });

    let mut handles = Vec::new();
    for sender in 0..8 {
        let registry = Arc::clone(&registry);
        let payload = payload.clone();
        handles.push(tokio::spawn(async move {
            let codec = PlainCodec::default();
            for n in 0..4 {
                let packet = Packet::Message(ChatMessage {
                    from: format!("s{sender}"),
                    payload: payload.clone(),
                    timestamp: n,
                });
                let report = registry
                    .broadcast(&codec, &packet, &["target".to_string()])
                    .await
                    .unwrap();
                assert!(report.is_complete());
            }
        }));
    }
    for h in handles {
        h.await.unwrap();
    }

    assert_eq!(drain.await.unwrap(), 8, "every sender was heard");
}
