//! Byte-level tests for the frame codecs.
//!
//! The golden vectors pin the exact wire layout: any change here breaks
//! every client already deployed. Decoding reads from a plain `&[u8]`,
//! which implements `AsyncRead`.

use murmur_protocol::{
    ChatMessage, Codec, FrameLimits, Handshake, HandshakeResponse, Packet,
    PacketKind, PlainCodec, Presence, ProtocolError, TaggedCodec,
};

// -- Helpers --------------------------------------------------------------

fn handshake(name: &str) -> Packet {
    Packet::Handshake(Handshake {
        username: name.into(),
    })
}

fn message(from: &str, payload: &str, timestamp: i64) -> Packet {
    Packet::Message(ChatMessage {
        from: from.into(),
        payload: payload.into(),
        timestamp,
    })
}

async fn decode_plain(
    bytes: &[u8],
    kind: PacketKind,
) -> Result<Packet, ProtocolError> {
    let mut reader = bytes;
    PlainCodec::default().decode(&mut reader, kind).await
}

// =========================================================================
// Golden vectors
// =========================================================================

#[test]
fn test_encode_handshake_golden_vector() {
    let bytes = PlainCodec::default().encode(&handshake("testuser")).unwrap();
    let mut expected = vec![0, 0, 0, 8];
    expected.extend_from_slice(b"testuser");
    assert_eq!(bytes, expected);
}

#[test]
fn test_encode_handshake_response_golden_vector() {
    let packet = Packet::HandshakeResponse(HandshakeResponse {
        online_users: vec!["user1".into(), "user2".into()],
    });
    let bytes = PlainCodec::default().encode(&packet).unwrap();

    let mut expected = vec![0, 0, 0, 2, 0, 0, 0, 5];
    expected.extend_from_slice(b"user1");
    expected.extend_from_slice(&[0, 0, 0, 5]);
    expected.extend_from_slice(b"user2");
    assert_eq!(bytes, expected);
}

#[test]
fn test_encode_message_golden_vector() {
    let bytes = PlainCodec::default()
        .encode(&message("testuser", "Hello, world!", 256))
        .unwrap();

    let mut expected = vec![0, 0, 0, 8];
    expected.extend_from_slice(b"testuser");
    expected.extend_from_slice(&[0, 0, 0, 0x0d]);
    expected.extend_from_slice(b"Hello, world!");
    expected.extend_from_slice(&[0, 0, 0, 0, 0, 0, 1, 0]);
    assert_eq!(bytes, expected);
}

#[test]
fn test_encode_presence_golden_vector() {
    let packet = Packet::Presence(Presence {
        username: "testuser".into(),
        online: true,
    });
    let bytes = PlainCodec::default().encode(&packet).unwrap();

    let mut expected = vec![0, 0, 0, 8];
    expected.extend_from_slice(b"testuser");
    expected.push(1);
    assert_eq!(bytes, expected);
}

#[tokio::test]
async fn test_decode_message_golden_vector() {
    let mut data = vec![0, 0, 0, 8];
    data.extend_from_slice(b"testuser");
    data.extend_from_slice(&[0, 0, 0, 13]);
    data.extend_from_slice(b"Hello, world!");
    data.extend_from_slice(&[0, 0, 0, 0, 0, 0, 1, 1]);

    let packet = decode_plain(&data, PacketKind::Message).await.unwrap();
    assert_eq!(packet, message("testuser", "Hello, world!", 257));
}

// =========================================================================
// Round trips and edge values
// =========================================================================

#[tokio::test]
async fn test_round_trip_every_kind_through_one_stream() {
    // Frames are self-delimiting: several back to back decode in order.
    let codec = PlainCodec::default();
    let packets = [
        handshake("ann"),
        Packet::HandshakeResponse(HandshakeResponse {
            online_users: vec!["bob".into(), "cy".into()],
        }),
        message("ann", "héllo wörld ✓", 1_700_000_000),
        Packet::Presence(Presence {
            username: "bob".into(),
            online: false,
        }),
    ];

    let mut stream = Vec::new();
    for p in &packets {
        stream.extend(codec.encode(p).unwrap());
    }

    let mut reader = stream.as_slice();
    for p in &packets {
        let decoded = codec.decode(&mut reader, p.kind()).await.unwrap();
        assert_eq!(&decoded, p);
    }
    assert!(reader.is_empty(), "every byte should be consumed");
}

#[tokio::test]
async fn test_empty_strings_and_empty_user_list() {
    let codec = PlainCodec::default();

    let empty_list = Packet::HandshakeResponse(HandshakeResponse {
        online_users: vec![],
    });
    let bytes = codec.encode(&empty_list).unwrap();
    assert_eq!(bytes, [0, 0, 0, 0], "count only, no trailing bytes");
    let decoded = decode_plain(&bytes, PacketKind::HandshakeResponse)
        .await
        .unwrap();
    assert_eq!(decoded, empty_list);

    let empty_msg = message("", "", 0);
    let bytes = codec.encode(&empty_msg).unwrap();
    assert_eq!(bytes.len(), 4 + 4 + 8);
    let decoded = decode_plain(&bytes, PacketKind::Message).await.unwrap();
    assert_eq!(decoded, empty_msg);
}

#[tokio::test]
async fn test_negative_timestamp_survives_unsigned_field() {
    let codec = PlainCodec::default();
    let packet = message("a", "b", -1);
    let bytes = codec.encode(&packet).unwrap();
    assert_eq!(&bytes[bytes.len() - 8..], &[0xff; 8]);

    let decoded = decode_plain(&bytes, PacketKind::Message).await.unwrap();
    assert_eq!(decoded, packet);
}

#[tokio::test]
async fn test_presence_status_other_than_one_is_offline() {
    let mut data = vec![0, 0, 0, 3];
    data.extend_from_slice(b"bob");
    data.push(7);

    let packet = decode_plain(&data, PacketKind::Presence).await.unwrap();
    assert_eq!(
        packet,
        Packet::Presence(Presence {
            username: "bob".into(),
            online: false,
        })
    );
}

// =========================================================================
// End-of-stream handling
// =========================================================================

#[tokio::test]
async fn test_decode_empty_stream_is_closed() {
    let result = decode_plain(&[], PacketKind::Message).await;
    assert!(matches!(result, Err(ProtocolError::Closed)));
}

#[tokio::test]
async fn test_decode_partial_length_prefix_is_truncated() {
    let result = decode_plain(&[0, 0], PacketKind::Handshake).await;
    assert!(matches!(result, Err(ProtocolError::Truncated)));
}

#[tokio::test]
async fn test_decode_short_payload_is_truncated() {
    // Declares 8 bytes, delivers 3.
    let result = decode_plain(&[0, 0, 0, 8, b'a', b'b', b'c'], PacketKind::Handshake).await;
    assert!(matches!(result, Err(ProtocolError::Truncated)));
}

#[tokio::test]
async fn test_decode_presence_missing_status_is_truncated() {
    let mut data = vec![0, 0, 0, 3];
    data.extend_from_slice(b"bob");
    let result = decode_plain(&data, PacketKind::Presence).await;
    assert!(matches!(result, Err(ProtocolError::Truncated)));
}

#[test]
fn test_terminal_errors_are_classified() {
    assert!(ProtocolError::Closed.is_terminal());
    assert!(ProtocolError::Truncated.is_terminal());
    assert!(!ProtocolError::InvalidUtf8 { field: "from" }.is_terminal());
    assert!(!ProtocolError::UnknownKind(9).is_terminal());
}

// =========================================================================
// Limits and malformed input
// =========================================================================

#[tokio::test]
async fn test_decode_oversized_length_is_rejected_without_reading_body() {
    // u32::MAX length prefix and no body: must fail on the prefix alone.
    let result =
        decode_plain(&[0xff, 0xff, 0xff, 0xff], PacketKind::Handshake).await;
    match result {
        Err(ProtocolError::FieldTooLarge { field, len, max }) => {
            assert_eq!(field, "username");
            assert_eq!(len, u32::MAX);
            assert_eq!(max, FrameLimits::default().max_field_len);
        }
        other => panic!("expected FieldTooLarge, got {other:?}"),
    }
}

#[tokio::test]
async fn test_decode_respects_custom_limits() {
    let codec = PlainCodec::with_limits(FrameLimits {
        max_field_len: 4,
        max_entries: 1,
    });

    let mut ok = vec![0, 0, 0, 4];
    ok.extend_from_slice(b"four");
    let mut reader = ok.as_slice();
    assert!(codec.decode(&mut reader, PacketKind::Handshake).await.is_ok());

    let mut long = vec![0, 0, 0, 5];
    long.extend_from_slice(b"fiver");
    let mut reader = long.as_slice();
    assert!(matches!(
        codec.decode(&mut reader, PacketKind::Handshake).await,
        Err(ProtocolError::FieldTooLarge { len: 5, max: 4, .. })
    ));

    let mut reader: &[u8] = &[0, 0, 0, 2];
    assert!(matches!(
        codec.decode(&mut reader, PacketKind::HandshakeResponse).await,
        Err(ProtocolError::TooManyEntries { count: 2, max: 1 })
    ));
}

#[test]
fn test_encode_refuses_what_the_peer_would_reject() {
    let codec = PlainCodec::with_limits(FrameLimits {
        max_field_len: 4,
        max_entries: 8,
    });
    let result = codec.encode(&message("ann", "too long", 0));
    assert!(matches!(
        result,
        Err(ProtocolError::EncodeTooLarge { field: "payload", len: 8 })
    ));
}

#[tokio::test]
async fn test_decode_invalid_utf8_consumes_the_frame() {
    let mut data = vec![0, 0, 0, 2, 0xc3, 0x28];
    // A valid frame right behind it must still decode.
    data.extend(PlainCodec::default().encode(&handshake("ok")).unwrap());

    let codec = PlainCodec::default();
    let mut reader = data.as_slice();
    assert!(matches!(
        codec.decode(&mut reader, PacketKind::Handshake).await,
        Err(ProtocolError::InvalidUtf8 { field: "username" })
    ));
    let next = codec.decode(&mut reader, PacketKind::Handshake).await;
    assert_eq!(next.unwrap(), handshake("ok"));
}

// =========================================================================
// TaggedCodec
// =========================================================================

#[test]
fn test_tagged_encode_prefixes_discriminant() {
    let plain = PlainCodec::default().encode(&handshake("testuser")).unwrap();
    let tagged = TaggedCodec::default().encode(&handshake("testuser")).unwrap();
    assert_eq!(tagged[0], PacketKind::Handshake.tag());
    assert_eq!(&tagged[1..], plain.as_slice());
}

#[tokio::test]
async fn test_tagged_decode_any_needs_no_context() {
    let codec = TaggedCodec::default();
    let packet = Packet::Presence(Presence {
        username: "cy".into(),
        online: true,
    });
    let bytes = codec.encode(&packet).unwrap();

    let mut reader = bytes.as_slice();
    assert_eq!(codec.decode_any(&mut reader).await.unwrap(), packet);
}

#[tokio::test]
async fn test_tagged_wrong_kind_is_reported_and_stream_stays_aligned() {
    let codec = TaggedCodec::default();
    let mut data = codec.encode(&handshake("ann")).unwrap();
    data.extend(codec.encode(&message("ann", "hi", 5)).unwrap());

    let mut reader = data.as_slice();
    let first = codec.decode(&mut reader, PacketKind::Message).await;
    assert!(matches!(
        first,
        Err(ProtocolError::UnexpectedKind {
            expected: PacketKind::Message,
            found: PacketKind::Handshake,
        })
    ));

    let second = codec.decode(&mut reader, PacketKind::Message).await;
    assert_eq!(second.unwrap(), message("ann", "hi", 5));
}

#[tokio::test]
async fn test_tagged_unknown_tag_is_rejected() {
    let codec = TaggedCodec::default();
    let mut reader: &[u8] = &[0x2a, 0, 0, 0, 0];
    assert!(matches!(
        codec.decode_any(&mut reader).await,
        Err(ProtocolError::UnknownKind(0x2a))
    ));
}

#[tokio::test]
async fn test_decode_frame_returns_concrete_type() {
    let codec = PlainCodec::default();
    let bytes = codec.encode(&message("ann", "typed", 9)).unwrap();
    let mut reader = bytes.as_slice();

    let msg: ChatMessage = codec.decode_frame(&mut reader).await.unwrap();
    assert_eq!(msg.payload, "typed");
}
