//! End-to-end tests for the gateway: outbound encode-and-send, inbound
//! decode-and-dispatch, and the echo-suppression loop between them.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use hivewire::{EventGateway, HivewireError};
use hivewire_mux::EventMultiplexer;
use hivewire_protocol::{
    codec, EventRegistry, EventSpecification, FieldDescriptor, Message,
    Permissions, Value, WireType,
};
use hivewire_transport::{channel, FrameReceiver};

// =========================================================================
// Fixture: a small colony-game registry
// =========================================================================

fn chat_spec() -> EventSpecification {
    EventSpecification::new(
        1,
        "colony_chat",
        Permissions::all(),
        vec![
            FieldDescriptor::new("channel", WireType::U8),
            FieldDescriptor::new("text", WireType::Str),
        ],
    )
    .unwrap()
}

fn position_spec() -> EventSpecification {
    EventSpecification::new(
        2,
        "ant_position",
        Permissions::all(),
        vec![
            FieldDescriptor::new("ant", WireType::U32),
            FieldDescriptor::new("x", WireType::F64),
            FieldDescriptor::new("y", WireType::F64),
        ],
    )
    .unwrap()
}

fn registry() -> Arc<EventRegistry> {
    Arc::new(EventRegistry::with_specs([chat_spec(), position_spec()]).unwrap())
}

/// One test peer: a multiplexer with an attached gateway, plus the
/// receiver observing its outbound wire.
struct Peer {
    mux: Arc<EventMultiplexer>,
    gateway: EventGateway,
    wire_out: FrameReceiver,
}

fn peer(sender_id: u32) -> Peer {
    let registry = registry();
    let mux = Arc::new(EventMultiplexer::new(sender_id));
    let (sink, wire_out) = channel();
    let gateway = EventGateway::attach(registry, Arc::clone(&mux), sink);
    Peer {
        mux,
        gateway,
        wire_out,
    }
}

// =========================================================================
// Outbound
// =========================================================================

#[tokio::test]
async fn test_local_emit_reaches_the_wire_byte_exact() {
    let mut peer = peer(42);
    let chat = chat_spec();

    peer.mux
        .emit(&chat, vec![Value::U8(3), Value::Str("dig here".into())])
        .await;

    let frame = peer.wire_out.recv().await.unwrap();
    let expected = codec::encode(
        &Message::new(42, 1, vec![Value::U8(3), Value::Str("dig here".into())]),
        &chat,
    )
    .unwrap();
    assert_eq!(frame, expected);
    // Envelope spot-check: sender 42, event 1, both big-endian.
    assert_eq!(&frame[0..8], &[0, 0, 0, 42, 0, 0, 0, 1]);
}

#[tokio::test]
async fn test_every_registered_event_is_bridged() {
    let mut peer = peer(7);

    peer.mux
        .emit(&chat_spec(), vec![Value::U8(0), Value::Str("hi".into())])
        .await;
    peer.mux
        .emit(
            &position_spec(),
            vec![Value::U32(9), Value::F64(1.0), Value::F64(2.0)],
        )
        .await;

    let first = peer.wire_out.recv().await.unwrap();
    let second = peer.wire_out.recv().await.unwrap();
    assert_eq!(codec::decode_header(&first).unwrap().1, 1);
    assert_eq!(codec::decode_header(&second).unwrap().1, 2);
}

#[tokio::test]
async fn test_dropped_gateway_stops_bridging() {
    let mut peer = peer(7);

    drop(peer.gateway);
    let invoked = peer
        .mux
        .emit(&chat_spec(), vec![Value::U8(0), Value::Str("void".into())])
        .await;

    assert_eq!(invoked, 0);
    assert!(peer.wire_out.try_recv().is_none());
    assert!(peer.mux.is_empty());
}

// =========================================================================
// Inbound
// =========================================================================

#[tokio::test]
async fn test_inbound_frame_dispatches_to_local_subscribers() {
    let peer = peer(1);
    let chat = chat_spec();

    let seen = Arc::new(Mutex::new(Vec::new()));
    let seen_clone = Arc::clone(&seen);
    let spec_for_lookup = chat.clone();
    peer.mux.subscribe(&chat, move |msg| {
        let seen = Arc::clone(&seen_clone);
        let spec = spec_for_lookup.clone();
        async move {
            let text = msg
                .field(&spec, "text")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            seen.lock().unwrap().push((msg.sender_id, text));
        }
    });

    // A frame as the server would have encoded it, sender id 555.
    let frame = codec::encode(
        &Message::new(555, 1, vec![Value::U8(0), Value::Str("queen says hi".into())]),
        &chat,
    )
    .unwrap();

    let invoked = peer.gateway.on_binary_frame(&frame).await.unwrap();
    assert_eq!(invoked, 1);
    assert_eq!(
        seen.lock().unwrap().as_slice(),
        &[(555, "queen says hi".to_string())]
    );
}

#[tokio::test]
async fn test_inbound_frame_is_not_echoed_back_to_the_wire() {
    let mut peer = peer(1);

    let frame = codec::encode(
        &Message::new(555, 1, vec![Value::U8(0), Value::Str("no echo".into())]),
        &chat_spec(),
    )
    .unwrap();

    // The gateway's own outbound subscription exists for event 1, but
    // the inbound dispatch carries the gateway's origin tag, so it is
    // suppressed: nothing may appear on the outbound wire.
    let invoked = peer.gateway.on_binary_frame(&frame).await.unwrap();
    assert_eq!(invoked, 0);
    assert!(peer.wire_out.try_recv().is_none());
}

#[tokio::test]
async fn test_inbound_unknown_event_id_is_an_error() {
    let peer = peer(1);

    // Envelope with event id 999 — registry only knows 1 and 2.
    let mut frame = vec![0u8; 8];
    codec::write_u32(&mut frame, 0, 555, codec::Endian::Big).unwrap();
    codec::write_u32(&mut frame, 4, 999, codec::Endian::Big).unwrap();

    match peer.gateway.on_binary_frame(&frame).await {
        Err(HivewireError::UnknownEvent(999)) => {}
        other => panic!("expected UnknownEvent(999), got {other:?}"),
    }
}

#[tokio::test]
async fn test_inbound_truncated_frame_is_a_codec_error() {
    let peer = peer(1);

    // Valid envelope for the position event, but the payload is missing.
    let mut frame = vec![0u8; 8];
    codec::write_u32(&mut frame, 4, 2, codec::Endian::Big).unwrap();

    assert!(matches!(
        peer.gateway.on_binary_frame(&frame).await,
        Err(HivewireError::Codec(_))
    ));
}

// =========================================================================
// Two peers, full duplex
// =========================================================================

#[tokio::test]
async fn test_two_peers_exchange_events_without_feedback() {
    let mut alice = peer(10);
    let mut bob = peer(20);
    let chat = chat_spec();

    let bob_seen = Arc::new(AtomicU32::new(0));
    let seen = Arc::clone(&bob_seen);
    bob.mux.subscribe(&chat, move |msg| {
        let seen = Arc::clone(&seen);
        async move {
            assert_eq!(msg.sender_id, 10);
            seen.fetch_add(1, Ordering::SeqCst);
        }
    });

    // Alice emits; her gateway puts the frame on her outbound wire.
    alice
        .mux
        .emit(&chat, vec![Value::U8(1), Value::Str("over to you".into())])
        .await;
    let frame = alice.wire_out.recv().await.unwrap();

    // Deliver it to Bob, as the socket pump would.
    let invoked = bob.gateway.on_binary_frame(&frame).await.unwrap();
    assert_eq!(invoked, 1);
    assert_eq!(bob_seen.load(Ordering::SeqCst), 1);

    // Bob's gateway must not have re-emitted the frame onto his own
    // outbound wire — that would ping-pong forever between the peers.
    assert!(bob.wire_out.try_recv().is_none());
    // And Alice's wire holds nothing further either.
    assert!(alice.wire_out.try_recv().is_none());
}
