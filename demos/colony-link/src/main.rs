//! Colony Link: two in-process peers exchanging binary game events.
//!
//! Each peer owns a multiplexer and a gateway; the gateways are bridged
//! by in-memory frame pipes standing in for the socket. Watch the logs:
//! every event crosses the "wire" exactly once — the receiving gateway's
//! echo suppression keeps frames from ping-ponging back.
//!
//! Run with `RUST_LOG=debug` to see the subscription and dispatch logs.

use std::sync::Arc;

use hivewire::hivewire_transport::{channel, ChannelFrameSink};
use hivewire::prelude::*;

// ---------------------------------------------------------------------------
// The shared event registry
// ---------------------------------------------------------------------------

const COLONY_CHAT: u32 = 1;
const ANT_POSITION: u32 = 2;

/// Builds the registry and returns shared handles to each specification.
fn build_registry() -> Result<
    (
        EventRegistry,
        Arc<EventSpecification>,
        Arc<EventSpecification>,
    ),
    HivewireError,
> {
    let mut registry = EventRegistry::new();

    let chat = registry.register(EventSpecification::new(
        COLONY_CHAT,
        "colony_chat",
        Permissions::all(),
        vec![
            FieldDescriptor::new("channel", WireType::U8),
            FieldDescriptor::new("text", WireType::Str),
        ],
    )?)?;

    let position = registry.register(EventSpecification::new(
        ANT_POSITION,
        "ant_position",
        Permissions::all(),
        vec![
            FieldDescriptor::new("ant", WireType::U32),
            FieldDescriptor::new("x", WireType::F64),
            FieldDescriptor::new("y", WireType::F64),
        ],
    )?)?;

    Ok((registry, chat, position))
}

// ---------------------------------------------------------------------------
// One peer: multiplexer + gateway + local listeners
// ---------------------------------------------------------------------------

struct Peer {
    name: &'static str,
    mux: Arc<EventMultiplexer>,
    gateway: Arc<EventGateway>,
}

fn spawn_peer(
    name: &'static str,
    registry: Arc<EventRegistry>,
    chat: &Arc<EventSpecification>,
    position: &Arc<EventSpecification>,
    sink: ChannelFrameSink,
) -> Peer {
    let mux = Arc::new(EventMultiplexer::with_random_identity());
    let gateway = Arc::new(EventGateway::attach(registry, Arc::clone(&mux), sink));

    // A local listener per event, so received traffic shows up in the log.
    let chat_spec = Arc::clone(chat);
    mux.subscribe(chat, move |msg| {
        let spec = Arc::clone(&chat_spec);
        async move {
            let text = msg
                .field(&spec, "text")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            tracing::info!(peer = name, from = msg.sender_id, %text, "chat");
        }
    });

    let pos_spec = Arc::clone(position);
    mux.subscribe(position, move |msg| {
        let spec = Arc::clone(&pos_spec);
        async move {
            let ant = msg.field(&spec, "ant").and_then(Value::as_u32);
            let x = msg.field(&spec, "x").and_then(Value::as_f64);
            let y = msg.field(&spec, "y").and_then(Value::as_f64);
            tracing::info!(peer = name, from = msg.sender_id, ?ant, ?x, ?y, "position");
        }
    });

    Peer { name, mux, gateway }
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<(), HivewireError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let (registry, chat, position) = build_registry()?;
    let registry = Arc::new(registry);

    // Two frame pipes, crossed: what Alice sends, Bob receives.
    let (alice_sink, mut alice_out) = channel();
    let (bob_sink, mut bob_out) = channel();

    let alice = spawn_peer("alice", Arc::clone(&registry), &chat, &position, alice_sink);
    let bob = spawn_peer("bob", Arc::clone(&registry), &chat, &position, bob_sink);

    // Socket pumps: deliver each peer's outbound frames to the other.
    let bob_gateway = Arc::clone(&bob.gateway);
    let pump_to_bob = tokio::spawn(async move {
        while let Some(frame) = alice_out.recv().await {
            if let Err(e) = bob_gateway.on_binary_frame(&frame).await {
                tracing::warn!(error = %e, "dropping frame for bob");
            }
        }
    });
    let alice_gateway = Arc::clone(&alice.gateway);
    let pump_to_alice = tokio::spawn(async move {
        while let Some(frame) = bob_out.recv().await {
            if let Err(e) = alice_gateway.on_binary_frame(&frame).await {
                tracing::warn!(error = %e, "dropping frame for alice");
            }
        }
    });

    tracing::info!(
        alice = alice.mux.sender_id(),
        bob = bob.mux.sender_id(),
        "colony link up"
    );

    // Some traffic in both directions.
    alice
        .mux
        .emit(
            &chat,
            vec![Value::U8(0), Value::Str("the aphid farm is ready".into())],
        )
        .await;

    bob.mux
        .emit(
            &chat,
            vec![Value::U8(0), Value::Str("sending workers over".into())],
        )
        .await;

    for step in 0..3u32 {
        bob.mux
            .emit(
                &position,
                vec![
                    Value::U32(7),
                    Value::F64(f64::from(step) * 1.5),
                    Value::F64(f64::from(step) * -0.5),
                ],
            )
            .await;
    }

    // Let the pumps drain before shutting down.
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;

    tracing::info!(peer = alice.name, subscriptions = alice.mux.len(), "done");
    tracing::info!(peer = bob.name, subscriptions = bob.mux.len(), "done");

    pump_to_bob.abort();
    pump_to_alice.abort();
    Ok(())
}
