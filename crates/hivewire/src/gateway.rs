//! The event gateway: glue between the frame transport and the
//! multiplexer.
//!
//! The gateway plays both directions of the data flow:
//!
//! - **Outbound** — at attach time it subscribes to every registered
//!   event, tagged with its own origin. When local code emits, those
//!   subscriptions encode the message and write the frame to the sink.
//! - **Inbound** — the socket owner feeds received frames into
//!   [`EventGateway::on_binary_frame`], which decodes the header, picks
//!   the specification by event id, decodes the payload, and raw-emits
//!   the message *tagged with the gateway's origin*.
//!
//! The origin tag is what keeps the loop from closing: an inbound frame
//! is dispatched under the gateway's tag, so the gateway's own outbound
//! subscriptions — tagged identically — are echo-suppressed and the
//! frame is never reflected back to the wire. Local subscribers carry no
//! tag (or a different one) and see everything.

use std::sync::Arc;

use hivewire_mux::{EventMultiplexer, SubscriptionId};
use hivewire_protocol::{codec, EventRegistry, Message};
use hivewire_transport::FrameSink;

use crate::HivewireError;

/// Bridges one frame transport to one multiplexer.
///
/// Construction subscribes; dropping the gateway unsubscribes, so the
/// multiplexer stops encoding for a connection that no longer exists.
pub struct EventGateway {
    registry: Arc<EventRegistry>,
    mux: Arc<EventMultiplexer>,
    origin: String,
    subscriptions: Vec<SubscriptionId>,
}

impl EventGateway {
    /// The origin tag used when none is given.
    pub const DEFAULT_ORIGIN: &'static str = "wire";

    /// Attaches a gateway with the default origin tag.
    pub fn attach<S: FrameSink>(
        registry: Arc<EventRegistry>,
        mux: Arc<EventMultiplexer>,
        sink: S,
    ) -> Self {
        Self::attach_with_origin(registry, mux, sink, Self::DEFAULT_ORIGIN)
    }

    /// Attaches a gateway with an explicit origin tag.
    ///
    /// Two gateways on one multiplexer (say, a game socket and a tooling
    /// socket) need distinct tags, or each would suppress the other's
    /// traffic as its own echo.
    pub fn attach_with_origin<S: FrameSink>(
        registry: Arc<EventRegistry>,
        mux: Arc<EventMultiplexer>,
        sink: S,
        origin: &str,
    ) -> Self {
        let sink = Arc::new(sink);
        let mut subscriptions = Vec::with_capacity(registry.len());

        for spec in registry.iter() {
            let spec = Arc::clone(spec);
            let cb_spec = Arc::clone(&spec);
            let sink = Arc::clone(&sink);
            let id = mux.subscribe_with_origin(&spec, origin, move |message: Arc<Message>| {
                let spec = Arc::clone(&cb_spec);
                let sink = Arc::clone(&sink);
                async move {
                    // This subscription is the transport adapter: it is
                    // the layer that decides what happens to a frame
                    // that can't be produced or delivered — drop it and
                    // say so.
                    match codec::encode(&message, &spec) {
                        Ok(frame) => {
                            if let Err(e) = sink.send_frame(&frame).await {
                                tracing::warn!(
                                    event = %spec,
                                    error = %e,
                                    "dropping outbound frame: sink write failed"
                                );
                            }
                        }
                        Err(e) => {
                            tracing::error!(
                                event = %spec,
                                error = %e,
                                "dropping outbound event: encode failed"
                            );
                        }
                    }
                }
            });
            subscriptions.push(id);
        }

        tracing::debug!(
            origin,
            events = subscriptions.len(),
            "event gateway attached"
        );

        Self {
            registry,
            mux,
            origin: origin.to_string(),
            subscriptions,
        }
    }

    /// Feeds one raw frame received from the wire into the event layer.
    ///
    /// Returns the number of local subscribers that were invoked.
    ///
    /// # Errors
    /// - [`HivewireError::Codec`] — the frame is truncated or malformed.
    /// - [`HivewireError::UnknownEvent`] — the envelope names an event
    ///   id the registry doesn't know (version skew). The caller decides
    ///   whether to drop the frame or kill the connection.
    pub async fn on_binary_frame(&self, frame: &[u8]) -> Result<u32, HivewireError> {
        let (_sender_id, event_id) = codec::decode_header(frame)?;

        let spec = self
            .registry
            .get(event_id)
            .ok_or(HivewireError::UnknownEvent(event_id))?;

        let message = codec::decode(frame, spec, None)?;
        Ok(self.mux.emit_raw(message, Some(&self.origin)).await)
    }

    /// The origin tag this gateway subscribes and raw-emits under.
    pub fn origin(&self) -> &str {
        &self.origin
    }
}

impl Drop for EventGateway {
    fn drop(&mut self) {
        self.mux.unsubscribe(&self.subscriptions);
        tracing::debug!(origin = %self.origin, "event gateway detached");
    }
}
