//! # Hivewire
//!
//! Real-time event transport for the colony game client: a compact
//! binary wire protocol shared with an independently implemented server,
//! plus an in-process event multiplexer that routes decoded events to
//! interested listeners while suppressing local echo.
//!
//! The layers, bottom up:
//!
//! - [`hivewire_protocol`] — event schemas and the byte-exact codec.
//! - [`hivewire_mux`] — subscribe/emit with origin-tagged echo
//!   suppression.
//! - [`hivewire_transport`] — the [`FrameSink`] seam the socket owner
//!   implements.
//! - [`EventGateway`] (this crate) — ties the three together.
//!
//! ## Quick start
//!
//! ```rust
//! use std::sync::Arc;
//! use hivewire::prelude::*;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), hivewire::HivewireError> {
//! let chat = EventSpecification::new(
//!     1,
//!     "colony_chat",
//!     Permissions::all(),
//!     vec![FieldDescriptor::new("text", WireType::Str)],
//! )?;
//! let registry = Arc::new(EventRegistry::with_specs([chat.clone()])?);
//! let mux = Arc::new(EventMultiplexer::with_random_identity());
//!
//! // The socket owner would hand us its sink; here, an in-memory pipe.
//! let (sink, mut wire) = hivewire_transport::channel();
//! let _gateway = EventGateway::attach(Arc::clone(&registry), Arc::clone(&mux), sink);
//!
//! mux.subscribe(&chat, |msg| async move {
//!     // runs for local emissions and for frames from the wire alike
//!     let _ = msg.event_id;
//! });
//!
//! mux.emit(&chat, vec![Value::Str("hello colony".into())]).await;
//! assert!(wire.recv().await.is_some()); // the frame went out
//! # Ok(())
//! # }
//! ```

mod error;
mod gateway;

pub use error::HivewireError;
pub use gateway::EventGateway;

// Re-export the sub-crates so users depend on `hivewire` alone.
pub use hivewire_mux;
pub use hivewire_protocol;
pub use hivewire_transport;

/// The common imports, one `use` away.
pub mod prelude {
    pub use crate::{EventGateway, HivewireError};
    pub use hivewire_mux::{EventMultiplexer, SubscriptionId};
    pub use hivewire_protocol::{
        codec, EventRegistry, EventSpecification, FieldDescriptor, Message,
        Permissions, Role, Value, WireType,
    };
    pub use hivewire_transport::{FrameSink, TransportError};
}
