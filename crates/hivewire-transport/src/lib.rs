//! Frame transport seam for Hivewire.
//!
//! The event layer treats the network as an external collaborator: it
//! hands encoded frames to a [`FrameSink`] and is fed raw frames by
//! whatever owns the socket. Connection lifecycle, reconnection, and TLS
//! all live on the other side of this trait.
//!
//! For tests and demos, [`channel`] provides an in-memory frame pipe
//! with the same interface a socket-backed sink would have.

mod error;

pub use error::TransportError;

use std::future::Future;

use tokio::sync::mpsc;

/// Consumes outbound binary frames.
///
/// The event gateway calls this with fully encoded wire frames; the
/// implementation writes them to the socket (or wherever frames go).
///
/// ## Trait bounds
///
/// `Send + Sync + 'static` — the sink is shared across the gateway's
/// subscription callbacks, which run as independent Tokio tasks.
pub trait FrameSink: Send + Sync + 'static {
    /// Sends one binary frame to the remote peer.
    fn send_frame(
        &self,
        frame: &[u8],
    ) -> impl Future<Output = Result<(), TransportError>> + Send;
}

// ---------------------------------------------------------------------------
// In-memory frame pipe
// ---------------------------------------------------------------------------

/// Creates an in-memory frame pipe: a sink and the receiver that sees
/// everything sent into it.
///
/// Used wherever a real socket isn't: unit tests, demos, and
/// loopback-style setups with two gateways in one process.
pub fn channel() -> (ChannelFrameSink, FrameReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (ChannelFrameSink { tx }, FrameReceiver { rx })
}

/// The sending half of an in-memory frame pipe.
#[derive(Clone)]
pub struct ChannelFrameSink {
    tx: mpsc::UnboundedSender<Vec<u8>>,
}

impl FrameSink for ChannelFrameSink {
    async fn send_frame(&self, frame: &[u8]) -> Result<(), TransportError> {
        tracing::trace!(bytes = frame.len(), "frame queued on channel");
        self.tx
            .send(frame.to_vec())
            .map_err(|_| TransportError::Closed)
    }
}

/// The receiving half of an in-memory frame pipe.
pub struct FrameReceiver {
    rx: mpsc::UnboundedReceiver<Vec<u8>>,
}

impl FrameReceiver {
    /// Waits for the next frame. Returns `None` once every sink clone
    /// has been dropped.
    pub async fn recv(&mut self) -> Option<Vec<u8>> {
        self.rx.recv().await
    }

    /// Returns a frame if one is already queued, without waiting.
    /// Handy for asserting that *nothing* was sent.
    pub fn try_recv(&mut self) -> Option<Vec<u8>> {
        self.rx.try_recv().ok()
    }
}

// =========================================================================
// Tests
// =========================================================================
