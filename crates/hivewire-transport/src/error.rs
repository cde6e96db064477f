/// Errors that can occur at the frame transport seam.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The other end of the frame pipe is gone.
    #[error("frame channel closed")]
    Closed,

    /// Writing a frame failed at the I/O level.
    ///
    /// Socket-backed [`FrameSink`](crate::FrameSink) implementations
    /// surface their write errors through this variant.
    #[error("send failed: {0}")]
    SendFailed(#[source] std::io::Error),
}
