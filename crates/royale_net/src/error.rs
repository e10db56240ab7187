//! Network-layer error types.

/// Errors raised while decoding a binary frame.
///
/// None of these are session-fatal: the receiver logs the error, drops the
/// frame, and keeps going.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// The buffer held no bytes at all.
    #[error("empty frame")]
    Empty,

    /// The leading tag byte named no known frame kind.
    #[error("unknown frame tag {0}")]
    UnknownTag(u8),

    /// The buffer ended before the fixed-size payload did.
    #[error("truncated {kind} frame: need {needed} payload bytes, have {available}")]
    Truncated {
        /// Frame kind being decoded.
        kind: &'static str,
        /// Fixed payload size of that kind.
        needed: usize,
        /// Bytes actually available past the offset.
        available: usize,
    },
}

/// Errors raised while encoding into a [`BufferWriter`](crate::BufferWriter).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EncodeError {
    /// The writer had too little room left for the frame.
    #[error("write buffer too small: need {needed} bytes, {remaining} remaining")]
    BufferTooSmall {
        /// Bytes the frame needs.
        needed: usize,
        /// Bytes left in the writer.
        remaining: usize,
    },
}

/// Errors raised when handing a frame to a [`Transport`](crate::Transport).
///
/// The frame's buffer has already gone back to its pool by the time the
/// caller sees one of these.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// The peer's outbound queue has been shut down.
    #[error("transport closed")]
    Closed,
}

/// Errors that can occur during NATS and control-message operations.
#[derive(Debug, thiserror::Error)]
pub enum NetError {
    /// Failed to encode or decode a JSON control message.
    #[error("control message JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// NATS subscription error.
    #[error("NATS subscribe error: {0}")]
    Subscribe(#[from] async_nats::SubscribeError),

    /// NATS publish error.
    #[error("NATS publish error: {0}")]
    Publish(#[from] async_nats::PublishError),

    /// NATS connection error.
    #[error("NATS connection error: {0}")]
    Connect(#[from] async_nats::ConnectError),
}
