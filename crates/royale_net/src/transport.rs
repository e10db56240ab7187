//! Outbound frame transports.
//!
//! A [`Transport`] takes ownership of an encoded [`PooledBuffer`]. Enqueueing
//! is synchronous and never blocks the tick driver; the actual write happens
//! later on a writer task. The buffer itself is the published payload and
//! returns to its pool once that write finishes, successfully or not.

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use crate::connection::NatsConnection;
use crate::error::TransportError;
use crate::pool::PooledBuffer;

/// A per-client handle that accepts encoded frames for delivery.
pub trait Transport: Send + Sync {
    /// Hand `frame` to the transport.
    ///
    /// On success the frame is queued and will be released after the send
    /// completes. On error the frame has already been released.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Closed`] if the peer can no longer receive.
    fn send(&self, frame: PooledBuffer) -> Result<(), TransportError>;
}

/// Receiving half of a [`QueueTransport`]; drained by a writer task.
pub type FrameReceiver = mpsc::UnboundedReceiver<PooledBuffer>;

/// A transport backed by an unbounded in-process queue.
///
/// The queue is unbounded on purpose: a slow peer grows the backlog (and the
/// buffer pool) instead of stalling the broadcast pass.
#[derive(Debug, Clone)]
pub struct QueueTransport {
    tx: mpsc::UnboundedSender<PooledBuffer>,
}

impl QueueTransport {
    /// Create a transport and the receiver its writer task drains.
    #[must_use]
    pub fn new() -> (Self, FrameReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Returns `true` once the receiving side has gone away.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl Transport for QueueTransport {
    fn send(&self, frame: PooledBuffer) -> Result<(), TransportError> {
        // On failure the rejected frame is dropped with the error, releasing it.
        self.tx.send(frame).map_err(|_| TransportError::Closed)
    }
}

/// Spawn a writer task publishing every queued frame to `subject`.
///
/// Each frame is published without a copy and released once the NATS client
/// is done with it. A failed publish is
/// logged and the task moves on to the next frame; the task ends when every
/// [`QueueTransport`] feeding `frames` has been dropped.
pub fn spawn_nats_writer(
    conn: NatsConnection,
    subject: String,
    mut frames: FrameReceiver,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        debug!(subject, "frame writer started");
        while let Some(frame) = frames.recv().await {
            trace!(subject, len = frame.len(), "publishing frame");
            if let Err(e) = conn.publish_frame(&subject, frame).await {
                warn!(subject, error = %e, "frame publish failed");
            }
        }
        debug!(subject, "frame writer stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frames::{EntityPositionUpdate, encode_entity_position_update};
    use crate::pool::BufferPool;

    fn encoded(pool: &BufferPool, entity_id: u32) -> PooledBuffer {
        let mut buf = pool.acquire();
        let update = EntityPositionUpdate {
            entity_id,
            glyph: b'x',
            x: 1,
            y: 2,
        };
        encode_entity_position_update(&update, &mut buf).unwrap();
        buf
    }

    #[tokio::test]
    async fn test_queue_transport_holds_buffer_until_consumed() {
        let pool = BufferPool::for_entity_updates();
        let (transport, mut rx) = QueueTransport::new();

        transport.send(encoded(&pool, 1)).unwrap();
        transport.send(encoded(&pool, 2)).unwrap();
        assert_eq!(pool.stats().in_flight, 2);

        let first = rx.recv().await.unwrap();
        assert_eq!(&first.as_bytes()[1..5], &1u32.to_le_bytes());
        drop(first);
        assert_eq!(pool.stats().in_flight, 1);

        drop(rx);
        assert_eq!(pool.stats().in_flight, 0);
    }

    #[tokio::test]
    async fn test_closed_transport_still_releases_buffer() {
        let pool = BufferPool::for_entity_updates();
        let (transport, rx) = QueueTransport::new();
        drop(rx);

        assert!(transport.is_closed());
        assert_eq!(
            transport.send(encoded(&pool, 3)),
            Err(TransportError::Closed)
        );
        let stats = pool.stats();
        assert_eq!(stats.in_flight, 0);
        assert_eq!(stats.free, 1);
    }
}
