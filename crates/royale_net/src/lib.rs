//! # royale_net
//!
//! Wire protocol and transport for royale sessions.
//!
//! This crate provides:
//!
//! - [`frames`] — the fixed-layout binary frames (position correction and
//!   entity position update) and the [`BufferWriter`] they encode into.
//! - [`pool`] — reusable write buffers released on send completion.
//! - [`transport`] — the per-client [`Transport`] seam and its queue/NATS
//!   implementation.
//! - [`messages`] — JSON control messages for session setup and client reports.
//! - [`subjects`] — NATS subject names.
//! - [`connection`] — NATS connection management.
//! - [`error`] — network-layer error types.

pub mod connection;
pub mod error;
pub mod frames;
pub mod messages;
pub mod pool;
pub mod subjects;
pub mod transport;

pub use connection::NatsConnection;
pub use error::{DecodeError, EncodeError, NetError, TransportError};
pub use frames::{
    BufferWriter, EntityPositionUpdate, Frame, PLAYER_MOVEMENT_SIZE, PositionCorrection,
    encode_entity_position_update, encode_position_correction, is_correct_position,
    is_game_state_update, read_correct_position, read_entity_position_update,
};
pub use pool::{BufferPool, PoolStats, PooledBuffer};
pub use transport::{FrameReceiver, QueueTransport, Transport, spawn_nats_writer};
