//! Structured control messages.
//!
//! Everything that is not a per-tick position frame travels as JSON: the
//! server's session-start message and the client's own reports. Binary
//! frames live in [`frames`](crate::frames).

use royale_component::{Entity, EntityRange};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::NetError;

/// Board dimensions sent at session start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapLayout {
    /// Columns.
    pub width: u16,
    /// Rows.
    pub height: u16,
}

impl MapLayout {
    /// `true` when `(x, y)` is a cell of the board.
    #[must_use]
    pub fn contains(&self, x: i16, y: i16) -> bool {
        x >= 0 && y >= 0 && (x as u16) < self.width && (y as u16) < self.height
    }

    /// The nearest on-board cell to `(x, y)`.
    ///
    /// A zero-sized board clamps everything to the origin.
    #[must_use]
    pub fn clamp(&self, x: i16, y: i16) -> (i16, i16) {
        let max_x = i16::try_from(self.width.saturating_sub(1)).unwrap_or(i16::MAX);
        let max_y = i16::try_from(self.height.saturating_sub(1)).unwrap_or(i16::MAX);
        (x.clamp(0, max_x), y.clamp(0, max_y))
    }
}

/// Sent once to a client when it joins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartGameMessage {
    /// Ids the client owns. `lo` is its player entity.
    pub entity_id_range: EntityRange,
    /// Starting `[x, y]` of the player entity.
    pub position: [i16; 2],
    /// The board.
    pub map: MapLayout,
}

/// Server → client control messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Session start.
    StartGame(StartGameMessage),
}

impl ServerMessage {
    /// Decode a message received on a client's control subject.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::Json`] if the payload is not a server message.
    pub fn from_json(payload: &[u8]) -> Result<Self, NetError> {
        Ok(serde_json::from_slice(payload)?)
    }
}

/// Client → server reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Ask to join the session.
    Join,
    /// Announce an entity the client owns, at its initial position.
    CreateEntity {
        /// The entity, inside the client's range.
        entity: Entity,
        /// Column.
        x: i16,
        /// Row.
        y: i16,
        /// Top-left glyph cell.
        glyph: u8,
    },
    /// A predicted move of one of the client's entities.
    Movement {
        /// The entity that moved.
        entity: Entity,
        /// Predicted column.
        x: i16,
        /// Predicted row.
        y: i16,
        /// Sequence number of this move.
        movement_id: u32,
    },
    /// Leave the session.
    Leave,
}

/// A [`ClientMessage`] tagged with its sender.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientEnvelope {
    /// Connection id chosen by the client.
    pub client_id: Uuid,
    /// The report.
    pub message: ClientMessage,
}

impl ClientEnvelope {
    /// Decode a report received on the session inbound subject.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::Json`] if the payload is not a client envelope.
    pub fn from_json(payload: &[u8]) -> Result<Self, NetError> {
        Ok(serde_json::from_slice(payload)?)
    }
}
