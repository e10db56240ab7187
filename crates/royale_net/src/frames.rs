//! Fixed-layout binary frames.
//!
//! Every frame is a one-byte tag followed by a fixed-size payload. All
//! integers are little-endian. There is no length prefix, checksum, or
//! version byte, so any change to these layouts is a protocol break.
//!
//! ```text
//! tag 0  PositionCorrection    x:i16  y:i16  next_movement_id:u32
//! tag 1  EntityPositionUpdate  entity_id:u32  char:u8  x:i16  y:i16
//! ```
//!
//! Encoders write into a caller-supplied [`BufferWriter`] and never allocate.

use crate::error::{DecodeError, EncodeError};

/// Tag byte of a [`PositionCorrection`] frame.
pub const CORRECT_POSITION_TAG: u8 = 0;

/// Tag byte of an [`EntityPositionUpdate`] frame.
pub const GAME_STATE_UPDATE_TAG: u8 = 1;

/// Payload bytes of a [`PositionCorrection`] (after the tag).
pub const CORRECT_POSITION_PAYLOAD: usize = 2 + 2 + 4;

/// Payload bytes of an [`EntityPositionUpdate`] (after the tag).
pub const ENTITY_UPDATE_PAYLOAD: usize = 4 + 1 + 2 + 2;

/// Full size of a [`PositionCorrection`] frame, tag included.
pub const CORRECT_POSITION_SIZE: usize = 1 + CORRECT_POSITION_PAYLOAD;

/// Full size of an [`EntityPositionUpdate`] frame, tag included. Pooled
/// broadcast buffers are exactly this large.
pub const PLAYER_MOVEMENT_SIZE: usize = 1 + ENTITY_UPDATE_PAYLOAD;

/// Server-issued override of the client's predicted position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionCorrection {
    /// Authoritative column.
    pub x: i16,
    /// Authoritative row.
    pub y: i16,
    /// Movement id the client resumes prediction from.
    pub next_movement_id: u32,
}

/// One entity's position as relayed to other clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityPositionUpdate {
    /// The entity being updated.
    pub entity_id: u32,
    /// Top-left cell of the entity's glyph.
    pub glyph: u8,
    /// Column.
    pub x: i16,
    /// Row.
    pub y: i16,
}

/// A decoded frame of either kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frame {
    /// Tag 0.
    Correction(PositionCorrection),
    /// Tag 1.
    Update(EntityPositionUpdate),
}

impl Frame {
    /// Decode a whole frame, dispatching on the tag at offset 0.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::Empty`] for an empty buffer,
    /// [`DecodeError::UnknownTag`] for an unrecognised tag, and
    /// [`DecodeError::Truncated`] for a short payload.
    pub fn decode(buf: &[u8]) -> Result<Self, DecodeError> {
        match buf.first() {
            None => Err(DecodeError::Empty),
            Some(&CORRECT_POSITION_TAG) => read_correct_position(buf, 1).map(Frame::Correction),
            Some(&GAME_STATE_UPDATE_TAG) => {
                read_entity_position_update(buf, 1).map(Frame::Update)
            }
            Some(&tag) => Err(DecodeError::UnknownTag(tag)),
        }
    }
}

/// A fixed-capacity scratch writer with a resettable cursor.
#[derive(Debug, Clone)]
pub struct BufferWriter {
    buf: Box<[u8]>,
    cursor: usize,
}

impl BufferWriter {
    /// Create a zeroed writer of `capacity` bytes.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            buf: vec![0u8; capacity].into_boxed_slice(),
            cursor: 0,
        }
    }

    /// Total bytes the writer can hold.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Bytes written since the last reset.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cursor
    }

    /// Returns `true` if nothing has been written since the last reset.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cursor == 0
    }

    /// Bytes still free.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.cursor
    }

    /// Everything written since the last reset.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.cursor]
    }

    /// Rewind the cursor so the buffer can be reused.
    pub fn reset(&mut self) {
        self.cursor = 0;
    }

    /// Append raw bytes.
    ///
    /// # Errors
    ///
    /// Returns [`EncodeError::BufferTooSmall`] if they do not fit; nothing
    /// is written in that case.
    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), EncodeError> {
        self.reserve(bytes.len())?;
        self.put(bytes);
        Ok(())
    }

    fn reserve(&self, needed: usize) -> Result<(), EncodeError> {
        let remaining = self.remaining();
        if needed > remaining {
            return Err(EncodeError::BufferTooSmall { needed, remaining });
        }
        Ok(())
    }

    fn put(&mut self, bytes: &[u8]) {
        let end = self.cursor + bytes.len();
        self.buf[self.cursor..end].copy_from_slice(bytes);
        self.cursor = end;
    }
}

/// Returns `true` if the byte at `offset` is the correction tag.
///
/// Never panics: an out-of-range offset is simply `false`.
#[must_use]
pub fn is_correct_position(buf: &[u8], offset: usize) -> bool {
    buf.get(offset) == Some(&CORRECT_POSITION_TAG)
}

/// Returns `true` if the byte at `offset` is the entity update tag.
///
/// Never panics: an out-of-range offset is simply `false`.
#[must_use]
pub fn is_game_state_update(buf: &[u8], offset: usize) -> bool {
    buf.get(offset) == Some(&GAME_STATE_UPDATE_TAG)
}

fn payload<'a, const N: usize>(
    buf: &'a [u8],
    offset: usize,
    kind: &'static str,
) -> Result<&'a [u8; N], DecodeError> {
    let available = buf.len().saturating_sub(offset);
    buf.get(offset..)
        .and_then(|rest| rest.first_chunk::<N>())
        .ok_or(DecodeError::Truncated {
            kind,
            needed: N,
            available,
        })
}

/// Decode a correction payload starting at `offset` (one past the tag).
///
/// # Errors
///
/// Returns [`DecodeError::Truncated`] if fewer than
/// [`CORRECT_POSITION_PAYLOAD`] bytes follow `offset`.
pub fn read_correct_position(buf: &[u8], offset: usize) -> Result<PositionCorrection, DecodeError> {
    let p = payload::<CORRECT_POSITION_PAYLOAD>(buf, offset, "position correction")?;
    Ok(PositionCorrection {
        x: i16::from_le_bytes([p[0], p[1]]),
        y: i16::from_le_bytes([p[2], p[3]]),
        next_movement_id: u32::from_le_bytes([p[4], p[5], p[6], p[7]]),
    })
}

/// Decode an entity update payload starting at `offset` (one past the tag).
///
/// # Errors
///
/// Returns [`DecodeError::Truncated`] if fewer than
/// [`ENTITY_UPDATE_PAYLOAD`] bytes follow `offset`.
pub fn read_entity_position_update(
    buf: &[u8],
    offset: usize,
) -> Result<EntityPositionUpdate, DecodeError> {
    let p = payload::<ENTITY_UPDATE_PAYLOAD>(buf, offset, "entity position update")?;
    Ok(EntityPositionUpdate {
        entity_id: u32::from_le_bytes([p[0], p[1], p[2], p[3]]),
        glyph: p[4],
        x: i16::from_le_bytes([p[5], p[6]]),
        y: i16::from_le_bytes([p[7], p[8]]),
    })
}

/// Encode an entity update into `writer`, returning the bytes just written.
///
/// # Errors
///
/// Returns [`EncodeError::BufferTooSmall`] if `writer` has fewer than
/// [`PLAYER_MOVEMENT_SIZE`] bytes left. Nothing is written in that case.
pub fn encode_entity_position_update<'w>(
    update: &EntityPositionUpdate,
    writer: &'w mut BufferWriter,
) -> Result<&'w [u8], EncodeError> {
    writer.reserve(PLAYER_MOVEMENT_SIZE)?;
    let start = writer.len();
    writer.put(&[GAME_STATE_UPDATE_TAG]);
    writer.put(&update.entity_id.to_le_bytes());
    writer.put(&[update.glyph]);
    writer.put(&update.x.to_le_bytes());
    writer.put(&update.y.to_le_bytes());
    Ok(&writer.as_bytes()[start..])
}

/// Encode a correction into `writer`, returning the bytes just written.
///
/// # Errors
///
/// Returns [`EncodeError::BufferTooSmall`] if `writer` has fewer than
/// [`CORRECT_POSITION_SIZE`] bytes left. Nothing is written in that case.
pub fn encode_position_correction<'w>(
    correction: &PositionCorrection,
    writer: &'w mut BufferWriter,
) -> Result<&'w [u8], EncodeError> {
    writer.reserve(CORRECT_POSITION_SIZE)?;
    let start = writer.len();
    writer.put(&[CORRECT_POSITION_TAG]);
    writer.put(&correction.x.to_le_bytes());
    writer.put(&correction.y.to_le_bytes());
    writer.put(&correction.next_movement_id.to_le_bytes());
    Ok(&writer.as_bytes()[start..])
}
