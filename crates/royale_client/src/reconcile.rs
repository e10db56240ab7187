//! Applying server frames to the local store.
//!
//! A correction does not move the player by itself; it arms the player's
//! [`ForcePosition`] and the next movement step performs the snap. Entity
//! updates are upserts: unseen entities are created, known ones are moved
//! in place.

use royale_component::{ComponentStore, Entity, ForcePosition, Glyph, PositionComponent};
use royale_net::{
    DecodeError, EntityPositionUpdate, PositionCorrection, is_correct_position,
    is_game_state_update, read_correct_position, read_entity_position_update,
};
use tracing::{trace, warn};

use crate::session::ClientSession;

/// What an applied frame changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// The player's correction was armed.
    Correction(PositionCorrection),
    /// A remote entity was created or moved.
    Update(Entity),
}

/// Decode one frame and apply it.
///
/// # Errors
///
/// Returns a [`DecodeError`] for empty, short, or unrecognised frames; the
/// session is left untouched.
pub fn apply_frame(session: &mut ClientSession, buf: &[u8]) -> Result<Applied, DecodeError> {
    if is_correct_position(buf, 0) {
        let correction = read_correct_position(buf, 1)?;
        apply_correction(session, &correction);
        return Ok(Applied::Correction(correction));
    }
    if is_game_state_update(buf, 0) {
        let update = read_entity_position_update(buf, 1)?;
        return Ok(Applied::Update(apply_entity_update(session.store_mut(), &update)));
    }
    match buf.first() {
        None => Err(DecodeError::Empty),
        Some(&tag) => Err(DecodeError::UnknownTag(tag)),
    }
}

/// Arm the player's forced position.
///
/// Later corrections overwrite earlier ones that have not been applied yet.
/// Returns `false` if the player has no position to correct.
pub fn apply_correction(session: &mut ClientSession, correction: &PositionCorrection) -> bool {
    let Some(pos) = session.player_position_mut() else {
        warn!("correction received before the player was placed");
        return false;
    };
    pos.force_position = ForcePosition {
        x: correction.x,
        y: correction.y,
        next_movement_id: correction.next_movement_id,
        force: true,
    };
    trace!(
        x = correction.x,
        y = correction.y,
        next_movement_id = correction.next_movement_id,
        "correction armed"
    );
    true
}

/// Create or move the entity named by `update`.
pub fn apply_entity_update(store: &mut ComponentStore, update: &EntityPositionUpdate) -> Entity {
    let entity = Entity(update.entity_id);
    store.set_new_entity(entity);
    match store.get_component_mut::<PositionComponent>(entity) {
        Some(pos) => {
            pos.x = update.x;
            pos.y = update.y;
            pos.glyph.set_top_left(update.glyph);
        }
        None => {
            store.attach_component(
                entity,
                PositionComponent::new(Glyph::single(update.glyph), update.x, update.y),
            );
        }
    }
    entity
}
