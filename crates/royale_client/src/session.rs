//! Client session context.
//!
//! A [`ClientSession`] is created from the server's [`StartGameMessage`] and
//! dropped when the game ends. It owns the client's component store (which
//! holds the player, entities the client spawned, and every remote entity the
//! server relays), the id allocator for the client's range, and the movement
//! prediction state.

use std::collections::VecDeque;

use royale_component::{
    ComponentStore, Entity, EntityAllocator, EntityRange, Glyph, NetworkSyncComponent,
    PositionComponent, RangeError,
};
use royale_net::messages::{ClientMessage, MapLayout, StartGameMessage};

use crate::movement::Direction;

/// Predicted moves kept for reconciliation.
pub const PREDICTION_HISTORY: usize = 64;

/// A move applied locally ahead of server confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PredictedMove {
    /// Sequence number reported with the move.
    pub movement_id: u32,
    /// The entity moved.
    pub entity: Entity,
    /// Resulting column.
    pub x: i16,
    /// Resulting row.
    pub y: i16,
}

impl PredictedMove {
    /// The report announcing this move.
    #[must_use]
    pub fn report(&self) -> ClientMessage {
        ClientMessage::Movement {
            entity: self.entity,
            x: self.x,
            y: self.y,
            movement_id: self.movement_id,
        }
    }
}

/// Everything the client knows about the running game.
#[derive(Debug)]
pub struct ClientSession {
    store: ComponentStore,
    player: Entity,
    allocator: EntityAllocator,
    map: MapLayout,
    next_movement_id: u32,
    predictions: VecDeque<PredictedMove>,
    input: Option<Direction>,
}

impl ClientSession {
    /// Start a session: claim the anchor id and place the player.
    ///
    /// # Errors
    ///
    /// Returns [`RangeError::Exhausted`] if the assigned range is empty.
    pub fn start(start: &StartGameMessage, glyph: u8) -> Result<Self, RangeError> {
        let mut allocator = EntityAllocator::new(start.entity_id_range);
        let player = allocator.allocate()?;
        let [x, y] = start.position;

        let mut store = ComponentStore::new();
        store.set_new_entity(player);
        store.attach_component(player, PositionComponent::new(Glyph::single(glyph), x, y));
        store.attach_component(player, NetworkSyncComponent);

        Ok(Self {
            store,
            player,
            allocator,
            map: start.map,
            next_movement_id: 0,
            predictions: VecDeque::with_capacity(PREDICTION_HISTORY),
            input: None,
        })
    }

    /// The player entity (the range's anchor).
    #[must_use]
    pub fn player(&self) -> Entity {
        self.player
    }

    /// The ids this client owns.
    #[must_use]
    pub fn range(&self) -> EntityRange {
        self.allocator.range()
    }

    /// The board.
    #[must_use]
    pub fn map(&self) -> MapLayout {
        self.map
    }

    /// The local component store.
    #[must_use]
    pub fn store(&self) -> &ComponentStore {
        &self.store
    }

    /// Mutable access to the local component store.
    pub fn store_mut(&mut self) -> &mut ComponentStore {
        &mut self.store
    }

    /// The player's position component.
    #[must_use]
    pub fn player_position(&self) -> Option<&PositionComponent> {
        self.store.get_component(self.player)
    }

    /// Mutable access to the player's position component.
    pub fn player_position_mut(&mut self) -> Option<&mut PositionComponent> {
        self.store.get_component_mut(self.player)
    }

    /// Spawn a client-owned entity at `(x, y)`.
    ///
    /// # Errors
    ///
    /// Returns [`RangeError::Exhausted`] once the range is used up.
    pub fn spawn(&mut self, glyph: u8, x: i16, y: i16) -> Result<Entity, RangeError> {
        let entity = self.allocator.allocate()?;
        self.store.set_new_entity(entity);
        self.store
            .attach_component(entity, PositionComponent::new(Glyph::single(glyph), x, y));
        self.store.attach_component(entity, NetworkSyncComponent);
        Ok(entity)
    }

    /// The report announcing an owned entity to the server.
    #[must_use]
    pub fn create_report(&self, entity: Entity) -> Option<ClientMessage> {
        let pos = self.store.get_component::<PositionComponent>(entity)?;
        Some(ClientMessage::CreateEntity {
            entity,
            x: pos.x,
            y: pos.y,
            glyph: pos.glyph.top_left(),
        })
    }

    /// Queue a step for the next movement pass. A newer input replaces an
    /// older one that has not been consumed yet.
    pub fn queue_input(&mut self, direction: Direction) {
        self.input = Some(direction);
    }

    /// Take the queued input.
    pub fn take_input(&mut self) -> Option<Direction> {
        self.input.take()
    }

    /// Id the next predicted move will carry.
    #[must_use]
    pub fn next_movement_id(&self) -> u32 {
        self.next_movement_id
    }

    /// Resume numbering from `id`.
    pub fn set_next_movement_id(&mut self, id: u32) {
        self.next_movement_id = id;
    }

    /// Take the next movement id.
    pub fn allocate_movement_id(&mut self) -> u32 {
        let id = self.next_movement_id;
        self.next_movement_id = self.next_movement_id.wrapping_add(1);
        id
    }

    /// Log a predicted move, dropping the oldest beyond
    /// [`PREDICTION_HISTORY`].
    pub fn record_prediction(&mut self, predicted: PredictedMove) {
        if self.predictions.len() == PREDICTION_HISTORY {
            self.predictions.pop_front();
        }
        self.predictions.push_back(predicted);
    }

    /// Drop every prediction with `movement_id >= from`. Returns how many
    /// were dropped.
    pub fn discard_predictions_from(&mut self, from: u32) -> usize {
        let before = self.predictions.len();
        self.predictions.retain(|p| p.movement_id < from);
        before - self.predictions.len()
    }

    /// Logged predictions, oldest first.
    pub fn predictions(&self) -> impl Iterator<Item = &PredictedMove> {
        self.predictions.iter()
    }
}
