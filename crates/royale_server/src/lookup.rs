//! Main-entity position lookup.
//!
//! The broadcaster needs each client's anchor position once per visible
//! candidate. Two sources are supported: the component store itself, and an
//! [`ActivePlayers`] registry that the NATS gateway writes as reports arrive,
//! ahead of the tick driver applying them to the store.

use std::sync::Arc;

use dashmap::DashMap;
use royale_component::{ComponentStore, Entity, GridPoint, PositionComponent};
use uuid::Uuid;

use crate::config::LookupStrategy;

/// Resolves a client's main entity to its current cell.
pub trait PositionLookup: Send + Sync {
    /// The anchor's position, or `None` if it has not been reported yet.
    fn main_position(&self, store: &ComponentStore, anchor: Entity) -> Option<GridPoint>;
}

/// Reads positions from the component store.
#[derive(Debug, Default, Clone, Copy)]
pub struct StoreLookup;

impl PositionLookup for StoreLookup {
    fn main_position(&self, store: &ComponentStore, anchor: Entity) -> Option<GridPoint> {
        store
            .get_component::<PositionComponent>(anchor)
            .map(PositionComponent::point)
    }
}

#[derive(Debug, Clone, Copy)]
struct PlayerSlot {
    owner: Uuid,
    point: GridPoint,
}

/// Concurrent map from player entity to its owner and last reported cell.
#[derive(Debug, Default, Clone)]
pub struct ActivePlayers {
    players: Arc<DashMap<Entity, PlayerSlot>>,
}

impl ActivePlayers {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the latest position of `entity`, owned by `owner`.
    pub fn update(&self, owner: Uuid, entity: Entity, point: GridPoint) {
        self.players.insert(entity, PlayerSlot { owner, point });
    }

    /// Update `entity` only if it is tracked and belongs to `owner`.
    ///
    /// Returns `false` and records nothing otherwise. The registry only ever
    /// holds main entities the session registered, and a client can only
    /// move its own.
    pub fn refresh(&self, owner: Uuid, entity: Entity, point: GridPoint) -> bool {
        match self.players.get_mut(&entity) {
            Some(mut slot) if slot.owner == owner => {
                slot.point = point;
                true
            }
            _ => false,
        }
    }

    /// Forget `entity`.
    pub fn remove(&self, entity: Entity) -> Option<GridPoint> {
        self.players.remove(&entity).map(|(_, slot)| slot.point)
    }

    /// Last recorded position of `entity`.
    #[must_use]
    pub fn get(&self, entity: Entity) -> Option<GridPoint> {
        self.players.get(&entity).map(|slot| slot.point)
    }

    /// Number of tracked players.
    #[must_use]
    pub fn len(&self) -> usize {
        self.players.len()
    }

    /// Returns `true` if no player is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }
}

/// Reads positions from an [`ActivePlayers`] registry.
#[derive(Debug, Clone)]
pub struct RegistryLookup {
    players: ActivePlayers,
}

impl RegistryLookup {
    /// Look up anchors in `players`.
    #[must_use]
    pub fn new(players: ActivePlayers) -> Self {
        Self { players }
    }
}

impl PositionLookup for RegistryLookup {
    fn main_position(&self, _store: &ComponentStore, anchor: Entity) -> Option<GridPoint> {
        self.players.get(anchor)
    }
}

/// Build the lookup selected by `strategy`.
#[must_use]
pub fn build_lookup(strategy: LookupStrategy, players: &ActivePlayers) -> Box<dyn PositionLookup> {
    match strategy {
        LookupStrategy::Store => Box::new(StoreLookup),
        LookupStrategy::Registry => Box::new(RegistryLookup::new(players.clone())),
    }
}

#[cfg(test)]
mod tests {
    use royale_component::Glyph;

    use super::*;

    #[test]
    fn test_store_lookup() {
        let mut store = ComponentStore::new();
        store.attach_component(Entity(100), PositionComponent::new(Glyph::single(b'@'), 4, 9));

        let lookup = StoreLookup;
        assert_eq!(lookup.main_position(&store, Entity(100)), Some(GridPoint::new(4, 9)));
        assert_eq!(lookup.main_position(&store, Entity(101)), None);
    }

    #[test]
    fn test_registry_lookup_ignores_store() {
        let store = ComponentStore::new();
        let players = ActivePlayers::new();
        let lookup = build_lookup(LookupStrategy::Registry, &players);

        assert_eq!(lookup.main_position(&store, Entity(100)), None);
        players.update(Uuid::new_v4(), Entity(100), GridPoint::new(-2, 3));
        assert_eq!(lookup.main_position(&store, Entity(100)), Some(GridPoint::new(-2, 3)));

        assert_eq!(players.remove(Entity(100)), Some(GridPoint::new(-2, 3)));
        assert!(players.is_empty());
        assert_eq!(lookup.main_position(&store, Entity(100)), None);
    }

    #[test]
    fn test_refresh_only_touches_known_players() {
        let owner = Uuid::new_v4();
        let players = ActivePlayers::new();
        assert!(!players.refresh(owner, Entity(5), GridPoint::new(1, 1)));
        assert!(players.is_empty());

        players.update(owner, Entity(5), GridPoint::new(0, 0));
        assert!(players.refresh(owner, Entity(5), GridPoint::new(1, 1)));
        assert_eq!(players.get(Entity(5)), Some(GridPoint::new(1, 1)));
    }

    #[test]
    fn test_refresh_rejects_foreign_owner() {
        let (owner, intruder) = (Uuid::new_v4(), Uuid::new_v4());
        let players = ActivePlayers::new();
        players.update(owner, Entity(110), GridPoint::new(0, 0));

        assert!(!players.refresh(intruder, Entity(110), GridPoint::new(400, 400)));
        assert_eq!(players.get(Entity(110)), Some(GridPoint::new(0, 0)));
    }

    #[test]
    fn test_registry_is_shared_between_clones() {
        let players = ActivePlayers::new();
        let writer = players.clone();
        std::thread::spawn(move || writer.update(Uuid::nil(), Entity(7), GridPoint::new(1, 1)))
            .join()
            .unwrap();
        assert_eq!(players.len(), 1);
    }
}
