//! Entity/component storage.
//!
//! The [`ComponentStore`] maps each entity to at most one instance of each
//! component type, plus a per-type index of holders so that
//! [`ComponentStore::for_each`] costs O(entities holding that type), not
//! O(all entities).
//!
//! Lookups fail softly: a missing entity or component is `None`, never an
//! error. Both sides of a session see references to entities whose first
//! update has not arrived yet, and skipping them is the expected response.

use std::any::Any;
use std::collections::{HashMap, HashSet};

use crate::component::{Component, ComponentTypeId};
use crate::entity::Entity;

type BoxedComponent = Box<dyn Any + Send + Sync>;

/// Per-entity keyed storage of typed components.
#[derive(Default)]
pub struct ComponentStore {
    /// Component instances, keyed by entity then by component type.
    entities: HashMap<Entity, HashMap<ComponentTypeId, BoxedComponent>>,
    /// Which entities currently hold each component type.
    holders: HashMap<ComponentTypeId, HashSet<Entity>>,
}

impl ComponentStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `entity` if absent.
    ///
    /// Returns `true` only on the call that created it; repeated calls are
    /// no-ops returning `false`.
    pub fn set_new_entity(&mut self, entity: Entity) -> bool {
        if self.entities.contains_key(&entity) {
            return false;
        }
        self.entities.insert(entity, HashMap::new());
        true
    }

    /// Returns `true` if `entity` has been registered.
    #[must_use]
    pub fn contains(&self, entity: Entity) -> bool {
        self.entities.contains_key(&entity)
    }

    /// Attach `component` to `entity`, replacing any component of the same
    /// type. Registers the entity if it was not known yet.
    pub fn attach_component<T: Component>(&mut self, entity: Entity, component: T) {
        let type_id = T::component_type_id();
        self.entities
            .entry(entity)
            .or_default()
            .insert(type_id, Box::new(component));
        self.holders.entry(type_id).or_default().insert(entity);
    }

    /// Get a component, or `None` if the entity or component is missing.
    #[must_use]
    pub fn get_component<T: Component>(&self, entity: Entity) -> Option<&T> {
        self.entities
            .get(&entity)?
            .get(&T::component_type_id())?
            .downcast_ref::<T>()
    }

    /// Mutable variant of [`ComponentStore::get_component`].
    #[must_use]
    pub fn get_component_mut<T: Component>(&mut self, entity: Entity) -> Option<&mut T> {
        self.entities
            .get_mut(&entity)?
            .get_mut(&T::component_type_id())?
            .downcast_mut::<T>()
    }

    /// Returns `true` if `entity` currently holds a `T`.
    #[must_use]
    pub fn has_component<T: Component>(&self, entity: Entity) -> bool {
        self.holders
            .get(&T::component_type_id())
            .is_some_and(|set| set.contains(&entity))
    }

    /// Detach and return the `T` on `entity`, if any.
    pub fn remove_component<T: Component>(&mut self, entity: Entity) -> Option<T> {
        let type_id = T::component_type_id();
        let boxed = self.entities.get_mut(&entity)?.remove(&type_id)?;
        if let Some(set) = self.holders.get_mut(&type_id) {
            set.remove(&entity);
        }
        boxed.downcast::<T>().ok().map(|b| *b)
    }

    /// Remove `entity` and every component it holds.
    ///
    /// Returns `true` if the entity existed.
    pub fn remove_entity(&mut self, entity: Entity) -> bool {
        let Some(components) = self.entities.remove(&entity) else {
            return false;
        };
        for type_id in components.keys() {
            if let Some(set) = self.holders.get_mut(type_id) {
                set.remove(&entity);
            }
        }
        true
    }

    /// Visit every entity currently holding a `T`.
    ///
    /// Visit order is unspecified and may change between calls. The store is
    /// borrowed immutably for the whole scan, so no entity can gain or lose
    /// components mid-iteration and every holder is visited exactly once.
    /// Callers that need to mutate while scanning take a snapshot with
    /// [`ComponentStore::entities_with`] first.
    pub fn for_each<T: Component>(&self, mut f: impl FnMut(Entity, &T)) {
        let Some(set) = self.holders.get(&T::component_type_id()) else {
            return;
        };
        for &entity in set {
            if let Some(component) = self.get_component::<T>(entity) {
                f(entity, component);
            }
        }
    }

    /// Snapshot of every entity currently holding a `T`.
    #[must_use]
    pub fn entities_with<T: Component>(&self) -> Vec<Entity> {
        self.holders
            .get(&T::component_type_id())
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Number of registered entities.
    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }
}

impl std::fmt::Debug for ComponentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentStore")
            .field("entities", &self.entities.len())
            .field("component_types", &self.holders.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::{Glyph, NetworkSyncComponent, PositionComponent};

    fn pos(x: i16, y: i16) -> PositionComponent {
        PositionComponent::new(Glyph::single(b'@'), x, y)
    }

    #[test]
    fn test_set_new_entity_is_idempotent() {
        let mut store = ComponentStore::new();
        assert!(store.set_new_entity(Entity(7)));
        assert!(!store.set_new_entity(Entity(7)));
        assert_eq!(store.entity_count(), 1);
    }

    #[test]
    fn test_attach_replaces_same_type() {
        let mut store = ComponentStore::new();
        store.set_new_entity(Entity(1));
        store.attach_component(Entity(1), pos(1, 1));
        store.attach_component(Entity(1), pos(9, 9));

        let got = store.get_component::<PositionComponent>(Entity(1)).unwrap();
        assert_eq!((got.x, got.y), (9, 9));

        let mut seen = 0;
        store.for_each::<PositionComponent>(|_, _| seen += 1);
        assert_eq!(seen, 1);
    }

    #[test]
    fn test_missing_lookups_are_none() {
        let mut store = ComponentStore::new();
        assert!(store.get_component::<PositionComponent>(Entity(3)).is_none());

        store.set_new_entity(Entity(3));
        assert!(store.get_component::<PositionComponent>(Entity(3)).is_none());
        assert!(store.get_component_mut::<PositionComponent>(Entity(3)).is_none());
        assert!(!store.has_component::<PositionComponent>(Entity(3)));
    }

    #[test]
    fn test_for_each_visits_only_holders() {
        let mut store = ComponentStore::new();
        for id in 0..10 {
            store.attach_component(Entity(id), pos(id as i16, 0));
            if id % 2 == 0 {
                store.attach_component(Entity(id), NetworkSyncComponent);
            }
        }

        let mut synced = Vec::new();
        store.for_each::<NetworkSyncComponent>(|e, _| synced.push(e.id()));
        synced.sort_unstable();
        assert_eq!(synced, vec![0, 2, 4, 6, 8]);
    }

    #[test]
    fn test_get_component_mut_updates_in_place() {
        let mut store = ComponentStore::new();
        store.attach_component(Entity(4), pos(0, 0));
        if let Some(p) = store.get_component_mut::<PositionComponent>(Entity(4)) {
            p.x = 12;
        }
        assert_eq!(store.get_component::<PositionComponent>(Entity(4)).unwrap().x, 12);
    }

    #[test]
    fn test_remove_component_updates_index() {
        let mut store = ComponentStore::new();
        store.attach_component(Entity(2), NetworkSyncComponent);
        assert_eq!(
            store.remove_component::<NetworkSyncComponent>(Entity(2)),
            Some(NetworkSyncComponent)
        );
        assert!(store.entities_with::<NetworkSyncComponent>().is_empty());
        assert!(store.contains(Entity(2)));
    }

    #[test]
    fn test_remove_entity_drops_all_components() {
        let mut store = ComponentStore::new();
        store.attach_component(Entity(5), pos(1, 2));
        store.attach_component(Entity(5), NetworkSyncComponent);

        assert!(store.remove_entity(Entity(5)));
        assert!(!store.remove_entity(Entity(5)));
        assert!(store.entities_with::<PositionComponent>().is_empty());
        assert!(store.entities_with::<NetworkSyncComponent>().is_empty());
    }

    #[test]
    fn test_snapshot_allows_mutation_while_scanning() {
        let mut store = ComponentStore::new();
        for id in 0..4 {
            store.attach_component(Entity(id), NetworkSyncComponent);
        }
        let mut visited = 0;
        for entity in store.entities_with::<NetworkSyncComponent>() {
            // Adding holders mid-scan must not hide any existing one.
            store.attach_component(Entity(entity.id() + 100), NetworkSyncComponent);
            visited += 1;
        }
        assert_eq!(visited, 4);
        assert_eq!(store.entities_with::<NetworkSyncComponent>().len(), 8);
    }
}
