//! Entity identifiers, per-client entity ranges, and range allocation.
//!
//! An [`Entity`] is a bare `u32`, the same width it has on the wire. Each
//! connected client owns a contiguous [`EntityRange`] handed out at session
//! start; ids outside every range belong to non-player objects such as
//! projectiles.

use serde::{Deserialize, Serialize};

/// A unique entity identifier.
///
/// Entities are pure identifiers. Components attached to them in a
/// [`ComponentStore`](crate::ComponentStore) give them meaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Entity(pub u32);

impl Entity {
    /// Create an entity from a raw `u32` identifier.
    #[must_use]
    pub const fn from_raw(id: u32) -> Self {
        Self(id)
    }

    /// Returns the raw `u32` identifier.
    #[must_use]
    pub const fn id(self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Entity({})", self.0)
    }
}

/// Errors raised by range construction and allocation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RangeError {
    /// The lower bound was above the upper bound.
    #[error("invalid entity range [{lo}, {hi})")]
    Inverted {
        /// Requested lower bound.
        lo: u32,
        /// Requested upper bound.
        hi: u32,
    },

    /// Every id in the range has already been handed out.
    #[error("entity range {0} exhausted")]
    Exhausted(EntityRange),
}

/// A half-open range of entity ids `[lo, hi)` owned by one client.
///
/// Ownership is a pure bounds check, no lookup table is involved. Ranges
/// handed out by a single [`RangeAssigner`] never overlap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "[u32; 2]", try_from = "[u32; 2]")]
pub struct EntityRange {
    lo: u32,
    hi: u32,
}

impl EntityRange {
    /// Build a range, rejecting `lo > hi`.
    ///
    /// # Errors
    ///
    /// Returns [`RangeError::Inverted`] when the bounds are reversed.
    pub const fn new(lo: u32, hi: u32) -> Result<Self, RangeError> {
        if lo > hi {
            return Err(RangeError::Inverted { lo, hi });
        }
        Ok(Self { lo, hi })
    }

    /// Inclusive lower bound. This is also the client's anchor (player) entity.
    #[must_use]
    pub const fn lo(&self) -> u32 {
        self.lo
    }

    /// Exclusive upper bound.
    #[must_use]
    pub const fn hi(&self) -> u32 {
        self.hi
    }

    /// The entity anchoring the owning client's viewport.
    #[must_use]
    pub const fn anchor(&self) -> Entity {
        Entity(self.lo)
    }

    /// Returns `true` if `entity` falls inside `[lo, hi)`.
    #[must_use]
    pub const fn contains(&self, entity: Entity) -> bool {
        entity.0 >= self.lo && entity.0 < self.hi
    }

    /// Number of ids in the range.
    #[must_use]
    pub const fn len(&self) -> u32 {
        self.hi - self.lo
    }

    /// Returns `true` if the range holds no ids.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.lo == self.hi
    }

    /// Iterate over every entity in the range.
    pub fn iter(&self) -> impl Iterator<Item = Entity> {
        (self.lo..self.hi).map(Entity)
    }
}

impl std::fmt::Display for EntityRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {})", self.lo, self.hi)
    }
}

impl From<EntityRange> for [u32; 2] {
    fn from(range: EntityRange) -> Self {
        [range.lo, range.hi]
    }
}

impl TryFrom<[u32; 2]> for EntityRange {
    type Error = RangeError;

    fn try_from([lo, hi]: [u32; 2]) -> Result<Self, Self::Error> {
        Self::new(lo, hi)
    }
}

/// Hands out ids from a single [`EntityRange`], lowest first.
///
/// The first id allocated is always the range's anchor entity. Ids are not
/// recycled.
#[derive(Debug, Clone)]
pub struct EntityAllocator {
    range: EntityRange,
    next_id: u32,
}

impl EntityAllocator {
    /// Creates an allocator over `range`.
    #[must_use]
    pub fn new(range: EntityRange) -> Self {
        Self {
            range,
            next_id: range.lo,
        }
    }

    /// Allocates the next free id in the range.
    ///
    /// # Errors
    ///
    /// Returns [`RangeError::Exhausted`] once every id has been handed out.
    pub fn allocate(&mut self) -> Result<Entity, RangeError> {
        if self.next_id >= self.range.hi {
            return Err(RangeError::Exhausted(self.range));
        }
        let id = self.next_id;
        self.next_id += 1;
        Ok(Entity(id))
    }

    /// Returns the number of entities allocated so far.
    #[must_use]
    pub fn count(&self) -> u32 {
        self.next_id - self.range.lo
    }

    /// The range this allocator draws from.
    #[must_use]
    pub fn range(&self) -> EntityRange {
        self.range
    }
}

/// Assigns disjoint, contiguous ranges of a fixed width to joining clients.
///
/// Lives on the server. Ranges are never reused within a session, so a late
/// frame for a departed client can never be mistaken for a new one.
#[derive(Debug, Clone)]
pub struct RangeAssigner {
    next_lo: u32,
    width: u32,
}

impl RangeAssigner {
    /// Creates an assigner starting at `first_id`, handing out `width` ids
    /// per client.
    #[must_use]
    pub fn new(first_id: u32, width: u32) -> Self {
        Self {
            next_lo: first_id,
            width,
        }
    }

    /// Assigns the next range.
    ///
    /// # Errors
    ///
    /// Returns [`RangeError::Exhausted`] when the `u32` id space is used up.
    pub fn assign(&mut self) -> Result<EntityRange, RangeError> {
        let lo = self.next_lo;
        let Some(hi) = lo.checked_add(self.width) else {
            return Err(RangeError::Exhausted(EntityRange { lo, hi: u32::MAX }));
        };
        self.next_lo = hi;
        EntityRange::new(lo, hi)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_creation() {
        let e = Entity::from_raw(42);
        assert_eq!(e.id(), 42);
        assert_eq!(e.to_string(), "Entity(42)");
    }

    #[test]
    fn test_range_contains_is_half_open() {
        let range = EntityRange::new(100, 110).unwrap();
        assert!(range.contains(Entity(100)));
        assert!(range.contains(Entity(105)));
        assert!(range.contains(Entity(109)));
        assert!(!range.contains(Entity(110)));
        assert!(!range.contains(Entity(99)));
        assert_eq!(range.anchor(), Entity(100));
        assert_eq!(range.len(), 10);
    }

    #[test]
    fn test_inverted_range_rejected() {
        assert_eq!(
            EntityRange::new(5, 1),
            Err(RangeError::Inverted { lo: 5, hi: 1 })
        );
    }

    #[test]
    fn test_allocator_stays_inside_range() {
        let range = EntityRange::new(10, 13).unwrap();
        let mut alloc = EntityAllocator::new(range);
        assert_eq!(alloc.allocate(), Ok(Entity(10)));
        assert_eq!(alloc.allocate(), Ok(Entity(11)));
        assert_eq!(alloc.allocate(), Ok(Entity(12)));
        assert_eq!(alloc.allocate(), Err(RangeError::Exhausted(range)));
        assert_eq!(alloc.count(), 3);
    }

    #[test]
    fn test_assigned_ranges_are_disjoint() {
        let mut assigner = RangeAssigner::new(100, 10);
        let a = assigner.assign().unwrap();
        let b = assigner.assign().unwrap();
        assert_eq!((a.lo(), a.hi()), (100, 110));
        assert_eq!((b.lo(), b.hi()), (110, 120));
        assert!(a.iter().all(|e| !b.contains(e)));
    }

    #[test]
    fn test_assigner_reports_exhaustion() {
        let mut assigner = RangeAssigner::new(u32::MAX - 5, 10);
        assert!(matches!(assigner.assign(), Err(RangeError::Exhausted(_))));
    }

    #[test]
    fn test_range_serializes_as_pair() {
        let range = EntityRange::new(3, 7).unwrap();
        let json = serde_json::to_string(&range).unwrap();
        assert_eq!(json, "[3,7]");
        let restored: EntityRange = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, range);
        assert!(serde_json::from_str::<EntityRange>("[7,3]").is_err());
    }
}
