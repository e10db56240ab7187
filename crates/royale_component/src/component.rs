//! Core [`Component`] trait and the components both sides of a session share.
//!
//! ## Type identity
//!
//! [`ComponentTypeId`] is derived from the component's **string name** using
//! the FNV-1a 64-bit hash. The id is stable across builds and processes,
//! unlike `std::any::TypeId`, so it can key storage and show up in logs.

use std::any::Any;

/// A unique identifier for a component type, derived from its string name
/// using the FNV-1a 64-bit hash algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentTypeId(pub u64);

impl ComponentTypeId {
    /// FNV-1a 64-bit offset basis.
    const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;

    /// FNV-1a 64-bit prime.
    const FNV_PRIME: u64 = 0x0100_0000_01b3;

    /// Compute the [`ComponentTypeId`] for a component name.
    ///
    /// ```text
    /// hash = 0xcbf29ce484222325
    /// for each byte in name.as_bytes():
    ///     hash = hash XOR byte
    ///     hash = hash * 0x00000100000001b3
    /// ```
    #[must_use]
    pub const fn from_name(name: &str) -> Self {
        let bytes = name.as_bytes();
        let mut hash = Self::FNV_OFFSET_BASIS;
        let mut i = 0;
        while i < bytes.len() {
            hash ^= bytes[i] as u64;
            hash = hash.wrapping_mul(Self::FNV_PRIME);
            i += 1;
        }
        Self(hash)
    }

    /// Compute the [`ComponentTypeId`] for a Rust component type `T`.
    #[must_use]
    pub fn of<T: Component>() -> Self {
        Self::from_name(T::type_name())
    }
}

/// The core component trait.
///
/// Anything attached to an entity in a [`ComponentStore`](crate::ComponentStore)
/// implements this. The store keeps at most one instance per
/// [`ComponentTypeId`] per entity.
///
/// # Examples
///
/// ```rust
/// use royale_component::Component;
///
/// #[derive(Debug, Clone)]
/// struct Health {
///     current: u16,
/// }
///
/// impl Component for Health {
///     fn type_name() -> &'static str { "Health" }
/// }
/// ```
pub trait Component: Any + Send + Sync {
    /// A human-readable, stable name for this component type.
    fn type_name() -> &'static str;

    /// Returns the [`ComponentTypeId`] for this component.
    fn component_type_id() -> ComponentTypeId {
        ComponentTypeId::from_name(Self::type_name())
    }
}

/// Character used on the wire when a glyph has no cells or its top-left cell
/// cannot be represented in one byte.
pub const FALLBACK_GLYPH: u8 = b'?';

/// A sprite of display characters, row-major.
///
/// Only the top-left cell travels over the network; how the remaining cells
/// are drawn is up to the renderer.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Glyph {
    cells: Vec<Vec<u8>>,
}

impl Glyph {
    /// A one-cell glyph.
    #[must_use]
    pub fn single(ch: u8) -> Self {
        Self {
            cells: vec![vec![ch]],
        }
    }

    /// A multi-cell glyph from rows of characters.
    #[must_use]
    pub fn from_rows(rows: Vec<Vec<u8>>) -> Self {
        Self { cells: rows }
    }

    /// The top-left cell, or [`FALLBACK_GLYPH`] for an empty glyph.
    #[must_use]
    pub fn top_left(&self) -> u8 {
        self.cells
            .first()
            .and_then(|row| row.first())
            .copied()
            .unwrap_or(FALLBACK_GLYPH)
    }

    /// Overwrite the top-left cell, growing an empty glyph to one cell.
    pub fn set_top_left(&mut self, ch: u8) {
        match self.cells.first_mut() {
            Some(row) if !row.is_empty() => row[0] = ch,
            Some(row) => row.push(ch),
            None => self.cells.push(vec![ch]),
        }
    }

    /// All rows of the glyph.
    #[must_use]
    pub fn rows(&self) -> &[Vec<u8>] {
        &self.cells
    }
}

/// A pending authoritative correction embedded in a [`PositionComponent`].
///
/// While `force` is set the next movement step snaps the owner to `(x, y)`,
/// throws away predictions made from `next_movement_id` on, and clears the
/// flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ForcePosition {
    /// Authoritative column.
    pub x: i16,
    /// Authoritative row.
    pub y: i16,
    /// First movement id the client should use after snapping.
    pub next_movement_id: u32,
    /// Whether the correction is still waiting to be applied.
    pub force: bool,
}

/// A cell on the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct GridPoint {
    /// Column.
    pub x: i16,
    /// Row.
    pub y: i16,
}

impl GridPoint {
    /// Create a point.
    #[must_use]
    pub const fn new(x: i16, y: i16) -> Self {
        Self { x, y }
    }

    /// `true` when `other` lies strictly inside the `width` x `height`
    /// half-extent box centred on `self`:
    /// `|self.x - other.x| < width && |self.y - other.y| < height`.
    #[must_use]
    pub fn is_within(&self, other: GridPoint, width: u16, height: u16) -> bool {
        let dx = (i32::from(self.x) - i32::from(other.x)).unsigned_abs();
        let dy = (i32::from(self.y) - i32::from(other.y)).unsigned_abs();
        dx < u32::from(width) && dy < u32::from(height)
    }
}

/// Position of an entity on the board plus any pending correction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionComponent {
    /// What the entity looks like.
    pub glyph: Glyph,
    /// Column.
    pub x: i16,
    /// Row.
    pub y: i16,
    /// Pending authoritative correction, if `force` is set.
    pub force_position: ForcePosition,
}

impl PositionComponent {
    /// A position with no pending correction.
    #[must_use]
    pub fn new(glyph: Glyph, x: i16, y: i16) -> Self {
        Self {
            glyph,
            x,
            y,
            force_position: ForcePosition::default(),
        }
    }

    /// The entity's grid cell.
    #[must_use]
    pub fn point(&self) -> GridPoint {
        GridPoint {
            x: self.x,
            y: self.y,
        }
    }
}

impl Component for PositionComponent {
    fn type_name() -> &'static str {
        "PositionComponent"
    }
}

/// Marker: entities carrying this are relayed to other clients each tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NetworkSyncComponent;

impl Component for NetworkSyncComponent {
    fn type_name() -> &'static str {
        "NetworkSyncComponent"
    }
}
