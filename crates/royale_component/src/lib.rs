//! # royale_component
//!
//! Entities and components shared by the royale server and client.
//!
//! This crate provides:
//!
//! - [`Entity`] — lightweight `u32` entity identifiers.
//! - [`EntityRange`] — the contiguous id block each client owns.
//! - [`EntityAllocator`] / [`RangeAssigner`] — id and range hand-out.
//! - [`Component`] trait — the contract for data stored per entity.
//! - [`ComponentStore`] — per-entity typed storage with a per-type scan.
//! - [`PositionComponent`], [`NetworkSyncComponent`] — the components the
//!   network layer understands.

pub mod component;
pub mod entity;
pub mod store;

pub use component::{
    Component, ComponentTypeId, FALLBACK_GLYPH, ForcePosition, Glyph, GridPoint,
    NetworkSyncComponent, PositionComponent,
};
pub use entity::{Entity, EntityAllocator, EntityRange, RangeAssigner, RangeError};
pub use store::ComponentStore;
