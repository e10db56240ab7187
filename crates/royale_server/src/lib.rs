//! # royale_server
//!
//! The authoritative side of a royale session: the component store, client
//! tracking, area-of-interest broadcast, and the tick loop that drives them.
//!
//! - [`session`] — session state and the commands that change it.
//! - [`broadcast`] — the per-tick position relay.
//! - [`lookup`] — where main-entity positions come from.
//! - [`tracking`] — connected clients and their transports.
//! - [`tick`] — the fixed-timestep loop.
//! - [`gateway`] — NATS ingest and control publishing.
//! - [`config`] — command line and derived settings.

pub mod broadcast;
pub mod config;
pub mod gateway;
pub mod lookup;
pub mod session;
pub mod tick;
pub mod tracking;
