//! # royale_client
//!
//! The client side of a royale session: predicts the player's movement
//! locally, reconciles it against server corrections, and mirrors remote
//! entities relayed by the server.
//!
//! - [`session`] — the per-game client context.
//! - [`reconcile`] — applying server frames.
//! - [`movement`] — prediction and the correction snap.
//! - [`dispatch`] — in-order event handling.
//! - [`runner`] — the NATS-connected lifecycle.
//! - [`config`] — client settings and command line.

pub mod config;
pub mod dispatch;
pub mod movement;
pub mod reconcile;
pub mod runner;
pub mod session;

pub use config::{ClientArgs, ClientConfig};
pub use dispatch::{Dispatcher, Event};
pub use movement::Direction;
pub use runner::ClientRunner;
pub use session::ClientSession;
