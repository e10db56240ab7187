//! NATS subject hierarchy.
//!
//! All subjects are prefixed with `royale.` to namespace within a shared
//! NATS cluster.

use uuid::Uuid;

/// Client reports (join, entity creation, movement, leave). Clients → Server.
pub const SESSION_INBOUND: &str = "royale.session.inbound";

/// Build the subject carrying JSON control messages to one client.
///
/// `royale.client.<client_id>.control`
#[must_use]
pub fn client_control(client_id: Uuid) -> String {
    format!("royale.client.{client_id}.control")
}

/// Build the subject carrying binary frames to one client.
///
/// `royale.client.<client_id>.frames`
#[must_use]
pub fn client_frames(client_id: Uuid) -> String {
    format!("royale.client.{client_id}.frames")
}
