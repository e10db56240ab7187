//! Connected clients and the frames routed to them.
//!
//! Every connected client has one [`TrackingInfo`]: its entity range and its
//! outbound [`Transport`]. The list is owned by the tick driver and only
//! changes between broadcast passes.

use std::sync::Arc;

use royale_component::{Entity, EntityRange};
use royale_net::Transport;
use uuid::Uuid;

/// One connected client.
#[derive(Clone)]
pub struct TrackingInfo {
    /// Connection id the client chose.
    pub client_id: Uuid,
    /// Ids the client owns; `range.lo()` is its main entity.
    pub range: EntityRange,
    /// Where this client's frames go.
    pub transport: Arc<dyn Transport>,
}

impl TrackingInfo {
    /// The client's main entity.
    #[must_use]
    pub fn anchor(&self) -> Entity {
        self.range.anchor()
    }
}

impl std::fmt::Debug for TrackingInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackingInfo")
            .field("client_id", &self.client_id)
            .field("range", &self.range)
            .finish_non_exhaustive()
    }
}

/// All connected clients, in join order.
#[derive(Debug, Default)]
pub struct TrackingList {
    clients: Vec<TrackingInfo>,
}

impl TrackingList {
    /// Create an empty list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a client. Returns `false` if `client_id` is already tracked.
    pub fn add(&mut self, info: TrackingInfo) -> bool {
        if self.get(info.client_id).is_some() {
            return false;
        }
        self.clients.push(info);
        true
    }

    /// Remove a client, returning its entry.
    pub fn remove(&mut self, client_id: Uuid) -> Option<TrackingInfo> {
        let idx = self.clients.iter().position(|c| c.client_id == client_id)?;
        Some(self.clients.remove(idx))
    }

    /// Look up a client.
    #[must_use]
    pub fn get(&self, client_id: Uuid) -> Option<&TrackingInfo> {
        self.clients.iter().find(|c| c.client_id == client_id)
    }

    /// The client whose range contains `entity`.
    #[must_use]
    pub fn owner_of(&self, entity: Entity) -> Option<&TrackingInfo> {
        self.clients.iter().find(|c| c.range.contains(entity))
    }

    /// Iterate clients in join order.
    pub fn iter(&self) -> std::slice::Iter<'_, TrackingInfo> {
        self.clients.iter()
    }

    /// Number of connected clients.
    #[must_use]
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    /// Returns `true` if nobody is connected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}
