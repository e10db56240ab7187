//! NATS edge of the server.
//!
//! Client reports arrive as JSON [`ClientEnvelope`]s on
//! [`SESSION_INBOUND`](royale_net::subjects::SESSION_INBOUND) and are queued
//! as [`SessionCommand`]s for the tick loop. A join also gets a frame
//! transport and its writer task here. Movement reports refresh the
//! [`ActivePlayers`] registry immediately, ahead of the tick boundary, but
//! only for the sender's own main entity.

use std::sync::Arc;

use futures::StreamExt;
use royale_component::GridPoint;
use royale_net::messages::{ClientEnvelope, ClientMessage, MapLayout};
use royale_net::{NatsConnection, NetError, QueueTransport, spawn_nats_writer, subjects};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::lookup::ActivePlayers;
use crate::session::{ControlReceiver, SessionCommand};
use crate::tick::CommandSender;

/// Routes inbound client reports to the tick loop.
#[derive(Debug, Clone)]
pub struct Gateway {
    conn: NatsConnection,
    commands: CommandSender,
    players: ActivePlayers,
    map: MapLayout,
}

impl Gateway {
    /// Create a gateway feeding `commands`.
    #[must_use]
    pub fn new(
        conn: NatsConnection,
        commands: CommandSender,
        players: ActivePlayers,
        map: MapLayout,
    ) -> Self {
        Self {
            conn,
            commands,
            players,
            map,
        }
    }

    /// Consume client reports until the subscription ends.
    ///
    /// Malformed payloads are logged and skipped.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::Subscribe`] if the inbound subject cannot be
    /// subscribed.
    pub async fn run(self) -> Result<(), NetError> {
        let mut inbound = self.conn.subscribe(subjects::SESSION_INBOUND).await?;
        info!(subject = subjects::SESSION_INBOUND, "listening for client reports");

        while let Some(msg) = inbound.next().await {
            match ClientEnvelope::from_json(&msg.payload) {
                Ok(envelope) => self.route(envelope),
                Err(e) => warn!(error = %e, len = msg.payload.len(), "malformed client report"),
            }
        }

        info!("client report subscription closed");
        Ok(())
    }

    fn route(&self, envelope: ClientEnvelope) {
        let client_id = envelope.client_id;
        let command = match envelope.message {
            ClientMessage::Join => {
                let (transport, frames) = QueueTransport::new();
                spawn_nats_writer(self.conn.clone(), subjects::client_frames(client_id), frames);
                debug!(%client_id, "join received");
                SessionCommand::Join {
                    client_id,
                    transport: Arc::new(transport),
                }
            }
            ClientMessage::Movement { .. } => {
                refresh_registry(&self.players, self.map, &envelope);
                SessionCommand::Report(envelope)
            }
            ClientMessage::CreateEntity { .. } | ClientMessage::Leave => {
                SessionCommand::Report(envelope)
            }
        };

        if self.commands.send(command).is_err() {
            warn!(%client_id, "tick loop gone; dropping client report");
        }
    }
}

/// Push a movement report's clamped cell into the registry.
///
/// Returns `true` if the sender's own main entity was updated. Reports about
/// entities the sender does not own leave the registry untouched.
fn refresh_registry(players: &ActivePlayers, map: MapLayout, envelope: &ClientEnvelope) -> bool {
    let ClientMessage::Movement { entity, x, y, .. } = envelope.message else {
        return false;
    };
    let (x, y) = map.clamp(x, y);
    let refreshed = players.refresh(envelope.client_id, entity, GridPoint::new(x, y));
    if !refreshed {
        trace!(client_id = %envelope.client_id, %entity, "movement not applied to registry");
    }
    refreshed
}

/// Spawn the task publishing queued control messages to their clients.
pub fn spawn_control_publisher(conn: NatsConnection, mut outbox: ControlReceiver) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(control) = outbox.recv().await {
            let subject = subjects::client_control(control.client_id);
            if let Err(e) = conn.publish(&subject, &control.message).await {
                warn!(subject, error = %e, "control publish failed");
            }
        }
        debug!("control publisher stopped");
    })
}

#[cfg(test)]
mod tests {
    use royale_component::Entity;
    use uuid::Uuid;

    use super::*;

    const MAP: MapLayout = MapLayout {
        width: 100,
        height: 100,
    };

    fn movement(client_id: Uuid, entity: u32, x: i16, y: i16) -> ClientEnvelope {
        ClientEnvelope {
            client_id,
            message: ClientMessage::Movement {
                entity: Entity(entity),
                x,
                y,
                movement_id: 1,
            },
        }
    }

    #[test]
    fn test_own_movement_refreshes_registry() {
        let a = Uuid::new_v4();
        let players = ActivePlayers::new();
        players.update(a, Entity(100), GridPoint::new(0, 0));

        assert!(refresh_registry(&players, MAP, &movement(a, 100, 5, 6)));
        assert_eq!(players.get(Entity(100)), Some(GridPoint::new(5, 6)));

        // Off-board reports land on the clamped cell.
        assert!(refresh_registry(&players, MAP, &movement(a, 100, 400, -3)));
        assert_eq!(players.get(Entity(100)), Some(GridPoint::new(99, 0)));
    }

    #[test]
    fn test_foreign_movement_leaves_registry_alone() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let players = ActivePlayers::new();
        players.update(a, Entity(100), GridPoint::new(0, 0));
        players.update(b, Entity(110), GridPoint::new(10, 10));

        assert!(!refresh_registry(&players, MAP, &movement(a, 110, 40, 40)));
        assert_eq!(players.get(Entity(110)), Some(GridPoint::new(10, 10)));
        assert_eq!(players.get(Entity(100)), Some(GridPoint::new(0, 0)));
    }

    #[test]
    fn test_non_movement_reports_skip_registry() {
        let a = Uuid::new_v4();
        let players = ActivePlayers::new();
        players.update(a, Entity(100), GridPoint::new(0, 0));
        let leave = ClientEnvelope {
            client_id: a,
            message: ClientMessage::Leave,
        };

        assert!(!refresh_registry(&players, MAP, &leave));
        assert_eq!(players.get(Entity(100)), Some(GridPoint::new(0, 0)));
    }
}
