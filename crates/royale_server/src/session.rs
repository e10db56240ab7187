//! Authoritative session state.
//!
//! [`ServerSession`] owns the component store and the tracking list. It is
//! driven by [`SessionCommand`]s that the NATS gateway queues and the tick
//! loop applies between broadcast passes, so neither structure is ever
//! touched while a pass is iterating it.

use std::sync::Arc;

use royale_component::{
    ComponentStore, Entity, EntityRange, FALLBACK_GLYPH, Glyph, GridPoint, NetworkSyncComponent,
    PositionComponent, RangeAssigner, RangeError,
};
use royale_net::messages::{
    ClientEnvelope, ClientMessage, MapLayout, ServerMessage, StartGameMessage,
};
use royale_net::{
    BufferPool, EncodeError, PositionCorrection, Transport, encode_position_correction,
    frames::CORRECT_POSITION_SIZE,
};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::lookup::ActivePlayers;
use crate::tracking::{TrackingInfo, TrackingList};

/// Errors raised while applying a [`SessionCommand`].
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The command came from a client that has not joined.
    #[error("unknown client {0}")]
    UnknownClient(Uuid),

    /// A client joined twice.
    #[error("client {0} already joined")]
    AlreadyJoined(Uuid),

    /// A client reported an entity outside its range.
    #[error("client {client_id} does not own {entity}")]
    ForeignEntity {
        /// The reporting client.
        client_id: Uuid,
        /// The entity it reported.
        entity: Entity,
    },

    /// No entity ids left to hand out.
    #[error(transparent)]
    Range(#[from] RangeError),

    /// A correction frame could not be encoded.
    #[error(transparent)]
    Encode(#[from] EncodeError),
}

/// A change to session state, queued until the next tick boundary.
pub enum SessionCommand {
    /// A new client with its frame transport.
    Join {
        /// Connection id.
        client_id: Uuid,
        /// Where its frames go.
        transport: Arc<dyn Transport>,
    },
    /// Any other client report.
    Report(ClientEnvelope),
    /// Drop a client and everything it owns.
    Disconnect(Uuid),
}

impl std::fmt::Debug for SessionCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Join { client_id, .. } => f
                .debug_struct("Join")
                .field("client_id", client_id)
                .finish_non_exhaustive(),
            Self::Report(envelope) => f.debug_tuple("Report").field(envelope).finish(),
            Self::Disconnect(client_id) => f.debug_tuple("Disconnect").field(client_id).finish(),
        }
    }
}

/// A control message bound for one client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlMessage {
    /// Recipient.
    pub client_id: Uuid,
    /// Payload.
    pub message: ServerMessage,
}

/// Sending half of the control outbox.
pub type ControlSender = mpsc::UnboundedSender<ControlMessage>;

/// Receiving half of the control outbox.
pub type ControlReceiver = mpsc::UnboundedReceiver<ControlMessage>;

/// The server's view of the game.
#[derive(Debug)]
pub struct ServerSession {
    store: ComponentStore,
    clients: TrackingList,
    players: ActivePlayers,
    assigner: RangeAssigner,
    map: MapLayout,
    corrections: BufferPool,
    control: ControlSender,
}

impl ServerSession {
    /// Create an empty session handing out `entities_per_client` ids per
    /// client starting at `first_id`.
    #[must_use]
    pub fn new(
        map: MapLayout,
        first_id: u32,
        entities_per_client: u32,
        players: ActivePlayers,
        control: ControlSender,
    ) -> Self {
        Self {
            store: ComponentStore::new(),
            clients: TrackingList::new(),
            players,
            assigner: RangeAssigner::new(first_id, entities_per_client),
            map,
            corrections: BufferPool::new(CORRECT_POSITION_SIZE),
            control,
        }
    }

    /// The component store.
    #[must_use]
    pub fn store(&self) -> &ComponentStore {
        &self.store
    }

    /// Mutable access to the component store.
    pub fn store_mut(&mut self) -> &mut ComponentStore {
        &mut self.store
    }

    /// Connected clients.
    #[must_use]
    pub fn clients(&self) -> &TrackingList {
        &self.clients
    }

    /// The board.
    #[must_use]
    pub fn map(&self) -> MapLayout {
        self.map
    }

    /// Apply one queued command.
    ///
    /// # Errors
    ///
    /// Returns a [`SessionError`] if the command is rejected; session state
    /// is left unchanged in that case.
    pub fn apply(&mut self, command: SessionCommand) -> Result<(), SessionError> {
        match command {
            SessionCommand::Join {
                client_id,
                transport,
            } => self.join(client_id, transport).map(|_| ()),
            SessionCommand::Report(ClientEnvelope { client_id, message }) => match message {
                ClientMessage::Join => {
                    warn!(%client_id, "join report without a transport; ignoring");
                    Ok(())
                }
                ClientMessage::CreateEntity { entity, x, y, glyph } => {
                    self.create_entity(client_id, entity, x, y, glyph)
                }
                ClientMessage::Movement {
                    entity,
                    x,
                    y,
                    movement_id,
                } => self.movement(client_id, entity, x, y, movement_id),
                ClientMessage::Leave => {
                    self.disconnect(client_id);
                    Ok(())
                }
            },
            SessionCommand::Disconnect(client_id) => {
                self.disconnect(client_id);
                Ok(())
            }
        }
    }

    /// Admit a client: assign its range and send it the session start.
    ///
    /// The player entity is not created here; it appears once the client
    /// reports it.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::AlreadyJoined`] or [`SessionError::Range`].
    pub fn join(
        &mut self,
        client_id: Uuid,
        transport: Arc<dyn Transport>,
    ) -> Result<StartGameMessage, SessionError> {
        if self.clients.get(client_id).is_some() {
            return Err(SessionError::AlreadyJoined(client_id));
        }
        let range = self.assigner.assign()?;
        let (x, y) = spawn_point(range, self.map);
        self.clients.add(TrackingInfo {
            client_id,
            range,
            transport,
        });

        let start = StartGameMessage {
            entity_id_range: range,
            position: [x, y],
            map: self.map,
        };
        info!(
            %client_id,
            %range,
            x,
            y,
            clients = self.clients.len(),
            "client joined"
        );
        self.send_control(client_id, ServerMessage::StartGame(start.clone()));
        Ok(start)
    }

    /// Record a newly announced entity.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::UnknownClient`] or
    /// [`SessionError::ForeignEntity`].
    pub fn create_entity(
        &mut self,
        client_id: Uuid,
        entity: Entity,
        x: i16,
        y: i16,
        glyph: u8,
    ) -> Result<(), SessionError> {
        let range = self.owned_range(client_id, entity)?;
        let (x, y) = self.map.clamp(x, y);
        self.store.set_new_entity(entity);
        self.store
            .attach_component(entity, PositionComponent::new(Glyph::single(glyph), x, y));
        self.store.attach_component(entity, NetworkSyncComponent);
        if entity == range.anchor() {
            self.players.update(client_id, entity, GridPoint::new(x, y));
        }
        debug!(%client_id, %entity, x, y, "entity created");
        Ok(())
    }

    /// Apply a predicted move.
    ///
    /// A move off the board is clamped, and the client is sent a correction
    /// telling it to resume from `movement_id + 1`.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::UnknownClient`],
    /// [`SessionError::ForeignEntity`], or [`SessionError::Encode`].
    pub fn movement(
        &mut self,
        client_id: Uuid,
        entity: Entity,
        x: i16,
        y: i16,
        movement_id: u32,
    ) -> Result<(), SessionError> {
        let range = self.owned_range(client_id, entity)?;
        let (cx, cy) = self.map.clamp(x, y);

        match self.store.get_component_mut::<PositionComponent>(entity) {
            Some(position) => {
                position.x = cx;
                position.y = cy;
            }
            None => {
                self.store.attach_component(
                    entity,
                    PositionComponent::new(Glyph::single(FALLBACK_GLYPH), cx, cy),
                );
                self.store.attach_component(entity, NetworkSyncComponent);
            }
        }
        if entity == range.anchor() {
            self.players.update(client_id, entity, GridPoint::new(cx, cy));
        }

        if (cx, cy) != (x, y) {
            let correction = PositionCorrection {
                x: cx,
                y: cy,
                next_movement_id: movement_id.wrapping_add(1),
            };
            debug!(
                %client_id,
                %entity,
                x,
                y,
                movement_id,
                "move off board; correcting to ({cx}, {cy})"
            );
            self.send_correction(client_id, &correction)?;
        }
        Ok(())
    }

    /// Remove a client, its entities, and its registry entry.
    ///
    /// Returns `false` if the client was not connected.
    pub fn disconnect(&mut self, client_id: Uuid) -> bool {
        let Some(info) = self.clients.remove(client_id) else {
            return false;
        };
        let mut removed = 0usize;
        for entity in info.range.iter() {
            if self.store.remove_entity(entity) {
                removed += 1;
            }
        }
        self.players.remove(info.anchor());
        info!(
            %client_id,
            range = %info.range,
            removed,
            clients = self.clients.len(),
            "client disconnected"
        );
        true
    }

    fn owned_range(&self, client_id: Uuid, entity: Entity) -> Result<EntityRange, SessionError> {
        let info = self
            .clients
            .get(client_id)
            .ok_or(SessionError::UnknownClient(client_id))?;
        if !info.range.contains(entity) {
            return Err(SessionError::ForeignEntity { client_id, entity });
        }
        Ok(info.range)
    }

    fn send_correction(
        &mut self,
        client_id: Uuid,
        correction: &PositionCorrection,
    ) -> Result<(), SessionError> {
        let Some(info) = self.clients.get(client_id) else {
            return Err(SessionError::UnknownClient(client_id));
        };
        let mut buf = self.corrections.acquire();
        encode_position_correction(correction, &mut buf)?;
        let sent = info.transport.send(buf);
        if let Err(e) = sent {
            warn!(%client_id, error = %e, "failed to send correction");
            self.disconnect(client_id);
        }
        Ok(())
    }

    fn send_control(&self, client_id: Uuid, message: ServerMessage) {
        if self.control.send(ControlMessage { client_id, message }).is_err() {
            warn!(%client_id, "control outbox closed; message dropped");
        }
    }
}

/// Deterministic starting cell for the owner of `range`, spread across the
/// board so consecutive joins do not stack.
fn spawn_point(range: EntityRange, map: MapLayout) -> (i16, i16) {
    let seed = u64::from(range.lo());
    let x = seed.wrapping_mul(37) % u64::from(map.width.max(1));
    let y = seed.wrapping_mul(53) % u64::from(map.height.max(1));
    map.clamp(
        i16::try_from(x).unwrap_or(i16::MAX),
        i16::try_from(y).unwrap_or(i16::MAX),
    )
}

#[cfg(test)]
mod tests {
    use royale_net::{Frame, FrameReceiver, QueueTransport};

    use super::*;

    const MAP: MapLayout = MapLayout {
        width: 50,
        height: 20,
    };

    fn session() -> (ServerSession, ActivePlayers, ControlReceiver) {
        let players = ActivePlayers::new();
        let (tx, rx) = mpsc::unbounded_channel();
        (ServerSession::new(MAP, 100, 10, players.clone(), tx), players, rx)
    }

    fn join(session: &mut ServerSession) -> (Uuid, StartGameMessage, FrameReceiver) {
        let (transport, rx) = QueueTransport::new();
        let client_id = Uuid::new_v4();
        let start = session.join(client_id, Arc::new(transport)).unwrap();
        (client_id, start, rx)
    }

    fn report(client_id: Uuid, message: ClientMessage) -> SessionCommand {
        SessionCommand::Report(ClientEnvelope { client_id, message })
    }

    #[test]
    fn test_join_assigns_disjoint_ranges_and_sends_start() {
        let (mut session, _, mut control) = session();
        let (a, start_a, _rx_a) = join(&mut session);
        let (_, start_b, _rx_b) = join(&mut session);

        assert_eq!(start_a.entity_id_range, EntityRange::new(100, 110).unwrap());
        assert_eq!(start_b.entity_id_range, EntityRange::new(110, 120).unwrap());
        assert!(MAP.contains(start_a.position[0], start_a.position[1]));
        assert_eq!(start_a.map, MAP);

        let first = control.try_recv().unwrap();
        assert_eq!(first.client_id, a);
        assert_eq!(first.message, ServerMessage::StartGame(start_a));
        assert_eq!(session.clients().len(), 2);
    }

    #[test]
    fn test_double_join_rejected() {
        let (mut session, _, _control) = session();
        let (a, _, _rx) = join(&mut session);
        let (transport, _rx2) = QueueTransport::new();
        assert!(matches!(
            session.join(a, Arc::new(transport)),
            Err(SessionError::AlreadyJoined(id)) if id == a
        ));
        assert_eq!(session.clients().len(), 1);
    }

    #[test]
    fn test_create_entity_updates_store_and_registry() {
        let (mut session, players, _control) = session();
        let (a, _, _rx) = join(&mut session);

        session
            .apply(report(
                a,
                ClientMessage::CreateEntity {
                    entity: Entity(100),
                    x: 3,
                    y: 4,
                    glyph: b'@',
                },
            ))
            .unwrap();
        session
            .apply(report(
                a,
                ClientMessage::CreateEntity {
                    entity: Entity(101),
                    x: 5,
                    y: 4,
                    glyph: b'*',
                },
            ))
            .unwrap();

        let pos = session.store().get_component::<PositionComponent>(Entity(100)).unwrap();
        assert_eq!((pos.x, pos.y, pos.glyph.top_left()), (3, 4, b'@'));
        assert!(session.store().has_component::<NetworkSyncComponent>(Entity(101)));
        assert_eq!(players.get(Entity(100)), Some(GridPoint::new(3, 4)));
        assert_eq!(players.get(Entity(101)), None);
    }

    #[test]
    fn test_foreign_and_unknown_reports_rejected() {
        let (mut session, _, _control) = session();
        let (a, _, _rx) = join(&mut session);

        let foreign = session.apply(report(
            a,
            ClientMessage::Movement {
                entity: Entity(150),
                x: 0,
                y: 0,
                movement_id: 1,
            },
        ));
        assert!(matches!(foreign, Err(SessionError::ForeignEntity { .. })));

        let unknown = session.apply(report(
            Uuid::new_v4(),
            ClientMessage::Movement {
                entity: Entity(100),
                x: 0,
                y: 0,
                movement_id: 1,
            },
        ));
        assert!(matches!(unknown, Err(SessionError::UnknownClient(_))));
        assert_eq!(session.store().entity_count(), 0);
    }

    #[test]
    fn test_on_board_movement_has_no_correction() {
        let (mut session, _, _control) = session();
        let (a, _, mut rx) = join(&mut session);

        session.movement(a, Entity(100), 10, 10, 1).unwrap();
        session.movement(a, Entity(100), 11, 10, 2).unwrap();

        let pos = session.store().get_component::<PositionComponent>(Entity(100)).unwrap();
        assert_eq!((pos.x, pos.y), (11, 10));
        assert_eq!(pos.glyph.top_left(), FALLBACK_GLYPH);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_off_board_movement_is_clamped_and_corrected() {
        let (mut session, players, _control) = session();
        let (a, _, mut rx) = join(&mut session);

        session.movement(a, Entity(100), 60, -2, 41).unwrap();

        let pos = session.store().get_component::<PositionComponent>(Entity(100)).unwrap();
        assert_eq!((pos.x, pos.y), (49, 0));
        assert_eq!(players.get(Entity(100)), Some(GridPoint::new(49, 0)));

        let frame = rx.try_recv().unwrap();
        assert_eq!(
            Frame::decode(frame.as_bytes()).unwrap(),
            Frame::Correction(PositionCorrection {
                x: 49,
                y: 0,
                next_movement_id: 42,
            })
        );
    }

    #[test]
    fn test_leave_removes_owned_entities_only() {
        let (mut session, players, _control) = session();
        let (a, _, _rx_a) = join(&mut session);
        let (b, _, _rx_b) = join(&mut session);
        session.create_entity(a, Entity(100), 1, 1, b'a').unwrap();
        session.create_entity(a, Entity(104), 2, 1, b'*').unwrap();
        session.create_entity(b, Entity(110), 3, 1, b'b').unwrap();

        session.apply(report(a, ClientMessage::Leave)).unwrap();

        assert!(session.clients().get(a).is_none());
        assert!(!session.store().contains(Entity(100)));
        assert!(!session.store().contains(Entity(104)));
        assert!(session.store().contains(Entity(110)));
        assert_eq!(players.get(Entity(100)), None);
        assert!(!session.disconnect(a));
    }

    #[test]
    fn test_correction_to_closed_client_disconnects_it() {
        let (mut session, _, _control) = session();
        let (a, _, rx) = join(&mut session);
        session.create_entity(a, Entity(100), 1, 1, b'a').unwrap();
        drop(rx);

        session.movement(a, Entity(100), -5, 1, 7).unwrap();

        assert!(session.clients().is_empty());
        assert_eq!(session.store().entity_count(), 0);
    }

    #[test]
    fn test_spawn_point_on_board() {
        for lo in [0, 1, 1_000, u32::MAX - 1] {
            let range = EntityRange::new(lo, lo + 1).unwrap();
            let (x, y) = spawn_point(range, MAP);
            assert!(MAP.contains(x, y), "({x}, {y}) off board for {lo}");
        }
    }
}
