//! Per-tick position broadcast with area-of-interest filtering.
//!
//! For every entity carrying [`NetworkSyncComponent`] and every connected
//! client, one [`EntityPositionUpdate`] frame is sent when:
//!
//! 1. the entity is outside the client's own range (clients predict their
//!    own entities and never get them echoed back),
//! 2. the client's main entity has a known position, and
//! 3. the entity lies strictly inside the viewport box around that position.
//!
//! Each frame is encoded into its own pooled buffer, which the transport
//! releases once the write completes. A failed enqueue marks the client for
//! disconnection; the pass itself carries on.

use royale_component::{ComponentStore, NetworkSyncComponent, PositionComponent};
use royale_net::{BufferPool, EntityPositionUpdate, encode_entity_position_update};
use tracing::{debug, error, trace, warn};
use uuid::Uuid;

use crate::config::LookupStrategy;
use crate::lookup::{ActivePlayers, PositionLookup, build_lookup};
use crate::tracking::TrackingList;

/// Broadcast settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BroadcastConfig {
    /// Horizontal half-extent of the visibility box.
    pub viewport_width: u16,
    /// Vertical half-extent of the visibility box.
    pub viewport_height: u16,
    /// Where main-entity positions come from.
    pub lookup: LookupStrategy,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            viewport_width: 80,
            viewport_height: 24,
            lookup: LookupStrategy::Store,
        }
    }
}

impl BroadcastConfig {
    /// Set the visibility half-extents.
    #[must_use]
    pub fn with_viewport(mut self, width: u16, height: u16) -> Self {
        self.viewport_width = width;
        self.viewport_height = height;
        self
    }

    /// Set the main-entity lookup source.
    #[must_use]
    pub fn with_lookup(mut self, lookup: LookupStrategy) -> Self {
        self.lookup = lookup;
        self
    }
}

/// What one broadcast pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Frames handed to transports.
    pub sent: usize,
    /// (entity, client) pairs skipped because the client owns the entity.
    pub skipped_own: usize,
    /// Pairs skipped because the client's main entity had no position.
    pub skipped_no_anchor: usize,
    /// Pairs skipped as out of view.
    pub skipped_distance: usize,
    /// Synced entities without a position component.
    pub unpositioned: usize,
    /// Clients whose transport refused a frame, in first-failure order.
    pub failed: Vec<Uuid>,
}

/// Runs the per-tick broadcast.
pub struct Broadcaster {
    config: BroadcastConfig,
    pool: BufferPool,
    lookup: Box<dyn PositionLookup>,
}

impl Broadcaster {
    /// Create a broadcaster; `players` backs the registry lookup if selected.
    #[must_use]
    pub fn new(config: BroadcastConfig, players: &ActivePlayers) -> Self {
        Self {
            config,
            pool: BufferPool::for_entity_updates(),
            lookup: build_lookup(config.lookup, players),
        }
    }

    /// The frame buffer pool.
    #[must_use]
    pub fn pool(&self) -> &BufferPool {
        &self.pool
    }

    /// Current settings.
    #[must_use]
    pub fn config(&self) -> &BroadcastConfig {
        &self.config
    }

    /// Send every visible synced entity to every client.
    pub fn run(&self, store: &ComponentStore, clients: &TrackingList) -> BroadcastReport {
        let mut report = BroadcastReport::default();

        store.for_each::<NetworkSyncComponent>(|entity, _| {
            let Some(position) = store.get_component::<PositionComponent>(entity) else {
                trace!(%entity, "synced entity has no position");
                report.unpositioned += 1;
                return;
            };
            let update = EntityPositionUpdate {
                entity_id: entity.id(),
                glyph: position.glyph.top_left(),
                x: position.x,
                y: position.y,
            };
            let point = position.point();

            for client in clients.iter() {
                if client.range.contains(entity) {
                    report.skipped_own += 1;
                    continue;
                }
                if report.failed.contains(&client.client_id) {
                    continue;
                }
                let Some(main) = self.lookup.main_position(store, client.anchor()) else {
                    report.skipped_no_anchor += 1;
                    continue;
                };
                if !main.is_within(point, self.config.viewport_width, self.config.viewport_height)
                {
                    report.skipped_distance += 1;
                    continue;
                }

                let mut buf = self.pool.acquire();
                if let Err(e) = encode_entity_position_update(&update, &mut buf) {
                    error!(%entity, error = %e, "failed to encode entity update");
                    continue;
                }
                match client.transport.send(buf) {
                    Ok(()) => report.sent += 1,
                    Err(e) => {
                        warn!(
                            client_id = %client.client_id,
                            error = %e,
                            "client transport refused frame"
                        );
                        report.failed.push(client.client_id);
                    }
                }
            }
        });

        debug!(
            sent = report.sent,
            skipped_own = report.skipped_own,
            skipped_no_anchor = report.skipped_no_anchor,
            skipped_distance = report.skipped_distance,
            failed = report.failed.len(),
            "broadcast pass complete"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use royale_component::{Entity, EntityRange, Glyph, GridPoint};
    use royale_net::{Frame, FrameReceiver, QueueTransport};

    use super::*;
    use crate::tracking::TrackingInfo;

    fn spawn(store: &mut ComponentStore, id: u32, glyph: u8, x: i16, y: i16) {
        let entity = Entity(id);
        store.attach_component(entity, PositionComponent::new(Glyph::single(glyph), x, y));
        store.attach_component(entity, NetworkSyncComponent);
    }

    fn connect(clients: &mut TrackingList, lo: u32, hi: u32) -> (Uuid, FrameReceiver) {
        let (transport, rx) = QueueTransport::new();
        let client_id = Uuid::new_v4();
        clients.add(TrackingInfo {
            client_id,
            range: EntityRange::new(lo, hi).unwrap(),
            transport: Arc::new(transport),
        });
        (client_id, rx)
    }

    fn drain(rx: &mut FrameReceiver) -> Vec<Frame> {
        let mut frames = Vec::new();
        while let Ok(buf) = rx.try_recv() {
            frames.push(Frame::decode(buf.as_bytes()).unwrap());
        }
        frames
    }

    fn broadcaster() -> Broadcaster {
        Broadcaster::new(BroadcastConfig::default(), &ActivePlayers::new())
    }

    #[test]
    fn test_own_entities_not_echoed() {
        let mut store = ComponentStore::new();
        let mut clients = TrackingList::new();
        let (_, mut rx) = connect(&mut clients, 100, 110);
        spawn(&mut store, 100, b'@', 0, 0);
        spawn(&mut store, 105, b'*', 1, 1);
        spawn(&mut store, 50, b'o', 2, 2);

        let report = broadcaster().run(&store, &clients);

        assert_eq!(report.sent, 1);
        assert_eq!(report.skipped_own, 2);
        assert_eq!(
            drain(&mut rx),
            vec![Frame::Update(EntityPositionUpdate {
                entity_id: 50,
                glyph: b'o',
                x: 2,
                y: 2,
            })]
        );
    }

    #[test]
    fn test_viewport_bounds_are_strict() {
        let mut store = ComponentStore::new();
        let mut clients = TrackingList::new();
        let (_, mut rx) = connect(&mut clients, 100, 110);
        spawn(&mut store, 100, b'@', 0, 0);
        spawn(&mut store, 1, b'a', 79, -23);
        spawn(&mut store, 2, b'b', 80, 0);
        spawn(&mut store, 3, b'c', 0, 24);

        let report = broadcaster().run(&store, &clients);

        assert_eq!(report.sent, 1);
        assert_eq!(report.skipped_distance, 2);
        let frames = drain(&mut rx);
        assert!(matches!(frames.as_slice(), [Frame::Update(u)] if u.entity_id == 1));
    }

    #[test]
    fn test_one_frame_per_visible_pair() {
        let mut store = ComponentStore::new();
        let mut clients = TrackingList::new();
        let (_, mut rx_a) = connect(&mut clients, 100, 110);
        let (_, mut rx_b) = connect(&mut clients, 110, 120);
        spawn(&mut store, 100, b'A', 0, 0);
        spawn(&mut store, 110, b'B', 5, 5);
        spawn(&mut store, 7, b'x', 3, 3);

        let broadcaster = broadcaster();
        let report = broadcaster.run(&store, &clients);

        // A sees B and 7, B sees A and 7.
        assert_eq!(report.sent, 4);
        assert_eq!(broadcaster.pool().stats().in_flight, 4);

        let mut seen_by_a: Vec<u32> = drain(&mut rx_a)
            .into_iter()
            .map(|f| match f {
                Frame::Update(u) => u.entity_id,
                Frame::Correction(_) => panic!("unexpected correction"),
            })
            .collect();
        seen_by_a.sort_unstable();
        assert_eq!(seen_by_a, vec![7, 110]);
        assert_eq!(drain(&mut rx_b).len(), 2);

        let stats = broadcaster.pool().stats();
        assert_eq!(stats.in_flight, 0);
        assert_eq!(stats.free, stats.created);
    }

    #[test]
    fn test_client_without_anchor_gets_nothing() {
        let mut store = ComponentStore::new();
        let mut clients = TrackingList::new();
        let (_, mut rx) = connect(&mut clients, 100, 110);
        spawn(&mut store, 7, b'x', 0, 0);

        let report = broadcaster().run(&store, &clients);

        assert_eq!(report.sent, 0);
        assert_eq!(report.skipped_no_anchor, 1);
        assert!(drain(&mut rx).is_empty());
    }

    #[test]
    fn test_closed_transport_marks_client_failed() {
        let mut store = ComponentStore::new();
        let mut clients = TrackingList::new();
        let (client_id, rx) = connect(&mut clients, 100, 110);
        drop(rx);
        spawn(&mut store, 100, b'@', 0, 0);
        spawn(&mut store, 1, b'a', 1, 0);
        spawn(&mut store, 2, b'b', 2, 0);

        let broadcaster = broadcaster();
        let report = broadcaster.run(&store, &clients);

        assert_eq!(report.sent, 0);
        assert_eq!(report.failed, vec![client_id]);
        assert_eq!(broadcaster.pool().stats().in_flight, 0);
    }

    #[test]
    fn test_unpositioned_entity_skipped() {
        let mut store = ComponentStore::new();
        let mut clients = TrackingList::new();
        let (_, mut rx) = connect(&mut clients, 100, 110);
        spawn(&mut store, 100, b'@', 0, 0);
        store.attach_component(Entity(9), NetworkSyncComponent);

        let report = broadcaster().run(&store, &clients);

        assert_eq!(report.unpositioned, 1);
        assert!(drain(&mut rx).is_empty());
    }

    #[test]
    fn test_registry_lookup_uses_reported_anchor() {
        let mut store = ComponentStore::new();
        let mut clients = TrackingList::new();
        let (_, mut rx) = connect(&mut clients, 100, 110);
        // The store still has the main entity far away; the registry is newer.
        spawn(&mut store, 100, b'@', 400, 400);
        spawn(&mut store, 7, b'x', 1, 1);

        let players = ActivePlayers::new();
        players.update(Uuid::new_v4(), Entity(100), GridPoint::new(0, 0));
        let config = BroadcastConfig::default().with_lookup(LookupStrategy::Registry);
        let report = Broadcaster::new(config, &players).run(&store, &clients);

        assert_eq!(report.sent, 1);
        assert_eq!(drain(&mut rx).len(), 1);
    }
}
