//! Client event dispatch.
//!
//! Session start, inbound frames, ticks, and local input are handled one at
//! a time in arrival order. An entity update schedules an extra processing
//! pass, queued behind the update itself, so remote movement is reflected
//! without waiting for the next tick.

use std::collections::VecDeque;

use royale_net::messages::{ClientMessage, StartGameMessage};
use tracing::{debug, info, trace, warn};

use crate::config::ClientConfig;
use crate::movement::{self, Direction, StepOutcome};
use crate::reconcile::{self, Applied};
use crate::session::ClientSession;

/// Something for the client to react to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// The server started (or restarted) the game.
    StartGame(StartGameMessage),
    /// A binary frame from the server.
    Frame(Vec<u8>),
    /// The fixed-rate processing tick.
    Tick,
    /// A movement key.
    Input(Direction),
    /// Drop a client-owned object at the player's cell.
    Spawn(u8),
}

#[derive(Debug)]
enum Queued {
    Event(Event),
    Process,
}

/// Runs events against the client session and collects outbound reports.
#[derive(Debug)]
pub struct Dispatcher {
    config: ClientConfig,
    session: Option<ClientSession>,
    queue: VecDeque<Queued>,
    passes: u64,
}

impl Dispatcher {
    /// Create a dispatcher with no session yet.
    #[must_use]
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            session: None,
            queue: VecDeque::new(),
            passes: 0,
        }
    }

    /// The running session, once the game has started.
    #[must_use]
    pub fn session(&self) -> Option<&ClientSession> {
        self.session.as_ref()
    }

    /// Processing passes run so far.
    #[must_use]
    pub fn passes(&self) -> u64 {
        self.passes
    }

    /// Handle `event` and everything it schedules. Returns the reports to
    /// send to the server, in order.
    pub fn dispatch(&mut self, event: Event) -> Vec<ClientMessage> {
        let mut reports = Vec::new();
        self.queue.push_back(Queued::Event(event));
        while let Some(item) = self.queue.pop_front() {
            match item {
                Queued::Event(event) => self.handle(event, &mut reports),
                Queued::Process => self.process(&mut reports),
            }
        }
        reports
    }

    fn handle(&mut self, event: Event, reports: &mut Vec<ClientMessage>) {
        match event {
            Event::StartGame(start) => self.start(&start, reports),
            Event::Frame(bytes) => {
                let Some(session) = self.session.as_mut() else {
                    warn!(len = bytes.len(), "frame received before game start; dropped");
                    return;
                };
                match reconcile::apply_frame(session, &bytes) {
                    Ok(Applied::Update(entity)) => {
                        trace!(%entity, "entity updated");
                        self.queue.push_back(Queued::Process);
                    }
                    Ok(Applied::Correction(_)) => {}
                    Err(e) => warn!(error = %e, len = bytes.len(), "dropping malformed frame"),
                }
            }
            Event::Tick => self.process(reports),
            Event::Input(direction) => {
                if let Some(session) = self.session.as_mut() {
                    session.queue_input(direction);
                }
            }
            Event::Spawn(glyph) => self.spawn(glyph, reports),
        }
    }

    fn start(&mut self, start: &StartGameMessage, reports: &mut Vec<ClientMessage>) {
        if self.session.is_some() {
            info!("game restarted; discarding previous session");
        }
        match ClientSession::start(start, self.config.glyph) {
            Ok(session) => {
                info!(
                    range = %start.entity_id_range,
                    x = start.position[0],
                    y = start.position[1],
                    width = start.map.width,
                    height = start.map.height,
                    "game started"
                );
                reports.extend(session.create_report(session.player()));
                self.session = Some(session);
            }
            Err(e) => {
                warn!(error = %e, "cannot start game");
                self.session = None;
            }
        }
    }

    fn spawn(&mut self, glyph: u8, reports: &mut Vec<ClientMessage>) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let Some((x, y)) = session.player_position().map(|pos| (pos.x, pos.y)) else {
            return;
        };
        match session.spawn(glyph, x, y) {
            Ok(entity) => reports.extend(session.create_report(entity)),
            Err(e) => debug!(error = %e, "no ids left to spawn"),
        }
    }

    fn process(&mut self, reports: &mut Vec<ClientMessage>) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        self.passes += 1;
        if let StepOutcome::Moved(predicted) = movement::step(session) {
            reports.push(predicted.report());
        }
    }
}
