//! Local movement prediction.
//!
//! The player moves immediately on input; each move is tagged with a
//! movement id, recorded in the session's prediction log, and reported to
//! the server. A pending server correction takes priority: the next step
//! snaps to the authoritative cell instead of moving.

use royale_component::PositionComponent;
use tracing::{debug, trace};

use crate::session::{ClientSession, PredictedMove};

/// One grid step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// `y - 1`
    Up,
    /// `y + 1`
    Down,
    /// `x - 1`
    Left,
    /// `x + 1`
    Right,
}

impl Direction {
    /// `(dx, dy)` of one step.
    #[must_use]
    pub fn delta(self) -> (i16, i16) {
        match self {
            Self::Up => (0, -1),
            Self::Down => (0, 1),
            Self::Left => (-1, 0),
            Self::Right => (1, 0),
        }
    }

    /// Map a `wasd` key.
    #[must_use]
    pub fn from_key(key: char) -> Option<Self> {
        match key.to_ascii_lowercase() {
            'w' => Some(Self::Up),
            's' => Some(Self::Down),
            'a' => Some(Self::Left),
            'd' => Some(Self::Right),
            _ => None,
        }
    }
}

/// What a movement step did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// No player entity, or no input queued.
    Idle,
    /// A pending correction was applied.
    Snapped {
        /// Authoritative column.
        x: i16,
        /// Authoritative row.
        y: i16,
        /// Predictions thrown away.
        discarded: usize,
    },
    /// The player moved; report this to the server.
    Moved(PredictedMove),
    /// The move would have left the board.
    Refused {
        /// Rejected column.
        x: i16,
        /// Rejected row.
        y: i16,
    },
}

/// Advance the player by one step.
pub fn step(session: &mut ClientSession) -> StepOutcome {
    let player = session.player();
    let Some(force) = session
        .store()
        .get_component::<PositionComponent>(player)
        .map(|pos| pos.force_position)
    else {
        return StepOutcome::Idle;
    };

    if force.force {
        if let Some(pos) = session.store_mut().get_component_mut::<PositionComponent>(player) {
            pos.x = force.x;
            pos.y = force.y;
            pos.force_position.force = false;
        }
        let discarded = session.discard_predictions_from(force.next_movement_id);
        session.set_next_movement_id(force.next_movement_id);
        debug!(
            x = force.x,
            y = force.y,
            next_movement_id = force.next_movement_id,
            discarded,
            "snapped to server position"
        );
        return StepOutcome::Snapped {
            x: force.x,
            y: force.y,
            discarded,
        };
    }

    let Some(direction) = session.take_input() else {
        return StepOutcome::Idle;
    };
    let map = session.map();
    let (dx, dy) = direction.delta();
    let Some(pos) = session.store_mut().get_component_mut::<PositionComponent>(player) else {
        return StepOutcome::Idle;
    };
    let (x, y) = (pos.x.saturating_add(dx), pos.y.saturating_add(dy));
    if !map.contains(x, y) {
        trace!(x, y, "move refused at board edge");
        return StepOutcome::Refused { x, y };
    }
    pos.x = x;
    pos.y = y;

    let predicted = PredictedMove {
        movement_id: session.allocate_movement_id(),
        entity: player,
        x,
        y,
    };
    session.record_prediction(predicted);
    StepOutcome::Moved(predicted)
}
