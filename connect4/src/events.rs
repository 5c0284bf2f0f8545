//! Notifications sent from the engine to its presentation collaborator.
use std::sync::mpsc::Sender;

use serde::{Deserialize, Serialize};

use crate::{Player, Position};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GameEvent {
    /// A piece landed; redraw that cell.
    CellPlaced { position: Position, player: Player },
    TurnSwitched { turn: Player },
    GameEnded {
        winner: Player,
        winning_line: Vec<Position>,
    },
    DrawReached,
    /// The AI picked a column; the collaborator feeds it back through
    /// `apply_move`, optionally after a delay.
    AiMoveRequested { column: usize },
}

/// Receives engine notifications. Delivery is fire-and-forget.
pub trait GameObserver {
    fn on_event(&mut self, event: &GameEvent);
}

impl<F> GameObserver for F
where
    F: FnMut(&GameEvent),
{
    fn on_event(&mut self, event: &GameEvent) {
        self(event)
    }
}

impl GameObserver for Sender<GameEvent> {
    fn on_event(&mut self, event: &GameEvent) {
        // A dropped receiver just means nobody is listening anymore.
        let _ = self.send(event.clone());
    }
}

#[derive(Copy, Clone, Debug, Default)]
pub struct NullObserver;

impl GameObserver for NullObserver {
    fn on_event(&mut self, _event: &GameEvent) {}
}
