//! In-memory game sessions shared by the HTTP handlers.
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use connect4::{GameConfig, GameEngine, GameError, GameEvent, AI_PLAYER};
use serde::Deserialize;

#[derive(Debug, thiserror::Error)]
#[error("no game with id {0}")]
pub struct SessionNotFound(pub u64);

#[derive(Debug, thiserror::Error)]
#[error("player 2 is played by the AI")]
pub struct AiToMove;

/// A column the engine asked the AI to play, valid only while the session
/// has not changed since it was issued.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct AiTicket {
    pub column: usize,
    generation: u64,
}

/// An engine plus the receiving end of its notification channel.
pub struct Session {
    engine: GameEngine,
    events: Receiver<GameEvent>,
    generation: u64,
}

impl Session {
    pub fn new(config: &GameConfig) -> Result<Self, GameError> {
        let (tx, rx) = mpsc::channel();
        let engine = GameEngine::from_config(config)?.with_observer(tx);
        Ok(Self {
            engine,
            events: rx,
            generation: 0,
        })
    }

    pub fn engine(&self) -> &GameEngine {
        &self.engine
    }

    /// Runs `f` against the engine and returns the notifications it caused.
    /// Every call invalidates the tickets issued before it.
    pub fn update<T>(
        &mut self,
        f: impl FnOnce(&mut GameEngine) -> Result<T, GameError>,
    ) -> Result<Vec<GameEvent>, GameError> {
        self.generation += 1;
        let result = f(&mut self.engine);
        let events = self.drain();
        result.map(|_| events)
    }

    /// Plays a human move. Player 2's turn belongs to the AI in AI mode.
    pub fn play(&mut self, column: usize) -> anyhow::Result<Vec<GameEvent>> {
        if self.ai_to_move() {
            return Err(AiToMove.into());
        }
        Ok(self.update(|engine| engine.apply_move(column))?)
    }

    /// Turns the latest AI request among `events` into a ticket for the
    /// current state of the session.
    pub fn ticket(&self, events: &[GameEvent]) -> Option<AiTicket> {
        events.iter().rev().find_map(|event| match event {
            GameEvent::AiMoveRequested { column } => Some(AiTicket {
                column: *column,
                generation: self.generation,
            }),
            _ => None,
        })
    }

    /// Plays `ticket` for the AI. Returns `Ok(None)` when the session moved
    /// on since the ticket was issued.
    pub fn apply_ai(&mut self, ticket: AiTicket) -> Result<Option<Vec<GameEvent>>, GameError> {
        if ticket.generation != self.generation || !self.ai_to_move() {
            return Ok(None);
        }
        self.update(|engine| engine.apply_move(ticket.column)).map(Some)
    }

    fn ai_to_move(&self) -> bool {
        self.engine.ai_mode()
            && self.engine.turn() == AI_PLAYER
            && !self.engine.status().is_terminal()
    }

    /// Notifications emitted since the last drain, oldest first.
    fn drain(&self) -> Vec<GameEvent> {
        self.events.try_iter().collect()
    }
}

/// Body of `POST /api/games`; missing fields fall back to server defaults.
#[derive(Debug, Default, Deserialize)]
pub struct NewGame {
    pub rows: Option<usize>,
    pub columns: Option<usize>,
    pub vs_ai: Option<bool>,
    pub seed: Option<u64>,
}

impl NewGame {
    pub fn into_config(self, defaults: &GameConfig) -> GameConfig {
        GameConfig {
            rows: self.rows.unwrap_or(defaults.rows),
            columns: self.columns.unwrap_or(defaults.columns),
            vs_ai: self.vs_ai.unwrap_or(defaults.vs_ai),
            seed: self.seed.or(defaults.seed),
        }
    }
}

pub struct AppState {
    sessions: Mutex<HashMap<u64, Session>>,
    next_id: AtomicU64,
    pub ai_delay: Duration,
    pub defaults: GameConfig,
}

impl AppState {
    pub fn new(defaults: GameConfig, ai_delay: Duration) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            ai_delay,
            defaults,
        }
    }

    pub fn insert(&self, session: Session) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.lock().insert(id, session);
        id
    }

    pub fn remove(&self, id: u64) -> Result<(), SessionNotFound> {
        self.lock().remove(&id).map(|_| ()).ok_or(SessionNotFound(id))
    }

    /// Runs `f` against session `id` while holding the session lock.
    pub fn with_session<T, E>(
        &self,
        id: u64,
        f: impl FnOnce(&mut Session) -> Result<T, E>,
    ) -> Result<T, E>
    where
        E: From<SessionNotFound>,
    {
        let mut sessions = self.lock();
        let session = sessions.get_mut(&id).ok_or(SessionNotFound(id))?;
        f(session)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<u64, Session>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
