//! EventFanout (§4.5): aggregates state deltas and dispatches per-observer
//! snapshots.
//!
//! Broadcast-shaped events travel over a `tokio::sync::broadcast` channel;
//! targeted events go to a per-participant `mpsc::UnboundedSender`
//! registered in a `DashMap` — the one place in this crate where a
//! concurrent map earns its keep, since many WebSocket connection tasks
//! register and look themselves up concurrently, unlike engine state (§5).

use std::collections::HashMap;

use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::{broadcast, mpsc};

use super::book::Depth;
use super::ledger::Participant;
use super::order::Trade;
use super::types::{ParticipantId, Product, SessionStatus};

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SessionEvent {
    Config(ConfigPayload),
    SessionState(SessionStatePayload),
    OrderBooks { books: HashMap<Product, Depth> },
    Leaderboard { entries: Vec<LeaderboardEntry> },
    Timer { remaining_seconds: u64 },
    Trades { trades: Vec<Trade> },
    GameEnded { leaderboard: Vec<LeaderboardEntry> },
}

#[derive(Debug, Clone, Serialize)]
pub struct ConfigPayload {
    pub game_duration_seconds: u64,
    pub starting_cash: u64,
    pub max_players: usize,
    pub products: Vec<Product>,
    pub min_order_size: u64,
    pub max_order_size: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionStatePayload {
    pub status: SessionStatus,
    pub participant_names: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LeaderboardEntry {
    pub participant_id: ParticipantId,
    pub name: String,
    pub rank: usize,
    pub estimated_value: u64,
    pub complete_sets: u64,
    pub total_score: Option<u64>,
    pub pnl: Option<i64>,
}

/// Targeted, per-participant events.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PlayerEvent {
    PlayerState(PlayerStatePayload),
    FinalScore(FinalScorePayload),
}

#[derive(Debug, Clone, Serialize)]
pub struct PlayerStatePayload {
    pub cash: u64,
    pub inventory: HashMap<Product, u64>,
    pub open_order_count: usize,
}

impl From<&Participant> for PlayerStatePayload {
    fn from(p: &Participant) -> Self {
        Self {
            cash: p.cash,
            inventory: p.inventory.clone(),
            open_order_count: p.open_orders.len(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FinalScorePayload {
    pub total_score: u64,
    pub pnl: i64,
    pub sets_value: u64,
    pub scrap_value: u64,
    pub complete_sets: u64,
}

pub struct EventFanout {
    broadcast_tx: broadcast::Sender<SessionEvent>,
    targeted: DashMap<ParticipantId, mpsc::UnboundedSender<PlayerEvent>>,
}

impl EventFanout {
    pub fn new() -> Self {
        let (broadcast_tx, _rx) = broadcast::channel(1024);
        Self {
            broadcast_tx,
            targeted: DashMap::new(),
        }
    }

    pub fn subscribe_broadcast(&self) -> broadcast::Receiver<SessionEvent> {
        self.broadcast_tx.subscribe()
    }

    pub fn register_participant(&self, pid: ParticipantId) -> mpsc::UnboundedReceiver<PlayerEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.targeted.insert(pid, tx);
        rx
    }

    pub fn unregister_participant(&self, pid: ParticipantId) {
        self.targeted.remove(&pid);
    }

    /// Best-effort: a slow or disconnected observer never blocks the engine (§4.5, §5).
    pub fn broadcast(&self, event: SessionEvent) {
        let _ = self.broadcast_tx.send(event);
    }

    pub fn send_to(&self, pid: ParticipantId, event: PlayerEvent) {
        if let Some(sender) = self.targeted.get(&pid) {
            let _ = sender.send(event);
        }
    }
}

impl Default for EventFanout {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn broadcast_is_best_effort_with_no_subscribers() {
        let fanout = EventFanout::new();
        fanout.broadcast(SessionEvent::Timer { remaining_seconds: 10 });
    }

    #[test]
    fn targeted_event_reaches_registered_receiver() {
        let fanout = EventFanout::new();
        let pid = ParticipantId::new_v4();
        let mut rx = fanout.register_participant(pid);

        fanout.send_to(
            pid,
            PlayerEvent::FinalScore(FinalScorePayload {
                total_score: 56,
                pnl: 6,
                sets_value: 30,
                scrap_value: 6,
                complete_sets: 1,
            }),
        );

        assert!(rx.try_recv().is_ok());
    }

    #[test]
    fn send_to_unregistered_participant_is_noop() {
        let fanout = EventFanout::new();
        fanout.send_to(
            ParticipantId::new_v4(),
            PlayerEvent::PlayerState(PlayerStatePayload {
                cash: 0,
                inventory: HashMap::new(),
                open_order_count: 0,
            }),
        );
    }
}
