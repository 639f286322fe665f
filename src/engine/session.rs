//! SessionManager (§4.4): lobby → running → ended lifecycle, participant
//! admission, endgame scoring, leaderboard.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use tracing::info;
use uuid::Uuid;

use crate::config::GameConfig;

use super::error::EngineError;
use super::fanout::LeaderboardEntry;
use super::ledger::{Ledger, Participant};
use super::matching::MatchingEngine;
use super::order::{Order, Trade};
use super::rng::{generate_starting_inventory, seeded_rng};
use super::types::{OrderId, OrderType, ParticipantId, Side, SessionId, SessionStatus};

#[derive(Debug, Clone)]
pub struct Session {
    pub id: SessionId,
    pub host_id: ParticipantId,
    pub status: SessionStatus,
    pub participant_order: Vec<ParticipantId>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl Session {
    fn remaining_seconds(&self, duration_seconds: u64, now: DateTime<Utc>) -> u64 {
        match (self.status, self.started_at) {
            (SessionStatus::Running, Some(start)) => {
                let elapsed = (now - start).num_seconds().max(0) as u64;
                duration_seconds.saturating_sub(elapsed)
            }
            _ => 0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FinalScore {
    pub participant_id: ParticipantId,
    pub complete_sets: u64,
    pub sets_value: u64,
    pub leftover_inventory: HashMap<String, u64>,
    pub scrap_value: u64,
    pub total_score: u64,
    pub pnl: i64,
}

pub struct SessionManager {
    pub config: GameConfig,
    pub session: Option<Session>,
    pub ledger: Ledger,
    pub matching: MatchingEngine,
    rng: StdRng,
    seed_counter: u64,
}

impl SessionManager {
    pub fn new(config: GameConfig) -> Self {
        let matching = MatchingEngine::new(&config.products);
        Self {
            config,
            session: None,
            ledger: Ledger::new(),
            matching,
            rng: seeded_rng(0),
            seed_counter: 0,
        }
    }

    #[cfg(test)]
    pub fn with_seed(config: GameConfig, seed: u64) -> Self {
        let mut manager = Self::new(config);
        manager.rng = seeded_rng(seed);
        manager
    }

    pub fn create(&mut self) -> Result<SessionId, EngineError> {
        if let Some(existing) = &self.session {
            if existing.status != SessionStatus::Ended {
                return Err(EngineError::AlreadyActive);
            }
        }

        self.ledger = Ledger::new();
        self.matching.reset(&self.config.products);
        self.seed_counter += 1;
        self.rng = seeded_rng(self.seed_counter);

        let id = Uuid::new_v4();
        self.session = Some(Session {
            id,
            host_id: Uuid::nil(),
            status: SessionStatus::Lobby,
            participant_order: Vec::new(),
            created_at: Utc::now(),
            started_at: None,
            ended_at: None,
        });
        info!(session_id = %id, "session created");
        Ok(id)
    }

    fn session_mut(&mut self) -> Result<&mut Session, EngineError> {
        self.session.as_mut().ok_or(EngineError::NoSession)
    }

    pub fn join(&mut self, name: &str) -> Result<Participant, EngineError> {
        if name.trim().is_empty() {
            return Err(EngineError::EmptyName);
        }
        if self.ledger.name_taken(name) {
            return Err(EngineError::NameTaken);
        }

        let max_players = self.config.max_players;
        let session = self.session_mut()?;
        if session.status != SessionStatus::Lobby {
            return Err(EngineError::NotLobby);
        }
        if session.participant_order.len() >= max_players {
            return Err(EngineError::SessionFull);
        }

        let pid = Uuid::new_v4();
        let inventory = generate_starting_inventory(
            &mut self.rng,
            &self.config.products,
            &self.config.scrap_values,
            self.config.starting_inventory_target_total_value,
            self.config.starting_inventory_randomization_factor,
        );
        let participant = Participant::new(pid, name.to_string(), self.config.starting_cash, inventory);
        self.ledger.admit(participant.clone());

        let session = self.session_mut()?;
        if session.host_id == Uuid::nil() {
            session.host_id = pid;
        }
        session.participant_order.push(pid);

        info!(participant_id = %pid, name, "participant joined");
        Ok(participant)
    }

    pub fn leave(&mut self, pid: ParticipantId) -> Result<(), EngineError> {
        let session = self.session_mut()?;
        if session.status != SessionStatus::Lobby {
            return Err(EngineError::NotLobby);
        }
        session.participant_order.retain(|p| *p != pid);
        if session.host_id == pid {
            session.host_id = session.participant_order.first().copied().unwrap_or(Uuid::nil());
        }
        self.ledger.remove(pid);
        Ok(())
    }

    pub fn start(&mut self, requesting_pid: ParticipantId) -> Result<(), EngineError> {
        let session = self.session_mut()?;
        if session.status != SessionStatus::Lobby {
            return Err(EngineError::NotLobby);
        }
        if session.host_id != requesting_pid {
            return Err(EngineError::NotHost);
        }
        if session.participant_order.len() < 2 {
            return Err(EngineError::TooFewPlayers);
        }

        session.status = SessionStatus::Running;
        session.started_at = Some(Utc::now());
        info!(session_id = %session.id, "session started");
        Ok(())
    }

    pub fn duration_seconds(&self) -> u64 {
        self.config.game_duration_seconds
    }

    pub fn is_running(&self) -> bool {
        matches!(self.session.as_ref().map(|s| s.status), Some(SessionStatus::Running))
    }

    pub fn remaining_seconds(&self) -> u64 {
        match &self.session {
            Some(session) => session.remaining_seconds(self.config.game_duration_seconds, Utc::now()),
            None => 0,
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn submit_order(
        &mut self,
        participant_id: ParticipantId,
        product: &str,
        side: Side,
        order_type: OrderType,
        qty: u64,
        price: Option<i64>,
    ) -> Result<(Order, Vec<Trade>), EngineError> {
        if !self.is_running() {
            return Err(EngineError::SessionNotRunning);
        }
        let session_id = self.session.as_ref().unwrap().id;
        self.matching.submit(
            &mut self.ledger,
            session_id,
            participant_id,
            product,
            side,
            order_type,
            qty,
            price,
            &self.config.products,
            self.config.min_order_size,
            self.config.max_order_size,
        )
    }

    pub fn cancel_order(&mut self, order_id: OrderId, requesting_pid: ParticipantId) -> Result<(), EngineError> {
        if !self.is_running() {
            return Err(EngineError::SessionNotRunning);
        }
        self.matching.cancel(&mut self.ledger, order_id, requesting_pid)
    }

    pub fn sweep_participant(&mut self, pid: ParticipantId) {
        self.matching.sweep_participant(&mut self.ledger, pid);
    }

    /// Live, pre-endgame leaderboard (§4.4.2): sets are not yet realized.
    pub fn live_leaderboard(&self) -> Vec<LeaderboardEntry> {
        let session = match &self.session {
            Some(s) => s,
            None => return Vec::new(),
        };

        let mut entries: Vec<LeaderboardEntry> = session
            .participant_order
            .iter()
            .filter_map(|pid| self.ledger.get(*pid))
            .map(|p| {
                let scrap_value: u64 = p
                    .inventory
                    .iter()
                    .map(|(product, qty)| qty * self.config.scrap_values.get(product).copied().unwrap_or(0))
                    .sum();
                let complete_sets = self.ledger.complete_sets(p.id, &self.config.set_recipe);
                LeaderboardEntry {
                    participant_id: p.id,
                    name: p.name.clone(),
                    rank: 0,
                    estimated_value: p.cash + scrap_value,
                    complete_sets,
                    total_score: None,
                    pnl: None,
                }
            })
            .collect();

        entries.sort_by(|a, b| b.estimated_value.cmp(&a.estimated_value));
        for (i, entry) in entries.iter_mut().enumerate() {
            entry.rank = i + 1;
        }
        entries
    }

    /// Endgame scoring (§4.4.2). Idempotent: may be called once when the
    /// session transitions to `ended`.
    pub fn end(&mut self) -> Result<Vec<FinalScore>, EngineError> {
        self.matching.sweep_session(&mut self.ledger);

        let session = self.session_mut()?;
        session.status = SessionStatus::Ended;
        session.ended_at = Some(Utc::now());
        let order = session.participant_order.clone();

        let mut scores: Vec<FinalScore> = order
            .iter()
            .filter_map(|pid| self.ledger.get(*pid))
            .map(|p| {
                let k = self.ledger.complete_sets(p.id, &self.config.set_recipe);
                let sets_value = k * self.config.set_value;
                let leftover: HashMap<String, u64> = self
                    .config
                    .products
                    .iter()
                    .map(|product| {
                        let used = k * self.config.set_recipe.get(product).copied().unwrap_or(0);
                        (product.clone(), p.inventory_of(product).saturating_sub(used))
                    })
                    .collect();
                let scrap_value: u64 = leftover
                    .iter()
                    .map(|(product, qty)| qty * self.config.scrap_values.get(product).copied().unwrap_or(0))
                    .sum();
                let total_score = p.cash + sets_value + scrap_value;
                let initial_scrap = self.ledger.initial_scrap_value(p.id, &self.config.scrap_values);
                let pnl = total_score as i64 - (p.initial_cash + initial_scrap) as i64;

                FinalScore {
                    participant_id: p.id,
                    complete_sets: k,
                    sets_value,
                    leftover_inventory: leftover,
                    scrap_value,
                    total_score,
                    pnl,
                }
            })
            .collect();

        scores.sort_by(|a, b| b.total_score.cmp(&a.total_score));
        info!(session_id = %self.session.as_ref().unwrap().id, "session ended, scored {} participants", scores.len());
        Ok(scores)
    }

    pub fn reset(&mut self) {
        self.session = None;
        self.ledger = Ledger::new();
        self.matching.reset(&self.config.products);
    }
}
