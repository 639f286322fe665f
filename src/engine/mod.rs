//! Engine actor (§5, §9): a single `tokio::spawn`'d task owns all mutable
//! game state — `Ledger`, `MatchingEngine`, `SessionManager` — behind an
//! `mpsc` command queue: one writer, commands processed strictly in
//! arrival order, replies delivered over a `oneshot` channel per call so
//! callers still get a `Result` back.

pub mod book;
pub mod error;
pub mod fanout;
pub mod ledger;
pub mod matching;
pub mod order;
pub mod persistence;
pub mod rng;
pub mod session;
pub mod types;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{info, warn};

use crate::config::GameConfig;

use error::EngineError;
use fanout::{
    ConfigPayload, EventFanout, FinalScorePayload, LeaderboardEntry, PlayerEvent, PlayerStatePayload,
    SessionEvent, SessionStatePayload,
};
use ledger::Participant;
use order::{Order, Trade};
use persistence::{FinalScoreRecord, PersistedRecord, PersistenceSink};
use session::SessionManager;
use types::{OrderId, OrderType, ParticipantId, Side, SessionId};

type Reply<T> = oneshot::Sender<Result<T, EngineError>>;

/// One variant per command surface operation named in §6.
enum Command {
    CreateSession(Reply<SessionId>),
    Join { name: String, reply: Reply<Participant> },
    Leave { pid: ParticipantId, reply: Reply<()> },
    Start { pid: ParticipantId, reply: Reply<()> },
    SubmitOrder {
        pid: ParticipantId,
        product: String,
        side: Side,
        order_type: OrderType,
        qty: u64,
        price: Option<i64>,
        reply: Reply<(Order, Vec<Trade>)>,
    },
    CancelOrder { pid: ParticipantId, order_id: OrderId, reply: Reply<()> },
    Disconnect { pid: ParticipantId },
    Reset(Reply<()>),
}

/// Cloneable client handle. Every public method sends a `Command` and
/// awaits its `oneshot` reply, so the actor's single-writer discipline is
/// invisible to callers.
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<Command>,
    fanout: Arc<EventFanout>,
}

impl EngineHandle {
    pub fn subscribe_broadcast(&self) -> broadcast::Receiver<SessionEvent> {
        self.fanout.subscribe_broadcast()
    }

    pub fn register_participant(&self, pid: ParticipantId) -> mpsc::UnboundedReceiver<PlayerEvent> {
        self.fanout.register_participant(pid)
    }

    pub async fn create_session(&self) -> Result<SessionId, EngineError> {
        self.call(|reply| Command::CreateSession(reply)).await
    }

    pub async fn join(&self, name: String) -> Result<Participant, EngineError> {
        self.call(|reply| Command::Join { name, reply }).await
    }

    pub async fn leave(&self, pid: ParticipantId) -> Result<(), EngineError> {
        self.call(|reply| Command::Leave { pid, reply }).await
    }

    pub async fn start(&self, pid: ParticipantId) -> Result<(), EngineError> {
        self.call(|reply| Command::Start { pid, reply }).await
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn submit_order(
        &self,
        pid: ParticipantId,
        product: String,
        side: Side,
        order_type: OrderType,
        qty: u64,
        price: Option<i64>,
    ) -> Result<(Order, Vec<Trade>), EngineError> {
        self.call(|reply| Command::SubmitOrder {
            pid,
            product,
            side,
            order_type,
            qty,
            price,
            reply,
        })
        .await
    }

    pub async fn cancel_order(&self, pid: ParticipantId, order_id: OrderId) -> Result<(), EngineError> {
        self.call(|reply| Command::CancelOrder { pid, order_id, reply }).await
    }

    pub async fn reset(&self) -> Result<(), EngineError> {
        self.call(|reply| Command::Reset(reply)).await
    }

    /// Fire-and-forget: the disconnecting connection cannot wait for a reply.
    pub fn disconnect(&self, pid: ParticipantId) {
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let _ = tx.send(Command::Disconnect { pid }).await;
        });
    }

    async fn call<T>(&self, build: impl FnOnce(Reply<T>) -> Command) -> Result<T, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(build(reply_tx))
            .await
            .map_err(|_| EngineError::Internal("engine actor is gone".into()))?;
        reply_rx.await.map_err(|_| EngineError::Internal("engine actor dropped the reply".into()))?
    }
}

/// Spawns the actor task and returns a handle to it. `sink` is consulted
/// outside the matching critical path: trades and endgame scores are
/// handed to it after the mutation that produced them completes.
pub fn spawn(config: GameConfig, sink: Arc<dyn PersistenceSink>) -> EngineHandle {
    let (tx, rx) = mpsc::channel(256);
    let fanout = Arc::new(EventFanout::new());
    let handle = EngineHandle { tx, fanout: fanout.clone() };

    tokio::spawn(run_actor(config, rx, fanout, sink));
    handle
}

async fn run_actor(
    config: GameConfig,
    mut rx: mpsc::Receiver<Command>,
    fanout: Arc<EventFanout>,
    sink: Arc<dyn PersistenceSink>,
) {
    let mut manager = SessionManager::new(config);
    loop {
        let running = manager.is_running();

        tokio::select! {
            biased;

            maybe_cmd = rx.recv() => {
                let Some(cmd) = maybe_cmd else {
                    info!("engine actor command channel closed, shutting down");
                    break;
                };
                handle_command(&mut manager, &fanout, sink.as_ref(), cmd);
            }

            _ = tokio::time::sleep(Duration::from_secs(1)), if running => {
                on_tick(&mut manager, &fanout, sink.as_ref());
            }
        }
    }
}

fn handle_command(
    manager: &mut SessionManager,
    fanout: &EventFanout,
    sink: &dyn PersistenceSink,
    cmd: Command,
) {
    match cmd {
        Command::CreateSession(reply) => {
            let result = manager.create();
            if let Ok(id) = &result {
                sink.record(PersistedRecord::SessionCreated { session_id: *id });
                broadcast_config(manager, fanout);
                broadcast_session_state(manager, fanout);
            }
            let _ = reply.send(result);
        }
        Command::Join { name, reply } => {
            let result = manager.join(&name);
            if let Ok(participant) = &result {
                let session_id = manager.session.as_ref().map(|s| s.id).unwrap_or_default();
                sink.record(PersistedRecord::ParticipantJoined {
                    session_id,
                    participant_id: participant.id,
                    name: participant.name.clone(),
                });
                fanout.send_to(participant.id, PlayerEvent::PlayerState(PlayerStatePayload::from(participant)));
                // Replay config here too: this participant's broadcast subscription
                // (made on connect, before Join) predates the one-shot send at
                // CreateSession, so without this they'd never see it (§4.5).
                broadcast_config(manager, fanout);
                broadcast_session_state(manager, fanout);
            }
            let _ = reply.send(result);
        }
        Command::Leave { pid, reply } => {
            let result = manager.leave(pid);
            if result.is_ok() {
                let session_id = manager.session.as_ref().map(|s| s.id).unwrap_or_default();
                sink.record(PersistedRecord::ParticipantLeft { session_id, participant_id: pid });
                fanout.unregister_participant(pid);
                broadcast_session_state(manager, fanout);
            }
            let _ = reply.send(result);
        }
        Command::Start { pid, reply } => {
            let result = manager.start(pid);
            if result.is_ok() {
                let session_id = manager.session.as_ref().map(|s| s.id).unwrap_or_default();
                sink.record(PersistedRecord::SessionStarted { session_id });
                broadcast_session_state(manager, fanout);
                broadcast_timer(manager, fanout);
            }
            let _ = reply.send(result);
        }
        Command::SubmitOrder { pid, product, side, order_type, qty, price, reply } => {
            let result = manager.submit_order(pid, &product, side, order_type, qty, price);
            if let Ok((order, trades)) = &result {
                let session_id = manager.session.as_ref().map(|s| s.id).unwrap_or_default();
                sink.record(PersistedRecord::OrderSubmitted { session_id, order: order.clone() });
                for trade in trades {
                    sink.record(PersistedRecord::Trade(trade.clone()));
                }
                if !trades.is_empty() {
                    fanout.broadcast(SessionEvent::Trades { trades: trades.clone() });
                }
                notify_order_participants(manager, fanout, pid, trades);
                broadcast_order_books(manager, fanout);
            }
            let _ = reply.send(result);
        }
        Command::CancelOrder { pid, order_id, reply } => {
            let result = manager.cancel_order(order_id, pid);
            if result.is_ok() {
                broadcast_order_books(manager, fanout);
                if let Some(p) = manager.ledger.get(pid) {
                    fanout.send_to(pid, PlayerEvent::PlayerState(PlayerStatePayload::from(p)));
                }
            }
            let _ = reply.send(result);
        }
        Command::Disconnect { pid } => {
            manager.sweep_participant(pid);
            broadcast_order_books(manager, fanout);
            fanout.unregister_participant(pid);
        }
        Command::Reset(reply) => {
            manager.reset();
            let _ = reply.send(Ok(()));
        }
    }
}

fn on_tick(manager: &mut SessionManager, fanout: &EventFanout, sink: &dyn PersistenceSink) {
    let remaining = manager.remaining_seconds();
    broadcast_timer(manager, fanout);

    let elapsed = manager.duration_seconds().saturating_sub(remaining);
    if remaining > 0 && elapsed > 0 && elapsed % 5 == 0 {
        fanout.broadcast(SessionEvent::Leaderboard { entries: manager.live_leaderboard() });
    }

    if remaining == 0 {
        match manager.end() {
            Ok(scores) => {
                let session_id = manager.session.as_ref().map(|s| s.id).unwrap_or_default();
                sink.record(PersistedRecord::SessionEnded {
                    session_id,
                    scores: scores.iter().map(FinalScoreRecord::from).collect(),
                });

                let leaderboard = final_leaderboard(manager, &scores);
                fanout.broadcast(SessionEvent::GameEnded { leaderboard: leaderboard.clone() });

                for score in &scores {
                    fanout.send_to(
                        score.participant_id,
                        PlayerEvent::FinalScore(FinalScorePayload {
                            total_score: score.total_score,
                            pnl: score.pnl,
                            sets_value: score.sets_value,
                            scrap_value: score.scrap_value,
                            complete_sets: score.complete_sets,
                        }),
                    );
                }
            }
            Err(err) => warn!(?err, "failed to end session on timer fire"),
        }
    }
}

fn final_leaderboard(manager: &SessionManager, scores: &[session::FinalScore]) -> Vec<LeaderboardEntry> {
    scores
        .iter()
        .enumerate()
        .map(|(i, s)| {
            let name = manager.ledger.get(s.participant_id).map(|p| p.name.clone()).unwrap_or_default();
            LeaderboardEntry {
                participant_id: s.participant_id,
                name,
                rank: i + 1,
                estimated_value: s.total_score,
                complete_sets: s.complete_sets,
                total_score: Some(s.total_score),
                pnl: Some(s.pnl),
            }
        })
        .collect()
}

/// Pushes a fresh `player_state` to the submitter and every counterparty a
/// trade touched, each exactly once — a resting (non-crossing) order still
/// mutates the submitter's open-order count even with an empty `trades`.
fn notify_order_participants(manager: &SessionManager, fanout: &EventFanout, submitter: ParticipantId, trades: &[Trade]) {
    let mut notified = std::collections::HashSet::new();
    notified.insert(submitter);
    if let Some(p) = manager.ledger.get(submitter) {
        fanout.send_to(submitter, PlayerEvent::PlayerState(PlayerStatePayload::from(p)));
    }
    for trade in trades {
        for pid in [trade.buyer_id, trade.seller_id] {
            if notified.insert(pid) {
                if let Some(p) = manager.ledger.get(pid) {
                    fanout.send_to(pid, PlayerEvent::PlayerState(PlayerStatePayload::from(p)));
                }
            }
        }
    }
}

fn broadcast_config(manager: &SessionManager, fanout: &EventFanout) {
    let cfg = &manager.config;
    fanout.broadcast(SessionEvent::Config(ConfigPayload {
        game_duration_seconds: cfg.game_duration_seconds,
        starting_cash: cfg.starting_cash,
        max_players: cfg.max_players,
        products: cfg.products.clone(),
        min_order_size: cfg.min_order_size,
        max_order_size: cfg.max_order_size,
    }));
}

fn broadcast_session_state(manager: &SessionManager, fanout: &EventFanout) {
    let Some(session) = &manager.session else { return };
    let names = session
        .participant_order
        .iter()
        .filter_map(|pid| manager.ledger.get(*pid))
        .map(|p| p.name.clone())
        .collect();
    fanout.broadcast(SessionEvent::SessionState(SessionStatePayload {
        status: session.status,
        participant_names: names,
    }));
}

fn broadcast_timer(manager: &SessionManager, fanout: &EventFanout) {
    fanout.broadcast(SessionEvent::Timer { remaining_seconds: manager.remaining_seconds() });
}

fn broadcast_order_books(manager: &SessionManager, fanout: &EventFanout) {
    let reveal_names = manager.config.show_order_names;
    fanout.broadcast(SessionEvent::OrderBooks { books: manager.matching.all_depths(reveal_names) });
}
