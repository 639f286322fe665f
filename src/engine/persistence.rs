//! Persistence (ambient, §5 "Shared resources"): an append-only sink the
//! engine actor writes to outside its critical section.
//!
//! A spawned task drains an unbounded channel and appends JSON-Lines
//! records to a file, kept off the matching hot path the same way a
//! background persistence worker would drain a trade-event channel
//! against a database.

use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tracing::{error, info};

use super::order::{Order, Trade};
use super::session::FinalScore;
use super::types::{ParticipantId, SessionId};

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "record", rename_all = "snake_case")]
pub enum PersistedRecord {
    SessionCreated { session_id: SessionId },
    ParticipantJoined { session_id: SessionId, participant_id: ParticipantId, name: String },
    ParticipantLeft { session_id: SessionId, participant_id: ParticipantId },
    SessionStarted { session_id: SessionId },
    OrderSubmitted { session_id: SessionId, order: Order },
    Trade(Trade),
    SessionEnded { session_id: SessionId, scores: Vec<FinalScoreRecord> },
}

#[derive(Debug, Clone, Serialize)]
pub struct FinalScoreRecord {
    pub participant_id: ParticipantId,
    pub total_score: u64,
    pub pnl: i64,
}

impl From<&FinalScore> for FinalScoreRecord {
    fn from(s: &FinalScore) -> Self {
        Self {
            participant_id: s.participant_id,
            total_score: s.total_score,
            pnl: s.pnl,
        }
    }
}

/// Append-only persistence. Implementors must not block the caller for
/// long; the engine actor only ever enqueues onto a channel a background
/// task drains (§5).
pub trait PersistenceSink: Send + Sync {
    fn record(&self, record: PersistedRecord);
}

/// Discards everything. Used in tests and whenever persistence is disabled.
pub struct NullSink;

impl PersistenceSink for NullSink {
    fn record(&self, _record: PersistedRecord) {}
}

/// Forwards records onto an unbounded channel drained by
/// [`run_jsonl_writer`], so a slow disk never stalls the engine actor.
pub struct JsonlSink {
    tx: mpsc::UnboundedSender<PersistedRecord>,
}

impl JsonlSink {
    /// Spawns the background writer and returns the sink handle. The
    /// writer owns the receiving end and the file handle; the sink only
    /// ever sends.
    pub fn spawn(path: PathBuf) -> Arc<Self> {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run_jsonl_writer(path, rx));
        Arc::new(Self { tx })
    }
}

impl PersistenceSink for JsonlSink {
    fn record(&self, record: PersistedRecord) {
        if self.tx.send(record).is_err() {
            error!("persistence writer task is gone, dropping record");
        }
    }
}

async fn run_jsonl_writer(path: PathBuf, mut rx: mpsc::UnboundedReceiver<PersistedRecord>) {
    let file = OpenOptions::new().create(true).append(true).open(&path).await;
    let mut file = match file {
        Ok(f) => f,
        Err(err) => {
            error!(?err, path = %path.display(), "failed to open persistence file, records will be dropped");
            while rx.recv().await.is_some() {}
            return;
        }
    };

    info!(path = %path.display(), "persistence writer started");
    while let Some(record) = rx.recv().await {
        let line = match serde_json::to_string(&record) {
            Ok(l) => l,
            Err(err) => {
                error!(?err, "failed to serialize persisted record");
                continue;
            }
        };
        if let Err(err) = file.write_all(line.as_bytes()).await {
            error!(?err, "failed to write persisted record");
            continue;
        }
        let _ = file.write_all(b"\n").await;
    }
    info!("persistence writer shutting down");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_sink_accepts_any_record_without_panicking() {
        let sink = NullSink;
        sink.record(PersistedRecord::SessionEnded {
            session_id: SessionId::new_v4(),
            scores: Vec::new(),
        });
    }

    #[test]
    fn participant_records_serialize_with_a_record_tag() {
        let record = PersistedRecord::ParticipantJoined {
            session_id: SessionId::new_v4(),
            participant_id: ParticipantId::new_v4(),
            name: "alice".to_string(),
        };
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"record\":\"participant_joined\""));
    }
}
