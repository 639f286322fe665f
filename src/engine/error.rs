//! Error taxonomy (§7).
//!
//! One variant per error kind; `code()` returns the machine-readable tag
//! used in `{error: ...}` wire replies, separate from the human-readable
//! `Display` message.

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EngineError {
    // Validation
    #[error("unknown product: {0}")]
    UnknownProduct(String),
    #[error("quantity {0} out of bounds [{1}, {2}]")]
    QuantityOutOfBounds(u64, u64, u64),
    #[error("limit orders require a positive price")]
    InvalidPrice,
    #[error("participant name must not be empty")]
    EmptyName,
    #[error("participant name already taken")]
    NameTaken,

    // Authorization
    #[error("only the host may start the session")]
    NotHost,
    #[error("participant does not own this order")]
    NotOwner,

    // State
    #[error("no active session")]
    NoSession,
    #[error("session already active")]
    AlreadyActive,
    #[error("session is not running")]
    SessionNotRunning,
    #[error("session is not in lobby")]
    NotLobby,
    #[error("session is full")]
    SessionFull,
    #[error("at least two participants are required to start")]
    TooFewPlayers,
    #[error("order is already in a terminal state")]
    AlreadyTerminal,
    #[error("order not found")]
    NotFound,

    // Resource
    #[error("insufficient cash")]
    InsufficientCash,
    #[error("insufficient inventory")]
    InsufficientInventory,

    // Internal
    #[error("internal engine error: {0}")]
    Internal(String),
}

impl EngineError {
    /// Machine-readable tag, as sent over the wire in `{error: ...}`.
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::UnknownProduct(_) => "unknown_product",
            EngineError::QuantityOutOfBounds(..) => "quantity_out_of_bounds",
            EngineError::InvalidPrice => "invalid_price",
            EngineError::EmptyName => "empty_name",
            EngineError::NameTaken => "name_taken",
            EngineError::NotHost => "not_host",
            EngineError::NotOwner => "not_owner",
            EngineError::NoSession => "no_session",
            EngineError::AlreadyActive => "already_active",
            EngineError::SessionNotRunning => "session_not_running",
            EngineError::NotLobby => "not_lobby",
            EngineError::SessionFull => "full",
            EngineError::TooFewPlayers => "too_few_players",
            EngineError::AlreadyTerminal => "already_terminal",
            EngineError::NotFound => "not_found",
            EngineError::InsufficientCash => "insufficient_cash",
            EngineError::InsufficientInventory => "insufficient_inventory",
            EngineError::Internal(_) => "internal_error",
        }
    }
}
