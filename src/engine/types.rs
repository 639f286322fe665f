//! Core value types shared across the engine.
//!
//! All quantities and prices are plain integers — the settlement path never
//! touches floating point (§3, §4.1 of the design).

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

pub type ParticipantId = Uuid;
pub type OrderId = Uuid;
pub type TradeId = Uuid;
pub type SessionId = Uuid;

/// One of the game's fixed, ordered set of fungible products.
pub type Product = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "buy"),
            Side::Sell => write!(f, "sell"),
        }
    }
}

impl Side {
    pub fn opposite(self) -> Side {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderType {
    Limit,
    Market,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Open,
    Partial,
    Filled,
    Cancelled,
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OrderStatus::Open => "open",
            OrderStatus::Partial => "partial",
            OrderStatus::Filled => "filled",
            OrderStatus::Cancelled => "cancelled",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Lobby,
    Running,
    Ended,
}

/// Synthetic extreme price an unfilled market remainder rests at (§4.3).
/// Chosen far outside any realistic limit price so it never blocks a
/// genuine limit order's price-time priority, while still sorting last.
pub const MARKET_REMAINDER_BUY_PRICE: i64 = i64::MAX / 2;
pub const MARKET_REMAINDER_SELL_PRICE: i64 = 1;

/// Per-unit inflation applied to market-buy cost estimates once visible
/// liquidity runs out, to reject clearly unaffordable markets early (§4.3.1).
pub const MARKET_COST_INFLATION_PER_UNIT: i64 = 1_000_000;
