//! Order and Trade records (§3).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::types::{OrderId, OrderStatus, OrderType, ParticipantId, Product, SessionId, Side, TradeId};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fill {
    pub trade_id: TradeId,
    pub qty: u64,
    pub price: i64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub session_id: SessionId,
    pub participant_id: ParticipantId,
    pub participant_name: String,
    pub product: Product,
    pub side: Side,
    pub order_type: OrderType,
    pub original_qty: u64,
    pub remaining_qty: u64,
    /// `None` only momentarily for a market order before the post-loop
    /// remainder handling assigns the synthetic extreme (§4.3).
    pub price: Option<i64>,
    pub status: OrderStatus,
    pub fills: Vec<Fill>,
    /// Monotonic tie-breaker for price-time priority — never wall-clock (§5).
    pub sequence: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn is_resting_eligible(&self) -> bool {
        matches!(self.status, OrderStatus::Open | OrderStatus::Partial)
    }

    /// Recomputes `status` from `remaining_qty` per the invariant in §3.
    pub fn recompute_status(&mut self) {
        if self.status == OrderStatus::Cancelled {
            return;
        }
        self.status = if self.remaining_qty == 0 {
            OrderStatus::Filled
        } else if self.remaining_qty < self.original_qty {
            OrderStatus::Partial
        } else {
            OrderStatus::Open
        };
    }

    pub fn push_fill(&mut self, trade_id: TradeId, qty: u64, price: i64, now: DateTime<Utc>) {
        self.fills.push(Fill {
            trade_id,
            qty,
            price,
            timestamp: now,
        });
        self.remaining_qty -= qty;
        self.recompute_status();
        self.updated_at = now;
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trade {
    pub id: TradeId,
    pub session_id: SessionId,
    pub buy_order_id: OrderId,
    pub sell_order_id: OrderId,
    pub buyer_id: ParticipantId,
    pub seller_id: ParticipantId,
    pub product: Product,
    pub qty: u64,
    pub price: i64,
    pub value: i64,
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn sample_order() -> Order {
        let now = Utc::now();
        Order {
            id: Uuid::new_v4(),
            session_id: Uuid::new_v4(),
            participant_id: Uuid::new_v4(),
            participant_name: "alice".into(),
            product: "bread".into(),
            side: Side::Sell,
            order_type: OrderType::Limit,
            original_qty: 5,
            remaining_qty: 5,
            price: Some(3),
            status: OrderStatus::Open,
            fills: vec![],
            sequence: 0,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn partial_fill_sets_partial_status() {
        let mut order = sample_order();
        order.push_fill(Uuid::new_v4(), 2, 3, Utc::now());
        assert_eq!(order.remaining_qty, 3);
        assert_eq!(order.status, OrderStatus::Partial);
    }

    #[test]
    fn full_fill_sets_filled_status() {
        let mut order = sample_order();
        order.push_fill(Uuid::new_v4(), 5, 3, Utc::now());
        assert_eq!(order.remaining_qty, 0);
        assert_eq!(order.status, OrderStatus::Filled);
    }
}
