//! Per-product order book (§4.2): price-time-ordered resting limit orders.
//!
//! `BTreeMap` price levels hold a `VecDeque` of order ids for time priority
//! within a level, plus a side index for O(1) removal. Integer prices
//! throughout; this book only ever holds resting order ids, not the
//! mutable fill state — that lives in the `MatchingEngine`'s order store.

use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap, VecDeque};

use serde::Serialize;

use super::order::Order;
use super::types::{OrderId, Side};

#[derive(Debug, Default)]
pub struct OrderBook {
    /// Descending price, ascending arrival within a level.
    bids: BTreeMap<Reverse<i64>, VecDeque<OrderId>>,
    /// Ascending price, ascending arrival within a level.
    asks: BTreeMap<i64, VecDeque<OrderId>>,
    index: HashMap<OrderId, Side>,
}

#[derive(Debug, Serialize, Clone)]
pub struct DepthLevel {
    pub price: i64,
    pub total_qty: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub orders: Option<Vec<DepthOrder>>,
}

#[derive(Debug, Serialize, Clone)]
pub struct DepthOrder {
    pub order_id: OrderId,
    pub qty: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub participant_name: Option<String>,
}

#[derive(Debug, Serialize, Clone, Default)]
pub struct Depth {
    pub bids: Vec<DepthLevel>,
    pub asks: Vec<DepthLevel>,
}

impl OrderBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, order: &Order) {
        self.index.insert(order.id, order.side);
        let price = order.price.expect("resting order must carry a price");
        match order.side {
            Side::Buy => self.bids.entry(Reverse(price)).or_default().push_back(order.id),
            Side::Sell => self.asks.entry(price).or_default().push_back(order.id),
        }
    }

    /// O(n) over the relevant price level — acceptable for expected small books (§4.2).
    pub fn remove(&mut self, order_id: OrderId, price: i64) {
        let Some(side) = self.index.remove(&order_id) else {
            return;
        };
        match side {
            Side::Buy => {
                let key = Reverse(price);
                if let Some(queue) = self.bids.get_mut(&key) {
                    queue.retain(|id| *id != order_id);
                    if queue.is_empty() {
                        self.bids.remove(&key);
                    }
                }
            }
            Side::Sell => {
                if let Some(queue) = self.asks.get_mut(&price) {
                    queue.retain(|id| *id != order_id);
                    if queue.is_empty() {
                        self.asks.remove(&price);
                    }
                }
            }
        }
    }

    pub fn best_bid(&self) -> Option<(i64, OrderId)> {
        self.bids
            .iter()
            .next()
            .and_then(|(Reverse(price), q)| q.front().map(|id| (*price, *id)))
    }

    pub fn best_ask(&self) -> Option<(i64, OrderId)> {
        self.asks
            .iter()
            .next()
            .and_then(|(price, q)| q.front().map(|id| (*price, *id)))
    }

    /// Orders resting at the best opposing price for `side`'s incoming order,
    /// in price-time order: best_ask for a buy, best_bid for a sell.
    pub fn best_opposing(&self, side: Side) -> Option<(i64, OrderId)> {
        match side {
            Side::Buy => self.best_ask(),
            Side::Sell => self.best_bid(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.bids.is_empty() && self.asks.is_empty()
    }

    /// Ask price levels in ascending order, for walking visible liquidity (§4.3.1).
    pub fn ask_levels(&self) -> impl Iterator<Item = (i64, &VecDeque<OrderId>)> {
        self.asks.iter().map(|(p, q)| (*p, q))
    }

    /// Bid price levels in descending order.
    pub fn bid_levels(&self) -> impl Iterator<Item = (i64, &VecDeque<OrderId>)> {
        self.bids.iter().map(|(Reverse(p), q)| (*p, q))
    }

    pub fn order_ids(&self) -> Vec<OrderId> {
        self.index.keys().copied().collect()
    }

    pub fn depth(&self, orders: &HashMap<OrderId, Order>, reveal_names: bool) -> Depth {
        let build = |ids: &VecDeque<OrderId>| -> (u64, Vec<DepthOrder>) {
            let mut total = 0u64;
            let mut out = Vec::new();
            for id in ids {
                if let Some(o) = orders.get(id) {
                    total += o.remaining_qty;
                    out.push(DepthOrder {
                        order_id: *id,
                        qty: o.remaining_qty,
                        participant_name: reveal_names.then(|| o.participant_name.clone()),
                    });
                }
            }
            (total, out)
        };

        let bids = self
            .bids
            .iter()
            .map(|(Reverse(price), ids)| {
                let (total_qty, orders) = build(ids);
                DepthLevel {
                    price: *price,
                    total_qty,
                    orders: Some(orders),
                }
            })
            .collect();

        let asks = self
            .asks
            .iter()
            .map(|(price, ids)| {
                let (total_qty, orders) = build(ids);
                DepthLevel {
                    price: *price,
                    total_qty,
                    orders: Some(orders),
                }
            })
            .collect();

        Depth { bids, asks }
    }

    pub fn sweep_cancel(&mut self) -> Vec<OrderId> {
        let ids = self.order_ids();
        self.bids.clear();
        self.asks.clear();
        self.index.clear();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::types::{OrderStatus, OrderType};
    use chrono::Utc;
    use uuid::Uuid;

    fn order(side: Side, price: i64, qty: u64, seq: u64) -> Order {
        let now = Utc::now();
        Order {
            id: Uuid::new_v4(),
            session_id: Uuid::new_v4(),
            participant_id: Uuid::new_v4(),
            participant_name: "alice".into(),
            product: "bread".into(),
            side,
            order_type: OrderType::Limit,
            original_qty: qty,
            remaining_qty: qty,
            price: Some(price),
            status: OrderStatus::Open,
            fills: vec![],
            sequence: seq,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn best_bid_ask_and_spread() {
        let mut book = OrderBook::new();
        let b1 = order(Side::Buy, 10, 1, 0);
        let b2 = order(Side::Buy, 12, 1, 1);
        let a1 = order(Side::Sell, 15, 1, 2);
        book.add(&b1);
        book.add(&b2);
        book.add(&a1);

        assert_eq!(book.best_bid().unwrap().0, 12);
        assert_eq!(book.best_ask().unwrap().0, 15);
    }

    #[test]
    fn remove_drops_empty_level() {
        let mut book = OrderBook::new();
        let o = order(Side::Sell, 7, 3, 0);
        book.add(&o);
        book.remove(o.id, 7);
        assert!(book.is_empty());
    }

    #[test]
    fn time_priority_within_level() {
        let mut book = OrderBook::new();
        let first = order(Side::Sell, 7, 3, 0);
        let second = order(Side::Sell, 7, 1, 1);
        book.add(&first);
        book.add(&second);

        assert_eq!(book.best_ask().unwrap().1, first.id);
    }
}
