//! MatchingEngine (§4.3): submit / cancel / sweep, price-time matching loop,
//! settlement, self-trade prevention.
//!
//! The price-level walk (per-level `VecDeque`, fill-or-remove maker) feeds
//! integer settlement against a `Ledger`, plus self-trade halting and
//! market-remainder resting on top.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};
use uuid::Uuid;

use super::book::{Depth, OrderBook};
use super::error::EngineError;
use super::ledger::Ledger;
use super::order::{Order, Trade};
use super::types::{
    OrderId, OrderStatus, OrderType, ParticipantId, Product, SessionId, Side, TradeId,
    MARKET_COST_INFLATION_PER_UNIT, MARKET_REMAINDER_BUY_PRICE, MARKET_REMAINDER_SELL_PRICE,
};

pub struct MatchingEngine {
    books: HashMap<Product, OrderBook>,
    orders: HashMap<OrderId, Order>,
    sequence: u64,
    last_trade_at: Option<DateTime<Utc>>,
}

impl MatchingEngine {
    pub fn new(products: &[Product]) -> Self {
        let mut books = HashMap::new();
        for product in products {
            books.insert(product.clone(), OrderBook::new());
        }
        Self {
            books,
            orders: HashMap::new(),
            sequence: 0,
            last_trade_at: None,
        }
    }

    fn next_sequence(&mut self) -> u64 {
        self.sequence += 1;
        self.sequence
    }

    /// A wall-clock timestamp guaranteed to strictly increase trade over
    /// trade within this engine, even if `Utc::now()` ties (§5: "Trade
    /// timestamps are monotonic and unique").
    fn next_trade_timestamp(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let stamped = match self.last_trade_at {
            Some(prev) if now <= prev => prev + chrono::Duration::nanoseconds(1),
            _ => now,
        };
        self.last_trade_at = Some(stamped);
        stamped
    }

    pub fn order(&self, order_id: OrderId) -> Option<&Order> {
        self.orders.get(&order_id)
    }

    pub fn depth(&self, product: &str, reveal_names: bool) -> Option<Depth> {
        self.books.get(product).map(|b| b.depth(&self.orders, reveal_names))
    }

    pub fn all_depths(&self, reveal_names: bool) -> HashMap<Product, Depth> {
        self.books
            .iter()
            .map(|(product, book)| (product.clone(), book.depth(&self.orders, reveal_names)))
            .collect()
    }

    /// Walks visible ask liquidity to estimate a market buy's cost (§4.3.1).
    /// Quantity beyond visible liquidity is priced at a large per-unit
    /// constant so clearly-unaffordable markets are rejected early.
    fn estimate_market_buy_cost(&self, product: &str, qty: u64) -> u64 {
        let mut remaining = qty;
        let mut cost: u64 = 0;
        if let Some(book) = self.books.get(product) {
            'levels: for (price, ids) in book.ask_levels() {
                for id in ids {
                    if remaining == 0 {
                        break 'levels;
                    }
                    let Some(order) = self.orders.get(id) else { continue };
                    let take = remaining.min(order.remaining_qty);
                    cost += take * price as u64;
                    remaining -= take;
                }
            }
        }
        if remaining > 0 {
            cost += remaining * MARKET_COST_INFLATION_PER_UNIT as u64;
        }
        cost
    }

    #[allow(clippy::too_many_arguments)]
    pub fn submit(
        &mut self,
        ledger: &mut Ledger,
        session_id: SessionId,
        participant_id: ParticipantId,
        product: &str,
        side: Side,
        order_type: OrderType,
        qty: u64,
        price: Option<i64>,
        products: &[Product],
        min_order_size: u64,
        max_order_size: u64,
    ) -> Result<(Order, Vec<Trade>), EngineError> {
        if !products.iter().any(|p| p == product) {
            return Err(EngineError::UnknownProduct(product.to_string()));
        }
        if qty < min_order_size || qty > max_order_size {
            return Err(EngineError::QuantityOutOfBounds(qty, min_order_size, max_order_size));
        }
        if order_type == OrderType::Limit && price.map_or(true, |p| p <= 0) {
            return Err(EngineError::InvalidPrice);
        }

        let participant_name = ledger
            .get(participant_id)
            .ok_or_else(|| EngineError::Internal("submit: unknown participant".into()))?
            .name
            .clone();

        match side {
            Side::Buy => {
                let required_cash = match order_type {
                    OrderType::Limit => qty * price.unwrap() as u64,
                    OrderType::Market => self.estimate_market_buy_cost(product, qty),
                };
                let cash = ledger.get(participant_id).unwrap().cash;
                if cash < required_cash {
                    return Err(EngineError::InsufficientCash);
                }
            }
            Side::Sell => {
                let held = ledger.get(participant_id).unwrap().inventory_of(product);
                if held < qty {
                    return Err(EngineError::InsufficientInventory);
                }
            }
        }

        let now = Utc::now();
        let mut order = Order {
            id: Uuid::new_v4(),
            session_id,
            participant_id,
            participant_name,
            product: product.to_string(),
            side,
            order_type,
            original_qty: qty,
            remaining_qty: qty,
            price,
            status: OrderStatus::Open,
            fills: Vec::new(),
            sequence: self.next_sequence(),
            created_at: now,
            updated_at: now,
        };

        let mut trades = Vec::new();
        self.run_matching_loop(ledger, &mut order, &mut trades);

        if order.remaining_qty > 0 {
            match order.order_type {
                OrderType::Limit => {
                    self.rest(ledger, &order);
                }
                OrderType::Market => {
                    order.price = Some(match order.side {
                        Side::Buy => MARKET_REMAINDER_BUY_PRICE,
                        Side::Sell => MARKET_REMAINDER_SELL_PRICE,
                    });
                    self.rest(ledger, &order);
                }
            }
        }

        self.orders.insert(order.id, order.clone());
        Ok((order, trades))
    }

    fn rest(&mut self, ledger: &mut Ledger, order: &Order) {
        self.books.get_mut(&order.product).expect("product book must exist").add(order);
        ledger.add_open_order(order.participant_id, order.id);
    }

    fn run_matching_loop(&mut self, ledger: &mut Ledger, incoming: &mut Order, trades: &mut Vec<Trade>) {
        loop {
            if incoming.remaining_qty == 0 {
                break;
            }
            let Some(book) = self.books.get(&incoming.product) else { break };
            let Some((resting_price, resting_id)) = book.best_opposing(incoming.side) else { break };
            let resting_participant = self.orders.get(&resting_id).expect("book references a live order").participant_id;

            // Self-trade prevention: halt, don't skip to the next level (§4.3).
            if resting_participant == incoming.participant_id {
                break;
            }

            if incoming.order_type == OrderType::Limit {
                let submit_price = incoming.price.expect("limit order must carry a price");
                let compatible = match incoming.side {
                    Side::Buy => submit_price >= resting_price,
                    Side::Sell => submit_price <= resting_price,
                };
                if !compatible {
                    break;
                }
            }

            match self.execute_trade(ledger, incoming, resting_id, trades) {
                ExecuteOutcome::Continue => continue,
                ExecuteOutcome::Halt => break,
            }
        }
    }

    fn execute_trade(
        &mut self,
        ledger: &mut Ledger,
        incoming: &mut Order,
        resting_id: OrderId,
        trades: &mut Vec<Trade>,
    ) -> ExecuteOutcome {
        let resting = self.orders.get(&resting_id).expect("book references a live order").clone();
        let qty = incoming.remaining_qty.min(resting.remaining_qty);
        let price = resting.price.expect("resting order must carry a price");

        let (buyer_id, seller_id, buy_order_id, sell_order_id) = match incoming.side {
            Side::Buy => (incoming.participant_id, resting.participant_id, incoming.id, resting.id),
            Side::Sell => (resting.participant_id, incoming.participant_id, resting.id, incoming.id),
        };

        let cost = qty * price as u64;
        let buyer_cash = ledger.get(buyer_id).map(|p| p.cash).unwrap_or(0);
        let seller_inventory = ledger.get(seller_id).map(|p| p.inventory_of(&incoming.product)).unwrap_or(0);
        if buyer_cash < cost || seller_inventory < qty {
            warn!(
                buy_order_id = %buy_order_id, sell_order_id = %sell_order_id,
                "execution-time re-check failed, aborting this trade"
            );
            return ExecuteOutcome::Halt;
        }

        let debited = ledger.debit_cash(buyer_id, cost);
        let credited_ok = ledger.debit_inventory(seller_id, &incoming.product, qty);
        debug_assert!(debited && credited_ok, "re-check above should make this infallible");
        ledger.credit_cash(seller_id, cost);
        ledger.credit_inventory(buyer_id, &incoming.product, qty);

        let trade_id: TradeId = Uuid::new_v4();
        let timestamp = self.next_trade_timestamp();

        let trade = Trade {
            id: trade_id,
            session_id: incoming.session_id,
            buy_order_id,
            sell_order_id,
            buyer_id,
            seller_id,
            product: incoming.product.clone(),
            qty,
            price,
            value: cost as i64,
            timestamp,
        };

        incoming.push_fill(trade_id, qty, price, timestamp);
        ledger.get_mut(buyer_id).map(|p| p.trade_history.push(trade_id));
        ledger.get_mut(seller_id).map(|p| p.trade_history.push(trade_id));

        let mut resting_order = self.orders.get(&resting_id).cloned().expect("resting order must exist");
        resting_order.push_fill(trade_id, qty, price, timestamp);
        let resting_filled = resting_order.status == OrderStatus::Filled;
        self.orders.insert(resting_id, resting_order.clone());

        if resting_filled {
            self.books
                .get_mut(&incoming.product)
                .expect("product book must exist")
                .remove(resting_id, price);
            ledger.remove_open_order(resting_order.participant_id, resting_id);
        }

        debug!(trade_id = %trade_id, qty, price, "trade executed");
        trades.push(trade);
        ExecuteOutcome::Continue
    }

    pub fn cancel(&mut self, ledger: &mut Ledger, order_id: OrderId, requesting_pid: ParticipantId) -> Result<(), EngineError> {
        let order = self.orders.get_mut(&order_id).ok_or(EngineError::NotFound)?;
        if order.participant_id != requesting_pid {
            return Err(EngineError::NotOwner);
        }
        if !order.is_resting_eligible() {
            return Err(EngineError::AlreadyTerminal);
        }

        order.status = OrderStatus::Cancelled;
        order.updated_at = Utc::now();
        let price = order.price.expect("resting order must carry a price");
        let product = order.product.clone();

        self.books.get_mut(&product).expect("product book must exist").remove(order_id, price);
        ledger.remove_open_order(requesting_pid, order_id);
        Ok(())
    }

    pub fn sweep_participant(&mut self, ledger: &mut Ledger, pid: ParticipantId) {
        let ids: Vec<OrderId> = ledger.get(pid).map(|p| p.open_orders.iter().copied().collect()).unwrap_or_default();
        for id in ids {
            let _ = self.cancel(ledger, id, pid);
        }
    }

    pub fn sweep_session(&mut self, ledger: &mut Ledger) {
        for book in self.books.values_mut() {
            let ids = book.sweep_cancel();
            for id in ids {
                if let Some(order) = self.orders.get_mut(&id) {
                    order.status = OrderStatus::Cancelled;
                    order.updated_at = Utc::now();
                    ledger.remove_open_order(order.participant_id, id);
                }
            }
        }
    }

    pub fn reset(&mut self, products: &[Product]) {
        self.orders.clear();
        self.books = products.iter().map(|p| (p.clone(), OrderBook::new())).collect();
        self.sequence = 0;
        self.last_trade_at = None;
    }
}

enum ExecuteOutcome {
    Continue,
    Halt,
}
