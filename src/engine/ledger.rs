//! Ledger (§4.1): per-participant cash + inventory + open-order membership.
//!
//! All mutations here are total functions — insufficient-resource checks
//! happen in the engine, not here (§4.1). Under-zero would indicate an
//! engine bug; we panic rather than silently clamp, matching spec.md's
//! "Internal: ledger under-zero ... panic in debug, log + drop in release".

use std::collections::{HashMap, HashSet};

use super::types::{OrderId, ParticipantId, Product};

#[derive(Debug, Clone)]
pub struct Participant {
    pub id: ParticipantId,
    pub name: String,
    pub cash: u64,
    pub inventory: HashMap<Product, u64>,
    pub open_orders: HashSet<OrderId>,
    pub trade_history: Vec<super::types::TradeId>,
    pub initial_cash: u64,
    pub initial_inventory: HashMap<Product, u64>,
}

impl Participant {
    pub fn new(id: ParticipantId, name: String, cash: u64, inventory: HashMap<Product, u64>) -> Self {
        Self {
            id,
            name,
            cash,
            initial_cash: cash,
            initial_inventory: inventory.clone(),
            inventory,
            open_orders: HashSet::new(),
            trade_history: Vec::new(),
        }
    }

    pub fn inventory_of(&self, product: &str) -> u64 {
        self.inventory.get(product).copied().unwrap_or(0)
    }
}

#[derive(Debug, Default)]
pub struct Ledger {
    participants: HashMap<ParticipantId, Participant>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn admit(&mut self, participant: Participant) {
        self.participants.insert(participant.id, participant);
    }

    pub fn remove(&mut self, pid: ParticipantId) {
        self.participants.remove(&pid);
    }

    pub fn get(&self, pid: ParticipantId) -> Option<&Participant> {
        self.participants.get(&pid)
    }

    pub fn get_mut(&mut self, pid: ParticipantId) -> Option<&mut Participant> {
        self.participants.get_mut(&pid)
    }

    pub fn contains(&self, pid: ParticipantId) -> bool {
        self.participants.contains_key(&pid)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Participant> {
        self.participants.values()
    }

    pub fn len(&self) -> usize {
        self.participants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }

    pub fn name_taken(&self, name: &str) -> bool {
        self.participants
            .values()
            .any(|p| p.name.eq_ignore_ascii_case(name))
    }

    pub fn credit_cash(&mut self, pid: ParticipantId, n: u64) {
        let p = self.participants.get_mut(&pid).expect("credit_cash: unknown participant");
        p.cash = p.cash.checked_add(n).expect("cash overflow");
    }

    /// Returns `true` and debits on success, `false` (no mutation) if insufficient.
    pub fn debit_cash(&mut self, pid: ParticipantId, n: u64) -> bool {
        let p = self.participants.get_mut(&pid).expect("debit_cash: unknown participant");
        if p.cash < n {
            return false;
        }
        p.cash -= n;
        true
    }

    pub fn credit_inventory(&mut self, pid: ParticipantId, product: &str, n: u64) {
        let p = self.participants.get_mut(&pid).expect("credit_inventory: unknown participant");
        let entry = p.inventory.entry(product.to_string()).or_insert(0);
        *entry = entry.checked_add(n).expect("inventory overflow");
    }

    pub fn debit_inventory(&mut self, pid: ParticipantId, product: &str, n: u64) -> bool {
        let p = self.participants.get_mut(&pid).expect("debit_inventory: unknown participant");
        let held = p.inventory.get(product).copied().unwrap_or(0);
        if held < n {
            return false;
        }
        p.inventory.insert(product.to_string(), held - n);
        true
    }

    pub fn add_open_order(&mut self, pid: ParticipantId, oid: OrderId) {
        let p = self.participants.get_mut(&pid).expect("add_open_order: unknown participant");
        p.open_orders.insert(oid);
    }

    pub fn remove_open_order(&mut self, pid: ParticipantId, oid: OrderId) {
        if let Some(p) = self.participants.get_mut(&pid) {
            p.open_orders.remove(&oid);
        }
    }

    pub fn initial_scrap_value(&self, pid: ParticipantId, scrap_values: &HashMap<Product, u64>) -> u64 {
        let p = self.participants.get(&pid).expect("initial_scrap_value: unknown participant");
        p.initial_inventory
            .iter()
            .map(|(product, qty)| qty * scrap_values.get(product).copied().unwrap_or(0))
            .sum()
    }

    /// `k = min over recipe of floor(inventory[p] / recipe[p])`.
    pub fn complete_sets(&self, pid: ParticipantId, recipe: &HashMap<Product, u64>) -> u64 {
        let p = self.participants.get(&pid).expect("complete_sets: unknown participant");
        recipe
            .iter()
            .map(|(product, need)| {
                if *need == 0 {
                    0
                } else {
                    p.inventory_of(product) / need
                }
            })
            .min()
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(id: ParticipantId) -> Participant {
        let mut inv = HashMap::new();
        inv.insert("bread".to_string(), 10);
        Participant::new(id, "alice".to_string(), 100, inv)
    }

    #[test]
    fn credit_debit_cash_roundtrip() {
        let mut ledger = Ledger::new();
        let pid = ParticipantId::new_v4();
        ledger.admit(sample(pid));

        assert!(ledger.debit_cash(pid, 40));
        assert_eq!(ledger.get(pid).unwrap().cash, 60);
        ledger.credit_cash(pid, 10);
        assert_eq!(ledger.get(pid).unwrap().cash, 70);
    }

    #[test]
    fn debit_cash_insufficient_is_noop() {
        let mut ledger = Ledger::new();
        let pid = ParticipantId::new_v4();
        ledger.admit(sample(pid));

        assert!(!ledger.debit_cash(pid, 1000));
        assert_eq!(ledger.get(pid).unwrap().cash, 100);
    }

    #[test]
    fn complete_sets_is_floor_min() {
        let mut ledger = Ledger::new();
        let pid = ParticipantId::new_v4();
        let mut inv = HashMap::new();
        inv.insert("bread".to_string(), 2);
        inv.insert("veggies".to_string(), 5);
        ledger.admit(Participant::new(pid, "bob".to_string(), 0, inv));

        let mut recipe = HashMap::new();
        recipe.insert("bread".to_string(), 1);
        recipe.insert("veggies".to_string(), 2);

        assert_eq!(ledger.complete_sets(pid, &recipe), 2);
    }

    #[test]
    fn name_taken_is_case_insensitive() {
        let mut ledger = Ledger::new();
        ledger.admit(sample(ParticipantId::new_v4()));
        assert!(ledger.name_taken("ALICE"));
        assert!(!ledger.name_taken("carol"));
    }
}
