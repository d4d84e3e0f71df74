//! Immutable, indexed trade collection.

use std::collections::{BTreeMap, HashMap};

use crate::domain::error::CommandError;
use crate::domain::trade::{Trade, TradeAmendment, TradeId};

/// Trades ordered by timestamp, ties broken by load order.
///
/// A store never changes after construction. Edits produce a new store via
/// [`TradeStore::amend`].
#[derive(Debug, Clone, PartialEq)]
pub struct TradeStore {
    trades: Vec<Trade>,
    id_index: HashMap<TradeId, usize>,
    symbol_index: BTreeMap<String, Vec<usize>>,
}

impl TradeStore {
    pub fn new(mut trades: Vec<Trade>) -> Self {
        trades.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then(a.id.cmp(&b.id)));

        let mut id_index = HashMap::with_capacity(trades.len());
        let mut symbol_index: BTreeMap<String, Vec<usize>> = BTreeMap::new();
        for (i, trade) in trades.iter().enumerate() {
            id_index.insert(trade.id, i);
            symbol_index.entry(trade.symbol.clone()).or_default().push(i);
        }

        Self {
            trades,
            id_index,
            symbol_index,
        }
    }

    pub fn all(&self) -> &[Trade] {
        &self.trades
    }

    pub fn by_id(&self, id: TradeId) -> Option<&Trade> {
        self.id_index.get(&id).map(|&i| &self.trades[i])
    }

    /// Trades for `symbol` in store order. Empty for an unknown symbol.
    pub fn by_symbol(&self, symbol: &str) -> Vec<&Trade> {
        self.symbol_index
            .get(symbol)
            .map(|indices| indices.iter().map(|&i| &self.trades[i]).collect())
            .unwrap_or_default()
    }

    pub fn has_symbol(&self, symbol: &str) -> bool {
        self.symbol_index.contains_key(symbol)
    }

    /// Distinct symbols, sorted.
    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        self.symbol_index.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.trades.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trades.is_empty()
    }

    /// Build a new snapshot in which trade `id` is replaced by its next revision.
    pub fn amend(&self, id: TradeId, amendment: &TradeAmendment) -> Result<TradeStore, CommandError> {
        let current = self.by_id(id).ok_or(CommandError::UnknownTrade(id))?;
        if amendment.is_empty() {
            return Err(CommandError::InvalidAmendment {
                id,
                reason: "no fields to change".to_string(),
            });
        }
        let next = current
            .amended(amendment)
            .map_err(|reason| CommandError::InvalidAmendment { id, reason })?;

        let trades = self
            .trades
            .iter()
            .map(|t| if t.id == id { next.clone() } else { t.clone() })
            .collect();
        Ok(TradeStore::new(trades))
    }
}
