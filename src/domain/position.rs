//! Per-symbol positions under the average-cost basis.
//!
//! Each symbol's trades are folded in store order. Opening trades blend into a
//! single running average; reducing trades realize P&L against it, net of
//! their own fees. Fees on opening trades only show up in `total_fees`. There
//! is no FIFO/LIFO lot tracking.

use chrono::NaiveDateTime;
use std::collections::{BTreeMap, HashMap};

use crate::domain::store::TradeStore;
use crate::domain::trade::{Trade, TradeId};

/// Current prices by symbol, used for unrealized P&L.
pub type PriceMap = HashMap<String, f64>;

/// Net quantities smaller than this are treated as flat.
pub const FLAT_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub symbol: String,
    pub net_quantity: f64,
    /// `None` while flat.
    pub average_cost: Option<f64>,
    pub realized_pnl: f64,
    /// `None` when no current price is known.
    pub unrealized_pnl: Option<f64>,
    pub total_fees: f64,
    pub trade_count: usize,
    pub last_activity: NaiveDateTime,
    pub currency: String,
}

impl Position {
    pub fn is_long(&self) -> bool {
        self.net_quantity > 0.0
    }

    pub fn is_short(&self) -> bool {
        self.net_quantity < 0.0
    }

    pub fn is_flat(&self) -> bool {
        self.net_quantity == 0.0
    }

    /// Realized plus unrealized, when the latter is defined.
    pub fn total_pnl(&self) -> Option<f64> {
        self.unrealized_pnl.map(|u| self.realized_pnl + u)
    }
}

/// P&L booked by a single reducing trade, fees included.
#[derive(Debug, Clone, PartialEq)]
pub struct Realization {
    pub trade_id: TradeId,
    pub symbol: String,
    pub timestamp: NaiveDateTime,
    pub pnl: f64,
}

/// Running average-cost state for one symbol.
#[derive(Debug, Clone, Default)]
struct Book {
    net_quantity: f64,
    average_cost: f64,
    realized_pnl: f64,
    total_fees: f64,
    trade_count: usize,
}

impl Book {
    /// Apply one trade. Returns the P&L realized by it if it reduced the
    /// open side.
    fn apply(&mut self, trade: &Trade) -> Option<f64> {
        let signed = trade.signed_quantity();
        self.trade_count += 1;
        self.total_fees += trade.fees;

        let same_direction = self.net_quantity == 0.0 || self.net_quantity.signum() == signed.signum();
        let realized = if same_direction {
            let open = self.net_quantity.abs();
            self.average_cost = (open * self.average_cost + trade.quantity * trade.price)
                / (open + trade.quantity);
            self.net_quantity += signed;
            None
        } else {
            let open = self.net_quantity.abs();
            let closed = trade.quantity.min(open);
            // Long closes gain when price rises; short closes when it falls.
            let gross = (trade.price - self.average_cost) * closed * self.net_quantity.signum();
            let remainder = trade.quantity - closed;
            self.net_quantity += signed;
            if remainder > FLAT_EPSILON {
                // Crossed through zero: the excess opens a fresh lot.
                self.average_cost = trade.price;
            }
            Some(gross)
        };

        if self.net_quantity.abs() < FLAT_EPSILON {
            self.net_quantity = 0.0;
            self.average_cost = 0.0;
        }

        let net = realized.map(|gross| gross - trade.fees);
        if let Some(pnl) = net {
            self.realized_pnl += pnl;
        }
        net
    }

    fn average_cost(&self) -> Option<f64> {
        (self.net_quantity != 0.0).then_some(self.average_cost)
    }
}

/// Compute one position per symbol from the store.
pub fn positions(store: &TradeStore, prices: &PriceMap) -> BTreeMap<String, Position> {
    store
        .symbols()
        .filter_map(|symbol| position_for(store, symbol, prices).map(|p| (symbol.to_string(), p)))
        .collect()
}

/// Position for a single symbol, or `None` when the store has no trades for it.
pub fn position_for(store: &TradeStore, symbol: &str, prices: &PriceMap) -> Option<Position> {
    let trades = store.by_symbol(symbol);
    let first = trades.first()?;
    let last = trades.last()?;

    let mut book = Book::default();
    for trade in &trades {
        book.apply(trade);
    }

    let average_cost = book.average_cost();
    let unrealized_pnl = prices.get(symbol).map(|&price| match average_cost {
        Some(avg) => (price - avg) * book.net_quantity,
        None => 0.0,
    });

    Some(Position {
        symbol: symbol.to_string(),
        net_quantity: book.net_quantity,
        average_cost,
        realized_pnl: book.realized_pnl,
        unrealized_pnl,
        total_fees: book.total_fees,
        trade_count: book.trade_count,
        last_activity: last.timestamp,
        currency: first.currency.clone(),
    })
}

/// Every reducing trade's realized P&L, in store order.
pub fn realizations(store: &TradeStore) -> Vec<Realization> {
    let mut books: HashMap<&str, Book> = HashMap::new();
    let mut out = Vec::new();
    for trade in store.all() {
        let book = books.entry(trade.symbol.as_str()).or_default();
        if let Some(pnl) = book.apply(trade) {
            out.push(Realization {
                trade_id: trade.id,
                symbol: trade.symbol.clone(),
                timestamp: trade.timestamp,
                pnl,
            });
        }
    }
    out
}
