//! Whole-dataset performance statistics.

use std::collections::HashSet;

use crate::domain::position::realizations;
use crate::domain::store::TradeStore;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PerformanceSummary {
    pub trade_count: usize,
    pub symbol_count: usize,
    pub gross_notional: f64,
    pub total_fees: f64,
    /// Sum of all realized P&L, net of closing-trade fees.
    pub realized_pnl: f64,
    pub closing_trades: usize,
    pub winning: usize,
    pub losing: usize,
    pub breakeven: usize,
    pub win_rate: f64,
    pub largest_win: f64,
    pub largest_loss: f64,
    /// Largest peak-to-trough fall of cumulative realized P&L, in currency units.
    pub max_drawdown: f64,
}

impl PerformanceSummary {
    pub fn compute(store: &TradeStore) -> Self {
        let trades = store.all();
        let symbols: HashSet<&str> = trades.iter().map(|t| t.symbol.as_str()).collect();

        let mut summary = PerformanceSummary {
            trade_count: trades.len(),
            symbol_count: symbols.len(),
            gross_notional: trades.iter().map(|t| t.notional()).sum(),
            total_fees: trades.iter().map(|t| t.fees).sum(),
            ..Default::default()
        };

        let realized = realizations(store);
        for r in &realized {
            if r.pnl > 0.0 {
                summary.winning += 1;
                summary.largest_win = summary.largest_win.max(r.pnl);
            } else if r.pnl < 0.0 {
                summary.losing += 1;
                summary.largest_loss = summary.largest_loss.max(r.pnl.abs());
            } else {
                summary.breakeven += 1;
            }
        }
        summary.closing_trades = realized.len();
        summary.win_rate = if realized.is_empty() {
            0.0
        } else {
            summary.winning as f64 / realized.len() as f64
        };

        summary.realized_pnl = realized.iter().map(|r| r.pnl).sum();

        summary.max_drawdown = max_drawdown(realized.iter().map(|r| r.pnl));
        summary
    }
}

/// Largest drop from a running peak of the cumulative sum. The peak starts at 0.
fn max_drawdown(pnls: impl Iterator<Item = f64>) -> f64 {
    let mut cumulative = 0.0_f64;
    let mut peak = 0.0_f64;
    let mut max_dd = 0.0_f64;
    for pnl in pnls {
        cumulative += pnl;
        peak = peak.max(cumulative);
        max_dd = max_dd.max(peak - cumulative);
    }
    max_dd
}
