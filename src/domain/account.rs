//! Running account capital and the closed-trade log.

use chrono::NaiveDate;

use super::position::Trade;

/// Cumulative realized P/L after one closed trade.
#[derive(Debug, Clone, PartialEq)]
pub struct EquityPoint {
    pub date: NaiveDate,
    pub cumulative_pnl: f64,
    pub capital: f64,
}

/// Single-writer account: capital moves only when a trade is recorded.
#[derive(Debug, Clone, PartialEq)]
pub struct AccountState {
    pub initial_capital: f64,
    pub capital: f64,
    pub trades: Vec<Trade>,
}

impl AccountState {
    pub fn new(initial_capital: f64) -> Self {
        AccountState {
            initial_capital,
            capital: initial_capital,
            trades: Vec::new(),
        }
    }

    /// Append a closed trade and apply its P/L.
    pub fn record_trade(&mut self, trade: Trade) {
        self.capital += trade.pnl;
        self.trades.push(trade);
    }

    pub fn trade_count(&self) -> usize {
        self.trades.len()
    }

    pub fn total_pnl(&self) -> f64 {
        self.capital - self.initial_capital
    }

    /// Cumulative P/L in the order trades were closed.
    pub fn equity_curve(&self) -> Vec<EquityPoint> {
        let mut cumulative = 0.0;
        self.trades
            .iter()
            .map(|t| {
                cumulative += t.pnl;
                EquityPoint {
                    date: t.exit_date,
                    cumulative_pnl: cumulative,
                    capital: self.initial_capital + cumulative,
                }
            })
            .collect()
    }
}
