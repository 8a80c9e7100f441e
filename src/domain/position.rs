//! Open positions and closed trade records.

use chrono::NaiveDate;
use std::fmt;

/// A long position waiting on its exit race.
#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub symbol: String,
    pub quantity: f64,
    pub entry_price: f64,
    pub entry_date: NaiveDate,
    pub entry_index: usize,
    pub stop_loss: f64,
    pub target_price: f64,
}

impl Position {
    pub fn should_stop_loss(&self, low: f64) -> bool {
        low <= self.stop_loss
    }

    pub fn should_take_profit(&self, high: f64) -> bool {
        high >= self.target_price
    }

    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        self.quantity * (price - self.entry_price)
    }

    /// Close the position, producing an immutable trade record.
    pub fn close(self, exit_date: NaiveDate, exit_price: f64, reason: ExitReason) -> Trade {
        Trade {
            pnl: self.unrealized_pnl(exit_price),
            symbol: self.symbol,
            entry_date: self.entry_date,
            entry_price: self.entry_price,
            stop_loss: self.stop_loss,
            target_price: self.target_price,
            quantity: self.quantity,
            exit_date,
            exit_price,
            exit_reason: reason,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    StopLoss,
    Target,
    Horizon,
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitReason::StopLoss => write!(f, "stop_loss"),
            ExitReason::Target => write!(f, "target"),
            ExitReason::Horizon => write!(f, "horizon"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Trade {
    pub symbol: String,
    pub entry_date: NaiveDate,
    pub entry_price: f64,
    pub stop_loss: f64,
    pub target_price: f64,
    pub quantity: f64,
    pub exit_date: NaiveDate,
    pub exit_price: f64,
    pub exit_reason: ExitReason,
    pub pnl: f64,
}

impl Trade {
    pub fn holding_days(&self) -> i64 {
        (self.exit_date - self.entry_date).num_days()
    }
}
