//! Daily OHLCV bars and per-instrument bar series.

use chrono::NaiveDate;

use crate::domain::error::ScannerError;

#[derive(Debug, Clone, PartialEq)]
pub struct OhlcvBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

impl OhlcvBar {
    /// high - low
    pub fn range(&self) -> f64 {
        self.high - self.low
    }

    /// Prices are positive and open/close sit inside [low, high].
    pub fn is_consistent(&self) -> bool {
        let finite = [self.open, self.high, self.low, self.close]
            .iter()
            .all(|p| p.is_finite() && *p > 0.0);
        finite
            && self.low <= self.high
            && (self.low..=self.high).contains(&self.open)
            && (self.low..=self.high).contains(&self.close)
    }
}

/// Bars for one instrument, strictly increasing by date.
///
/// Immutable once built; derived indicator columns live in separate
/// parallel vectors (see [`crate::domain::indicator::IndicatorSet`]).
#[derive(Debug, Clone, PartialEq)]
pub struct BarSeries {
    symbol: String,
    bars: Vec<OhlcvBar>,
}

impl BarSeries {
    pub fn new(symbol: impl Into<String>, bars: Vec<OhlcvBar>) -> Result<Self, ScannerError> {
        let symbol = symbol.into();
        if bars.is_empty() {
            return Err(ScannerError::DataUnavailable {
                symbol,
                reason: "no bars returned".into(),
            });
        }
        if let Some(bad) = bars.iter().find(|b| !b.is_consistent()) {
            return Err(ScannerError::DataUnavailable {
                reason: format!("inconsistent prices on {}", bad.date),
                symbol,
            });
        }
        if let Some(pair) = bars.windows(2).find(|w| w[1].date <= w[0].date) {
            return Err(ScannerError::DataUnavailable {
                reason: format!(
                    "dates not strictly increasing ({} then {})",
                    pair[0].date, pair[1].date
                ),
                symbol,
            });
        }
        Ok(Self { symbol, bars })
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn bars(&self) -> &[OhlcvBar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn last(&self) -> Option<&OhlcvBar> {
        self.bars.last()
    }

    pub fn date_range(&self) -> Option<(NaiveDate, NaiveDate)> {
        Some((self.bars.first()?.date, self.bars.last()?.date))
    }
}
