//! Benchmark market regime: latest close against its 50-bar simple average.

use std::fmt;

use crate::domain::ohlcv::OhlcvBar;

pub const REGIME_WINDOW: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarketRegime {
    Bullish,
    Bearish,
    Unknown,
}

impl fmt::Display for MarketRegime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MarketRegime::Bullish => write!(f, "bullish"),
            MarketRegime::Bearish => write!(f, "bearish"),
            MarketRegime::Unknown => write!(f, "unknown"),
        }
    }
}

/// Bullish when the latest close is strictly above the trailing average.
pub fn classify(bars: &[OhlcvBar]) -> MarketRegime {
    if bars.len() < REGIME_WINDOW {
        return MarketRegime::Unknown;
    }
    let tail = &bars[bars.len() - REGIME_WINDOW..];
    let sma = tail.iter().map(|b| b.close).sum::<f64>() / REGIME_WINDOW as f64;
    match tail.last() {
        Some(last) if last.close > sma => MarketRegime::Bullish,
        Some(_) => MarketRegime::Bearish,
        None => MarketRegime::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    fn bars_from_closes(closes: &[f64]) -> Vec<OhlcvBar> {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        closes
            .iter()
            .enumerate()
            .map(|(i, &close)| OhlcvBar {
                date: start + Duration::days(i as i64),
                open: close,
                high: close + 1.0,
                low: close - 1.0,
                close,
                volume: 1_000,
            })
            .collect()
    }

    #[test]
    fn unknown_below_window() {
        let bars = bars_from_closes(&[100.0; 49]);
        assert_eq!(classify(&bars), MarketRegime::Unknown);
        assert_eq!(classify(&[]), MarketRegime::Unknown);
    }

    #[test]
    fn bullish_when_close_above_average() {
        let closes: Vec<f64> = (0..60).map(|i| 100.0 + i as f64).collect();
        assert_eq!(classify(&bars_from_closes(&closes)), MarketRegime::Bullish);
    }

    #[test]
    fn bearish_when_close_below_average() {
        let closes: Vec<f64> = (0..60).map(|i| 200.0 - i as f64).collect();
        assert_eq!(classify(&bars_from_closes(&closes)), MarketRegime::Bearish);
    }

    #[test]
    fn close_equal_to_average_is_bearish() {
        let bars = bars_from_closes(&[100.0; 50]);
        assert_eq!(classify(&bars), MarketRegime::Bearish);
    }

    #[test]
    fn only_trailing_window_counts() {
        // a crash long ago drops out of the window
        let mut closes = vec![10.0; 30];
        closes.extend((0..50).map(|i| 100.0 - i as f64 * 0.1));
        assert_eq!(classify(&bars_from_closes(&closes)), MarketRegime::Bearish);
    }
}
