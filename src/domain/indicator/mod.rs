//! Indicator engine.
//!
//! Computes the trailing-window columns the signal detectors read:
//! - `range`: high - low per bar
//! - `volatility`: rolling mean of range, or rolling channel width (see [`VolatilityMethod`])
//! - `resistance`: max high over the resistance window
//! - `avg_volume`: mean volume over the volume window
//! - `channel_high` / `channel_low` / `bbw`: 20-bar channel and its width relative to close
//! - `atr_range`: 14-bar channel width used as an ATR proxy
//! - `recent_low`: min low over the short stop window
//!
//! Columns are parallel to the bar series and never mutate it.

pub mod percentile;
pub mod rolling;

use std::fmt;

use crate::domain::ohlcv::BarSeries;
use rolling::{rolling_max, rolling_mean, rolling_min};

/// How the `volatility` column is measured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VolatilityMethod {
    /// mean(high - low) over the window
    RangeMean,
    /// max(high) - min(low) over the window
    Channel,
}

impl VolatilityMethod {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "range_mean" | "range" => Some(VolatilityMethod::RangeMean),
            "channel" => Some(VolatilityMethod::Channel),
            _ => None,
        }
    }
}

impl fmt::Display for VolatilityMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VolatilityMethod::RangeMean => write!(f, "range_mean"),
            VolatilityMethod::Channel => write!(f, "channel"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndicatorWindows {
    pub volatility_method: VolatilityMethod,
    pub volatility: usize,
    pub resistance: usize,
    pub avg_volume: usize,
    pub channel: usize,
    pub atr_range: usize,
    pub recent_low: usize,
}

impl Default for IndicatorWindows {
    fn default() -> Self {
        IndicatorWindows {
            volatility_method: VolatilityMethod::RangeMean,
            volatility: 20,
            resistance: 5,
            avg_volume: 50,
            channel: 20,
            atr_range: 14,
            recent_low: 5,
        }
    }
}

impl IndicatorWindows {
    /// Bars needed before every column has a value.
    pub fn largest(&self) -> usize {
        [
            self.volatility,
            self.resistance,
            self.avg_volume,
            self.channel,
            self.atr_range,
            self.recent_low,
        ]
        .into_iter()
        .max()
        .unwrap_or(0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorSet {
    pub range: Vec<f64>,
    pub volatility: Vec<Option<f64>>,
    pub resistance: Vec<Option<f64>>,
    pub avg_volume: Vec<Option<f64>>,
    pub channel_high: Vec<Option<f64>>,
    pub channel_low: Vec<Option<f64>>,
    pub bbw: Vec<Option<f64>>,
    pub atr_range: Vec<Option<f64>>,
    pub recent_low: Vec<Option<f64>>,
}

impl IndicatorSet {
    pub fn len(&self) -> usize {
        self.range.len()
    }

    pub fn is_empty(&self) -> bool {
        self.range.is_empty()
    }

    /// True when every rolling column has a value at `i`.
    pub fn is_complete(&self, i: usize) -> bool {
        [
            &self.volatility,
            &self.resistance,
            &self.avg_volume,
            &self.channel_high,
            &self.channel_low,
            &self.bbw,
            &self.atr_range,
            &self.recent_low,
        ]
        .iter()
        .all(|col| col.get(i).copied().flatten().is_some())
    }

    /// Index of the first bar with every column defined.
    pub fn first_complete(&self) -> Option<usize> {
        (0..self.len()).find(|&i| self.is_complete(i))
    }

    fn empty(n: usize) -> Self {
        IndicatorSet {
            range: vec![f64::NAN; n],
            volatility: vec![None; n],
            resistance: vec![None; n],
            avg_volume: vec![None; n],
            channel_high: vec![None; n],
            channel_low: vec![None; n],
            bbw: vec![None; n],
            atr_range: vec![None; n],
            recent_low: vec![None; n],
        }
    }
}

/// Compute every indicator column for a series.
///
/// A series shorter than [`IndicatorWindows::largest`] yields no values at all,
/// so nothing downstream can become signal-eligible.
pub fn compute_indicators(series: &BarSeries, windows: &IndicatorWindows) -> IndicatorSet {
    let bars = series.bars();
    let n = bars.len();
    if n < windows.largest() {
        let mut set = IndicatorSet::empty(n);
        set.range = bars.iter().map(|b| b.range()).collect();
        return set;
    }

    let highs: Vec<f64> = bars.iter().map(|b| b.high).collect();
    let lows: Vec<f64> = bars.iter().map(|b| b.low).collect();
    let range: Vec<f64> = bars.iter().map(|b| b.range()).collect();
    let volumes: Vec<f64> = bars.iter().map(|b| b.volume as f64).collect();

    let volatility = match windows.volatility_method {
        VolatilityMethod::RangeMean => rolling_mean(&range, windows.volatility),
        VolatilityMethod::Channel => channel_width(&highs, &lows, windows.volatility),
    };

    let channel_high = rolling_max(&highs, windows.channel);
    let channel_low = rolling_min(&lows, windows.channel);
    let bbw = channel_high
        .iter()
        .zip(&channel_low)
        .zip(bars)
        .map(|((hi, lo), bar)| match (hi, lo) {
            (Some(hi), Some(lo)) => Some((hi - lo) / bar.close),
            _ => None,
        })
        .collect();

    IndicatorSet {
        volatility,
        resistance: rolling_max(&highs, windows.resistance),
        avg_volume: rolling_mean(&volumes, windows.avg_volume),
        bbw,
        channel_high,
        channel_low,
        atr_range: channel_width(&highs, &lows, windows.atr_range),
        recent_low: rolling_min(&lows, windows.recent_low),
        range,
    }
}

/// max(high, n) - min(low, n)
fn channel_width(highs: &[f64], lows: &[f64], window: usize) -> Vec<Option<f64>> {
    rolling_max(highs, window)
        .into_iter()
        .zip(rolling_min(lows, window))
        .map(|(hi, lo)| Some(hi? - lo?))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ohlcv::OhlcvBar;
    use approx::assert_relative_eq;
    use chrono::{Duration, NaiveDate};

    fn make_series(ranges: &[(f64, f64)]) -> BarSeries {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let bars = ranges
            .iter()
            .enumerate()
            .map(|(i, &(low, high))| OhlcvBar {
                date: start + Duration::days(i as i64),
                open: (low + high) / 2.0,
                high,
                low,
                close: (low + high) / 2.0,
                volume: 1_000 + i as u64,
            })
            .collect();
        BarSeries::new("TEST", bars).unwrap()
    }

    fn small_windows(method: VolatilityMethod) -> IndicatorWindows {
        IndicatorWindows {
            volatility_method: method,
            volatility: 3,
            resistance: 2,
            avg_volume: 3,
            channel: 3,
            atr_range: 2,
            recent_low: 2,
        }
    }

    #[test]
    fn default_windows_largest_is_volume_window() {
        assert_eq!(IndicatorWindows::default().largest(), 50);
    }

    #[test]
    fn short_series_has_no_values() {
        let series = make_series(&[(99.0, 101.0); 10]);
        let set = compute_indicators(&series, &IndicatorWindows::default());
        assert_eq!(set.len(), 10);
        assert!(set.volatility.iter().all(Option::is_none));
        assert!(set.resistance.iter().all(Option::is_none));
        assert!(set.avg_volume.iter().all(Option::is_none));
        assert!(set.first_complete().is_none());
        assert_relative_eq!(set.range[0], 2.0);
    }

    #[test]
    fn range_mean_volatility() {
        let series = make_series(&[(99.0, 101.0), (98.0, 102.0), (97.0, 103.0), (99.0, 100.0)]);
        let set = compute_indicators(&series, &small_windows(VolatilityMethod::RangeMean));
        assert_eq!(set.volatility[1], None);
        // (2 + 4 + 6) / 3
        assert_relative_eq!(set.volatility[2].unwrap(), 4.0);
        // (4 + 6 + 1) / 3
        assert_relative_eq!(set.volatility[3].unwrap(), 11.0 / 3.0);
    }

    #[test]
    fn channel_volatility() {
        let series = make_series(&[(99.0, 101.0), (98.0, 102.0), (97.0, 103.0), (99.0, 100.0)]);
        let set = compute_indicators(&series, &small_windows(VolatilityMethod::Channel));
        // max high 103 - min low 97
        assert_relative_eq!(set.volatility[2].unwrap(), 6.0);
        assert_relative_eq!(set.volatility[3].unwrap(), 6.0);
    }

    #[test]
    fn resistance_and_channel_columns() {
        let series = make_series(&[(99.0, 101.0), (98.0, 102.0), (97.0, 103.0), (99.0, 100.0)]);
        let set = compute_indicators(&series, &small_windows(VolatilityMethod::RangeMean));
        assert_eq!(set.resistance[0], None);
        assert_eq!(set.resistance[1], Some(102.0));
        assert_eq!(set.resistance[3], Some(103.0));
        assert_eq!(set.recent_low[3], Some(97.0));
        assert_eq!(set.atr_range[3], Some(6.0));
        assert_eq!(set.channel_high[3], Some(103.0));
        assert_eq!(set.channel_low[3], Some(97.0));
        // (103 - 97) / 99.5
        assert_relative_eq!(set.bbw[3].unwrap(), 6.0 / 99.5);
    }

    #[test]
    fn average_volume_window() {
        let series = make_series(&[(99.0, 101.0); 4]);
        let set = compute_indicators(&series, &small_windows(VolatilityMethod::RangeMean));
        // volumes 1000, 1001, 1002
        assert_relative_eq!(set.avg_volume[2].unwrap(), 1001.0);
    }

    #[test]
    fn first_complete_is_largest_window_minus_one() {
        let series = make_series(&[(99.0, 101.0); 6]);
        let set = compute_indicators(&series, &small_windows(VolatilityMethod::RangeMean));
        assert_eq!(set.first_complete(), Some(2));
        assert!(!set.is_complete(1));
        assert!(set.is_complete(5));
        assert!(!set.is_complete(6));
    }

    #[test]
    fn volatility_method_parse() {
        assert_eq!(
            VolatilityMethod::parse("range_mean"),
            Some(VolatilityMethod::RangeMean)
        );
        assert_eq!(
            VolatilityMethod::parse(" Channel "),
            Some(VolatilityMethod::Channel)
        );
        assert_eq!(VolatilityMethod::parse("atr"), None);
        assert_eq!(VolatilityMethod::Channel.to_string(), "channel");
    }
}
