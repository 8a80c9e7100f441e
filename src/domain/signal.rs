//! Per-bar trade signals derived from the indicator columns.
//!
//! Two interchangeable detectors:
//! - [`ContractionBreakout`]: strictly shrinking volatility plus a close through resistance.
//! - [`LowVolatilitySqueeze`]: channel width and ATR range in their bottom percentile,
//!   confirmed by a volume surge.
//!
//! Signals at bar i read indicator values at indices <= i only, so they never repaint.
//! Bars where any indicator column is still warming up always get the default signal.

use crate::domain::indicator::IndicatorSet;
use crate::domain::indicator::percentile::expanding_percentile;
use crate::domain::ohlcv::BarSeries;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Signal {
    pub contraction: bool,
    pub pre_breakout: bool,
    pub breakout: bool,
}

pub trait SignalDetector {
    fn name(&self) -> &'static str;

    /// One signal per bar, parallel to `series`.
    fn detect(&self, series: &BarSeries, indicators: &IndicatorSet) -> Vec<Signal>;
}

/// vol[i] < vol[i-1] < vol[i-2]; false while any of the three is undefined.
pub fn is_contracting(volatility: &[Option<f64>], i: usize) -> bool {
    if i < 2 {
        return false;
    }
    let at = |j: usize| volatility.get(j).copied().flatten();
    match (at(i), at(i - 1), at(i - 2)) {
        (Some(v0), Some(v1), Some(v2)) => v0 < v1 && v1 < v2,
        _ => false,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ContractionBreakout {
    /// Fraction of resistance a close must reach to count as approaching it.
    pub approach_ratio: f64,
}

impl Default for ContractionBreakout {
    fn default() -> Self {
        ContractionBreakout {
            approach_ratio: 0.98,
        }
    }
}

impl SignalDetector for ContractionBreakout {
    fn name(&self) -> &'static str {
        "contraction_breakout"
    }

    fn detect(&self, series: &BarSeries, indicators: &IndicatorSet) -> Vec<Signal> {
        series
            .bars()
            .iter()
            .enumerate()
            .map(|(i, bar)| {
                if !indicators.is_complete(i) {
                    return Signal::default();
                }
                let contraction = is_contracting(&indicators.volatility, i);
                // The resistance a bar must clear is the level set by the bars before it.
                let resistance = i
                    .checked_sub(1)
                    .and_then(|prev| indicators.resistance.get(prev).copied().flatten());
                match resistance {
                    Some(level) if contraction => Signal {
                        contraction,
                        pre_breakout: bar.close >= self.approach_ratio * level
                            && bar.close < level,
                        breakout: bar.close > level,
                    },
                    _ => Signal {
                        contraction,
                        ..Signal::default()
                    },
                }
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LowVolatilitySqueeze {
    /// Percentile (0-100) both volatility measures must fall below.
    pub percentile: f64,
    /// Volume must exceed this multiple of the average volume.
    pub volume_multiple: f64,
}

impl Default for LowVolatilitySqueeze {
    fn default() -> Self {
        LowVolatilitySqueeze {
            percentile: 10.0,
            volume_multiple: 1.5,
        }
    }
}

impl SignalDetector for LowVolatilitySqueeze {
    fn name(&self) -> &'static str {
        "low_volatility_squeeze"
    }

    fn detect(&self, series: &BarSeries, indicators: &IndicatorSet) -> Vec<Signal> {
        let bbw_threshold = expanding_percentile(&indicators.bbw, self.percentile);
        let atr_threshold = expanding_percentile(&indicators.atr_range, self.percentile);

        series
            .bars()
            .iter()
            .enumerate()
            .map(|(i, bar)| {
                if !indicators.is_complete(i) {
                    return Signal::default();
                }
                let at = |col: &[Option<f64>]| col.get(i).copied().flatten();
                let squeeze = matches!(
                    (at(&indicators.bbw), at(&bbw_threshold)),
                    (Some(bbw), Some(limit)) if bbw < limit
                ) && matches!(
                    (at(&indicators.atr_range), at(&atr_threshold)),
                    (Some(atr), Some(limit)) if atr < limit
                );
                if !squeeze {
                    return Signal::default();
                }
                let surge = at(&indicators.avg_volume)
                    .is_some_and(|avg| bar.volume as f64 > self.volume_multiple * avg);
                Signal {
                    contraction: true,
                    pre_breakout: !surge,
                    breakout: surge,
                }
            })
            .collect()
    }
}

/// Run a detector over a series.
pub fn detect_signals(
    detector: &dyn SignalDetector,
    series: &BarSeries,
    indicators: &IndicatorSet,
) -> Vec<Signal> {
    detector.detect(series, indicators)
}
