//! Risk-based position sizing and stop-loss placement.
//!
//! Fixed-fractional risk model with a 2:1 reward:risk target.

use std::fmt;

use crate::domain::error::ScannerError;
use crate::domain::indicator::IndicatorSet;

pub const REWARD_RISK_RATIO: f64 = 2.0;

/// How a raw position size is rounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizingMode {
    /// Fractional units are allowed.
    Fractional,
    /// Floor to whole units.
    WholeUnits,
}

impl SizingMode {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "fractional" => Some(SizingMode::Fractional),
            "whole" | "whole_units" => Some(SizingMode::WholeUnits),
            _ => None,
        }
    }
}

impl fmt::Display for SizingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SizingMode::Fractional => write!(f, "fractional"),
            SizingMode::WholeUnits => write!(f, "whole"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TradeParameters {
    pub entry_price: f64,
    pub stop_loss: f64,
    pub target_price: f64,
    pub position_size: f64,
    pub risk_amount: f64,
}

impl TradeParameters {
    pub fn risk_per_unit(&self) -> f64 {
        self.entry_price - self.stop_loss
    }
}

/// Size a long trade and place its target.
///
/// Steps:
/// 1. risk_amount = account_capital * risk_fraction
/// 2. Reject when entry <= stop (no positive risk per unit)
/// 3. position_size = risk_amount / (entry - stop), floored in whole-unit mode
/// 4. Reject a non-positive size
/// 5. target = entry + 2 * (entry - stop)
pub fn compute_parameters(
    entry_price: f64,
    stop_loss: f64,
    risk_fraction: f64,
    account_capital: f64,
    mode: SizingMode,
) -> Result<TradeParameters, ScannerError> {
    let risk_amount = account_capital * risk_fraction;
    let risk_per_unit = entry_price - stop_loss;

    if !(risk_per_unit > 0.0) || !risk_per_unit.is_finite() {
        return Err(ScannerError::InvalidRiskGeometry {
            entry: entry_price,
            stop: stop_loss,
        });
    }

    let raw_size = risk_amount / risk_per_unit;
    let position_size = match mode {
        SizingMode::Fractional => raw_size,
        SizingMode::WholeUnits => raw_size.floor(),
    };

    if !(position_size > 0.0) || !position_size.is_finite() {
        return Err(ScannerError::PositionTooSmall {
            risk_amount,
            risk_per_unit,
        });
    }

    Ok(TradeParameters {
        entry_price,
        stop_loss,
        target_price: entry_price + REWARD_RISK_RATIO * risk_per_unit,
        position_size,
        risk_amount,
    })
}

/// Where the protective stop is placed for a new trade.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StopPolicy {
    /// entry - volatility[i]
    Volatility,
    /// max(channel_low[i] - atr_multiple * atr_range[i], recent_low[i]):
    /// the looser of an ATR-buffered channel low and the recent swing low.
    ChannelAtr { atr_multiple: f64 },
}

impl StopPolicy {
    pub const DEFAULT_ATR_MULTIPLE: f64 = 1.5;

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "volatility" => Some(StopPolicy::Volatility),
            "channel_atr" => Some(StopPolicy::ChannelAtr {
                atr_multiple: Self::DEFAULT_ATR_MULTIPLE,
            }),
            _ => None,
        }
    }

    /// Stop price for an entry at `entry_price` using indicators at bar `i`.
    /// `None` while a column it reads is undefined.
    pub fn stop_loss(&self, entry_price: f64, indicators: &IndicatorSet, i: usize) -> Option<f64> {
        let at = |col: &[Option<f64>]| col.get(i).copied().flatten();
        match self {
            StopPolicy::Volatility => Some(entry_price - at(&indicators.volatility)?),
            StopPolicy::ChannelAtr { atr_multiple } => {
                let buffered = at(&indicators.channel_low)? - atr_multiple * at(&indicators.atr_range)?;
                Some(buffered.max(at(&indicators.recent_low)?))
            }
        }
    }
}

impl fmt::Display for StopPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopPolicy::Volatility => write!(f, "volatility"),
            StopPolicy::ChannelAtr { atr_multiple } => write!(f, "channel_atr({})", atr_multiple),
        }
    }
}
