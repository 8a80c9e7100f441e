//! Pattern presets and the pluggable choices they bundle.
//!
//! A [`Strategy`] pairs a signal detector with an entry rule, a stop policy,
//! an exit horizon and a sizing mode. Presets reproduce the two trading
//! variants; each choice can be overridden from config.

use std::fmt;

use crate::domain::indicator::{IndicatorWindows, VolatilityMethod};
use crate::domain::signal::{ContractionBreakout, LowVolatilitySqueeze, SignalDetector};
use crate::domain::sizing::{SizingMode, StopPolicy};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pattern {
    ContractionBreakout,
    LowVolatilitySqueeze,
}

impl Pattern {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "contraction_breakout" | "rmv" => Some(Pattern::ContractionBreakout),
            "low_volatility_squeeze" | "squeeze" => Some(Pattern::LowVolatilitySqueeze),
            _ => None,
        }
    }

    pub fn detector(&self) -> Box<dyn SignalDetector> {
        match self {
            Pattern::ContractionBreakout => Box::new(ContractionBreakout::default()),
            Pattern::LowVolatilitySqueeze => Box::new(LowVolatilitySqueeze::default()),
        }
    }

    /// Fraction of capital risked per trade when config does not say.
    pub fn default_risk_fraction(&self) -> f64 {
        match self {
            Pattern::ContractionBreakout => 0.01,
            Pattern::LowVolatilitySqueeze => 0.02,
        }
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pattern::ContractionBreakout => write!(f, "contraction_breakout"),
            Pattern::LowVolatilitySqueeze => write!(f, "low_volatility_squeeze"),
        }
    }
}

/// What opens a trade during a backtest.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EntryRule {
    /// Enter at the close of a bar whose signal reports a breakout.
    BreakoutClose,
    /// Enter at a single level, `ratio` x the channel high of the latest bar,
    /// on any bar whose high reaches it.
    StaticLevel { ratio: f64 },
}

impl EntryRule {
    pub const DEFAULT_LEVEL_RATIO: f64 = 0.98;

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "breakout" | "breakout_close" => Some(EntryRule::BreakoutClose),
            "static_level" => Some(EntryRule::StaticLevel {
                ratio: Self::DEFAULT_LEVEL_RATIO,
            }),
            _ => None,
        }
    }
}

impl fmt::Display for EntryRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryRule::BreakoutClose => write!(f, "breakout"),
            EntryRule::StaticLevel { ratio } => write!(f, "static_level({})", ratio),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Strategy {
    pub pattern: Pattern,
    pub windows: IndicatorWindows,
    pub entry: EntryRule,
    pub stop: StopPolicy,
    /// Bars after entry at whose close an unresolved trade exits.
    pub exit_horizon: usize,
    pub sizing: SizingMode,
}

impl Strategy {
    pub fn preset(pattern: Pattern) -> Self {
        match pattern {
            Pattern::ContractionBreakout => Strategy {
                pattern,
                windows: IndicatorWindows::default(),
                entry: EntryRule::BreakoutClose,
                stop: StopPolicy::Volatility,
                exit_horizon: 1,
                sizing: SizingMode::Fractional,
            },
            Pattern::LowVolatilitySqueeze => Strategy {
                pattern,
                windows: IndicatorWindows {
                    volatility_method: VolatilityMethod::Channel,
                    volatility: 14,
                    ..IndicatorWindows::default()
                },
                entry: EntryRule::StaticLevel {
                    ratio: EntryRule::DEFAULT_LEVEL_RATIO,
                },
                stop: StopPolicy::ChannelAtr {
                    atr_multiple: StopPolicy::DEFAULT_ATR_MULTIPLE,
                },
                exit_horizon: 3,
                sizing: SizingMode::WholeUnits,
            },
        }
    }

    pub fn detector(&self) -> Box<dyn SignalDetector> {
        self.pattern.detector()
    }

    /// Bars an instrument needs before it can be screened or backtested.
    pub fn required_history(&self) -> usize {
        self.windows.largest()
    }
}
