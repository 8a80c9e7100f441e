//! Per-instrument bundle: bars plus the indicator and signal columns derived from them.

use chrono::NaiveDate;
use tracing::debug;

use crate::domain::error::ScannerError;
use crate::domain::indicator::{IndicatorSet, compute_indicators};
use crate::domain::ohlcv::BarSeries;
use crate::domain::signal::{Signal, detect_signals};
use crate::domain::strategy::Strategy;
use crate::ports::data_port::DataPort;

/// Everything derived for one instrument. Instruments never share state.
#[derive(Debug, Clone, PartialEq)]
pub struct InstrumentData {
    pub series: BarSeries,
    pub indicators: IndicatorSet,
    pub signals: Vec<Signal>,
}

impl InstrumentData {
    /// Derive indicators and signals, refusing series that are too short.
    pub fn build(series: BarSeries, strategy: &Strategy) -> Result<Self, ScannerError> {
        let minimum = strategy.required_history();
        if series.len() < minimum {
            return Err(ScannerError::InsufficientHistory {
                symbol: series.symbol().to_string(),
                bars: series.len(),
                minimum,
            });
        }

        let indicators = compute_indicators(&series, &strategy.windows);
        let detector = strategy.detector();
        let signals = detect_signals(detector.as_ref(), &series, &indicators);
        debug!(
            symbol = series.symbol(),
            bars = series.len(),
            detector = detector.name(),
            breakouts = signals.iter().filter(|s| s.breakout).count(),
            "computed signals"
        );

        Ok(Self {
            series,
            indicators,
            signals,
        })
    }

    pub fn symbol(&self) -> &str {
        self.series.symbol()
    }

    pub fn latest_signal(&self) -> Option<&Signal> {
        self.signals.last()
    }
}

/// Fetch and prepare one instrument.
///
/// Any provider failure, empty result or malformed series comes back as
/// `DataUnavailable`; short series as `InsufficientHistory`.
pub fn load_instrument(
    data_port: &dyn DataPort,
    symbol: &str,
    strategy: &Strategy,
    start_date: NaiveDate,
    end_date: NaiveDate,
) -> Result<InstrumentData, ScannerError> {
    let bars = data_port
        .fetch_daily_bars(symbol, start_date, end_date)
        .map_err(|e| match e {
            ScannerError::DataUnavailable { .. } => e,
            other => ScannerError::DataUnavailable {
                symbol: symbol.to_string(),
                reason: other.to_string(),
            },
        })?;
    let series = BarSeries::new(symbol, bars)?;
    InstrumentData::build(series, strategy)
}
