//! Latest-bar screening across a watchlist.

use chrono::NaiveDate;
use tracing::{debug, warn};

use crate::domain::backtest::BacktestConfig;
use crate::domain::instrument::{InstrumentData, load_instrument};
use crate::domain::signal::Signal;
use crate::domain::sizing::{TradeParameters, compute_parameters};
use crate::domain::strategy::{EntryRule, Strategy};
use crate::domain::universe::SkippedSymbol;
use crate::ports::data_port::DataPort;

#[derive(Debug, Clone, PartialEq)]
pub struct ScanCandidate {
    pub symbol: String,
    pub date: NaiveDate,
    pub close: f64,
    pub signal: Signal,
    /// `None` when the stop is undefined or the risk geometry is unusable.
    pub parameters: Option<TradeParameters>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ScanResult {
    pub candidates: Vec<ScanCandidate>,
    pub skipped: Vec<SkippedSymbol>,
}

impl ScanResult {
    pub fn breakouts(&self) -> impl Iterator<Item = &ScanCandidate> {
        self.candidates.iter().filter(|c| c.signal.breakout)
    }

    /// Symbols of candidates that actually broke out, in scan order.
    pub fn breakout_symbols(&self) -> Vec<String> {
        self.breakouts().map(|c| c.symbol.clone()).collect()
    }
}

/// Evaluate the most recent bar of one prepared instrument.
///
/// Returns a candidate when it shows a breakout or is approaching one.
pub fn evaluate_latest(
    data: &InstrumentData,
    strategy: &Strategy,
    risk_fraction: f64,
    capital: f64,
) -> Option<ScanCandidate> {
    let last = data.series.len().checked_sub(1)?;
    let signal = *data.signals.get(last)?;
    if !(signal.breakout || signal.pre_breakout) {
        return None;
    }
    let bar = &data.series.bars()[last];

    let entry_price = match strategy.entry {
        EntryRule::BreakoutClose => Some(bar.close),
        EntryRule::StaticLevel { ratio } => data
            .indicators
            .channel_high
            .get(last)
            .copied()
            .flatten()
            .map(|high| high * ratio),
    };
    let parameters = entry_price.and_then(|entry| {
        let stop = strategy.stop.stop_loss(entry, &data.indicators, last)?;
        match compute_parameters(entry, stop, risk_fraction, capital, strategy.sizing) {
            Ok(params) => Some(params),
            Err(e) => {
                debug!(symbol = data.symbol(), error = %e, "no trade parameters for candidate");
                None
            }
        }
    });

    Some(ScanCandidate {
        symbol: data.symbol().to_string(),
        date: bar.date,
        close: bar.close,
        signal,
        parameters,
    })
}

/// Screen every symbol in order.
///
/// Per-instrument failures are skipped with a diagnostic, never raised.
pub fn run_scan(
    data_port: &dyn DataPort,
    symbols: &[String],
    strategy: &Strategy,
    config: &BacktestConfig,
) -> ScanResult {
    let mut result = ScanResult::default();

    for symbol in symbols {
        match load_instrument(data_port, symbol, strategy, config.start_date, config.end_date) {
            Ok(data) => {
                if let Some(candidate) =
                    evaluate_latest(&data, strategy, config.risk_fraction, config.initial_capital)
                {
                    result.candidates.push(candidate);
                }
            }
            Err(e) => {
                warn!(symbol = %symbol, error = %e, "skipping instrument");
                if let Some(skip) = SkippedSymbol::from_error(symbol, &e) {
                    result.skipped.push(skip);
                }
            }
        }
    }

    result
}
