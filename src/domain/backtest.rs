//! Backtest simulator.
//!
//! Each instrument is walked bar by bar through three states:
//! - `Scanning`: look for an entry on the current bar
//! - `TradeOpen`: race stop against target on the next bar, else exit at the horizon close
//! - `TradeClosed`: book P/L into the shared account, then resume scanning at the exit bar
//!
//! Only one trade per instrument is open at a time. Instruments run in list
//! order and the account is the only state they share; when trades from
//! different instruments close on the same date they are booked in
//! processing order, not date order.

use chrono::NaiveDate;
use tracing::{debug, info, warn};

use crate::domain::account::AccountState;
use crate::domain::error::ScannerError;
use crate::domain::instrument::{InstrumentData, load_instrument};
use crate::domain::ohlcv::OhlcvBar;
use crate::domain::position::{ExitReason, Position, Trade};
use crate::domain::sizing::compute_parameters;
use crate::domain::strategy::{EntryRule, Strategy};
use crate::domain::universe::SkippedSymbol;
use crate::ports::data_port::DataPort;

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestConfig {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub initial_capital: f64,
    /// Fraction of running capital risked per trade, in (0, 1).
    pub risk_fraction: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestResult {
    pub account: AccountState,
    pub symbols_tested: Vec<String>,
    pub skipped: Vec<SkippedSymbol>,
    /// Candidate entries dropped for bad risk geometry or zero size.
    pub rejected_entries: usize,
}

impl BacktestResult {
    pub fn trades(&self) -> &[Trade] {
        &self.account.trades
    }

    pub fn final_capital(&self) -> f64 {
        self.account.capital
    }
}

/// Counts from simulating a single instrument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InstrumentOutcome {
    pub trades: usize,
    pub rejected_entries: usize,
}

enum InstrumentState {
    Scanning,
    TradeOpen(Position),
    TradeClosed(Trade),
}

/// Run the state machine over one prepared instrument.
///
/// The account is touched only when a trade closes, so re-running on the
/// same data from the same account state gives the same trades.
pub fn simulate_instrument(
    data: &InstrumentData,
    strategy: &Strategy,
    risk_fraction: f64,
    account: &mut AccountState,
) -> InstrumentOutcome {
    let bars = data.series.bars();
    let horizon = strategy.exit_horizon.max(1);
    let static_level = static_entry_level(data, strategy);
    let mut outcome = InstrumentOutcome::default();
    let mut state = InstrumentState::Scanning;
    let mut i = 0;

    loop {
        state = match state {
            InstrumentState::Scanning => {
                // A trade opened here could not be resolved inside the series.
                if i + horizon >= bars.len() {
                    break;
                }
                match open_position(data, strategy, static_level, i, risk_fraction, account.capital) {
                    Ok(Some(position)) => InstrumentState::TradeOpen(position),
                    Ok(None) => {
                        i += 1;
                        InstrumentState::Scanning
                    }
                    Err(e) => {
                        warn!(
                            symbol = data.symbol(),
                            date = %bars[i].date,
                            error = %e,
                            "rejected candidate trade"
                        );
                        outcome.rejected_entries += 1;
                        i += 1;
                        InstrumentState::Scanning
                    }
                }
            }
            InstrumentState::TradeOpen(position) => {
                let (exit_index, exit_price, reason) = resolve_exit(&position, bars, horizon);
                i = exit_index;
                InstrumentState::TradeClosed(position.close(bars[exit_index].date, exit_price, reason))
            }
            InstrumentState::TradeClosed(trade) => {
                debug!(
                    symbol = %trade.symbol,
                    entry = %trade.entry_date,
                    exit = %trade.exit_date,
                    reason = %trade.exit_reason,
                    pnl = trade.pnl,
                    "trade closed"
                );
                account.record_trade(trade);
                outcome.trades += 1;
                InstrumentState::Scanning
            }
        };
    }

    outcome
}

/// Single-bar exit race for an open position.
///
/// The bar after entry is checked for the stop first, then the target, so a
/// bar touching both exits at the stop. Otherwise the trade exits at the
/// close `horizon` bars after entry. Caller guarantees those bars exist.
pub fn resolve_exit(position: &Position, bars: &[OhlcvBar], horizon: usize) -> (usize, f64, ExitReason) {
    let next_index = position.entry_index + 1;
    let next = &bars[next_index];
    if position.should_stop_loss(next.low) {
        (next_index, position.stop_loss, ExitReason::StopLoss)
    } else if position.should_take_profit(next.high) {
        (next_index, position.target_price, ExitReason::Target)
    } else {
        let exit_index = position.entry_index + horizon.max(1);
        (exit_index, bars[exit_index].close, ExitReason::Horizon)
    }
}

/// Level and reference bar for [`EntryRule::StaticLevel`], set once from the latest bar.
fn static_entry_level(data: &InstrumentData, strategy: &Strategy) -> Option<(f64, usize)> {
    match strategy.entry {
        EntryRule::BreakoutClose => None,
        EntryRule::StaticLevel { ratio } => {
            let last = data.series.len().checked_sub(1)?;
            let channel_high = data.indicators.channel_high.get(last).copied().flatten()?;
            Some((channel_high * ratio, last))
        }
    }
}

/// Try to open a position on bar `i`.
///
/// `Ok(None)` when nothing fires; `Err` when the entry fires but its stop
/// geometry or size is unusable.
fn open_position(
    data: &InstrumentData,
    strategy: &Strategy,
    static_level: Option<(f64, usize)>,
    i: usize,
    risk_fraction: f64,
    capital: f64,
) -> Result<Option<Position>, ScannerError> {
    let bar = &data.series.bars()[i];

    let (entry_price, reference) = match strategy.entry {
        EntryRule::BreakoutClose => {
            if !data.signals.get(i).is_some_and(|s| s.breakout) {
                return Ok(None);
            }
            debug_assert!(
                data.indicators.is_complete(i),
                "breakout signalled on a warming-up bar"
            );
            (bar.close, i)
        }
        // The level ignores signals, so warm-up bars are filtered here.
        EntryRule::StaticLevel { .. } if !data.indicators.is_complete(i) => return Ok(None),
        EntryRule::StaticLevel { .. } => match static_level {
            Some((level, reference)) if bar.high >= level => (level, reference),
            _ => return Ok(None),
        },
    };

    let Some(stop_loss) = strategy.stop.stop_loss(entry_price, &data.indicators, reference) else {
        return Ok(None);
    };
    let params = compute_parameters(entry_price, stop_loss, risk_fraction, capital, strategy.sizing)?;

    Ok(Some(Position {
        symbol: data.symbol().to_string(),
        quantity: params.position_size,
        entry_price,
        entry_date: bar.date,
        entry_index: i,
        stop_loss: params.stop_loss,
        target_price: params.target_price,
    }))
}

/// Backtest every symbol in order against one shared account.
///
/// Symbols whose data cannot be fetched or is too short are skipped and
/// reported in [`BacktestResult::skipped`].
pub fn run_backtest(
    data_port: &dyn DataPort,
    symbols: &[String],
    strategy: &Strategy,
    config: &BacktestConfig,
) -> BacktestResult {
    let mut account = AccountState::new(config.initial_capital);
    let mut symbols_tested = Vec::with_capacity(symbols.len());
    let mut skipped = Vec::new();
    let mut rejected_entries = 0;

    for symbol in symbols {
        let data = match load_instrument(data_port, symbol, strategy, config.start_date, config.end_date) {
            Ok(data) => data,
            Err(e) => {
                warn!(symbol = %symbol, error = %e, "skipping instrument");
                if let Some(skip) = SkippedSymbol::from_error(symbol, &e) {
                    skipped.push(skip);
                }
                continue;
            }
        };

        let outcome = simulate_instrument(&data, strategy, config.risk_fraction, &mut account);
        info!(
            symbol = %symbol,
            trades = outcome.trades,
            rejected = outcome.rejected_entries,
            capital = account.capital,
            "backtested instrument"
        );
        rejected_entries += outcome.rejected_entries;
        symbols_tested.push(symbol.clone());
    }

    BacktestResult {
        account,
        symbols_tested,
        skipped,
        rejected_entries,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ohlcv::BarSeries;
    use crate::domain::strategy::Pattern;
    use approx::assert_relative_eq;
    use chrono::Duration;

    fn sample_config() -> BacktestConfig {
        BacktestConfig {
            start_date: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2024, 12, 31).unwrap(),
            initial_capital: 100_000.0,
            risk_fraction: 0.02,
        }
    }

    fn bar(i: usize, low: f64, high: f64, close: f64) -> OhlcvBar {
        OhlcvBar {
            date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + Duration::days(i as i64),
            open: close,
            high,
            low,
            close,
            volume: 1_000,
        }
    }

    fn position(entry_index: usize) -> Position {
        Position {
            symbol: "TEST".into(),
            quantity: 10.0,
            entry_price: 100.0,
            entry_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            entry_index,
            stop_loss: 95.0,
            target_price: 110.0,
        }
    }

    /// Flat 99-101 bars, wide bars at 27-29 so volatility shrinks into a
    /// breakout bar at 49, then flat again.
    fn breakout_bars(next_after_breakout: (f64, f64, f64)) -> Vec<OhlcvBar> {
        (0..60)
            .map(|i| match i {
                27..=29 => bar(i, 80.0, 120.0, 100.0),
                49 => bar(i, 100.0, 130.0, 125.0),
                50 => bar(i, next_after_breakout.0, next_after_breakout.1, next_after_breakout.2),
                _ => bar(i, 99.0, 101.0, 100.0),
            })
            .collect()
    }

    fn prepared(bars: Vec<OhlcvBar>, strategy: &Strategy) -> InstrumentData {
        InstrumentData::build(BarSeries::new("TEST", bars).unwrap(), strategy).unwrap()
    }

    struct SinglePort(Vec<OhlcvBar>);

    impl DataPort for SinglePort {
        fn fetch_daily_bars(
            &self,
            _symbol: &str,
            _start: NaiveDate,
            _end: NaiveDate,
        ) -> Result<Vec<OhlcvBar>, ScannerError> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn run_result_exposes_trades_and_final_capital() {
        let strategy = Strategy::preset(Pattern::ContractionBreakout);
        let port = SinglePort(breakout_bars((124.0, 135.0, 133.0)));
        let symbols = vec!["TEST".to_string()];

        let result = run_backtest(&port, &symbols, &strategy, &sample_config());

        assert_eq!(result.trades().len(), 1);
        assert_eq!(result.trades()[0].exit_reason, ExitReason::Target);
        // 2% of 100000 risked at 2:1
        assert_relative_eq!(result.final_capital(), 104_000.0, epsilon = 1e-6);
        assert_relative_eq!(result.final_capital(), result.account.capital);
        assert_eq!(result.rejected_entries, 0);
    }

    #[test]
    fn warm_up_breakout_is_neither_signalled_nor_traded() {
        let strategy = Strategy::preset(Pattern::ContractionBreakout);
        // Contraction into a breakout at bar 30, before avg_volume is defined.
        let bars: Vec<OhlcvBar> = (0..100)
            .map(|i| match i {
                8..=10 => bar(i, 80.0, 120.0, 100.0),
                30 => bar(i, 100.0, 130.0, 125.0),
                _ => bar(i, 99.0, 101.0, 100.0),
            })
            .collect();
        let data = prepared(bars, &strategy);
        assert!(!data.indicators.is_complete(30));
        assert!(!data.signals[30].breakout);

        let breakouts: Vec<usize> = (0..data.signals.len()).filter(|&i| data.signals[i].breakout).collect();
        assert!(breakouts.iter().all(|&i| data.indicators.is_complete(i)));

        let mut account = AccountState::new(100_000.0);
        let outcome = simulate_instrument(&data, &strategy, 0.01, &mut account);
        // every signalled breakout with a bar after it becomes a trade
        let tradable = breakouts.iter().filter(|&&i| i + 1 < data.series.len()).count();
        assert_eq!(outcome.trades + outcome.rejected_entries, tradable);
        assert!(account.trades.iter().all(|t| t.entry_date != data.series.bars()[30].date));
    }

    #[test]
    fn exit_race_stop_wins_tie() {
        let bars = vec![bar(0, 99.0, 101.0, 100.0), bar(1, 90.0, 115.0, 100.0)];
        let (index, price, reason) = resolve_exit(&position(0), &bars, 1);
        assert_eq!(index, 1);
        assert_eq!(reason, ExitReason::StopLoss);
        assert_relative_eq!(price, 95.0);
    }

    #[test]
    fn exit_race_target_hit() {
        let bars = vec![bar(0, 99.0, 101.0, 100.0), bar(1, 99.0, 112.0, 108.0)];
        let (index, price, reason) = resolve_exit(&position(0), &bars, 1);
        assert_eq!(index, 1);
        assert_eq!(reason, ExitReason::Target);
        assert_relative_eq!(price, 110.0);
    }

    #[test]
    fn exit_falls_back_to_horizon_close() {
        let bars = vec![
            bar(0, 99.0, 101.0, 100.0),
            bar(1, 99.0, 101.0, 100.0),
            bar(2, 90.0, 101.0, 96.0),
            bar(3, 99.0, 104.0, 103.0),
        ];
        let (index, price, reason) = resolve_exit(&position(0), &bars, 3);
        // only the bar after entry races; bar 2 dipping below the stop does not count
        assert_eq!(index, 3);
        assert_eq!(reason, ExitReason::Horizon);
        assert_relative_eq!(price, 103.0);
    }

    #[test]
    fn breakout_scenario_opens_exactly_one_trade() {
        let strategy = Strategy::preset(Pattern::ContractionBreakout);
        let data = prepared(breakout_bars((99.0, 101.0, 100.0)), &strategy);
        assert!(data.signals[49].breakout);

        let mut account = AccountState::new(100_000.0);
        let outcome = simulate_instrument(&data, &strategy, 0.01, &mut account);

        assert_eq!(outcome.trades, 1);
        let trade = &account.trades[0];
        assert_eq!(trade.entry_date, data.series.bars()[49].date);
        assert_relative_eq!(trade.entry_price, 125.0);
        // volatility at 49 = (19 * 2 + 30) / 20 = 3.4
        assert_relative_eq!(trade.stop_loss, 125.0 - 3.4, epsilon = 1e-9);
        assert_relative_eq!(trade.target_price, 125.0 + 6.8, epsilon = 1e-9);
        assert_relative_eq!(trade.quantity, 1_000.0 / 3.4, epsilon = 1e-9);
        assert_eq!(trade.exit_reason, ExitReason::StopLoss);
        assert_eq!(trade.exit_date, data.series.bars()[50].date);
        assert_relative_eq!(account.capital, 100_000.0 - 1_000.0, epsilon = 1e-6);
    }

    #[test]
    fn breakout_scenario_exits_at_horizon_close() {
        let strategy = Strategy::preset(Pattern::ContractionBreakout);
        let data = prepared(breakout_bars((124.0, 127.0, 126.0)), &strategy);

        let mut account = AccountState::new(100_000.0);
        simulate_instrument(&data, &strategy, 0.01, &mut account);

        assert_eq!(account.trade_count(), 1);
        let trade = &account.trades[0];
        assert_eq!(trade.exit_reason, ExitReason::Horizon);
        assert_relative_eq!(trade.exit_price, 126.0);
        assert!(trade.pnl > 0.0);
    }

    #[test]
    fn breakout_scenario_hits_target() {
        let strategy = Strategy::preset(Pattern::ContractionBreakout);
        let data = prepared(breakout_bars((124.0, 135.0, 133.0)), &strategy);

        let mut account = AccountState::new(100_000.0);
        simulate_instrument(&data, &strategy, 0.01, &mut account);

        let trade = &account.trades[0];
        assert_eq!(trade.exit_reason, ExitReason::Target);
        // reward is twice the risked amount
        assert_relative_eq!(trade.pnl, 2_000.0, epsilon = 1e-6);
    }

    #[test]
    fn breakout_on_last_bar_is_not_opened() {
        let strategy = Strategy::preset(Pattern::ContractionBreakout);
        let bars: Vec<OhlcvBar> = breakout_bars((99.0, 101.0, 100.0)).into_iter().take(50).collect();
        let data = prepared(bars, &strategy);
        assert!(data.signals[49].breakout);

        let mut account = AccountState::new(100_000.0);
        let outcome = simulate_instrument(&data, &strategy, 0.01, &mut account);
        assert_eq!(outcome.trades, 0);
        assert!((account.capital - 100_000.0).abs() < f64::EPSILON);
    }

    #[test]
    fn simulation_is_idempotent() {
        let strategy = Strategy::preset(Pattern::ContractionBreakout);
        let data = prepared(breakout_bars((124.0, 127.0, 126.0)), &strategy);

        let mut first = AccountState::new(50_000.0);
        let mut second = AccountState::new(50_000.0);
        simulate_instrument(&data, &strategy, 0.01, &mut first);
        simulate_instrument(&data, &strategy, 0.01, &mut second);
        assert_eq!(first, second);
    }

    #[test]
    fn static_level_trades_sequentially() {
        let strategy = Strategy::preset(Pattern::LowVolatilitySqueeze);
        // Rising channel: every bar's high eventually clears 98% of the final 20-bar high.
        let bars: Vec<OhlcvBar> = (0..70)
            .map(|i| {
                let mid = 100.0 + i as f64 * 0.2;
                bar(i, mid - 1.0, mid + 1.0, mid)
            })
            .collect();
        let data = prepared(bars, &strategy);

        let mut account = AccountState::new(100_000.0);
        let outcome = simulate_instrument(&data, &strategy, 0.02, &mut account);

        assert!(outcome.trades > 0);
        for pair in account.trades.windows(2) {
            // one open trade at a time: the next entry never precedes the previous exit
            assert!(pair[1].entry_date >= pair[0].exit_date);
        }
        for trade in &account.trades {
            assert!(trade.stop_loss < trade.entry_price);
            assert!(trade.entry_price < trade.target_price);
            assert!(trade.exit_date > trade.entry_date);
            assert_eq!(trade.quantity, trade.quantity.floor());
        }
    }

    #[test]
    fn static_level_with_stop_above_entry_is_rejected() {
        let strategy = Strategy::preset(Pattern::LowVolatilitySqueeze);
        // A tight range whose recent low sits above 98% of the channel high.
        let bars: Vec<OhlcvBar> = (0..60).map(|i| bar(i, 99.9, 100.0, 100.0)).collect();
        let data = prepared(bars, &strategy);

        let mut account = AccountState::new(100_000.0);
        let outcome = simulate_instrument(&data, &strategy, 0.02, &mut account);
        assert_eq!(outcome.trades, 0);
        assert!(outcome.rejected_entries > 0);
    }
}
