#![allow(dead_code)]

use breakout_scanner::domain::backtest::BacktestConfig;
use breakout_scanner::domain::error::ScannerError;
pub use breakout_scanner::domain::ohlcv::OhlcvBar;
use breakout_scanner::ports::data_port::DataPort;
use chrono::NaiveDate;
use std::cell::RefCell;
use std::collections::HashMap;
use std::path::Path;

pub struct MockDataPort {
    pub data: HashMap<String, Vec<OhlcvBar>>,
    pub errors: HashMap<String, String>,
    pub calls: RefCell<Vec<String>>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
            calls: RefCell::new(Vec::new()),
        }
    }

    pub fn with_bars(mut self, symbol: &str, bars: Vec<OhlcvBar>) -> Self {
        self.data.insert(symbol.to_string(), bars);
        self
    }

    pub fn with_error(mut self, symbol: &str, reason: &str) -> Self {
        self.errors.insert(symbol.to_string(), reason.to_string());
        self
    }
}

impl DataPort for MockDataPort {
    fn fetch_daily_bars(
        &self,
        symbol: &str,
        _start_date: NaiveDate,
        _end_date: NaiveDate,
    ) -> Result<Vec<OhlcvBar>, ScannerError> {
        self.calls.borrow_mut().push(symbol.to_string());
        if let Some(reason) = self.errors.get(symbol) {
            return Err(ScannerError::DataUnavailable {
                symbol: symbol.to_string(),
                reason: reason.clone(),
            });
        }
        Ok(self.data.get(symbol).cloned().unwrap_or_default())
    }

    fn name(&self) -> &str {
        "mock"
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Bar `i` days after 2024-01-01.
pub fn make_bar(i: usize, low: f64, high: f64, close: f64) -> OhlcvBar {
    OhlcvBar {
        date: date(2024, 1, 1) + chrono::Duration::days(i as i64),
        open: close,
        high,
        low,
        close,
        volume: 1000,
    }
}

pub fn flat_bars(count: usize) -> Vec<OhlcvBar> {
    (0..count).map(|i| make_bar(i, 99.0, 101.0, 100.0)).collect()
}

/// 60 bars flat at 99-101 except a wide patch at 27-29 that makes
/// volatility contract into a breakout bar at 49 (high 130, close 125).
/// `after` replaces bar 50.
pub fn breakout_bars(after: (f64, f64, f64)) -> Vec<OhlcvBar> {
    (0..60)
        .map(|i| match i {
            27..=29 => make_bar(i, 80.0, 120.0, 100.0),
            49 => make_bar(i, 100.0, 130.0, 125.0),
            50 => make_bar(i, after.0, after.1, after.2),
            _ => make_bar(i, 99.0, 101.0, 100.0),
        })
        .collect()
}

/// 60 wide bars under 100, then 20 bars narrowing to 97-103 with a volume
/// surge on bar 79, so the low-volatility squeeze fires on the last bar.
pub fn squeeze_bars() -> Vec<OhlcvBar> {
    (0..80)
        .map(|i| {
            let mut bar = match i {
                0..=59 => make_bar(i, 80.0, 100.0, 90.0),
                60..=74 => make_bar(i, 98.0, 103.0, 100.0),
                _ => make_bar(i, 97.0, 103.0, 100.0),
            };
            if i == 79 {
                bar.volume = 3_000;
            }
            bar
        })
        .collect()
}

pub fn generate_bars(start_date: &str, count: usize, start_price: f64) -> Vec<OhlcvBar> {
    let start = NaiveDate::parse_from_str(start_date, "%Y-%m-%d").unwrap();
    (0..count)
        .map(|i| OhlcvBar {
            date: start + chrono::Duration::days(i as i64),
            open: start_price + i as f64,
            high: start_price + i as f64 + 1.0,
            low: start_price + i as f64 - 1.0,
            close: start_price + i as f64,
            volume: 1000,
        })
        .collect()
}

pub fn sample_config() -> BacktestConfig {
    BacktestConfig {
        start_date: date(2024, 1, 1),
        end_date: date(2024, 12, 31),
        initial_capital: 100_000.0,
        risk_fraction: 0.01,
    }
}

pub fn symbols(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

/// Write bars as `<dir>/<SYMBOL>.csv` in the layout the CSV adapter reads.
pub fn write_bars_csv(dir: &Path, symbol: &str, bars: &[OhlcvBar]) {
    let mut content = String::from("date,open,high,low,close,volume\n");
    for b in bars {
        content.push_str(&format!(
            "{},{},{},{},{},{}\n",
            b.date, b.open, b.high, b.low, b.close, b.volume
        ));
    }
    std::fs::write(dir.join(format!("{}.csv", symbol)), content).unwrap();
}
