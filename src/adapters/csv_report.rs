//! CSV report adapter.
//!
//! Writes the trade log to the requested path and the cumulative P/L curve
//! next to it as `<stem>_equity.csv`.

use crate::domain::backtest::BacktestResult;
use crate::domain::error::ScannerError;
use crate::ports::report_port::ReportPort;
use std::path::{Path, PathBuf};

pub struct CsvReportAdapter;

impl CsvReportAdapter {
    pub fn new() -> Self {
        Self
    }

    /// Path of the equity curve file written alongside `output_path`.
    pub fn equity_path(output_path: &Path) -> PathBuf {
        let stem = output_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "trades".to_string());
        output_path.with_file_name(format!("{}_equity.csv", stem))
    }
}

impl Default for CsvReportAdapter {
    fn default() -> Self {
        Self::new()
    }
}

fn report_err(e: impl std::fmt::Display) -> ScannerError {
    ScannerError::Report {
        reason: e.to_string(),
    }
}

fn write_trades(result: &BacktestResult, path: &Path) -> Result<(), ScannerError> {
    let mut wtr = csv::Writer::from_path(path).map_err(report_err)?;
    wtr.write_record([
        "symbol",
        "entry_date",
        "entry_price",
        "stop_loss",
        "target_price",
        "quantity",
        "exit_date",
        "exit_price",
        "exit_reason",
        "pnl",
    ])
    .map_err(report_err)?;

    for t in result.trades() {
        wtr.write_record([
            t.symbol.clone(),
            t.entry_date.to_string(),
            format!("{:.4}", t.entry_price),
            format!("{:.4}", t.stop_loss),
            format!("{:.4}", t.target_price),
            format!("{:.4}", t.quantity),
            t.exit_date.to_string(),
            format!("{:.4}", t.exit_price),
            t.exit_reason.to_string(),
            format!("{:.2}", t.pnl),
        ])
        .map_err(report_err)?;
    }
    wtr.flush()?;
    Ok(())
}

fn write_equity(result: &BacktestResult, path: &Path) -> Result<(), ScannerError> {
    let mut wtr = csv::Writer::from_path(path).map_err(report_err)?;
    wtr.write_record(["date", "cumulative_pnl", "capital"])
        .map_err(report_err)?;
    for point in result.account.equity_curve() {
        wtr.write_record([
            point.date.to_string(),
            format!("{:.2}", point.cumulative_pnl),
            format!("{:.2}", point.capital),
        ])
        .map_err(report_err)?;
    }
    wtr.flush()?;
    Ok(())
}

impl ReportPort for CsvReportAdapter {
    fn write(&self, result: &BacktestResult, output_path: &str) -> Result<(), ScannerError> {
        let path = Path::new(output_path);
        write_trades(result, path)?;
        write_equity(result, &Self::equity_path(path))
    }
}
