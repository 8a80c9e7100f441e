//! Backtest output port.

use crate::domain::backtest::BacktestResult;
use crate::domain::error::ScannerError;

/// Port for writing the trade log and cumulative P/L curve.
pub trait ReportPort {
    fn write(&self, result: &BacktestResult, output_path: &str) -> Result<(), ScannerError>;
}
