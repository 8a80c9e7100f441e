//! Market data provider port.

use crate::domain::error::ScannerError;
use crate::domain::ohlcv::OhlcvBar;
use chrono::NaiveDate;

pub trait DataPort {
    /// Daily bars for `symbol` between the two dates inclusive, oldest first.
    ///
    /// Provider failures should surface as `ScannerError::DataUnavailable`.
    fn fetch_daily_bars(
        &self,
        symbol: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<OhlcvBar>, ScannerError>;

    fn name(&self) -> &str {
        "unnamed"
    }
}
