//! Domain error types.

/// Top-level error type for the scanner and backtester.
#[derive(Debug, thiserror::Error)]
pub enum ScannerError {
    #[error("no usable data for {symbol}: {reason}")]
    DataUnavailable { symbol: String, reason: String },

    #[error("insufficient history for {symbol}: have {bars} bars, need {minimum}")]
    InsufficientHistory {
        symbol: String,
        bars: usize,
        minimum: usize,
    },

    #[error("invalid risk geometry: entry {entry:.4} is not above stop {stop:.4}")]
    InvalidRiskGeometry { entry: f64, stop: f64 },

    #[error("position too small: risking {risk_amount:.2} at {risk_per_unit:.4} per unit")]
    PositionTooSmall { risk_amount: f64, risk_per_unit: f64 },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("watchlist error: {reason}")]
    Watchlist { reason: String },

    #[error("report error: {reason}")]
    Report { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ScannerError {
    /// Errors that only affect one instrument; the run carries on without it.
    pub fn is_per_instrument(&self) -> bool {
        matches!(
            self,
            ScannerError::DataUnavailable { .. } | ScannerError::InsufficientHistory { .. }
        )
    }

    /// Errors that only reject a single candidate trade.
    pub fn is_candidate_rejection(&self) -> bool {
        matches!(
            self,
            ScannerError::InvalidRiskGeometry { .. } | ScannerError::PositionTooSmall { .. }
        )
    }

    pub(crate) fn missing(section: &str, key: &str) -> Self {
        ScannerError::ConfigMissing {
            section: section.to_string(),
            key: key.to_string(),
        }
    }

    pub(crate) fn invalid(section: &str, key: &str, reason: impl Into<String>) -> Self {
        ScannerError::ConfigInvalid {
            section: section.to_string(),
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<&ScannerError> for std::process::ExitCode {
    fn from(err: &ScannerError) -> Self {
        let code: u8 = match err {
            ScannerError::Io(_) | ScannerError::Report { .. } => 1,
            ScannerError::ConfigParse { .. }
            | ScannerError::ConfigMissing { .. }
            | ScannerError::ConfigInvalid { .. } => 2,
            ScannerError::Watchlist { .. } => 3,
            ScannerError::InvalidRiskGeometry { .. } | ScannerError::PositionTooSmall { .. } => 4,
            ScannerError::DataUnavailable { .. } | ScannerError::InsufficientHistory { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}
