//! Symbol lists and per-instrument skip diagnostics.
//!
//! Parses inline symbol lists from configuration and records why an
//! instrument was left out of a scan or backtest.

use std::collections::HashSet;
use std::fmt;

use crate::domain::error::ScannerError;

#[derive(Debug, Clone, thiserror::Error)]
pub enum UniverseError {
    #[error("empty token in symbol list")]
    EmptyToken,

    #[error("duplicate symbol: {0}")]
    DuplicateSymbol(String),
}

/// Split a comma-separated list, trimming and upper-casing each symbol.
pub fn parse_symbols(input: &str) -> Result<Vec<String>, UniverseError> {
    let mut symbols = Vec::new();
    let mut seen = HashSet::new();

    for token in input.split(',') {
        let trimmed = token.trim();
        if trimmed.is_empty() {
            return Err(UniverseError::EmptyToken);
        }
        let symbol = trimmed.to_uppercase();
        if !seen.insert(symbol.clone()) {
            return Err(UniverseError::DuplicateSymbol(symbol));
        }
        symbols.push(symbol);
    }

    Ok(symbols)
}

/// Drop blanks and repeats while keeping first-seen order.
pub fn normalize_symbols<I, S>(symbols: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    symbols
        .into_iter()
        .map(|s| s.as_ref().trim().to_uppercase())
        .filter(|s| !s.is_empty() && seen.insert(s.clone()))
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkippedSymbol {
    pub symbol: String,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    NoData { detail: String },
    InsufficientHistory { bars: usize, minimum: usize },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NoData { detail } => write!(f, "no data ({})", detail),
            SkipReason::InsufficientHistory { bars, minimum } => {
                write!(f, "insufficient history ({} bars, {} required)", bars, minimum)
            }
        }
    }
}

impl SkippedSymbol {
    /// Diagnostic for a per-instrument error; `None` for errors that should not be skipped.
    pub fn from_error(symbol: &str, err: &ScannerError) -> Option<Self> {
        let reason = match err {
            ScannerError::DataUnavailable { reason, .. } => SkipReason::NoData {
                detail: reason.clone(),
            },
            ScannerError::InsufficientHistory { bars, minimum, .. } => {
                SkipReason::InsufficientHistory {
                    bars: *bars,
                    minimum: *minimum,
                }
            }
            _ => return None,
        };
        Some(SkippedSymbol {
            symbol: symbol.to_string(),
            reason,
        })
    }
}
