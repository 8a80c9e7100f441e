//! Watchlist source port.

use crate::domain::error::ScannerError;

pub trait WatchlistPort {
    /// Instrument identifiers in the order they should be processed.
    fn load_symbols(&self) -> Result<Vec<String>, ScannerError>;
}
