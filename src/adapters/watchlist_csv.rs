//! Watchlist from a CSV file with a symbol column.

use crate::domain::error::ScannerError;
use crate::domain::universe::normalize_symbols;
use crate::ports::watchlist_port::WatchlistPort;
use std::path::PathBuf;

/// Header names accepted for the symbol column, compared case-insensitively.
const SYMBOL_HEADERS: &[&str] = &["symbol", "ticker"];

pub struct CsvWatchlistAdapter {
    path: PathBuf,
}

impl CsvWatchlistAdapter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl WatchlistPort for CsvWatchlistAdapter {
    fn load_symbols(&self) -> Result<Vec<String>, ScannerError> {
        let mut rdr = csv::Reader::from_path(&self.path).map_err(|e| ScannerError::Watchlist {
            reason: format!("failed to open {}: {}", self.path.display(), e),
        })?;

        let headers = rdr.headers().map_err(|e| ScannerError::Watchlist {
            reason: format!("failed to read header: {}", e),
        })?;
        let column = headers
            .iter()
            .position(|h| SYMBOL_HEADERS.contains(&h.trim().to_lowercase().as_str()))
            .ok_or_else(|| ScannerError::Watchlist {
                reason: format!(
                    "no Symbol or Ticker column in {} (found: {})",
                    self.path.display(),
                    headers.iter().collect::<Vec<_>>().join(", ")
                ),
            })?;

        let mut raw = Vec::new();
        for result in rdr.records() {
            let record = result.map_err(|e| ScannerError::Watchlist {
                reason: format!("CSV parse error: {}", e),
            })?;
            if let Some(value) = record.get(column) {
                raw.push(value.to_string());
            }
        }

        let symbols = normalize_symbols(raw);
        if symbols.is_empty() {
            return Err(ScannerError::Watchlist {
                reason: format!("{} lists no symbols", self.path.display()),
            });
        }
        Ok(symbols)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn watchlist(content: &str) -> (TempDir, CsvWatchlistAdapter) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("watchlist.csv");
        fs::write(&path, content).unwrap();
        (dir, CsvWatchlistAdapter::new(path))
    }

    #[test]
    fn reads_symbol_column() {
        let (_dir, adapter) = watchlist("Name,Symbol,Sector\nApple,aapl,Tech\nMicrosoft,MSFT,Tech\n");
        assert_eq!(adapter.load_symbols().unwrap(), vec!["AAPL", "MSFT"]);
    }

    #[test]
    fn accepts_ticker_header_in_any_case() {
        let (_dir, adapter) = watchlist("TICKER\nNVDA\n\nnvda\nAMD\n");
        assert_eq!(adapter.load_symbols().unwrap(), vec!["NVDA", "AMD"]);
    }

    #[test]
    fn lowercase_symbol_header() {
        let (_dir, adapter) = watchlist("symbol,weight\nSPY,0.5\nQQQ,0.5\n");
        assert_eq!(adapter.load_symbols().unwrap(), vec!["SPY", "QQQ"]);
    }

    #[test]
    fn missing_column_is_an_error() {
        let (_dir, adapter) = watchlist("Name,Sector\nApple,Tech\n");
        let err = adapter.load_symbols().unwrap_err();
        assert!(matches!(err, ScannerError::Watchlist { .. }));
        assert!(err.to_string().contains("Name, Sector"));
    }

    #[test]
    fn empty_list_is_an_error() {
        let (_dir, adapter) = watchlist("Symbol\n");
        assert!(adapter.load_symbols().is_err());
    }

    #[test]
    fn missing_file_is_an_error() {
        let adapter = CsvWatchlistAdapter::new("/nonexistent/watchlist.csv");
        assert!(matches!(adapter.load_symbols(), Err(ScannerError::Watchlist { .. })));
    }
}
