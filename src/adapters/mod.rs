//! Concrete adapter implementations for ports.

pub mod csv_adapter;
pub mod csv_report;
pub mod file_config_adapter;
#[cfg(feature = "polygon")]
pub mod polygon_adapter;
pub mod retry;
pub mod watchlist_csv;
