//! Core domain types and logic.

pub mod ohlcv;
pub mod indicator;
pub mod signal;
pub mod sizing;
pub mod strategy;
pub mod position;
pub mod account;
pub mod instrument;
pub mod backtest;
pub mod scanner;
pub mod regime;
pub mod metrics;
pub mod universe;
pub mod config_validation;
pub mod error;
