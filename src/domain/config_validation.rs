//! Configuration validation.
//!
//! Checks every section before any data is fetched. Typed accessors here
//! are shared with the CLI so the values validated are the values used.

use crate::domain::error::ScannerError;
use crate::domain::indicator::VolatilityMethod;
use crate::domain::sizing::{SizingMode, StopPolicy};
use crate::domain::strategy::{EntryRule, Pattern};
use crate::ports::config_port::ConfigPort;
use chrono::NaiveDate;

pub fn validate_backtest_config(config: &dyn ConfigPort) -> Result<(), ScannerError> {
    validate_initial_capital(config)?;
    validate_risk_per_trade(config)?;
    validate_dates(config)?;
    validate_symbols(config)?;
    Ok(())
}

pub fn validate_strategy_config(config: &dyn ConfigPort) -> Result<(), ScannerError> {
    required_pattern(config)?;
    optional_choice(config, "volatility", VolatilityMethod::parse)?;
    optional_choice(config, "stop_policy", StopPolicy::parse)?;
    optional_choice(config, "entry", EntryRule::parse)?;
    optional_choice(config, "sizing", SizingMode::parse)?;
    optional_positive_int(config, "strategy", "volatility_window")?;
    optional_positive_int(config, "strategy", "exit_horizon")?;
    Ok(())
}

pub fn validate_data_config(config: &dyn ConfigPort) -> Result<(), ScannerError> {
    match data_source(config)?.as_str() {
        "csv" => {
            required_string(config, "data", "csv_dir")?;
        }
        _ => {
            required_string(config, "api", "polygon_api_key")?;
        }
    }
    optional_non_negative_int(config, "data", "max_retries")?;
    optional_non_negative_int(config, "data", "retry_base_delay_ms")?;
    Ok(())
}

fn validate_initial_capital(config: &dyn ConfigPort) -> Result<(), ScannerError> {
    required_f64(config, "backtest", "initial_capital").and_then(|value| {
        if value > 0.0 {
            Ok(())
        } else {
            Err(ScannerError::invalid(
                "backtest",
                "initial_capital",
                "initial_capital must be positive",
            ))
        }
    })
}

fn validate_risk_per_trade(config: &dyn ConfigPort) -> Result<(), ScannerError> {
    match optional_f64(config, "backtest", "risk_per_trade")? {
        Some(value) if !(value > 0.0 && value < 1.0) => Err(ScannerError::invalid(
            "backtest",
            "risk_per_trade",
            "risk_per_trade must be between 0 and 1",
        )),
        _ => Ok(()),
    }
}

fn validate_dates(config: &dyn ConfigPort) -> Result<(), ScannerError> {
    let start_date = required_date(config, "backtest", "start_date")?;
    let end_date = required_date(config, "backtest", "end_date")?;

    if start_date >= end_date {
        return Err(ScannerError::invalid(
            "backtest",
            "start_date",
            "start_date must be before end_date",
        ));
    }
    Ok(())
}

fn validate_symbols(config: &dyn ConfigPort) -> Result<(), ScannerError> {
    match (
        config.get_string("backtest", "symbols"),
        config.get_string("backtest", "watchlist"),
    ) {
        (None, None) => Err(ScannerError::missing("backtest", "symbols")),
        _ => Ok(()),
    }
}

/// `polygon` unless `[data] source` says otherwise.
pub fn data_source(config: &dyn ConfigPort) -> Result<String, ScannerError> {
    let source = config
        .get_string("data", "source")
        .map(|s| s.to_lowercase())
        .unwrap_or_else(|| "polygon".to_string());
    match source.as_str() {
        "polygon" | "csv" => Ok(source),
        other => Err(ScannerError::invalid(
            "data",
            "source",
            format!("unknown data source '{}', expected polygon or csv", other),
        )),
    }
}

pub fn required_pattern(config: &dyn ConfigPort) -> Result<Pattern, ScannerError> {
    let value = required_string(config, "strategy", "pattern")?;
    Pattern::parse(&value).ok_or_else(|| {
        ScannerError::invalid(
            "strategy",
            "pattern",
            format!(
                "unknown pattern '{}', expected contraction_breakout or low_volatility_squeeze",
                value
            ),
        )
    })
}

/// Parse an optional `[strategy]` choice; absent keys give `None`.
pub fn optional_choice<T>(
    config: &dyn ConfigPort,
    key: &str,
    parse: fn(&str) -> Option<T>,
) -> Result<Option<T>, ScannerError> {
    match config.get_string("strategy", key) {
        None => Ok(None),
        Some(value) => parse(&value).map(Some).ok_or_else(|| {
            ScannerError::invalid("strategy", key, format!("unrecognised value '{}'", value))
        }),
    }
}

pub fn required_string(config: &dyn ConfigPort, section: &str, key: &str) -> Result<String, ScannerError> {
    config
        .get_string(section, key)
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| ScannerError::missing(section, key))
}

pub fn required_date(config: &dyn ConfigPort, section: &str, key: &str) -> Result<NaiveDate, ScannerError> {
    let value = required_string(config, section, key)?;
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|_| {
        ScannerError::invalid(section, key, format!("invalid {} format, expected YYYY-MM-DD", key))
    })
}

pub fn required_f64(config: &dyn ConfigPort, section: &str, key: &str) -> Result<f64, ScannerError> {
    optional_f64(config, section, key)?.ok_or_else(|| ScannerError::missing(section, key))
}

pub fn optional_f64(config: &dyn ConfigPort, section: &str, key: &str) -> Result<Option<f64>, ScannerError> {
    match config.get_string(section, key) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .map(Some)
            .ok_or_else(|| ScannerError::invalid(section, key, format!("'{}' is not a number", value))),
    }
}

pub fn optional_positive_int(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<Option<usize>, ScannerError> {
    match optional_non_negative_int(config, section, key)? {
        Some(0) => Err(ScannerError::invalid(section, key, format!("{} must be at least 1", key))),
        other => Ok(other),
    }
}

pub fn optional_non_negative_int(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<Option<usize>, ScannerError> {
    match config.get_string(section, key) {
        None => Ok(None),
        Some(value) => value.trim().parse::<usize>().map(Some).map_err(|_| {
            ScannerError::invalid(section, key, format!("'{}' is not a non-negative integer", value))
        }),
    }
}
