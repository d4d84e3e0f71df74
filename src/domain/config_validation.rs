//! Configuration validation.
//!
//! Checks every analyzer key before a session is started. The first problem
//! found is reported; later keys are not inspected.

use crate::domain::aggregate::Bucket;
use crate::domain::error::AnalyzerError;
use crate::ports::config_port::ConfigPort;
use log::LevelFilter;

pub const COST_BASIS_AVERAGE: &str = "average-cost";

pub fn validate_config(config: &dyn ConfigPort) -> Result<(), AnalyzerError> {
    validate_source_path(config)?;
    validate_default_currency(config)?;
    validate_page_size(config)?;
    validate_cost_basis(config)?;
    validate_bucket(config)?;
    validate_log_level(config)?;
    validate_prices(config)?;
    Ok(())
}

fn invalid(section: &str, key: &str, reason: impl Into<String>) -> AnalyzerError {
    AnalyzerError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.into(),
    }
}

/// Present and non-blank, or `None` when the key is absent.
fn non_blank(config: &dyn ConfigPort, section: &str, key: &str) -> Option<String> {
    config
        .get_string(section, key)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn validate_source_path(config: &dyn ConfigPort) -> Result<(), AnalyzerError> {
    match non_blank(config, "source", "path") {
        Some(_) => Ok(()),
        None => Err(AnalyzerError::ConfigMissing {
            section: "source".to_string(),
            key: "path".to_string(),
        }),
    }
}

fn validate_default_currency(config: &dyn ConfigPort) -> Result<(), AnalyzerError> {
    match config.get_string("source", "default_currency") {
        None => Ok(()),
        Some(s) if !s.trim().is_empty() && s.trim().chars().all(|c| c.is_ascii_alphabetic()) => {
            Ok(())
        }
        Some(s) => Err(invalid(
            "source",
            "default_currency",
            format!("'{s}' is not a currency code"),
        )),
    }
}

fn validate_page_size(config: &dyn ConfigPort) -> Result<(), AnalyzerError> {
    let Some(raw) = non_blank(config, "session", "page_size") else {
        return Ok(());
    };
    match raw.parse::<i64>() {
        Ok(n) if n >= 1 => Ok(()),
        _ => Err(invalid(
            "session",
            "page_size",
            "page_size must be a positive integer",
        )),
    }
}

fn validate_cost_basis(config: &dyn ConfigPort) -> Result<(), AnalyzerError> {
    match non_blank(config, "analytics", "cost_basis_method") {
        None => Ok(()),
        Some(m) if m.eq_ignore_ascii_case(COST_BASIS_AVERAGE) => Ok(()),
        Some(m) => Err(invalid(
            "analytics",
            "cost_basis_method",
            format!("unsupported cost basis '{m}', only {COST_BASIS_AVERAGE} is available"),
        )),
    }
}

fn validate_bucket(config: &dyn ConfigPort) -> Result<(), AnalyzerError> {
    match non_blank(config, "analytics", "bucket") {
        None => Ok(()),
        Some(b) => b
            .parse::<Bucket>()
            .map(|_| ())
            .map_err(|reason| invalid("analytics", "bucket", reason)),
    }
}

fn validate_log_level(config: &dyn ConfigPort) -> Result<(), AnalyzerError> {
    match non_blank(config, "logging", "level") {
        None => Ok(()),
        Some(l) => l
            .parse::<LevelFilter>()
            .map(|_| ())
            .map_err(|_| invalid("logging", "level", format!("unknown log level '{l}'"))),
    }
}

fn validate_prices(config: &dyn ConfigPort) -> Result<(), AnalyzerError> {
    for symbol in config.keys("prices") {
        let raw = config.get_string("prices", &symbol).unwrap_or_default();
        match raw.trim().parse::<f64>() {
            Ok(p) if p.is_finite() && p > 0.0 => {}
            _ => {
                return Err(invalid(
                    "prices",
                    &symbol,
                    format!("price '{raw}' must be a positive number"),
                ))
            }
        }
    }
    Ok(())
}
