//! Analyzer configuration assembled from a [`ConfigPort`].

use log::LevelFilter;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::domain::aggregate::Bucket;
use crate::domain::config_validation::{validate_config, COST_BASIS_AVERAGE};
use crate::domain::error::AnalyzerError;
use crate::domain::loader::DEFAULT_CURRENCY;
use crate::domain::position::PriceMap;
use crate::ports::config_port::ConfigPort;

pub const DEFAULT_PAGE_SIZE: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CostBasisMethod {
    #[default]
    AverageCost,
}

impl fmt::Display for CostBasisMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CostBasisMethod::AverageCost => f.write_str(COST_BASIS_AVERAGE),
        }
    }
}

impl FromStr for CostBasisMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case(COST_BASIS_AVERAGE) {
            Ok(CostBasisMethod::AverageCost)
        } else {
            Err(format!("unsupported cost basis '{s}'"))
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnalyzerConfig {
    pub source_path: PathBuf,
    pub page_size: usize,
    pub cost_basis_method: CostBasisMethod,
    pub log_level: LevelFilter,
    pub default_currency: String,
    pub aggregate_bucket: Bucket,
    /// Current prices keyed by upper-cased symbol.
    pub prices: PriceMap,
}

impl AnalyzerConfig {
    /// Defaults for everything except the source.
    pub fn new(source_path: impl Into<PathBuf>) -> Self {
        Self {
            source_path: source_path.into(),
            page_size: DEFAULT_PAGE_SIZE,
            cost_basis_method: CostBasisMethod::AverageCost,
            log_level: LevelFilter::Info,
            default_currency: DEFAULT_CURRENCY.to_string(),
            aggregate_bucket: Bucket::day(),
            prices: PriceMap::new(),
        }
    }

    /// Validate and read all sections. Relative source paths are kept as given.
    pub fn from_port(config: &dyn ConfigPort) -> Result<Self, AnalyzerError> {
        validate_config(config)?;

        let source_path = config
            .get_string("source", "path")
            .map(|p| p.trim().to_string())
            .unwrap_or_default();
        let mut result = Self::new(source_path);

        if let Some(currency) = config.get_string("source", "default_currency") {
            result.default_currency = currency.trim().to_uppercase();
        }
        if let Some(page_size) = config.get_int("session", "page_size") {
            result.page_size = page_size as usize;
        }
        if let Some(level) = config.get_string("logging", "level") {
            result.log_level = level.trim().parse().unwrap_or(LevelFilter::Info);
        }
        if let Some(method) = config.get_string("analytics", "cost_basis_method") {
            result.cost_basis_method = method.parse().unwrap_or_default();
        }
        if let Some(bucket) = config.get_string("analytics", "bucket") {
            result.aggregate_bucket = bucket.parse().unwrap_or_else(|_| Bucket::day());
        }
        for symbol in config.keys("prices") {
            if let Some(price) = config.get_double("prices", &symbol) {
                result.prices.insert(symbol.trim().to_uppercase(), price);
            }
        }
        Ok(result)
    }
}
