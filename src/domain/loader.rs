//! Row-level validation of raw trade records.
//!
//! Format parsing belongs to the source adapter; this module turns the raw
//! string fields into [`Trade`]s, excluding and reporting rows that fail.

use serde::Deserialize;

use crate::domain::error::{LoadError, LoadWarning};
use crate::domain::trade::{
    non_negative, normalize_currency, normalize_symbol, parse_timestamp, positive, Side, Trade,
    TradeId,
};

/// Columns every trade source must provide.
pub const REQUIRED_COLUMNS: [&str; 5] = ["symbol", "side", "quantity", "price", "timestamp"];

/// Default currency applied when a row carries none.
pub const DEFAULT_CURRENCY: &str = "USD";

/// One undecoded row of the trade source file contract.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct RawTradeRow {
    pub id: Option<String>,
    pub symbol: Option<String>,
    pub side: Option<String>,
    pub quantity: Option<String>,
    pub price: Option<String>,
    pub fees: Option<String>,
    pub timestamp: Option<String>,
    pub currency: Option<String>,
    /// Set by the source adapter when the row could not be decoded at all.
    #[serde(skip)]
    pub malformed: Option<String>,
}

impl RawTradeRow {
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self {
            malformed: Some(reason.into()),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoadOutcome {
    pub trades: Vec<Trade>,
    pub warnings: Vec<LoadWarning>,
}

/// Validate every row, in source order.
///
/// Valid rows receive consecutive ids starting at 1. Fails only when the
/// source had rows and none of them survived validation.
pub fn load(rows: Vec<RawTradeRow>, default_currency: &str) -> Result<LoadOutcome, LoadError> {
    let row_count = rows.len();
    let mut trades = Vec::with_capacity(row_count);
    let mut warnings = Vec::new();

    for (row_index, row) in rows.into_iter().enumerate() {
        let next_id = TradeId(trades.len() as u64 + 1);
        match validate_row(row, next_id, default_currency) {
            Ok(trade) => trades.push(trade),
            Err(reason) => warnings.push(LoadWarning { row_index, reason }),
        }
    }

    if row_count > 0 && trades.is_empty() {
        return Err(LoadError::NoValidRows { rows: row_count });
    }

    Ok(LoadOutcome { trades, warnings })
}

fn validate_row(row: RawTradeRow, id: TradeId, default_currency: &str) -> Result<Trade, String> {
    if let Some(reason) = row.malformed {
        return Err(format!("malformed row: {reason}"));
    }

    let symbol = normalize_symbol(row.symbol.as_deref().unwrap_or(""))
        .map_err(|_| "missing symbol".to_string())?;

    let side: Side = required(&row.side, "side")?.parse()?;

    let quantity = positive("quantity", number(&row.quantity, "quantity")?)?;
    let price = positive("price", number(&row.price, "price")?)?;

    let fees = match present(&row.fees) {
        Some(raw) => non_negative("fees", parse_number(raw, "fees")?)?,
        None => 0.0,
    };

    let raw_ts = required(&row.timestamp, "timestamp")?;
    let timestamp =
        parse_timestamp(raw_ts).ok_or_else(|| format!("unparsable timestamp '{raw_ts}'"))?;

    let currency = match present(&row.currency) {
        Some(raw) => normalize_currency(raw)?,
        None => default_currency.to_uppercase(),
    };

    Ok(Trade {
        id,
        external_ref: present(&row.id).map(str::to_string),
        symbol,
        side,
        quantity,
        price,
        fees,
        timestamp,
        currency,
        revision: 0,
    })
}

fn present(field: &Option<String>) -> Option<&str> {
    field.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

fn required<'a>(field: &'a Option<String>, name: &str) -> Result<&'a str, String> {
    present(field).ok_or_else(|| format!("missing {name}"))
}

fn number(field: &Option<String>, name: &str) -> Result<f64, String> {
    parse_number(required(field, name)?, name)
}

fn parse_number(raw: &str, name: &str) -> Result<f64, String> {
    raw.parse::<f64>()
        .map_err(|_| format!("invalid {name} value '{raw}'"))
}
