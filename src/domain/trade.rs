//! Trade records and the value types they are built from.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use std::fmt;
use std::str::FromStr;

/// Load-order identifier. Assigned 1-based across the valid rows of a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TradeId(pub u64);

impl fmt::Display for TradeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// +1 for buys, -1 for sells.
    pub fn sign(self) -> f64 {
        match self {
            Side::Buy => 1.0,
            Side::Sell => -1.0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Side::Buy => "buy",
            Side::Sell => "sell",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Side {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "buy" | "b" => Ok(Side::Buy),
            "sell" | "s" => Ok(Side::Sell),
            other => Err(format!("unknown side '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Trade {
    pub id: TradeId,
    pub external_ref: Option<String>,
    pub symbol: String,
    pub side: Side,
    pub quantity: f64,
    pub price: f64,
    pub fees: f64,
    pub timestamp: NaiveDateTime,
    pub currency: String,
    pub revision: u32,
}

impl Trade {
    pub fn notional(&self) -> f64 {
        self.quantity * self.price
    }

    pub fn signed_quantity(&self) -> f64 {
        self.side.sign() * self.quantity
    }

    /// Derive the next revision of this trade. `self` is left untouched.
    pub fn amended(&self, amendment: &TradeAmendment) -> Result<Trade, String> {
        let mut next = self.clone();
        if let Some(symbol) = &amendment.symbol {
            next.symbol = normalize_symbol(symbol)?;
        }
        if let Some(side) = amendment.side {
            next.side = side;
        }
        if let Some(quantity) = amendment.quantity {
            next.quantity = positive("quantity", quantity)?;
        }
        if let Some(price) = amendment.price {
            next.price = positive("price", price)?;
        }
        if let Some(fees) = amendment.fees {
            next.fees = non_negative("fees", fees)?;
        }
        if let Some(timestamp) = amendment.timestamp {
            next.timestamp = timestamp;
        }
        if let Some(currency) = &amendment.currency {
            next.currency = normalize_currency(currency)?;
        }
        next.revision = self.revision + 1;
        Ok(next)
    }
}

/// Field overrides for deriving a new trade revision.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TradeAmendment {
    pub symbol: Option<String>,
    pub side: Option<Side>,
    pub quantity: Option<f64>,
    pub price: Option<f64>,
    pub fees: Option<f64>,
    pub timestamp: Option<NaiveDateTime>,
    pub currency: Option<String>,
}

impl TradeAmendment {
    pub fn is_empty(&self) -> bool {
        *self == TradeAmendment::default()
    }
}

pub(crate) fn normalize_symbol(raw: &str) -> Result<String, String> {
    let symbol = raw.trim();
    if symbol.is_empty() {
        return Err("symbol is empty".to_string());
    }
    Ok(symbol.to_uppercase())
}

pub(crate) fn normalize_currency(raw: &str) -> Result<String, String> {
    let code = raw.trim();
    if code.is_empty() || !code.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(format!("invalid currency code '{code}'"));
    }
    Ok(code.to_uppercase())
}

pub(crate) fn positive(field: &str, value: f64) -> Result<f64, String> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(format!("{field} must be positive, got {value}"))
    }
}

pub(crate) fn non_negative(field: &str, value: f64) -> Result<f64, String> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(format!("{field} must be non-negative, got {value}"))
    }
}

/// Parse a timestamp in any of the accepted layouts.
///
/// RFC 3339 values are converted to UTC. Bare dates resolve to midnight.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    for layout in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, layout) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_trade() -> Trade {
        Trade {
            id: TradeId(1),
            external_ref: Some("T-100".into()),
            symbol: "BHP".into(),
            side: Side::Buy,
            quantity: 100.0,
            price: 50.0,
            fees: 5.0,
            timestamp: parse_timestamp("2024-01-15 10:00:00").unwrap(),
            currency: "AUD".into(),
            revision: 0,
        }
    }

    #[test]
    fn side_parses_common_spellings() {
        assert_eq!("BUY".parse::<Side>().unwrap(), Side::Buy);
        assert_eq!(" b ".parse::<Side>().unwrap(), Side::Buy);
        assert_eq!("Sell".parse::<Side>().unwrap(), Side::Sell);
        assert_eq!("s".parse::<Side>().unwrap(), Side::Sell);
        assert!("short".parse::<Side>().is_err());
    }

    #[test]
    fn signed_quantity_follows_side() {
        let mut trade = sample_trade();
        assert!((trade.signed_quantity() - 100.0).abs() < f64::EPSILON);
        trade.side = Side::Sell;
        assert!((trade.signed_quantity() + 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn notional() {
        assert!((sample_trade().notional() - 5000.0).abs() < f64::EPSILON);
    }

    #[test]
    fn amended_bumps_revision_and_keeps_original() {
        let original = sample_trade();
        let amendment = TradeAmendment {
            price: Some(55.0),
            ..Default::default()
        };
        let next = original.amended(&amendment).unwrap();

        assert_eq!(next.id, original.id);
        assert_eq!(next.revision, 1);
        assert!((next.price - 55.0).abs() < f64::EPSILON);
        assert!((original.price - 50.0).abs() < f64::EPSILON);
        assert_eq!(original.revision, 0);
    }

    #[test]
    fn amended_rejects_invalid_values() {
        let original = sample_trade();
        let zero_qty = TradeAmendment {
            quantity: Some(0.0),
            ..Default::default()
        };
        assert!(original.amended(&zero_qty).is_err());

        let negative_fees = TradeAmendment {
            fees: Some(-1.0),
            ..Default::default()
        };
        assert!(original.amended(&negative_fees).is_err());

        let blank_symbol = TradeAmendment {
            symbol: Some("  ".into()),
            ..Default::default()
        };
        assert!(original.amended(&blank_symbol).is_err());
    }

    #[test]
    fn empty_amendment() {
        assert!(TradeAmendment::default().is_empty());
        let a = TradeAmendment {
            fees: Some(1.0),
            ..Default::default()
        };
        assert!(!a.is_empty());
    }

    #[test]
    fn parse_timestamp_layouts() {
        let expected = NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap();
        assert_eq!(parse_timestamp("2024-03-01T09:30:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-03-01 09:30:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-03-01T10:30:00+01:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-03-01T09:30:00Z"), Some(expected));
        assert_eq!(
            parse_timestamp("2024-03-01"),
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap().and_hms_opt(0, 0, 0)
        );
    }

    #[test]
    fn parse_timestamp_rejects_garbage() {
        assert_eq!(parse_timestamp(""), None);
        assert_eq!(parse_timestamp("yesterday"), None);
        assert_eq!(parse_timestamp("2024-13-01"), None);
    }

    #[test]
    fn normalize_helpers() {
        assert_eq!(normalize_symbol(" bhp ").unwrap(), "BHP");
        assert_eq!(normalize_currency("aud").unwrap(), "AUD");
        assert!(normalize_currency("A1D").is_err());
        assert!(positive("price", f64::NAN).is_err());
        assert!(non_negative("fees", 0.0).is_ok());
    }
}
