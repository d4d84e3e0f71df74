//! Grouped trade totals by symbol, side, or time bucket.

use chrono::{Datelike, NaiveDate, NaiveDateTime, TimeDelta};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::domain::store::TradeStore;
use crate::domain::trade::{Side, Trade};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bucket {
    /// Fixed-width buckets aligned to the Unix epoch.
    Every(TimeDelta),
    /// Calendar months.
    Month,
}

impl Bucket {
    pub fn day() -> Self {
        Bucket::Every(TimeDelta::days(1))
    }

    /// Start of the bucket containing `ts`.
    pub fn floor(&self, ts: NaiveDateTime) -> NaiveDateTime {
        match self {
            Bucket::Every(width) => {
                let width_secs = width.num_seconds().max(1);
                let secs = ts.and_utc().timestamp();
                let start = secs.div_euclid(width_secs) * width_secs;
                chrono::DateTime::from_timestamp(start, 0)
                    .map(|dt| dt.naive_utc())
                    .unwrap_or(ts)
            }
            Bucket::Month => NaiveDate::from_ymd_opt(ts.year(), ts.month(), 1)
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .unwrap_or(ts),
        }
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Bucket::Month => f.write_str("month"),
            Bucket::Every(width) => {
                let secs = width.num_seconds();
                if secs % 604_800 == 0 {
                    write!(f, "{}w", secs / 604_800)
                } else if secs % 86_400 == 0 {
                    write!(f, "{}d", secs / 86_400)
                } else if secs % 3_600 == 0 {
                    write!(f, "{}h", secs / 3_600)
                } else {
                    write!(f, "{}m", secs / 60)
                }
            }
        }
    }
}

impl FromStr for Bucket {
    type Err = String;

    /// Accepts `month`, or a count followed by `m`, `h`, `d` or `w`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_lowercase();
        if s == "month" || s == "1mo" {
            return Ok(Bucket::Month);
        }
        let split = s
            .find(|c: char| !c.is_ascii_digit())
            .ok_or_else(|| format!("bucket '{s}' has no unit"))?;
        let (count, unit) = s.split_at(split);
        let count: i64 = count
            .parse()
            .map_err(|_| format!("bucket '{s}' has no count"))?;
        if count <= 0 {
            return Err(format!("bucket '{s}' must be positive"));
        }
        let width = match unit {
            "m" => TimeDelta::minutes(count),
            "h" => TimeDelta::hours(count),
            "d" => TimeDelta::days(count),
            "w" => TimeDelta::weeks(count),
            _ => return Err(format!("unknown bucket unit '{unit}'")),
        };
        Ok(Bucket::Every(width))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupBy {
    Symbol,
    Side,
    TimeBucket(Bucket),
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum GroupKey {
    Symbol(String),
    Side(Side),
    Bucket(NaiveDateTime),
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupKey::Symbol(s) => f.write_str(s),
            GroupKey::Side(side) => write!(f, "{side}"),
            GroupKey::Bucket(start) => write!(f, "{}", start.format("%Y-%m-%d %H:%M")),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Aggregate {
    pub total_quantity: f64,
    pub net_quantity: f64,
    pub total_notional: f64,
    pub total_fees: f64,
    pub trade_count: usize,
}

impl Aggregate {
    fn add(&mut self, trade: &Trade) {
        self.total_quantity += trade.quantity;
        self.net_quantity += trade.signed_quantity();
        self.total_notional += trade.notional();
        self.total_fees += trade.fees;
        self.trade_count += 1;
    }
}

pub fn aggregate(store: &TradeStore, group_by: GroupBy) -> BTreeMap<GroupKey, Aggregate> {
    aggregate_trades(store.all(), group_by)
}

/// Group an arbitrary trade sequence. Trades are accumulated in input order.
pub fn aggregate_trades<'a>(
    trades: impl IntoIterator<Item = &'a Trade>,
    group_by: GroupBy,
) -> BTreeMap<GroupKey, Aggregate> {
    let mut groups: BTreeMap<GroupKey, Aggregate> = BTreeMap::new();
    for trade in trades {
        let key = match group_by {
            GroupBy::Symbol => GroupKey::Symbol(trade.symbol.clone()),
            GroupBy::Side => GroupKey::Side(trade.side),
            GroupBy::TimeBucket(bucket) => GroupKey::Bucket(bucket.floor(trade.timestamp)),
        };
        groups.entry(key).or_default().add(trade);
    }
    groups
}
