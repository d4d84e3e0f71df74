//! Filter predicates, stable sorting and pagination over trades and positions.

use chrono::NaiveDateTime;
use std::cmp::Ordering;
use std::fmt;

use crate::domain::position::Position;
use crate::domain::trade::{Side, Trade};

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Symbol(String),
    Side(Side),
    /// Inclusive on both ends.
    DateRange {
        from: Option<NaiveDateTime>,
        to: Option<NaiveDateTime>,
    },
    /// Inclusive on both ends.
    QuantityRange {
        min: Option<f64>,
        max: Option<f64>,
    },
    Currency(String),
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Filter::Symbol(s) => write!(f, "symbol={s}"),
            Filter::Side(side) => write!(f, "side={side}"),
            Filter::DateRange { from, to } => {
                let mut parts = Vec::new();
                if let Some(from) = from {
                    parts.push(format!("from={}", from.format("%Y-%m-%d %H:%M:%S")));
                }
                if let Some(to) = to {
                    parts.push(format!("to={}", to.format("%Y-%m-%d %H:%M:%S")));
                }
                f.write_str(&parts.join(" "))
            }
            Filter::QuantityRange { min, max } => {
                let mut parts = Vec::new();
                if let Some(min) = min {
                    parts.push(format!("qty>={min}"));
                }
                if let Some(max) = max {
                    parts.push(format!("qty<={max}"));
                }
                f.write_str(&parts.join(" "))
            }
            Filter::Currency(c) => write!(f, "currency={c}"),
        }
    }
}

/// Conjunction of filters. Empty matches everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Predicate {
    pub filters: Vec<Filter>,
}

impl Predicate {
    pub fn new(filters: Vec<Filter>) -> Self {
        Self { filters }
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    pub fn matches<T: Queryable>(&self, record: &T) -> bool {
        self.filters.iter().all(|f| record.matches(f))
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.filters.is_empty() {
            return f.write_str("none");
        }
        let parts: Vec<String> = self.filters.iter().map(Filter::to_string).collect();
        f.write_str(&parts.join(" AND "))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SortKey {
    Id,
    Timestamp,
    Symbol,
    Side,
    Quantity,
    Price,
    Notional,
    Fees,
    NetQuantity,
    AverageCost,
    RealizedPnl,
    UnrealizedPnl,
}

impl SortKey {
    pub fn name(self) -> &'static str {
        match self {
            SortKey::Id => "id",
            SortKey::Timestamp => "time",
            SortKey::Symbol => "symbol",
            SortKey::Side => "side",
            SortKey::Quantity => "qty",
            SortKey::Price => "price",
            SortKey::Notional => "notional",
            SortKey::Fees => "fees",
            SortKey::NetQuantity => "net-qty",
            SortKey::AverageCost => "avg-cost",
            SortKey::RealizedPnl => "realized",
            SortKey::UnrealizedPnl => "unrealized",
        }
    }

    pub fn from_name(name: &str) -> Option<SortKey> {
        let key = match name.to_lowercase().replace('_', "-").as_str() {
            "id" => SortKey::Id,
            "time" | "timestamp" | "date" => SortKey::Timestamp,
            "symbol" => SortKey::Symbol,
            "side" => SortKey::Side,
            "qty" | "quantity" => SortKey::Quantity,
            "price" => SortKey::Price,
            "notional" => SortKey::Notional,
            "fees" => SortKey::Fees,
            "net-qty" | "net-quantity" => SortKey::NetQuantity,
            "avg-cost" | "average-cost" => SortKey::AverageCost,
            "realized" | "realized-pnl" => SortKey::RealizedPnl,
            "unrealized" | "unrealized-pnl" => SortKey::UnrealizedPnl,
            _ => return None,
        };
        Some(key)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sort {
    pub key: SortKey,
    pub direction: SortDirection,
}

impl fmt::Display for Sort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dir = match self.direction {
            SortDirection::Ascending => "asc",
            SortDirection::Descending => "desc",
        };
        write!(f, "{} {}", self.key.name(), dir)
    }
}

/// A comparable field value.
#[derive(Debug, Clone, PartialEq)]
pub enum SortValue {
    Number(f64),
    Text(String),
    Time(NaiveDateTime),
}

impl SortValue {
    fn compare(&self, other: &SortValue) -> Ordering {
        match (self, other) {
            (SortValue::Number(a), SortValue::Number(b)) => a.total_cmp(b),
            (SortValue::Text(a), SortValue::Text(b)) => a.cmp(b),
            (SortValue::Time(a), SortValue::Time(b)) => a.cmp(b),
            // Keys of one kind never mix within a record type.
            _ => Ordering::Equal,
        }
    }
}

/// A record the pipeline can filter and sort.
pub trait Queryable {
    fn matches(&self, filter: &Filter) -> bool;

    /// Whether `key` is meaningful for this record type.
    fn supports(key: SortKey) -> bool;

    /// The value for `key`. `None` for supported keys means undefined.
    fn sort_value(&self, key: SortKey) -> Option<SortValue>;
}

fn in_range<T: PartialOrd>(value: T, lo: Option<T>, hi: Option<T>) -> bool {
    lo.is_none_or(|lo| value >= lo) && hi.is_none_or(|hi| value <= hi)
}

impl Queryable for Trade {
    fn matches(&self, filter: &Filter) -> bool {
        match filter {
            Filter::Symbol(s) => self.symbol.eq_ignore_ascii_case(s),
            Filter::Side(side) => self.side == *side,
            Filter::DateRange { from, to } => in_range(self.timestamp, *from, *to),
            Filter::QuantityRange { min, max } => in_range(self.quantity, *min, *max),
            Filter::Currency(c) => self.currency.eq_ignore_ascii_case(c),
        }
    }

    fn supports(key: SortKey) -> bool {
        !matches!(
            key,
            SortKey::NetQuantity
                | SortKey::AverageCost
                | SortKey::RealizedPnl
                | SortKey::UnrealizedPnl
        )
    }

    fn sort_value(&self, key: SortKey) -> Option<SortValue> {
        let value = match key {
            SortKey::Id => SortValue::Number(self.id.0 as f64),
            SortKey::Timestamp => SortValue::Time(self.timestamp),
            SortKey::Symbol => SortValue::Text(self.symbol.clone()),
            SortKey::Side => SortValue::Text(self.side.as_str().to_string()),
            SortKey::Quantity => SortValue::Number(self.quantity),
            SortKey::Price => SortValue::Number(self.price),
            SortKey::Notional => SortValue::Number(self.notional()),
            SortKey::Fees => SortValue::Number(self.fees),
            _ => return None,
        };
        Some(value)
    }
}

impl Queryable for Position {
    fn matches(&self, filter: &Filter) -> bool {
        match filter {
            Filter::Symbol(s) => self.symbol.eq_ignore_ascii_case(s),
            Filter::Side(Side::Buy) => self.is_long(),
            Filter::Side(Side::Sell) => self.is_short(),
            Filter::DateRange { from, to } => in_range(self.last_activity, *from, *to),
            Filter::QuantityRange { min, max } => in_range(self.net_quantity.abs(), *min, *max),
            Filter::Currency(c) => self.currency.eq_ignore_ascii_case(c),
        }
    }

    fn supports(key: SortKey) -> bool {
        matches!(
            key,
            SortKey::Symbol
                | SortKey::NetQuantity
                | SortKey::AverageCost
                | SortKey::RealizedPnl
                | SortKey::UnrealizedPnl
                | SortKey::Fees
                | SortKey::Timestamp
        )
    }

    fn sort_value(&self, key: SortKey) -> Option<SortValue> {
        match key {
            SortKey::Symbol => Some(SortValue::Text(self.symbol.clone())),
            SortKey::NetQuantity => Some(SortValue::Number(self.net_quantity)),
            SortKey::AverageCost => self.average_cost.map(SortValue::Number),
            SortKey::RealizedPnl => Some(SortValue::Number(self.realized_pnl)),
            SortKey::UnrealizedPnl => self.unrealized_pnl.map(SortValue::Number),
            SortKey::Fees => Some(SortValue::Number(self.total_fees)),
            SortKey::Timestamp => Some(SortValue::Time(self.last_activity)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub predicate: Predicate,
    pub sort: Option<Sort>,
    pub page: usize,
    pub page_size: usize,
}

impl Query {
    pub fn new(page_size: usize) -> Self {
        Self {
            predicate: Predicate::default(),
            sort: None,
            page: 0,
            page_size,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total_count: usize,
    pub page: usize,
    pub page_size: usize,
    pub page_count: usize,
}

/// Filter, stably sort and slice `records`.
///
/// Equal sort keys keep their input order in both directions. Undefined
/// values sort last. A page past the end yields no items but the full count.
pub fn apply<'a, T, I>(records: I, query: &Query) -> Page<T>
where
    T: Queryable + Clone + 'a,
    I: IntoIterator<Item = &'a T>,
{
    let mut matched: Vec<&T> = records
        .into_iter()
        .filter(|r| query.predicate.matches(*r))
        .collect();

    if let Some(sort) = query.sort {
        matched.sort_by(|a, b| compare(*a, *b, sort));
    }

    let page_size = query.page_size.max(1);
    let total_count = matched.len();
    let page_count = total_count.div_ceil(page_size);
    let items = matched
        .into_iter()
        .skip(query.page.saturating_mul(page_size))
        .take(page_size)
        .cloned()
        .collect();

    Page {
        items,
        total_count,
        page: query.page,
        page_size,
        page_count,
    }
}

fn compare<T: Queryable>(a: &T, b: &T, sort: Sort) -> Ordering {
    match (a.sort_value(sort.key), b.sort_value(sort.key)) {
        (Some(x), Some(y)) => match sort.direction {
            SortDirection::Ascending => x.compare(&y),
            SortDirection::Descending => y.compare(&x),
        },
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::store::TradeStore;
    use crate::domain::trade::{parse_timestamp, TradeId};

    fn trade(id: u64, symbol: &str, side: Side, qty: f64, price: f64, ts: &str) -> Trade {
        Trade {
            id: TradeId(id),
            external_ref: None,
            symbol: symbol.into(),
            side,
            quantity: qty,
            price,
            fees: 0.0,
            timestamp: parse_timestamp(ts).unwrap(),
            currency: "USD".into(),
            revision: 0,
        }
    }

    fn sample_store() -> TradeStore {
        TradeStore::new(vec![
            trade(1, "BHP", Side::Buy, 100.0, 10.0, "2024-01-01"),
            trade(2, "CBA", Side::Buy, 50.0, 20.0, "2024-01-02"),
            trade(3, "BHP", Side::Sell, 40.0, 15.0, "2024-01-03"),
            trade(4, "WBC", Side::Buy, 50.0, 30.0, "2024-01-04"),
            trade(5, "CBA", Side::Sell, 50.0, 25.0, "2024-01-05"),
        ])
    }

    fn ids(page: &Page<Trade>) -> Vec<u64> {
        page.items.iter().map(|t| t.id.0).collect()
    }

    fn query(filters: Vec<Filter>, sort: Option<Sort>, page: usize, page_size: usize) -> Query {
        Query {
            predicate: Predicate::new(filters),
            sort,
            page,
            page_size,
        }
    }

    #[test]
    fn empty_predicate_returns_everything_in_order() {
        let store = sample_store();
        let page = apply(store.all(), &query(vec![], None, 0, 100));
        assert_eq!(ids(&page), vec![1, 2, 3, 4, 5]);
        assert_eq!(page.total_count, 5);
        assert_eq!(page.page_count, 1);
    }

    #[test]
    fn filters_combine_with_and() {
        let store = sample_store();
        let page = apply(
            store.all(),
            &query(
                vec![Filter::Symbol("bhp".into()), Filter::Side(Side::Sell)],
                None,
                0,
                10,
            ),
        );
        assert_eq!(ids(&page), vec![3]);
    }

    #[test]
    fn date_and_quantity_ranges_are_inclusive() {
        let store = sample_store();
        let dates = Filter::DateRange {
            from: parse_timestamp("2024-01-02"),
            to: parse_timestamp("2024-01-04"),
        };
        assert_eq!(ids(&apply(store.all(), &query(vec![dates], None, 0, 10))), vec![2, 3, 4]);

        let qty = Filter::QuantityRange {
            min: Some(50.0),
            max: Some(50.0),
        };
        assert_eq!(ids(&apply(store.all(), &query(vec![qty], None, 0, 10))), vec![2, 4, 5]);

        let open_ended = Filter::QuantityRange {
            min: None,
            max: Some(45.0),
        };
        assert_eq!(ids(&apply(store.all(), &query(vec![open_ended], None, 0, 10))), vec![3]);
    }

    #[test]
    fn sort_is_stable_in_both_directions() {
        let store = sample_store();
        let asc = Sort {
            key: SortKey::Quantity,
            direction: SortDirection::Ascending,
        };
        assert_eq!(ids(&apply(store.all(), &query(vec![], Some(asc), 0, 10))), vec![3, 2, 4, 5, 1]);

        let desc = Sort {
            key: SortKey::Quantity,
            direction: SortDirection::Descending,
        };
        assert_eq!(ids(&apply(store.all(), &query(vec![], Some(desc), 0, 10))), vec![1, 2, 4, 5, 3]);
    }

    #[test]
    fn pagination() {
        let store = sample_store();
        let first = apply(store.all(), &query(vec![], None, 0, 2));
        let last = apply(store.all(), &query(vec![], None, 2, 2));
        let beyond = apply(store.all(), &query(vec![], None, 5, 2));

        assert_eq!(ids(&first), vec![1, 2]);
        assert_eq!(ids(&last), vec![5]);
        assert!(beyond.items.is_empty());
        assert_eq!(beyond.total_count, 5);
        assert_eq!(beyond.page_count, 3);
    }

    #[test]
    fn zero_page_size_is_treated_as_one() {
        let store = sample_store();
        let page = apply(store.all(), &query(vec![], None, 1, 0));
        assert_eq!(ids(&page), vec![2]);
        assert_eq!(page.page_size, 1);
    }

    #[test]
    fn undefined_values_sort_last() {
        let base = Position {
            symbol: "A".into(),
            net_quantity: 10.0,
            average_cost: Some(5.0),
            realized_pnl: 0.0,
            unrealized_pnl: None,
            total_fees: 0.0,
            trade_count: 1,
            last_activity: parse_timestamp("2024-01-01").unwrap(),
            currency: "USD".into(),
        };
        let positions = vec![
            base.clone(),
            Position {
                symbol: "B".into(),
                unrealized_pnl: Some(-3.0),
                ..base.clone()
            },
            Position {
                symbol: "C".into(),
                unrealized_pnl: Some(7.0),
                ..base
            },
        ];
        for direction in [SortDirection::Ascending, SortDirection::Descending] {
            let sort = Sort {
                key: SortKey::UnrealizedPnl,
                direction,
            };
            let page = apply(&positions, &query(vec![], Some(sort), 0, 10));
            assert_eq!(page.items.last().unwrap().symbol, "A");
        }
    }

    #[test]
    fn position_filters() {
        let base = Position {
            symbol: "A".into(),
            net_quantity: -10.0,
            average_cost: Some(5.0),
            realized_pnl: 0.0,
            unrealized_pnl: None,
            total_fees: 0.0,
            trade_count: 1,
            last_activity: parse_timestamp("2024-01-05").unwrap(),
            currency: "AUD".into(),
        };
        assert!(base.matches(&Filter::Side(Side::Sell)));
        assert!(!base.matches(&Filter::Side(Side::Buy)));
        assert!(base.matches(&Filter::QuantityRange {
            min: Some(10.0),
            max: None
        }));
        assert!(base.matches(&Filter::Currency("aud".into())));
        assert!(!base.matches(&Filter::DateRange {
            from: None,
            to: parse_timestamp("2024-01-04"),
        }));
    }

    #[test]
    fn supported_keys_per_record_type() {
        assert!(Trade::supports(SortKey::Price));
        assert!(!Trade::supports(SortKey::RealizedPnl));
        assert!(Position::supports(SortKey::RealizedPnl));
        assert!(!Position::supports(SortKey::Price));
    }

    #[test]
    fn sort_key_names_round_trip() {
        for key in [SortKey::Id, SortKey::NetQuantity, SortKey::UnrealizedPnl] {
            assert_eq!(SortKey::from_name(key.name()), Some(key));
        }
        assert_eq!(SortKey::from_name("AVG_COST"), Some(SortKey::AverageCost));
        assert_eq!(SortKey::from_name("volume"), None);
    }

    #[test]
    fn predicate_description() {
        let p = Predicate::new(vec![
            Filter::Symbol("BHP".into()),
            Filter::QuantityRange {
                min: Some(10.0),
                max: None,
            },
        ]);
        assert_eq!(p.to_string(), "symbol=BHP AND qty>=10");
        assert_eq!(Predicate::default().to_string(), "none");
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn equal_keys_keep_store_order(
                legs in prop::collection::vec((0u8..3, 1u32..10), 1..30),
                descending in any::<bool>(),
            ) {
                let trades: Vec<Trade> = legs
                    .iter()
                    .enumerate()
                    .map(|(i, &(qty, day))| {
                        let ts = format!("2024-02-{day:02}");
                        trade(i as u64 + 1, "X", Side::Buy, f64::from(qty) + 1.0, 1.0, &ts)
                    })
                    .collect();
                let store = TradeStore::new(trades);
                let direction = if descending {
                    SortDirection::Descending
                } else {
                    SortDirection::Ascending
                };
                let sort = Sort { key: SortKey::Quantity, direction };
                let page = apply(store.all(), &query(vec![], Some(sort), 0, 100));

                let position_in_store = |t: &Trade| {
                    store.all().iter().position(|s| s.id == t.id).unwrap()
                };
                for pair in page.items.windows(2) {
                    if pair[0].quantity == pair[1].quantity {
                        prop_assert!(position_in_store(&pair[0]) < position_in_store(&pair[1]));
                    }
                }
            }
        }
    }
}
