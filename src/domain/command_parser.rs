//! Line-oriented command language for interactive sessions.
//!
//! One command per line, whitespace-separated tokens, keywords
//! case-insensitive. Errors carry the byte offset of the offending token.
//!
//! ```text
//! filter symbol=BHP side=buy from=2024-01-01 to=2024-03-31 qty>=10 qty<=500 currency=AUD
//! clear
//! sort price desc
//! page 2            (1-based)
//! next | prev
//! select 17 | select BHP
//! back
//! view trades | view positions
//! amend 17 qty=50 price=10.25 fees=1 side=sell symbol=CBA currency=AUD time=2024-01-02
//! undo
//! ```

use crate::domain::error::ParseError;
use crate::domain::query::{Filter, Predicate, Sort, SortDirection, SortKey};
use crate::domain::session::{Command, Selection, ViewKind};
use crate::domain::trade::{parse_timestamp, Side, TradeAmendment, TradeId};

struct Parser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn remaining(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn skip_whitespace(&mut self) {
        let rest = self.remaining();
        self.pos += rest.len() - rest.trim_start().len();
    }

    /// Next whitespace-delimited token and its starting offset.
    fn next_token(&mut self) -> Option<(usize, &'a str)> {
        self.skip_whitespace();
        let rest = self.remaining();
        if rest.is_empty() {
            return None;
        }
        let len = rest.find(char::is_whitespace).unwrap_or(rest.len());
        let start = self.pos;
        self.pos += len;
        Some((start, &rest[..len]))
    }

    fn expect_token(&mut self, what: &str) -> Result<(usize, &'a str), ParseError> {
        let end = self.input.len();
        self.next_token().ok_or_else(|| ParseError {
            message: format!("expected {what}, found end of input"),
            position: end,
        })
    }

    fn expect_end(&mut self) -> Result<(), ParseError> {
        match self.next_token() {
            None => Ok(()),
            Some((pos, token)) => Err(ParseError {
                message: format!("unexpected '{token}'"),
                position: pos,
            }),
        }
    }
}

fn error(message: impl Into<String>, position: usize) -> ParseError {
    ParseError {
        message: message.into(),
        position,
    }
}

/// Parse one command line.
pub fn parse(line: &str) -> Result<Command, ParseError> {
    let mut p = Parser::new(line);
    let (pos, word) = p.expect_token("command")?;

    let command = match word.to_lowercase().as_str() {
        "filter" => Command::SetFilter(parse_predicate(&mut p)?),
        "clear" => Command::ClearFilter,
        "sort" => Command::Sort(parse_sort(&mut p)?),
        "page" => {
            let (at, token) = p.expect_token("page number")?;
            match token.parse::<usize>() {
                Ok(n) if n >= 1 => Command::Page(n - 1),
                _ => return Err(error(format!("invalid page '{token}', pages start at 1"), at)),
            }
        }
        "next" => Command::NextPage,
        "prev" => Command::PrevPage,
        "select" => {
            let (at, token) = p.expect_token("trade id or symbol")?;
            Command::Select(parse_selection(token, at)?)
        }
        "back" => Command::Back,
        "view" => {
            let (at, token) = p.expect_token("'trades' or 'positions'")?;
            match token.to_lowercase().as_str() {
                "trades" => Command::SwitchView(ViewKind::Trades),
                "positions" => Command::SwitchView(ViewKind::Positions),
                _ => return Err(error(format!("unknown view '{token}'"), at)),
            }
        }
        "amend" => parse_amend(&mut p)?,
        "undo" => Command::Undo,
        _ => return Err(error(format!("unknown command '{word}'"), pos)),
    };

    p.expect_end()?;
    Ok(command)
}

/// A bare number is a trade id and anything else a symbol. `symbol=` and
/// `id=` force the choice, e.g. for numeric tickers.
fn parse_selection(token: &str, at: usize) -> Result<Selection, ParseError> {
    if let Some(symbol) = strip_prefix_ci(token, "symbol=") {
        if symbol.is_empty() {
            return Err(error("expected a symbol after 'symbol='", at + token.len()));
        }
        return Ok(Selection::Position(symbol.to_uppercase()));
    }
    if let Some(raw) = strip_prefix_ci(token, "id=") {
        return raw
            .parse::<u64>()
            .map(|id| Selection::Trade(TradeId(id)))
            .map_err(|_| error(format!("invalid trade id '{raw}'"), at + "id=".len()));
    }
    Ok(match token.parse::<u64>() {
        Ok(id) => Selection::Trade(TradeId(id)),
        Err(_) => Selection::Position(token.to_uppercase()),
    })
}

fn parse_predicate(p: &mut Parser<'_>) -> Result<Predicate, ParseError> {
    let mut filters = Vec::new();
    let mut from = None;
    let mut to = None;
    let mut min = None;
    let mut max = None;

    while let Some((at, token)) = p.next_token() {
        if let Some(value) = strip_prefix_ci(token, "qty>=") {
            min = Some(parse_f64(value, at)?);
        } else if let Some(value) = strip_prefix_ci(token, "qty<=") {
            max = Some(parse_f64(value, at)?);
        } else {
            let (field, value) = split_assignment(token, at)?;
            match field.as_str() {
                "symbol" => filters.push(Filter::Symbol(value.to_uppercase())),
                "side" => filters.push(Filter::Side(parse_side(value, at)?)),
                "currency" => filters.push(Filter::Currency(value.to_uppercase())),
                "from" => from = Some(parse_time(value, at)?),
                "to" => to = Some(parse_time(value, at)?),
                _ => return Err(error(format!("unknown filter field '{field}'"), at)),
            }
        }
    }

    if from.is_some() || to.is_some() {
        filters.push(Filter::DateRange { from, to });
    }
    if min.is_some() || max.is_some() {
        filters.push(Filter::QuantityRange { min, max });
    }
    Ok(Predicate::new(filters))
}

fn parse_sort(p: &mut Parser<'_>) -> Result<Sort, ParseError> {
    let (at, name) = p.expect_token("sort key")?;
    let key = SortKey::from_name(name).ok_or_else(|| error(format!("unknown sort key '{name}'"), at))?;

    let direction = match p.next_token() {
        None => SortDirection::Ascending,
        Some((at, dir)) => match dir.to_lowercase().as_str() {
            "asc" => SortDirection::Ascending,
            "desc" => SortDirection::Descending,
            _ => return Err(error(format!("expected 'asc' or 'desc', found '{dir}'"), at)),
        },
    };
    Ok(Sort { key, direction })
}

fn parse_amend(p: &mut Parser<'_>) -> Result<Command, ParseError> {
    let (at, token) = p.expect_token("trade id")?;
    let id = token
        .parse::<u64>()
        .map(TradeId)
        .map_err(|_| error(format!("invalid trade id '{token}'"), at))?;

    let mut amendment = TradeAmendment::default();
    while let Some((at, token)) = p.next_token() {
        let (field, value) = split_assignment(token, at)?;
        match field.as_str() {
            "qty" | "quantity" => amendment.quantity = Some(parse_f64(value, at)?),
            "price" => amendment.price = Some(parse_f64(value, at)?),
            "fees" => amendment.fees = Some(parse_f64(value, at)?),
            "side" => amendment.side = Some(parse_side(value, at)?),
            "symbol" => amendment.symbol = Some(value.to_string()),
            "currency" => amendment.currency = Some(value.to_string()),
            "time" | "timestamp" => amendment.timestamp = Some(parse_time(value, at)?),
            _ => return Err(error(format!("unknown trade field '{field}'"), at)),
        }
    }

    if amendment.is_empty() {
        return Err(error("amend needs at least one field=value", p.input.len()));
    }
    Ok(Command::Amend { id, amendment })
}

fn split_assignment(token: &str, at: usize) -> Result<(String, &str), ParseError> {
    match token.split_once('=') {
        Some((field, value)) if !field.is_empty() && !value.is_empty() => {
            Ok((field.to_lowercase(), value))
        }
        _ => Err(error(format!("expected field=value, found '{token}'"), at)),
    }
}

fn strip_prefix_ci<'t>(token: &'t str, prefix: &str) -> Option<&'t str> {
    let head = token.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix).then(|| &token[prefix.len()..])
}

fn parse_f64(value: &str, at: usize) -> Result<f64, ParseError> {
    value
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| error(format!("invalid number '{value}'"), at))
}

fn parse_side(value: &str, at: usize) -> Result<Side, ParseError> {
    value.parse::<Side>().map_err(|msg| error(msg, at))
}

fn parse_time(value: &str, at: usize) -> Result<chrono::NaiveDateTime, ParseError> {
    parse_timestamp(value).ok_or_else(|| error(format!("invalid date '{value}'"), at))
}
