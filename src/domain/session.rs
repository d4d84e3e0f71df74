//! Session state machine.
//!
//! `transition` maps a query state and a command to the next query state;
//! `render` builds the view for a state against a store snapshot. Both are
//! pure, so any front end can drive a session synchronously.

use std::fmt;

use crate::domain::error::CommandError;
use crate::domain::position::{position_for, positions, Position, PriceMap};
use crate::domain::query::{apply, Predicate, Query, Queryable, Sort};
use crate::domain::store::TradeStore;
use crate::domain::trade::{Trade, TradeAmendment, TradeId};

/// Which record list the session is browsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewKind {
    Trades,
    Positions,
}

impl fmt::Display for ViewKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ViewKind::Trades => f.write_str("trades"),
            ViewKind::Positions => f.write_str("positions"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    Trade(TradeId),
    Position(String),
}

/// The list state a detail view returns to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListMode {
    Browsing,
    Filtered,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Browsing,
    Filtered,
    Detail {
        selection: Selection,
        return_to: ListMode,
    },
}

impl SessionState {
    pub fn name(&self) -> &'static str {
        match self {
            SessionState::Browsing => "Browsing",
            SessionState::Filtered => "Filtered",
            SessionState::Detail { .. } => "Detail",
        }
    }

    fn list_mode(&self) -> ListMode {
        match self {
            SessionState::Browsing => ListMode::Browsing,
            SessionState::Filtered => ListMode::Filtered,
            SessionState::Detail { return_to, .. } => *return_to,
        }
    }
}

impl From<ListMode> for SessionState {
    fn from(mode: ListMode) -> Self {
        match mode {
            ListMode::Browsing => SessionState::Browsing,
            ListMode::Filtered => SessionState::Filtered,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueryState {
    pub state: SessionState,
    pub view: ViewKind,
    pub predicate: Predicate,
    pub sort: Option<Sort>,
    pub page: usize,
    pub page_size: usize,
}

impl QueryState {
    pub fn new(page_size: usize) -> Self {
        Self {
            state: SessionState::Browsing,
            view: ViewKind::Trades,
            predicate: Predicate::default(),
            sort: None,
            page: 0,
            page_size,
        }
    }

    fn query(&self) -> Query {
        Query {
            predicate: self.predicate.clone(),
            sort: self.sort,
            page: self.page,
            page_size: self.page_size,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    SetFilter(Predicate),
    ClearFilter,
    Sort(Sort),
    /// 0-based page index.
    Page(usize),
    NextPage,
    PrevPage,
    Select(Selection),
    Back,
    SwitchView(ViewKind),
    Amend {
        id: TradeId,
        amendment: TradeAmendment,
    },
    Undo,
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::SetFilter(_) => "filter",
            Command::ClearFilter => "clear",
            Command::Sort(_) => "sort",
            Command::Page(_) => "page",
            Command::NextPage => "next",
            Command::PrevPage => "prev",
            Command::Select(_) => "select",
            Command::Back => "back",
            Command::SwitchView(_) => "view",
            Command::Amend { .. } => "amend",
            Command::Undo => "undo",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ViewRows {
    Trades(Vec<Trade>),
    Positions(Vec<Position>),
}

impl ViewRows {
    pub fn len(&self) -> usize {
        match self {
            ViewRows::Trades(rows) => rows.len(),
            ViewRows::Positions(rows) => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DetailView {
    Trade(Trade),
    Position {
        position: Position,
        trades: Vec<Trade>,
    },
}

/// Everything a front end needs to redraw after a command.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderView {
    pub state_name: &'static str,
    pub view: ViewKind,
    pub rows: ViewRows,
    pub total_count: usize,
    pub page: usize,
    pub page_size: usize,
    pub page_count: usize,
    pub filter_description: String,
    pub sort_description: String,
    pub detail: Option<DetailView>,
    pub revision: usize,
}

fn not_allowed(command: &Command, state: &SessionState) -> CommandError {
    CommandError::NotAllowed {
        command: command.name().to_string(),
        state: state.name().to_string(),
    }
}

fn view_supports(view: ViewKind, sort: &Sort) -> bool {
    match view {
        ViewKind::Trades => Trade::supports(sort.key),
        ViewKind::Positions => Position::supports(sort.key),
    }
}

/// Compute the next query state. On error the caller keeps the current one.
///
/// Snapshot commands (`Amend`, `Undo`) only touch the trade history, which the
/// caller owns; here they leave the query state as it is.
pub fn transition(
    current: &QueryState,
    command: &Command,
    store: &TradeStore,
    prices: &PriceMap,
) -> Result<QueryState, CommandError> {
    let mut next = current.clone();
    let in_detail = matches!(current.state, SessionState::Detail { .. });

    match command {
        Command::SetFilter(predicate) => {
            if in_detail {
                return Err(not_allowed(command, &current.state));
            }
            next.state = if predicate.is_empty() {
                SessionState::Browsing
            } else {
                SessionState::Filtered
            };
            next.predicate = predicate.clone();
            next.page = 0;
        }
        Command::ClearFilter => {
            if current.state != SessionState::Filtered {
                return Err(not_allowed(command, &current.state));
            }
            next.state = SessionState::Browsing;
            next.predicate = Predicate::default();
            next.page = 0;
        }
        Command::Sort(sort) => {
            if !view_supports(current.view, sort) {
                return Err(CommandError::InvalidSortKey {
                    key: sort.key.name().to_string(),
                    view: current.view.to_string(),
                });
            }
            next.sort = Some(*sort);
            next.page = 0;
        }
        Command::Page(page) => next.page = *page,
        Command::NextPage => next.page = current.page.saturating_add(1),
        Command::PrevPage => next.page = current.page.saturating_sub(1),
        Command::Select(selection) => {
            match selection {
                Selection::Trade(id) => {
                    if store.by_id(*id).is_none() {
                        return Err(CommandError::UnknownTrade(*id));
                    }
                }
                Selection::Position(symbol) => {
                    if position_for(store, symbol, prices).is_none() {
                        return Err(CommandError::UnknownSymbol(symbol.clone()));
                    }
                }
            }
            next.state = SessionState::Detail {
                selection: selection.clone(),
                return_to: current.state.list_mode(),
            };
        }
        Command::Back => match &current.state {
            SessionState::Detail { return_to, .. } => next.state = (*return_to).into(),
            other => return Err(not_allowed(command, other)),
        },
        Command::SwitchView(view) => {
            if in_detail {
                return Err(not_allowed(command, &current.state));
            }
            next.view = *view;
            next.page = 0;
            if let Some(sort) = &current.sort {
                if !view_supports(*view, sort) {
                    next.sort = None;
                }
            }
        }
        Command::Amend { .. } | Command::Undo => {}
    }

    Ok(next)
}

/// Build the view for `state` against `store`. `revision` is passed through.
pub fn render(state: &QueryState, store: &TradeStore, prices: &PriceMap, revision: usize) -> RenderView {
    let query = state.query();
    let (rows, total_count, page_size, page_count) = match state.view {
        ViewKind::Trades => {
            let page = apply(store.all(), &query);
            (ViewRows::Trades(page.items), page.total_count, page.page_size, page.page_count)
        }
        ViewKind::Positions => {
            let all = positions(store, prices);
            let page = apply(all.values(), &query);
            (ViewRows::Positions(page.items), page.total_count, page.page_size, page.page_count)
        }
    };

    let detail = match &state.state {
        SessionState::Detail { selection, .. } => detail_for(selection, store, prices),
        _ => None,
    };

    RenderView {
        state_name: state.state.name(),
        view: state.view,
        rows,
        total_count,
        page: state.page,
        page_size,
        page_count,
        filter_description: state.predicate.to_string(),
        sort_description: state
            .sort
            .map(|s| s.to_string())
            .unwrap_or_else(|| "default".to_string()),
        detail,
        revision,
    }
}

fn detail_for(selection: &Selection, store: &TradeStore, prices: &PriceMap) -> Option<DetailView> {
    match selection {
        Selection::Trade(id) => store.by_id(*id).cloned().map(DetailView::Trade),
        Selection::Position(symbol) => {
            position_for(store, symbol, prices).map(|position| DetailView::Position {
                position,
                trades: store.by_symbol(symbol).into_iter().cloned().collect(),
            })
        }
    }
}

/// Apply `command` and render the result.
///
/// A rejected command returns the unchanged state, its view, and the error.
pub fn step(
    current: &QueryState,
    command: &Command,
    store: &TradeStore,
    prices: &PriceMap,
    revision: usize,
) -> (QueryState, RenderView, Option<CommandError>) {
    let (next, rejection) = match transition(current, command, store, prices) {
        Ok(next) => (next, None),
        Err(err) => (current.clone(), Some(err)),
    };
    let view = render(&next, store, prices, revision);
    (next, view, rejection)
}

/// Re-check `state` after the store changed underneath it.
///
/// A detail selection that no longer resolves falls back to its list state.
pub fn reconcile(state: &QueryState, store: &TradeStore, prices: &PriceMap) -> QueryState {
    let mut next = state.clone();
    if let SessionState::Detail { selection, return_to } = &state.state {
        if detail_for(selection, store, prices).is_none() {
            next.state = (*return_to).into();
        }
    }
    next
}
