//! Session facade.
//!
//! A [`SessionHandle`] owns the trade history, the query state and the
//! diagnostic sink. [`dispatch`] is the only way to change any of them.

use std::collections::BTreeMap;

use crate::adapters::csv_adapter::CsvTradeSource;
use crate::domain::aggregate::{aggregate, Aggregate, GroupBy, GroupKey};
use crate::domain::config::AnalyzerConfig;
use crate::domain::error::{AnalyzerError, CommandError, LoadWarning};
use crate::domain::history::SnapshotHistory;
use crate::domain::loader::load;
use crate::domain::position::{positions, Position, PriceMap};
use crate::domain::session::{reconcile, render, step, Command, QueryState, RenderView};
use crate::domain::store::TradeStore;
use crate::domain::summary::PerformanceSummary;
use crate::ports::diagnostic_port::{DiagnosticEvent, DiagnosticLevel, DiagnosticSink};
use crate::ports::trade_source_port::TradeSourcePort;

pub struct SessionHandle {
    config: AnalyzerConfig,
    history: SnapshotHistory,
    state: QueryState,
    sink: Box<dyn DiagnosticSink>,
    load_warnings: Vec<LoadWarning>,
}

impl SessionHandle {
    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    pub fn state(&self) -> &QueryState {
        &self.state
    }

    /// The current snapshot.
    pub fn store(&self) -> &TradeStore {
        self.history.current()
    }

    /// The store as loaded, before any amendment.
    pub fn original(&self) -> &TradeStore {
        self.history.original()
    }

    pub fn revision(&self) -> usize {
        self.history.revision()
    }

    pub fn prices(&self) -> &PriceMap {
        &self.config.prices
    }

    pub fn load_warnings(&self) -> &[LoadWarning] {
        &self.load_warnings
    }

    /// Render the current state without changing it.
    pub fn view(&self) -> RenderView {
        render(&self.state, self.store(), self.prices(), self.revision())
    }
}

/// Read-only analytics over the current snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalyticsSnapshot {
    pub revision: usize,
    pub positions: BTreeMap<String, Position>,
    pub by_symbol: BTreeMap<GroupKey, Aggregate>,
    pub by_side: BTreeMap<GroupKey, Aggregate>,
    pub by_bucket: BTreeMap<GroupKey, Aggregate>,
    pub summary: PerformanceSummary,
}

/// Load `config.source_path` as CSV and open a session over it.
pub fn start_session(
    config: AnalyzerConfig,
    sink: Box<dyn DiagnosticSink>,
) -> Result<SessionHandle, AnalyzerError> {
    let source = CsvTradeSource::new(&config.source_path);
    start_session_with_source(config, &source, sink)
}

pub fn start_session_with_source(
    config: AnalyzerConfig,
    source: &dyn TradeSourcePort,
    sink: Box<dyn DiagnosticSink>,
) -> Result<SessionHandle, AnalyzerError> {
    let description = source.describe();

    let outcome = source
        .read_rows()
        .and_then(|rows| {
            let row_count = rows.len();
            load(rows, &config.default_currency).map(|outcome| (row_count, outcome))
        })
        .inspect_err(|err| {
            sink.emit(
                DiagnosticEvent::new(DiagnosticLevel::Error, "trade source failed to load")
                    .with("source", &description)
                    .with("reason", err),
            );
        })?;
    let (row_count, outcome) = outcome;

    for warning in &outcome.warnings {
        sink.emit(
            DiagnosticEvent::new(DiagnosticLevel::Warn, "row rejected")
                .with("row_index", warning.row_index)
                .with("reason", &warning.reason),
        );
    }
    let store = TradeStore::new(outcome.trades);
    sink.emit(
        DiagnosticEvent::new(DiagnosticLevel::Info, "trades loaded")
            .with("source", &description)
            .with("rows", row_count)
            .with("trades", store.len())
            .with("symbols", store.symbols().count())
            .with("warnings", outcome.warnings.len()),
    );

    Ok(SessionHandle {
        state: QueryState::new(config.page_size),
        config,
        history: SnapshotHistory::new(store),
        sink,
        load_warnings: outcome.warnings,
    })
}

/// Apply one command and return the view to draw.
///
/// Rejected commands leave the session as it was; the rejection goes to the
/// sink and the returned view reflects the unchanged state.
pub fn dispatch(handle: &mut SessionHandle, command: Command) -> RenderView {
    let rejection = match &command {
        Command::Amend { id, amendment } => handle
            .history
            .amend(*id, amendment)
            .map(|()| after_snapshot_change(handle))
            .err(),
        Command::Undo => handle
            .history
            .undo()
            .map(|()| after_snapshot_change(handle))
            .err(),
        _ => {
            let (next, _, rejection) = step(
                &handle.state,
                &command,
                handle.history.current(),
                &handle.config.prices,
                handle.history.revision(),
            );
            handle.state = next;
            rejection
        }
    };

    report(handle, &command, rejection.as_ref());
    handle.view()
}

fn after_snapshot_change(handle: &mut SessionHandle) {
    handle.state = reconcile(&handle.state, handle.history.current(), &handle.config.prices);
}

fn report(handle: &SessionHandle, command: &Command, rejection: Option<&CommandError>) {
    let event = match rejection {
        Some(err) => DiagnosticEvent::new(DiagnosticLevel::Warn, "command rejected")
            .with("command", command.name())
            .with("state", handle.state.state.name())
            .with("reason", err),
        None => DiagnosticEvent::new(DiagnosticLevel::Debug, "command applied")
            .with("command", command.name())
            .with("state", handle.state.state.name())
            .with("revision", handle.revision()),
    };
    handle.sink.emit(event);
}

pub fn snapshot_analytics(handle: &SessionHandle) -> AnalyticsSnapshot {
    let store = handle.store();
    AnalyticsSnapshot {
        revision: handle.revision(),
        positions: positions(store, handle.prices()),
        by_symbol: aggregate(store, GroupBy::Symbol),
        by_side: aggregate(store, GroupBy::Side),
        by_bucket: aggregate(store, GroupBy::TimeBucket(handle.config.aggregate_bucket)),
        summary: PerformanceSummary::compute(store),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::log_sink::MemorySink;
    use crate::domain::error::LoadError;
    use crate::domain::loader::RawTradeRow;
    use crate::domain::session::{SessionState, ViewKind};
    use crate::domain::trade::{TradeAmendment, TradeId};

    struct Rows(Vec<RawTradeRow>);

    impl TradeSourcePort for Rows {
        fn read_rows(&self) -> Result<Vec<RawTradeRow>, LoadError> {
            Ok(self.0.clone())
        }

        fn describe(&self) -> String {
            "memory".to_string()
        }
    }

    fn row(symbol: &str, side: &str, qty: &str, price: &str, ts: &str) -> RawTradeRow {
        RawTradeRow {
            symbol: Some(symbol.into()),
            side: Some(side.into()),
            quantity: Some(qty.into()),
            price: Some(price.into()),
            timestamp: Some(ts.into()),
            ..Default::default()
        }
    }

    fn open(rows: Vec<RawTradeRow>) -> (SessionHandle, MemorySink) {
        let sink = MemorySink::new();
        let handle = start_session_with_source(
            AnalyzerConfig::new("memory.csv"),
            &Rows(rows),
            Box::new(sink.clone()),
        )
        .unwrap();
        (handle, sink)
    }

    #[test]
    fn load_reports_warnings_and_summary() {
        let (handle, sink) = open(vec![
            row("BHP", "buy", "100", "10", "2024-01-01"),
            row("BHP", "buy", "0", "10", "2024-01-02"),
        ]);

        assert_eq!(handle.store().len(), 1);
        assert_eq!(handle.load_warnings().len(), 1);
        let warns = sink.at_level(DiagnosticLevel::Warn);
        assert_eq!(warns.len(), 1);
        assert_eq!(warns[0].context_value("row_index"), Some("1"));
        let info = sink.at_level(DiagnosticLevel::Info);
        assert_eq!(info[0].context_value("trades"), Some("1"));
        assert_eq!(info[0].context_value("warnings"), Some("1"));
    }

    #[test]
    fn fatal_load_error_is_reported() {
        let sink = MemorySink::new();
        let result = start_session_with_source(
            AnalyzerConfig::new("memory.csv"),
            &Rows(vec![row("BHP", "hold", "1", "1", "2024-01-01")]),
            Box::new(sink.clone()),
        );
        assert!(matches!(
            result,
            Err(AnalyzerError::Load(LoadError::NoValidRows { rows: 1 }))
        ));
        assert_eq!(sink.at_level(DiagnosticLevel::Error).len(), 1);
    }

    #[test]
    fn rejected_command_keeps_state() {
        let (mut handle, sink) = open(vec![row("BHP", "buy", "1", "1", "2024-01-01")]);
        let before = handle.state().clone();

        let view = dispatch(&mut handle, Command::Back);

        assert_eq!(handle.state(), &before);
        assert_eq!(view.state_name, "Browsing");
        let warn = &sink.at_level(DiagnosticLevel::Warn)[0];
        assert_eq!(warn.context_value("command"), Some("back"));
    }

    #[test]
    fn amend_and_undo_through_dispatch() {
        let (mut handle, sink) = open(vec![
            row("BHP", "buy", "100", "10", "2024-01-01"),
            row("BHP", "sell", "40", "15", "2024-01-02"),
        ]);
        let amend = Command::Amend {
            id: TradeId(2),
            amendment: TradeAmendment {
                price: Some(20.0),
                ..Default::default()
            },
        };

        let view = dispatch(&mut handle, amend);
        assert_eq!(view.revision, 1);
        assert_eq!(snapshot_analytics(&handle).positions["BHP"].realized_pnl, 400.0);
        assert_eq!(handle.original().by_id(TradeId(2)).unwrap().price, 15.0);

        let view = dispatch(&mut handle, Command::Undo);
        assert_eq!(view.revision, 0);
        assert_eq!(snapshot_analytics(&handle).positions["BHP"].realized_pnl, 200.0);

        dispatch(&mut handle, Command::Undo);
        let last = sink.events().pop().unwrap();
        assert_eq!(last.level, DiagnosticLevel::Warn);
        assert_eq!(last.context_value("command"), Some("undo"));
    }

    #[test]
    fn amend_that_removes_selected_symbol_returns_to_list() {
        let (mut handle, _sink) = open(vec![
            row("BHP", "buy", "100", "10", "2024-01-01"),
            row("CBA", "buy", "5", "90", "2024-01-02"),
        ]);
        dispatch(&mut handle, Command::SwitchView(ViewKind::Positions));
        dispatch(
            &mut handle,
            Command::Select(crate::domain::session::Selection::Position("CBA".into())),
        );
        let view = dispatch(
            &mut handle,
            Command::Amend {
                id: TradeId(2),
                amendment: TradeAmendment {
                    symbol: Some("BHP".into()),
                    ..Default::default()
                },
            },
        );
        assert_eq!(handle.state().state, SessionState::Browsing);
        assert!(view.detail.is_none());
        assert_eq!(view.total_count, 1);
    }

    #[test]
    fn snapshot_covers_every_grouping() {
        let (handle, _sink) = open(vec![
            row("BHP", "buy", "100", "10", "2024-01-01"),
            row("CBA", "sell", "5", "90", "2024-01-02"),
        ]);
        let snapshot = snapshot_analytics(&handle);
        assert_eq!(snapshot.positions.len(), 2);
        assert_eq!(snapshot.by_symbol.len(), 2);
        assert_eq!(snapshot.by_side.len(), 2);
        assert_eq!(snapshot.by_bucket.len(), 2);
        assert_eq!(snapshot.summary.trade_count, 2);
        assert_eq!(snapshot, snapshot_analytics(&handle));
    }
}
