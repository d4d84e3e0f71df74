#![allow(dead_code)]

use std::io::Write;
use std::path::PathBuf;

use tempfile::TempDir;
use trade_analyzer::adapters::log_sink::MemorySink;
use trade_analyzer::domain::config::AnalyzerConfig;
use trade_analyzer::domain::error::LoadError;
pub use trade_analyzer::domain::loader::RawTradeRow;
use trade_analyzer::engine::{start_session_with_source, SessionHandle};
use trade_analyzer::ports::trade_source_port::TradeSourcePort;

/// In-memory trade source.
pub struct MockTradeSource {
    pub rows: Vec<RawTradeRow>,
    pub error: Option<LoadError>,
}

impl MockTradeSource {
    pub fn new() -> Self {
        Self {
            rows: Vec::new(),
            error: None,
        }
    }

    pub fn with_row(mut self, row: RawTradeRow) -> Self {
        self.rows.push(row);
        self
    }

    pub fn with_rows(mut self, rows: impl IntoIterator<Item = RawTradeRow>) -> Self {
        self.rows.extend(rows);
        self
    }

    pub fn with_error(mut self, error: LoadError) -> Self {
        self.error = Some(error);
        self
    }
}

impl TradeSourcePort for MockTradeSource {
    fn read_rows(&self) -> Result<Vec<RawTradeRow>, LoadError> {
        match &self.error {
            Some(err) => Err(err.clone()),
            None => Ok(self.rows.clone()),
        }
    }

    fn describe(&self) -> String {
        "mock".to_string()
    }
}

pub fn make_row(symbol: &str, side: &str, qty: &str, price: &str, ts: &str) -> RawTradeRow {
    RawTradeRow {
        symbol: Some(symbol.to_string()),
        side: Some(side.to_string()),
        quantity: Some(qty.to_string()),
        price: Some(price.to_string()),
        timestamp: Some(ts.to_string()),
        ..Default::default()
    }
}

pub fn with_fees(row: RawTradeRow, fees: &str) -> RawTradeRow {
    RawTradeRow {
        fees: Some(fees.to_string()),
        ..row
    }
}

/// A small multi-symbol book: BHP round trip, CBA long, WBC short.
pub fn sample_rows() -> Vec<RawTradeRow> {
    vec![
        make_row("BHP", "buy", "100", "10", "2024-01-02 10:00:00"),
        make_row("CBA", "buy", "10", "100", "2024-01-02 11:00:00"),
        make_row("BHP", "sell", "40", "15", "2024-01-03 10:00:00"),
        make_row("WBC", "sell", "50", "20", "2024-01-04 10:00:00"),
        make_row("CBA", "buy", "10", "110", "2024-01-05 10:00:00"),
        make_row("BHP", "sell", "60", "12", "2024-01-08 10:00:00"),
        make_row("WBC", "buy", "20", "18", "2024-01-09 10:00:00"),
    ]
}

pub fn open_session(rows: Vec<RawTradeRow>, page_size: usize) -> (SessionHandle, MemorySink) {
    let mut config = AnalyzerConfig::new("mock.csv");
    config.page_size = page_size;
    open_session_with(config, rows)
}

pub fn open_session_with(
    config: AnalyzerConfig,
    rows: Vec<RawTradeRow>,
) -> (SessionHandle, MemorySink) {
    let sink = MemorySink::new();
    let source = MockTradeSource::new().with_rows(rows);
    let handle = start_session_with_source(config, &source, Box::new(sink.clone()))
        .expect("session should start");
    (handle, sink)
}

pub const TRADES_CSV: &str = "\
id,symbol,side,quantity,price,fees,timestamp,currency
A1,BHP,buy,100,10,1.00,2024-01-02T10:00:00,AUD
A2,CBA,buy,10,100,1.00,2024-01-02T11:00:00,AUD
A3,BHP,sell,40,15,1.00,2024-01-03T10:00:00,AUD
A4,BHP,buy,0,15,0,2024-01-03T11:00:00,AUD
A5,CBA,sell,5,120,1.00,2024-01-04T10:00:00,AUD
";

/// Write `trades.csv` and `analyzer.ini` into a fresh directory.
pub fn write_fixture(csv: &str, ini: &str) -> (TempDir, PathBuf) {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("trades.csv"), csv).unwrap();
    let ini_path = dir.path().join("analyzer.ini");
    let mut file = std::fs::File::create(&ini_path).unwrap();
    file.write_all(ini.as_bytes()).unwrap();
    (dir, ini_path)
}
