//! CLI definition and dispatch.

use clap::{Parser, Subcommand, ValueEnum};
use log::LevelFilter;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::log_sink::LogSink;
use crate::domain::aggregate::{Aggregate, Bucket, GroupKey};
use crate::domain::command_parser;
use crate::domain::config::AnalyzerConfig;
use crate::domain::error::AnalyzerError;
use crate::domain::position::Position;
use crate::domain::session::{DetailView, RenderView, ViewRows};
use crate::domain::summary::PerformanceSummary;
use crate::domain::trade::Trade;
use crate::engine::{self, SessionHandle};

#[derive(Parser, Debug)]
#[command(name = "trade-analyzer", about = "Trade history analysis and browsing")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Browse trades and positions interactively (commands on stdin)
    Browse {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        source: Option<PathBuf>,
        #[arg(long)]
        page_size: Option<usize>,
        /// Current price, SYMBOL=PRICE; repeatable
        #[arg(long = "price", value_parser = parse_price)]
        prices: Vec<(String, f64)>,
    },
    /// Print positions and the performance summary
    Positions {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        source: Option<PathBuf>,
        #[arg(long = "price", value_parser = parse_price)]
        prices: Vec<(String, f64)>,
    },
    /// Print grouped trade totals
    Aggregate {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        source: Option<PathBuf>,
        #[arg(long, value_enum)]
        by: AggregateBy,
        /// Bucket width for --by bucket, e.g. 1d, 4h, 1w, month
        #[arg(long, value_parser = parse_bucket)]
        bucket: Option<Bucket>,
    },
    /// Check the configuration and load the trade source
    Validate {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        source: Option<PathBuf>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum AggregateBy {
    Symbol,
    Side,
    Bucket,
}

/// Command-line values that take precedence over the INI file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub source: Option<PathBuf>,
    pub page_size: Option<usize>,
    pub prices: Vec<(String, f64)>,
    pub bucket: Option<Bucket>,
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Browse {
            config,
            source,
            page_size,
            prices,
        } => {
            let overrides = Overrides {
                source,
                page_size,
                prices,
                bucket: None,
            };
            let stdin = io::stdin();
            let stdout = io::stdout();
            run_browse(&config, &overrides, stdin.lock(), stdout.lock())
        }
        Command::Positions {
            config,
            source,
            prices,
        } => {
            let overrides = Overrides {
                source,
                prices,
                ..Default::default()
            };
            run_positions(&config, &overrides, io::stdout().lock())
        }
        Command::Aggregate {
            config,
            source,
            by,
            bucket,
        } => {
            let overrides = Overrides {
                source,
                bucket,
                ..Default::default()
            };
            run_aggregate(&config, &overrides, by, io::stdout().lock())
        }
        Command::Validate { config, source } => {
            let overrides = Overrides {
                source,
                ..Default::default()
            };
            run_validate(&config, &overrides)
        }
    }
}

pub fn parse_price(value: &str) -> Result<(String, f64), String> {
    let (symbol, price) = value
        .split_once('=')
        .ok_or_else(|| format!("expected SYMBOL=PRICE, got '{value}'"))?;
    let symbol = symbol.trim().to_uppercase();
    if symbol.is_empty() {
        return Err(format!("missing symbol in '{value}'"));
    }
    let price: f64 = price
        .trim()
        .parse()
        .map_err(|_| format!("invalid price in '{value}'"))?;
    if !price.is_finite() || price <= 0.0 {
        return Err(format!("price must be positive in '{value}'"));
    }
    Ok((symbol, price))
}

pub fn parse_bucket(value: &str) -> Result<Bucket, String> {
    value.parse()
}

/// Read the INI at `config_path` and apply `overrides`.
///
/// A relative source path in the INI is taken relative to the INI's directory;
/// a `--source` override is used as given.
pub fn build_config(config_path: &Path, overrides: &Overrides) -> Result<AnalyzerConfig, AnalyzerError> {
    let adapter = FileConfigAdapter::from_file(config_path)?;
    let mut config = AnalyzerConfig::from_port(&adapter)?;

    if config.source_path.is_relative() {
        if let Some(dir) = config_path.parent() {
            config.source_path = dir.join(&config.source_path);
        }
    }
    if let Some(source) = &overrides.source {
        config.source_path = source.clone();
    }
    if let Some(page_size) = overrides.page_size {
        if page_size == 0 {
            return Err(AnalyzerError::ConfigInvalid {
                section: "session".to_string(),
                key: "page_size".to_string(),
                reason: "page_size must be a positive integer".to_string(),
            });
        }
        config.page_size = page_size;
    }
    for (symbol, price) in &overrides.prices {
        config.prices.insert(symbol.clone(), *price);
    }
    if let Some(bucket) = overrides.bucket {
        config.aggregate_bucket = bucket;
    }
    Ok(config)
}

/// Install the global logger. `RUST_LOG` wins over the configured level.
fn init_logging(level: LevelFilter) {
    let _ = env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .try_init();
}

fn open_session(config_path: &Path, overrides: &Overrides) -> Result<SessionHandle, AnalyzerError> {
    let config = build_config(config_path, overrides)?;
    init_logging(config.log_level);
    log::info!("loading trades from {}", config.source_path.display());
    let sink = Box::new(LogSink::new(config.log_level));
    engine::start_session(config, sink)
}

fn fail(err: &AnalyzerError) -> ExitCode {
    eprintln!("error: {err}");
    err.into()
}

pub fn run_browse<R: BufRead, W: Write>(
    config_path: &Path,
    overrides: &Overrides,
    input: R,
    mut output: W,
) -> ExitCode {
    let mut handle = match open_session(config_path, overrides) {
        Ok(h) => h,
        Err(e) => return fail(&e),
    };
    finish(run_session(&mut handle, input, &mut output))
}

fn finish(written: io::Result<()>) -> ExitCode {
    match written {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => fail(&AnalyzerError::Io(e)),
    }
}

const HELP: &str = "\
commands:
  filter [symbol=S] [side=buy|sell] [currency=C] [from=DATE] [to=DATE] [qty>=N] [qty<=N]
  clear
  sort <key> [asc|desc]
  page <n> | next | prev
  select <trade id|symbol> | select symbol=<s> | select id=<n> | back
  view trades|positions
  amend <id> field=value...   (qty, price, fees, side, symbol, currency, time)
  undo
  help | quit";

/// Drive a session from line input until `quit`, `exit` or end of input.
pub fn run_session<R: BufRead, W: Write>(
    handle: &mut SessionHandle,
    input: R,
    output: &mut W,
) -> io::Result<()> {
    writeln!(output, "{}", format_view(&handle.view()))?;

    for line in input.lines() {
        let line = line?;
        let trimmed = line.trim();
        match trimmed {
            "" => continue,
            "quit" | "exit" => break,
            "help" => {
                writeln!(output, "{HELP}")?;
                continue;
            }
            _ => {}
        }
        match command_parser::parse(trimmed) {
            Ok(command) => {
                let view = engine::dispatch(handle, command);
                writeln!(output, "{}", format_view(&view))?;
            }
            Err(e) => writeln!(output, "{}", e.display_with_context(trimmed))?,
        }
    }

    if handle.revision() > 0 {
        let amended = handle
            .store()
            .all()
            .iter()
            .filter(|t| handle.original().by_id(t.id) != Some(*t))
            .count();
        writeln!(
            output,
            "{amended} trade(s) differ from the loaded source at rev {}",
            handle.revision()
        )?;
    }
    Ok(())
}

pub fn run_positions<W: Write>(config_path: &Path, overrides: &Overrides, mut output: W) -> ExitCode {
    let handle = match open_session(config_path, overrides) {
        Ok(h) => h,
        Err(e) => return fail(&e),
    };
    let snapshot = engine::snapshot_analytics(&handle);
    let positions: Vec<Position> = snapshot.positions.into_values().collect();
    finish(writeln!(
        output,
        "{}\n\n{}",
        format_positions(&positions),
        format_summary(&snapshot.summary)
    ))
}

pub fn run_aggregate<W: Write>(
    config_path: &Path,
    overrides: &Overrides,
    by: AggregateBy,
    mut output: W,
) -> ExitCode {
    let handle = match open_session(config_path, overrides) {
        Ok(h) => h,
        Err(e) => return fail(&e),
    };
    let snapshot = engine::snapshot_analytics(&handle);
    let (title, groups) = match by {
        AggregateBy::Symbol => ("symbol".to_string(), snapshot.by_symbol),
        AggregateBy::Side => ("side".to_string(), snapshot.by_side),
        AggregateBy::Bucket => {
            let bucket = handle.config().aggregate_bucket;
            (format!("bucket ({bucket})"), snapshot.by_bucket)
        }
    };
    finish(writeln!(output, "{}", format_aggregates(&title, &groups)))
}

pub fn run_validate(config_path: &Path, overrides: &Overrides) -> ExitCode {
    eprintln!("Loading config from {}", config_path.display());
    let handle = match open_session(config_path, overrides) {
        Ok(h) => h,
        Err(e) => return fail(&e),
    };
    eprintln!("Config validated successfully");

    let warnings = handle.load_warnings();
    println!(
        "{}: {} trades, {} symbols, {} warnings",
        handle.config().source_path.display(),
        handle.store().len(),
        handle.store().symbols().count(),
        warnings.len()
    );
    for warning in warnings {
        println!("  {warning}");
    }
    ExitCode::SUCCESS
}

fn opt(value: Option<f64>) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| format!("{v:.2}"))
}

pub fn format_view(view: &RenderView) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "[{}] {}  page {}/{}  ({} records)  filter: {}  sort: {}  rev {}",
        view.state_name,
        view.view,
        view.page + 1,
        view.page_count.max(1),
        view.total_count,
        view.filter_description,
        view.sort_description,
        view.revision
    );

    match &view.detail {
        Some(DetailView::Trade(trade)) => out.push_str(&format_trade_detail(trade)),
        Some(DetailView::Position { position, trades }) => {
            out.push_str(&format_positions(std::slice::from_ref(position)));
            out.push('\n');
            out.push_str(&format_trades(trades));
        }
        None => match &view.rows {
            ViewRows::Trades(trades) => out.push_str(&format_trades(trades)),
            ViewRows::Positions(positions) => out.push_str(&format_positions(positions)),
        },
    }
    out
}

pub fn format_trades(trades: &[Trade]) -> String {
    let mut out = format!(
        "{:>5}  {:<19}  {:<8}  {:<4}  {:>12}  {:>12}  {:>10}  {}",
        "ID", "TIME", "SYMBOL", "SIDE", "QTY", "PRICE", "FEES", "CCY"
    );
    for t in trades {
        let _ = write!(
            out,
            "\n{:>5}  {:<19}  {:<8}  {:<4}  {:>12.2}  {:>12.4}  {:>10.2}  {}",
            t.id.0,
            t.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
            t.symbol,
            t.side.as_str(),
            t.quantity,
            t.price,
            t.fees,
            t.currency
        );
    }
    out
}

fn format_trade_detail(t: &Trade) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "trade      {}", t.id);
    if let Some(external) = &t.external_ref {
        let _ = writeln!(out, "reference  {external}");
    }
    let _ = writeln!(out, "symbol     {}", t.symbol);
    let _ = writeln!(out, "side       {}", t.side);
    let _ = writeln!(out, "quantity   {:.2}", t.quantity);
    let _ = writeln!(out, "price      {:.4}", t.price);
    let _ = writeln!(out, "notional   {:.2}", t.notional());
    let _ = writeln!(out, "fees       {:.2}", t.fees);
    let _ = writeln!(out, "time       {}", t.timestamp.format("%Y-%m-%d %H:%M:%S"));
    let _ = writeln!(out, "currency   {}", t.currency);
    let _ = write!(out, "revision   {}", t.revision);
    out
}

pub fn format_positions(positions: &[Position]) -> String {
    let mut out = format!(
        "{:<8}  {:>12}  {:>12}  {:>12}  {:>12}  {:>12}  {:>10}  {:>6}",
        "SYMBOL", "NET", "AVG COST", "REALIZED", "UNREALIZED", "TOTAL", "FEES", "TRADES"
    );
    for p in positions {
        let _ = write!(
            out,
            "\n{:<8}  {:>12.2}  {:>12}  {:>12.2}  {:>12}  {:>12}  {:>10.2}  {:>6}",
            p.symbol,
            p.net_quantity,
            opt(p.average_cost),
            p.realized_pnl,
            opt(p.unrealized_pnl),
            opt(p.total_pnl()),
            p.total_fees,
            p.trade_count
        );
    }
    out
}

pub fn format_summary(s: &PerformanceSummary) -> String {
    let mut out = String::from("=== Summary ===");
    let _ = write!(out, "\nTrades:           {}", s.trade_count);
    let _ = write!(out, "\nSymbols:          {}", s.symbol_count);
    let _ = write!(out, "\nGross Notional:   {:.2}", s.gross_notional);
    let _ = write!(out, "\nTotal Fees:       {:.2}", s.total_fees);
    let _ = write!(out, "\nRealized P&L:     {:.2}", s.realized_pnl);
    let _ = write!(out, "\nClosing Trades:   {}", s.closing_trades);
    let _ = write!(out, "\nWin Rate:         {:.1}%", s.win_rate * 100.0);
    let _ = write!(out, "\nLargest Win:      {:.2}", s.largest_win);
    let _ = write!(out, "\nLargest Loss:     {:.2}", s.largest_loss);
    let _ = write!(out, "\nMax Drawdown:     {:.2}", s.max_drawdown);
    out
}

pub fn format_aggregates(title: &str, groups: &BTreeMap<GroupKey, Aggregate>) -> String {
    let mut out = format!(
        "{:<16}  {:>6}  {:>12}  {:>12}  {:>14}  {:>10}",
        title.to_uppercase(),
        "TRADES",
        "QTY",
        "NET QTY",
        "NOTIONAL",
        "FEES"
    );
    for (key, agg) in groups {
        let _ = write!(
            out,
            "\n{:<16}  {:>6}  {:>12.2}  {:>12.2}  {:>14.2}  {:>10.2}",
            key.to_string(),
            agg.trade_count,
            agg.total_quantity,
            agg.net_quantity,
            agg.total_notional,
            agg.total_fees
        );
    }
    out
}

