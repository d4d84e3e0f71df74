use clap::Parser;
use trade_analyzer::cli::{run, Cli};

fn main() -> std::process::ExitCode {
    run(Cli::parse())
}
