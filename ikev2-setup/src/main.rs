use anyhow::Result;
use clap::Parser;
use tracing::Level;

mod check_cmd;
mod cli;
mod patch_cmd;
mod provision_cmd;
mod render_cmd;

use cli::{Cli, Command};

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::Provision(args) => provision_cmd::run_provision(args),
        Command::Patch(args) => patch_cmd::run_patch(args),
        Command::Check(args) => check_cmd::run_check(args),
        Command::Render(args) => render_cmd::run_render(args),
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        _ => Level::DEBUG,
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(level)
        .with_target(false)
        .init();
}
