mod catalog;
mod cli;
mod config;
mod manifest;
mod operation;
mod paths;
mod pipeline;
mod staging;
mod store;
mod workflow;
mod zeropoints;

use anyhow::Result;
use clap::Parser;
use cli::{Command, RootArgs};
use tracing_subscriber::EnvFilter;

const LOG_ENV: &str = "OBPIPE_LOG";

fn main() -> Result<()> {
    let args = RootArgs::parse();
    init_tracing(args.global.verbose);

    match &args.command {
        Command::Setup(cmd) => workflow::run_setup(&args.global, cmd),
        Command::Plan(cmd) => workflow::run_plan(&args.global, cmd),
        Command::Reduce(cmd) => workflow::run_reduce(&args.global, cmd),
        Command::Step(cmd) => workflow::run_step(&args.global, cmd),
        Command::Zeropoints(cmd) => workflow::run_zeropoints(&args.global, cmd),
        Command::Config(_) => workflow::run_config(&args.global),
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
