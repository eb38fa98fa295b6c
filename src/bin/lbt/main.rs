//! lbt CLI - a scripted build orchestrator for C/C++

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;

use cli::{Cli, Commands};

fn main() {
    if let Err(e) = run() {
        eprintln!("error: {:#}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("lbt=debug")
    } else if cli.quiet {
        EnvFilter::new("lbt=error")
    } else {
        EnvFilter::new("lbt=info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .init();

    // `build` is the default subcommand.
    match cli.command.unwrap_or_default() {
        Commands::Build(args) => commands::build::execute(args, cli.verbose),
        Commands::Clean(args) => commands::clean::execute(args),
        Commands::Run(args) => commands::run::execute(args, cli.verbose),
        Commands::Init(args) => commands::init::execute(args),
    }
}
