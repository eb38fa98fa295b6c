//! `lbt build` command

use std::time::Instant;

use anyhow::Result;

use crate::cli::BuildArgs;
use lbt::core::BuildConfig;
use lbt::driver::{BuildOptions, Driver};
use lbt::script::BuildScriptHost;

pub fn execute(args: BuildArgs, verbose: bool) -> Result<()> {
    let start = Instant::now();

    let config = args
        .config
        .as_deref()
        .map(str::parse::<BuildConfig>)
        .transpose()?;

    let opts = BuildOptions {
        config,
        jobs: args.jobs,
        verbose,
    };

    let cwd = std::env::current_dir()?;
    let mut host = BuildScriptHost::new();
    let outcome = Driver::build(&mut host, &cwd, &opts)?;

    eprintln!(
        "Finished {} [{}] in {:.2}s",
        outcome.config.as_dir_name(),
        outcome.out_dir.display(),
        start.elapsed().as_secs_f64()
    );

    Ok(())
}
