//! `lbt run` command

use anyhow::Result;

use crate::cli::RunArgs;
use lbt::core::BuildConfig;
use lbt::driver::{BuildOptions, Driver};
use lbt::script::BuildScriptHost;

pub fn execute(args: RunArgs, verbose: bool) -> Result<()> {
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
    let code = Driver::run(&mut host, &cwd, &opts)?;

    // The child's exit code becomes ours.
    std::process::exit(code);
}
