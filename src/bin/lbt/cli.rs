//! CLI definitions using clap.

use clap::{Args, Parser, Subcommand};

/// lbt - a scripted build orchestrator for C/C++
#[derive(Parser)]
#[command(name = "lbt")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build the project (default)
    Build(BuildArgs),

    /// Remove build artifacts and the incremental cache
    Clean(CleanArgs),

    /// Build, then run the first executable target
    Run(RunArgs),

    /// Scaffold a minimal build.cs and src/main.cpp
    Init(InitArgs),
}

impl Default for Commands {
    fn default() -> Self {
        Commands::Build(BuildArgs::default())
    }
}

#[derive(Args, Default)]
pub struct BuildArgs {
    /// Build configuration: debug, release, relwithdebinfo, minsizerel
    #[arg(short, long)]
    pub config: Option<String>,

    /// Number of parallel compile jobs (default: CPU count)
    #[arg(short, long)]
    pub jobs: Option<usize>,
}

#[derive(Args, Default)]
pub struct CleanArgs {}

#[derive(Args, Default)]
pub struct RunArgs {
    /// Build configuration: debug, release, relwithdebinfo, minsizerel
    #[arg(short, long)]
    pub config: Option<String>,

    /// Number of parallel compile jobs (default: CPU count)
    #[arg(short, long)]
    pub jobs: Option<usize>,
}

#[derive(Args, Default)]
pub struct InitArgs {
    /// Project name (default: the directory name)
    #[arg(long)]
    pub name: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_subcommand_is_build() {
        let cli = Cli::parse_from(["lbt"]);
        assert!(cli.command.is_none());
        assert!(matches!(Commands::default(), Commands::Build(_)));
    }

    #[test]
    fn test_build_config_flag() {
        let cli = Cli::parse_from(["lbt", "build", "-c", "release", "-j", "4"]);
        match cli.command {
            Some(Commands::Build(args)) => {
                assert_eq!(args.config.as_deref(), Some("release"));
                assert_eq!(args.jobs, Some(4));
            }
            _ => panic!("expected build subcommand"),
        }
    }

    #[test]
    fn test_global_flags() {
        let cli = Cli::parse_from(["lbt", "-v", "build"]);
        assert!(cli.verbose);

        let cli = Cli::parse_from(["lbt", "clean", "--quiet"]);
        assert!(cli.quiet);
    }
}
