//! `lbt clean` command

use anyhow::Result;

use crate::cli::CleanArgs;
use lbt::driver::Driver;

pub fn execute(_args: CleanArgs) -> Result<()> {
    let cwd = std::env::current_dir()?;
    Driver::clean(&cwd)
}
