//! `lbt init` command

use anyhow::{bail, Result};

use crate::cli::InitArgs;
use lbt::util::fs::write_string;

pub fn execute(args: InitArgs) -> Result<()> {
    let cwd = std::env::current_dir()?;

    let script = cwd.join("build.cs");
    if script.exists() {
        bail!("build.cs already exists in {}", cwd.display());
    }

    let name = args.name.unwrap_or_else(|| {
        cwd.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "app".to_string())
    });

    let build_cs = format!(
        r#"SetProject("{name}")
SetVersion("0.1.0")
SetLanguages("c++17")

Target("{name}", "executable")
AddFiles("src/**/*.cpp")
"#
    );
    write_string(&script, &build_cs)?;

    let main_cpp = r#"#include <iostream>

int main() {
    std::cout << "hello\n";
    return 0;
}
"#;
    let main_path = cwd.join("src").join("main.cpp");
    if !main_path.exists() {
        write_string(&main_path, main_cpp)?;
    }

    eprintln!("  Created build.cs and src/main.cpp for `{}`", name);
    eprintln!("  Run `lbt build` to compile it.");

    Ok(())
}
