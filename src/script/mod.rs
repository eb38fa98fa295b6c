//! Minimal `build.cs` evaluator.
//!
//! The driver talks to scripting through the [`ScriptHost`] trait; this
//! module is the reference host. It evaluates one callback statement per
//! line (`Callback("arg", ...)`), understands `//` comments, and resolves
//! `Include("subdir")` by recursing into `<subdir>/build.cs` with that
//! directory as the base for relative paths. Anything richer than the
//! documented callbacks is rejected.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::core::model::BuildModel;
use crate::core::target::Visibility;
use crate::driver::ScriptHost;
use crate::error::ConfigError;

/// The reference scripting host.
#[derive(Debug, Default)]
pub struct BuildScriptHost;

impl BuildScriptHost {
    pub fn new() -> Self {
        BuildScriptHost
    }
}

impl ScriptHost for BuildScriptHost {
    fn evaluate(&mut self, model: &mut BuildModel, script: &Path) -> Result<()> {
        eval_script(model, script)
    }
}

fn eval_script(model: &mut BuildModel, script: &Path) -> Result<()> {
    let text = std::fs::read_to_string(script)
        .with_context(|| format!("failed to read build script: {}", script.display()))?;

    let dir = script
        .parent()
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."));
    // Targets carry absolute base directories.
    let dir = dir.canonicalize().unwrap_or(dir);

    // The most recently declared target receives target-scoped callbacks.
    // Each included script gets its own scope.
    let mut current: Option<String> = None;

    for (idx, raw) in text.lines().enumerate() {
        let line_no = idx + 1;

        let script_err = |message: String| ConfigError::Script {
            path: script.to_path_buf(),
            line: line_no,
            message,
        };

        let Some((callback, args)) = parse_statement(raw).map_err(&script_err)? else {
            continue;
        };

        let at = || format!("{}:{}", script.display(), line_no);

        match callback.as_str() {
            // ---- global callbacks ----
            "SetProject" => {
                let name = single_arg(&callback, &args).map_err(&script_err)?;
                model.set_project(name).with_context(at)?;
            }
            "SetVersion" => {
                let version = single_arg(&callback, &args).map_err(&script_err)?;
                model.set_version(version).with_context(at)?;
            }
            "SetLanguages" => {
                at_least_one(&callback, &args).map_err(&script_err)?;
                model.set_languages(&args).with_context(at)?;
            }
            "AddDefines" => {
                at_least_one(&callback, &args).map_err(&script_err)?;
                model.add_defines(&args).with_context(at)?;
            }
            "SetArch" => {
                let arch = single_arg(&callback, &args).map_err(&script_err)?;
                model.set_arch(&arch).with_context(at)?;
            }
            "SetPlat" => {
                let plat = single_arg(&callback, &args).map_err(&script_err)?;
                model.set_platform(&plat).with_context(at)?;
            }
            "SetToolchains" => {
                at_least_one(&callback, &args).map_err(&script_err)?;
                model.set_toolchain_preference(&args[0]).with_context(at)?;
            }
            "AddRules" => {
                at_least_one(&callback, &args).map_err(&script_err)?;
                model.add_rules(&args).with_context(at)?;
            }
            "Include" => {
                let subdir = single_arg(&callback, &args).map_err(&script_err)?;
                let included = dir.join(&subdir).join("build.cs");
                if !included.is_file() {
                    return Err(script_err(format!(
                        "Include(\"{}\"): no build.cs at {}",
                        subdir,
                        included.display()
                    ))
                    .into());
                }
                eval_script(model, &included)?;
            }
            "Target" => {
                at_least_one(&callback, &args).map_err(&script_err)?;
                let name = args[0].clone();
                let target = model.target(name.clone(), dir.clone()).with_context(at)?;
                if let Some(kind) = args.get(1) {
                    target.set_kind(kind.parse().map_err(|e: ConfigError| {
                        anyhow::Error::from(e).context(at())
                    })?);
                }
                current = Some(name);
            }

            // ---- target-scoped callbacks ----
            "SetKind" | "AddFiles" | "AddIncludeDir" | "ExportIncludeDir" | "AddDefine"
            | "AddDeps" | "AddLinks" | "AddSysLinks" | "AddLinkDir" | "AddCompilerFlags"
            | "AddLinkerFlags" | "SetPchHeader" => {
                let Some(name) = current.clone() else {
                    return Err(script_err(format!(
                        "{} requires a Target(...) declaration first",
                        callback
                    ))
                    .into());
                };
                let target = model
                    .target_mut(&name)
                    .expect("current target exists in model");

                match callback.as_str() {
                    "SetKind" => {
                        let kind = single_arg(&callback, &args).map_err(&script_err)?;
                        target.set_kind(kind.parse().map_err(|e: ConfigError| {
                            anyhow::Error::from(e).context(at())
                        })?);
                    }
                    "AddFiles" => {
                        at_least_one(&callback, &args).map_err(&script_err)?;
                        target.add_files(&args).with_context(at)?;
                    }
                    "AddIncludeDir" => {
                        if args.len() < 2 {
                            return Err(script_err(
                                "AddIncludeDir expects (visibility, dir, ...)".to_string(),
                            )
                            .into());
                        }
                        let visibility: Visibility =
                            args[0].parse().map_err(|e: ConfigError| {
                                anyhow::Error::from(e).context(at())
                            })?;
                        for d in &args[1..] {
                            target.add_include_dir(visibility, d);
                        }
                    }
                    "ExportIncludeDir" => {
                        at_least_one(&callback, &args).map_err(&script_err)?;
                        for d in &args {
                            target.export_include_dir(d);
                        }
                    }
                    "AddDefine" => {
                        at_least_one(&callback, &args).map_err(&script_err)?;
                        for d in &args {
                            target.add_define(d.clone());
                        }
                    }
                    "AddDeps" => {
                        at_least_one(&callback, &args).map_err(&script_err)?;
                        target.add_deps(&args);
                    }
                    "AddLinks" => {
                        at_least_one(&callback, &args).map_err(&script_err)?;
                        target.add_links(&args);
                    }
                    "AddSysLinks" => {
                        at_least_one(&callback, &args).map_err(&script_err)?;
                        target.add_sys_links(&args);
                    }
                    "AddLinkDir" => {
                        at_least_one(&callback, &args).map_err(&script_err)?;
                        for d in &args {
                            target.add_link_dir(d);
                        }
                    }
                    "AddCompilerFlags" => {
                        at_least_one(&callback, &args).map_err(&script_err)?;
                        target.add_compiler_flags(&args);
                    }
                    "AddLinkerFlags" => {
                        at_least_one(&callback, &args).map_err(&script_err)?;
                        target.add_linker_flags(&args);
                    }
                    "SetPchHeader" => {
                        let header = single_arg(&callback, &args).map_err(&script_err)?;
                        target.set_pch_header(header);
                    }
                    _ => unreachable!(),
                }
            }

            other => {
                return Err(script_err(format!("unknown callback `{}`", other)).into());
            }
        }
    }

    Ok(())
}

fn single_arg(callback: &str, args: &[String]) -> Result<String, String> {
    if args.len() == 1 {
        Ok(args[0].clone())
    } else {
        Err(format!(
            "{} expects exactly one argument, got {}",
            callback,
            args.len()
        ))
    }
}

fn at_least_one(callback: &str, args: &[String]) -> Result<(), String> {
    if args.is_empty() {
        Err(format!("{} expects at least one argument", callback))
    } else {
        Ok(())
    }
}

/// Parse one statement line: `Ident("arg", "arg", ...)` with an optional
/// trailing semicolon or `//` comment. Returns `None` for blank and
/// comment-only lines.
fn parse_statement(line: &str) -> Result<Option<(String, Vec<String>)>, String> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with("//") {
        return Ok(None);
    }

    let bytes = trimmed.as_bytes();
    let mut pos = 0;

    // Identifier
    while pos < bytes.len() && (bytes[pos].is_ascii_alphanumeric() || bytes[pos] == b'_') {
        pos += 1;
    }
    if pos == 0 {
        return Err(format!("expected a callback name, found `{}`", trimmed));
    }
    let ident = trimmed[..pos].to_string();

    let rest = trimmed[pos..].trim_start();
    let Some(rest) = rest.strip_prefix('(') else {
        return Err(format!("expected `(` after `{}`", ident));
    };

    let mut args = Vec::new();
    let mut chars = rest.chars().peekable();

    loop {
        // Skip whitespace
        while matches!(chars.peek(), Some(c) if c.is_whitespace()) {
            chars.next();
        }

        match chars.peek() {
            Some(')') => {
                chars.next();
                break;
            }
            Some('"') => {
                chars.next();
                let mut value = String::new();
                loop {
                    match chars.next() {
                        Some('\\') => match chars.next() {
                            Some('"') => value.push('"'),
                            Some('\\') => value.push('\\'),
                            Some(other) => {
                                value.push('\\');
                                value.push(other);
                            }
                            None => return Err("unterminated string literal".to_string()),
                        },
                        Some('"') => break,
                        Some(c) => value.push(c),
                        None => return Err("unterminated string literal".to_string()),
                    }
                }
                args.push(value);

                // Skip whitespace, then expect `,` or `)`
                while matches!(chars.peek(), Some(c) if c.is_whitespace()) {
                    chars.next();
                }
                match chars.peek() {
                    Some(',') => {
                        chars.next();
                    }
                    Some(')') => {}
                    _ => return Err("expected `,` or `)` after argument".to_string()),
                }
            }
            _ => return Err("expected a string literal or `)`".to_string()),
        }
    }

    // Optional semicolon and trailing comment
    let tail: String = chars.collect();
    let tail = tail.trim();
    let tail = tail.strip_prefix(';').map(str::trim).unwrap_or(tail);
    if !tail.is_empty() && !tail.starts_with("//") {
        return Err(format!("unexpected trailing input `{}`", tail));
    }

    Ok(Some((ident, args)))
}
