//! Per-target link and archive execution.
//!
//! Linking runs single-threaded per target, after that target's compile
//! phase. Dependency targets contribute their artifacts: static libraries
//! are appended to the object list, shared libraries are referenced through
//! the import library (MSVC) or linker name (POSIX), and interface targets
//! are skipped entirely.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};

use crate::core::language::Language;
use crate::core::target::{Target, TargetKind};
use crate::util::fs::ensure_dir;
use crate::util::process::ProcessBuilder;

use crate::toolchain::{LinkKind, LinkOptions};

use super::BuildSession;

/// A linked build artifact.
#[derive(Debug, Clone)]
pub struct Artifact {
    pub target: String,
    pub path: PathBuf,
    pub size: u64,
}

/// Link `target`, producing its artifact.
///
/// `did_compile` is whether this target rebuilt any unit this run and
/// `deps_changed` whether any dependency target did work; when neither holds
/// and the artifact already exists, the link is skipped.
pub fn link_target(
    session: &BuildSession,
    target: &Target,
    did_compile: bool,
    deps_changed: bool,
) -> Result<Option<Artifact>> {
    // Interface targets only contribute include directories.
    if target.kind() == TargetKind::Interface {
        return Ok(None);
    }

    let output = session
        .artifact_path(target)
        .expect("non-interface target has an artifact");

    if !did_compile && !deps_changed && output.exists() {
        let size = std::fs::metadata(&output).map(|m| m.len()).unwrap_or(0);
        tracing::debug!("link of `{}` is up to date", target.name());
        return Ok(Some(Artifact {
            target: target.name().to_string(),
            path: output,
            size,
        }));
    }

    let options = assemble_link_options(session, target, output.clone())?;
    let command = session.toolchain.link_command(&options);

    let mut builder = ProcessBuilder::new(&command.program)
        .args(command.args.iter())
        .cwd(target.base_dir());
    if let Some(overlay) = session.toolchain.env_overlay() {
        for (key, value) in overlay {
            builder = builder.env(key, value);
        }
    }

    tracing::debug!("linking {}", output.display());
    let result = builder.exec_captured()?;

    if !result.success() {
        bail!(
            "linking failed for `{}` (exit code {})\n  command: {}\n{}",
            target.name(),
            result
                .status_code
                .map(|c| c.to_string())
                .unwrap_or_else(|| "?".into()),
            command.to_line(),
            result.stderr.trim_end()
        );
    }

    let size = std::fs::metadata(&output)
        .with_context(|| format!("linker produced no artifact at {}", output.display()))?
        .len();

    eprintln!(
        "  Linked {} ({} bytes)",
        output
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| output.display().to_string()),
        size
    );

    Ok(Some(Artifact {
        target: target.name().to_string(),
        path: output,
        size,
    }))
}

/// Gather objects, dependency artifacts, and external libraries.
fn assemble_link_options(
    session: &BuildSession,
    target: &Target,
    output: PathBuf,
) -> Result<LinkOptions> {
    if let Some(parent) = output.parent() {
        ensure_dir(parent)?;
    }

    let obj_root = session.obj_dir();
    let obj_ext = session.toolchain.object_extension();

    // Objects that exist on disk for this target's translation units.
    let mut objects: Vec<PathBuf> = target
        .translation_units()
        .map(|u| u.object_path(target.base_dir(), &obj_root, obj_ext))
        .filter(|o| o.exists())
        .collect();

    let mut libraries: Vec<String> = Vec::new();
    let mut lib_dirs: Vec<PathBuf> = Vec::new();
    let mut uses_cpp = target.requires_cpp();

    // Dependency targets in the transitive closure, dependents first, so
    // static archives resolve symbols left to right.
    let closure = session.model.dependency_closure(target.name());
    if !closure.is_empty() {
        lib_dirs.push(session.out_dir.clone());
    }

    for dep in &closure {
        uses_cpp |= dep.requires_cpp();
        match dep.kind() {
            TargetKind::StaticLibrary => {
                if let Some(path) = session.artifact_path(dep) {
                    objects.push(path);
                }
            }
            TargetKind::SharedLibrary => {
                if session.is_msvc() {
                    if let Some(import) = session.import_lib_path(dep) {
                        objects.push(import);
                    }
                } else {
                    let suffix = if session.config.is_debug() { "_d" } else { "" };
                    libraries.push(format!("{}{}", dep.name(), suffix));
                }
            }
            // Interface deps contribute include paths at compile time only;
            // executables cannot be linked against.
            TargetKind::Interface | TargetKind::Executable => {}
        }
    }

    // Names that match no target are external libraries.
    for link in target.links() {
        if session.model.get(link).is_none() && !libraries.contains(link) {
            libraries.push(link.clone());
        }
    }
    for sys in target.sys_links() {
        if !libraries.contains(sys) {
            libraries.push(sys.clone());
        }
    }

    for dir in target.link_dirs() {
        if !lib_dirs.contains(dir) {
            lib_dirs.push(dir.clone());
        }
    }

    let kind = match target.kind() {
        TargetKind::Executable => LinkKind::Executable,
        TargetKind::StaticLibrary => LinkKind::StaticLibrary,
        TargetKind::SharedLibrary => LinkKind::SharedLibrary,
        TargetKind::Interface => unreachable!("interface targets do not link"),
    };

    Ok(LinkOptions {
        objects,
        output,
        kind,
        configuration: session.config,
        driver: if uses_cpp { Language::Cxx } else { Language::C },
        libraries,
        lib_dirs,
        extra_flags: target.linker_flags().to_vec(),
    })
}
