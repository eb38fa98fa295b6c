//! Toolchain detection and environment capture.
//!
//! Detection priority:
//! 1. Toolchain config file (`.lbt/toolchain.toml` or `~/.lbt/toolchain.toml`)
//! 2. The project's declared toolchain preference
//! 3. Platform preference order (Windows: MSVC before Clang; elsewhere
//!    Clang before GCC), honoring CC/CXX/AR environment variables

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};

use anyhow::{bail, Result};
use which::which;

use crate::core::model::{Arch, ToolchainPref};
use crate::error::ToolchainError;
use crate::util::config::ToolchainConfig;
use crate::util::process::ProcessBuilder;

use super::{GnuToolchain, MsvcToolchain, Toolchain, ToolchainFamily};

/// Detect the toolchain to build with.
pub fn detect_toolchain(
    preference: Option<ToolchainPref>,
    config: &ToolchainConfig,
) -> Result<Box<dyn Toolchain>> {
    if config.has_overrides() {
        if let Some(toolchain) = try_detect_from_config(config)? {
            return Ok(toolchain);
        }
    }

    if let Some(pref) = preference {
        if let Some(toolchain) = try_detect_family(pref)? {
            return Ok(toolchain);
        }
        tracing::warn!(
            "preferred toolchain not found, falling back to platform defaults"
        );
    }

    let order: &[ToolchainPref] = if cfg!(target_os = "windows") {
        &[ToolchainPref::Msvc, ToolchainPref::Clang]
    } else {
        &[ToolchainPref::Clang, ToolchainPref::Gcc]
    };

    for &family in order {
        if let Some(toolchain) = try_detect_family(family)? {
            return Ok(toolchain);
        }
    }

    Err(ToolchainError::NotFound.into())
}

fn try_detect_family(pref: ToolchainPref) -> Result<Option<Box<dyn Toolchain>>> {
    match pref {
        ToolchainPref::Msvc => try_detect_msvc(),
        ToolchainPref::Gcc => try_detect_gnu(&["gcc", "cc"]),
        ToolchainPref::Clang => try_detect_gnu(&["clang"]),
    }
}

/// Try to create a toolchain from config file settings.
fn try_detect_from_config(config: &ToolchainConfig) -> Result<Option<Box<dyn Toolchain>>> {
    let tc = &config.toolchain;

    let cc = match &tc.cc {
        Some(cc) if cc.exists() => cc.clone(),
        Some(cc) => {
            tracing::warn!("configured C compiler not found: {}", cc.display());
            return Ok(None);
        }
        None => return Ok(None),
    };

    let cxx = tc
        .cxx
        .clone()
        .filter(|p| p.exists())
        .unwrap_or_else(|| GnuToolchain::infer_cxx(&cc));

    let ar = tc
        .ar
        .clone()
        .filter(|p| p.exists())
        .or_else(|| which("ar").ok())
        .or_else(|| which("llvm-ar").ok());

    let Some(ar) = ar else {
        tracing::warn!("archiver (ar) not found");
        return Ok(None);
    };

    let family = detect_compiler_family(&cc);
    let version = compiler_version(&cc).unwrap_or_else(|| "unknown".to_string());

    tracing::info!(
        "using toolchain from config: cc={}, ar={}",
        cc.display(),
        ar.display()
    );

    Ok(Some(Box::new(GnuToolchain::new(cc, cxx, ar, family, version))))
}

/// Try to detect a GCC-style toolchain, preferring the given compiler names.
fn try_detect_gnu(names: &[&str]) -> Result<Option<Box<dyn Toolchain>>> {
    let cc = if let Ok(cc_env) = std::env::var("CC") {
        PathBuf::from(cc_env)
    } else {
        let mut found = None;
        for name in names {
            if let Ok(p) = which(name) {
                found = Some(p);
                break;
            }
        }
        match found {
            Some(p) => p,
            None => return Ok(None),
        }
    };

    let cxx = if let Ok(cxx_env) = std::env::var("CXX") {
        PathBuf::from(cxx_env)
    } else {
        let inferred = GnuToolchain::infer_cxx(&cc);
        if inferred.is_absolute() && !inferred.exists() {
            match which("c++").or_else(|_| which("g++")).or_else(|_| which("clang++")) {
                Ok(p) => p,
                Err(_) => inferred,
            }
        } else {
            inferred
        }
    };

    let ar = if let Ok(ar_env) = std::env::var("AR") {
        PathBuf::from(ar_env)
    } else {
        match which("ar").or_else(|_| which("llvm-ar")) {
            Ok(p) => p,
            Err(_) => return Ok(None),
        }
    };

    let family = detect_compiler_family(&cc);
    let version = compiler_version(&cc).unwrap_or_else(|| "unknown".to_string());

    Ok(Some(Box::new(GnuToolchain::new(cc, cxx, ar, family, version))))
}

/// Try to detect the MSVC toolchain.
fn try_detect_msvc() -> Result<Option<Box<dyn Toolchain>>> {
    if !cfg!(target_os = "windows") {
        return Ok(None);
    }

    // Already inside a developer command prompt?
    if let Ok(cl) = which("cl") {
        if std::env::var("INCLUDE").is_ok() && std::env::var("LIB").is_ok() {
            let lib = which("lib")
                .map_err(|_| anyhow::anyhow!("cl.exe found but lib.exe not in PATH"))?;
            let link = which("link")
                .map_err(|_| anyhow::anyhow!("cl.exe found but link.exe not in PATH"))?;
            let version = msvc_version(&cl).unwrap_or_else(|| "unknown".to_string());
            return Ok(Some(Box::new(MsvcToolchain::new(cl, lib, link, version))));
        }
    }

    // Locate Visual Studio via vswhere and defer environment capture.
    let Some(vswhere) = find_vswhere() else {
        tracing::debug!("vswhere.exe not found, cannot auto-detect MSVC");
        return Ok(None);
    };

    let output = ProcessBuilder::new(&vswhere)
        .args([
            "-latest",
            "-requires",
            "Microsoft.VisualStudio.Component.VC.Tools.x86.x64",
            "-property",
            "installationPath",
            "-format",
            "value",
        ])
        .exec();

    let vs_path = match output {
        Ok(out) if out.status.success() => {
            let path = String::from_utf8_lossy(&out.stdout).trim().to_string();
            if path.is_empty() {
                return Ok(None);
            }
            PathBuf::from(path)
        }
        _ => return Ok(None),
    };

    let vcvarsall = vs_path
        .join("VC")
        .join("Auxiliary")
        .join("Build")
        .join("vcvarsall.bat");
    if !vcvarsall.exists() {
        tracing::debug!("vcvarsall.bat not found at: {}", vcvarsall.display());
        return Ok(None);
    }

    tracing::info!("found Visual Studio at {}", vs_path.display());

    // Tool paths become absolute once the environment is captured.
    let toolchain = MsvcToolchain::new(
        PathBuf::from("cl"),
        PathBuf::from("lib"),
        PathBuf::from("link"),
        "unknown".to_string(),
    )
    .with_vcvars(vcvarsall);

    Ok(Some(Box::new(toolchain)))
}

/// Capture the environment produced by vcvarsall.bat for the host
/// architecture. Results are cached per (script path, arch) for the process
/// lifetime.
pub fn capture_vcvars_env(vcvars: &Path) -> Result<Vec<(String, String)>> {
    static CACHE: OnceLock<Mutex<HashMap<(PathBuf, String), Vec<(String, String)>>>> =
        OnceLock::new();

    let arch = match Arch::host() {
        Arch::X64 => "x64",
        Arch::X86 => "x86",
        Arch::Arm64 => "arm64",
    };

    let cache = CACHE.get_or_init(|| Mutex::new(HashMap::new()));
    let key = (vcvars.to_path_buf(), arch.to_string());

    if let Some(env) = cache.lock().expect("vcvars cache poisoned").get(&key) {
        return Ok(env.clone());
    }

    // A temp batch file avoids cmd.exe quoting pitfalls.
    let temp_batch = std::env::temp_dir().join("lbt_vcvars.bat");
    let batch_content = format!(
        "@echo off\r\ncall \"{}\" {} >nul 2>&1\r\nif errorlevel 1 exit /b 1\r\nset\r\n",
        vcvars.display(),
        arch
    );
    std::fs::write(&temp_batch, &batch_content)?;

    let output = ProcessBuilder::new("cmd")
        .args(["/c", &temp_batch.display().to_string()])
        .exec();
    let _ = std::fs::remove_file(&temp_batch);

    let dump = match output {
        Ok(out) if out.status.success() => String::from_utf8_lossy(&out.stdout).to_string(),
        Ok(out) => bail!(ToolchainError::EnvInit(
            String::from_utf8_lossy(&out.stderr).to_string()
        )),
        Err(e) => bail!(ToolchainError::EnvInit(e.to_string())),
    };

    let mut all_vars: HashMap<String, String> = HashMap::new();
    for line in dump.lines() {
        if let Some((key, value)) = line.split_once('=') {
            all_vars.insert(key.to_uppercase(), value.to_string());
        }
    }

    // The child processes need these verbatim.
    const IMPORTANT: &[&str] = &[
        "PATH",
        "INCLUDE",
        "LIB",
        "LIBPATH",
        "WindowsSdkDir",
        "VCToolsInstallDir",
    ];
    let captured: Vec<(String, String)> = IMPORTANT
        .iter()
        .filter_map(|&k| all_vars.get(&k.to_uppercase()).map(|v| (k.to_string(), v.clone())))
        .collect();

    if captured.iter().all(|(k, _)| k != "PATH") {
        bail!(ToolchainError::EnvInit(
            "vcvarsall.bat produced no PATH".to_string()
        ));
    }

    cache
        .lock()
        .expect("vcvars cache poisoned")
        .insert(key, captured.clone());
    Ok(captured)
}

/// Find MSVC tools (cl.exe, lib.exe, link.exe) in a PATH string.
pub fn find_msvc_tools_in_path(path: &str) -> (Option<PathBuf>, Option<PathBuf>, Option<PathBuf>) {
    let mut cl = None;
    let mut lib = None;
    let mut link = None;

    for dir in std::env::split_paths(path) {
        if !dir.exists() {
            continue;
        }
        if cl.is_none() && dir.join("cl.exe").exists() {
            cl = Some(dir.join("cl.exe"));
        }
        if lib.is_none() && dir.join("lib.exe").exists() {
            lib = Some(dir.join("lib.exe"));
        }
        if link.is_none() && dir.join("link.exe").exists() {
            link = Some(dir.join("link.exe"));
        }
        if cl.is_some() && lib.is_some() && link.is_some() {
            break;
        }
    }

    (cl, lib, link)
}

fn find_vswhere() -> Option<PathBuf> {
    let program_files_x86 = std::env::var("ProgramFiles(x86)")
        .unwrap_or_else(|_| "C:\\Program Files (x86)".to_string());

    let standard_path = PathBuf::from(&program_files_x86)
        .join("Microsoft Visual Studio")
        .join("Installer")
        .join("vswhere.exe");

    if standard_path.exists() {
        return Some(standard_path);
    }

    which("vswhere").ok()
}

/// Detect whether the compiler is GCC, Clang, or Apple Clang.
fn detect_compiler_family(cc: &Path) -> ToolchainFamily {
    let name = cc
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("")
        .to_lowercase();

    if name.contains("clang") {
        return detect_clang_variant(cc);
    } else if name.contains("gcc") || name.contains("g++") {
        return ToolchainFamily::Gcc;
    }

    if let Ok(output) = ProcessBuilder::new(cc).arg("--version").exec() {
        let stdout = String::from_utf8_lossy(&output.stdout).to_lowercase();
        if stdout.contains("clang") {
            return detect_clang_variant(cc);
        } else if stdout.contains("gcc") || stdout.contains("free software foundation") {
            return ToolchainFamily::Gcc;
        }
    }

    ToolchainFamily::Gcc
}

fn detect_clang_variant(cc: &Path) -> ToolchainFamily {
    if let Ok(output) = ProcessBuilder::new(cc).arg("--version").exec() {
        let stdout = String::from_utf8_lossy(&output.stdout).to_lowercase();
        if stdout.contains("apple") {
            return ToolchainFamily::AppleClang;
        }
    }
    ToolchainFamily::Clang
}

/// Extract "major.minor" from `--version` output.
fn compiler_version(cc: &Path) -> Option<String> {
    let output = ProcessBuilder::new(cc).arg("--version").exec().ok()?;
    parse_version_output(&String::from_utf8_lossy(&output.stdout))
}

/// cl.exe reports its version on stderr when run without arguments.
fn msvc_version(cl: &Path) -> Option<String> {
    let output = ProcessBuilder::new(cl).exec().ok()?;
    parse_version_output(&String::from_utf8_lossy(&output.stderr))
}

fn parse_version_output(text: &str) -> Option<String> {
    for line in text.lines() {
        for word in line.split_whitespace() {
            if word.chars().next()?.is_ascii_digit() {
                let parts: Vec<&str> = word.split('.').collect();
                if parts.len() >= 2 && parts[..2].iter().all(|p| !p.is_empty()) {
                    return Some(format!("{}.{}", parts[0], parts[1]));
                }
            }
        }
    }
    None
}
