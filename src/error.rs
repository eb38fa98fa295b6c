//! Error taxonomy.
//!
//! Script and model problems surface as [`ConfigError`], toolchain problems
//! as [`ToolchainError`], cache-store problems as [`CacheError`]. Compile
//! and link failures carry their command line and captured streams through
//! `anyhow` context at the point of failure.

use std::path::PathBuf;

use thiserror::Error;

/// Malformed script input or an inconsistent build model.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("duplicate target name `{0}`")]
    DuplicateTarget(String),

    #[error("unknown target kind `{0}` (expected executable, static, shared, or interface)")]
    UnknownKind(String),

    #[error("unknown language standard `{0}`")]
    UnknownLanguage(String),

    #[error("unknown architecture `{0}` (expected x64, x86, or arm64)")]
    UnknownArch(String),

    #[error("unknown platform `{0}` (expected windows, linux, or macos)")]
    UnknownPlatform(String),

    #[error(
        "unknown build configuration `{0}` (expected debug, release, relwithdebinfo, or minsizerel)"
    )]
    UnknownConfiguration(String),

    #[error("unknown toolchain `{0}` (expected msvc, gcc, or clang)")]
    UnknownToolchain(String),

    #[error("unknown include visibility `{0}` (expected private or public)")]
    UnknownVisibility(String),

    #[error("dependency cycle: {}", .0.join(" -> "))]
    Cycle(Vec<String>),

    #[error("build model is frozen; configuration callbacks are no longer accepted")]
    Frozen,

    #[error("{}:{}: {}", .path.display(), .line, .message)]
    Script {
        path: PathBuf,
        line: usize,
        message: String,
    },
}

/// Toolchain detection or environment initialization failure.
#[derive(Debug, Error)]
pub enum ToolchainError {
    #[error(
        "no C/C++ compiler found\n\
         \n\
         lbt requires a compiler toolchain (cl, clang, or gcc).\n\
         Install one, or point `.lbt/toolchain.toml` at an existing installation."
    )]
    NotFound,

    #[error("toolchain environment initialization failed: {0}")]
    EnvInit(String),
}

/// Persistent cache store failure.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
