//! Toolchain abstraction for C/C++ compilers.
//!
//! This module provides a unified interface for generating compiler, linker,
//! and archiver commands across compiler families (GCC, Clang, MSVC), plus
//! detection and header-dependency capture.

use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::core::language::{CStandard, CppStandard, Language};
use crate::core::model::BuildConfig;

pub mod deps;
mod detect;
mod gcc;
mod msvc;

pub use detect::detect_toolchain;
pub use gcc::GnuToolchain;
pub use msvc::MsvcToolchain;

/// The family of a toolchain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolchainFamily {
    /// GCC (GNU Compiler Collection)
    Gcc,
    /// Clang/LLVM
    Clang,
    /// Apple Clang (macOS)
    AppleClang,
    /// Microsoft Visual C++
    Msvc,
}

impl ToolchainFamily {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolchainFamily::Gcc => "gcc",
            ToolchainFamily::Clang => "clang",
            ToolchainFamily::AppleClang => "apple-clang",
            ToolchainFamily::Msvc => "msvc",
        }
    }
}

/// A command to execute, with program, arguments, and environment.
#[derive(Debug, Clone)]
pub struct CommandSpec {
    /// The program to run (e.g., "g++", "cl.exe")
    pub program: PathBuf,
    /// Command arguments
    pub args: Vec<String>,
    /// Environment variables to set
    pub env: Vec<(String, String)>,
}

impl CommandSpec {
    /// Create a new command spec.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        CommandSpec {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
        }
    }

    /// Add an argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Add multiple arguments.
    pub fn args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.args.extend(args.into_iter().map(|a| a.into()));
        self
    }

    /// The full command line as a single string; doubles as the cache's
    /// args-string.
    pub fn to_line(&self) -> String {
        let mut parts = vec![self.program.display().to_string()];
        parts.extend(self.args.iter().cloned());
        parts.join(" ")
    }
}

/// Input for a compile step.
#[derive(Debug, Clone)]
pub struct CompileOptions {
    /// Source file to compile
    pub source: PathBuf,
    /// Output object file
    pub object: PathBuf,
    /// Source language
    pub language: Language,
    /// Active build configuration
    pub configuration: BuildConfig,
    /// C standard, if the project declares one
    pub c_standard: Option<CStandard>,
    /// C++ standard, if the project declares one
    pub cpp_standard: Option<CppStandard>,
    /// Include directories
    pub include_dirs: Vec<PathBuf>,
    /// Preprocessor defines ("NAME" or "NAME=VALUE")
    pub defines: Vec<String>,
    /// Additional compiler flags
    pub extra_flags: Vec<String>,
    /// Force-included precompiled header
    pub pch_header: Option<PathBuf>,
    /// Compile position-independent code (objects for shared libraries)
    pub pic: bool,
    /// Emit header-dependency information
    pub generate_deps: bool,
    /// Dependency file path for variants that write one (.d)
    pub dep_file: Option<PathBuf>,
}

/// What a link step produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkKind {
    Executable,
    StaticLibrary,
    SharedLibrary,
}

/// Input for a link or archive step.
#[derive(Debug, Clone)]
pub struct LinkOptions {
    /// Object files (and directly linked library artifacts) to combine
    pub objects: Vec<PathBuf>,
    /// Output file
    pub output: PathBuf,
    /// Kind of artifact to produce
    pub kind: LinkKind,
    /// Active build configuration
    pub configuration: BuildConfig,
    /// Linker driver language (C++ pulls in the C++ runtime)
    pub driver: Language,
    /// Libraries to link by name (no prefix/extension)
    pub libraries: Vec<String>,
    /// Library search paths
    pub lib_dirs: Vec<PathBuf>,
    /// Additional linker flags
    pub extra_flags: Vec<String>,
}

/// Trait for toolchain implementations.
///
/// Each variant knows how to emit commands for its compiler family and how
/// to recover header dependencies from a finished compile.
pub trait Toolchain: Send + Sync {
    /// The toolchain family.
    fn family(&self) -> ToolchainFamily;

    /// The compiler version string.
    fn version(&self) -> &str;

    /// Stable identifier used as the cache's toolchain-id.
    fn id(&self) -> String {
        format!("{}-{}", self.family().as_str(), self.version())
    }

    /// The compiler executable.
    fn compiler_path(&self) -> &Path;

    /// The linker executable.
    fn linker_path(&self) -> &Path;

    /// The archiver executable.
    fn archiver_path(&self) -> &Path;

    /// Environment overlay applied to every spawned process, if the variant
    /// needs one (MSVC's captured vcvars environment).
    fn env_overlay(&self) -> Option<&[(String, String)]> {
        None
    }

    /// Capture whatever environment the variant needs to run. Called once
    /// after detection; a failure is reported as a warning, not an abort.
    fn initialize_environment(&mut self) -> Result<()> {
        Ok(())
    }

    /// Generate a compile command.
    fn compile_command(&self, opts: &CompileOptions) -> CommandSpec;

    /// Generate a link command. Static libraries produce an archiver
    /// invocation instead of a linker one.
    fn link_command(&self, opts: &LinkOptions) -> CommandSpec;

    /// Recover the header dependencies of a finished compile from the
    /// variant's channel (a `.d` file or compiler stdout). Deduplicated,
    /// first-seen order.
    fn parse_header_deps(&self, opts: &CompileOptions, stdout: &str) -> Result<Vec<PathBuf>>;

    /// Object file extension ("o" or "obj").
    fn object_extension(&self) -> &str;
}
