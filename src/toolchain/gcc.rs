//! GCC/Clang toolchain implementation.

use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::core::language::Language;
use crate::core::model::BuildConfig;

use super::{deps, CommandSpec, CompileOptions, LinkKind, LinkOptions, Toolchain, ToolchainFamily};

/// GCC-style toolchain (gcc, clang, apple-clang).
#[derive(Debug, Clone)]
pub struct GnuToolchain {
    /// Path to the C compiler
    pub cc: PathBuf,
    /// Path to the C++ compiler
    pub cxx: PathBuf,
    /// Path to the archiver
    pub ar: PathBuf,
    /// Compiler family (gcc, clang, apple-clang)
    pub family: ToolchainFamily,
    /// Compiler version string
    pub version: String,
}

impl GnuToolchain {
    pub fn new(
        cc: PathBuf,
        cxx: PathBuf,
        ar: PathBuf,
        family: ToolchainFamily,
        version: String,
    ) -> Self {
        GnuToolchain {
            cc,
            cxx,
            ar,
            family,
            version,
        }
    }

    /// Infer the C++ compiler path from the C compiler path.
    ///
    /// Handles common patterns:
    /// - gcc, x86_64-linux-gnu-gcc -> g++, x86_64-linux-gnu-g++
    /// - clang -> clang++
    /// - cc, /usr/bin/cc -> c++, /usr/bin/c++
    pub fn infer_cxx(cc: &Path) -> PathBuf {
        let cc_str = cc.to_string_lossy();

        if cc_str.ends_with("gcc") {
            return PathBuf::from(format!("{}++", &cc_str[..cc_str.len() - 2]));
        }

        if cc_str.ends_with("clang") {
            return PathBuf::from(format!("{}++", cc_str));
        }

        // Only match "cc" when it's a complete basename (not "mycc")
        let is_standalone_cc = cc_str == "cc"
            || cc_str.ends_with("/cc")
            || cc_str.ends_with("\\cc")
            || cc_str.ends_with("-cc");

        if is_standalone_cc {
            return PathBuf::from(format!("{}++", &cc_str[..cc_str.len() - 1]));
        }

        PathBuf::from(format!("{}++", cc_str))
    }

    fn configuration_flags(config: BuildConfig) -> &'static [&'static str] {
        match config {
            BuildConfig::Debug => &["-O0", "-g", "-D_DEBUG"],
            BuildConfig::Release => &["-O3", "-DNDEBUG"],
            BuildConfig::RelWithDebInfo => &["-O2", "-g", "-DNDEBUG"],
            BuildConfig::MinSizeRel => &["-Os", "-DNDEBUG"],
        }
    }
}

impl Toolchain for GnuToolchain {
    fn family(&self) -> ToolchainFamily {
        self.family
    }

    fn version(&self) -> &str {
        &self.version
    }

    fn compiler_path(&self) -> &Path {
        &self.cc
    }

    fn linker_path(&self) -> &Path {
        // The compiler driver performs linking
        &self.cc
    }

    fn archiver_path(&self) -> &Path {
        &self.ar
    }

    fn compile_command(&self, opts: &CompileOptions) -> CommandSpec {
        let compiler = match opts.language {
            Language::C => &self.cc,
            Language::Cxx => &self.cxx,
        };

        let mut cmd = CommandSpec::new(compiler);

        cmd = cmd.arg("-c");

        match opts.language {
            Language::C => {
                if let Some(std) = opts.c_standard {
                    cmd = cmd.arg(format!("-std={}", std.as_flag_value()));
                }
            }
            Language::Cxx => {
                if let Some(std) = opts.cpp_standard {
                    cmd = cmd.arg(format!("-std={}", std.as_flag_value()));
                }
            }
        }

        cmd = cmd.args(Self::configuration_flags(opts.configuration).iter().copied());

        // Clang assumes UTF-8; gcc needs to be told
        if self.family == ToolchainFamily::Gcc {
            cmd = cmd.arg("-finput-charset=UTF-8");
        }

        if opts.pic {
            cmd = cmd.arg("-fPIC");
        }

        if let Some(pch) = &opts.pch_header {
            cmd = cmd.arg("-include").arg(pch.display().to_string());
        }

        for dir in &opts.include_dirs {
            cmd = cmd.arg(format!("-I{}", dir.display()));
        }

        for define in &opts.defines {
            cmd = cmd.arg(format!("-D{}", define));
        }

        cmd = cmd.args(opts.extra_flags.iter().cloned());

        if opts.generate_deps {
            if let Some(dep_file) = &opts.dep_file {
                cmd = cmd.arg("-MMD");
                cmd = cmd.arg(format!("-MF{}", dep_file.display()));
            }
        }

        cmd = cmd.arg(opts.source.display().to_string());
        cmd = cmd.arg("-o");
        cmd = cmd.arg(opts.object.display().to_string());

        cmd
    }

    fn link_command(&self, opts: &LinkOptions) -> CommandSpec {
        if opts.kind == LinkKind::StaticLibrary {
            // Create archive with symbol index, replace members
            let mut cmd = CommandSpec::new(&self.ar).arg("rcs");
            cmd = cmd.arg(opts.output.display().to_string());
            for obj in &opts.objects {
                cmd = cmd.arg(obj.display().to_string());
            }
            return cmd;
        }

        let linker = match opts.driver {
            Language::C => &self.cc,
            Language::Cxx => &self.cxx,
        };

        let mut cmd = CommandSpec::new(linker);

        if opts.kind == LinkKind::SharedLibrary {
            cmd = cmd.arg("-shared");
            cmd = cmd.arg("-fPIC");
        }

        cmd = cmd.arg("-o");
        cmd = cmd.arg(opts.output.display().to_string());

        for obj in &opts.objects {
            cmd = cmd.arg(obj.display().to_string());
        }

        for dir in &opts.lib_dirs {
            cmd = cmd.arg(format!("-L{}", dir.display()));
        }

        for lib in &opts.libraries {
            cmd = cmd.arg(format!("-l{}", lib));
        }

        cmd = cmd.args(opts.extra_flags.iter().cloned());

        cmd
    }

    fn parse_header_deps(&self, opts: &CompileOptions, _stdout: &str) -> Result<Vec<PathBuf>> {
        let Some(dep_file) = &opts.dep_file else {
            return Ok(Vec::new());
        };
        if !dep_file.exists() {
            return Ok(Vec::new());
        }

        let content = std::fs::read_to_string(dep_file)?;
        Ok(deps::parse_make_deps(&content))
    }

    fn object_extension(&self) -> &str {
        "o"
    }
}
