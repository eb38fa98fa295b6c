//! MSVC toolchain implementation.

use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::core::language::Language;
use crate::core::model::BuildConfig;

use super::{deps, CommandSpec, CompileOptions, LinkKind, LinkOptions, Toolchain, ToolchainFamily};

/// MSVC toolchain (Windows).
#[derive(Debug, Clone)]
pub struct MsvcToolchain {
    /// Path to cl.exe (compiler)
    pub cl: PathBuf,
    /// Path to lib.exe (librarian)
    pub lib: PathBuf,
    /// Path to link.exe (linker)
    pub link: PathBuf,
    /// Compiler version string
    pub version: String,
    /// vcvarsall.bat to source when the environment is not yet configured
    pub vcvars: Option<PathBuf>,
    /// Captured environment overlay (PATH, INCLUDE, LIB, ...)
    pub env: Option<Vec<(String, String)>>,
}

impl MsvcToolchain {
    pub fn new(cl: PathBuf, lib: PathBuf, link: PathBuf, version: String) -> Self {
        MsvcToolchain {
            cl,
            lib,
            link,
            version,
            vcvars: None,
            env: None,
        }
    }

    /// Set the vcvarsall.bat script used for environment initialization.
    pub fn with_vcvars(mut self, vcvars: PathBuf) -> Self {
        self.vcvars = Some(vcvars);
        self
    }

    /// Set a pre-captured environment overlay.
    pub fn with_env(mut self, env: Vec<(String, String)>) -> Self {
        self.env = Some(env);
        self
    }

    fn configuration_flags(config: BuildConfig) -> &'static [&'static str] {
        match config {
            BuildConfig::Debug => &["/Od", "/Zi", "/D_DEBUG", "/MDd"],
            BuildConfig::Release => &["/O2", "/DNDEBUG", "/MD"],
            BuildConfig::RelWithDebInfo => &["/O2", "/Zi", "/DNDEBUG", "/MD"],
            BuildConfig::MinSizeRel => &["/O1", "/DNDEBUG", "/MD"],
        }
    }
}

impl Toolchain for MsvcToolchain {
    fn family(&self) -> ToolchainFamily {
        ToolchainFamily::Msvc
    }

    fn version(&self) -> &str {
        &self.version
    }

    fn compiler_path(&self) -> &Path {
        &self.cl
    }

    fn linker_path(&self) -> &Path {
        &self.link
    }

    fn archiver_path(&self) -> &Path {
        &self.lib
    }

    fn env_overlay(&self) -> Option<&[(String, String)]> {
        self.env.as_deref()
    }

    fn initialize_environment(&mut self) -> Result<()> {
        if self.env.is_some() {
            return Ok(());
        }
        let Some(vcvars) = self.vcvars.clone() else {
            // Running inside a developer prompt; nothing to capture.
            return Ok(());
        };

        let env = super::detect::capture_vcvars_env(&vcvars)?;

        // Resolve bare tool names against the captured PATH.
        if let Some((_, path_value)) = env.iter().find(|(k, _)| k == "PATH") {
            let (cl, lib, link) = super::detect::find_msvc_tools_in_path(path_value);
            if let Some(cl) = cl {
                self.cl = cl;
            }
            if let Some(lib) = lib {
                self.lib = lib;
            }
            if let Some(link) = link {
                self.link = link;
            }
        }

        self.env = Some(env);
        Ok(())
    }

    fn compile_command(&self, opts: &CompileOptions) -> CommandSpec {
        let mut cmd = CommandSpec::new(&self.cl);

        cmd = cmd.arg("/nologo");
        cmd = cmd.arg("/c");
        cmd = cmd.arg("/utf-8");

        if opts.language == Language::Cxx {
            // Force C++ compilation regardless of extension
            cmd = cmd.arg("/TP");
            cmd = cmd.arg("/EHsc");

            if let Some(std) = opts.cpp_standard {
                cmd = cmd.arg(format!("/std:{}", std.as_msvc_flag_value()));
            }
        } else if let Some(std) = opts.c_standard {
            // cl only accepts /std:c11 and later
            let value = std.as_flag_value();
            if matches!(value, "c11" | "c17" | "c23") {
                cmd = cmd.arg(format!("/std:{}", value));
            }
        }

        cmd = cmd.args(Self::configuration_flags(opts.configuration).iter().copied());

        // /Zi needs a home for the compiler pdb next to the object
        if matches!(
            opts.configuration,
            BuildConfig::Debug | BuildConfig::RelWithDebInfo
        ) {
            cmd = cmd.arg(format!("/Fd{}", opts.object.with_extension("pdb").display()));
        }

        if let Some(pch) = &opts.pch_header {
            cmd = cmd.arg(format!("/FI{}", pch.display()));
        }

        for dir in &opts.include_dirs {
            cmd = cmd.arg(format!("/I{}", dir.display()));
        }

        for define in &opts.defines {
            cmd = cmd.arg(format!("/D{}", define));
        }

        cmd = cmd.args(opts.extra_flags.iter().cloned());

        if opts.generate_deps {
            // Includes are reported on stdout; force English so the parser's
            // marker matches.
            cmd = cmd.arg("/showIncludes");
            cmd = cmd.arg("/English-");
        }

        cmd = cmd.arg(opts.source.display().to_string());
        cmd = cmd.arg(format!("/Fo{}", opts.object.display()));

        cmd
    }

    fn link_command(&self, opts: &LinkOptions) -> CommandSpec {
        if opts.kind == LinkKind::StaticLibrary {
            let mut cmd = CommandSpec::new(&self.lib);
            cmd = cmd.arg("/nologo");
            cmd = cmd.arg(format!("/OUT:{}", opts.output.display()));
            for obj in &opts.objects {
                cmd = cmd.arg(obj.display().to_string());
            }
            return cmd;
        }

        // link.exe drives both C and C++ links
        let mut cmd = CommandSpec::new(&self.link);

        cmd = cmd.arg("/nologo");

        if opts.kind == LinkKind::SharedLibrary {
            cmd = cmd.arg("/DLL");
        }

        if matches!(
            opts.configuration,
            BuildConfig::Debug | BuildConfig::RelWithDebInfo
        ) {
            cmd = cmd.arg("/DEBUG");
        }

        cmd = cmd.arg(format!("/OUT:{}", opts.output.display()));

        for obj in &opts.objects {
            cmd = cmd.arg(obj.display().to_string());
        }

        for dir in &opts.lib_dirs {
            cmd = cmd.arg(format!("/LIBPATH:{}", dir.display()));
        }

        for lib in &opts.libraries {
            cmd = cmd.arg(format!("{}.lib", lib));
        }

        cmd = cmd.args(opts.extra_flags.iter().cloned());

        cmd
    }

    fn parse_header_deps(&self, _opts: &CompileOptions, stdout: &str) -> Result<Vec<PathBuf>> {
        Ok(deps::parse_show_includes(stdout))
    }

    fn object_extension(&self) -> &str {
        "obj"
    }
}
