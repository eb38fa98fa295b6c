//! The build model: global settings plus the named target set.
//!
//! The model is an explicit value populated through script callbacks and
//! frozen before the dependency graph reads it. The scripting host is the
//! only writer.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::core::language::{CStandard, CppStandard, LanguageStandard};
use crate::core::target::{Target, TargetKind};
use crate::error::ConfigError;

/// Build configuration. Exactly one is active per invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BuildConfig {
    #[default]
    Debug,
    Release,
    RelWithDebInfo,
    MinSizeRel,
}

impl BuildConfig {
    /// Directory name under `build/`.
    pub fn as_dir_name(&self) -> &'static str {
        match self {
            BuildConfig::Debug => "debug",
            BuildConfig::Release => "release",
            BuildConfig::RelWithDebInfo => "relwithdebinfo",
            BuildConfig::MinSizeRel => "minsizerel",
        }
    }

    pub fn is_debug(&self) -> bool {
        matches!(self, BuildConfig::Debug)
    }
}

impl FromStr for BuildConfig {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "debug" => Ok(BuildConfig::Debug),
            "release" => Ok(BuildConfig::Release),
            "relwithdebinfo" => Ok(BuildConfig::RelWithDebInfo),
            "minsizerel" => Ok(BuildConfig::MinSizeRel),
            _ => Err(ConfigError::UnknownConfiguration(s.to_string())),
        }
    }
}

/// Target architecture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arch {
    X64,
    X86,
    Arm64,
}

impl Arch {
    pub fn host() -> Arch {
        match std::env::consts::ARCH {
            "x86" => Arch::X86,
            "aarch64" => Arch::Arm64,
            _ => Arch::X64,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Arch::X64 => "x64",
            Arch::X86 => "x86",
            Arch::Arm64 => "arm64",
        }
    }
}

impl FromStr for Arch {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "x64" | "x86_64" | "amd64" => Ok(Arch::X64),
            "x86" | "i386" | "i686" => Ok(Arch::X86),
            "arm64" | "aarch64" => Ok(Arch::Arm64),
            _ => Err(ConfigError::UnknownArch(s.to_string())),
        }
    }
}

/// Target platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Windows,
    Linux,
    MacOs,
}

impl Platform {
    pub fn host() -> Platform {
        match std::env::consts::OS {
            "windows" => Platform::Windows,
            "macos" => Platform::MacOs,
            _ => Platform::Linux,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Windows => "windows",
            Platform::Linux => "linux",
            Platform::MacOs => "macos",
        }
    }
}

impl FromStr for Platform {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "windows" | "win" | "win32" | "win64" => Ok(Platform::Windows),
            "linux" => Ok(Platform::Linux),
            "macos" | "macosx" | "darwin" | "osx" => Ok(Platform::MacOs),
            _ => Err(ConfigError::UnknownPlatform(s.to_string())),
        }
    }
}

/// Preferred toolchain family, if the project declares one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolchainPref {
    Msvc,
    Gcc,
    Clang,
}

impl FromStr for ToolchainPref {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "msvc" | "cl" => Ok(ToolchainPref::Msvc),
            "gcc" | "gnu" => Ok(ToolchainPref::Gcc),
            "clang" | "llvm" => Ok(ToolchainPref::Clang),
            _ => Err(ConfigError::UnknownToolchain(s.to_string())),
        }
    }
}

/// Project-wide settings set by the root script.
#[derive(Debug, Clone)]
pub struct GlobalSettings {
    pub project: String,
    pub version: String,
    pub c_standard: Option<CStandard>,
    pub cpp_standard: Option<CppStandard>,
    pub arch: Arch,
    pub platform: Platform,
    pub defines: Vec<String>,
    pub toolchain_preference: Option<ToolchainPref>,
    pub configuration: BuildConfig,
    /// Rule names declared by the script; recorded, not interpreted.
    pub rules: Vec<String>,
}

impl Default for GlobalSettings {
    fn default() -> Self {
        GlobalSettings {
            project: String::new(),
            version: String::new(),
            c_standard: None,
            cpp_standard: None,
            arch: Arch::host(),
            platform: Platform::host(),
            defines: Vec::new(),
            toolchain_preference: None,
            configuration: BuildConfig::Debug,
            rules: Vec::new(),
        }
    }
}

/// The mutable registry the scripting host populates, then frozen.
#[derive(Debug, Default)]
pub struct BuildModel {
    settings: GlobalSettings,
    targets: Vec<Target>,
    index: HashMap<String, usize>,
    frozen: bool,
}

impl BuildModel {
    pub fn new() -> Self {
        BuildModel::default()
    }

    pub fn settings(&self) -> &GlobalSettings {
        &self.settings
    }

    pub fn targets(&self) -> &[Target] {
        &self.targets
    }

    pub fn get(&self, name: &str) -> Option<&Target> {
        self.index.get(name).map(|&i| &self.targets[i])
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Freeze the model. All configuration callbacks fail afterwards.
    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    fn check_mutable(&self) -> Result<(), ConfigError> {
        if self.frozen {
            Err(ConfigError::Frozen)
        } else {
            Ok(())
        }
    }

    // ---- global callbacks ----

    pub fn set_project(&mut self, name: impl Into<String>) -> Result<(), ConfigError> {
        self.check_mutable()?;
        self.settings.project = name.into();
        Ok(())
    }

    pub fn set_version(&mut self, version: impl Into<String>) -> Result<(), ConfigError> {
        self.check_mutable()?;
        self.settings.version = version.into();
        Ok(())
    }

    /// Set language standards from loose strings like "c++17" or "c11".
    pub fn set_languages(&mut self, standards: &[String]) -> Result<(), ConfigError> {
        self.check_mutable()?;
        for s in standards {
            match s.parse::<LanguageStandard>()? {
                LanguageStandard::C(std) => self.settings.c_standard = Some(std),
                LanguageStandard::Cpp(std) => self.settings.cpp_standard = Some(std),
            }
        }
        Ok(())
    }

    pub fn add_defines(&mut self, defines: &[String]) -> Result<(), ConfigError> {
        self.check_mutable()?;
        self.settings.defines.extend(defines.iter().cloned());
        Ok(())
    }

    pub fn set_arch(&mut self, arch: &str) -> Result<(), ConfigError> {
        self.check_mutable()?;
        self.settings.arch = arch.parse()?;
        Ok(())
    }

    pub fn set_platform(&mut self, platform: &str) -> Result<(), ConfigError> {
        self.check_mutable()?;
        self.settings.platform = platform.parse()?;
        Ok(())
    }

    pub fn set_toolchain_preference(&mut self, toolchain: &str) -> Result<(), ConfigError> {
        self.check_mutable()?;
        self.settings.toolchain_preference = Some(toolchain.parse()?);
        Ok(())
    }

    pub fn set_configuration(&mut self, config: BuildConfig) -> Result<(), ConfigError> {
        self.check_mutable()?;
        self.settings.configuration = config;
        Ok(())
    }

    pub fn add_rules(&mut self, rules: &[String]) -> Result<(), ConfigError> {
        self.check_mutable()?;
        self.settings.rules.extend(rules.iter().cloned());
        Ok(())
    }

    // ---- target callbacks ----

    /// Create a target and return a fluent handle to it.
    ///
    /// The kind defaults to `Executable` until the script's `SetKind` runs;
    /// it becomes immutable once the graph has been built (the model is
    /// frozen by then).
    pub fn target(
        &mut self,
        name: impl Into<String>,
        base_dir: impl Into<PathBuf>,
    ) -> Result<&mut Target, ConfigError> {
        self.check_mutable()?;
        let name = name.into();
        if self.index.contains_key(&name) {
            return Err(ConfigError::DuplicateTarget(name));
        }
        let target = Target::new(name.clone(), TargetKind::Executable, base_dir.into());
        self.targets.push(target);
        self.index.insert(name, self.targets.len() - 1);
        Ok(self.targets.last_mut().expect("just pushed"))
    }

    /// Fluent handle to an existing target. Unavailable once frozen.
    pub fn target_mut(&mut self, name: &str) -> Option<&mut Target> {
        if self.frozen {
            return None;
        }
        let idx = *self.index.get(name)?;
        Some(&mut self.targets[idx])
    }

    // ---- derived queries ----

    /// Dependency edge names of `target` that refer to other targets:
    /// explicit deps plus linked-library names that match a target.
    pub fn edge_names<'a>(&'a self, target: &'a Target) -> Vec<&'a str> {
        let mut names: Vec<&str> = Vec::new();
        for dep in target.deps() {
            if self.index.contains_key(dep.as_str()) && !names.contains(&dep.as_str()) {
                names.push(dep);
            }
        }
        for link in target.links() {
            if self.index.contains_key(link.as_str()) && !names.contains(&link.as_str()) {
                names.push(link);
            }
        }
        names
    }

    /// The transitive dependency closure of `name`, excluding `name` itself.
    pub fn dependency_closure(&self, name: &str) -> Vec<&Target> {
        let mut seen: Vec<&str> = vec![name];
        let mut queue: Vec<&str> = vec![name];
        let mut closure = Vec::new();

        while let Some(current) = queue.pop() {
            let Some(target) = self.get(current) else {
                continue;
            };
            for dep in self.edge_names(target) {
                if !seen.contains(&dep) {
                    seen.push(dep);
                    queue.push(dep);
                    if let Some(t) = self.get(dep) {
                        closure.push(t);
                    }
                }
            }
        }

        closure
    }

    /// Effective include directories for compiling `target`: its own
    /// directories plus the public and exported directories of its
    /// transitive dependencies. Interface dependencies contribute only
    /// exported directories.
    pub fn effective_include_dirs(&self, target: &Target) -> Vec<PathBuf> {
        let mut dirs: Vec<PathBuf> = Vec::new();
        let mut push = |d: &Path| {
            if !dirs.iter().any(|p| p == d) {
                dirs.push(d.to_path_buf());
            }
        };

        for d in target.include_dirs() {
            push(d);
        }
        for d in target.public_include_dirs() {
            push(d);
        }
        for d in target.exported_include_dirs() {
            push(d);
        }

        for dep in self.dependency_closure(target.name()) {
            if dep.kind() != TargetKind::Interface {
                for d in dep.public_include_dirs() {
                    push(d);
                }
            }
            for d in dep.exported_include_dirs() {
                push(d);
            }
        }

        dirs
    }
}
