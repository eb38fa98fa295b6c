//! Build targets: kinds, sources, and artifact naming.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::core::language::Language;
use crate::error::ConfigError;
use crate::util::fs::{absolutize, resolve_sources};

/// What a target produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetKind {
    Executable,
    StaticLibrary,
    SharedLibrary,
    /// Header-only target; contributes exported include directories at
    /// compile time and produces no artifact.
    Interface,
}

impl TargetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetKind::Executable => "executable",
            TargetKind::StaticLibrary => "static",
            TargetKind::SharedLibrary => "shared",
            TargetKind::Interface => "interface",
        }
    }
}

impl FromStr for TargetKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "executable" | "exe" | "binary" => Ok(TargetKind::Executable),
            "static" | "staticlib" | "static_library" => Ok(TargetKind::StaticLibrary),
            "shared" | "sharedlib" | "shared_library" | "dll" => Ok(TargetKind::SharedLibrary),
            "interface" | "headeronly" | "header_only" => Ok(TargetKind::Interface),
            _ => Err(ConfigError::UnknownKind(s.to_string())),
        }
    }
}

/// Visibility of an include directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    /// Seen only by the owning target.
    Private,
    /// Propagated to dependents.
    Public,
}

impl FromStr for Visibility {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "private" => Ok(Visibility::Private),
            "public" => Ok(Visibility::Public),
            _ => Err(ConfigError::UnknownVisibility(s.to_string())),
        }
    }
}

/// Classification of a source file by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    C,
    Cxx,
    Header,
    Other,
}

impl SourceKind {
    pub fn from_path(path: &Path) -> SourceKind {
        let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
            return SourceKind::Other;
        };

        match ext {
            "c" => SourceKind::C,
            "cpp" | "cc" | "cxx" | "c++" | "CPP" | "CC" | "CXX" => SourceKind::Cxx,
            // Uppercase .C is C++ on case-sensitive filesystems
            "C" => SourceKind::Cxx,
            "h" | "hpp" | "hh" | "hxx" | "inl" => SourceKind::Header,
            _ => SourceKind::Other,
        }
    }

    pub fn language(&self) -> Option<Language> {
        match self {
            SourceKind::C => Some(Language::C),
            SourceKind::Cxx => Some(Language::Cxx),
            _ => None,
        }
    }
}

/// A resolved source file belonging to a target.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub path: PathBuf,
    pub kind: SourceKind,
}

impl SourceFile {
    pub fn new(path: PathBuf) -> Self {
        let kind = SourceKind::from_path(&path);
        SourceFile { path, kind }
    }

    /// Derive the object path under `obj_root`, preserving the source's
    /// directory structure relative to the target's base directory.
    pub fn object_path(&self, base_dir: &Path, obj_root: &Path, obj_ext: &str) -> PathBuf {
        // Sources outside the base directory fall back to their file name.
        let rel = self.path.strip_prefix(base_dir).unwrap_or_else(|_| {
            self.path
                .file_name()
                .map(Path::new)
                .unwrap_or(self.path.as_path())
        });
        obj_root.join(rel.with_extension(obj_ext))
    }
}

/// A named build unit.
#[derive(Debug, Clone)]
pub struct Target {
    name: String,
    kind: TargetKind,
    base_dir: PathBuf,
    sources: Vec<SourceFile>,
    include_dirs: Vec<PathBuf>,
    public_include_dirs: Vec<PathBuf>,
    exported_include_dirs: Vec<PathBuf>,
    defines: Vec<String>,
    compiler_flags: Vec<String>,
    linker_flags: Vec<String>,
    deps: Vec<String>,
    links: Vec<String>,
    sys_links: Vec<String>,
    link_dirs: Vec<PathBuf>,
    pch_header: Option<PathBuf>,
}

impl Target {
    pub(crate) fn new(name: impl Into<String>, kind: TargetKind, base_dir: PathBuf) -> Self {
        Target {
            name: name.into(),
            kind,
            base_dir,
            sources: Vec::new(),
            include_dirs: Vec::new(),
            public_include_dirs: Vec::new(),
            exported_include_dirs: Vec::new(),
            defines: Vec::new(),
            compiler_flags: Vec::new(),
            linker_flags: Vec::new(),
            deps: Vec::new(),
            links: Vec::new(),
            sys_links: Vec::new(),
            link_dirs: Vec::new(),
            pch_header: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> TargetKind {
        self.kind
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn sources(&self) -> &[SourceFile] {
        &self.sources
    }

    pub fn include_dirs(&self) -> &[PathBuf] {
        &self.include_dirs
    }

    pub fn public_include_dirs(&self) -> &[PathBuf] {
        &self.public_include_dirs
    }

    pub fn exported_include_dirs(&self) -> &[PathBuf] {
        &self.exported_include_dirs
    }

    pub fn defines(&self) -> &[String] {
        &self.defines
    }

    pub fn compiler_flags(&self) -> &[String] {
        &self.compiler_flags
    }

    pub fn linker_flags(&self) -> &[String] {
        &self.linker_flags
    }

    pub fn deps(&self) -> &[String] {
        &self.deps
    }

    pub fn links(&self) -> &[String] {
        &self.links
    }

    pub fn sys_links(&self) -> &[String] {
        &self.sys_links
    }

    pub fn link_dirs(&self) -> &[PathBuf] {
        &self.link_dirs
    }

    pub fn pch_header(&self) -> Option<&Path> {
        self.pch_header.as_deref()
    }

    /// The C/C++ translation units among this target's sources.
    pub fn translation_units(&self) -> impl Iterator<Item = &SourceFile> {
        self.sources
            .iter()
            .filter(|s| matches!(s.kind, SourceKind::C | SourceKind::Cxx))
    }

    /// Whether any translation unit is C++.
    pub fn requires_cpp(&self) -> bool {
        self.sources.iter().any(|s| s.kind == SourceKind::Cxx)
    }

    // ---- script callbacks (fluent) ----

    pub fn set_kind(&mut self, kind: TargetKind) -> &mut Self {
        self.kind = kind;
        self
    }

    /// Resolve glob patterns against the target's base directory and add the
    /// matches. Patterns prefixed with `!` exclude.
    pub fn add_files(&mut self, patterns: &[String]) -> anyhow::Result<&mut Self> {
        let files = resolve_sources(&self.base_dir, patterns)?;
        for path in files {
            if !self.sources.iter().any(|s| s.path == path) {
                self.sources.push(SourceFile::new(path));
            }
        }
        Ok(self)
    }

    pub fn add_include_dir(&mut self, visibility: Visibility, dir: impl AsRef<Path>) -> &mut Self {
        let dir = absolutize(&self.base_dir, dir.as_ref());
        match visibility {
            Visibility::Private => self.include_dirs.push(dir),
            Visibility::Public => self.public_include_dirs.push(dir),
        }
        self
    }

    /// Exported include directories are always public.
    pub fn export_include_dir(&mut self, dir: impl AsRef<Path>) -> &mut Self {
        self.exported_include_dirs
            .push(absolutize(&self.base_dir, dir.as_ref()));
        self
    }

    pub fn add_define(&mut self, define: impl Into<String>) -> &mut Self {
        self.defines.push(define.into());
        self
    }

    pub fn add_deps(&mut self, names: &[String]) -> &mut Self {
        self.deps.extend(names.iter().cloned());
        self
    }

    pub fn add_links(&mut self, names: &[String]) -> &mut Self {
        self.links.extend(names.iter().cloned());
        self
    }

    pub fn add_sys_links(&mut self, names: &[String]) -> &mut Self {
        self.sys_links.extend(names.iter().cloned());
        self
    }

    pub fn add_link_dir(&mut self, dir: impl AsRef<Path>) -> &mut Self {
        self.link_dirs.push(absolutize(&self.base_dir, dir.as_ref()));
        self
    }

    pub fn add_compiler_flags(&mut self, flags: &[String]) -> &mut Self {
        self.compiler_flags.extend(flags.iter().cloned());
        self
    }

    pub fn add_linker_flags(&mut self, flags: &[String]) -> &mut Self {
        self.linker_flags.extend(flags.iter().cloned());
        self
    }

    pub fn set_pch_header(&mut self, header: impl AsRef<Path>) -> &mut Self {
        self.pch_header = Some(absolutize(&self.base_dir, header.as_ref()));
        self
    }

    // ---- artifact naming ----

    /// The artifact file name for this target on `os`, or `None` for
    /// interface targets. The `_d` suffix is appended in debug builds.
    pub fn output_file_name(&self, os: &str, debug: bool) -> Option<String> {
        let suffix = if debug { "_d" } else { "" };
        let stem = format!("{}{}", self.name, suffix);

        match self.kind {
            TargetKind::Interface => None,
            TargetKind::Executable => Some(if os == "windows" {
                format!("{stem}.exe")
            } else {
                stem
            }),
            TargetKind::StaticLibrary => Some(if os == "windows" {
                format!("{stem}.lib")
            } else {
                format!("lib{stem}.a")
            }),
            TargetKind::SharedLibrary => Some(match os {
                "windows" => format!("{stem}.dll"),
                "macos" => format!("lib{stem}.dylib"),
                _ => format!("lib{stem}.so"),
            }),
        }
    }

    /// The import library emitted alongside a shared library on Windows.
    pub fn import_lib_name(&self, debug: bool) -> Option<String> {
        match self.kind {
            TargetKind::SharedLibrary => {
                let suffix = if debug { "_d" } else { "" };
                Some(format!("{}{}.lib", self.name, suffix))
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(kind: TargetKind) -> Target {
        Target::new("demo", kind, PathBuf::from("/proj"))
    }

    #[test]
    fn test_kind_parsing() {
        assert_eq!(
            "executable".parse::<TargetKind>().unwrap(),
            TargetKind::Executable
        );
        assert_eq!(
            "static".parse::<TargetKind>().unwrap(),
            TargetKind::StaticLibrary
        );
        assert_eq!(
            "shared".parse::<TargetKind>().unwrap(),
            TargetKind::SharedLibrary
        );
        assert_eq!(
            "interface".parse::<TargetKind>().unwrap(),
            TargetKind::Interface
        );
        assert!("plugin".parse::<TargetKind>().is_err());
    }

    #[test]
    fn test_source_kind_classification() {
        assert_eq!(SourceKind::from_path(Path::new("a.c")), SourceKind::C);
        assert_eq!(SourceKind::from_path(Path::new("a.cpp")), SourceKind::Cxx);
        assert_eq!(SourceKind::from_path(Path::new("a.cc")), SourceKind::Cxx);
        assert_eq!(SourceKind::from_path(Path::new("a.hpp")), SourceKind::Header);
        assert_eq!(SourceKind::from_path(Path::new("a.txt")), SourceKind::Other);
        assert_eq!(SourceKind::from_path(Path::new("Makefile")), SourceKind::Other);
    }

    #[test]
    fn test_object_path_preserves_structure() {
        let src = SourceFile::new(PathBuf::from("/proj/src/sub/main.cpp"));
        let obj = src.object_path(Path::new("/proj"), Path::new("/proj/build/debug/obj"), "o");
        assert_eq!(obj, PathBuf::from("/proj/build/debug/obj/src/sub/main.o"));
    }

    #[test]
    fn test_executable_naming() {
        let t = target(TargetKind::Executable);
        assert_eq!(t.output_file_name("linux", false).unwrap(), "demo");
        assert_eq!(t.output_file_name("linux", true).unwrap(), "demo_d");
        assert_eq!(t.output_file_name("windows", true).unwrap(), "demo_d.exe");
    }

    #[test]
    fn test_library_naming() {
        let s = target(TargetKind::StaticLibrary);
        assert_eq!(s.output_file_name("linux", false).unwrap(), "libdemo.a");
        assert_eq!(s.output_file_name("windows", false).unwrap(), "demo.lib");

        let d = target(TargetKind::SharedLibrary);
        assert_eq!(d.output_file_name("linux", false).unwrap(), "libdemo.so");
        assert_eq!(d.output_file_name("macos", false).unwrap(), "libdemo.dylib");
        assert_eq!(d.output_file_name("windows", true).unwrap(), "demo_d.dll");
        assert_eq!(d.import_lib_name(true).unwrap(), "demo_d.lib");
    }

    #[test]
    fn test_interface_has_no_artifact() {
        let t = target(TargetKind::Interface);
        assert!(t.output_file_name("linux", false).is_none());
        assert!(t.import_lib_name(false).is_none());
    }

    #[test]
    fn test_include_dir_visibility_buckets() {
        let mut t = target(TargetKind::StaticLibrary);
        t.add_include_dir(Visibility::Private, "internal")
            .add_include_dir(Visibility::Public, "include")
            .export_include_dir("api");

        assert_eq!(t.include_dirs(), &[PathBuf::from("/proj/internal")]);
        assert_eq!(t.public_include_dirs(), &[PathBuf::from("/proj/include")]);
        assert_eq!(t.exported_include_dirs(), &[PathBuf::from("/proj/api")]);
    }

    #[test]
    fn test_requires_cpp() {
        let mut t = target(TargetKind::Executable);
        t.sources.push(SourceFile::new(PathBuf::from("/proj/a.c")));
        assert!(!t.requires_cpp());
        t.sources.push(SourceFile::new(PathBuf::from("/proj/b.cpp")));
        assert!(t.requires_cpp());
    }
}
