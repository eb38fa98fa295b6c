//! Build execution: per-target compile scheduling and linking.

use std::path::PathBuf;

use crate::cache::BuildCache;
use crate::core::model::{BuildConfig, BuildModel};
use crate::core::target::Target;
use crate::toolchain::{Toolchain, ToolchainFamily};

pub mod compile;
pub mod link;

pub use compile::{compile_target, CompileReport};
pub use link::{link_target, Artifact};

/// Everything the schedulers need for one build invocation. The model,
/// toolchain, and cache are read-only (the cache serializes internally).
pub struct BuildSession<'a> {
    pub model: &'a BuildModel,
    pub toolchain: &'a dyn Toolchain,
    pub cache: &'a BuildCache,
    pub config: BuildConfig,
    /// `<root>/build/<config>`
    pub out_dir: PathBuf,
    pub jobs: usize,
    pub verbose: bool,
}

impl<'a> BuildSession<'a> {
    pub fn os(&self) -> &'static str {
        std::env::consts::OS
    }

    pub fn is_msvc(&self) -> bool {
        self.toolchain.family() == ToolchainFamily::Msvc
    }

    /// Object root: `<root>/build/<config>/obj`.
    pub fn obj_dir(&self) -> PathBuf {
        self.out_dir.join("obj")
    }

    /// The artifact path a target links to, if it produces one.
    pub fn artifact_path(&self, target: &Target) -> Option<PathBuf> {
        target
            .output_file_name(self.os(), self.config.is_debug())
            .map(|name| self.out_dir.join(name))
    }

    /// The import library a shared library produces on Windows.
    pub fn import_lib_path(&self, target: &Target) -> Option<PathBuf> {
        target
            .import_lib_name(self.config.is_debug())
            .map(|name| self.out_dir.join(name))
    }
}
