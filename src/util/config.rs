//! Configuration file support.
//!
//! Toolchain overrides live in two locations:
//! - Global: `~/.lbt/toolchain.toml`
//! - Project: `<root>/.lbt/toolchain.toml`
//!
//! Project config takes precedence over global config.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Toolchain configuration for compiler overrides.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolchainConfig {
    /// Toolchain settings
    pub toolchain: ToolchainSettings,
}

/// Toolchain settings for C/C++ compilation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolchainSettings {
    /// Path to the C compiler (e.g., /usr/bin/clang)
    pub cc: Option<PathBuf>,

    /// Path to the C++ compiler (e.g., /usr/bin/clang++)
    pub cxx: Option<PathBuf>,

    /// Path to the archiver (e.g., /usr/bin/llvm-ar)
    pub ar: Option<PathBuf>,

    /// Additional compiler flags applied to every compile
    #[serde(default)]
    pub cflags: Vec<String>,

    /// Additional linker flags applied to every link
    #[serde(default)]
    pub ldflags: Vec<String>,
}

impl ToolchainConfig {
    /// Load toolchain configuration from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read toolchain config: {}", path.display()))?;

        toml::from_str(&contents)
            .with_context(|| format!("failed to parse toolchain config: {}", path.display()))
    }

    /// Load toolchain configuration with fallback to defaults if file doesn't exist.
    pub fn load_or_default(path: &Path) -> Self {
        if path.exists() {
            Self::load(path).unwrap_or_else(|e| {
                tracing::warn!(
                    "failed to load toolchain config from {}: {}",
                    path.display(),
                    e
                );
                Self::default()
            })
        } else {
            Self::default()
        }
    }

    /// Check if any toolchain settings are configured.
    pub fn has_overrides(&self) -> bool {
        self.toolchain.cc.is_some()
            || self.toolchain.cxx.is_some()
            || self.toolchain.ar.is_some()
            || !self.toolchain.cflags.is_empty()
            || !self.toolchain.ldflags.is_empty()
    }

    /// Merge another config into this one (other takes precedence).
    pub fn merge(&mut self, other: ToolchainConfig) {
        if other.toolchain.cc.is_some() {
            self.toolchain.cc = other.toolchain.cc;
        }
        if other.toolchain.cxx.is_some() {
            self.toolchain.cxx = other.toolchain.cxx;
        }
        if other.toolchain.ar.is_some() {
            self.toolchain.ar = other.toolchain.ar;
        }
        if !other.toolchain.cflags.is_empty() {
            self.toolchain.cflags = other.toolchain.cflags;
        }
        if !other.toolchain.ldflags.is_empty() {
            self.toolchain.ldflags = other.toolchain.ldflags;
        }
    }
}

/// Load merged toolchain configuration for a project root.
///
/// Order of precedence (highest to lowest): project, global, defaults.
pub fn load_toolchain_config(project_root: &Path) -> ToolchainConfig {
    let mut config = ToolchainConfig::default();

    if let Some(global) = global_toolchain_config_path() {
        if global.exists() {
            config.merge(ToolchainConfig::load_or_default(&global));
        }
    }

    let project = project_state_dir(project_root).join("toolchain.toml");
    if project.exists() {
        config.merge(ToolchainConfig::load_or_default(&project));
    }

    config
}

/// The project state directory (`<root>/.lbt`).
pub fn project_state_dir(project_root: &Path) -> PathBuf {
    project_root.join(".lbt")
}

/// Get the global config directory (~/.lbt).
pub fn global_config_dir() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|b| b.home_dir().join(".lbt"))
}

/// Get the global toolchain config path (~/.lbt/toolchain.toml).
pub fn global_toolchain_config_path() -> Option<PathBuf> {
    global_config_dir().map(|dir| dir.join("toolchain.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_toolchain_config_default() {
        let config = ToolchainConfig::default();
        assert!(config.toolchain.cc.is_none());
        assert!(config.toolchain.cxx.is_none());
        assert!(config.toolchain.ar.is_none());
        assert!(!config.has_overrides());
    }

    #[test]
    fn test_toolchain_config_load() {
        let tmp = TempDir::new().unwrap();
        let config_path = tmp.path().join("toolchain.toml");

        std::fs::write(
            &config_path,
            r#"
[toolchain]
cc = "/usr/bin/clang"
cxx = "/usr/bin/clang++"
ar = "/usr/bin/llvm-ar"
cflags = ["-Wall", "-Wextra"]
"#,
        )
        .unwrap();

        let config = ToolchainConfig::load(&config_path).unwrap();
        assert_eq!(config.toolchain.cc, Some(PathBuf::from("/usr/bin/clang")));
        assert_eq!(
            config.toolchain.cxx,
            Some(PathBuf::from("/usr/bin/clang++"))
        );
        assert_eq!(config.toolchain.cflags, vec!["-Wall", "-Wextra"]);
        assert!(config.has_overrides());
    }

    #[test]
    fn test_toolchain_config_merge() {
        let mut base = ToolchainConfig::default();
        base.toolchain.cc = Some(PathBuf::from("/usr/bin/gcc"));
        base.toolchain.ar = Some(PathBuf::from("/usr/bin/ar"));
        base.toolchain.cflags = vec!["-Wall".to_string()];

        let mut override_cfg = ToolchainConfig::default();
        override_cfg.toolchain.cc = Some(PathBuf::from("/usr/bin/clang"));
        override_cfg.toolchain.cflags = vec!["-Werror".to_string()];

        base.merge(override_cfg);

        assert_eq!(base.toolchain.cc, Some(PathBuf::from("/usr/bin/clang")));
        assert_eq!(base.toolchain.ar, Some(PathBuf::from("/usr/bin/ar")));
        assert_eq!(base.toolchain.cflags, vec!["-Werror"]);
    }

    #[test]
    fn test_toolchain_config_malformed_falls_back() {
        let tmp = TempDir::new().unwrap();
        let config_path = tmp.path().join("toolchain.toml");
        std::fs::write(&config_path, "not [valid toml").unwrap();

        let config = ToolchainConfig::load_or_default(&config_path);
        assert!(!config.has_overrides());
    }

    #[test]
    fn test_project_state_dir() {
        assert_eq!(
            project_state_dir(Path::new("/proj")),
            PathBuf::from("/proj/.lbt")
        );
    }
}
