//! Build orchestration: script evaluation, graph construction, toolchain
//! selection, and the compile/link loop over targets in dependency order.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

use crate::builder::compile::ensure_success;
use crate::builder::{compile_target, link_target, Artifact, BuildSession};
use crate::cache::BuildCache;
use crate::core::graph::DependencyGraph;
use crate::core::model::{BuildConfig, BuildModel};
use crate::core::target::TargetKind;
use crate::error::ConfigError;
use crate::toolchain::{detect_toolchain, Toolchain};
use crate::util::config::{load_toolchain_config, project_state_dir};
use crate::util::fs::{ensure_dir, find_upward, remove_dir_all_if_exists, remove_file_if_exists};
use crate::util::process::ProcessBuilder;

/// The narrow interface to the scripting host: evaluate a `build.cs` and
/// populate the model through its callback API.
pub trait ScriptHost {
    fn evaluate(&mut self, model: &mut BuildModel, script: &Path) -> Result<()>;
}

/// Options carried from the CLI into a build.
#[derive(Debug, Default, Clone)]
pub struct BuildOptions {
    /// Configuration override; the script's choice applies when absent.
    pub config: Option<BuildConfig>,
    /// Worker count; defaults to the CPU count.
    pub jobs: Option<usize>,
    pub verbose: bool,
}

/// Result of a successful build.
#[derive(Debug)]
pub struct BuildOutcome {
    pub config: BuildConfig,
    pub out_dir: PathBuf,
    pub artifacts: Vec<Artifact>,
    /// Artifact of the first executable target, in declaration order.
    pub first_executable: Option<PathBuf>,
}

/// Locate the project root by walking upward from `start` to the nearest
/// directory containing `build.cs`.
pub fn find_project_root(start: &Path) -> Result<PathBuf> {
    find_upward(start, "build.cs").ok_or_else(|| {
        anyhow::anyhow!(
            "no build.cs found in {} or any parent directory",
            start.display()
        )
    })
}

pub struct Driver;

impl Driver {
    /// Evaluate the project script and run a full build.
    pub fn build(
        host: &mut dyn ScriptHost,
        start_dir: &Path,
        opts: &BuildOptions,
    ) -> Result<BuildOutcome> {
        let root = find_project_root(start_dir)?;

        let mut model = BuildModel::new();
        host.evaluate(&mut model, &root.join("build.cs"))?;

        if let Some(config) = opts.config {
            model.set_configuration(config)?;
        }
        model.freeze();

        let tc_config = load_toolchain_config(&root);
        let mut toolchain = detect_toolchain(model.settings().toolchain_preference, &tc_config)?;

        // A failed environment capture degrades to a warning; the compiler
        // may still work from the ambient environment.
        if let Err(e) = toolchain.initialize_environment() {
            tracing::warn!("toolchain environment initialization failed: {:#}", e);
        }

        tracing::info!("using toolchain {}", toolchain.id());

        Self::execute(&model, toolchain.as_ref(), &root, opts)
    }

    /// Run the compile/link loop against an already-populated model.
    ///
    /// Split from [`Driver::build`] so the loop can be driven with an
    /// injected toolchain.
    pub fn execute(
        model: &BuildModel,
        toolchain: &dyn Toolchain,
        root: &Path,
        opts: &BuildOptions,
    ) -> Result<BuildOutcome> {
        let graph = DependencyGraph::from_model(model);

        // Abort on cycles before any build directory exists.
        if let Some(cycle) = graph.find_cycle() {
            return Err(ConfigError::Cycle(cycle).into());
        }

        let cache = BuildCache::open(root)?;

        let config = model.settings().configuration;
        let out_dir = root.join("build").join(config.as_dir_name());
        ensure_dir(&out_dir)?;

        let session = BuildSession {
            model,
            toolchain,
            cache: &cache,
            config,
            out_dir: out_dir.clone(),
            jobs: opts.jobs.unwrap_or_else(default_jobs),
            verbose: opts.verbose,
        };

        let mut did_work: HashMap<String, bool> = HashMap::new();
        let mut artifacts = Vec::new();

        for name in graph.topological_order() {
            let target = model.get(name).expect("ordered target exists in model");

            eprintln!("Building {} [{}]", name, target.kind().as_str());

            let report = compile_target(&session, target)?;
            ensure_success(&report, name)?;

            let deps_changed = model
                .dependency_closure(name)
                .iter()
                .any(|d| did_work.get(d.name()).copied().unwrap_or(false));

            let artifact = link_target(&session, target, report.did_work(), deps_changed)?;

            did_work.insert(name.to_string(), report.did_work() || deps_changed);
            artifacts.extend(artifact);
        }

        let first_executable = model
            .targets()
            .iter()
            .find(|t| t.kind() == TargetKind::Executable)
            .and_then(|t| session.artifact_path(t));

        Ok(BuildOutcome {
            config,
            out_dir,
            artifacts,
            first_executable,
        })
    }

    /// Delete the build tree and the cache store.
    pub fn clean(start_dir: &Path) -> Result<()> {
        let root = find_project_root(start_dir)?;

        let build_dir = root.join("build");
        remove_dir_all_if_exists(&build_dir)?;
        eprintln!("  Removed {}", build_dir.display());

        let cache_db = project_state_dir(&root).join("cache.db");
        remove_file_if_exists(&cache_db)?;
        eprintln!("  Removed {}", cache_db.display());

        Ok(())
    }

    /// Build, then execute the first executable target's artifact with the
    /// output directory as working directory. Returns the child's exit code.
    pub fn run(
        host: &mut dyn ScriptHost,
        start_dir: &Path,
        opts: &BuildOptions,
    ) -> Result<i32> {
        let outcome = Self::build(host, start_dir, opts)?;

        let Some(exe) = outcome.first_executable else {
            bail!("project declares no executable target to run");
        };

        if !exe.exists() {
            bail!("executable artifact missing: {}", exe.display());
        }

        eprintln!("  Running {}", exe.display());
        let code = ProcessBuilder::new(&exe)
            .cwd(&outcome.out_dir)
            .exec_inherited()
            .with_context(|| format!("failed to run {}", exe.display()))?;

        Ok(code.unwrap_or(1))
    }
}

fn default_jobs() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}
