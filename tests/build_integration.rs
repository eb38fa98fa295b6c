//! End-to-end build loop tests.
//!
//! These drive the model -> graph -> compile -> link pipeline through
//! `Driver::execute` with a stub toolchain whose "compiler" copies the
//! source to the object file and whose "linker" concatenates inputs, so no
//! vendor toolchain is required.

#![cfg(unix)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use lbt::builder::{compile_target, BuildSession};
use lbt::cache::BuildCache;
use lbt::core::model::{BuildConfig, BuildModel};
use lbt::core::target::{TargetKind, Visibility};
use lbt::driver::{BuildOptions, Driver};
use lbt::error::ConfigError;
use lbt::toolchain::{
    CommandSpec, CompileOptions, LinkKind, LinkOptions, Toolchain, ToolchainFamily,
};

/// A toolchain whose compile step is `cp` and whose link step is `cat`.
/// Header dependencies are injected per source.
struct StubToolchain {
    header_deps: HashMap<PathBuf, Vec<PathBuf>>,
}

impl StubToolchain {
    fn new() -> Self {
        StubToolchain {
            header_deps: HashMap::new(),
        }
    }

    fn with_header_deps(mut self, source: impl Into<PathBuf>, headers: Vec<PathBuf>) -> Self {
        self.header_deps.insert(source.into(), headers);
        self
    }
}

impl Toolchain for StubToolchain {
    fn family(&self) -> ToolchainFamily {
        ToolchainFamily::Gcc
    }

    fn version(&self) -> &str {
        "0.0-stub"
    }

    fn compiler_path(&self) -> &Path {
        Path::new("/bin/cp")
    }

    fn linker_path(&self) -> &Path {
        Path::new("/bin/sh")
    }

    fn archiver_path(&self) -> &Path {
        Path::new("/bin/sh")
    }

    fn compile_command(&self, opts: &CompileOptions) -> CommandSpec {
        CommandSpec::new("/bin/cp")
            .arg(opts.source.display().to_string())
            .arg(opts.object.display().to_string())
    }

    fn link_command(&self, opts: &LinkOptions) -> CommandSpec {
        let inputs: Vec<String> = opts
            .objects
            .iter()
            .map(|o| format!("'{}'", o.display()))
            .collect();
        let script = format!("cat {} > '{}'", inputs.join(" "), opts.output.display());
        // The kind rides along as $0 so the args line differs per link kind.
        let kind_marker = match opts.kind {
            LinkKind::Executable => "exe",
            LinkKind::StaticLibrary => "staticlib",
            LinkKind::SharedLibrary => "sharedlib",
        };
        CommandSpec::new("/bin/sh")
            .arg("-c")
            .arg(script)
            .arg(kind_marker)
    }

    fn parse_header_deps(&self, opts: &CompileOptions, _stdout: &str) -> anyhow::Result<Vec<PathBuf>> {
        Ok(self
            .header_deps
            .get(&opts.source)
            .cloned()
            .unwrap_or_default())
    }

    fn object_extension(&self) -> &str {
        "o"
    }
}

fn write(path: &Path, content: &str) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, content).unwrap();
}

fn opts() -> BuildOptions {
    BuildOptions {
        config: None,
        jobs: Some(2),
        verbose: false,
    }
}

/// Scenario: single executable, then an idempotent second build.
#[test]
fn single_executable_builds_and_second_build_is_noop() {
    let tmp = tempfile::TempDir::new().unwrap();
    let root = tmp.path();
    write(&root.join("src/main.cpp"), "int main() { return 0; }\n");

    let mut model = BuildModel::new();
    model.set_project("hello").unwrap();
    model.target("hello", root).unwrap();
    model
        .target_mut("hello")
        .unwrap()
        .add_files(&["src/*.cpp".to_string()])
        .unwrap();
    model.freeze();

    let toolchain = StubToolchain::new();
    let outcome = Driver::execute(&model, &toolchain, root, &opts()).unwrap();

    let artifact = root.join("build/debug/hello_d");
    assert!(artifact.exists());
    assert_eq!(outcome.artifacts.len(), 1);
    assert_eq!(outcome.first_executable.as_deref(), Some(artifact.as_path()));

    // Plant sentinels: a second build must neither recompile nor relink.
    let object = root.join("build/debug/obj/src/main.o");
    assert!(object.exists());
    write(&object, "OBJECT-SENTINEL");
    let artifact_before = std::fs::read_to_string(&artifact).unwrap();

    Driver::execute(&model, &toolchain, root, &opts()).unwrap();

    assert_eq!(std::fs::read_to_string(&object).unwrap(), "OBJECT-SENTINEL");
    assert_eq!(std::fs::read_to_string(&artifact).unwrap(), artifact_before);
}

/// Scenario: static library consumer; the library is ordered and linked
/// before the app, and its artifact joins the app's link inputs.
#[test]
fn static_library_consumer_links_dependency_artifact() {
    let tmp = tempfile::TempDir::new().unwrap();
    let root = tmp.path();
    write(&root.join("mathlib/src/math.cpp"), "MATH-CODE\n");
    write(&root.join("mathlib/include/math.hpp"), "#pragma once\n");
    write(&root.join("app/src/main.cpp"), "APP-CODE\n");

    let mut model = BuildModel::new();
    // Declared consumer-first: topological order must still build mathlib
    // before app, or the app link's cat would fail on a missing archive.
    model.target("app", root.join("app")).unwrap();
    model
        .target_mut("app")
        .unwrap()
        .add_files(&["src/*.cpp".to_string()])
        .unwrap()
        .add_deps(&["mathlib".to_string()]);
    model.target("mathlib", root.join("mathlib")).unwrap();
    model
        .target_mut("mathlib")
        .unwrap()
        .set_kind(TargetKind::StaticLibrary)
        .add_files(&["src/*.cpp".to_string()])
        .unwrap()
        .add_include_dir(Visibility::Public, "include");
    model.freeze();

    // Visibility law: app's compile surface carries mathlib's public dir.
    let app = model.get("app").unwrap();
    let dirs = model.effective_include_dirs(app);
    assert!(dirs.contains(&root.join("mathlib/include")));

    let toolchain = StubToolchain::new();
    Driver::execute(&model, &toolchain, root, &opts()).unwrap();

    let lib = root.join("build/debug/libmathlib_d.a");
    let app_bin = root.join("build/debug/app_d");
    assert!(lib.exists());
    assert!(app_bin.exists());

    // The app artifact is a concatenation of its objects plus the archive.
    let contents = std::fs::read_to_string(&app_bin).unwrap();
    assert!(contents.contains("APP-CODE"));
    assert!(contents.contains("MATH-CODE"));
}

/// Scenario: cycle detection aborts before any build directory is created.
#[test]
fn cycle_aborts_without_creating_build_dir() {
    let tmp = tempfile::TempDir::new().unwrap();
    let root = tmp.path();

    let mut model = BuildModel::new();
    for name in ["a", "b", "c"] {
        model.target(name, root).unwrap();
    }
    model.target_mut("a").unwrap().add_deps(&["b".to_string()]);
    model.target_mut("b").unwrap().add_deps(&["c".to_string()]);
    model.target_mut("c").unwrap().add_deps(&["a".to_string()]);
    model.freeze();

    let toolchain = StubToolchain::new();
    let err = Driver::execute(&model, &toolchain, root, &opts()).unwrap_err();

    let config_err = err.downcast_ref::<ConfigError>().unwrap();
    match config_err {
        ConfigError::Cycle(path) => {
            assert!(path.len() >= 4);
            assert_eq!(path.first(), path.last());
        }
        other => panic!("expected cycle error, got {}", other),
    }

    assert!(!root.join("build").exists());
}

/// Scenario: touching a header recompiles exactly the units that include it
/// and relinks the target.
#[test]
fn header_change_recompiles_only_includers() {
    let tmp = tempfile::TempDir::new().unwrap();
    let root = tmp.path();
    let header = root.join("include/config.hpp");
    write(&header, "#define VALUE 1\n");
    write(&root.join("src/uses_header.cpp"), "USES-HEADER\n");
    write(&root.join("src/standalone.cpp"), "STANDALONE\n");

    let mut model = BuildModel::new();
    model.target("app", root).unwrap();
    model
        .target_mut("app")
        .unwrap()
        .add_files(&["src/*.cpp".to_string()])
        .unwrap()
        .add_include_dir(Visibility::Private, "include");
    model.freeze();

    let toolchain = StubToolchain::new()
        .with_header_deps(root.join("src/uses_header.cpp"), vec![header.clone()]);

    Driver::execute(&model, &toolchain, root, &opts()).unwrap();

    let uses_obj = root.join("build/debug/obj/src/uses_header.o");
    let standalone_obj = root.join("build/debug/obj/src/standalone.o");
    let artifact = root.join("build/debug/app_d");
    assert!(uses_obj.exists() && standalone_obj.exists() && artifact.exists());

    write(&uses_obj, "SENTINEL-A");
    write(&standalone_obj, "SENTINEL-B");

    // Change the header content.
    write(&header, "#define VALUE 2\n");

    Driver::execute(&model, &toolchain, root, &opts()).unwrap();

    // The includer was rebuilt, the other unit skipped.
    assert_eq!(
        std::fs::read_to_string(&uses_obj).unwrap(),
        "USES-HEADER\n"
    );
    assert_eq!(std::fs::read_to_string(&standalone_obj).unwrap(), "SENTINEL-B");

    // And the target was relinked with the fresh object.
    let contents = std::fs::read_to_string(&artifact).unwrap();
    assert!(contents.contains("USES-HEADER"));
    assert!(contents.contains("SENTINEL-B"));
}

/// Scenario: clean removes the build tree and cache, forcing a full rebuild.
#[test]
fn clean_forces_full_rebuild() {
    let tmp = tempfile::TempDir::new().unwrap();
    let root = tmp.path();
    write(&root.join("build.cs"), "// placeholder for root discovery\n");
    write(&root.join("src/main.cpp"), "MAIN\n");

    let mut model = BuildModel::new();
    model.target("app", root).unwrap();
    model
        .target_mut("app")
        .unwrap()
        .add_files(&["src/*.cpp".to_string()])
        .unwrap();
    model.freeze();

    let toolchain = StubToolchain::new();
    Driver::execute(&model, &toolchain, root, &opts()).unwrap();

    assert!(root.join("build").exists());
    assert!(root.join(".lbt/cache.db").exists());

    Driver::clean(root).unwrap();
    assert!(!root.join("build").exists());
    assert!(!root.join(".lbt/cache.db").exists());

    // Full rebuild recreates everything.
    Driver::execute(&model, &toolchain, root, &opts()).unwrap();
    assert!(root.join("build/debug/app_d").exists());
}

/// Scenario: header-only interface target contributes includes but neither
/// compiles nor links.
#[test]
fn interface_target_is_compile_time_only() {
    let tmp = tempfile::TempDir::new().unwrap();
    let root = tmp.path();
    write(&root.join("utils/include/algo.hpp"), "#pragma once\n");
    write(&root.join("src/main.cpp"), "MAIN\n");

    let mut model = BuildModel::new();
    model.target("utils", root.join("utils")).unwrap();
    model
        .target_mut("utils")
        .unwrap()
        .set_kind(TargetKind::Interface)
        .export_include_dir("include");
    model.target("app", root).unwrap();
    model
        .target_mut("app")
        .unwrap()
        .add_files(&["src/*.cpp".to_string()])
        .unwrap()
        .add_deps(&["utils".to_string()]);
    model.freeze();

    let app = model.get("app").unwrap();
    let dirs = model.effective_include_dirs(app);
    assert!(dirs.contains(&root.join("utils/include")));

    let toolchain = StubToolchain::new();
    let outcome = Driver::execute(&model, &toolchain, root, &opts()).unwrap();

    // Only app produced an artifact; utils linked nothing.
    assert_eq!(outcome.artifacts.len(), 1);
    assert_eq!(outcome.artifacts[0].target, "app");

    let app_bin = root.join("build/debug/app_d");
    assert!(app_bin.exists());
    assert!(!std::fs::read_to_string(&app_bin).unwrap().contains("utils"));
}

/// A failing compile surfaces a per-target failure and aborts the build.
#[test]
fn failing_compile_aborts_target() {
    let tmp = tempfile::TempDir::new().unwrap();
    let root = tmp.path();
    write(&root.join("src/ok.cpp"), "OK\n");

    let mut model = BuildModel::new();
    model.target("app", root).unwrap();
    model
        .target_mut("app")
        .unwrap()
        .add_files(&["src/*.cpp".to_string()])
        .unwrap();
    // A source that vanishes after model construction makes cp fail.
    write(&root.join("src/gone.cpp"), "GONE\n");
    model
        .target_mut("app")
        .unwrap()
        .add_files(&["src/gone.cpp".to_string()])
        .unwrap();
    model.freeze();
    std::fs::remove_file(root.join("src/gone.cpp")).unwrap();

    let toolchain = StubToolchain::new();
    let err = Driver::execute(&model, &toolchain, root, &opts()).unwrap_err();
    assert!(err.to_string().contains("compile task(s) failed"));
}

/// Compile-report accounting at the scheduler level: second run skips all.
#[test]
fn compile_report_counts_skips() {
    let tmp = tempfile::TempDir::new().unwrap();
    let root = tmp.path();
    write(&root.join("src/a.cpp"), "A\n");
    write(&root.join("src/b.cpp"), "B\n");

    let mut model = BuildModel::new();
    model.target("app", root).unwrap();
    model
        .target_mut("app")
        .unwrap()
        .add_files(&["src/*.cpp".to_string()])
        .unwrap();
    model.freeze();

    let toolchain = StubToolchain::new();
    let cache = BuildCache::open(root).unwrap();
    let session = BuildSession {
        model: &model,
        toolchain: &toolchain,
        cache: &cache,
        config: BuildConfig::Debug,
        out_dir: root.join("build/debug"),
        jobs: 2,
        verbose: false,
    };

    let target = model.get("app").unwrap();

    let first = compile_target(&session, target).unwrap();
    assert_eq!(first.total, 2);
    assert_eq!(first.compiled, 2);
    assert_eq!(first.skipped, 0);
    assert!(first.success() && first.did_work());

    let second = compile_target(&session, target).unwrap();
    assert_eq!(second.total, 2);
    assert_eq!(second.compiled, 0);
    assert_eq!(second.skipped, 2);
    assert!(second.success() && !second.did_work());
}

/// Full pipeline against a real toolchain: script evaluation, detection,
/// compile, link, and the incremental second build. Needs a C++ compiler,
/// so it is ignored by default.
#[test]
#[ignore]
fn end_to_end_with_real_toolchain() {
    let tmp = tempfile::TempDir::new().unwrap();
    let root = tmp.path();
    write(
        &root.join("build.cs"),
        r#"
SetProject("hello")
SetLanguages("c++17")

Target("hello", "executable")
AddFiles("src/*.cpp")
"#,
    );
    write(
        &root.join("src/main.cpp"),
        "#include <cstdio>\nint main() { std::puts(\"hello\"); return 0; }\n",
    );

    let mut host = lbt::script::BuildScriptHost::new();
    let outcome = Driver::build(&mut host, root, &opts()).unwrap();

    let exe = outcome.first_executable.expect("executable artifact");
    assert!(exe.exists());

    // Second build performs zero compiles.
    let object_mtime = |p: &Path| std::fs::metadata(p).unwrap().modified().unwrap();
    let object = root.join("build/debug/obj/src/main.o");
    let before = object_mtime(&object);

    Driver::build(&mut host, root, &opts()).unwrap();
    assert_eq!(object_mtime(&object), before);
}

/// Release configuration drops the `_d` suffix and builds into its own tree.
#[test]
fn release_configuration_artifacts() {
    let tmp = tempfile::TempDir::new().unwrap();
    let root = tmp.path();
    write(&root.join("src/main.cpp"), "MAIN\n");

    let mut model = BuildModel::new();
    model.target("app", root).unwrap();
    model
        .target_mut("app")
        .unwrap()
        .add_files(&["src/*.cpp".to_string()])
        .unwrap();
    model.set_configuration(BuildConfig::Release).unwrap();
    model.freeze();

    let toolchain = StubToolchain::new();
    let outcome = Driver::execute(&model, &toolchain, root, &opts()).unwrap();

    assert_eq!(outcome.config, BuildConfig::Release);
    assert!(root.join("build/release/app").exists());
    assert!(!root.join("build/release/app_d").exists());
}
