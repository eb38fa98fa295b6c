//! Parallel compile scheduling for one target.
//!
//! Compile tasks within a target are independent: a dispatcher feeds them
//! through a bounded queue to a pool of worker threads, each of which runs
//! one compiler process at a time. The collector (the calling thread)
//! serializes progress output and cache writebacks, which is what makes a
//! target's writebacks happen-before the next target's cache queries.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use anyhow::{bail, Result};
use crossbeam_channel::{bounded, unbounded};
use indicatif::{ProgressBar, ProgressStyle};

use crate::core::target::{Target, TargetKind};
use crate::toolchain::{CommandSpec, CompileOptions};
use crate::util::fs::ensure_dir;
use crate::util::process::{CapturedOutput, ProcessBuilder};

use super::BuildSession;

/// Outcome of a target's compile phase.
#[derive(Debug, Default)]
pub struct CompileReport {
    pub total: usize,
    pub compiled: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl CompileReport {
    pub fn success(&self) -> bool {
        self.failed == 0
    }

    /// Whether anything was actually rebuilt.
    pub fn did_work(&self) -> bool {
        self.compiled > 0
    }
}

struct CompileTask {
    options: CompileOptions,
    command: CommandSpec,
    args_line: String,
}

enum Outcome {
    /// Drained after a stop request; not recorded.
    Cancelled,
    /// The compiler process could not be spawned.
    SpawnError(String),
    /// The compiler ran to completion.
    Finished(CapturedOutput),
}

struct TaskResult {
    task: CompileTask,
    outcome: Outcome,
}

/// Compile every out-of-date translation unit of `target`.
pub fn compile_target(session: &BuildSession, target: &Target) -> Result<CompileReport> {
    let mut report = CompileReport::default();

    if target.kind() == TargetKind::Interface {
        return Ok(report);
    }

    let tasks = collect_tasks(session, target, &mut report)?;
    report.total = tasks.len() + report.skipped;

    if tasks.is_empty() {
        eprintln!("  {} is up to date", target.name());
        return Ok(report);
    }

    tracing::info!(
        "compiling {} file(s) for target `{}`",
        tasks.len(),
        target.name()
    );

    let total = tasks.len();
    let jobs = session.jobs.max(1);
    let stop = AtomicBool::new(false);
    let completed = AtomicUsize::new(0);

    let bar = if !session.verbose && total > 1 {
        let pb = ProgressBar::new(total as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .unwrap()
                .progress_chars("#>-"),
        );
        Some(pb)
    } else {
        None
    };

    let (task_tx, task_rx) = bounded::<CompileTask>(2 * jobs);
    let (result_tx, result_rx) = unbounded::<TaskResult>();

    let mut record_error: Option<anyhow::Error> = None;

    std::thread::scope(|scope| {
        // Workers: one in-flight compiler process each.
        for _ in 0..jobs {
            let task_rx = task_rx.clone();
            let result_tx = result_tx.clone();
            let stop = &stop;
            scope.spawn(move || {
                while let Ok(task) = task_rx.recv() {
                    let result = if stop.load(Ordering::Relaxed) {
                        TaskResult {
                            task,
                            outcome: Outcome::Cancelled,
                        }
                    } else {
                        run_task(session, target, task)
                    };
                    if result_tx.send(result).is_err() {
                        break;
                    }
                }
            });
        }
        drop(task_rx);
        drop(result_tx);

        // Dispatcher: enqueue everything, then close the queue.
        let stop_ref = &stop;
        scope.spawn(move || {
            for task in tasks {
                if stop_ref.load(Ordering::Relaxed) {
                    break;
                }
                if task_tx.send(task).is_err() {
                    break;
                }
            }
        });

        // Collector: progress accounting and cache writeback.
        for result in result_rx.iter() {
            match result.outcome {
                Outcome::Cancelled => {}
                Outcome::SpawnError(message) => {
                    report.failed += 1;
                    stop.store(true, Ordering::Relaxed);
                    print_failure(&bar, &result.task, None, &message, "");
                }
                Outcome::Finished(output) => {
                    let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
                    let ok = output.success() && result.task.options.object.exists();

                    if ok {
                        report.compiled += 1;
                        let line = format!(
                            "[{}/{}] {} ({:.2}s)",
                            done,
                            total,
                            display_source(target, &result.task.options.source),
                            output.elapsed.as_secs_f64()
                        );
                        match &bar {
                            Some(pb) => {
                                pb.inc(1);
                                pb.set_message(
                                    display_source(target, &result.task.options.source)
                                        .into_owned(),
                                );
                            }
                            None => eprintln!("  {}", line),
                        }

                        if let Err(e) = record(session, &result.task, &output) {
                            record_error.get_or_insert(e);
                            stop.store(true, Ordering::Relaxed);
                        }
                    } else {
                        report.failed += 1;
                        stop.store(true, Ordering::Relaxed);
                        print_failure(
                            &bar,
                            &result.task,
                            output.status_code,
                            &output.stdout,
                            &output.stderr,
                        );
                    }
                }
            }
        }
    });

    if let Some(pb) = bar {
        pb.finish_and_clear();
    }

    if let Some(e) = record_error {
        return Err(e);
    }

    Ok(report)
}

/// Derive compile options per translation unit and consult the cache; units
/// whose fingerprint evidence matches are skipped.
fn collect_tasks(
    session: &BuildSession,
    target: &Target,
    report: &mut CompileReport,
) -> Result<Vec<CompileTask>> {
    let settings = session.model.settings();
    let include_dirs = session.model.effective_include_dirs(target);

    let mut defines = settings.defines.clone();
    defines.extend(target.defines().iter().cloned());

    let obj_root = session.obj_dir();
    let obj_ext = session.toolchain.object_extension();
    let toolchain_id = session.toolchain.id();
    let pic = target.kind() == TargetKind::SharedLibrary;

    let mut tasks = Vec::new();

    for unit in target.translation_units() {
        let object = unit.object_path(target.base_dir(), &obj_root, obj_ext);
        let language = unit.kind.language().expect("translation unit has a language");

        // MSVC reports includes on stdout; the GNU families write .d files.
        let dep_file = (!session.is_msvc()).then(|| object.with_extension("d"));

        let options = CompileOptions {
            source: unit.path.clone(),
            object: object.clone(),
            language,
            configuration: session.config,
            c_standard: settings.c_standard,
            cpp_standard: settings.cpp_standard,
            include_dirs: include_dirs.clone(),
            defines: defines.clone(),
            extra_flags: target.compiler_flags().to_vec(),
            pch_header: target.pch_header().map(|p| p.to_path_buf()),
            pic,
            generate_deps: true,
            dep_file,
        };

        let command = session.toolchain.compile_command(&options);
        let args_line = command.to_line();

        if !session
            .cache
            .needs_rebuild(&unit.path, &object, &args_line, &toolchain_id)?
        {
            tracing::debug!("skipping {}", unit.path.display());
            report.skipped += 1;
            continue;
        }

        if let Some(parent) = object.parent() {
            ensure_dir(parent)?;
        }

        tasks.push(CompileTask {
            options,
            command,
            args_line,
        });
    }

    Ok(tasks)
}

fn run_task(session: &BuildSession, target: &Target, task: CompileTask) -> TaskResult {
    let mut builder = ProcessBuilder::new(&task.command.program)
        .args(task.command.args.iter())
        .cwd(target.base_dir());

    if let Some(overlay) = session.toolchain.env_overlay() {
        for (key, value) in overlay {
            builder = builder.env(key, value);
        }
    }

    match builder.exec_captured() {
        Ok(output) => TaskResult {
            task,
            outcome: Outcome::Finished(output),
        },
        Err(e) => TaskResult {
            task,
            outcome: Outcome::SpawnError(format!("{:#}", e)),
        },
    }
}

fn record(session: &BuildSession, task: &CompileTask, output: &CapturedOutput) -> Result<()> {
    let headers = match session
        .toolchain
        .parse_header_deps(&task.options, &output.stdout)
    {
        Ok(headers) => headers,
        Err(e) => {
            // Without dependency info the unit stays unrecorded and will
            // recompile next time.
            tracing::warn!(
                "failed to parse header dependencies for {}: {}",
                task.options.source.display(),
                e
            );
            return Ok(());
        }
    };

    session
        .cache
        .record_compilation(
            &task.options.source,
            &task.options.object,
            &task.args_line,
            &session.toolchain.id(),
            &headers,
        )
        .map_err(Into::into)
}

fn print_failure(
    bar: &Option<ProgressBar>,
    task: &CompileTask,
    code: Option<i32>,
    stdout: &str,
    stderr: &str,
) {
    let mut message = format!(
        "error: compilation failed for {} (exit code {})\n  command: {}",
        task.options.source.display(),
        code.map(|c| c.to_string()).unwrap_or_else(|| "?".into()),
        task.args_line,
    );
    if !stdout.trim().is_empty() {
        message.push_str(&format!("\n{}", stdout.trim_end()));
    }
    if !stderr.trim().is_empty() {
        message.push_str(&format!("\n{}", stderr.trim_end()));
    }

    match bar {
        Some(pb) => pb.println(message),
        None => eprintln!("{}", message),
    }
}

fn display_source<'a>(target: &Target, source: &'a std::path::Path) -> std::borrow::Cow<'a, str> {
    source
        .strip_prefix(target.base_dir())
        .unwrap_or(source)
        .to_string_lossy()
}

/// Report-level failure check shared by the driver.
pub fn ensure_success(report: &CompileReport, target_name: &str) -> Result<()> {
    if !report.success() {
        bail!(
            "{}/{} compile task(s) failed for target `{}`",
            report.failed,
            report.total,
            target_name
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_accounting() {
        let report = CompileReport {
            total: 5,
            compiled: 3,
            skipped: 2,
            failed: 0,
        };
        assert!(report.success());
        assert!(report.did_work());

        let clean = CompileReport {
            total: 4,
            compiled: 0,
            skipped: 4,
            failed: 0,
        };
        assert!(clean.success());
        assert!(!clean.did_work());
    }

    #[test]
    fn test_ensure_success() {
        let bad = CompileReport {
            total: 3,
            compiled: 1,
            skipped: 0,
            failed: 2,
        };
        let err = ensure_success(&bad, "app").unwrap_err();
        assert!(err.to_string().contains("2/3"));
        assert!(err.to_string().contains("app"));

        let good = CompileReport::default();
        assert!(ensure_success(&good, "app").is_ok());
    }
}
