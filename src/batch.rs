use crate::builder::BatchConfig;
use crate::compile::{CompileTask, CompilerInvocation, CompilerRunner, Dispatcher, ProcessRunner};
use crate::diagnostic::{ConsoleSink, DiagnosticSink};
use crate::error::{Error, Result};
use crate::layout::{OutputTree, ensure_output_outside_sources};
use crate::manifest::{EntryPointTables, strip_extension};
use crate::profile::{ShaderModel, ShaderStage, TargetProfile};
use log::{info, warn};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// What a finished batch did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    /// Compiler invocations attempted.
    pub dispatched: usize,
    /// Invocations whose process could not be started.
    pub spawn_failures: usize,
}

/// Lists the shader sources directly inside `dir`, sorted by name.
pub fn enumerate_sources(dir: &Path, extension: &str) -> Result<Vec<PathBuf>> {
    let mut sources = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(dir).to_path_buf();
            Error::io(path, e.into())
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let matches = entry
            .path()
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case(extension));
        if matches {
            sources.push(entry.into_path());
        }
    }

    if sources.is_empty() {
        return Err(Error::NoShaderSources {
            dir: dir.to_path_buf(),
            extension: extension.to_string(),
        });
    }
    Ok(sources)
}

/// Expands sources × models × stages into one task per entry point.
///
/// A source with no entry points for a stage is skipped for that stage.
pub fn plan_tasks(
    models: &[ShaderModel],
    tables: &EntryPointTables,
    sources: &[PathBuf],
    tree: &OutputTree,
) -> Vec<CompileTask> {
    let mut tasks = Vec::new();
    let mut outputs = HashSet::new();

    for model in models {
        if model.version().is_none() {
            warn!(
                "unknown shader model `{model}`; fxc will be asked for profiles like `{}`",
                TargetProfile::resolve(model, ShaderStage::Vertex)
            );
        }

        for source in sources {
            let Some(file_name) = source.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let shader = strip_extension(file_name);

            for stage in ShaderStage::DISPATCHED {
                let Some(entry_points) = tables.get(stage).and_then(|t| t.entry_points(shader)) else {
                    info!("No {stage} entry points for {file_name}");
                    continue;
                };
                for entry_point in entry_points {
                    let output = tree.artifact_path(model, stage, entry_point);
                    if !outputs.insert(output.clone()) {
                        warn!("{} is written by more than one entry point", output.display());
                    }
                    tasks.push(CompileTask::new(
                        source.clone(),
                        entry_point.clone(),
                        model.clone(),
                        stage,
                        output,
                    ));
                }
            }
        }
    }
    tasks
}

/// Runs a batch with the real compiler, streaming diagnostics to stderr.
pub fn run_batch(config: &BatchConfig) -> Result<BatchSummary> {
    run_batch_with(config, &ProcessRunner, &ConsoleSink::stderr())
}

/// Runs a batch with a caller-supplied runner and diagnostic sink.
///
/// # Errors
///
/// Returns an error if:
/// - The vertex or pixel manifest is missing or malformed
/// - The source directory holds no shader sources
/// - The output directory is the source directory or contains it
/// - The output tree cannot be recreated
pub fn run_batch_with(
    config: &BatchConfig,
    runner: &dyn CompilerRunner,
    sink: &dyn DiagnosticSink,
) -> Result<BatchSummary> {
    info!("Reading entry points!");
    let tables = EntryPointTables::load(&config.source_dir)?;
    for (file, entry_points) in tables.vertex.iter() {
        info!("File: {file}");
        for entry_point in entry_points {
            info!("\tEntryPoint: {entry_point}");
        }
    }

    let sources = enumerate_sources(&config.source_dir, &config.source_extension)?;

    // The fields are public, so a hand-built config skips the builder check.
    ensure_output_outside_sources(&config.source_dir, &config.output_dir)?;
    let tree = OutputTree::new(&config.output_dir, config.bytecode_extension.as_str());
    tree.prepare(&config.models, &ShaderStage::DISPATCHED)?;

    let invocations: Vec<CompilerInvocation> =
        plan_tasks(&config.models, &tables, &sources, &tree)
            .into_iter()
            .map(|task| config.toolchain.invocation(task, &config.source_dir))
            .collect();

    let dispatcher = Dispatcher::new(config.jobs, runner, &config.normalizer, sink)?;
    info!(
        "Compiling {} entry points on {} workers",
        invocations.len(),
        dispatcher.jobs()
    );
    let outcome = dispatcher.dispatch(&invocations);

    tree.copy_manifests(&config.source_dir)?;

    Ok(BatchSummary {
        dispatched: outcome.dispatched,
        spawn_failures: outcome.spawn_failures,
    })
}
