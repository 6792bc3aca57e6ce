use crate::diagnostic::{DiagnosticNormalizer, DiagnosticSink, OutputStream};
use crate::error::{Error, Result};
use crate::profile::{ShaderModel, ShaderStage, TargetProfile};
use log::{debug, error};
use rayon::prelude::*;
use std::ffi::{OsStr, OsString};
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// One compiler run: a single entry point of a source file, for one shader
/// model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileTask {
    /// Source file path as handed to the compiler.
    pub source: PathBuf,
    pub entry_point: String,
    pub model: ShaderModel,
    pub stage: ShaderStage,
    pub profile: TargetProfile,
    /// Where the compiler writes the bytecode.
    pub output: PathBuf,
}

impl CompileTask {
    pub fn new(
        source: impl Into<PathBuf>,
        entry_point: impl Into<String>,
        model: ShaderModel,
        stage: ShaderStage,
        output: impl Into<PathBuf>,
    ) -> Self {
        let profile = TargetProfile::resolve(&model, stage);
        Self {
            source: source.into(),
            entry_point: entry_point.into(),
            model,
            stage,
            profile,
            output: output.into(),
        }
    }
}

/// The external compiler and the program used to launch it.
///
/// With a launcher configured (`wine64` by default) the compiler path becomes
/// the launcher's first argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toolchain {
    pub launcher: Option<OsString>,
    pub compiler: PathBuf,
}

impl Toolchain {
    pub fn new(launcher: Option<OsString>, compiler: impl Into<PathBuf>) -> Self {
        Self {
            launcher,
            compiler: compiler.into(),
        }
    }

    /// Builds the fxc command line for a task.
    ///
    /// # Arguments
    ///
    /// * `task` - The entry point, model and profile to compile
    /// * `include_dir` - Directory searched for `#include`d files
    pub fn invocation(&self, task: CompileTask, include_dir: &Path) -> CompilerInvocation {
        let (program, mut args) = match &self.launcher {
            Some(launcher) => (launcher.clone(), vec![self.compiler.clone().into_os_string()]),
            None => (self.compiler.clone().into_os_string(), Vec::new()),
        };

        args.push("/I".into());
        args.push(include_dir.as_os_str().to_owned());
        args.push("/E".into());
        args.push(OsString::from(&task.entry_point));
        args.push("/T".into());
        args.push(OsString::from(task.profile.as_str()));
        args.push("/D".into());
        args.push(OsString::from(format!("{}=1", task.model)));
        args.push("/Fo".into());
        args.push(task.output.as_os_str().to_owned());
        args.push(task.source.as_os_str().to_owned());

        CompilerInvocation {
            program,
            args,
            task,
        }
    }
}

/// A fully formed compiler command line together with the task it runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilerInvocation {
    program: OsString,
    args: Vec<OsString>,
    task: CompileTask,
}

impl CompilerInvocation {
    pub fn program(&self) -> &OsStr {
        &self.program
    }

    pub fn args(&self) -> &[OsString] {
        &self.args
    }

    pub fn task(&self) -> &CompileTask {
        &self.task
    }

    pub fn command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.args);
        command
    }

    /// Shell-like rendering for logs.
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_os_str())
            .chain(self.args.iter().map(OsString::as_os_str))
            .map(OsStr::to_string_lossy)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Runs a compiler invocation to completion.
///
/// Every line the compiler prints, on either stream, is passed to `on_line`
/// together with the stream it came from, as soon as it is read. `on_line`
/// may be called from more than one thread.
/// Returns an error only when the process could not be run at all; the
/// compiler's exit status is not interpreted.
pub trait CompilerRunner: Sync {
    fn run(
        &self,
        invocation: &CompilerInvocation,
        on_line: &(dyn Fn(OutputStream, &str) + Sync),
    ) -> std::io::Result<()>;
}

/// Spawns the compiler as a child process.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessRunner;

impl CompilerRunner for ProcessRunner {
    fn run(
        &self,
        invocation: &CompilerInvocation,
        on_line: &(dyn Fn(OutputStream, &str) + Sync),
    ) -> std::io::Result<()> {
        debug!("{}", invocation.command_line());

        let mut child = invocation
            .command()
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        // Both pipes are drained at once so a chatty compiler cannot block on
        // a full pipe while we wait on the other one.
        std::thread::scope(|scope| {
            if let Some(stdout) = stdout {
                scope.spawn(move || forward_lines(stdout, OutputStream::Stdout, on_line));
            }
            if let Some(stderr) = stderr {
                forward_lines(stderr, OutputStream::Stderr, on_line);
            }
        });

        let status = child.wait()?;
        debug!(
            "{} ({} {}) exited with {status}",
            invocation.task.entry_point, invocation.task.model, invocation.task.stage
        );
        Ok(())
    }
}

fn forward_lines(
    reader: impl Read,
    stream: OutputStream,
    on_line: &(dyn Fn(OutputStream, &str) + Sync),
) {
    for line in BufReader::new(reader).split(b'\n') {
        let Ok(bytes) = line else {
            break;
        };
        // wine does not promise UTF-8.
        let text = String::from_utf8_lossy(&bytes);
        let text = text.trim_end_matches('\r');
        if !text.is_empty() {
            on_line(stream, text);
        }
    }
}

/// Counts from one dispatch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchOutcome {
    pub dispatched: usize,
    pub spawn_failures: usize,
}

/// Runs compiler invocations on a bounded worker pool and routes their
/// output through a [`DiagnosticNormalizer`] into a [`DiagnosticSink`].
pub struct Dispatcher<'a> {
    pool: rayon::ThreadPool,
    runner: &'a dyn CompilerRunner,
    normalizer: &'a DiagnosticNormalizer,
    sink: &'a dyn DiagnosticSink,
}

impl<'a> Dispatcher<'a> {
    /// Creates a dispatcher running at most `jobs` compilers at once.
    ///
    /// # Errors
    ///
    /// Returns an error if `jobs` is zero or the pool cannot be created.
    pub fn new(
        jobs: usize,
        runner: &'a dyn CompilerRunner,
        normalizer: &'a DiagnosticNormalizer,
        sink: &'a dyn DiagnosticSink,
    ) -> Result<Self> {
        if jobs == 0 {
            return Err(Error::InvalidConfig("jobs must be at least 1".to_string()));
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(jobs)
            .thread_name(|i| format!("fxc-worker-{i}"))
            .build()?;
        Ok(Self {
            pool,
            runner,
            normalizer,
            sink,
        })
    }

    pub fn jobs(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Runs every invocation exactly once and blocks until all have exited.
    pub fn dispatch(&self, invocations: &[CompilerInvocation]) -> DispatchOutcome {
        let spawn_failures = self.pool.install(|| {
            invocations
                .par_iter()
                .filter(|invocation| !self.run_one(invocation))
                .count()
        });
        DispatchOutcome {
            dispatched: invocations.len(),
            spawn_failures,
        }
    }

    fn run_one(&self, invocation: &CompilerInvocation) -> bool {
        let on_line = |stream: OutputStream, line: &str| {
            if let Some(line) = self.normalizer.normalize_from(stream, line) {
                self.sink.emit(&line);
            }
        };
        match self.runner.run(invocation, &on_line) {
            Ok(()) => true,
            Err(e) => {
                error!("failed to run `{}`: {e}", invocation.command_line());
                false
            }
        }
    }
}
