use anyhow::Context;
use clap::Parser;
use fxc_batch::{BatchConfig, run_batch};
use log::{info, warn};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "fxc-batch",
    about = "Compile every HLSL entry point listed in the stage manifests for each shader model."
)]
struct Args {
    /// Directory holding the .hlsl sources and VS/PS/CSEntryPoints.txt
    source_dir: PathBuf,

    /// Shader models to build (SM2, SM4, SM41, SM5)
    #[arg(required = true, num_args = 1..)]
    models: Vec<String>,

    /// Maximum number of compilers running at once (defaults to CPU count)
    #[arg(short, long, value_name = "N")]
    jobs: Option<usize>,

    /// Root of the compiled shader tree, deleted and recreated on every run
    #[arg(short, long, value_name = "DIR")]
    output: Option<PathBuf>,

    /// fxc executable
    #[arg(long, value_name = "PATH")]
    compiler: Option<PathBuf>,

    /// Program used to launch fxc
    #[arg(long, value_name = "PROGRAM", conflicts_with = "no_launcher")]
    launcher: Option<String>,

    /// Run fxc directly instead of through the launcher
    #[arg(long, action = clap::ArgAction::SetTrue)]
    no_launcher: bool,

    /// Only log warnings and errors
    #[arg(short, long, action = clap::ArgAction::SetTrue)]
    quiet: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let default_filter = if args.quiet { "warn" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp(None)
        .init();

    let mut builder = BatchConfig::builder(&args.source_dir).models(args.models);
    if let Some(output) = &args.output {
        builder = builder.output_dir(output);
    }
    if let Some(compiler) = &args.compiler {
        builder = builder.compiler(compiler);
    }
    if args.no_launcher {
        builder = builder.launcher(None::<String>);
    } else if let Some(launcher) = args.launcher {
        builder = builder.launcher(Some(launcher));
    }
    if let Some(jobs) = args.jobs {
        builder = builder.jobs(jobs);
    }
    let config = builder.build().context("invalid arguments")?;

    let summary = run_batch(&config)
        .with_context(|| format!("shader build in {} failed", args.source_dir.display()))?;
    info!("Dispatched {} compiler invocations", summary.dispatched);
    if summary.spawn_failures > 0 {
        warn!("{} of them could not be started", summary.spawn_failures);
    }
    Ok(())
}
