//! Batch compilation of HLSL shaders with fxc.
//!
//! Reads per-stage entry-point manifests from a shader directory, runs the
//! compiler once per entry point and shader model on a bounded worker pool,
//! and rewrites the compiler's diagnostics into editor-friendly
//! `file(line,col-col)` form as they stream in.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use fxc_batch::{BatchConfig, run_batch};
//!
//! let config = BatchConfig::builder("Shaders")
//!     .models(["SM4", "SM5"])
//!     .jobs(8)
//!     .build()
//!     .expect("invalid batch configuration");
//!
//! match run_batch(&config) {
//!     Ok(summary) => println!("ran fxc {} times", summary.dispatched),
//!     Err(e) => {
//!         eprintln!("shader build failed: {}", e);
//!         std::process::exit(1);
//!     }
//! }
//! ```
//!
//! Compiled bytecode lands in `CompiledShaders/<model>/<STAGE>/<entry>.cso`.

pub mod batch;
pub mod builder;
pub mod compile;
pub mod diagnostic;
pub mod error;
pub mod layout;
pub mod manifest;
pub mod profile;

pub use batch::{BatchSummary, run_batch, run_batch_with};
pub use builder::{BatchConfig, BatchConfigBuilder};
pub use compile::{CompileTask, CompilerInvocation, CompilerRunner, Dispatcher, ProcessRunner, Toolchain};
pub use diagnostic::{ConsoleSink, DiagnosticNormalizer, DiagnosticSink, MemorySink, OutputStream};
pub use error::{Error, Result};
pub use layout::{OutputTree, ensure_output_outside_sources};
pub use manifest::{EntryPointTable, EntryPointTables};
pub use profile::{ShaderModel, ShaderStage, TargetProfile};

const DEFAULT_OUTPUT_DIR: &str = "CompiledShaders";
const DEFAULT_LAUNCHER: &str = "wine64";
const DEFAULT_COMPILER: &str = "bin/fxc64.exe";
const DEFAULT_SOURCE_EXTENSION: &str = "hlsl";
const DEFAULT_BYTECODE_EXTENSION: &str = "cso";
