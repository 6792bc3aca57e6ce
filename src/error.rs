use std::path::PathBuf;
use thiserror::Error;

/// Errors that abort a batch.
///
/// Compiler failures are not represented here: they reach the user only as
/// diagnostic text written by the compiler itself.
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A required manifest (vertex or pixel) does not exist.
    #[error("No {}!", path.display())]
    MissingManifest { path: PathBuf },

    /// An indented entry point appeared before any shader group was opened.
    #[error("{}:{line}: entry point listed before any shader file", path.display())]
    OrphanEntryPoint { path: PathBuf, line: usize },

    #[error("{}:{line}: shader `{name}` is listed more than once", path.display())]
    DuplicateShader {
        path: PathBuf,
        line: usize,
        name: String,
    },

    #[error("no *.{extension} shader sources found in {}", dir.display())]
    NoShaderSources { dir: PathBuf, extension: String },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
