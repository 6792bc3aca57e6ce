use crate::compile::Toolchain;
use crate::diagnostic::DiagnosticNormalizer;
use crate::error::{Error, Result};
use crate::layout::ensure_output_outside_sources;
use crate::profile::ShaderModel;
use crate::{
    DEFAULT_BYTECODE_EXTENSION, DEFAULT_COMPILER, DEFAULT_LAUNCHER, DEFAULT_OUTPUT_DIR,
    DEFAULT_SOURCE_EXTENSION,
};
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Everything a batch run needs. Built with [`BatchConfig::builder`].
#[derive(Debug, Clone)]
pub struct BatchConfig {
    pub source_dir: PathBuf,
    pub models: Vec<ShaderModel>,
    pub output_dir: PathBuf,
    pub toolchain: Toolchain,
    /// Maximum number of compilers running at once.
    pub jobs: usize,
    pub source_extension: String,
    pub bytecode_extension: String,
    pub normalizer: DiagnosticNormalizer,
}

impl BatchConfig {
    /// Creates a builder for a shader source directory.
    pub fn builder(source_dir: impl AsRef<Path>) -> BatchConfigBuilder {
        BatchConfigBuilder::new(source_dir)
    }
}

/// Builder for configuring a batch run.
///
/// # Example
///
/// ```rust,no_run
/// use fxc_batch::BatchConfig;
///
/// let config = BatchConfig::builder("Shaders")
///     .model("SM4")
///     .model("SM5")
///     .output_dir("CompiledShaders")
///     .jobs(8)
///     .build()
///     .expect("invalid batch configuration");
/// ```
pub struct BatchConfigBuilder {
    source_dir: PathBuf,
    models: Vec<ShaderModel>,
    output_dir: PathBuf,
    launcher: Option<OsString>,
    compiler: PathBuf,
    jobs: Option<usize>,
    source_extension: String,
    bytecode_extension: String,
    normalizer: DiagnosticNormalizer,
}

impl BatchConfigBuilder {
    /// Creates a new builder with default settings.
    ///
    /// # Arguments
    ///
    /// * `source_dir` - Directory holding the `.hlsl` sources and manifests
    pub fn new(source_dir: impl AsRef<Path>) -> Self {
        Self {
            source_dir: source_dir.as_ref().to_path_buf(),
            models: Vec::new(),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            launcher: Some(OsString::from(DEFAULT_LAUNCHER)),
            compiler: PathBuf::from(DEFAULT_COMPILER),
            jobs: None,
            source_extension: DEFAULT_SOURCE_EXTENSION.to_string(),
            bytecode_extension: DEFAULT_BYTECODE_EXTENSION.to_string(),
            normalizer: DiagnosticNormalizer::default(),
        }
    }

    /// Adds a shader model to compile for. Order is kept.
    ///
    /// # Arguments
    ///
    /// * `model` - Model token (e.g., "SM5")
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.models.push(ShaderModel::new(model));
        self
    }

    /// Adds several shader models, in iteration order.
    ///
    /// # Arguments
    ///
    /// * `models` - Model tokens (e.g., `["SM4", "SM5"]`)
    pub fn models<I, S>(mut self, models: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.models.extend(models.into_iter().map(ShaderModel::new));
        self
    }

    /// Sets the root of the compiled shader tree.
    ///
    /// The directory is deleted before every run, so it may not be the
    /// source directory or one of its ancestors.
    pub fn output_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.output_dir = dir.as_ref().to_path_buf();
        self
    }

    /// Sets the fxc executable.
    pub fn compiler(mut self, compiler: impl AsRef<Path>) -> Self {
        self.compiler = compiler.as_ref().to_path_buf();
        self
    }

    /// Sets the program used to launch the compiler, or `None` to run it
    /// directly.
    pub fn launcher(mut self, launcher: Option<impl Into<OsString>>) -> Self {
        self.launcher = launcher.map(Into::into);
        self
    }

    /// Caps the number of compilers running at once.
    ///
    /// Defaults to the number of available CPUs.
    pub fn jobs(mut self, jobs: usize) -> Self {
        self.jobs = Some(jobs);
        self
    }

    /// Sets the extension that marks a file as a shader source.
    ///
    /// # Arguments
    ///
    /// * `ext` - Extension without the dot (e.g., "hlsl")
    pub fn source_extension(mut self, ext: impl Into<String>) -> Self {
        self.source_extension = ext.into();
        self
    }

    /// Sets the extension given to compiled bytecode files.
    ///
    /// # Arguments
    ///
    /// * `ext` - Extension without the dot (e.g., "cso")
    pub fn bytecode_extension(mut self, ext: impl Into<String>) -> Self {
        self.bytecode_extension = ext.into();
        self
    }

    /// Replaces the diagnostic normalizer, e.g. to change the wine drive
    /// prefix or extend the deny list.
    ///
    /// # Arguments
    ///
    /// * `normalizer` - Normalizer applied to every compiler output line
    pub fn normalizer(mut self, normalizer: DiagnosticNormalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    /// Builds the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - No shader model was added
    /// - `jobs` was set to zero
    /// - The output directory is the source directory or contains it
    pub fn build(self) -> Result<BatchConfig> {
        if self.models.is_empty() {
            return Err(Error::InvalidConfig(
                "at least one shader model is required".to_string(),
            ));
        }
        let jobs = match self.jobs {
            Some(0) => return Err(Error::InvalidConfig("jobs must be at least 1".to_string())),
            Some(jobs) => jobs,
            None => std::thread::available_parallelism().map_or(1, |n| n.get()),
        };
        ensure_output_outside_sources(&self.source_dir, &self.output_dir)?;

        Ok(BatchConfig {
            source_dir: self.source_dir,
            models: self.models,
            output_dir: self.output_dir,
            toolchain: Toolchain::new(self.launcher, self.compiler),
            jobs,
            source_extension: self.source_extension,
            bytecode_extension: self.bytecode_extension,
            normalizer: self.normalizer,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsStr;

    #[test]
    fn defaults_match_the_wine_fxc_setup() {
        let config = BatchConfig::builder("Shaders").model("SM5").build().unwrap();
        assert_eq!(config.models, [ShaderModel::new("SM5")]);
        assert_eq!(config.output_dir, Path::new("CompiledShaders"));
        assert_eq!(config.toolchain.launcher.as_deref(), Some(OsStr::new("wine64")));
        assert_eq!(config.toolchain.compiler, Path::new("bin/fxc64.exe"));
        assert_eq!(config.source_extension, "hlsl");
        assert_eq!(config.bytecode_extension, "cso");
        assert!(config.jobs >= 1);
    }

    #[test]
    fn models_keep_command_line_order() {
        let config = BatchConfig::builder("Shaders")
            .models(["SM5", "SM2"])
            .model("SM41")
            .launcher(None::<OsString>)
            .jobs(2)
            .build()
            .unwrap();
        let models: Vec<&str> = config.models.iter().map(ShaderModel::as_str).collect();
        assert_eq!(models, ["SM5", "SM2", "SM41"]);
        assert!(config.toolchain.launcher.is_none());
        assert_eq!(config.jobs, 2);
    }

    #[test]
    fn rejects_empty_models_and_zero_jobs() {
        assert!(matches!(
            BatchConfig::builder("Shaders").build(),
            Err(Error::InvalidConfig(_))
        ));
        assert!(matches!(
            BatchConfig::builder("Shaders").model("SM5").jobs(0).build(),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn rejects_output_dir_that_would_delete_the_sources() {
        let dir = tempfile::tempdir().unwrap();
        let shaders = dir.path().join("Shaders");
        std::fs::create_dir(&shaders).unwrap();

        for output in [shaders.clone(), dir.path().to_path_buf()] {
            let result = BatchConfig::builder(&shaders)
                .model("SM5")
                .output_dir(&output)
                .build();
            assert!(matches!(result, Err(Error::InvalidConfig(_))), "{}", output.display());
        }

        let config = BatchConfig::builder(&shaders)
            .model("SM5")
            .output_dir(dir.path().join("CompiledShaders"))
            .build()
            .unwrap();
        assert_eq!(config.output_dir, dir.path().join("CompiledShaders"));
    }
}
