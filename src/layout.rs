use crate::error::{Error, Result};
use crate::manifest::ALL_MANIFESTS;
use crate::profile::{ShaderModel, ShaderStage};
use log::{debug, info};
use std::path::{Component, Path, PathBuf};

/// The compiled shader directory tree.
///
/// Artifacts live at `<root>/<model>/<STAGE>/<entry point>.<ext>`, e.g.
/// `CompiledShaders/SM5/VS/SkinVS.cso`.
#[derive(Debug, Clone)]
pub struct OutputTree {
    root: PathBuf,
    extension: String,
}

impl OutputTree {
    /// Creates a tree rooted at `root`.
    ///
    /// # Arguments
    ///
    /// * `root` - Directory that will hold one subdirectory per shader model
    /// * `extension` - File extension of the bytecode files, without the dot
    pub fn new(root: impl AsRef<Path>, extension: impl Into<String>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            extension: extension.into(),
        }
    }

    /// Root directory of the tree.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding one model's bytecode for one stage, e.g.
    /// `CompiledShaders/SM5/PS`.
    pub fn stage_dir(&self, model: &ShaderModel, stage: ShaderStage) -> PathBuf {
        self.root.join(model.as_str()).join(stage.dir_name())
    }

    /// Path of the bytecode file for one entry point.
    pub fn artifact_path(&self, model: &ShaderModel, stage: ShaderStage, entry_point: &str) -> PathBuf {
        self.stage_dir(model, stage)
            .join(format!("{entry_point}.{}", self.extension))
    }

    /// Deletes any previous tree and creates a directory for every
    /// model and stage pair.
    ///
    /// Runs before dispatch so workers never race on directory creation.
    pub fn prepare(&self, models: &[ShaderModel], stages: &[ShaderStage]) -> Result<()> {
        if self.root.exists() {
            info!("Removing old {}", self.root.display());
            std::fs::remove_dir_all(&self.root).map_err(|e| Error::io(&self.root, e))?;
        }
        for model in models {
            for &stage in stages {
                let dir = self.stage_dir(model, stage);
                std::fs::create_dir_all(&dir).map_err(|e| Error::io(&dir, e))?;
            }
        }
        Ok(())
    }

    /// Copies whichever manifest files exist in `source_dir` into the root.
    /// Returns the names that were copied.
    pub fn copy_manifests(&self, source_dir: &Path) -> Result<Vec<&'static str>> {
        std::fs::create_dir_all(&self.root).map_err(|e| Error::io(&self.root, e))?;
        let mut copied = Vec::new();
        for name in ALL_MANIFESTS {
            let from = source_dir.join(name);
            if !from.is_file() {
                continue;
            }
            let to = self.root.join(name);
            std::fs::copy(&from, &to).map_err(|e| Error::io(&from, e))?;
            debug!("copied {} -> {}", from.display(), to.display());
            copied.push(name);
        }
        Ok(copied)
    }
}

/// Fails when `output_dir` is `source_dir` or one of its ancestors.
///
/// The output tree is deleted wholesale before every run, so such a
/// directory would take the shader sources with it.
///
/// # Arguments
///
/// * `source_dir` - Directory holding the shader sources and manifests
/// * `output_dir` - Root of the compiled shader tree
pub fn ensure_output_outside_sources(source_dir: &Path, output_dir: &Path) -> Result<()> {
    let source = resolve(source_dir);
    let output = resolve(output_dir);
    if source.starts_with(&output) {
        return Err(Error::InvalidConfig(format!(
            "output directory {} contains the shader sources in {}",
            output_dir.display(),
            source_dir.display()
        )));
    }
    Ok(())
}

/// Absolute form of `path` with `.` and `..` folded, and its longest
/// existing ancestor canonicalized so symlinks compare equal.
fn resolve(path: &Path) -> PathBuf {
    let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    let mut folded = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                folded.pop();
            }
            other => folded.push(other),
        }
    }

    let mut missing = Vec::new();
    let mut existing = folded.as_path();
    while !existing.exists() {
        let (Some(name), Some(parent)) = (existing.file_name(), existing.parent()) else {
            break;
        };
        missing.push(name);
        existing = parent;
    }
    let mut resolved = existing.canonicalize().unwrap_or_else(|_| existing.to_path_buf());
    resolved.extend(missing.into_iter().rev());
    resolved
}
