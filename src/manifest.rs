//! Entry-point manifests.
//!
//! Each stage has a plain text manifest in the shader source directory:
//!
//! ```text
//! // comment
//! Terrain.hlsl
//! 	TerrainVS
//! 	TerrainShadowVS
//! Water.hlsl
//! 	WaterVS
//! ```
//!
//! An unindented line opens a group keyed by the file name without its
//! extension. Tab-indented lines below it name that file's entry points.

use crate::error::{Error, Result};
use crate::profile::ShaderStage;
use log::info;
use std::collections::BTreeMap;
use std::io::BufRead;
use std::path::Path;

pub const VS_MANIFEST: &str = "VSEntryPoints.txt";
pub const PS_MANIFEST: &str = "PSEntryPoints.txt";
pub const CS_MANIFEST: &str = "CSEntryPoints.txt";

/// Copied next to the compiled output but never parsed.
pub const LAYOUT_MANIFEST: &str = "EntryLayouts.txt";

/// Every manifest file that is copied into the output root when present.
pub const ALL_MANIFESTS: [&str; 4] = [VS_MANIFEST, PS_MANIFEST, CS_MANIFEST, LAYOUT_MANIFEST];

const COMMENT: &str = "//";

/// Manifest file name for a stage, if that stage has one.
pub fn manifest_name(stage: ShaderStage) -> Option<&'static str> {
    match stage {
        ShaderStage::Vertex => Some(VS_MANIFEST),
        ShaderStage::Pixel => Some(PS_MANIFEST),
        ShaderStage::Compute => Some(CS_MANIFEST),
        _ => None,
    }
}

/// Stages whose manifest must exist for a batch to run.
pub fn is_required(stage: ShaderStage) -> bool {
    matches!(stage, ShaderStage::Vertex | ShaderStage::Pixel)
}

/// Removes the final `.ext` from a file name, if it has one.
pub fn strip_extension(file_name: &str) -> &str {
    match file_name.rfind('.') {
        Some(dot) => &file_name[..dot],
        None => file_name,
    }
}

/// Entry points of one stage, keyed by shader base name.
///
/// Entry points keep manifest order. The table is immutable once loaded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryPointTable {
    shaders: BTreeMap<String, Vec<String>>,
}

impl EntryPointTable {
    /// Entry points listed under one source file.
    ///
    /// # Arguments
    ///
    /// * `shader` - Source name without its extension, as it appears in
    ///   the manifest (e.g., "Static")
    pub fn entry_points(&self, shader: &str) -> Option<&[String]> {
        self.shaders.get(shader).map(Vec::as_slice)
    }

    /// Every source name with its entry points, sorted by name.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.shaders
            .iter()
            .map(|(name, eps)| (name.as_str(), eps.as_slice()))
    }

    /// Number of source files listed.
    pub fn len(&self) -> usize {
        self.shaders.len()
    }

    /// Whether the manifest listed no source files.
    pub fn is_empty(&self) -> bool {
        self.shaders.is_empty()
    }
}

/// Parses a manifest. `path` is used only for error messages.
pub fn parse_entry_points(reader: impl BufRead, path: &Path) -> Result<EntryPointTable> {
    let mut shaders: BTreeMap<String, Vec<String>> = BTreeMap::new();
    let mut current: Option<String> = None;

    for (index, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| Error::io(path, e))?;
        let line = line.trim_end_matches('\r');
        let line_no = index + 1;

        if line.starts_with(COMMENT) || line.trim().is_empty() {
            continue;
        }

        if line.starts_with('\t') {
            let Some(shader) = current.as_ref() else {
                return Err(Error::OrphanEntryPoint {
                    path: path.to_path_buf(),
                    line: line_no,
                });
            };
            if let Some(eps) = shaders.get_mut(shader) {
                eps.push(line.trim().to_string());
            }
        } else {
            let name = strip_extension(line.trim_end()).to_string();
            if shaders.contains_key(&name) {
                return Err(Error::DuplicateShader {
                    path: path.to_path_buf(),
                    line: line_no,
                    name,
                });
            }
            shaders.insert(name.clone(), Vec::new());
            current = Some(name);
        }
    }

    Ok(EntryPointTable { shaders })
}

/// Reads a manifest file from disk.
pub fn load_entry_points(path: &Path) -> Result<EntryPointTable> {
    let file = std::fs::File::open(path).map_err(|e| Error::io(path, e))?;
    parse_entry_points(std::io::BufReader::new(file), path)
}

/// The loaded tables for every dispatched stage.
#[derive(Debug, Clone, Default)]
pub struct EntryPointTables {
    pub vertex: EntryPointTable,
    pub pixel: EntryPointTable,
    pub compute: EntryPointTable,
}

impl EntryPointTables {
    /// Loads every stage manifest from `source_dir`.
    ///
    /// A missing vertex or pixel manifest stops the batch. A missing compute
    /// manifest leaves that table empty.
    pub fn load(source_dir: &Path) -> Result<Self> {
        let mut tables = Self::default();
        for stage in ShaderStage::DISPATCHED {
            let Some(name) = manifest_name(stage) else {
                continue;
            };
            let path = source_dir.join(name);
            if !path.is_file() {
                if is_required(stage) {
                    return Err(Error::MissingManifest { path });
                }
                info!("No {name}, skipping {stage} shaders");
                continue;
            }
            let table = load_entry_points(&path)?;
            if let Some(slot) = tables.get_mut(stage) {
                *slot = table;
            }
        }
        Ok(tables)
    }

    /// Table for a dispatched stage.
    ///
    /// # Arguments
    ///
    /// * `stage` - Vertex, pixel or compute; other stages have no manifest
    ///   and yield `None`
    pub fn get(&self, stage: ShaderStage) -> Option<&EntryPointTable> {
        match stage {
            ShaderStage::Vertex => Some(&self.vertex),
            ShaderStage::Pixel => Some(&self.pixel),
            ShaderStage::Compute => Some(&self.compute),
            _ => None,
        }
    }

    fn get_mut(&mut self, stage: ShaderStage) -> Option<&mut EntryPointTable> {
        match stage {
            ShaderStage::Vertex => Some(&mut self.vertex),
            ShaderStage::Pixel => Some(&mut self.pixel),
            ShaderStage::Compute => Some(&mut self.compute),
            _ => None,
        }
    }
}
