use std::fmt;
use std::str::FromStr;

/// Version suffix produced for a shader model the resolver does not know.
pub const UNKNOWN_VERSION: &str = "69";

/// Whole profile produced for a stage the resolver does not know.
pub const UNKNOWN_PROFILE: &str = "broken";

/// A programmable pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ShaderStage {
    Vertex,
    Pixel,
    Compute,
    Geometry,
    Hull,
    Domain,
}

impl ShaderStage {
    pub const ALL: [ShaderStage; 6] = [
        ShaderStage::Vertex,
        ShaderStage::Pixel,
        ShaderStage::Compute,
        ShaderStage::Geometry,
        ShaderStage::Hull,
        ShaderStage::Domain,
    ];

    /// Stages that have an entry-point manifest and get compiled.
    pub const DISPATCHED: [ShaderStage; 3] =
        [ShaderStage::Vertex, ShaderStage::Pixel, ShaderStage::Compute];

    /// Lowercase profile prefix, e.g. `vs` for vertex shaders.
    pub fn prefix(self) -> &'static str {
        match self {
            ShaderStage::Vertex => "vs",
            ShaderStage::Pixel => "ps",
            ShaderStage::Compute => "cs",
            ShaderStage::Geometry => "gs",
            ShaderStage::Hull => "hs",
            ShaderStage::Domain => "ds",
        }
    }

    /// Name of the output subdirectory holding this stage's bytecode.
    pub fn dir_name(self) -> String {
        self.prefix().to_ascii_uppercase()
    }
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.dir_name())
    }
}

impl FromStr for ShaderStage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "vertex" | "vs" => Ok(ShaderStage::Vertex),
            "pixel" | "fragment" | "ps" => Ok(ShaderStage::Pixel),
            "compute" | "cs" => Ok(ShaderStage::Compute),
            "geometry" | "gs" => Ok(ShaderStage::Geometry),
            "hull" | "hs" => Ok(ShaderStage::Hull),
            "domain" | "ds" => Ok(ShaderStage::Domain),
            _ => Err(format!("unknown shader stage `{s}`")),
        }
    }
}

/// A shader model token as given on the command line, e.g. `SM5`.
///
/// The token is kept verbatim: it names the output directory and the
/// preprocessor define passed to the compiler even when it is not one the
/// resolver recognises.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShaderModel(String);

impl ShaderModel {
    /// Wraps a model token without validating it.
    ///
    /// # Arguments
    ///
    /// * `token` - Model name as typed (e.g., "SM41")
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The token exactly as given.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Profile version suffix for this model, if the model is known.
    pub fn version(&self) -> Option<&'static str> {
        match self.0.as_str() {
            "SM2" => Some("2_0"),
            "SM4" => Some("4_0"),
            "SM41" => Some("4_1"),
            "SM5" => Some("5_0"),
            _ => None,
        }
    }
}

impl fmt::Display for ShaderModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ShaderModel {
    fn from(token: &str) -> Self {
        Self::new(token)
    }
}

/// Compiler target profile string such as `vs_5_0`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TargetProfile(String);

impl TargetProfile {
    /// Combines the stage prefix with the model's version suffix.
    ///
    /// Unknown models resolve to the `69` version rather than failing, so one
    /// bad token does not abort the rest of a multi-model batch. The compiler
    /// rejects the resulting profile and says so in its own output.
    pub fn resolve(model: &ShaderModel, stage: ShaderStage) -> Self {
        let version = model.version().unwrap_or(UNKNOWN_VERSION);
        Self(format!("{}_{}", stage.prefix(), version))
    }

    /// Resolves from raw tokens. An unrecognised stage yields `broken`.
    pub fn resolve_named(model: &str, stage: &str) -> Self {
        match stage.parse::<ShaderStage>() {
            Ok(stage) => Self::resolve(&ShaderModel::new(model), stage),
            Err(_) => Self(UNKNOWN_PROFILE.to_string()),
        }
    }

    /// True when either half of the profile fell back to a sentinel.
    pub fn is_sentinel(&self) -> bool {
        self.0 == UNKNOWN_PROFILE || self.0.ends_with(UNKNOWN_VERSION)
    }

    /// The string handed to the compiler's `/T` switch.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TargetProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_known_model_and_stage_resolves() {
        let models = [("SM2", "2_0"), ("SM4", "4_0"), ("SM41", "4_1"), ("SM5", "5_0")];
        let prefixes = ["vs", "ps", "cs", "gs", "hs", "ds"];
        let mut seen = std::collections::HashSet::new();
        for (stage, prefix) in ShaderStage::ALL.into_iter().zip(prefixes) {
            assert_eq!(stage.prefix(), prefix);
            for (model, version) in models {
                let profile = TargetProfile::resolve(&ShaderModel::new(model), stage);
                assert_eq!(profile.as_str(), format!("{prefix}_{version}"));
                assert!(!profile.is_sentinel());
                assert_eq!(TargetProfile::resolve_named(model, stage.prefix()), profile);
                seen.insert(profile);
            }
        }
        assert_eq!(seen.len(), 24);
        assert!(seen.contains(&TargetProfile::resolve_named("SM41", "geometry")));
    }

    #[test]
    fn unknown_model_falls_back_to_sentinel_version() {
        let profile = TargetProfile::resolve(&ShaderModel::new("SM6"), ShaderStage::Pixel);
        assert_eq!(profile.as_str(), "ps_69");
        assert!(profile.is_sentinel());
    }

    #[test]
    fn unknown_stage_falls_back_to_broken() {
        let profile = TargetProfile::resolve_named("SM5", "tessellation");
        assert_eq!(profile.as_str(), "broken");
        assert!(profile.is_sentinel());

        // Both halves unknown still yields the stage sentinel.
        assert_eq!(TargetProfile::resolve_named("nope", "nope").as_str(), "broken");
    }

    #[test]
    fn stage_names_parse_case_insensitively() {
        assert_eq!("Vertex".parse::<ShaderStage>(), Ok(ShaderStage::Vertex));
        assert_eq!("PS".parse::<ShaderStage>(), Ok(ShaderStage::Pixel));
        assert_eq!("fragment".parse::<ShaderStage>(), Ok(ShaderStage::Pixel));
        assert_eq!(TargetProfile::resolve_named("SM41", "cs").as_str(), "cs_4_1");
    }

    #[test]
    fn every_stage_has_a_distinct_directory() {
        let mut dirs: Vec<String> = ShaderStage::ALL.iter().map(|s| s.dir_name()).collect();
        dirs.sort();
        dirs.dedup();
        assert_eq!(dirs.len(), ShaderStage::ALL.len());
        assert_eq!(ShaderStage::Pixel.dir_name(), "PS");
    }
}
