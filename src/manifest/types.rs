use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;

/// Association category tag.
///
/// Categories outside the set the resolver understands are kept verbatim so a
/// manifest round-trips, but they never match a resolver query.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Category {
    Flat,
    Dark,
    Std,
    StdStarsCats,
    Offset,
    RefDistortionX,
    RefDistortionY,
    DistortionX,
    DistortionY,
    Other(String),
}

impl Category {
    pub fn as_str(&self) -> &str {
        match self {
            Category::Flat => "FLAT",
            Category::Dark => "DARK",
            Category::Std => "STD",
            Category::StdStarsCats => "STDSTARS_CATS",
            Category::Offset => "OFFSET",
            Category::RefDistortionX => "REF_DISTORTION_X",
            Category::RefDistortionY => "REF_DISTORTION_Y",
            Category::DistortionX => "DISTORTION_X",
            Category::DistortionY => "DISTORTION_Y",
            Category::Other(name) => name,
        }
    }
}

impl From<String> for Category {
    fn from(value: String) -> Self {
        match value.as_str() {
            "FLAT" => Category::Flat,
            "DARK" => Category::Dark,
            "STD" => Category::Std,
            "STDSTARS_CATS" => Category::StdStarsCats,
            "OFFSET" => Category::Offset,
            "REF_DISTORTION_X" => Category::RefDistortionX,
            "REF_DISTORTION_Y" => Category::RefDistortionY,
            "DISTORTION_X" => Category::DistortionX,
            "DISTORTION_Y" => Category::DistortionY,
            _ => Category::Other(value),
        }
    }
}

impl From<Category> for String {
    fn from(value: Category) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One node of the association tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Association {
    pub category: Category,
    #[serde(default = "default_complete")]
    pub complete: bool,
    #[serde(default)]
    pub main_files: Vec<String>,
    #[serde(default)]
    pub associations: Vec<Association>,
}

fn default_complete() -> bool {
    true
}

/// Observation-block manifest: science frames plus their calibration tree.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub main_files: Vec<String>,
    #[serde(default)]
    pub associations: Vec<Association>,
}

/// Load a manifest from disk.
pub fn load_manifest(path: &Path) -> Result<Manifest> {
    let bytes = fs::read(path).with_context(|| format!("read manifest {}", path.display()))?;
    let manifest: Manifest = serde_json::from_slice(&bytes)
        .with_context(|| format!("parse manifest JSON {}", path.display()))?;
    Ok(manifest)
}
