//! Modalities and the directories they are read from.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CystoIoError;

/// One aligned image stream of a sample.
///
/// The ordering is the channel order of loaded samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Modality {
    /// RGB endoscope frame.
    Color,
    /// Depth map (metres, replicated in each EXR channel).
    Depth,
    /// Camera-space surface normals.
    Normals,
}

impl Modality {
    /// All modalities in channel order.
    pub const ALL: [Modality; 3] = [Modality::Color, Modality::Depth, Modality::Normals];

    /// Lowercase name used in manifests and logs.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Modality::Color => "color",
            Modality::Depth => "depth",
            Modality::Normals => "normals",
        }
    }
}

impl fmt::Display for Modality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Modality {
    type Err = CystoIoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "color" => Ok(Modality::Color),
            "depth" => Ok(Modality::Depth),
            "normals" => Ok(Modality::Normals),
            other => Err(CystoIoError::UnknownModality(other.to_string())),
        }
    }
}

/// Root directory per modality.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataDirs {
    roots: BTreeMap<Modality, PathBuf>,
}

impl DataDirs {
    /// Colour and depth directories.
    pub fn new(color: impl Into<PathBuf>, depth: impl Into<PathBuf>) -> Self {
        let mut roots = BTreeMap::new();
        roots.insert(Modality::Color, color.into());
        roots.insert(Modality::Depth, depth.into());
        Self { roots }
    }

    /// Add the normals directory.
    pub fn with_normals(mut self, normals: impl Into<PathBuf>) -> Self {
        self.roots.insert(Modality::Normals, normals.into());
        self
    }

    /// Set the directory for any modality.
    pub fn with(mut self, modality: Modality, dir: impl Into<PathBuf>) -> Self {
        self.roots.insert(modality, dir.into());
        self
    }

    /// Directory of a modality, if configured.
    pub fn get(&self, modality: Modality) -> Option<&Path> {
        self.roots.get(&modality).map(PathBuf::as_path)
    }

    /// Configured modalities in channel order.
    pub fn modalities(&self) -> impl Iterator<Item = Modality> + '_ {
        self.roots.keys().copied()
    }

    /// `(modality, dir)` pairs in channel order.
    pub fn iter(&self) -> impl Iterator<Item = (Modality, &Path)> {
        self.roots.iter().map(|(m, p)| (*m, p.as_path()))
    }

    /// Number of configured modalities.
    pub fn len(&self) -> usize {
        self.roots.len()
    }

    /// Whether no modality is configured.
    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    pub(crate) fn into_map(self) -> BTreeMap<Modality, PathBuf> {
        self.roots
    }
}
