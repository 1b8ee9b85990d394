//! Persisted split manifest.
//!
//! On disk the manifest is JSON of the form
//!
//! ```json
//! {
//!   "roots": { "color": "/data/color", "depth": "/data/depth" },
//!   "stages": { "train": { "color": ["a/0001.png"], "depth": ["a/0001.exr"] } }
//! }
//! ```
//!
//! Paths are written relative to their modality root and resolved against it
//! on load. In memory every path is absolute (or as given by discovery).

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::config::{DataDirs, Modality};
use crate::discovery::ModalityFiles;
use crate::error::{CystoIoError, Result};
use crate::split::{Stage, StageIndices};

type StageFiles = BTreeMap<Modality, Vec<PathBuf>>;

/// File lists per stage and modality.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SplitManifest {
    roots: BTreeMap<Modality, PathBuf>,
    stages: BTreeMap<Stage, StageFiles>,
}

impl SplitManifest {
    /// Assemble a manifest from discovered files and per-stage indices.
    pub fn from_indices(dirs: DataDirs, files: &ModalityFiles, indices: &StageIndices) -> Self {
        let mut stages = BTreeMap::new();
        for (stage, idx) in indices {
            let per_modality: StageFiles = files
                .modalities()
                .map(|m| {
                    let list = files.get(m).unwrap_or_default();
                    (m, idx.iter().map(|&i| list[i].clone()).collect())
                })
                .collect();
            stages.insert(*stage, per_modality);
        }
        Self {
            roots: dirs.into_map(),
            stages,
        }
    }

    /// Build directly from file lists.
    pub fn from_parts(
        roots: BTreeMap<Modality, PathBuf>,
        stages: BTreeMap<Stage, BTreeMap<Modality, Vec<PathBuf>>>,
    ) -> Self {
        Self { roots, stages }
    }

    /// Modality roots.
    pub fn roots(&self) -> &BTreeMap<Modality, PathBuf> {
        &self.roots
    }

    /// Number of samples in a stage.
    pub fn len(&self, stage: Stage) -> usize {
        self.stages
            .get(&stage)
            .and_then(|m| m.values().next())
            .map_or(0, Vec::len)
    }

    /// Whether every stage is empty.
    pub fn is_empty(&self) -> bool {
        Stage::ALL.iter().all(|s| self.len(*s) == 0)
    }

    /// Files of one modality in one stage.
    pub fn files(&self, stage: Stage, modality: Modality) -> &[PathBuf] {
        self.stages
            .get(&stage)
            .and_then(|m| m.get(&modality))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Per-sample path tuples of a stage, restricted to `modalities` and in
    /// their order.
    ///
    /// # Errors
    /// Returns [`CystoIoError::MissingModality`] if a requested modality has
    /// no list while the stage is non-empty.
    pub fn samples(&self, stage: Stage, modalities: &[Modality]) -> Result<Vec<Vec<PathBuf>>> {
        let n = self.len(stage);
        if n == 0 {
            return Ok(Vec::new());
        }
        let lists = modalities
            .iter()
            .map(|m| {
                let list = self.files(stage, *m);
                if list.len() != n {
                    return Err(CystoIoError::MissingModality {
                        modality: m.to_string(),
                        stage: stage.to_string(),
                    });
                }
                Ok(list)
            })
            .collect::<Result<Vec<_>>>()?;
        Ok((0..n)
            .map(|i| lists.iter().map(|l| l[i].clone()).collect())
            .collect())
    }

    /// Verify that no file is assigned to more than one stage.
    ///
    /// # Errors
    /// Returns [`CystoIoError::OverlappingStages`] naming the first shared file.
    pub fn check_disjoint(&self) -> Result<()> {
        let mut seen: HashMap<&Path, Stage> = HashMap::new();
        for (stage, per_modality) in &self.stages {
            for list in per_modality.values() {
                for path in list {
                    if let Some(first) = seen.insert(path.as_path(), *stage) {
                        if first != *stage {
                            return Err(CystoIoError::OverlappingStages {
                                path: path.clone(),
                                first: first.to_string(),
                                second: stage.to_string(),
                            });
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Write the manifest as JSON with root-relative paths.
    ///
    /// # Errors
    /// Returns [`CystoIoError::Io`] or [`CystoIoError::Json`].
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let relative = self.map_paths(|root, p| {
            p.strip_prefix(root).map(Path::to_path_buf).unwrap_or_else(|_| p.to_path_buf())
        });
        let json = serde_json::to_string_pretty(&relative)?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| CystoIoError::io(parent, e))?;
        }
        fs::write(path, json).map_err(|e| CystoIoError::io(path, e))?;
        log::info!("saved split manifest to {}", path.display());
        Ok(())
    }

    /// Read a manifest written by [`SplitManifest::save`].
    ///
    /// # Errors
    /// Returns [`CystoIoError::Io`] or [`CystoIoError::Json`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| CystoIoError::io(path, e))?;
        let relative: SplitManifest = serde_json::from_str(&text)?;
        log::info!("loaded split manifest from {}", path.display());
        Ok(relative.map_paths(|root, p| root.join(p)))
    }

    fn map_paths<F: Fn(&Path, &Path) -> PathBuf>(&self, f: F) -> Self {
        let empty = PathBuf::new();
        let stages = self
            .stages
            .iter()
            .map(|(stage, per_modality)| {
                let mapped: StageFiles = per_modality
                    .iter()
                    .map(|(m, list)| {
                        let root = self.roots.get(m).unwrap_or(&empty);
                        (*m, list.iter().map(|p| f(root.as_path(), p.as_path())).collect())
                    })
                    .collect();
                (*stage, mapped)
            })
            .collect();
        Self {
            roots: self.roots.clone(),
            stages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manifest() -> SplitManifest {
        let roots: BTreeMap<_, _> = [
            (Modality::Color, PathBuf::from("/data/color")),
            (Modality::Depth, PathBuf::from("/data/depth")),
        ]
        .into_iter()
        .collect();
        let mut stages = BTreeMap::new();
        stages.insert(
            Stage::Train,
            [
                (Modality::Color, vec![PathBuf::from("/data/color/a/0.png")]),
                (Modality::Depth, vec![PathBuf::from("/data/depth/a/0.exr")]),
            ]
            .into_iter()
            .collect(),
        );
        stages.insert(
            Stage::Test,
            [
                (Modality::Color, vec![PathBuf::from("/data/color/b/1.png")]),
                (Modality::Depth, vec![PathBuf::from("/data/depth/b/1.exr")]),
            ]
            .into_iter()
            .collect(),
        );
        SplitManifest::from_parts(roots, stages)
    }

    #[test]
    fn test_save_writes_relative_paths() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("split.json");
        manifest().save(&path).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("\"a/0.png\""));
        assert!(!text.contains("/data/color/a/0.png"));

        let loaded = SplitManifest::load(&path).unwrap();
        assert_eq!(loaded, manifest());
    }

    #[test]
    fn test_samples_zip_modalities() {
        let m = manifest();
        let samples = m.samples(Stage::Train, &[Modality::Color, Modality::Depth]).unwrap();
        assert_eq!(
            samples,
            vec![vec![
                PathBuf::from("/data/color/a/0.png"),
                PathBuf::from("/data/depth/a/0.exr")
            ]]
        );
        assert!(m.samples(Stage::Validate, &[Modality::Color]).unwrap().is_empty());
        assert!(m.samples(Stage::Train, &[Modality::Normals]).is_err());
    }

    #[test]
    fn test_disjoint() {
        let m = manifest();
        assert!(m.check_disjoint().is_ok());

        let mut stages = m.stages.clone();
        stages.insert(Stage::Validate, stages[&Stage::Train].clone());
        let overlapping = SplitManifest::from_parts(m.roots.clone(), stages);
        assert!(matches!(
            overlapping.check_disjoint(),
            Err(CystoIoError::OverlappingStages { .. })
        ));
    }
}
