//! Train/validate/test split construction.
//!
//! A split is described per stage either by a regex over file paths or by a
//! ratio of the files left after every regex stage has taken its matches.
//! Regex stages run first, in stage order; the remaining pool is permuted
//! once and each ratio stage takes the next prefix of it.
//!
//! Regexes are matched against the full file path, data root included. A
//! pattern such as `.*val.*` therefore claims every file when the root
//! itself contains `val`; anchor on a path component (`.*/val/.*`) instead.
//! [`SplitBuilder::build`] warns when a pattern matches a data root.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::config::{DataDirs, Modality};
use crate::discovery::ModalityFiles;
use crate::error::{CystoIoError, Result};
use crate::manifest::SplitManifest;

/// A phase of the experiment.
///
/// The ordering is the order in which stages are assigned files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// Held-out evaluation.
    Test,
    /// Validation during training.
    Validate,
    /// Training.
    Train,
}

impl Stage {
    /// All stages in assignment order.
    pub const ALL: [Stage; 3] = [Stage::Test, Stage::Validate, Stage::Train];

    /// Lowercase name.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Stage::Test => "test",
            Stage::Validate => "validate",
            Stage::Train => "train",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Stage {
    type Err = CystoIoError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "test" => Ok(Stage::Test),
            "validate" | "val" => Ok(Stage::Validate),
            "train" => Ok(Stage::Train),
            other => Err(CystoIoError::UnknownStage(other.to_string())),
        }
    }
}

/// How one stage selects its files.
///
/// Serialized untagged: a string is a regex, a number a ratio.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StageSpec {
    /// Files whose path matches the pattern (searched anywhere in the path).
    Regex(String),
    /// Fraction of the pool left after regex stages.
    Ratio(f64),
}

/// How a ratio is turned into a file count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RatioRounding {
    /// `round(ratio * n)`.
    #[default]
    Nearest,
    /// `floor(ratio * n) + 1`.
    LegacyPlusOne,
}

impl RatioRounding {
    /// Number of files a stage with `ratio` takes from a pool of `n`.
    pub fn count(&self, ratio: f64, n: usize) -> usize {
        let exact = ratio * n as f64;
        match self {
            RatioRounding::Nearest => exact.round().max(0.0) as usize,
            RatioRounding::LegacyPlusOne => exact.floor().max(0.0) as usize + 1,
        }
    }
}

/// Per-stage selection rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SplitSpec {
    stages: BTreeMap<Stage, StageSpec>,
}

impl Default for SplitSpec {
    /// Sub-folder convention: `train`, `val` and `test` in the path.
    fn default() -> Self {
        Self::new()
            .with_regex(Stage::Train, ".*train.*")
            .with_regex(Stage::Validate, ".*val.*")
            .with_regex(Stage::Test, ".*test.*")
    }
}

impl SplitSpec {
    /// An empty spec; stages without a rule get no files.
    pub fn new() -> Self {
        Self {
            stages: BTreeMap::new(),
        }
    }

    /// Assign a stage by regex.
    pub fn with_regex(mut self, stage: Stage, pattern: impl Into<String>) -> Self {
        self.stages.insert(stage, StageSpec::Regex(pattern.into()));
        self
    }

    /// Assign a stage by ratio.
    pub fn with_ratio(mut self, stage: Stage, ratio: f64) -> Self {
        self.stages.insert(stage, StageSpec::Ratio(ratio));
        self
    }

    /// Rule for a stage.
    pub fn get(&self, stage: Stage) -> Option<&StageSpec> {
        self.stages.get(&stage)
    }

    /// Sum of all ratio rules.
    pub fn ratio_sum(&self) -> f64 {
        self.stages
            .values()
            .filter_map(|s| match s {
                StageSpec::Ratio(r) => Some(*r),
                StageSpec::Regex(_) => None,
            })
            .sum()
    }

    fn has_ratios(&self) -> bool {
        self.stages
            .values()
            .any(|s| matches!(s, StageSpec::Ratio(_)))
    }
}

/// Where a split comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum SplitSource {
    /// Build from discovered files.
    Spec(SplitSpec),
    /// Load a previously saved manifest.
    Manifest(PathBuf),
}

impl Default for SplitSource {
    fn default() -> Self {
        SplitSource::Spec(SplitSpec::default())
    }
}

impl From<SplitSpec> for SplitSource {
    fn from(spec: SplitSpec) -> Self {
        SplitSource::Spec(spec)
    }
}

/// Sample indices per stage.
pub type StageIndices = BTreeMap<Stage, Vec<usize>>;

/// Partition the samples of `files` according to `spec`.
///
/// # Errors
/// Returns [`CystoIoError::Regex`] for a bad pattern and
/// [`CystoIoError::InconsistentRegexMatch`] when a pattern matches only some
/// of a sample's paths.
pub fn partition(
    files: &ModalityFiles,
    spec: &SplitSpec,
    rounding: RatioRounding,
    rng: &mut StdRng,
) -> Result<StageIndices> {
    let mut pool: Vec<usize> = (0..files.len()).collect();
    let mut out: StageIndices = Stage::ALL.iter().map(|s| (*s, Vec::new())).collect();

    for stage in Stage::ALL {
        let Some(StageSpec::Regex(pattern)) = spec.get(stage) else {
            continue;
        };
        let re = Regex::new(pattern)?;
        let mut matched = Vec::new();
        for &index in &pool {
            let hits: Vec<bool> = files
                .sample(index)
                .map(|(_, p)| re.is_match(&p.to_string_lossy()))
                .collect();
            if hits.iter().all(|&h| h) {
                matched.push(index);
            } else if let Some(pos) = hits.iter().position(|&h| h) {
                let path = files
                    .sample(index)
                    .nth(pos)
                    .map(|(_, p)| p.to_path_buf())
                    .unwrap_or_default();
                return Err(CystoIoError::InconsistentRegexMatch {
                    stage: stage.to_string(),
                    regex: pattern.clone(),
                    path,
                });
            }
        }
        if matched.is_empty() {
            log::warn!("split regex {:?} for stage {} matched no files", pattern, stage);
        }
        let taken: HashSet<usize> = matched.iter().copied().collect();
        pool.retain(|i| !taken.contains(i));
        out.insert(stage, matched);
    }

    if spec.has_ratios() {
        let sum = spec.ratio_sum();
        if (sum - 1.0).abs() > 1e-6 {
            log::warn!("split ratios sum to {} instead of 1", sum);
        }
        let pool_count = pool.len();
        pool.shuffle(rng);
        let mut remaining = pool.as_slice();
        for stage in Stage::ALL {
            let Some(StageSpec::Ratio(ratio)) = spec.get(stage) else {
                continue;
            };
            let take = rounding.count(*ratio, pool_count).min(remaining.len());
            let (taken, rest) = remaining.split_at(take);
            out.insert(stage, taken.to_vec());
            remaining = rest;
        }
    }

    Ok(out)
}

/// Regex stages whose pattern already matches a modality root, and would
/// therefore claim every file below it.
///
/// # Errors
/// Returns [`CystoIoError::Regex`] for a bad pattern.
pub fn regexes_matching_roots(
    spec: &SplitSpec,
    dirs: &DataDirs,
) -> Result<Vec<(Stage, Modality, PathBuf)>> {
    let mut hits = Vec::new();
    for stage in Stage::ALL {
        let Some(StageSpec::Regex(pattern)) = spec.get(stage) else {
            continue;
        };
        let re = Regex::new(pattern)?;
        for (modality, root) in dirs.iter() {
            if re.is_match(&root.to_string_lossy()) {
                hits.push((stage, modality, root.to_path_buf()));
            }
        }
    }
    Ok(hits)
}

/// Builds a [`SplitManifest`] from directories and a [`SplitSource`].
#[derive(Debug, Clone)]
pub struct SplitBuilder {
    dirs: DataDirs,
    rounding: RatioRounding,
    seed: u64,
}

impl SplitBuilder {
    /// Create a builder over the given modality directories.
    pub fn new(dirs: DataDirs) -> Self {
        Self {
            dirs,
            rounding: RatioRounding::default(),
            seed: 0,
        }
    }

    /// Set the ratio rounding rule.
    pub fn with_rounding(mut self, rounding: RatioRounding) -> Self {
        self.rounding = rounding;
        self
    }

    /// Set the seed of the pool permutation.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Discover files and split them, or load a saved manifest.
    ///
    /// # Errors
    /// Propagates discovery, partition and manifest errors.
    pub fn build(&self, source: &SplitSource) -> Result<SplitManifest> {
        let manifest = match source {
            SplitSource::Manifest(path) => SplitManifest::load(path)?,
            SplitSource::Spec(spec) => {
                for (stage, modality, root) in regexes_matching_roots(spec, &self.dirs)? {
                    log::warn!(
                        "split regex for stage {} matches the {} root {}, every file below it goes to {}",
                        stage,
                        modality,
                        root.display(),
                        stage
                    );
                }
                let files = ModalityFiles::discover(&self.dirs)?;
                let mut rng = StdRng::seed_from_u64(self.seed);
                let indices = partition(&files, spec, self.rounding, &mut rng)?;
                SplitManifest::from_indices(self.dirs.clone(), &files, &indices)
            }
        };
        for stage in Stage::ALL {
            log::info!("split {}: {} samples", stage, manifest.len(stage));
        }
        Ok(manifest)
    }
}
