//! Recursive file discovery.
//!
//! Files are collected per modality directory, OS metadata is dropped and the
//! result is sorted so that index `i` of every modality refers to the same
//! scene.

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::{DataDirs, Modality};
use crate::error::{CystoIoError, Result};

/// Whether a path is filesystem metadata rather than data
/// (AppleDouble `._*` files and anything under them, `.DS_Store`).
pub fn is_os_metadata(path: &Path) -> bool {
    let s = path.to_string_lossy();
    if s.contains("._") {
        return true;
    }
    path.file_name().is_some_and(|name| name == ".DS_Store")
}

/// All regular files below `root`, sorted lexicographically by full path.
///
/// # Errors
/// Returns [`CystoIoError::Io`] if a directory cannot be read.
pub fn list_files(root: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut pending = vec![root.to_path_buf()];
    while let Some(dir) = pending.pop() {
        let entries = fs::read_dir(&dir).map_err(|e| CystoIoError::io(&dir, e))?;
        for entry in entries {
            let entry = entry.map_err(|e| CystoIoError::io(&dir, e))?;
            let path = entry.path();
            let file_type = entry.file_type().map_err(|e| CystoIoError::io(&path, e))?;
            if file_type.is_dir() {
                pending.push(path);
            } else if file_type.is_file() && !is_os_metadata(&path) {
                files.push(path);
            }
        }
    }
    files.sort();
    Ok(files)
}

/// Sorted file lists, one per modality, all of equal length.
#[derive(Debug, Clone, PartialEq)]
pub struct ModalityFiles {
    files: Vec<(Modality, Vec<PathBuf>)>,
}

impl ModalityFiles {
    /// Pair up pre-sorted lists.
    ///
    /// # Errors
    /// Returns [`CystoIoError::ModalityCountMismatch`] when the lists differ in
    /// length.
    pub fn new(files: Vec<(Modality, Vec<PathBuf>)>) -> Result<Self> {
        if let Some((reference, first)) = files.first() {
            for (modality, list) in &files[1..] {
                if list.len() != first.len() {
                    return Err(CystoIoError::ModalityCountMismatch {
                        reference: reference.to_string(),
                        expected: first.len(),
                        modality: modality.to_string(),
                        got: list.len(),
                    });
                }
            }
        }
        Ok(Self { files })
    }

    /// Discover every configured directory.
    ///
    /// # Errors
    /// Propagates [`list_files`] errors and count mismatches.
    pub fn discover(dirs: &DataDirs) -> Result<Self> {
        let files = dirs
            .iter()
            .map(|(modality, dir)| Ok((modality, list_files(dir)?)))
            .collect::<Result<Vec<_>>>()?;
        for (modality, list) in &files {
            log::debug!("found {} {} files", list.len(), modality);
        }
        Self::new(files)
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        self.files.first().map_or(0, |(_, l)| l.len())
    }

    /// Whether there are no samples.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Modalities in channel order.
    pub fn modalities(&self) -> impl Iterator<Item = Modality> + '_ {
        self.files.iter().map(|(m, _)| *m)
    }

    /// Paths of sample `index`, one per modality.
    pub fn sample(&self, index: usize) -> impl Iterator<Item = (Modality, &Path)> {
        self.files.iter().map(move |(m, l)| (*m, l[index].as_path()))
    }

    /// File list of one modality.
    pub fn get(&self, modality: Modality) -> Option<&[PathBuf]> {
        self.files
            .iter()
            .find(|(m, _)| *m == modality)
            .map(|(_, l)| l.as_slice())
    }
}
