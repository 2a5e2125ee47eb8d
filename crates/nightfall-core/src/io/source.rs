use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::consts::KIND_STACK;
use crate::error::Result;

use super::fits::{classify_image_type, FitsFile};
use super::loader::is_fits_path;

/// Where blocks find the auxiliary frames they need at initialization
/// (calibration frames, a stack image...).
pub trait ImageSource: Send + Sync {
    /// Paths of every frame of category `kind`, sorted.
    fn get(&self, kind: &str) -> Vec<PathBuf>;

    fn stack_image(&self) -> Option<PathBuf> {
        None
    }

    fn has_stack(&self) -> bool {
        self.stack_image().is_some()
    }
}

/// A source with no frames at all.
#[derive(Clone, Copy, Debug, Default)]
pub struct EmptySource;

impl ImageSource for EmptySource {
    fn get(&self, _kind: &str) -> Vec<PathBuf> {
        Vec::new()
    }
}

/// Frames grouped by category.
#[derive(Clone, Debug, Default)]
pub struct FileSource {
    files: BTreeMap<String, Vec<PathBuf>>,
    stack: Option<PathBuf>,
}

impl FileSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, kind: &str, path: impl Into<PathBuf>) {
        let paths = self.files.entry(kind.to_string()).or_default();
        paths.push(path.into());
        paths.sort();
    }

    pub fn with<P: Into<PathBuf>>(mut self, kind: &str, paths: impl IntoIterator<Item = P>) -> Self {
        for path in paths {
            self.add(kind, path);
        }
        self
    }

    pub fn set_stack(&mut self, path: impl Into<PathBuf>) {
        self.stack = Some(path.into());
    }

    pub fn with_stack(mut self, path: impl Into<PathBuf>) -> Self {
        self.set_stack(path);
        self
    }

    /// Classify every FITS file of `dir` (not recursive) by its `IMAGETYP`
    /// card. Files whose header cannot be read are skipped with a warning.
    /// The last file classified as a stack becomes the stack image.
    pub fn scan(dir: &Path) -> Result<Self> {
        let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.is_file() && is_fits_path(p))
            .collect();
        paths.sort();

        let mut source = Self::new();
        for path in paths {
            let kind = match FitsFile::open(&path) {
                Ok(fits) => fits
                    .header
                    .get_str("IMAGETYP")
                    .map(classify_image_type)
                    .unwrap_or(crate::consts::KIND_LIGHT),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping unreadable file");
                    continue;
                }
            };
            debug!(path = %path.display(), kind, "Classified");
            if kind == KIND_STACK {
                source.stack = Some(path);
            } else {
                source.add(kind, path);
            }
        }
        info!(
            dir = %dir.display(),
            files = source.len(),
            stack = source.stack.is_some(),
            "Scanned image folder"
        );
        Ok(source)
    }

    /// Number of categorized frames (the stack image excluded).
    pub fn len(&self) -> usize {
        self.files.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `(category, count)` pairs.
    pub fn summary(&self) -> Vec<(String, usize)> {
        self.files
            .iter()
            .map(|(kind, paths)| (kind.clone(), paths.len()))
            .collect()
    }
}

impl ImageSource for FileSource {
    fn get(&self, kind: &str) -> Vec<PathBuf> {
        self.files.get(kind).cloned().unwrap_or_default()
    }

    fn stack_image(&self) -> Option<PathBuf> {
        self.stack.clone()
    }
}
