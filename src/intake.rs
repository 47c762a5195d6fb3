// src/intake.rs

//! Image intake: builds the [`ImageSet`] from the upload directory.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::errors::{BatchrunError, Result};
use crate::fs::FileSystem;

/// Extensions (lower-case) admitted into the image set.
pub const ALLOWED_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "gif"];

pub fn is_allowed_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .is_some_and(|ext| ALLOWED_EXTENSIONS.contains(&ext.as_str()))
}

/// File name without directory and without its last extension.
pub fn file_stem(name: &str) -> &str {
    Path::new(name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(name)
}

/// Prefix filter applied to file names before the run.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PreloadFilter {
    #[default]
    None,
    /// Keep only images whose file name starts with one of the prefixes.
    SelectOnly(Vec<String>),
    /// Drop images whose file name starts with one of the prefixes.
    ExcludeOnly(Vec<String>),
}

impl PreloadFilter {
    pub fn admits(&self, file_name: &str) -> bool {
        match self {
            PreloadFilter::None => true,
            PreloadFilter::SelectOnly(prefixes) => {
                prefixes.iter().any(|p| file_name.starts_with(p.as_str()))
            }
            PreloadFilter::ExcludeOnly(prefixes) => {
                !prefixes.iter().any(|p| file_name.starts_with(p.as_str()))
            }
        }
    }
}

/// Mapping from image file name to its path. Read-only once built.
#[derive(Debug, Clone, Default)]
pub struct ImageSet {
    images: BTreeMap<String, PathBuf>,
    stems: HashSet<String>,
}

impl ImageSet {
    pub fn from_paths(paths: impl IntoIterator<Item = PathBuf>) -> Self {
        let mut images = BTreeMap::new();
        for path in paths {
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                images.insert(name.to_string(), path.clone());
            }
        }
        let stems = images.keys().map(|name| file_stem(name).to_string()).collect();
        Self { images, stems }
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    /// File names in iteration (batching) order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.images.keys().map(|s| s.as_str())
    }

    /// `(file name, path)` pairs in iteration order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &Path)> {
        self.images.iter().map(|(n, p)| (n.as_str(), p.as_path()))
    }

    /// Stems shared by more than one image (`a.jpg`, `a.png`), with the
    /// file names involved. Results are keyed by stem, so such images land
    /// on the same row.
    pub fn colliding_stems(&self) -> BTreeMap<&str, Vec<&str>> {
        let mut by_stem: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        for name in self.images.keys() {
            by_stem.entry(file_stem(name)).or_default().push(name.as_str());
        }
        by_stem.retain(|_, names| names.len() > 1);
        by_stem
    }

    /// Whether a parsed image name (file stem) belongs to this set.
    pub fn contains_stem(&self, stem: &str) -> bool {
        self.stems.contains(stem)
    }
}

/// Count the admissible image files currently in `dir`.
pub fn count_images(fs: &dyn FileSystem, dir: &Path) -> Result<usize> {
    let entries = fs.read_dir(dir)?;
    Ok(entries
        .iter()
        .filter(|p| fs.is_file(p) && is_allowed_image(p))
        .count())
}

/// Scan `dir` for images and apply the preloading filter.
pub fn load_images(fs: &dyn FileSystem, dir: &Path, filter: &PreloadFilter) -> Result<ImageSet> {
    if !fs.is_dir(dir) {
        return Err(BatchrunError::ConfigError(format!(
            "images folder not found: {}",
            dir.display()
        )));
    }

    let mut kept = Vec::new();
    let mut filtered_out = 0usize;
    for path in fs.read_dir(dir)? {
        if !fs.is_file(&path) || !is_allowed_image(&path) {
            continue;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if filter.admits(name) {
            kept.push(path);
        } else {
            debug!(image = %name, "image excluded by preloading filter");
            filtered_out += 1;
        }
    }

    let set = ImageSet::from_paths(kept);
    info!(
        dir = %dir.display(),
        images = set.len(),
        filtered_out,
        "loaded image set"
    );

    for (stem, names) in set.colliding_stems() {
        warn!(
            stem,
            images = ?names,
            "images share a name without extension; their results will be merged into one row"
        );
    }

    if set.is_empty() {
        return Err(BatchrunError::NoImages(dir.display().to_string()));
    }
    Ok(set)
}
