// src/fs/mock.rs

use super::FileSystem;
use anyhow::{anyhow, Result};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

#[derive(Debug, Default)]
struct MockState {
    files: BTreeMap<PathBuf, Vec<u8>>,
    dirs: BTreeSet<PathBuf>,
}

/// In-memory filesystem. Clones share the same state, so a test can keep a
/// handle and add files while the code under test is polling.
#[derive(Debug, Clone, Default)]
pub struct MockFileSystem {
    state: Arc<Mutex<MockState>>,
}

impl MockFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_dir(&self, path: impl AsRef<Path>) {
        let mut state = self.state.lock().unwrap();
        insert_dir_chain(&mut state.dirs, path.as_ref());
    }

    pub fn add_file(&self, path: impl AsRef<Path>, content: impl Into<Vec<u8>>) {
        let path = path.as_ref().to_path_buf();
        let mut state = self.state.lock().unwrap();
        if let Some(parent) = path.parent() {
            insert_dir_chain(&mut state.dirs, parent);
        }
        state.files.insert(path, content.into());
    }

    pub fn remove_file(&self, path: impl AsRef<Path>) {
        let mut state = self.state.lock().unwrap();
        state.files.remove(path.as_ref());
    }

    /// Stored contents of `path`, if it is a file.
    pub fn contents(&self, path: impl AsRef<Path>) -> Option<Vec<u8>> {
        let state = self.state.lock().unwrap();
        state.files.get(path.as_ref()).cloned()
    }

    /// All file paths currently stored, sorted.
    pub fn files(&self) -> Vec<PathBuf> {
        let state = self.state.lock().unwrap();
        state.files.keys().cloned().collect()
    }
}

fn insert_dir_chain(dirs: &mut BTreeSet<PathBuf>, path: &Path) {
    let mut current = Some(path);
    while let Some(dir) = current {
        if dir.as_os_str().is_empty() || !dirs.insert(dir.to_path_buf()) {
            break;
        }
        current = dir.parent();
    }
}

impl FileSystem for MockFileSystem {
    fn write(&self, path: &Path, contents: &[u8]) -> Result<()> {
        if self.is_dir(path) {
            return Err(anyhow!("Is a directory: {:?}", path));
        }
        self.add_file(path, contents);
        Ok(())
    }

    fn is_file(&self, path: &Path) -> bool {
        let state = self.state.lock().unwrap();
        state.files.contains_key(path)
    }

    fn is_dir(&self, path: &Path) -> bool {
        let state = self.state.lock().unwrap();
        state.dirs.contains(path)
    }

    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>> {
        let state = self.state.lock().unwrap();
        if !state.dirs.contains(path) {
            return Err(anyhow!("Not a directory or not found: {:?}", path));
        }

        let children = state
            .files
            .keys()
            .chain(state.dirs.iter())
            .filter(|p| p.parent() == Some(path))
            .cloned()
            .collect();
        Ok(children)
    }
}
