//! The module graph: which files exist and which package each one declares.

use std::sync::Arc;

use indexmap::IndexMap;
use rustc_hash::FxHashMap;

use crate::base::{FileId, Name};
use super::ids::DeclId;

/// A file registered in the module graph.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileEntry {
    /// Path for display in diagnostics.
    pub path: Arc<str>,
    /// Dotted package path, empty for the root package.
    pub package: Vec<Name>,
    /// The file's own declaration in the arena.
    pub decl: DeclId,
}

/// Every file of the project, in registration order, plus a package index.
///
/// Owned by the [`DeclTree`](super::DeclTree) and fixed once the tree is
/// built; resolution reads it without locking.
#[derive(Clone, Debug, Default)]
pub struct ModuleGraph {
    files: IndexMap<FileId, FileEntry>,
    packages: FxHashMap<Vec<Name>, Vec<FileId>>,
}

impl ModuleGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a file. Re-registering an id replaces the previous entry.
    pub fn insert(&mut self, file: FileId, entry: FileEntry) {
        if let Some(previous) = self.files.insert(file, entry.clone()) {
            if let Some(files) = self.packages.get_mut(&previous.package) {
                files.retain(|&f| f != file);
            }
        }
        self.packages.entry(entry.package).or_default().push(file);
    }

    pub fn get(&self, file: FileId) -> Option<&FileEntry> {
        self.files.get(&file)
    }

    pub fn path(&self, file: FileId) -> Option<&str> {
        self.files.get(&file).map(|entry| entry.path.as_ref())
    }

    pub fn contains(&self, file: FileId) -> bool {
        self.files.contains_key(&file)
    }

    /// Files declaring exactly this package, in registration order.
    pub fn files_in_package(&self, package: &[Name]) -> &[FileId] {
        self.packages.get(package).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn has_package(&self, package: &[Name]) -> bool {
        !self.files_in_package(package).is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (FileId, &FileEntry)> + '_ {
        self.files.iter().map(|(&id, entry)| (id, entry))
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}
