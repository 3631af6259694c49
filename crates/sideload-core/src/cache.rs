//! Process-lifetime record of where packages were resolved from.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Where a package was found during import.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallLocation {
    /// Loadable from the ambient installation; nothing was installed.
    Local,
    /// Installed by the package runner into this `node_modules` root.
    TempDir(PathBuf),
}

/// Maps canonical package names to where they were resolved.
///
/// Owned by the importer: an entry exists exactly when the package has been
/// successfully imported during this importer's lifetime. Entries are never
/// removed and nothing is persisted across processes. Path resolution reads
/// this map to answer "where did that import come from" after the fact.
#[derive(Debug, Default)]
pub struct InstallCache {
    entries: HashMap<String, InstallLocation>,
}

impl InstallCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up where a package was resolved, if it was.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&InstallLocation> {
        self.entries.get(name)
    }

    /// Record that a package resolved from the ambient installation.
    pub fn mark_local(&mut self, name: &str) {
        self.entries.insert(name.to_string(), InstallLocation::Local);
    }

    /// Record that a package was installed into a temporary root.
    pub fn mark_installed(&mut self, name: &str, root: &Path) {
        self.entries
            .insert(name.to_string(), InstallLocation::TempDir(root.to_path_buf()));
    }

    /// Number of resolved packages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether anything has been resolved yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
