//! Translation of local filesystem paths into R3 virtual paths.
//!
//! Virtual paths always use `/`, whatever the host separator is. Nothing is
//! normalized: a local tree is flattened into whatever virtual root the
//! import was invoked against, one base name per directory level.

use std::path::Path;

/// Separator used by every virtual path.
pub const SEPARATOR: char = '/';

/// Maps local entries onto virtual directories under a fixed root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathTranslator {
    virtual_root: String,
}

impl PathTranslator {
    pub fn new(virtual_root: impl Into<String>) -> Self {
        Self {
            virtual_root: virtual_root.into(),
        }
    }

    pub fn virtual_root(&self) -> &str {
        &self.virtual_root
    }

    /// A file imported on its own lands directly in the virtual root.
    pub fn for_file(&self) -> String {
        self.virtual_root.clone()
    }

    /// A directory imported on its own becomes `<root>/<base name>`.
    pub fn for_directory(&self, local_dir: &Path) -> String {
        child(&self.virtual_root, &base_name(local_dir))
    }

    /// Virtual directory of `local_entry` when the import was started at
    /// `local_root`.
    ///
    /// If both paths are the same the entry is a single imported file. An
    /// entry outside `local_root` maps to the root directory's translation.
    pub fn translate(&self, local_root: &Path, local_entry: &Path) -> String {
        if local_entry == local_root {
            return self.for_file();
        }

        let mut virtual_dir = self.for_directory(local_root);
        let relative_parent = local_entry
            .parent()
            .and_then(|parent| parent.strip_prefix(local_root).ok());
        if let Some(rel) = relative_parent {
            for component in rel.components() {
                virtual_dir = child(&virtual_dir, &component.as_os_str().to_string_lossy());
            }
        }
        virtual_dir
    }
}

/// Append one directory level to an already translated virtual path.
///
/// Trailing separators on `parent` are trimmed first, so `child("/", "a")`
/// is `/a`. An empty `name` leaves `parent` unchanged.
pub fn child(parent: &str, name: &str) -> String {
    if name.is_empty() {
        return parent.to_string();
    }
    format!("{}{}{}", parent.trim_end_matches(SEPARATOR), SEPARATOR, name)
}

/// Final component of a local path, resolving `.`-style paths through the
/// filesystem. Returns an empty string when no name can be determined.
pub fn base_name(path: &Path) -> String {
    if let Some(name) = path.file_name() {
        return name.to_string_lossy().into_owned();
    }
    std::fs::canonicalize(path)
        .ok()
        .and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
        .unwrap_or_default()
}
