//! Case-insensitive local ⇄ target identity map and its text file format.
//!
//! The mapping file format, one pair per line:
//!
//! ```text
//! # local account = R3 account
//! jdoe=john.doe
//! svc_backup=
//! ```
//!
//! Blank lines and lines starting with `#` are ignored, as is any line
//! without `=`. An empty right-hand side means "unresolved".

use std::collections::BTreeMap;
use std::path::Path;

use tracing::{debug, info, warn};

use crate::errors::IdentityError;

#[derive(Debug, Clone, PartialEq, Eq)]
struct Entry {
    local: String,
    target: String,
    /// Position of the first insertion of this key.
    order: usize,
}

/// Mapping from local account names to R3 account names.
///
/// Keys compare case-insensitively. The reverse lookup resolves duplicate
/// targets to the local name that was inserted first.
#[derive(Debug, Clone, Default)]
pub struct IdentityMap {
    entries: BTreeMap<String, Entry>,
    next_order: usize,
}

impl IdentityMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite the mapping for `local`. An overwritten key keeps
    /// its original position for reverse-lookup tie breaking.
    pub fn insert(&mut self, local: impl Into<String>, target: impl Into<String>) {
        let local = local.into();
        let target = target.into();
        let key = fold(&local);
        match self.entries.get_mut(&key) {
            Some(entry) => {
                entry.local = local;
                entry.target = target;
            }
            None => {
                let order = self.next_order;
                self.next_order += 1;
                self.entries.insert(
                    key,
                    Entry {
                        local,
                        target,
                        order,
                    },
                );
            }
        }
    }

    /// Target mapped to `local`, compared case-insensitively. An unresolved
    /// (empty) target is returned as `Some("")`.
    pub fn lookup_target(&self, local: &str) -> Option<&str> {
        self.entries.get(&fold(local)).map(|e| e.target.as_str())
    }

    /// Local name mapped to `target`, compared case-insensitively. When
    /// several locals share the target, the earliest inserted one wins.
    pub fn lookup_local_for(&self, target: &str) -> Option<&str> {
        let wanted = fold(target);
        self.entries
            .values()
            .filter(|e| fold(&e.target) == wanted)
            .min_by_key(|e| e.order)
            .map(|e| e.local.as_str())
    }

    pub fn contains_local(&self, local: &str) -> bool {
        self.entries.contains_key(&fold(local))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `(local, target)` pairs sorted case-insensitively by local name.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .values()
            .map(|e| (e.local.as_str(), e.target.as_str()))
    }

    /// Non-empty targets claimed by more than one local name.
    pub fn duplicate_targets(&self) -> Vec<String> {
        let mut seen: BTreeMap<String, (String, usize)> = BTreeMap::new();
        for entry in self.entries.values().filter(|e| !e.target.is_empty()) {
            seen.entry(fold(&entry.target))
                .or_insert_with(|| (entry.target.clone(), 0))
                .1 += 1;
        }
        seen.into_values()
            .filter(|(_, count)| *count > 1)
            .map(|(target, _)| target)
            .collect()
    }

    /// Parse the mapping text format.
    pub fn parse(text: &str) -> Self {
        let mut map = Self::new();
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if let Some((local, target)) = line.split_once('=') {
                map.insert(local.trim(), target.trim());
            }
        }

        let duplicates = map.duplicate_targets();
        if !duplicates.is_empty() {
            warn!(
                targets = ?duplicates,
                "several local accounts map to the same target; reverse lookups use the first"
            );
        }
        map
    }

    /// Render the mapping text format, one `local=target` line per entry,
    /// sorted by local name.
    pub fn render(&self) -> String {
        self.iter()
            .map(|(local, target)| format!("{local}={target}\n"))
            .collect()
    }

    /// Load a mapping file from disk.
    pub fn load_file<P: AsRef<Path>>(path: P) -> Result<Self, IdentityError> {
        let path = path.as_ref();
        info!(path = %path.display(), "loading identity mapping file");

        if !path.exists() {
            return Err(IdentityError::MappingFileError {
                path: path.display().to_string(),
                detail: "file not found".into(),
            });
        }

        let contents = std::fs::read_to_string(path)?;
        let map = Self::parse(&contents);
        debug!(count = map.len(), "loaded identity mappings");
        Ok(map)
    }

    /// Write the mapping to disk, replacing any existing file.
    pub fn save_file<P: AsRef<Path>>(&self, path: P) -> Result<(), IdentityError> {
        let path = path.as_ref();
        info!(path = %path.display(), "saving identity mapping file");
        std::fs::write(path, self.render())?;
        debug!(count = self.len(), "saved identity mappings");
        Ok(())
    }
}

impl<L: Into<String>, T: Into<String>> FromIterator<(L, T)> for IdentityMap {
    fn from_iter<I: IntoIterator<Item = (L, T)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (local, target) in iter {
            map.insert(local, target);
        }
        map
    }
}

/// Maps compare equal when they hold the same keys (case-insensitively)
/// with identical targets.
impl PartialEq for IdentityMap {
    fn eq(&self, other: &Self) -> bool {
        self.entries.len() == other.entries.len()
            && self.entries.iter().all(|(key, entry)| {
                other
                    .entries
                    .get(key)
                    .is_some_and(|o| o.target == entry.target)
            })
    }
}

impl Eq for IdentityMap {}

/// Case folding used for every identity comparison.
pub(crate) fn fold(name: &str) -> String {
    name.to_lowercase()
}
