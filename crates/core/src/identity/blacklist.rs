//! Identity names excluded from permission propagation and bulk identity
//! management.
//!
//! The file format is one name per line; blank lines are ignored and each
//! line is trimmed. Membership is case-insensitive.

use std::collections::BTreeSet;
use std::path::Path;

use tracing::{debug, info};

use super::mapping_file::fold;
use crate::errors::IdentityError;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Blacklist {
    names: BTreeSet<String>,
}

impl Blacklist {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: &str) {
        self.names.insert(fold(name.trim()));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(&fold(name))
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn parse(text: &str) -> Self {
        text.lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .collect()
    }

    /// Load a blacklist file from disk.
    pub fn load_file<P: AsRef<Path>>(path: P) -> Result<Self, IdentityError> {
        let path = path.as_ref();
        info!(path = %path.display(), "loading blacklist");

        if !path.exists() {
            return Err(IdentityError::MappingFileError {
                path: path.display().to_string(),
                detail: "file not found".into(),
            });
        }

        let blacklist = Self::parse(&std::fs::read_to_string(path)?);
        debug!(count = blacklist.len(), "loaded blacklist");
        Ok(blacklist)
    }
}

impl<'a> FromIterator<&'a str> for Blacklist {
    fn from_iter<I: IntoIterator<Item = &'a str>>(iter: I) -> Self {
        let mut blacklist = Self::new();
        for name in iter {
            blacklist.insert(name);
        }
        blacklist
    }
}
