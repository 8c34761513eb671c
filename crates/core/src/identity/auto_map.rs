//! Discover the accounts holding access rules under a directory and propose
//! a mapping to the identities already known to the store.

use std::collections::{BTreeMap, VecDeque};
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use super::mapping_file::fold;
use super::IdentityMap;
use crate::acl::AclScanner;
use crate::models::Identity;
use crate::report::{SkipReason, Skipped};

/// Proposed mapping plus the paths that could not be scanned.
#[derive(Debug, Clone, Default)]
pub struct AutoMapOutcome {
    pub map: IdentityMap,
    pub skipped: Vec<Skipped>,
}

/// Scan `search_path` breadth-first and map every discovered account to the
/// best matching catalog identity, or to `""` when nothing matches.
///
/// The rules of each directory and of its direct files are collected.
/// Subdirectories are only visited when `recursive` is set. A path that is
/// not a directory yields an empty map.
pub fn auto_map(
    search_path: &Path,
    recursive: bool,
    scanner: &dyn AclScanner,
    catalog: &[Identity],
) -> AutoMapOutcome {
    let mut outcome = AutoMapOutcome::default();
    if !search_path.is_dir() {
        warn!(path = %search_path.display(), "auto-map search path is not a directory");
        return outcome;
    }

    info!(path = %search_path.display(), recursive, "scanning access rules");

    // Folded name -> first spelling seen.
    let mut discovered: BTreeMap<String, String> = BTreeMap::new();
    let mut queue = VecDeque::from([search_path.to_path_buf()]);

    while let Some(dir) = queue.pop_front() {
        collect_rules(&dir, scanner, &mut discovered, &mut outcome.skipped);

        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) => {
                outcome.skipped.push(skip(&dir, SkipReason::Failed(e.to_string())));
                continue;
            }
        };
        let mut subdirs: Vec<PathBuf> = Vec::new();
        for entry in entries.flatten() {
            let Ok(file_type) = entry.file_type() else {
                continue;
            };
            if file_type.is_file() {
                collect_rules(&entry.path(), scanner, &mut discovered, &mut outcome.skipped);
            } else if file_type.is_dir() && recursive {
                subdirs.push(entry.path());
            }
        }
        subdirs.sort();
        queue.extend(subdirs);
    }

    for local in discovered.into_values() {
        let target = best_match(&local, catalog).unwrap_or_default();
        debug!(local = %local, target = %target, "auto-map proposal");
        outcome.map.insert(local, target);
    }

    for skipped in &outcome.skipped {
        warn!(entry = %skipped, "auto-map skipped path");
    }
    info!(
        accounts = outcome.map.len(),
        skipped = outcome.skipped.len(),
        "auto-map complete"
    );
    outcome
}

fn collect_rules(
    path: &Path,
    scanner: &dyn AclScanner,
    discovered: &mut BTreeMap<String, String>,
    skipped: &mut Vec<Skipped>,
) {
    match scanner.rules_for(path) {
        Ok(rules) => {
            for rule in rules {
                let name = rule.account_name();
                if name.is_empty() {
                    continue;
                }
                discovered
                    .entry(fold(name))
                    .or_insert_with(|| name.to_string());
            }
        }
        Err(e) => skipped.push(skip(path, SkipReason::AclUnreadable(e.to_string()))),
    }
}

/// A case-insensitive catalog hit maps the account to itself, keeping the
/// local spelling. Otherwise the first catalog entry that starts with or
/// contains the folded name wins.
fn best_match(local: &str, catalog: &[Identity]) -> Option<String> {
    let folded = fold(local);
    if catalog.iter().any(|id| fold(&id.username) == folded) {
        return Some(local.to_string());
    }
    catalog
        .iter()
        .find(|id| {
            let candidate = fold(&id.username);
            candidate.starts_with(&folded) || candidate.contains(&folded)
        })
        .map(|id| id.username.clone())
}

fn skip(path: &Path, reason: SkipReason) -> Skipped {
    Skipped {
        path: path.display().to_string(),
        subject: None,
        reason,
    }
}
