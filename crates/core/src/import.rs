//! Local filesystem -> R3 virtual filesystem import.
//!
//! Each input path is imported into the store under a virtual root:
//!
//! 1. A regular file lands directly in the virtual root.
//! 2. A directory becomes `<root>/<base name>`; its folder row is ensured,
//!    its direct files are imported in name order and, when recursing, its
//!    subdirectories are visited depth-first in name order.
//! 3. When permission propagation is on, every access rule of an imported
//!    object is mapped to a target identity and stored as a permission row.
//!
//! Reading file bytes and persisting files are fatal on failure. Everything
//! in permission propagation is best effort and lands in the report.

use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::acl::AclScanner;
use crate::errors::{DatabaseError, ImportError};
use crate::identity::{Blacklist, IdentityMap};
use crate::models::{NewVirtualFile, ObjectKind, Permission};
use crate::owner::OwnerSource;
use crate::report::{ImportReport, SkipReason, Skipped};
use crate::store::VfsStore;
use crate::vpath::{self, PathTranslator};

/// Knobs of one import run.
#[derive(Debug, Clone)]
pub struct ImportOptions {
    pub recursive: bool,
    pub owner_source: OwnerSource,
    /// Virtual directory the inputs are imported into.
    pub virtual_root: String,
    /// Create mapped target identities that are missing from the store.
    pub create_missing_identities: bool,
    /// Translate access rules into permission rows.
    pub propagate_permissions: bool,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            recursive: false,
            owner_source: OwnerSource::default(),
            virtual_root: "/".into(),
            create_missing_identities: false,
            propagate_permissions: false,
        }
    }
}

/// Imports local files and directories into a [`VfsStore`].
pub struct ImportEngine<'a> {
    store: &'a dyn VfsStore,
    scanner: &'a dyn AclScanner,
    identity_map: &'a IdentityMap,
    blacklist: &'a Blacklist,
    options: ImportOptions,
    translator: PathTranslator,
}

impl<'a> ImportEngine<'a> {
    pub fn new(
        store: &'a dyn VfsStore,
        scanner: &'a dyn AclScanner,
        identity_map: &'a IdentityMap,
        blacklist: &'a Blacklist,
        options: ImportOptions,
    ) -> Self {
        let translator = PathTranslator::new(options.virtual_root.clone());
        Self {
            store,
            scanner,
            identity_map,
            blacklist,
            options,
            translator,
        }
    }

    pub fn options(&self) -> &ImportOptions {
        &self.options
    }

    /// Import every path in `paths`, in order.
    pub fn import_paths<P: AsRef<Path>>(&self, paths: &[P]) -> Result<ImportReport, ImportError> {
        let mut report = ImportReport::default();

        for path in paths {
            let path = path.as_ref();
            if path.is_file() {
                info!(path = %path.display(), root = %self.translator.virtual_root(), "importing file");
                self.import_file(path, &self.translator.translate(path, path), &mut report)?;
            } else if path.is_dir() {
                let virtual_dir = self.translator.for_directory(path);
                info!(
                    path = %path.display(),
                    virtual_dir = %virtual_dir,
                    recursive = self.options.recursive,
                    "importing directory"
                );
                self.import_dir(path, path, &virtual_dir, &mut report)?;
            } else {
                warn!(path = %path.display(), "path not found");
                report.skipped.push(Skipped {
                    path: path.display().to_string(),
                    subject: None,
                    reason: SkipReason::PathNotFound,
                });
            }
        }

        info!(
            files = report.files_imported,
            folders = report.folders_ensured,
            permissions = report.permissions_created,
            skipped = report.skipped.len(),
            "import complete"
        );
        Ok(report)
    }

    /// Import `dir`, found below the input directory `root`.
    fn import_dir(
        &self,
        root: &Path,
        dir: &Path,
        virtual_dir: &str,
        report: &mut ImportReport,
    ) -> Result<(), ImportError> {
        let owner = self.options.owner_source.owner_for(dir);
        let owner_id = self.store.resolve_or_create_identity(&owner, &owner)?;
        let folder_id = self.store.ensure_folder(virtual_dir, owner_id)?;
        report.folders_ensured += 1;
        debug!(virtual_dir, folder_id, "folder ensured");

        if self.options.propagate_permissions {
            self.propagate(dir, ObjectKind::Folder, folder_id, report);
        }

        let (files, subdirs) = list_dir(dir)?;
        for file in &files {
            self.import_file(file, &self.translator.translate(root, file), report)?;
        }

        if self.options.recursive {
            for subdir in &subdirs {
                let child = vpath::child(virtual_dir, &vpath::base_name(subdir));
                self.import_dir(root, subdir, &child, report)?;
            }
        }
        Ok(())
    }

    fn import_file(
        &self,
        path: &Path,
        virtual_dir: &str,
        report: &mut ImportReport,
    ) -> Result<(), ImportError> {
        let content = std::fs::read(path).map_err(|source| ImportError::ReadFile {
            path: path.display().to_string(),
            source,
        })?;

        let owner = self.options.owner_source.owner_for(path);
        let owner_id = self.store.resolve_or_create_identity(&owner, &owner)?;

        let file = NewVirtualFile {
            name: vpath::base_name(path),
            virtual_path: virtual_dir.to_string(),
            content,
            owner_id,
            created_at: Utc::now(),
        };
        let id = self.store.save_file(&file)?;
        report.files_imported += 1;
        debug!(id, name = %file.name, virtual_dir, owner = %owner, "file imported");

        if self.options.propagate_permissions {
            self.propagate(path, ObjectKind::File, id, report);
        }
        Ok(())
    }

    /// Store one permission row per mappable access rule of `path`.
    fn propagate(
        &self,
        path: &Path,
        object_kind: ObjectKind,
        object_id: i64,
        report: &mut ImportReport,
    ) {
        let display = path.display().to_string();
        let rules = match self.scanner.rules_for(path) {
            Ok(rules) => rules,
            Err(e) => {
                record(report, &display, None, SkipReason::AclUnreadable(e.to_string()));
                return;
            }
        };

        for rule in rules {
            let account = rule.account_name();
            if self.blacklist.contains(account) {
                record(report, &display, Some(account), SkipReason::Blacklisted);
                continue;
            }

            let target = match self.identity_map.lookup_target(account) {
                Some(target) if !target.is_empty() => target,
                _ => {
                    record(report, &display, Some(account), SkipReason::Unmapped);
                    continue;
                }
            };

            let identity_id = match self.target_identity(target) {
                Ok(Some(id)) => id,
                Ok(None) => {
                    record(
                        report,
                        &display,
                        Some(account),
                        SkipReason::MissingTargetIdentity(target.to_string()),
                    );
                    continue;
                }
                Err(e) => {
                    record(report, &display, Some(account), SkipReason::Failed(e.to_string()));
                    continue;
                }
            };

            let permission = Permission {
                identity_id,
                object_kind,
                object_id,
                rights: rule.rights.clone(),
            };
            match self.store.add_permission(&permission) {
                Ok(id) => {
                    report.permissions_created += 1;
                    debug!(id, %object_kind, object_id, target, rights = %rule.rights, "permission stored");
                }
                Err(e) => {
                    record(report, &display, Some(account), SkipReason::Failed(e.to_string()))
                }
            }
        }
    }

    /// Id of the target identity, creating it when allowed.
    fn target_identity(&self, target: &str) -> Result<Option<i64>, DatabaseError> {
        if let Some(identity) = self.store.identity_by_name(target)? {
            return Ok(Some(identity.id));
        }
        if !self.options.create_missing_identities {
            return Ok(None);
        }
        let id = self.store.resolve_or_create_identity(target, target)?;
        info!(target, id, "created missing target identity");
        Ok(Some(id))
    }
}

fn record(report: &mut ImportReport, path: &str, subject: Option<&str>, reason: SkipReason) {
    let skipped = Skipped {
        path: path.to_string(),
        subject: subject.map(str::to_string),
        reason,
    };
    warn!(entry = %skipped, "permission skipped");
    report.skipped.push(skipped);
}

/// Direct files and direct subdirectories of `dir`, each sorted by name.
/// Symlinks to files count as files; symlinked directories are not followed.
fn list_dir(dir: &Path) -> Result<(Vec<PathBuf>, Vec<PathBuf>), ImportError> {
    let read_dir_err = |source| ImportError::ReadDir {
        path: dir.display().to_string(),
        source,
    };

    let mut files = Vec::new();
    let mut subdirs = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(read_dir_err)? {
        let entry = entry.map_err(read_dir_err)?;
        let file_type = entry.file_type().map_err(read_dir_err)?;
        let path = entry.path();
        if file_type.is_dir() {
            subdirs.push(path);
        } else if file_type.is_file() || (file_type.is_symlink() && path.is_file()) {
            files.push(path);
        } else {
            debug!(path = %path.display(), "skipping non-regular entry");
        }
    }
    files.sort();
    subdirs.sort();
    Ok((files, subdirs))
}
