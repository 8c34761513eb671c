//! R3 virtual filesystem -> local filesystem export.
//!
//! Files under a virtual path are written below a local target directory,
//! recreating the virtual directory layout relative to the exported path.
//! Writes are not transactional: a failure leaves earlier files in place
//! and re-running overwrites them.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::errors::ExportError;
use crate::identity::IdentityMap;
use crate::models::VirtualFile;
use crate::report::{ExportReport, SkipReason, Skipped};
use crate::store::VfsStore;
use crate::vpath::SEPARATOR;

/// Default name of the owner-mapping sidecar.
pub const OWNER_MAPPING_FILE: &str = "owner_mapping.txt";

#[derive(Debug, Clone)]
pub struct ExportOptions {
    pub recursive: bool,
    /// Append a `target=local` line per exported file to the sidecar.
    pub emit_owner_mapping: bool,
    /// Sidecar file name, relative to the export target directory.
    pub owner_mapping_file: String,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            recursive: false,
            emit_owner_mapping: false,
            owner_mapping_file: OWNER_MAPPING_FILE.into(),
        }
    }
}

/// Writes stored files back to the local filesystem.
pub struct ExportEngine<'a> {
    store: &'a dyn VfsStore,
    identity_map: &'a IdentityMap,
    options: ExportOptions,
}

impl<'a> ExportEngine<'a> {
    pub fn new(store: &'a dyn VfsStore, identity_map: &'a IdentityMap, options: ExportOptions) -> Self {
        Self {
            store,
            identity_map,
            options,
        }
    }

    pub fn options(&self) -> &ExportOptions {
        &self.options
    }

    /// Export the files stored at (or, when recursive, under) `virtual_path`
    /// into `target_dir`.
    pub fn export_path(
        &self,
        virtual_path: &str,
        target_dir: &Path,
    ) -> Result<ExportReport, ExportError> {
        info!(
            virtual_path,
            target = %target_dir.display(),
            recursive = self.options.recursive,
            "exporting"
        );
        create_dir(target_dir)?;

        let files = self.store.files_under(virtual_path, self.options.recursive)?;
        let prefix = virtual_path.trim_end_matches(SEPARATOR);
        let mut report = ExportReport::default();

        for file in &files {
            let dir = local_dir(target_dir, prefix, &file.virtual_path);
            create_dir(&dir)?;

            let dest = dir.join(&file.name);
            std::fs::write(&dest, &file.content).map_err(|source| ExportError::Write {
                path: dest.display().to_string(),
                source,
            })?;
            report.files_written += 1;
            debug!(id = file.id, dest = %dest.display(), bytes = file.content.len(), "file exported");

            if self.options.emit_owner_mapping {
                match self.append_owner_mapping(target_dir, file) {
                    Ok(()) => report.owner_mappings_written += 1,
                    Err(reason) => {
                        let skipped = Skipped {
                            path: format!("{}/{}", file.virtual_path.trim_end_matches(SEPARATOR), file.name),
                            subject: None,
                            reason,
                        };
                        warn!(entry = %skipped, "owner mapping skipped");
                        report.skipped.push(skipped);
                    }
                }
            }
        }

        info!(
            virtual_path,
            files = report.files_written,
            owner_mappings = report.owner_mappings_written,
            "export complete"
        );
        Ok(report)
    }

    fn append_owner_mapping(&self, target_dir: &Path, file: &VirtualFile) -> Result<(), SkipReason> {
        let owner = self
            .store
            .identity_by_id(file.owner_id)
            .map_err(|e| SkipReason::Failed(e.to_string()))?
            .ok_or_else(|| SkipReason::Failed(format!("owner identity {} not found", file.owner_id)))?;
        let local = self
            .identity_map
            .lookup_local_for(&owner.username)
            .unwrap_or_default();

        let sidecar = target_dir.join(&self.options.owner_mapping_file);
        let mut out = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&sidecar)
            .map_err(|e| SkipReason::Failed(format!("{}: {e}", sidecar.display())))?;
        writeln!(out, "{}={}", owner.username, local)
            .map_err(|e| SkipReason::Failed(format!("{}: {e}", sidecar.display())))?;
        Ok(())
    }
}

/// Local directory for a file stored at `stored_path` when `prefix` was
/// exported into `target_dir`. A stored path that only shares characters
/// with `prefix` (`/project` under `/proj`) keeps its full layout. Empty,
/// `.` and `..` segments are dropped so the result never leaves `target_dir`.
pub fn local_dir(target_dir: &Path, prefix: &str, stored_path: &str) -> PathBuf {
    let relative = match stored_path.strip_prefix(prefix) {
        Some(rest) if rest.is_empty() || rest.starts_with(SEPARATOR) => rest,
        _ => stored_path.trim_start_matches(SEPARATOR),
    };
    relative
        .split(SEPARATOR)
        .filter(|segment| !segment.is_empty() && *segment != "." && *segment != "..")
        .fold(target_dir.to_path_buf(), |dir, segment| dir.join(segment))
}

fn create_dir(dir: &Path) -> Result<(), ExportError> {
    std::fs::create_dir_all(dir).map_err(|source| ExportError::Write {
        path: dir.display().to_string(),
        source,
    })
}
