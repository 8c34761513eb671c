//! End-to-end tests for import, export and identity mapping.
//!
//! These tests exercise the real engines with:
//! - Local directory trees created under `tempfile` directories
//! - Real SQLite databases (in memory)
//! - In-memory access rules, so results do not depend on the host ACLs

use std::cell::Cell;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use r3sync_core::acl::{AclRule, MemoryAclScanner};
use r3sync_core::db::Database;
use r3sync_core::errors::DatabaseError;
use r3sync_core::export::{ExportEngine, ExportOptions};
use r3sync_core::identity::{self, Blacklist, IdentityMap};
use r3sync_core::import::{ImportEngine, ImportOptions};
use r3sync_core::models::{Identity, NewVirtualFile, ObjectKind, Permission, VirtualFile};
use r3sync_core::owner::OwnerSource;
use r3sync_core::report::SkipReason;
use r3sync_core::store::VfsStore;

// ===========================================================================
// Helpers
// ===========================================================================

fn database() -> Database {
    let db = Database::in_memory().expect("failed to create in-memory db");
    db.initialize().expect("failed to initialize schema");
    db
}

fn options(root: &str, recursive: bool) -> ImportOptions {
    ImportOptions {
        recursive,
        owner_source: OwnerSource::Static("importer".into()),
        virtual_root: root.into(),
        ..ImportOptions::default()
    }
}

/// Build `proj/{a.txt, b.bin, sub/c.txt, sub/deeper/d.txt}` under `dir`.
fn sample_tree(dir: &Path) -> PathBuf {
    let proj = dir.join("proj");
    std::fs::create_dir_all(proj.join("sub/deeper")).unwrap();
    std::fs::write(proj.join("a.txt"), b"alpha").unwrap();
    std::fs::write(proj.join("b.bin"), [0u8, 159, 146, 150, 255]).unwrap();
    std::fs::write(proj.join("sub/c.txt"), b"gamma").unwrap();
    std::fs::write(proj.join("sub/deeper/d.txt"), b"").unwrap();
    proj
}

/// Every regular file under `root`, as (relative path, bytes), sorted.
fn snapshot(root: &Path) -> Vec<(PathBuf, Vec<u8>)> {
    let mut out = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        for entry in std::fs::read_dir(&dir).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                stack.push(path);
            } else {
                let rel = path.strip_prefix(root).unwrap().to_path_buf();
                out.push((rel, std::fs::read(&path).unwrap()));
            }
        }
    }
    out.sort();
    out
}

/// Store wrapper that fails every `add_permission` call.
struct NoPermissionStore<'a> {
    inner: &'a Database,
    attempts: Cell<usize>,
}

impl VfsStore for NoPermissionStore<'_> {
    fn resolve_or_create_identity(&self, name: &str, display: &str) -> Result<i64, DatabaseError> {
        self.inner.resolve_or_create_identity(name, display)
    }
    fn identity_by_name(&self, name: &str) -> Result<Option<Identity>, DatabaseError> {
        self.inner.identity_by_name(name)
    }
    fn identity_by_id(&self, id: i64) -> Result<Option<Identity>, DatabaseError> {
        self.inner.identity_by_id(id)
    }
    fn all_identities(&self) -> Result<Vec<Identity>, DatabaseError> {
        self.inner.all_identities()
    }
    fn delete_identity_by_name(&self, name: &str) -> Result<bool, DatabaseError> {
        self.inner.delete_identity_by_name(name)
    }
    fn ensure_folder(&self, path: &str, owner_id: i64) -> Result<i64, DatabaseError> {
        self.inner.ensure_folder(path, owner_id)
    }
    fn save_file(&self, file: &NewVirtualFile) -> Result<i64, DatabaseError> {
        VfsStore::save_file(self.inner, file)
    }
    fn files_under(&self, path: &str, recursive: bool) -> Result<Vec<VirtualFile>, DatabaseError> {
        self.inner.files_under(path, recursive)
    }
    fn add_permission(&self, _permission: &Permission) -> Result<i64, DatabaseError> {
        self.attempts.set(self.attempts.get() + 1);
        Err(DatabaseError::NotFound {
            entity: "connection".into(),
            id: "closed".into(),
        })
    }
}

// ===========================================================================
// Import / export
// ===========================================================================

#[test]
fn round_trip_reproduces_tree() {
    let tmp = TempDir::new().unwrap();
    let proj = sample_tree(tmp.path());
    let db = database();
    let (scanner, map, blacklist) = (MemoryAclScanner::new(), IdentityMap::new(), Blacklist::new());

    let report = ImportEngine::new(&db, &scanner, &map, &blacklist, options("/", true))
        .import_paths(&[&proj])
        .unwrap();
    assert_eq!(report.files_imported, 4);
    assert_eq!(report.folders_ensured, 3);
    assert!(report.skipped.is_empty());

    let out = tmp.path().join("restored");
    let export_options = ExportOptions {
        recursive: true,
        ..ExportOptions::default()
    };
    let report = ExportEngine::new(&db, &map, export_options)
        .export_path("/proj", &out)
        .unwrap();
    assert_eq!(report.files_written, 4);

    assert_eq!(snapshot(&proj), snapshot(&out));
}

#[test]
fn single_file_import_scenario() {
    let tmp = TempDir::new().unwrap();
    let file = tmp.path().join("report.txt");
    std::fs::write(&file, b"hello").unwrap();
    let db = database();
    let (scanner, map, blacklist) = (MemoryAclScanner::new(), IdentityMap::new(), Blacklist::new());

    ImportEngine::new(&db, &scanner, &map, &blacklist, options("/docs", false))
        .import_paths(&[&file])
        .unwrap();

    let files = db.get_files("/docs", false).unwrap();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].virtual_path, "/docs");
    assert_eq!(files[0].name, "report.txt");
    assert_eq!(files[0].content, b"hello");
}

#[test]
fn directory_import_scenario() {
    let tmp = TempDir::new().unwrap();
    let proj = sample_tree(tmp.path());
    let db = database();
    let (scanner, map, blacklist) = (MemoryAclScanner::new(), IdentityMap::new(), Blacklist::new());

    ImportEngine::new(&db, &scanner, &map, &blacklist, options("/", true))
        .import_paths(&[&proj])
        .unwrap();

    let top: Vec<_> = db
        .get_files("/proj", false)
        .unwrap()
        .into_iter()
        .map(|f| f.name)
        .collect();
    assert_eq!(top, vec!["a.txt", "b.bin"]);
    assert_eq!(db.get_files("/proj/sub", false).unwrap()[0].name, "c.txt");
    assert_eq!(db.get_files("/proj/sub/deeper", false).unwrap()[0].name, "d.txt");
    assert!(db.get_folder("/proj/sub/deeper").unwrap().is_some());
}

#[test]
fn recursive_export_scenario() {
    let db = database();
    let owner = db.get_or_create_user("alice", "Alice").unwrap();
    for (path, name) in [("/proj", "one.txt"), ("/proj/sub", "two.txt")] {
        VfsStore::save_file(
            &db,
            &NewVirtualFile {
                name: name.into(),
                virtual_path: path.into(),
                content: name.as_bytes().to_vec(),
                owner_id: owner,
                created_at: chrono::Utc::now(),
            },
        )
        .unwrap();
    }

    let tmp = TempDir::new().unwrap();
    let out = tmp.path().join("out");
    let export_options = ExportOptions {
        recursive: true,
        ..ExportOptions::default()
    };
    let map = IdentityMap::new();
    let report = ExportEngine::new(&db, &map, export_options)
        .export_path("/proj", &out)
        .unwrap();

    assert_eq!(report.files_written, 2);
    assert!(out.join("one.txt").is_file());
    assert!(out.join("sub").join("two.txt").is_file());
}

#[test]
fn blacklist_suppresses_mapped_rule() {
    let tmp = TempDir::new().unwrap();
    let file = tmp.path().join("payroll.xlsx");
    std::fs::write(&file, b"$$$").unwrap();

    let scanner = MemoryAclScanner::new().with_rules(
        &file,
        vec![
            AclRule::new("CORP\\Administrator", "rwx"),
            AclRule::new("CORP\\jdoe", "r--"),
        ],
    );
    let map = IdentityMap::parse("administrator=admin\njdoe=john.doe\n");
    let blacklist = Blacklist::parse("ADMINISTRATOR\n");
    let db = database();
    db.get_or_create_user("admin", "Admin").unwrap();
    db.get_or_create_user("john.doe", "John").unwrap();

    let mut opts = options("/hr", false);
    opts.propagate_permissions = true;
    let report = ImportEngine::new(&db, &scanner, &map, &blacklist, opts)
        .import_paths(&[&file])
        .unwrap();

    assert_eq!(report.permissions_created, 1);
    assert_eq!(report.skipped[0].reason, SkipReason::Blacklisted);
    assert_eq!(report.skipped[0].subject.as_deref(), Some("Administrator"));

    let stored = db.get_files("/hr", false).unwrap();
    let perms = db.list_permissions(ObjectKind::File, stored[0].id).unwrap();
    let admin = db.get_user_by_username("admin").unwrap().unwrap();
    assert_eq!(perms.len(), 1);
    assert!(perms.iter().all(|p| p.identity_id != admin.id));
}

#[test]
fn permission_rows_accumulate_on_reimport() {
    let tmp = TempDir::new().unwrap();
    let file = tmp.path().join("plan.md");
    std::fs::write(&file, b"v1").unwrap();

    let scanner = MemoryAclScanner::new().with_rules(&file, vec![AclRule::new("jdoe", "rw-")]);
    let map = IdentityMap::parse("jdoe=john.doe\n");
    let blacklist = Blacklist::new();
    let db = database();

    let mut opts = options("/", false);
    opts.propagate_permissions = true;
    opts.create_missing_identities = true;
    let engine = ImportEngine::new(&db, &scanner, &map, &blacklist, opts);
    engine.import_paths(&[&file]).unwrap();
    std::fs::write(&file, b"v2").unwrap();
    engine.import_paths(&[&file]).unwrap();

    let files = db.get_files("/", false).unwrap();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].content, b"v2");
    assert_eq!(db.count_permissions().unwrap(), 2);
}

#[test]
fn permission_store_failure_does_not_abort_import() {
    let tmp = TempDir::new().unwrap();
    let file = tmp.path().join("notes.txt");
    std::fs::write(&file, b"n").unwrap();

    let scanner = MemoryAclScanner::new().with_rules(&file, vec![AclRule::new("jdoe", "rw-")]);
    let map = IdentityMap::parse("jdoe=john.doe\n");
    let blacklist = Blacklist::new();
    let db = database();
    let store = NoPermissionStore {
        inner: &db,
        attempts: Cell::new(0),
    };

    let mut opts = options("/", false);
    opts.propagate_permissions = true;
    opts.create_missing_identities = true;
    let report = ImportEngine::new(&store, &scanner, &map, &blacklist, opts)
        .import_paths(&[&file, &tmp.path().join("missing.txt")])
        .unwrap();

    assert_eq!(store.attempts.get(), 1);
    assert_eq!(report.files_imported, 1);
    assert_eq!(report.permissions_created, 0);
    assert!(matches!(report.skipped[0].reason, SkipReason::Failed(_)));
    assert_eq!(report.skipped[1].reason, SkipReason::PathNotFound);
}

#[test]
fn owner_mapping_sidecar_uses_reverse_lookup() {
    let tmp = TempDir::new().unwrap();
    let file = tmp.path().join("a.txt");
    std::fs::write(&file, b"a").unwrap();
    let db = database();
    let (scanner, blacklist) = (MemoryAclScanner::new(), Blacklist::new());
    let map = IdentityMap::parse("jdoe=john.doe\njohnny=john.doe\n");

    let mut opts = options("/x", false);
    opts.owner_source = OwnerSource::Static("john.doe".into());
    ImportEngine::new(&db, &scanner, &map, &blacklist, opts)
        .import_paths(&[&file])
        .unwrap();

    let out = tmp.path().join("out");
    let export_options = ExportOptions {
        emit_owner_mapping: true,
        owner_mapping_file: "owners.txt".into(),
        ..ExportOptions::default()
    };
    ExportEngine::new(&db, &map, export_options)
        .export_path("/x", &out)
        .unwrap();

    let sidecar = std::fs::read_to_string(out.join("owners.txt")).unwrap();
    assert_eq!(sidecar, "john.doe=jdoe\n");
}

// ===========================================================================
// Identity mapping
// ===========================================================================

#[test]
fn mapping_file_load_save_load() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("users.txt");
    std::fs::write(
        &path,
        "# exported from AD\n\nZed=zed.r3\n  alice = alice.r3\nbob=\n# trailing\n",
    )
    .unwrap();

    let first = IdentityMap::load_file(&path).unwrap();
    first.save_file(&path).unwrap();
    let second = IdentityMap::load_file(&path).unwrap();

    assert_eq!(first, second);
    assert_eq!(
        std::fs::read_to_string(&path).unwrap(),
        "alice=alice.r3\nbob=\nZed=zed.r3\n"
    );
}

#[test]
fn auto_map_exact_match_maps_to_itself_and_unresolved_stays() {
    let tmp = TempDir::new().unwrap();
    let share = tmp.path().join("share");
    std::fs::create_dir(&share).unwrap();
    std::fs::write(share.join("f.txt"), b"x").unwrap();

    let scanner = MemoryAclScanner::new()
        .with_rules(&share, vec![AclRule::new("CORP\\alice", "rwx")])
        .with_rules(share.join("f.txt"), vec![AclRule::new("zoltan", "r--")]);

    let db = database();
    db.get_or_create_user("alice.admin", "Alice Admin").unwrap();
    db.get_or_create_user("Alice", "Alice").unwrap();
    let catalog = db.all_identities().unwrap();

    let outcome = identity::auto_map(&share, false, &scanner, &catalog);
    assert_eq!(outcome.map.lookup_target("alice"), Some("alice"));
    assert_eq!(outcome.map.lookup_target("zoltan"), Some(""));

    let out = tmp.path().join("auto_mapping.txt");
    outcome.map.save_file(&out).unwrap();
    assert_eq!(
        std::fs::read_to_string(&out).unwrap(),
        "alice=alice\nzoltan=\n"
    );
}
