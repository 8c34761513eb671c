//! r3sync command-line tool.
//!
//! Imports local files and directories into the R3 virtual filesystem,
//! exports virtual paths back to local directories, proposes identity
//! mappings from local access rules, and bulk-manages R3 identities from a
//! mapping file. One invocation runs, in order: auto-mapping, identity
//! management, imports, exports.

mod style;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use r3sync_core::acl::PosixAclScanner;
use r3sync_core::config::{ExportConfig, OwnerSourceKind, R3SyncConfig, Verbosity};
use r3sync_core::db::Database;
use r3sync_core::export::ExportEngine;
use r3sync_core::identity::{self, Blacklist, IdentityMap, UserManageAction};
use r3sync_core::import::ImportEngine;
use r3sync_core::report::{ExportReport, Skipped};
use r3sync_core::store::VfsStore;

/// Exit code for fatal I/O and persistence failures. Argument errors exit
/// with clap's code 2.
const FATAL_EXIT: u8 = 3;

/// Output of `--auto-map` when no `=OUT` is given.
const DEFAULT_AUTO_MAP_FILE: &str = "auto_mapping.txt";

// ---------------------------------------------------------------------------
// CLI argument definitions
// ---------------------------------------------------------------------------

/// Move files and permissions between the local filesystem and R3.
#[derive(Parser, Debug)]
#[command(
    name = "r3sync",
    version,
    about = "Import, export and map identities for the R3 virtual filesystem"
)]
struct Cli {
    /// Optional TOML configuration file. Flags override its values.
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// SQLite database file.
    #[arg(long, value_name = "FILE")]
    db_connection: Option<PathBuf>,

    /// Create the database file if it does not exist.
    #[arg(long)]
    create_db: bool,

    /// Local file or directory to import (repeatable).
    #[arg(long = "import", value_name = "PATH")]
    import: Vec<PathBuf>,

    /// Further local paths to import.
    #[arg(value_name = "PATH")]
    paths: Vec<PathBuf>,

    /// Virtual path to export, optionally `=` a local directory (repeatable).
    #[arg(long, value_name = "VPATH[=DIR]")]
    export: Vec<String>,

    /// Virtual directory imports land in.
    #[arg(long, value_name = "VPATH")]
    target_root: Option<String>,

    /// Descend into subdirectories on import and export.
    #[arg(long)]
    recursive: bool,

    /// Own imported objects by their local filesystem owner.
    #[arg(long, conflicts_with = "owner")]
    take_owners: bool,

    /// Own every imported object by this account.
    #[arg(long, value_name = "NAME")]
    owner: Option<String>,

    /// Identity mapping file (`local=target` per line).
    #[arg(long, value_name = "FILE")]
    map_users_file: Option<PathBuf>,

    /// Create mapped target identities that do not exist yet.
    #[arg(long)]
    create_users_if_missing: bool,

    /// Translate local access rules into R3 permissions on import.
    #[arg(long)]
    apply_permissions: bool,

    /// Write an owner-mapping sidecar next to exported files.
    #[arg(long)]
    emit_owner_mapping: bool,

    /// Names never propagated or managed (one per line).
    #[arg(long, value_name = "FILE")]
    blacklist: Option<PathBuf>,

    /// Directory to scan for accounts, optionally `=` the output file
    /// (repeatable).
    #[arg(long, value_name = "SEARCH[=OUT]")]
    auto_map: Vec<String>,

    /// Scan subdirectories when auto-mapping.
    #[arg(long)]
    auto_map_recursive: bool,

    /// Mapping file driving bulk identity management.
    #[arg(long, value_name = "FILE", requires = "user_manage_action")]
    user_manage_file: Option<PathBuf>,

    /// add-first, add-second, add-both, delete-first, delete-second or
    /// delete-both.
    #[arg(long, value_name = "ACTION", requires = "user_manage_file")]
    user_manage_action: Option<UserManageAction>,

    /// Console verbosity: none, short or verbose.
    #[arg(long, value_name = "LEVEL")]
    verbosity: Option<Verbosity>,
}

impl Cli {
    fn import_paths(&self) -> Vec<PathBuf> {
        self.import.iter().chain(&self.paths).cloned().collect()
    }

    fn has_work(&self) -> bool {
        !self.import.is_empty()
            || !self.paths.is_empty()
            || !self.export.is_empty()
            || !self.auto_map.is_empty()
            || self.user_manage_action.is_some()
    }
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match build_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", style::error(&format!("{e:#}")));
            return ExitCode::from(FATAL_EXIT);
        }
    };

    init_logging(config.logging.verbosity);

    match run(&cli, &config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", style::error(&format!("{e:#}")));
            ExitCode::from(FATAL_EXIT)
        }
    }
}

fn init_logging(verbosity: Verbosity) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(verbosity.filter_directive()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();
}

// ---------------------------------------------------------------------------
// Config helpers
// ---------------------------------------------------------------------------

/// Load the optional config file and lay the command-line flags over it.
fn build_config(cli: &Cli) -> Result<R3SyncConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            R3SyncConfig::load_from_file(path).context("failed to load configuration file")?
        }
        None => R3SyncConfig::default(),
    };

    if let Some(path) = &cli.db_connection {
        config.database.path = path.clone();
    }
    if cli.create_db {
        config.database.create_if_missing = true;
    }

    if let Some(root) = &cli.target_root {
        config.import.target_root = root.clone();
    }
    if cli.recursive {
        config.import.recursive = true;
    }
    if cli.take_owners {
        config.import.owner_source = OwnerSourceKind::Filesystem;
    }
    if let Some(owner) = &cli.owner {
        config.import.owner_source = OwnerSourceKind::Static;
        config.import.static_owner = Some(owner.clone());
    }
    if cli.create_users_if_missing {
        config.import.create_users_if_missing = true;
    }
    if cli.apply_permissions {
        config.import.apply_permissions = true;
    }
    if cli.emit_owner_mapping {
        config.export.emit_owner_mapping = true;
    }

    if let Some(path) = &cli.map_users_file {
        config.identity.mapping_file = Some(path.clone());
    }
    if let Some(path) = &cli.blacklist {
        config.identity.blacklist_file = Some(path.clone());
    }
    if let Some(verbosity) = cli.verbosity {
        config.logging.verbosity = verbosity;
    }

    config.validate().context("invalid configuration")?;
    Ok(config)
}

fn open_database(config: &R3SyncConfig) -> Result<Database> {
    let path = &config.database.path;
    let db = Database::open(path, config.database.create_if_missing)
        .with_context(|| format!("failed to open database {}", path.display()))?;
    db.initialize().context("failed to initialize database")?;
    Ok(db)
}

/// Split `VPATH[=DIR]`; without a directory the export lands under the
/// configured default directory.
fn parse_export_spec(spec: &str, export: &ExportConfig) -> (String, PathBuf) {
    match spec.split_once('=') {
        Some((vpath, dir)) if !dir.trim().is_empty() => {
            (vpath.trim().to_string(), PathBuf::from(dir.trim()))
        }
        Some((vpath, _)) => (vpath.trim().to_string(), export.default_target(vpath.trim())),
        None => (spec.trim().to_string(), export.default_target(spec.trim())),
    }
}

/// Split `SEARCH[=OUT]`.
fn parse_auto_map_spec(spec: &str) -> (PathBuf, PathBuf) {
    match spec.split_once('=') {
        Some((search, out)) if !out.trim().is_empty() => {
            (PathBuf::from(search.trim()), PathBuf::from(out.trim()))
        }
        Some((search, _)) => (PathBuf::from(search.trim()), PathBuf::from(DEFAULT_AUTO_MAP_FILE)),
        None => (PathBuf::from(spec.trim()), PathBuf::from(DEFAULT_AUTO_MAP_FILE)),
    }
}

// ---------------------------------------------------------------------------
// Run
// ---------------------------------------------------------------------------

fn run(cli: &Cli, config: &R3SyncConfig) -> Result<()> {
    if !cli.has_work() {
        println!(
            "{}",
            style::warn("nothing to do: give --import, --export, --auto-map or --user-manage-action")
        );
        return Ok(());
    }

    let identity_map = match &config.identity.mapping_file {
        Some(path) => IdentityMap::load_file(path).context("failed to load identity mapping")?,
        None => IdentityMap::new(),
    };
    let blacklist = match &config.identity.blacklist_file {
        Some(path) => Blacklist::load_file(path).context("failed to load blacklist")?,
        None => Blacklist::new(),
    };

    let db = open_database(config)?;
    let scanner = PosixAclScanner;
    let mut skipped: Vec<Skipped> = Vec::new();

    for spec in &cli.auto_map {
        let (search, out) = parse_auto_map_spec(spec);
        skipped.extend(cmd_auto_map(&db, &scanner, &search, &out, cli.auto_map_recursive)?);
    }

    if let (Some(file), Some(action)) = (&cli.user_manage_file, cli.user_manage_action) {
        cmd_manage(&db, file, action, &blacklist)?;
    }

    let imports = cli.import_paths();
    if !imports.is_empty() {
        let engine = ImportEngine::new(
            &db,
            &scanner,
            &identity_map,
            &blacklist,
            config.import.to_options(),
        );
        let report = engine.import_paths(&imports).context("import failed")?;
        let permission_rows = db
            .count_permissions()
            .context("failed to count permission rows")?;

        println!("{}", style::success("Import complete"));
        println!("{}", style::field("Files imported", report.files_imported));
        println!("{}", style::field("Folders", report.folders_ensured));
        println!("{}", style::field("Permissions", report.permissions_created));
        println!("{}", style::field("Permission rows", permission_rows));
        skipped.extend(report.skipped);
    }

    if !cli.export.is_empty() {
        let engine = ExportEngine::new(
            &db,
            &identity_map,
            config.export.to_options(config.import.recursive),
        );
        let mut total = ExportReport::default();
        for spec in &cli.export {
            let (vpath, dir) = parse_export_spec(spec, &config.export);
            let report = engine
                .export_path(&vpath, &dir)
                .with_context(|| format!("export of {vpath} failed"))?;
            let folder = db
                .get_folder(&vpath)
                .with_context(|| format!("failed to look up {vpath}"))?;
            if report.files_written == 0 && folder.is_none() {
                println!("{}", style::warn(&format!("no folder stored at {vpath}")));
            }
            println!(
                "{}",
                style::success(&format!(
                    "Exported {vpath} -> {} ({} files)",
                    dir.display(),
                    report.files_written
                ))
            );
            total.merge(report);
        }
        if config.export.emit_owner_mapping {
            println!("{}", style::field("Owner mappings", total.owner_mappings_written));
        }
        skipped.extend(total.skipped);
    }

    print_skipped(&skipped);
    Ok(())
}

fn cmd_auto_map(
    store: &dyn VfsStore,
    scanner: &PosixAclScanner,
    search: &Path,
    out: &Path,
    recursive: bool,
) -> Result<Vec<Skipped>> {
    let catalog = store
        .all_identities()
        .context("failed to read identity catalog")?;
    let outcome = identity::auto_map(search, recursive, scanner, &catalog);
    outcome
        .map
        .save_file(out)
        .with_context(|| format!("failed to write {}", out.display()))?;

    let unresolved = outcome.map.iter().filter(|(_, target)| target.is_empty()).count();
    println!(
        "{}",
        style::success(&format!("Auto-mapping written to {}", out.display()))
    );
    println!("{}", style::field("Accounts found", outcome.map.len()));
    println!("{}", style::field("Unresolved", unresolved));
    Ok(outcome.skipped)
}

fn cmd_manage(
    store: &dyn VfsStore,
    file: &Path,
    action: UserManageAction,
    blacklist: &Blacklist,
) -> Result<()> {
    let mapping = IdentityMap::load_file(file).context("failed to load user-manage file")?;
    let report = identity::manage(store, &mapping, action, blacklist)
        .with_context(|| format!("{action} failed"))?;

    println!("{}", style::success(&format!("Identity management ({action}) complete")));
    println!("{}", style::field("Created", report.created));
    println!("{}", style::field("Deleted", report.deleted));
    println!("{}", style::field("Blacklisted pairs", report.skipped));
    Ok(())
}

fn print_skipped(skipped: &[Skipped]) {
    if skipped.is_empty() {
        return;
    }
    info!(count = skipped.len(), "entries skipped");
    println!();
    for line in skipped_lines(skipped) {
        println!("{line}");
    }
}

/// Heading plus one dimmed line per skipped entry.
fn skipped_lines(skipped: &[Skipped]) -> Vec<String> {
    let mut lines = vec![style::header(&format!("{} entries skipped", skipped.len()))];
    lines.extend(
        skipped
            .iter()
            .map(|entry| format!("  {}", style::dim(&entry.to_string()))),
    );
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;
    use r3sync_core::owner::OwnerSource;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("r3sync").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_parse_export_spec() {
        let export = ExportConfig::default();
        assert_eq!(
            parse_export_spec("/docs=/tmp/out", &export),
            ("/docs".to_string(), PathBuf::from("/tmp/out"))
        );
        assert_eq!(
            parse_export_spec("/docs/reports", &export),
            ("/docs/reports".to_string(), PathBuf::from("export/docs/reports"))
        );
        assert_eq!(
            parse_export_spec("/docs=", &export),
            ("/docs".to_string(), PathBuf::from("export/docs"))
        );
    }

    #[test]
    fn test_parse_auto_map_spec() {
        assert_eq!(
            parse_auto_map_spec("/srv/share=map.txt"),
            (PathBuf::from("/srv/share"), PathBuf::from("map.txt"))
        );
        assert_eq!(
            parse_auto_map_spec("/srv/share"),
            (PathBuf::from("/srv/share"), PathBuf::from(DEFAULT_AUTO_MAP_FILE))
        );
    }

    #[test]
    fn test_flags_override_config() {
        let cli = parse(&[
            "--db-connection",
            "/tmp/r3.sqlite",
            "--create-db",
            "--target-root",
            "/inbox",
            "--owner",
            "archive",
            "--recursive",
            "--apply-permissions",
            "--verbosity",
            "verbose",
            "a.txt",
            "--import",
            "b",
        ]);
        let config = build_config(&cli).unwrap();
        assert_eq!(config.database.path, PathBuf::from("/tmp/r3.sqlite"));
        assert!(config.database.create_if_missing);
        assert_eq!(config.import.target_root, "/inbox");
        assert_eq!(config.import.owner_source(), OwnerSource::Static("archive".into()));
        assert!(config.import.recursive && config.import.apply_permissions);
        assert_eq!(config.logging.verbosity, Verbosity::Verbose);
        assert_eq!(cli.import_paths(), vec![PathBuf::from("b"), PathBuf::from("a.txt")]);
    }

    #[test]
    fn test_take_owners_and_owner_conflict() {
        let err = Cli::try_parse_from(["r3sync", "--take-owners", "--owner", "x"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ArgumentConflict);
    }

    #[test]
    fn test_user_manage_needs_both_flags() {
        let err = Cli::try_parse_from(["r3sync", "--user-manage-file", "users.txt"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);

        let cli = parse(&["--user-manage-file", "u.txt", "--user-manage-action", "add-both"]);
        assert_eq!(cli.user_manage_action, Some(UserManageAction::AddBoth));
    }

    #[test]
    fn test_bad_action_is_rejected() {
        let err = Cli::try_parse_from([
            "r3sync",
            "--user-manage-file",
            "u.txt",
            "--user-manage-action",
            "purge",
        ])
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValueValidation);
    }

    #[test]
    fn test_relative_target_root_is_invalid() {
        let cli = parse(&["--target-root", "inbox"]);
        assert!(build_config(&cli).is_err());
    }

    #[test]
    fn test_missing_database_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("missing.sqlite");
        let cli = parse(&["--db-connection", db.to_str().unwrap(), "--export", "/x"]);
        let config = build_config(&cli).unwrap();
        assert!(run(&cli, &config).is_err());
        assert!(!db.exists());
    }

    #[test]
    fn test_import_then_export() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("project");
        std::fs::create_dir_all(src.join("src")).unwrap();
        std::fs::write(src.join("README"), b"readme").unwrap();
        std::fs::write(src.join("src/lib.rs"), b"fn main() {}").unwrap();

        let db = dir.path().join("db_r3.sqlite");
        let out = dir.path().join("out");
        let export = format!("/project={}", out.display());
        let cli = parse(&[
            "--db-connection",
            db.to_str().unwrap(),
            "--create-db",
            "--owner",
            "builder",
            "--recursive",
            "--import",
            src.to_str().unwrap(),
            "--export",
            &export,
        ]);
        let config = build_config(&cli).unwrap();
        run(&cli, &config).unwrap();

        assert_eq!(std::fs::read(out.join("README")).unwrap(), b"readme");
        assert_eq!(std::fs::read(out.join("src/lib.rs")).unwrap(), b"fn main() {}");
    }

    #[test]
    fn test_skipped_lines_start_with_heading() {
        use r3sync_core::report::SkipReason;

        let skipped = vec![
            Skipped {
                path: "/data/a.txt".into(),
                subject: Some("ghost".into()),
                reason: SkipReason::Unmapped,
            },
            Skipped {
                path: "/data/missing".into(),
                subject: None,
                reason: SkipReason::PathNotFound,
            },
        ];
        let lines: Vec<String> = skipped_lines(&skipped)
            .iter()
            .map(|line| console::strip_ansi_codes(line).into_owned())
            .collect();

        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "2 entries skipped");
        assert!(lines[1].starts_with("  ") && lines[1].contains("/data/a.txt"));
        assert!(lines[2].contains("/data/missing"));
    }
}
