//! TOML-based configuration for r3sync.
//!
//! Every section is optional; a missing file section takes its defaults.
//! Command-line flags are applied on top of the loaded values by the CLI.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::errors::ConfigError;
use crate::export::{ExportOptions, OWNER_MAPPING_FILE};
use crate::import::ImportOptions;
use crate::owner::OwnerSource;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Top-level configuration loaded from a TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct R3SyncConfig {
    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub import: ImportConfig,

    #[serde(default)]
    pub export: ExportConfig,

    #[serde(default)]
    pub identity: IdentityConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

// ---------------------------------------------------------------------------
// Database
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DatabaseConfig {
    /// SQLite file holding the virtual filesystem (default `db_r3.sqlite`).
    #[serde(default = "default_db_path")]
    pub path: PathBuf,

    /// Create the database file when it does not exist.
    #[serde(default)]
    pub create_if_missing: bool,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("db_r3.sqlite")
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            create_if_missing: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Import
// ---------------------------------------------------------------------------

/// How the owner of imported objects is chosen.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OwnerSourceKind {
    #[default]
    Process,
    Filesystem,
    Static,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ImportConfig {
    /// Virtual directory imports land in (default `/`).
    #[serde(default = "default_target_root")]
    pub target_root: String,

    #[serde(default)]
    pub recursive: bool,

    #[serde(default)]
    pub owner_source: OwnerSourceKind,

    /// Account name used when `owner_source = "static"`.
    #[serde(default)]
    pub static_owner: Option<String>,

    #[serde(default)]
    pub create_users_if_missing: bool,

    /// Translate local access rules into permission rows.
    #[serde(default)]
    pub apply_permissions: bool,
}

fn default_target_root() -> String {
    "/".into()
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            target_root: default_target_root(),
            recursive: false,
            owner_source: OwnerSourceKind::default(),
            static_owner: None,
            create_users_if_missing: false,
            apply_permissions: false,
        }
    }
}

impl ImportConfig {
    /// The resolved owner strategy. A static source without a name falls
    /// back to the process account; [`R3SyncConfig::validate`] rejects that
    /// combination up front.
    pub fn owner_source(&self) -> OwnerSource {
        match (self.owner_source, &self.static_owner) {
            (OwnerSourceKind::Process, _) => OwnerSource::Process,
            (OwnerSourceKind::Filesystem, _) => OwnerSource::Filesystem,
            (OwnerSourceKind::Static, Some(name)) => OwnerSource::Static(name.clone()),
            (OwnerSourceKind::Static, None) => OwnerSource::Process,
        }
    }

    pub fn to_options(&self) -> ImportOptions {
        ImportOptions {
            recursive: self.recursive,
            owner_source: self.owner_source(),
            virtual_root: self.target_root.clone(),
            create_missing_identities: self.create_users_if_missing,
            propagate_permissions: self.apply_permissions,
        }
    }
}

// ---------------------------------------------------------------------------
// Export
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExportConfig {
    /// Base directory for exports given without an explicit target
    /// (default `export`).
    #[serde(default = "default_export_dir")]
    pub default_dir: PathBuf,

    #[serde(default)]
    pub emit_owner_mapping: bool,

    #[serde(default = "default_owner_mapping_file")]
    pub owner_mapping_file: String,
}

fn default_export_dir() -> PathBuf {
    PathBuf::from("export")
}

fn default_owner_mapping_file() -> String {
    OWNER_MAPPING_FILE.into()
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            default_dir: default_export_dir(),
            emit_owner_mapping: false,
            owner_mapping_file: default_owner_mapping_file(),
        }
    }
}

impl ExportConfig {
    /// Export options; recursion is shared with the import section.
    pub fn to_options(&self, recursive: bool) -> ExportOptions {
        ExportOptions {
            recursive,
            emit_owner_mapping: self.emit_owner_mapping,
            owner_mapping_file: self.owner_mapping_file.clone(),
        }
    }

    /// Default local target for `virtual_path`: the default directory joined
    /// with the virtual path minus its leading `/`.
    pub fn default_target(&self, virtual_path: &str) -> PathBuf {
        let relative = virtual_path.trim_start_matches('/');
        if relative.is_empty() {
            self.default_dir.clone()
        } else {
            self.default_dir.join(relative)
        }
    }
}

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct IdentityConfig {
    /// Identity mapping file (`local=target` per line).
    #[serde(default)]
    pub mapping_file: Option<PathBuf>,

    /// Blacklist file (one name per line).
    #[serde(default)]
    pub blacklist_file: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

/// Console verbosity.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Verbosity {
    None,
    #[default]
    Short,
    Verbose,
}

impl Verbosity {
    /// Default `tracing` filter directive for this verbosity.
    pub fn filter_directive(self) -> &'static str {
        match self {
            Self::None => "error",
            Self::Short => "info",
            Self::Verbose => "debug",
        }
    }
}

impl FromStr for Verbosity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(Self::None),
            "short" => Ok(Self::Short),
            "verbose" => Ok(Self::Verbose),
            other => Err(format!(
                "unknown verbosity '{other}' (expected none, short or verbose)"
            )),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoggingConfig {
    #[serde(default)]
    pub verbosity: Verbosity,
}

// ---------------------------------------------------------------------------
// Loading & validation
// ---------------------------------------------------------------------------

impl R3SyncConfig {
    /// Load configuration from a TOML file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        info!(path = %path.display(), "loading configuration");

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }

        let contents = std::fs::read_to_string(path)?;
        let config: R3SyncConfig =
            toml::from_str(&contents).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        debug!("configuration parsed successfully");
        Ok(config)
    }

    /// Validate values that cannot be expressed in the types alone.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.import.target_root.starts_with('/') {
            return Err(ConfigError::InvalidValue {
                field: "import.target_root".into(),
                detail: "virtual target root must start with '/'".into(),
            });
        }
        if self.import.owner_source == OwnerSourceKind::Static
            && self
                .import
                .static_owner
                .as_deref()
                .map_or(true, |name| name.trim().is_empty())
        {
            return Err(ConfigError::InvalidValue {
                field: "import.static_owner".into(),
                detail: "a static owner source needs an owner name".into(),
            });
        }
        if self.export.owner_mapping_file.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "export.owner_mapping_file".into(),
                detail: "owner mapping file name must not be empty".into(),
            });
        }

        Ok(())
    }

    /// Convenience: load and validate in one call.
    pub fn load_and_validate<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config = Self::load_from_file(path)?;
        config.validate()?;
        Ok(config)
    }
}
